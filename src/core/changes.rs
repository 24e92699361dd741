//! Change-set detection: which files moved, and which domains they land in.

use crate::config::Domain;
use crate::error::Result;
use crate::git::Vcs;

/// Parse porcelain status output into repository-relative paths.
///
/// Status markers and surrounding whitespace are stripped, and C-quoted paths
/// (`"caf\303\251"`) are decoded. Renames (`R  old -> new`) report the new
/// path. Blank output yields no paths.
pub fn parse_status(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let (_, rest) = line.split_once(char::is_whitespace)?;
            let path = match rest.rsplit_once(" -> ") {
                Some((_, renamed_to)) => renamed_to,
                None => rest,
            };
            let path = unquote(path.trim());
            if path.is_empty() {
                None
            } else {
                Some(path)
            }
        })
        .collect()
}

/// Decode git's C-style quoting; unquoted paths are returned as-is.
fn unquote(path: &str) -> String {
    let inner = match path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
        Some(inner) => inner,
        None => return path.to_string(),
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Ask the VCS for the working tree status and parse it.
pub fn list_changed_files(vcs: &dyn Vcs) -> Result<Vec<String>> {
    let raw = vcs.status()?;
    let files = parse_status(&raw);
    tracing::info!(count = files.len(), files = ?files, "changed files");
    Ok(files)
}

/// Indices of the domains touched by at least one changed file, in config order.
pub fn affected_domains(domains: &[Domain], changed_files: &[String]) -> Vec<usize> {
    domains
        .iter()
        .enumerate()
        .filter(|(_, domain)| domain.is_affected(changed_files))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::fixture_domain;

    #[test]
    fn parse_status_strips_markers() {
        let files = parse_status(" M domains/dom1/file1\nA domains/dom2/file2\n");
        assert_eq!(files, vec!["domains/dom1/file1", "domains/dom2/file2"]);
    }

    #[test]
    fn parse_status_handles_untracked_and_padded_markers() {
        let files = parse_status("?? domains/dom3/new.rs\nA  domains/dom2/added.rs\n D gone.txt\n");
        assert_eq!(
            files,
            vec!["domains/dom3/new.rs", "domains/dom2/added.rs", "gone.txt"]
        );
    }

    #[test]
    fn parse_status_unquotes_paths() {
        let files = parse_status(" M \"docs/with space.md\"\n");
        assert_eq!(files, vec!["docs/with space.md"]);
    }

    #[test]
    fn parse_status_decodes_octal_escapes() {
        let files = parse_status("?? \"domains/caf\\303\\251/f.txt\"\n");
        assert_eq!(files, vec!["domains/café/f.txt"]);

        let domains = vec![fixture_domain("cafe", "C", "domains/café/")];
        assert_eq!(affected_domains(&domains, &files), vec![0]);
    }

    #[test]
    fn parse_status_decodes_escaped_quotes_and_backslashes() {
        let files = parse_status(" M \"docs/a\\\"b\\\\c.md\"\n");
        assert_eq!(files, vec!["docs/a\"b\\c.md"]);
    }

    #[test]
    fn parse_status_reports_rename_target() {
        let files = parse_status("R  old/name.rs -> domains/dom1/name.rs\n");
        assert_eq!(files, vec!["domains/dom1/name.rs"]);
    }

    #[test]
    fn parse_status_empty_output_is_empty() {
        assert!(parse_status("").is_empty());
        assert!(parse_status("\n\n").is_empty());
    }

    #[test]
    fn affected_domains_uses_plain_prefix_match() {
        let domains = vec![
            fixture_domain("dom1", "D1", "domains/dom1/"),
            fixture_domain("dom2", "D2", "domains/dom2/"),
            fixture_domain("dom3", "D3", "domains/dom3/"),
        ];
        let files = parse_status(" M domains/dom1/file1\nA domains/dom2/file2\n");
        assert_eq!(affected_domains(&domains, &files), vec![0, 1]);
    }

    #[test]
    fn affected_domains_without_trailing_slash_matches_siblings() {
        let domains = vec![fixture_domain("dom1", "D1", "domains/dom1")];
        let files = vec!["domains/dom10/file".to_string()];
        assert_eq!(affected_domains(&domains, &files), vec![0]);
    }

    #[test]
    fn no_changes_means_no_affected_domains() {
        let domains = vec![fixture_domain("dom1", "D1", "domains/dom1/")];
        assert!(affected_domains(&domains, &parse_status("")).is_empty());
    }
}
