use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

use commands::split::{self, SplitArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "bit")]
#[command(version = VERSION)]
#[command(about = "Split one large change into domain-scoped branches and pull requests")]
struct Cli {
    #[command(flatten)]
    split: SplitArgs,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true),
            )
            .init(),
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let exit_code = match split::run(cli.split) {
        Ok((outcome, exit_code)) => {
            tracing::info!(outcome = ?outcome, "done");
            exit_code
        }
        Err(err) => {
            tracing::error!(code = err.code.as_str(), error = %err, "run failed");
            output::print_error(&err);
            output::exit_code_for_error(err.code)
        }
    };

    std::process::ExitCode::from(output::exit_code_to_u8(exit_code))
}
