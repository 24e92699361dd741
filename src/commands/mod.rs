pub type CmdResult<T> = bit::Result<(T, i32)>;

pub mod split;
