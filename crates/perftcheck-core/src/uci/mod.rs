//! 参照エンジンとの UCI 通信

pub mod engine;
pub mod protocol;

pub use engine::{DEFAULT_PERFT_TIMEOUT, EngineConfig, UciEngine};
pub use protocol::{PerftLine, parse_option_name, parse_perft_line, split_option};
