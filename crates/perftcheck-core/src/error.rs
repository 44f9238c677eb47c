//! perftcheck のエラー型

use std::path::PathBuf;

/// 局面解析・エンジン通信・設定読み込みで発生するエラー。
///
/// ノード数の不一致はエラーではなく [`crate::bisect::Outcome`] として報告する。
#[derive(thiserror::Error, Debug)]
pub enum PerftError {
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    /// FEN としては読めたが局面として成立しない
    #[error("invalid position '{fen}': {reason}")]
    InvalidPosition { fen: String, reason: String },

    #[error("cannot play '{uci}' in {fen}: {reason}")]
    InvalidMove { uci: String, fen: String, reason: String },

    #[error("failed to spawn engine at {}", path.display())]
    EngineSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{label}: engine I/O failed")]
    EngineIo {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{label}: engine read timeout while waiting for {waiting_for}")]
    EngineTimeout { label: String, waiting_for: String },

    #[error("{label}: engine exited unexpectedly")]
    EngineExited { label: String },

    #[error("{label}: malformed engine output: {line:?}")]
    MalformedOutput { label: String, line: String },

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PerftError>;
