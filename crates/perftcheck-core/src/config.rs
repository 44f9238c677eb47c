//! 実行設定（TOML）
//!
//! ```toml
//! depth = 5
//! positions = ["rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"]
//!
//! [engine]
//! path = "./stockfish"
//! hash_mb = 128
//! options = ["Clear Hash"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PerftError, Result};
use crate::position::{DEFAULT_POSITIONS, castling_mode, parse_fen};
use crate::uci::EngineConfig;

pub const DEFAULT_DEPTH: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub depth: u32,
    pub positions: Vec<String>,
    pub chess960: bool,
    /// 手元側の数え上げをルートの指し手ごとに並列化する
    pub parallel: bool,
    pub engine: EngineSection,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            positions: DEFAULT_POSITIONS.iter().map(|s| s.to_string()).collect(),
            chess960: false,
            parallel: false,
            engine: EngineSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub hash_mb: u32,
    pub threads: usize,
    pub ponder: bool,
    pub options: Vec<String>,
    pub perft_timeout_secs: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        let base = EngineConfig::default();
        Self {
            path: base.path,
            args: base.args,
            hash_mb: base.hash_mb,
            threads: base.threads,
            ponder: base.ponder,
            options: base.options,
            perft_timeout_secs: base.perft_timeout.as_secs(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| PerftError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(PerftError::Config("depth must be at least 1".to_string()));
        }
        if self.positions.is_empty() {
            return Err(PerftError::Config("no positions to check".to_string()));
        }
        if self.engine.perft_timeout_secs == 0 {
            return Err(PerftError::Config("perft_timeout_secs must be positive".to_string()));
        }
        let mode = castling_mode(self.chess960);
        for fen in &self.positions {
            parse_fen(fen, mode)?;
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            path: self.engine.path.clone(),
            args: self.engine.args.clone(),
            hash_mb: self.engine.hash_mb,
            threads: self.engine.threads,
            ponder: self.engine.ponder,
            chess960: self.chess960,
            options: self.engine.options.clone(),
            perft_timeout: Duration::from_secs(self.engine.perft_timeout_secs),
        }
    }
}
