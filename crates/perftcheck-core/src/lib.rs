//! 合法手生成器の perft 差分テスト
//!
//! 手元のルールライブラリ（`shakmaty`）と UCI 参照エンジンのノード数を
//! 固定深さで比較し、食い違えば最初に食い違う指し手を1手ずつ掘り下げる。

pub mod bisect;
pub mod compare;
pub mod config;
pub mod error;
pub mod perft;
pub mod position;
pub mod report;
pub mod uci;

pub use bisect::check_position;
pub use compare::{Comparison, Divergence, MoveCount, compare};
pub use config::{EngineSection, RunConfig};
pub use error::{PerftError, Result};
pub use perft::{Divide, LibraryCounter, NodeCounter, count_nodes};
pub use report::{CheckReport, FailureKind, Outcome, StepReport, Summary};
pub use uci::{EngineConfig, UciEngine};
