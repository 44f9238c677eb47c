//! 検証結果のレポート（JSONL 出力用）

use serde::Serialize;

use crate::compare::Divergence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 指し手集合が食い違った（取りこぼし・不正手）
    IllegalMoves,
    /// 合計は違うが指し手ごとのノード数はすべて一致
    TotalsDisagree,
    /// 1手進めて数え直すと一致してしまった
    Inconsistent,
    /// 深さ1まで降りてもノード数の食い違いが残った
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail { kind: FailureKind },
}

impl Outcome {
    pub fn is_pass(self) -> bool {
        matches!(self, Outcome::Pass)
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail { .. } => "FAIL",
        }
    }
}

/// 掘り下げの1段分。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub fen: String,
    pub depth: u32,
    pub ours_nodes: u64,
    pub reference_nodes: u64,
    pub ours_ms: u64,
    pub reference_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divergence: Option<Divergence>,
    /// 次の段で掘り下げた指し手
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descended_into: Option<String>,
}

/// 1局面分の検証結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub fen: String,
    pub depth: u32,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub steps: Vec<StepReport>,
}

impl CheckReport {
    pub fn new(fen: String, depth: u32, outcome: Outcome, steps: Vec<StepReport>) -> Self {
        Self {
            kind: "check",
            fen,
            depth,
            outcome,
            steps,
        }
    }

    /// 食い違いが確定した局面（最後の段の FEN）。
    pub fn divergent_fen(&self) -> Option<&str> {
        if self.outcome.is_pass() {
            None
        } else {
            self.steps.last().map(|s| s.fen.as_str())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub positions: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_reports(reports: &[CheckReport]) -> Self {
        let passed = reports.iter().filter(|r| r.outcome.is_pass()).count();
        Self {
            kind: "summary",
            positions: reports.len(),
            passed,
            failed: reports.len() - passed,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

pub fn duration_to_millis(d: std::time::Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}
