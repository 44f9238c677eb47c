//! 食い違いの掘り下げ
//!
//! 合計ノード数が合わない局面から、食い違う部分木を1手ずつ辿って
//! 最初に指し手集合が食い違う局面まで降りていく。

use std::time::Instant;

use log::{info, warn};
use shakmaty::CastlingMode;

use crate::compare::{Comparison, compare};
use crate::error::{PerftError, Result};
use crate::perft::NodeCounter;
use crate::position::{draw_board, parse_fen, play_uci, to_fen};
use crate::report::{CheckReport, FailureKind, Outcome, StepReport, duration_to_millis};

/// `fen` から深さ `depth` で両者のノード数を比較し、食い違えば掘り下げる。
///
/// 指し手集合の食い違い（取りこぼし・不正手）が見つかればそこで止まる。
/// それ以外は表記順で最初にノード数が食い違う指し手を指して深さを1つ減らす。
///
/// 掘り下げた先で合計が一致した場合は PASS にせず [`FailureKind::Inconsistent`]
/// を返す。親局面では食い違っていたので、どちらかのカウンタの結果が一貫していない。
pub fn check_position<A, B>(
    ours: &mut A,
    reference: &mut B,
    fen: &str,
    depth: u32,
    mode: CastlingMode,
) -> Result<CheckReport>
where
    A: NodeCounter + ?Sized,
    B: NodeCounter + ?Sized,
{
    if depth == 0 {
        return Err(PerftError::Config("depth must be at least 1".to_string()));
    }
    let mut pos = parse_fen(fen, mode)?;
    let mut depth = depth;
    let root_depth = depth;
    let mut steps = Vec::new();

    let outcome = loop {
        let current_fen = to_fen(&pos);
        info!("Testing {current_fen} at depth {depth}");
        info!("\n{}", draw_board(&pos));

        let start = Instant::now();
        let mine = ours.divide(&pos, depth)?;
        let ours_elapsed = start.elapsed();
        info!("{} got {} nodes at depth {depth} in {ours_elapsed:?}", ours.label(), mine.total);

        let start = Instant::now();
        let theirs = reference.divide(&pos, depth)?;
        let reference_elapsed = start.elapsed();
        info!(
            "{} got {} nodes at depth {depth} in {reference_elapsed:?}",
            reference.label(),
            theirs.total
        );

        let mut step = StepReport {
            fen: current_fen,
            depth,
            ours_nodes: mine.total,
            reference_nodes: theirs.total,
            ours_ms: duration_to_millis(ours_elapsed),
            reference_ms: duration_to_millis(reference_elapsed),
            divergence: None,
            descended_into: None,
        };

        let divergence = match compare(&mine, &theirs) {
            Comparison::Agree => {
                let first_step = steps.is_empty();
                steps.push(step);
                if first_step {
                    break Outcome::Pass;
                }
                warn!("subtree counts agree one ply deeper; a counter is inconsistent");
                break Outcome::Fail {
                    kind: FailureKind::Inconsistent,
                };
            }
            Comparison::Diverge(d) => d,
        };

        info!("FAIL");
        if divergence.has_move_set_mismatch() {
            for mv in &divergence.missed {
                info!("MISSED MOVE {mv}");
            }
            for mv in &divergence.illegal {
                info!("INVALID MOVE {mv}");
            }
            step.divergence = Some(divergence);
            steps.push(step);
            break Outcome::Fail {
                kind: FailureKind::IllegalMoves,
            };
        }

        let Some(first) = divergence.first_miscount().cloned() else {
            warn!(
                "totals differ ({} vs {}) but every per-move count agrees",
                mine.total, theirs.total
            );
            step.divergence = Some(divergence);
            steps.push(step);
            break Outcome::Fail {
                kind: FailureKind::TotalsDisagree,
            };
        };
        info!(
            "Count mismatch under {}. Me: {} - Engine: {}",
            first.uci, first.ours, first.reference
        );

        if depth == 1 {
            step.divergence = Some(divergence);
            steps.push(step);
            break Outcome::Fail {
                kind: FailureKind::Unresolved,
            };
        }

        info!("Going Deeper");
        pos = play_uci(&pos, &first.uci)?;
        depth -= 1;
        step.divergence = Some(divergence);
        step.descended_into = Some(first.uci);
        steps.push(step);
    };

    Ok(CheckReport::new(fen.trim().to_string(), root_depth, outcome, steps))
}
