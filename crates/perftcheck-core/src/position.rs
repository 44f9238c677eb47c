//! 局面の読み込み・表示・指し手適用
//!
//! 合法性の判定はすべて `shakmaty` に任せる。

use std::io::BufRead;

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Position, Rank, Square};

use crate::error::{PerftError, Result};

/// 既定の検証局面（初期局面、Kiwipete、perft 標準局面 3〜6）。
pub const DEFAULT_POSITIONS: [&str; 7] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
];

pub fn castling_mode(chess960: bool) -> CastlingMode {
    if chess960 {
        CastlingMode::Chess960
    } else {
        CastlingMode::Standard
    }
}

/// FEN を解析し、局面として成立するか検証する。
pub fn parse_fen(fen: &str, mode: CastlingMode) -> Result<Chess> {
    let trimmed = fen.trim();
    let parsed = trimmed.parse::<Fen>().map_err(|e| PerftError::InvalidFen {
        fen: trimmed.to_string(),
        reason: e.to_string(),
    })?;
    parsed.into_position(mode).map_err(|e| PerftError::InvalidPosition {
        fen: trimmed.to_string(),
        reason: e.to_string(),
    })
}

/// 局面の FEN。アンパッサン升は合法手がある場合のみ出力する。
pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
}

/// UCI 形式（long algebraic）の指し手を適用した後の局面を返す。
///
/// キャスリングは `e1g1` 形式と king-takes-rook（`e1h1`）形式の両方を受け付ける。
pub fn play_uci(pos: &Chess, uci: &str) -> Result<Chess> {
    let invalid = |reason: String| PerftError::InvalidMove {
        uci: uci.to_string(),
        fen: to_fen(pos),
        reason,
    };
    let parsed = uci.parse::<UciMove>().map_err(|e| invalid(e.to_string()))?;
    let mv = parsed.to_move(pos).map_err(|e| invalid(e.to_string()))?;
    // to_move は合法手しか返さない
    let mut next = pos.clone();
    next.play_unchecked(&mv);
    Ok(next)
}

/// 盤面を ASCII で描画する（8段目が先頭）。
pub fn draw_board(pos: &Chess) -> String {
    let board = pos.board();
    let mut out = String::new();
    for rank in Rank::ALL.iter().rev() {
        out.push(rank.char());
        for file in File::ALL {
            let sq = Square::from_coords(file, *rank);
            out.push(' ');
            out.push(board.piece_at(sq).map_or('-', |p| p.char()));
        }
        out.push('\n');
    }
    out.push(' ');
    for file in File::ALL {
        out.push(' ');
        out.push(file.char());
    }
    out
}

/// 1行1局面の FEN リストを読み込む。空行と `#` で始まる行は無視する。
pub fn read_positions<R: BufRead>(reader: R, mode: CastlingMode) -> Result<Vec<String>> {
    let mut positions = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        parse_fen(trimmed, mode).map_err(|e| {
            PerftError::Config(format!("invalid position on line {}: {e}", idx + 1))
        })?;
        positions.push(trimmed.to_string());
    }
    if positions.is_empty() {
        return Err(PerftError::Config("no usable positions found".to_string()));
    }
    Ok(positions)
}
