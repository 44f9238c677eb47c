//! ノード数の数え上げ（perft / divide）

use std::collections::BTreeMap;

use rayon::prelude::*;
use shakmaty::{CastlingMode, Chess, Position};

use crate::error::Result;

/// 深さ `depth` の perft をルートの指し手ごとに分けた結果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Divide {
    pub total: u64,
    /// UCI 表記の指し手 -> 部分木のノード数（表記順に並ぶ）
    pub moves: BTreeMap<String, u64>,
}

impl Divide {
    /// ルートの指し手ごとのノード数から組み立てる。合計は各部分木の和。
    pub fn from_moves<I>(moves: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let moves: BTreeMap<String, u64> = moves.into_iter().collect();
        let total = moves.values().sum();
        Self { total, moves }
    }
}

/// 局面と深さを受け取り divide を返す数え上げ器。
///
/// 比較する両側（手元のルールライブラリと参照エンジン）がこれを実装する。
pub trait NodeCounter {
    /// ログに出す名前
    fn label(&self) -> &str;

    fn divide(&mut self, pos: &Chess, depth: u32) -> Result<Divide>;
}

/// 単純な perft。深さ1では合法手数をそのまま返す（bulk counting）。
pub fn count_nodes(pos: &Chess, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = pos.legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .iter()
        .map(|m| {
            let mut child = pos.clone();
            child.play_unchecked(m);
            count_nodes(&child, depth - 1)
        })
        .sum()
}

/// `shakmaty` の合法手生成で数える手元側の数え上げ器。
pub struct LibraryCounter {
    label: String,
    mode: CastlingMode,
    parallel: bool,
}

impl LibraryCounter {
    pub fn new(mode: CastlingMode) -> Self {
        Self {
            label: "shakmaty".to_string(),
            mode,
            parallel: false,
        }
    }

    /// ルートの指し手ごとに rayon で並列に数える。
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl NodeCounter for LibraryCounter {
    fn label(&self) -> &str {
        &self.label
    }

    fn divide(&mut self, pos: &Chess, depth: u32) -> Result<Divide> {
        if depth == 0 {
            return Ok(Divide {
                total: 1,
                moves: BTreeMap::new(),
            });
        }
        let moves: Vec<_> = pos.legal_moves().into_iter().collect();
        let subtree = |m: &shakmaty::Move| {
            let mut child = pos.clone();
            child.play_unchecked(m);
            (m.to_uci(self.mode).to_string(), count_nodes(&child, depth - 1))
        };
        let counts: Vec<(String, u64)> = if self.parallel {
            moves.par_iter().map(subtree).collect()
        } else {
            moves.iter().map(subtree).collect()
        };
        Ok(Divide::from_moves(counts))
    }
}
