//! 2つの divide 結果の突き合わせ

use serde::Serialize;

use crate::perft::Divide;

/// 両側に存在するがノード数が食い違う指し手。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveCount {
    pub uci: String,
    pub ours: u64,
    pub reference: u64,
}

/// 合計が一致しなかったときの内訳。各リストは指し手の表記順。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Divergence {
    /// 参照エンジンにはあるが手元に無い指し手
    pub missed: Vec<String>,
    /// 手元にはあるが参照エンジンに無い指し手
    pub illegal: Vec<String>,
    pub miscounted: Vec<MoveCount>,
}

impl Divergence {
    /// 指し手集合そのものが食い違っているか。
    pub fn has_move_set_mismatch(&self) -> bool {
        !self.missed.is_empty() || !self.illegal.is_empty()
    }

    /// 次に掘り下げる指し手。
    pub fn first_miscount(&self) -> Option<&MoveCount> {
        self.miscounted.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Agree,
    Diverge(Divergence),
}

/// 合計ノード数が一致すれば `Agree`。内訳は合計が食い違ったときだけ調べる。
pub fn compare(ours: &Divide, reference: &Divide) -> Comparison {
    if ours.total == reference.total {
        return Comparison::Agree;
    }
    let mut divergence = Divergence::default();
    for (mv, &theirs) in &reference.moves {
        match ours.moves.get(mv) {
            None => divergence.missed.push(mv.clone()),
            Some(&mine) if mine != theirs => divergence.miscounted.push(MoveCount {
                uci: mv.clone(),
                ours: mine,
                reference: theirs,
            }),
            Some(_) => {}
        }
    }
    divergence.illegal = ours
        .moves
        .keys()
        .filter(|mv| !reference.moves.contains_key(*mv))
        .cloned()
        .collect();
    Comparison::Diverge(divergence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divide(moves: &[(&str, u64)]) -> Divide {
        Divide::from_moves(moves.iter().map(|(m, n)| (m.to_string(), *n)))
    }

    #[test]
    fn equal_totals_agree_even_if_breakdown_differs() {
        let ours = divide(&[("e2e4", 20), ("d2d4", 20)]);
        let theirs = divide(&[("e2e4", 21), ("d2d4", 19)]);
        assert_eq!(compare(&ours, &theirs), Comparison::Agree);
    }

    #[test]
    fn missed_and_illegal_moves_are_reported_sorted() {
        let ours = divide(&[("e2e4", 20), ("h2h5", 20), ("a2a5", 1)]);
        let theirs = divide(&[("e2e4", 20), ("g1f3", 20), ("b1c3", 20)]);
        let Comparison::Diverge(d) = compare(&ours, &theirs) else {
            panic!("expected divergence");
        };
        assert_eq!(d.missed, vec!["b1c3", "g1f3"]);
        assert_eq!(d.illegal, vec!["a2a5", "h2h5"]);
        assert!(d.miscounted.is_empty());
        assert!(d.has_move_set_mismatch());
    }

    #[test]
    fn first_miscount_is_lexicographically_smallest() {
        let ours = divide(&[("g1f3", 19), ("b1c3", 22), ("e2e4", 20)]);
        let theirs = divide(&[("g1f3", 20), ("b1c3", 20), ("e2e4", 20)]);
        let Comparison::Diverge(d) = compare(&ours, &theirs) else {
            panic!("expected divergence");
        };
        assert!(!d.has_move_set_mismatch());
        assert_eq!(
            d.first_miscount(),
            Some(&MoveCount {
                uci: "b1c3".to_string(),
                ours: 22,
                reference: 20
            })
        );
        assert_eq!(d.miscounted.len(), 2);
    }

    #[test]
    fn totals_can_disagree_with_identical_breakdown() {
        let ours = divide(&[("e2e4", 20)]);
        let mut theirs = ours.clone();
        theirs.total += 1;
        let Comparison::Diverge(d) = compare(&ours, &theirs) else {
            panic!("expected divergence");
        };
        assert_eq!(d, Divergence::default());
        assert_eq!(d.first_miscount(), None);
    }
}
