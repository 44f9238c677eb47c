//! UCI エンジン出力の解析

/// `go perft` 応答の1行分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerftLine {
    /// `e2e4: 20`
    Move { uci: String, nodes: u64 },
    /// `Nodes searched: 8902`
    Total(u64),
    /// info 行・空行など
    Other,
}

/// `go perft` の出力1行を分類する。
///
/// 数値が読めない `<move>: ...` 行は `None`（壊れた出力）。
pub fn parse_perft_line(line: &str) -> Option<PerftLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("info") {
        return Some(PerftLine::Other);
    }
    if let Some(rest) = trimmed.strip_prefix("Nodes searched:") {
        return rest.trim().parse().ok().map(PerftLine::Total);
    }
    let Some((mv, count)) = trimmed.split_once(':') else {
        return Some(PerftLine::Other);
    };
    let mv = mv.trim();
    if !is_uci_move(mv) {
        return Some(PerftLine::Other);
    }
    count.trim().parse().ok().map(|nodes| PerftLine::Move {
        uci: mv.to_string(),
        nodes,
    })
}

/// `e2e4` / `e7e8q` 形式かどうか。
fn is_uci_move(s: &str) -> bool {
    let b = s.as_bytes();
    let square = |f: u8, r: u8| (b'a'..=b'h').contains(&f) && (b'1'..=b'8').contains(&r);
    match b.len() {
        4 => square(b[0], b[1]) && square(b[2], b[3]),
        5 => square(b[0], b[1]) && square(b[2], b[3]) && b"qrbn".contains(&b[4]),
        _ => false,
    }
}

/// `option name <Name> type ...` から名前を取り出す（名前は空白を含み得る）。
pub fn parse_option_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace().skip_while(|tok| *tok != "name");
    tokens.next()?;
    let parts: Vec<&str> = tokens.take_while(|tok| *tok != "type").collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// `Name=Value` 形式のオプション指定を分解する。`=` が無ければ値なし。
pub fn split_option(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (spec.trim(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_perft_line_classifies_stockfish_output() {
        assert_eq!(
            parse_perft_line("e2e4: 20"),
            Some(PerftLine::Move {
                uci: "e2e4".to_string(),
                nodes: 20
            })
        );
        assert_eq!(
            parse_perft_line("b7b8q: 1"),
            Some(PerftLine::Move {
                uci: "b7b8q".to_string(),
                nodes: 1
            })
        );
        assert_eq!(parse_perft_line("Nodes searched: 8902"), Some(PerftLine::Total(8902)));
        assert_eq!(parse_perft_line(""), Some(PerftLine::Other));
        assert_eq!(
            parse_perft_line("info string NNUE evaluation using nn-1111.nnue enabled"),
            Some(PerftLine::Other)
        );
        assert_eq!(parse_perft_line("Stockfish 16 by the Stockfish developers"), Some(PerftLine::Other));
    }

    #[test]
    fn parse_perft_line_rejects_unreadable_counts() {
        assert_eq!(parse_perft_line("e2e4: lots"), None);
        assert_eq!(parse_perft_line("Nodes searched: ?"), None);
    }

    #[test]
    fn parse_option_name_keeps_spaces() {
        assert_eq!(
            parse_option_name("option name Hash type spin default 16 min 1 max 33554432"),
            Some("Hash".to_string())
        );
        assert_eq!(
            parse_option_name("option name Clear Hash type button"),
            Some("Clear Hash".to_string())
        );
        assert_eq!(parse_option_name("option type check"), None);
    }

    #[test]
    fn split_option_trims_name_and_value() {
        assert_eq!(split_option(" Hash = 128 "), ("Hash", Some("128")));
        assert_eq!(split_option("Clear Hash"), ("Clear Hash", None));
    }
}
