//! Parsing UCI `info` lines into [`EvaluationLine`]s.

use std::sync::OnceLock;

use regex::Regex;

/// A score as reported by the engine, before conversion to the book's
/// global convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    MateIn(i32),
}

/// One decoded `info` line.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationLine {
    pub depth: u32,
    pub seldepth: u32,
    pub multipv: u32,
    pub score: Option<Score>,
    pub nodes: u64,
    pub nps: u64,
    pub tb_hits: u64,
    pub time_ms: u64,
    pub upperbound: bool,
    pub lowerbound: bool,
    pub pv: Vec<String>,
}

impl EvaluationLine {
    /// The first move of the principal variation, i.e. the candidate
    /// move this line is evaluating.
    pub fn first_move(&self) -> Option<&str> {
        self.pv.first().map(|s| s.as_str())
    }
}

fn currmove_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bcurrmove\b").expect("static regex is valid"))
}

/// Whether this raw line should be filtered from mirrored logs — it is
/// still forwarded to the consumer, just not mirrored to the host log.
pub fn is_noisy_currmove_line(line: &str) -> bool {
    currmove_regex().is_match(line)
}

/// Decode an `info ... score {cp N|mate N} ... pv ...` line. Returns
/// `None` for `info` lines with no `score` keyword (e.g. `info string
/// ...` or pure `currmove` progress lines) — those carry no evaluation.
pub fn parse_info_line(line: &str) -> Option<EvaluationLine> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "info" {
        return None;
    }

    let mut depth = 0u32;
    let mut seldepth = 0u32;
    let mut multipv = 1u32;
    let mut score = None;
    let mut nodes = 0u64;
    let mut nps = 0u64;
    let mut tb_hits = 0u64;
    let mut time_ms = 0u64;
    let mut upperbound = false;
    let mut lowerbound = false;
    let mut pv = Vec::new();

    while let Some(tok) = tokens.next() {
        match tok {
            "depth" => depth = next_parsed(&mut tokens).unwrap_or(depth),
            "seldepth" => seldepth = next_parsed(&mut tokens).unwrap_or(seldepth),
            "multipv" => multipv = next_parsed(&mut tokens).unwrap_or(multipv),
            "nodes" => nodes = next_parsed(&mut tokens).unwrap_or(nodes),
            "nps" => nps = next_parsed(&mut tokens).unwrap_or(nps),
            "tbhits" => tb_hits = next_parsed(&mut tokens).unwrap_or(tb_hits),
            "time" => time_ms = next_parsed(&mut tokens).unwrap_or(time_ms),
            "score" => match tokens.next() {
                Some("cp") => score = next_parsed(&mut tokens).map(Score::Centipawns),
                Some("mate") => score = next_parsed(&mut tokens).map(Score::MateIn),
                _ => {}
            },
            "upperbound" => upperbound = true,
            "lowerbound" => lowerbound = true,
            "pv" => {
                pv = tokens.by_ref().map(|s| s.to_string()).collect();
                break;
            }
            _ => {}
        }
    }

    if score.is_none() && pv.is_empty() {
        return None;
    }

    Some(EvaluationLine {
        depth,
        seldepth,
        multipv,
        score,
        nodes,
        nps,
        tb_hits,
        time_ms,
        upperbound,
        lowerbound,
        pv,
    })
}

fn next_parsed<'a, I: Iterator<Item = &'a str>, T: std::str::FromStr>(tokens: &mut I) -> Option<T> {
    tokens.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_centipawn_line() {
        let line = "info depth 12 seldepth 18 multipv 1 score cp 34 nodes 100000 nps 900000 tbhits 0 time 111 pv e2e4 e7e5";
        let ev = parse_info_line(line).unwrap();
        assert_eq!(ev.depth, 12);
        assert_eq!(ev.score, Some(Score::Centipawns(34)));
        assert_eq!(ev.pv, vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn parses_mate_line_with_bound_flag() {
        let line = "info depth 30 score mate 4 upperbound nodes 5 time 2 pv d1h5";
        let ev = parse_info_line(line).unwrap();
        assert_eq!(ev.score, Some(Score::MateIn(4)));
        assert!(ev.upperbound);
    }

    #[test]
    fn currmove_lines_are_flagged_noisy_but_not_dropped() {
        let line = "info depth 10 currmove e2e4 currmovenumber 1";
        assert!(is_noisy_currmove_line(line));
        assert!(parse_info_line(line).is_none());
    }

    #[test]
    fn non_score_info_lines_decode_to_none() {
        assert!(parse_info_line("info string NNUE evaluation using nn-abc.nnue").is_none());
    }
}
