//! # PGN annotator
//!
//! Turns a sequence of per-ply `(played, played-eval, best-eval)`
//! triples into annotated PGN movetext: NAG-style suffixes, a prose
//! comment naming the mistake class, an `{ [%eval ...] }` tag, and —
//! once a move is bad enough to be worth showing an alternative —
//! parenthesised principal-variation text.

use crate::board::Board;
use crate::engine::info::Score;

/// `wc(cp)`: the logistic winning-chance transform, mapped to `[-1, 1]`.
pub fn winning_chance_cp(cp: i32) -> f64 {
    let clamped = cp.clamp(-1000, 1000) as f64;
    2.0 / (1.0 + (-0.004 * clamped).exp()) - 1.0
}

/// The mate-in-N variant of the winning-chance transform: a mate is
/// worth the same winning chance as a very large but bounded centipawn
/// score, discounted slightly for longer mates.
pub fn winning_chance_mate(n: i32) -> f64 {
    let magnitude = 2100.0 - 100.0 * (n.unsigned_abs().min(10) as f64);
    let signed = magnitude * (n.signum() as f64);
    2.0 / (1.0 + (-0.004 * signed).exp()) - 1.0
}

/// A ply's evaluation in whichever form the engine reported it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlyScore {
    Centipawns(i32),
    MateIn(i32),
}

impl PlyScore {
    fn winning_chance(self) -> f64 {
        match self {
            Self::Centipawns(cp) => winning_chance_cp(cp),
            Self::MateIn(n) => winning_chance_mate(n),
        }
    }

    /// The `[%eval ...]` tag payload in global (not side-to-move) terms.
    fn eval_tag(self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:.2}", cp as f64 / 100.0),
            Self::MateIn(n) => format!("#{n}"),
        }
    }
}

impl From<Score> for PlyScore {
    fn from(s: Score) -> Self {
        match s {
            Score::Centipawns(cp) => PlyScore::Centipawns(cp),
            Score::MateIn(n) => PlyScore::MateIn(n),
        }
    }
}

/// One annotated ply's raw inputs: the move actually played, its SAN,
/// the engine's evaluation of the position after it, the engine's
/// evaluation of (and principal variation for) the move it considered
/// best instead, and the position the ply was played from.
pub struct PlyInput {
    pub ply_number: u32,
    pub white_to_move: bool,
    pub played_san: String,
    pub played_eval: PlyScore,
    pub best_san: String,
    pub best_eval: PlyScore,
    /// UCI moves of the best line, starting with `best_san`'s move.
    pub best_pv: Vec<String>,
    pub position_before: Board,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    None,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Marker {
    fn suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Inaccuracy => "?!",
            Self::Mistake => "?",
            Self::Blunder => "??",
        }
    }

    /// The prose word for this marker. A blunder that crosses a forced-mate
    /// boundary gets a special message instead of the generic "Blunder" —
    /// [`MateTransition::phrase`] supplies that override.
    fn word(self, mate_transition: MateTransition) -> &'static str {
        if self == Self::Blunder {
            if let Some(phrase) = mate_transition.phrase() {
                return phrase;
            }
        }
        match self {
            Self::None => "",
            Self::Inaccuracy => "Inaccuracy",
            Self::Mistake => "Mistake",
            Self::Blunder => "Blunder",
        }
    }

    fn from_delta(delta: f64) -> Self {
        if delta <= -0.30 {
            Self::Blunder
        } else if delta <= -0.20 {
            Self::Mistake
        } else if delta <= -0.10 {
            Self::Inaccuracy
        } else {
            Self::None
        }
    }
}

/// Whether a ply crossed a forced-mate boundary, from the mover's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MateTransition {
    /// Neither side of the pair is a forced mate for the mover going
    /// away, or the mate distance merely shrank/grew.
    None,
    /// The best move had a forced mate for the mover; the played move
    /// let it slip.
    LostForcedMate,
    /// The played move walks into a forced mate against the mover that
    /// the best move avoided.
    AllowedForcedMateAgainstSelf,
}

impl MateTransition {
    fn phrase(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::LostForcedMate => Some("Lets a forced mate slip"),
            Self::AllowedForcedMateAgainstSelf => Some("Allows a forced mate"),
        }
    }

    /// `mate_in` is positive when the mate is delivered by the mover,
    /// negative when the mover is the one getting mated.
    fn classify(best_mate_in: Option<i32>, played_mate_in: Option<i32>) -> Self {
        let best_wins = best_mate_in.is_some_and(|n| n > 0);
        let played_wins = played_mate_in.is_some_and(|n| n > 0);
        let played_loses = played_mate_in.is_some_and(|n| n < 0);
        let best_loses = best_mate_in.is_some_and(|n| n < 0);

        if best_wins && !played_wins {
            Self::LostForcedMate
        } else if played_loses && !best_loses {
            Self::AllowedForcedMateAgainstSelf
        } else {
            Self::None
        }
    }
}

/// The mate distance from the mover's point of view: positive means the
/// mover delivers mate, negative means the mover gets mated. `None` for
/// a non-mate (centipawn) score.
fn mover_mate_in(score: PlyScore, white_to_move: bool) -> Option<i32> {
    match score {
        PlyScore::MateIn(n) => Some(if white_to_move { n } else { -n }),
        PlyScore::Centipawns(_) => None,
    }
}

const WRAP_COLUMN: usize = 72;

/// Render one annotated ply as PGN text: the move token, any comment and
/// eval tag, and (when the move was flawed enough) the best-line
/// variation.
pub fn annotate_ply(input: &PlyInput) -> String {
    let delta = input.played_eval.winning_chance() - input.best_eval.winning_chance();
    let delta = if input.white_to_move { delta } else { -delta };
    let marker = Marker::from_delta(delta);
    let mate_transition = MateTransition::classify(
        mover_mate_in(input.best_eval, input.white_to_move),
        mover_mate_in(input.played_eval, input.white_to_move),
    );

    let move_number_prefix = if input.white_to_move {
        format!("{}. ", input.ply_number)
    } else {
        format!("{}... ", input.ply_number)
    };

    let mut out = format!("{move_number_prefix}{}{}", input.played_san, marker.suffix());
    out.push_str(&format!(" {{ [%eval {}] }}", input.played_eval.eval_tag()));

    if marker != Marker::None {
        out.push_str(&format!(
            " {{ ({:.2} \u{2192} {:.2}) {}. {} was best. }}",
            input.best_eval.winning_chance(),
            input.played_eval.winning_chance(),
            marker.word(mate_transition),
            input.best_san,
        ));
    }

    if delta <= -0.05 {
        let variation = render_variation(input);
        out.push(' ');
        out.push_str(&variation);
    }

    out
}

fn render_variation(input: &PlyInput) -> String {
    let mut board = input.position_before.clone();
    let mut tokens = Vec::new();

    let mut ply_number = input.ply_number;
    let mut white_to_move = input.white_to_move;

    for (i, uci) in input.best_pv.iter().enumerate() {
        let Some(mv) = crate::board::Move::from_uci(uci) else { break };
        let Ok(san) = board.uci_to_san(mv) else { break };

        let prefix = if white_to_move {
            format!("{ply_number}.")
        } else if i == 0 {
            format!("{ply_number}...")
        } else {
            String::new()
        };

        tokens.push(if prefix.is_empty() { san.clone() } else { format!("{prefix} {san}") });

        let Ok(after) = board.apply_move(mv) else { break };
        board = after;

        if white_to_move {
            white_to_move = false;
        } else {
            white_to_move = true;
            ply_number += 1;
        }
    }

    wrap_parenthesised(&tokens)
}

fn wrap_parenthesised(tokens: &[String]) -> String {
    let mut lines = vec![String::new()];
    lines[0].push('(');
    let mut first = true;
    for tok in tokens {
        let current = lines.last_mut().unwrap();
        let addition_len = tok.len() + if first { 0 } else { 1 };
        if !first && current.len() + addition_len > WRAP_COLUMN {
            lines.push(String::new());
        }
        let current = lines.last_mut().unwrap();
        if !current.is_empty() && !current.ends_with('(') {
            current.push(' ');
        }
        current.push_str(tok);
        first = false;
    }
    if let Some(last) = lines.last_mut() {
        last.push(')');
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winning_chance_is_zero_at_equal_material() {
        assert!(winning_chance_cp(0).abs() < 1e-9);
    }

    #[test]
    fn winning_chance_saturates_toward_one() {
        assert!(winning_chance_cp(1000) > 0.95);
        assert!(winning_chance_cp(-1000) < -0.95);
    }

    #[test]
    fn blunder_threshold_fires_on_large_negative_delta() {
        assert_eq!(Marker::from_delta(-0.31), Marker::Blunder);
        assert_eq!(Marker::from_delta(-0.25), Marker::Mistake);
        assert_eq!(Marker::from_delta(-0.15), Marker::Inaccuracy);
        assert_eq!(Marker::from_delta(-0.02), Marker::None);
    }

    #[test]
    fn annotate_ply_flags_a_blunder_and_shows_best_line() {
        let input = PlyInput {
            ply_number: 10,
            white_to_move: true,
            played_san: "Qh5".to_string(),
            played_eval: PlyScore::Centipawns(-900),
            best_san: "Nf3".to_string(),
            best_eval: PlyScore::Centipawns(20),
            best_pv: vec!["g1f3".to_string(), "b8c6".to_string()],
            position_before: Board::starting_position(),
        };
        let rendered = annotate_ply(&input);
        assert!(rendered.contains("Qh5??"));
        assert!(rendered.contains("Blunder"));
        assert!(rendered.contains("(1. Nf3"));
    }

    #[test]
    fn annotate_ply_reports_a_lost_forced_mate() {
        let input = PlyInput {
            ply_number: 20,
            white_to_move: true,
            played_san: "Kh1".to_string(),
            played_eval: PlyScore::Centipawns(40),
            best_san: "Qg7#".to_string(),
            best_eval: PlyScore::MateIn(1),
            best_pv: vec!["d1g7".to_string()],
            position_before: Board::starting_position(),
        };
        let rendered = annotate_ply(&input);
        assert!(rendered.contains("Kh1??"));
        assert!(rendered.contains("Lets a forced mate slip"));
    }

    #[test]
    fn annotate_ply_reports_walking_into_a_forced_mate() {
        let input = PlyInput {
            ply_number: 20,
            white_to_move: true,
            played_san: "Kh1".to_string(),
            played_eval: PlyScore::MateIn(-2),
            best_san: "Kg1".to_string(),
            best_eval: PlyScore::Centipawns(0),
            best_pv: vec!["e1g1".to_string()],
            position_before: Board::starting_position(),
        };
        let rendered = annotate_ply(&input);
        assert!(rendered.contains("Allows a forced mate"));
    }

    #[test]
    fn annotate_ply_shows_no_marker_for_a_fine_move() {
        let input = PlyInput {
            ply_number: 1,
            white_to_move: true,
            played_san: "e4".to_string(),
            played_eval: PlyScore::Centipawns(25),
            best_san: "e4".to_string(),
            best_eval: PlyScore::Centipawns(28),
            best_pv: vec!["e2e4".to_string()],
            position_before: Board::starting_position(),
        };
        let rendered = annotate_ply(&input);
        assert!(!rendered.contains('?'));
        assert!(!rendered.contains('('));
    }
}
