//! Ranking and best-move selection for the position book.
//!
//! A position's candidates sort weight-first (explicit weights express a
//! deliberate preference, e.g. a human-curated opening choice, and
//! override engine scores entirely), then by mate distance (a mate for
//! the side to move beats any non-mate score, and a shorter mate beats a
//! longer one; a mate *against* the side to move is worst of all), then
//! by centipawn score descending.

use rand::Rng;
use std::cmp::Ordering;

use super::CandidateMove;

/// Total order used to rank candidates best-first. Records with a higher
/// weight sort first; among equal (including absent) weights, mate
/// scores dominate centipawn scores.
fn rank_key(mv: &CandidateMove) -> (i64, i32, i32) {
    // Weight is compared in descending order by negating; absent weight
    // sorts as though it were zero, below any explicit positive weight.
    let weight_rank = -(mv.weight.unwrap_or(0.0) * 1_000_000.0) as i64;

    match mv.mate {
        Some(m) if m > 0 => (weight_rank, 0, m),
        Some(m) => (weight_rank, 2, -m),
        None => (weight_rank, 1, -mv.centipawns.unwrap_or(0)),
    }
}

pub fn sort_candidates(moves: &mut [CandidateMove]) {
    moves.sort_by(|a, b| {
        if a.is_sentinel() != b.is_sentinel() {
            return if a.is_sentinel() { Ordering::Greater } else { Ordering::Less };
        }
        rank_key(a).cmp(&rank_key(b))
    });
}

/// Choose a move from an already best-first-sorted candidate list.
///
/// Candidates carrying an explicit weight are drawn from by weighted
/// cumulative distribution; unweighted candidates fall back to a uniform
/// draw among those tied for the best rank key.
pub fn choose_best<'a>(sorted: &'a [CandidateMove], rng: &mut impl Rng) -> Option<&'a CandidateMove> {
    let best = sorted.first()?;

    let weighted: Vec<&CandidateMove> = sorted.iter().filter(|m| m.weight.is_some()).collect();
    if !weighted.is_empty() {
        let total: f64 = weighted.iter().map(|m| m.weight.unwrap().max(0.0)).sum();
        if total > 0.0 {
            let mut draw = rng.random::<f64>() * total;
            for mv in &weighted {
                draw -= mv.weight.unwrap().max(0.0);
                if draw <= 0.0 {
                    return Some(mv);
                }
            }
            return weighted.last().copied();
        }
    }

    let best_key = rank_key(best);
    let tied: Vec<&CandidateMove> = sorted
        .iter()
        .take_while(|m| !m.is_sentinel() && rank_key(m) == best_key)
        .collect();
    if tied.is_empty() {
        return Some(best);
    }
    let ix = rng.random_range(0..tied.len());
    Some(tied[ix])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::EngineBlock;

    fn mv(weight: Option<f64>, cp: Option<i32>, mate: Option<i32>) -> CandidateMove {
        CandidateMove {
            san: "e4".to_string(),
            weight,
            centipawns: cp,
            mate,
            timestamp: 0,
            engine: EngineBlock {
                id: "test".to_string(),
                log: Vec::new(),
            },
        }
    }

    #[test]
    fn mate_for_mover_beats_any_centipawn_score() {
        let mut moves = vec![mv(None, Some(900), None), mv(None, None, Some(3))];
        sort_candidates(&mut moves);
        assert_eq!(moves[0].mate, Some(3));
    }

    #[test]
    fn shorter_mate_beats_longer_mate() {
        let mut moves = vec![mv(None, None, Some(5)), mv(None, None, Some(2))];
        sort_candidates(&mut moves);
        assert_eq!(moves[0].mate, Some(2));
    }

    #[test]
    fn higher_centipawns_sorts_first_among_non_mates() {
        let mut moves = vec![mv(None, Some(10), None), mv(None, Some(80), None)];
        sort_candidates(&mut moves);
        assert_eq!(moves[0].centipawns, Some(80));
    }

    #[test]
    fn being_mated_sorts_worst() {
        let mut moves = vec![mv(None, Some(-900), None), mv(None, None, Some(-1))];
        sort_candidates(&mut moves);
        assert_eq!(moves[0].centipawns, Some(-900));
    }

    #[test]
    fn explicit_weight_overrides_score() {
        let mut moves = vec![mv(Some(1.0), Some(900), None), mv(Some(5.0), Some(-900), None)];
        sort_candidates(&mut moves);
        assert_eq!(moves[0].weight, Some(5.0));
    }

    #[test]
    fn sentinel_sorts_last() {
        let mut moves = vec![CandidateMove::sentinel(), mv(None, Some(10), None)];
        sort_candidates(&mut moves);
        assert!(moves.last().unwrap().is_sentinel());
    }
}
