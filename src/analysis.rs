//! # Depth-stable analysis controller
//!
//! Drives an [`EngineDriver`] through a single position until its output
//! satisfies a stability policy, then shapes the result into candidate
//! records ready for the book.
//!
//! A "depth" is complete once every requested MultiPV slot has reported
//! at that depth (or every legal move has, if fewer moves exist than
//! the requested MultiPV). The controller stops once the top move has
//! held for `DepthDelta` consecutive completed depths at or past
//! `MinDepth`/`MinTime`/`MinNodes`, or once `MaxTime` elapses first.

use std::collections::BTreeMap;
use std::time::Duration;

use rootcause::Report;

use crate::board::Board;
use crate::book::{Book, CandidateMove, EngineBlock, EngineLogLine};
use crate::config::AnalysisConfig;
use crate::engine::info::{EvaluationLine, Score};
use crate::engine::EngineDriver;
use crate::error::CoreError;

/// Per-depth records, keyed by MultiPV rank; within a rank, only the
/// highest node-count line is kept (stragglers from an earlier partial
/// report are superseded).
type DepthRecords = BTreeMap<u32, EvaluationLine>;

/// The accepted result of an [`analyze`] run: the depth it settled on
/// and the per-MultiPV-rank records at that depth, in rank order.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub depth: u32,
    pub records: Vec<EvaluationLine>,
}

/// Drive `driver` through an analysis of `board` under `config`,
/// optionally restricted to `searchmoves`.
pub async fn analyze(
    driver: &mut EngineDriver,
    board: &Board,
    config: &AnalysisConfig,
    searchmoves: Option<&[crate::board::Move]>,
) -> Result<AnalysisOutcome, Report> {
    let legal_count = board.legal_moves().len().max(1) as u32;
    let required = config.multipv.min(legal_count);

    driver.send(&format!("position fen {}", board.to_fen())).await?;
    let mut go = format!("go depth {}", config.max_depth);
    if let Some(moves) = searchmoves {
        if !moves.is_empty() {
            let ucis: Vec<String> = moves.iter().map(|m| m.to_uci()).collect();
            go.push_str(" searchmoves ");
            go.push_str(&ucis.join(" "));
        }
    }
    driver.send(&go).await?;

    let start = tokio::time::Instant::now();
    let deadline = tokio::time::sleep(config.max_time);
    tokio::pin!(deadline);

    let mut by_depth: BTreeMap<u32, DepthRecords> = BTreeMap::new();
    let mut completed: Vec<u32> = Vec::new();

    loop {
        tokio::select! {
            _ = &mut deadline => {
                driver.send("stop").await?;
                drain_to_bestmove(driver).await?;
                return finish(by_depth, &completed);
            }
            line = driver.recv_line() => {
                let Some(line) = line else {
                    return Err(Report::from(CoreError::EngineProtocolViolation {
                        raw_line: String::new(),
                        reason: "engine stdout closed mid-analysis".to_string(),
                    }));
                };

                if line.starts_with("bestmove") {
                    // An unsolicited bestmove (the engine errored, or the
                    // position had no legal moves) ends the search; we
                    // don't escalate this to a protocol violation.
                    return finish(by_depth, &completed);
                }

                let Some(ev) = crate::engine::info::parse_info_line(&line) else { continue };
                if ev.pv.is_empty() {
                    continue;
                }

                let depth = ev.depth;
                let slot = by_depth.entry(depth).or_default();
                let supersedes = slot.get(&ev.multipv).map(|prev| ev.nodes >= prev.nodes).unwrap_or(true);
                if supersedes {
                    slot.insert(ev.multipv, ev);
                }

                let depth_complete = by_depth.get(&depth).map(|m| m.len() as u32 == required).unwrap_or(false);
                if depth_complete && !completed.contains(&depth) {
                    completed.push(depth);
                    completed.sort_unstable();

                    if stop_predicate(&by_depth, &completed, config, start.elapsed()) {
                        driver.send("stop").await?;
                        drain_to_bestmove(driver).await?;
                        return finish(by_depth, &completed);
                    }
                }
            }
        }
    }
}

async fn drain_to_bestmove(driver: &mut EngineDriver) -> Result<(), Report> {
    loop {
        let Some(line) = driver.recv_line().await else {
            return Err(Report::from(CoreError::EngineProtocolViolation {
                raw_line: String::new(),
                reason: "engine stdout closed while draining to bestmove".to_string(),
            }));
        };
        if line.starts_with("bestmove") {
            return Ok(());
        }
    }
}

fn top_move_at(by_depth: &BTreeMap<u32, DepthRecords>, depth: u32) -> Option<&str> {
    by_depth.get(&depth)?.get(&1)?.first_move()
}

fn stop_predicate(
    by_depth: &BTreeMap<u32, DepthRecords>,
    completed: &[u32],
    config: &AnalysisConfig,
    elapsed: Duration,
) -> bool {
    let Some(&depth) = completed.last() else { return false };
    if depth < config.min_depth || elapsed < config.min_time {
        return false;
    }
    let top_nodes = by_depth.get(&depth).and_then(|m| m.get(&1)).map(|e| e.nodes).unwrap_or(0);
    if top_nodes < config.min_nodes {
        return false;
    }

    let window = config.depth_delta.max(1) as usize;
    if completed.len() < window {
        return false;
    }
    let recent = &completed[completed.len() - window..];
    let Some(reference) = top_move_at(by_depth, recent[0]) else { return false };
    recent.iter().all(|&d| top_move_at(by_depth, d) == Some(reference))
}

/// Shape the collected records into an [`AnalysisOutcome`], applying the
/// degenerate-depth-discard rule: if the deepest completed depth carries
/// fewer records than the depth before it, that deepest depth is a
/// straggler and the prior one is returned instead.
fn finish(mut by_depth: BTreeMap<u32, DepthRecords>, completed: &[u32]) -> Result<AnalysisOutcome, Report> {
    let Some(&deepest_completed) = completed.last() else {
        return Err(Report::<CoreError>::from(CoreError::EngineProtocolViolation {
            raw_line: String::new(),
            reason: "bestmove received before any depth completed".to_string(),
        }).into());
    };

    // The highest key in `by_depth` may be an incomplete straggler depth
    // that the engine started but never finished before `bestmove` —
    // that's the "deepest depth" the degenerate-discard rule refers to
    // when it outruns `completed`.
    let max_key = by_depth.keys().next_back().copied().unwrap_or(deepest_completed);
    let (deepest, prior) = if max_key != deepest_completed {
        (max_key, deepest_completed)
    } else if completed.len() >= 2 {
        (completed[completed.len() - 1], completed[completed.len() - 2])
    } else {
        (deepest_completed, deepest_completed)
    };

    let deepest_count = by_depth.get(&deepest).map(|m| m.len()).unwrap_or(0);
    let prior_count = by_depth.get(&prior).map(|m| m.len()).unwrap_or(0);
    let final_depth = if deepest_count < prior_count { prior } else { deepest };

    let records = by_depth
        .remove(&final_depth)
        .ok_or_else(|| -> Report {
            Report::<CoreError>::from(CoreError::EngineProtocolViolation {
                raw_line: String::new(),
                reason: "selected depth had no records".to_string(),
            }).into()
        })?
        .into_values()
        .collect();

    Ok(AnalysisOutcome {
        depth: final_depth,
        records,
    })
}

/// Write one candidate record per PV of `outcome` into `book`, stamping
/// `engine_id` and the current timestamp.
pub fn persist(
    book: &mut Book,
    board: &Board,
    outcome: &AnalysisOutcome,
    engine_id: &str,
    timestamp: i64,
) -> Result<(), CoreError> {
    let fen_key = board.fen_key();
    let sign = board.side_to_move().sign();

    let mut candidates = Vec::new();
    for ev in &outcome.records {
        let Some(first_uci) = ev.first_move() else { continue };
        let mv = crate::board::Move::from_uci(first_uci).ok_or_else(|| CoreError::IllegalMove {
            fen: board.to_fen(),
            uci: first_uci.to_string(),
        })?;
        let san = board.uci_to_san(mv)?;

        let (centipawns, mate) = match ev.score {
            Some(Score::Centipawns(cp)) => (Some(cp * sign), None),
            Some(Score::MateIn(m)) => (None, Some(m * sign)),
            None => (None, None),
        };

        candidates.push(CandidateMove {
            san,
            weight: None,
            centipawns,
            mate,
            timestamp,
            engine: EngineBlock {
                id: engine_id.to_string(),
                log: vec![EngineLogLine {
                    depth: ev.depth,
                    seldepth: ev.seldepth,
                    multipv: ev.multipv,
                    centipawns: match ev.score {
                        Some(Score::Centipawns(cp)) => Some(cp),
                        _ => None,
                    },
                    mate: match ev.score {
                        Some(Score::MateIn(m)) => Some(m),
                        _ => None,
                    },
                    nodes: ev.nodes,
                    tb_hits: ev.tb_hits,
                    time_ms: ev.time_ms,
                    pv: ev.pv.clone(),
                }],
            },
        });
    }

    book.add(&fen_key, candidates);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(depth: u32, multipv: u32, first: &str, nodes: u64) -> EvaluationLine {
        EvaluationLine {
            depth,
            seldepth: depth,
            multipv,
            score: Some(Score::Centipawns(10)),
            nodes,
            nps: 0,
            tb_hits: 0,
            time_ms: 0,
            upperbound: false,
            lowerbound: false,
            pv: vec![first.to_string()],
        }
    }

    #[test]
    fn stop_predicate_requires_stable_window_and_floors() {
        let mut by_depth: BTreeMap<u32, DepthRecords> = BTreeMap::new();
        for d in 18..=22 {
            let mut slot = DepthRecords::new();
            slot.insert(1, record(d, 1, "e2e4", 1000));
            by_depth.insert(d, slot);
        }
        let config = AnalysisConfig {
            min_depth: 20,
            max_depth: 40,
            min_time: Duration::from_secs(0),
            max_time: Duration::from_secs(10),
            depth_delta: 3,
            multipv: 1,
            min_nodes: 0,
        };

        assert!(!stop_predicate(&by_depth, &[18, 19], &config, Duration::ZERO));
        assert!(stop_predicate(&by_depth, &[18, 19, 20, 21, 22], &config, Duration::ZERO));
    }

    #[test]
    fn stop_predicate_false_when_top_move_changes() {
        let mut by_depth: BTreeMap<u32, DepthRecords> = BTreeMap::new();
        by_depth.insert(20, {
            let mut m = DepthRecords::new();
            m.insert(1, record(20, 1, "e2e4", 1000));
            m
        });
        by_depth.insert(21, {
            let mut m = DepthRecords::new();
            m.insert(1, record(21, 1, "d2d4", 1000));
            m
        });
        by_depth.insert(22, {
            let mut m = DepthRecords::new();
            m.insert(1, record(22, 1, "d2d4", 1000));
            m
        });
        let config = AnalysisConfig {
            min_depth: 20,
            max_depth: 40,
            min_time: Duration::from_secs(0),
            max_time: Duration::from_secs(10),
            depth_delta: 3,
            multipv: 1,
            min_nodes: 0,
        };
        assert!(!stop_predicate(&by_depth, &[20, 21, 22], &config, Duration::ZERO));
    }

    #[test]
    fn degenerate_depth_with_fewer_records_is_discarded() {
        let mut by_depth: BTreeMap<u32, DepthRecords> = BTreeMap::new();
        let mut full = DepthRecords::new();
        full.insert(1, record(20, 1, "e2e4", 1000));
        full.insert(2, record(20, 2, "d2d4", 900));
        by_depth.insert(20, full);

        let mut partial = DepthRecords::new();
        partial.insert(1, record(21, 1, "e2e4", 1000));
        by_depth.insert(21, partial);

        let outcome = finish(by_depth, &[20, 21]).unwrap();
        assert_eq!(outcome.depth, 20);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn analyze_converges_against_a_stub_engine() {
        use crate::config::EngineConfig;
        use crate::engine::test_support::stub_engine_script;

        let script = stub_engine_script();
        let engine_config = EngineConfig {
            engine_binary: script.to_string_lossy().to_string(),
            ..EngineConfig::default()
        };
        let mut driver = EngineDriver::spawn(&engine_config).await.expect("handshake should succeed");

        let analysis_config = AnalysisConfig {
            min_depth: 1,
            max_depth: 1,
            min_time: Duration::ZERO,
            max_time: Duration::from_secs(5),
            depth_delta: 1,
            multipv: 1,
            min_nodes: 0,
        };

        let board = Board::starting_position();
        let outcome = analyze(&mut driver, &board, &analysis_config, None)
            .await
            .expect("analysis should converge");

        assert_eq!(outcome.depth, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].first_move(), Some("e2e4"));

        driver.shutdown().await.expect("shutdown should succeed");
        let _ = std::fs::remove_file(&script);
    }
}
