//! Search engine: negamax alpha-beta with iterative deepening,
//! transposition table, quiescence and cooperative time management.

mod negamax;
mod ordering;
mod time;
mod tt;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::board::LanMove;

pub use negamax::Searcher;
pub use ordering::order_and_filter;
pub use time::{SearchParams, TimeManager};
pub use tt::{TranspositionTable, TtEntry};

/// Score for delivering checkmate at the root. Mate scores are encoded
/// as `CHECKMATE - plies`, so shorter mates compare higher.
pub const CHECKMATE: i32 = 100_000;

/// Ordinary evaluations are clamped inside this bound; it stays below
/// `CHECKMATE` by more than the maximum search depth so mate scores
/// and evaluations can never collide.
pub const MAX_EVAL: i32 = 99_000;

/// Scores beyond this are mate scores.
pub const MATE_THRESHOLD: i32 = CHECKMATE - 256;

/// The time manager is polled every this many nodes.
pub const HEARTBEAT_NODES: u64 = 100_000;

/// Default transposition table size in megabytes.
pub const DEFAULT_TT_MB: usize = 64;

/// One completed iteration's report for the UCI `info` line.
#[derive(Clone, Debug)]
pub struct SearchReport {
    pub depth: u32,
    pub score: i32,
    pub nodes: u64,
    pub nps: u64,
    pub pv: String,
}

/// Shared result area between the search worker and the UCI loop.
/// All access goes through one mutex.
#[derive(Default)]
pub struct SearchOutput {
    pub reports: Vec<SearchReport>,
    pub finished: bool,
    pub best_move: Option<LanMove>,
}

/// Handle to a shared output area.
pub type SharedOutput = Arc<Mutex<SearchOutput>>;

#[must_use]
pub fn new_shared_output() -> SharedOutput {
    Arc::new(Mutex::new(SearchOutput::default()))
}

/// Render a score the way the UCI `info` line wants it: centipawns, or
/// moves-to-mate once the score leaves the evaluation range.
#[must_use]
pub fn format_score(score: i32) -> String {
    if score > MATE_THRESHOLD {
        format!("mate {}", (CHECKMATE - score + 1) / 2)
    } else if score < -MATE_THRESHOLD {
        format!("mate -{}", (CHECKMATE + score + 1) / 2)
    } else {
        format!("cp {score}")
    }
}

/// Convert a score at `ply` into its TT form: mate scores are stored
/// relative to the node, not the root.
#[inline]
#[must_use]
pub(crate) fn score_to_tt(score: i32, ply: i32) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply
    } else if score < -MATE_THRESHOLD {
        score - ply
    } else {
        score
    }
}

/// Inverse of `score_to_tt` for a probe at `ply`.
#[inline]
#[must_use]
pub(crate) fn score_from_tt(score: i32, ply: i32) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply
    } else if score < -MATE_THRESHOLD {
        score + ply
    } else {
        score
    }
}
