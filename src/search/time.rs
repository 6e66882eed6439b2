//! Search parameters and the time manager.

use std::time::Instant;

use crate::board::{LanMove, Side};

/// Everything a `go` command can carry.
#[derive(Clone, Debug, Default)]
pub struct SearchParams {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u64>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub mate: Option<u32>,
    pub movetime: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
    pub searchmoves: Vec<LanMove>,
}

/// Fraction of the opening (in full moves) over which the budget ramps
/// up to its normal value.
const OPENING_FULL_MOVES: f64 = 8.0;
const MIN_OPENING_FACTOR: f64 = 0.33;
/// Reserve for I/O latency, subtracted from each move's budget.
const MOVE_OVERHEAD_MS: f64 = 500.0;
const BUDGET_FRACTION: f64 = 0.8;

/// Decides when a running search must stop. Polled from the search on
/// node-count heartbeats and before each new iteration.
pub struct TimeManager {
    start: Instant,
    params: SearchParams,
}

impl TimeManager {
    #[must_use]
    pub fn new(params: SearchParams) -> Self {
        TimeManager {
            start: Instant::now(),
            params,
        }
    }

    #[must_use]
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Evaluate the stopping rule for the current state of the search.
    #[must_use]
    pub fn must_stop(
        &self,
        iterative_depth: u32,
        nodes: u64,
        side: Side,
        full_moves_count: u16,
    ) -> bool {
        if self.params.infinite {
            return false;
        }

        if let Some(depth) = self.params.depth {
            if iterative_depth > depth {
                return true;
            }
        }

        if let Some(node_limit) = self.params.nodes {
            if nodes >= node_limit {
                return true;
            }
        }

        let total_ms = self.elapsed_ms();

        if let Some(movetime) = self.params.movetime {
            if total_ms >= movetime {
                return true;
            }
        }

        let (remaining, increment) = match side {
            Side::White => (self.params.wtime, self.params.winc),
            Side::Black => (self.params.btime, self.params.binc),
        };

        if let Some(remaining) = remaining {
            let increment = increment.unwrap_or(0) as f64;
            let moves = match self.params.movestogo {
                Some(m) if m > 0 => m,
                _ => {
                    // sudden death: assume the game shortens as it ages
                    (40u64).saturating_sub(u64::from(full_moves_count)).max(20)
                }
            } as f64;

            let available = remaining as f64 + increment * moves;
            let limit = available / moves;

            let opening_factor = (f64::from(full_moves_count) / OPENING_FULL_MOVES)
                .clamp(MIN_OPENING_FACTOR, 1.0);

            let budget = BUDGET_FRACTION * (limit * opening_factor - MOVE_OVERHEAD_MS);

            if total_ms as f64 > budget {
                return true;
            }
        }

        false
    }
}
