//! Negamax alpha-beta with iterative deepening and quiescence.

use std::sync::Arc;
use std::time::Instant;

use crate::board::{LanMove, Move, MoveList, Position, Side};
use crate::nnue::{AccumulatorStack, Network, ACCUMULATOR_MAX_DEPTH};
use crate::sync::StopFlag;

use super::{
    format_score, order_and_filter, score_from_tt, score_to_tt, SearchParams, SearchReport,
    SharedOutput, TimeManager, TranspositionTable, CHECKMATE, DEFAULT_TT_MB, HEARTBEAT_NODES,
    MAX_EVAL,
};

/// Iterative deepening never goes past this depth; quiescence needs the
/// remaining accumulator plies for its capture chains.
const MAX_ITERATIVE_DEPTH: u32 = 32;

/// One search worker. Owns its transposition table, accumulator stack
/// and root position; the only shared state is the stop flag and the
/// mutex-guarded output area.
pub struct Searcher {
    root: Position,
    root_side: Side,
    root_full_moves: u16,
    root_moves: Vec<LanMove>,
    tt: TranspositionTable,
    accumulators: AccumulatorStack,
    time: TimeManager,
    stop: StopFlag,
    output: SharedOutput,
    iterative_depth: u32,
    /// nodes searched in the current iteration
    nodes: u64,
    /// nodes searched in previous iterations
    prev_nodes: u64,
    last_report: Instant,
}

impl Searcher {
    #[must_use]
    pub fn new(
        root: Position,
        net: Arc<Network>,
        params: SearchParams,
        stop: StopFlag,
        output: SharedOutput,
    ) -> Self {
        let root_side = root.board.side_to_move();
        let root_full_moves = root.full_moves_count;
        let root_moves = params.searchmoves.clone();
        Searcher {
            root,
            root_side,
            root_full_moves,
            root_moves,
            tt: TranspositionTable::new(DEFAULT_TT_MB),
            accumulators: AccumulatorStack::new(net),
            time: TimeManager::new(params),
            stop,
            output,
            iterative_depth: 0,
            nodes: 0,
            prev_nodes: 0,
            last_report: Instant::now(),
        }
    }

    /// Run iterative deepening until a limit fires, then publish the
    /// best move of the deepest completed iteration.
    pub fn run(mut self) {
        self.tt.clear();
        self.accumulators.init_root(self.root.board.bitboards());
        self.last_report = Instant::now();

        // a terminal root has nothing to report
        if self.root.clone().legal_moves().is_empty() {
            let mut out = self.output.lock();
            out.finished = true;
            return;
        }

        let mut best: Option<LanMove> = None;

        for depth in 1..=MAX_ITERATIVE_DEPTH {
            self.iterative_depth = depth;

            if self.stop.is_stopped()
                || self
                    .time
                    .must_stop(depth, self.total_nodes(), self.root_side, self.root_full_moves)
            {
                break;
            }

            let mut root = self.root.clone();
            let score = self.search(&mut root, 0, -CHECKMATE, CHECKMATE);

            if self.stop.is_stopped() {
                // incomplete iteration: its scores are not trustworthy
                break;
            }

            if let Some(pv) = self
                .tt
                .probe(self.root.board.hash())
                .and_then(|entry| entry.pv())
            {
                best = Some(pv.to_lan());
            }

            self.report_iteration(depth, score);

            if score.abs() >= CHECKMATE {
                break;
            }
        }

        // an infinite search holds its bestmove until the GUI says stop
        while self.time.params().infinite && !self.stop.is_stopped() {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        let mut out = self.output.lock();
        out.best_move = best;
        out.finished = true;
    }

    fn total_nodes(&self) -> u64 {
        self.prev_nodes + self.nodes
    }

    /// Count a node and poll the time manager on the heartbeat.
    fn tick_node(&mut self) {
        self.nodes += 1;
        if self.total_nodes() % HEARTBEAT_NODES == 0
            && self.time.must_stop(
                self.iterative_depth,
                self.total_nodes(),
                self.root_side,
                self.root_full_moves,
            )
        {
            self.stop.stop();
        }
    }

    fn evaluate(&mut self, pos: &mut Position, ply: usize) -> i32 {
        let side = pos.board.side_to_move();
        let occupied = pos.board.occupied();
        self.accumulators
            .forward(ply, side, occupied)
            .clamp(-MAX_EVAL, MAX_EVAL)
    }

    /// Clone `pos`, apply `mv` with edit recording pointed at the child
    /// ply, and hand back the child position.
    fn make_child(&mut self, pos: &Position, mv: Move, child_ply: usize) -> Position {
        let mut child = pos.clone();
        child.board.start_recording();
        child.apply_in_place(mv);
        self.accumulators.record(child_ply, child.board.take_edits());
        child
    }

    fn search(&mut self, pos: &mut Position, ply: usize, mut alpha: i32, beta: i32) -> i32 {
        let remaining_depth = self.iterative_depth as i32 - ply as i32;
        let hash = pos.board.hash();

        let mut pv_hint: Option<LanMove> = None;
        if let Some(entry) = self.tt.probe(hash) {
            if entry.known_depth() >= remaining_depth {
                return score_from_tt(entry.score(), ply as i32);
            }
            pv_hint = entry.pv().map(Move::to_lan);
        }

        if ply as u32 >= self.iterative_depth {
            return self.quiescence(pos, ply, alpha, beta);
        }

        self.tick_node();
        if self.stop.is_stopped() {
            return alpha;
        }

        let in_check = pos.board.has_check(pos.board.side_to_move());

        let mut moves = MoveList::new();
        pos.board.generate_pseudo_moves(&mut moves);
        order_and_filter(&mut moves, pv_hint, false);

        let mut best_score = -CHECKMATE + ply as i32;
        let mut best_move: Option<Move> = None;
        let root_filtered = ply == 0 && !self.root_moves.is_empty();

        for i in 0..moves.len() {
            if self.stop.is_stopped() {
                break;
            }
            let mv = moves[i];

            if root_filtered && !self.root_moves.iter().any(|lan| mv.matches_lan(*lan)) {
                continue;
            }

            let mut child = self.make_child(pos, mv, ply + 1);
            if !child.board.is_legal() {
                continue;
            }

            if best_move.is_none() {
                best_move = Some(mv); // first legal move as a fallback
            }

            let score = -self.search(&mut child, ply + 1, -beta, -alpha);

            if score >= beta {
                return score;
            }
            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            if score > alpha {
                alpha = score;
            }
        }

        if self.stop.is_stopped() {
            return alpha;
        }

        if best_move.is_none() {
            if root_filtered {
                // every listed root move was illegal; not a terminal node
                return alpha;
            }
            if !in_check {
                best_score = 0; // stalemate
            }
        }

        self.tt.store(
            hash,
            best_move,
            score_to_tt(best_score, ply as i32),
            remaining_depth,
        );
        best_score
    }

    /// Capture-only extension of the search; evaluates with the NNUE
    /// stand-pat and never touches the transposition table.
    fn quiescence(&mut self, pos: &mut Position, ply: usize, mut alpha: i32, beta: i32) -> i32 {
        self.tick_node();
        if self.stop.is_stopped() {
            return alpha;
        }

        let stand_pat = self.evaluate(pos, ply);
        if stand_pat >= beta {
            return stand_pat;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        if ply + 1 >= ACCUMULATOR_MAX_DEPTH {
            return alpha;
        }

        let mut moves = MoveList::new();
        pos.board.generate_pseudo_moves(&mut moves);
        order_and_filter(&mut moves, None, true);

        for i in 0..moves.len() {
            if self.stop.is_stopped() {
                break;
            }
            let mv = moves[i];

            let mut child = self.make_child(pos, mv, ply + 1);
            if !child.board.is_legal() {
                continue;
            }

            let score = -self.quiescence(&mut child, ply + 1, -beta, -alpha);

            if score >= beta {
                return score;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }

    /// Reconstruct the principal variation by walking TT pv links from
    /// the root; a visited-hash list guards against transposition
    /// cycles.
    fn pv_line(&mut self) -> String {
        let mut pos = self.root.clone();
        let mut seen: Vec<u64> = Vec::new();
        let mut line: Vec<String> = Vec::new();

        loop {
            let hash = pos.board.hash();
            if seen.contains(&hash) {
                break;
            }
            seen.push(hash);

            let Some(mv) = self.tt.probe(hash).and_then(|entry| entry.pv()) else {
                break;
            };

            // the entry's move must still make sense for this position
            let mut generated = MoveList::new();
            pos.board.generate_pseudo_moves(&mut generated);
            if !generated.iter().any(|m| *m == mv) {
                break;
            }

            let mut next = pos.clone();
            next.apply_in_place(mv);
            if !next.board.is_legal() {
                break;
            }

            line.push(mv.to_string());
            pos = next;
        }

        line.join(" ")
    }

    fn report_iteration(&mut self, depth: u32, score: i32) {
        let now = Instant::now();
        let seconds = now.duration_since(self.last_report).as_secs_f64();
        self.last_report = now;

        let nps = if seconds > 0.0 {
            (self.nodes as f64 / seconds) as u64
        } else {
            0
        };

        self.prev_nodes += self.nodes;
        self.nodes = 0;

        let report = SearchReport {
            depth,
            score,
            nodes: self.prev_nodes,
            nps,
            pv: self.pv_line(),
        };
        log::debug!(
            "depth {} score {} nodes {}",
            depth,
            format_score(score),
            report.nodes
        );
        self.output.lock().reports.push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::new_shared_output;

    fn run_search(fen: &str, params: SearchParams) -> (Option<LanMove>, Vec<SearchReport>) {
        let root = Position::from_fen(fen);
        let output = new_shared_output();
        let searcher = Searcher::new(
            root,
            Arc::new(Network::zeroed()),
            params,
            StopFlag::new(),
            Arc::clone(&output),
        );
        searcher.run();
        let out = output.lock();
        assert!(out.finished);
        (out.best_move, out.reports.clone())
    }

    #[test]
    fn finds_back_rank_mate_in_one() {
        let (best, reports) = run_search(
            "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
            SearchParams {
                depth: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(best.unwrap().to_string(), "a1a8");
        let last = reports.last().expect("at least one iteration");
        assert_eq!(format_score(last.score), "mate 1");
        assert!(last.pv.starts_with("a1a8"));
    }

    #[test]
    fn checkmated_root_reports_no_move() {
        // fool's mate final position, white to move is already mated
        let (best, reports) = run_search(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
            SearchParams {
                depth: Some(3),
                ..Default::default()
            },
        );
        assert!(best.is_none());
        assert!(reports.is_empty());
    }

    #[test]
    fn stalemate_root_reports_no_move() {
        let (best, _) = run_search(
            "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1",
            SearchParams {
                depth: Some(3),
                ..Default::default()
            },
        );
        assert!(best.is_none());
    }

    #[test]
    fn depth_limit_bounds_iterations() {
        let (_, reports) = run_search(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            SearchParams {
                depth: Some(2),
                ..Default::default()
            },
        );
        assert!(!reports.is_empty());
        assert!(reports.iter().all(|r| r.depth <= 2));
        assert_eq!(reports.last().unwrap().depth, 2);
    }

    #[test]
    fn searchmoves_restricts_the_root_choice() {
        let only = LanMove::parse("g1f3").unwrap();
        let (best, _) = run_search(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            SearchParams {
                depth: Some(2),
                searchmoves: vec![only],
                ..Default::default()
            },
        );
        assert_eq!(best.unwrap(), only);
    }

    #[test]
    fn stopped_search_before_any_iteration_has_no_best_move() {
        let root = Position::startpos();
        let output = new_shared_output();
        let stop = StopFlag::new();
        stop.stop();
        Searcher::new(
            root,
            Arc::new(Network::zeroed()),
            SearchParams::default(),
            stop,
            Arc::clone(&output),
        )
        .run();
        let out = output.lock();
        assert!(out.finished);
        assert!(out.best_move.is_none());
        assert!(out.reports.is_empty());
    }
}
