//! UCI front-end: command loop, game history and search orchestration.
//!
//! The loop owns the game as a vector of positions; each search worker
//! gets a clone of the current one. At most one search runs at a time,
//! and its results come back through the mutex-guarded output area.

pub mod command;

use std::fmt;
use std::io::{self, BufRead};
use std::ops::ControlFlow;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::board::{LanMove, MoveList, Position};
use crate::nnue::Network;
use crate::perft::{perft_divide, zobrist_walk};
use crate::search::{
    format_score, new_shared_output, SearchOutput, Searcher, SharedOutput,
};
use crate::sync::StopFlag;

use command::{parse_go_request, parse_uci_command, GoRequest, UciCommand};

const ENGINE_NAME: &str = "Hyperbola";

/// Error type for UCI position command parsing
#[derive(Debug, Clone)]
pub enum UciError {
    /// Missing required parts in the command
    MissingParts,
    /// A move token was not valid LAN notation
    BadMoveToken { token: String },
    /// The move does not exist or is illegal in the current position
    IllegalMove { mv: LanMove },
}

impl fmt::Display for UciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciError::MissingParts => {
                write!(f, "missing required parts in position command")
            }
            UciError::BadMoveToken { token } => write!(f, "bad move token '{token}'"),
            UciError::IllegalMove { mv } => write!(f, "illegal move '{mv}'"),
        }
    }
}

impl std::error::Error for UciError {}

/// How long the loop waits for input before flushing search output.
const OUTPUT_POLL: Duration = Duration::from_millis(20);

pub struct Engine {
    history: Vec<Position>,
    net: Arc<Network>,
    output: SharedOutput,
    stop: StopFlag,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    #[must_use]
    pub fn new(net: Arc<Network>) -> Self {
        Engine {
            history: vec![Position::startpos()],
            net,
            output: new_shared_output(),
            stop: StopFlag::new(),
            worker: None,
        }
    }

    fn current(&self) -> &Position {
        self.history.last().expect("history never empty")
    }

    fn is_searching(&self) -> bool {
        self.worker.is_some()
    }

    /// Print queued info lines; when the worker has finished, reap it
    /// and emit the final bestmove (if any iteration completed).
    pub fn drain_output(&mut self) {
        let (reports, finished, best) = {
            let mut out = self.output.lock();
            let reports: Vec<_> = out.reports.drain(..).collect();
            let finished = out.finished;
            let best = out.best_move.take();
            if finished {
                out.finished = false;
            }
            (reports, finished, best)
        };

        for r in reports {
            if r.pv.is_empty() {
                println!(
                    "info depth {} score {} nodes {} nps {}",
                    r.depth,
                    format_score(r.score),
                    r.nodes,
                    r.nps
                );
            } else {
                println!(
                    "info depth {} score {} nodes {} nps {} pv {}",
                    r.depth,
                    format_score(r.score),
                    r.nodes,
                    r.nps,
                    r.pv
                );
            }
        }

        if finished {
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
            if let Some(best) = best {
                println!("bestmove {best}");
            }
        }
    }

    /// Abort any running search and discard its pending output.
    fn abort_search(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        *self.output.lock() = SearchOutput::default();
        self.stop.reset();
    }

    /// Handle one input line. `Break` means quit.
    pub fn handle_line(&mut self, line: &str) -> ControlFlow<()> {
        self.drain_output();

        let Some(cmd) = parse_uci_command(line) else {
            return ControlFlow::Continue(());
        };

        match cmd {
            UciCommand::Uci => {
                println!("id name {} {}", ENGINE_NAME, env!("CARGO_PKG_VERSION"));
                println!("id author the {ENGINE_NAME} authors");
                println!("uciok");
            }
            UciCommand::IsReady => println!("readyok"),
            UciCommand::UciNewGame => {
                self.abort_search();
                self.history = vec![Position::startpos()];
            }
            UciCommand::Position(parts) => self.handle_position(&parts),
            UciCommand::Go(parts) => self.handle_go(&parts),
            UciCommand::Stop => self.stop.stop(),
            UciCommand::Quit => {
                // flush the aborted search's partial results before exit
                self.stop.stop();
                if let Some(handle) = self.worker.take() {
                    let _ = handle.join();
                }
                self.drain_output();
                return ControlFlow::Break(());
            }
            UciCommand::Display { moves } => {
                print!("{}", self.current().clone().render(moves));
            }
            UciCommand::MoveList => {
                let mut pos = self.current().clone();
                let legal = pos.legal_moves();
                println!("Legal moves: ({})", legal.len());
                for mv in &legal {
                    println!("{mv}");
                }
            }
            UciCommand::Unknown(text) => {
                log::warn!("unknown command: {text}");
                println!("info string unknown command: {text}");
            }
        }

        ControlFlow::Continue(())
    }

    /// Parse a position command, logging and discarding bad input; the
    /// engine stays responsive either way.
    fn handle_position(&mut self, parts: &[String]) {
        if let Err(err) = self.try_handle_position(parts) {
            log::warn!("position: {err}");
        }
    }

    /// Parse a position command, returning an error on failure.
    ///
    /// Supports `position startpos` and `position fen <fields>`,
    /// optionally followed by `moves <move1> <move2> ...`. Moves up to
    /// the first failing token are kept.
    fn try_handle_position(&mut self, parts: &[String]) -> Result<(), UciError> {
        let mut i = 1;

        match parts.get(i).map(String::as_str) {
            Some("startpos") => {
                self.history = vec![Position::startpos()];
                i += 1;
            }
            Some("fen") => {
                i += 1;
                let mut fen_tokens: Vec<&str> = Vec::new();
                while i < parts.len() && parts[i] != "moves" {
                    fen_tokens.push(parts[i].as_str());
                    i += 1;
                }
                self.history = vec![Position::from_fen_tokens(&fen_tokens)];
            }
            _ => return Err(UciError::MissingParts),
        }

        if parts.get(i).map(String::as_str) != Some("moves") {
            return Ok(());
        }
        i += 1;

        while i < parts.len() {
            let lan = LanMove::parse(&parts[i]).ok_or_else(|| UciError::BadMoveToken {
                token: parts[i].clone(),
            })?;
            self.try_move_lan(lan)?;
            i += 1;
        }

        Ok(())
    }

    /// Match a wire-format move against the current position's legal
    /// moves and push the resulting position onto the history.
    fn try_move_lan(&mut self, lan: LanMove) -> Result<(), UciError> {
        let mut current = self.current().clone();
        let mut pseudo = MoveList::new();
        current.board.generate_pseudo_moves(&mut pseudo);

        let mv = pseudo
            .iter()
            .copied()
            .find(|m| m.matches_lan(lan))
            .ok_or(UciError::IllegalMove { mv: lan })?;

        let mut next = current;
        next.apply_in_place(mv);
        if !next.board.is_legal() {
            return Err(UciError::IllegalMove { mv: lan });
        }

        self.history.push(next);
        Ok(())
    }

    fn handle_go(&mut self, parts: &[String]) {
        if self.is_searching() {
            println!("info string error: a search is already running");
            return;
        }

        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        match parse_go_request(&refs) {
            GoRequest::Perft(depth) => print!("{}", perft_divide(self.current(), depth)),
            GoRequest::Zobrist(depth) => match zobrist_walk(self.current(), depth) {
                Ok(checked) => println!("zobrist ok: {checked} positions verified"),
                Err(fen) => println!("zobrist mismatch at: {fen}"),
            },
            GoRequest::Search(params) => {
                self.stop.reset();
                *self.output.lock() = SearchOutput::default();

                let searcher = Searcher::new(
                    self.current().clone(),
                    Arc::clone(&self.net),
                    params,
                    self.stop.clone(),
                    Arc::clone(&self.output),
                );
                self.worker = Some(thread::spawn(move || searcher.run()));
            }
        }
    }

    fn shutdown(&mut self) {
        self.abort_search();
    }
}

/// Blocking UCI loop over stdin/stdout.
///
/// Input arrives through a reader thread so the loop can keep flushing
/// search output while stdin is quiet.
pub fn run(net: Arc<Network>) {
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut engine = Engine::new(net);
    println!("{} {}", ENGINE_NAME, env!("CARGO_PKG_VERSION"));

    loop {
        match rx.recv_timeout(OUTPUT_POLL) {
            Ok(line) => {
                if engine.handle_line(&line).is_break() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => engine.drain_output(),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    engine.shutdown();
}
