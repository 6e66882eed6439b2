//! UCI command tokenizing and parameter parsing.

use crate::board::LanMove;
use crate::search::SearchParams;

#[derive(Debug, Clone)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    Position(Vec<String>),
    Go(Vec<String>),
    Stop,
    Quit,
    /// `d [moves]` - pretty-print the board, optionally with legal moves
    Display {
        moves: bool,
    },
    /// `movelist` - print the legal moves on their own
    MoveList,
    Unknown(String),
}

/// What a `go` command asks for: a test driver or a real search.
#[derive(Debug, Clone)]
pub enum GoRequest {
    Perft(u32),
    Zobrist(u32),
    Search(SearchParams),
}

#[must_use]
pub fn parse_uci_command(line: &str) -> Option<UciCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split_whitespace().collect();

    let owned_rest = || parts.iter().map(|p| (*p).to_string()).collect::<Vec<String>>();

    let cmd = match parts[0] {
        "uci" => UciCommand::Uci,
        "isready" => UciCommand::IsReady,
        "ucinewgame" => UciCommand::UciNewGame,
        "position" => UciCommand::Position(owned_rest()),
        "go" => UciCommand::Go(owned_rest()),
        "stop" => UciCommand::Stop,
        "quit" => UciCommand::Quit,
        "d" => UciCommand::Display {
            moves: parts.get(1).copied() == Some("moves"),
        },
        "movelist" => UciCommand::MoveList,
        _ => UciCommand::Unknown(trimmed.to_string()),
    };

    Some(cmd)
}

/// Parse the next token as an integer parameter value.
#[inline]
fn parse_next<T: std::str::FromStr>(parts: &[&str], i: usize) -> Option<T> {
    parts.get(i + 1).and_then(|v| v.parse::<T>().ok())
}

/// Parse everything after the `go` keyword.
///
/// `parts` includes the leading "go". Unknown tokens are logged and
/// skipped; the engine stays responsive on malformed input.
#[must_use]
pub fn parse_go_request(parts: &[&str]) -> GoRequest {
    if let Some(&sub) = parts.get(1) {
        if sub == "perft" || sub == "zobrist" {
            let depth = parse_next::<u32>(parts, 1).unwrap_or(1).max(1);
            return if sub == "perft" {
                GoRequest::Perft(depth)
            } else {
                GoRequest::Zobrist(depth)
            };
        }
    }

    let mut params = SearchParams::default();
    let mut i = 1;

    while i < parts.len() {
        let consumed = match parts[i] {
            "wtime" => {
                params.wtime = parse_next(parts, i);
                2
            }
            "btime" => {
                params.btime = parse_next(parts, i);
                2
            }
            "winc" => {
                params.winc = parse_next(parts, i);
                2
            }
            "binc" => {
                params.binc = parse_next(parts, i);
                2
            }
            "movestogo" => {
                params.movestogo = parse_next(parts, i);
                2
            }
            "depth" => {
                params.depth = parse_next(parts, i);
                2
            }
            "nodes" => {
                params.nodes = parse_next(parts, i);
                2
            }
            "mate" => {
                params.mate = parse_next(parts, i);
                2
            }
            "movetime" => {
                params.movetime = parse_next(parts, i);
                2
            }
            "infinite" => {
                params.infinite = true;
                1
            }
            "ponder" => {
                params.ponder = true;
                1
            }
            "searchmoves" => {
                // the rest of the line is a move list
                let mut consumed = 1;
                for token in &parts[i + 1..] {
                    match LanMove::parse(token) {
                        Some(mv) => params.searchmoves.push(mv),
                        None => log::warn!("ignoring bad searchmoves token: {token}"),
                    }
                    consumed += 1;
                }
                consumed
            }
            other => {
                log::warn!("unknown go parameter: {other}");
                1
            }
        };
        i += consumed;
    }

    GoRequest::Search(params)
}
