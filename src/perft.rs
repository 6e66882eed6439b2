//! Perft and Zobrist-consistency walkers, driven by `go perft N` and
//! `go zobrist N`.

use std::fmt::Write;
use std::time::Instant;

use crate::board::{MoveList, Position};

/// Count leaf nodes of the legal move tree to `depth`.
#[must_use]
pub fn perft(pos: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let mut pseudo = MoveList::new();
    let mut pos = pos.clone();
    pos.board.generate_pseudo_moves(&mut pseudo);

    let mut count = 0;
    for &mv in &pseudo {
        let mut next = pos.clone();
        next.apply_in_place(mv);
        if !next.board.is_legal() {
            continue;
        }
        count += if depth == 1 { 1 } else { perft(&next, depth - 1) };
    }
    count
}

/// Perft divide: per-root-move counts plus a total, formatted for the
/// console.
#[must_use]
pub fn perft_divide(pos: &Position, depth: u32) -> String {
    let start = Instant::now();
    let mut out = String::new();
    let mut total = 0u64;

    let mut root = pos.clone();
    let mut pseudo = MoveList::new();
    root.board.generate_pseudo_moves(&mut pseudo);

    for &mv in &pseudo {
        let mut next = root.clone();
        next.apply_in_place(mv);
        if !next.board.is_legal() {
            continue;
        }
        let count = if depth == 0 {
            1
        } else {
            perft(&next, depth.saturating_sub(1))
        };
        total += count;
        let _ = writeln!(out, "{mv}: {count}");
    }

    let elapsed = start.elapsed();
    let _ = writeln!(out, "Total: {total}");
    let _ = writeln!(out, "Time: {} ms", elapsed.as_millis());
    out
}

/// Walk the legal move tree to `depth`, checking at every node that the
/// incrementally maintained hash equals a from-scratch recompute.
/// Returns the number of positions checked, or the FEN of the first
/// mismatching position.
pub fn zobrist_walk(pos: &Position, depth: u32) -> Result<u64, String> {
    let mut pos = pos.clone();
    if pos.board.hash() != pos.board.hash_from_scratch() {
        return Err(pos.to_fen());
    }

    if depth == 0 {
        return Ok(1);
    }

    let mut pseudo = MoveList::new();
    pos.board.generate_pseudo_moves(&mut pseudo);

    let mut checked = 1;
    for &mv in &pseudo {
        let mut next = pos.clone();
        next.apply_in_place(mv);
        if !next.board.is_legal() {
            continue;
        }
        checked += zobrist_walk(&next, depth - 1)?;
    }
    Ok(checked)
}
