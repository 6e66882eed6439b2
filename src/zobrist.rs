//! Zobrist hashing for chess positions.
//!
//! One flat table of 837 statistically independent 64-bit values:
//! 12 x 64 piece-squares, 64 en-passant target squares, one
//! black-to-move entry and 4 castling rights. The table is seeded
//! once per process and immutable afterwards.

use once_cell::sync::Lazy;
use rand::prelude::*;

pub const ZOBRIST_PIECES: usize = 0;
pub const ZOBRIST_ENPASSANT: usize = 768;
pub const ZOBRIST_BLACK_MOVE: usize = 832;
pub const ZOBRIST_CASTLING: usize = 833;

/// pieces + en-passant + black-to-move + castling
pub const ZOBRIST_TABLE_SIZE: usize = 64 * 12 + 64 + 1 + 4;

pub static ZOBRIST: Lazy<[u64; ZOBRIST_TABLE_SIZE]> = Lazy::new(|| {
    // Fixed seed keeps hashes reproducible within and across runs.
    let mut rng = StdRng::seed_from_u64(0x5715_2000_u64);
    let mut table = [0u64; ZOBRIST_TABLE_SIZE];
    for entry in &mut table {
        *entry = rng.gen();
    }
    table
});

/// Key for a piece-board index occupying a square.
#[inline]
#[must_use]
pub fn piece_square_key(board: usize, square: usize) -> u64 {
    ZOBRIST[ZOBRIST_PIECES + 64 * board + square]
}

/// Key for an en-passant target square.
#[inline]
#[must_use]
pub fn enpassant_key(square: usize) -> u64 {
    ZOBRIST[ZOBRIST_ENPASSANT + square]
}

#[inline]
#[must_use]
pub fn black_to_move_key() -> u64 {
    ZOBRIST[ZOBRIST_BLACK_MOVE]
}

/// Key for a castling right (0..4).
#[inline]
#[must_use]
pub fn castling_key(right: usize) -> u64 {
    ZOBRIST[ZOBRIST_CASTLING + right]
}
