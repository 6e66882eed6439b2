//! Transposition table: Zobrist-keyed cache of search results.

use std::mem;

use crate::board::Move;

/// What the search learned about one position.
#[derive(Clone, Copy, Debug)]
pub struct TtEntry {
    hash: u64,
    pv: Option<Move>,
    score: i32,
    known_depth: i32,
}

impl TtEntry {
    #[inline]
    #[must_use]
    pub fn pv(&self) -> Option<Move> {
        self.pv
    }

    #[inline]
    #[must_use]
    pub fn score(&self) -> i32 {
        self.score
    }

    #[inline]
    #[must_use]
    pub fn known_depth(&self) -> i32 {
        self.known_depth
    }
}

/// Open-address table indexed by the low hash bits.
///
/// Replacement policy: a deeper-or-equal analysis of the same key
/// replaces the old entry; a colliding different key always replaces.
/// The table is cleared before every root search, so entries never
/// leak between independent searches.
pub struct TranspositionTable {
    entries: Vec<Option<TtEntry>>,
    mask: usize,
}

impl TranspositionTable {
    /// Allocate a table of roughly `size_mb` megabytes, rounded down to
    /// a power-of-two entry count for mask indexing.
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        let raw = (size_mb * 1024 * 1024) / mem::size_of::<Option<TtEntry>>();
        // an exact power of two is kept as-is; anything else rounds down
        let mut num_entries = if raw.is_power_of_two() {
            raw
        } else {
            raw.next_power_of_two() / 2
        };
        if num_entries == 0 {
            num_entries = 1024;
        }

        TranspositionTable {
            entries: vec![None; num_entries],
            mask: num_entries - 1,
        }
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    /// Look up the entry for a position, if its slot still holds it.
    #[must_use]
    pub fn probe(&self, hash: u64) -> Option<&TtEntry> {
        self.entries[self.index(hash)]
            .as_ref()
            .filter(|entry| entry.hash == hash)
    }

    /// Record a search result.
    pub fn store(&mut self, hash: u64, pv: Option<Move>, score: i32, known_depth: i32) {
        let index = self.index(hash);
        if let Some(existing) = &self.entries[index] {
            if existing.hash == hash && existing.known_depth > known_depth {
                return;
            }
        }
        self.entries[index] = Some(TtEntry {
            hash,
            pv,
            score,
            known_depth,
        });
    }

    /// Drop every entry. Called at the start of each root search.
    pub fn clear(&mut self) {
        for slot in &mut self.entries {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::board::{MoveKind, PieceBoard, Promotion};

    use super::*;

    fn dummy_move() -> Move {
        Move::new(12, 28, Promotion::None, PieceBoard::WhitePawn, MoveKind::PawnDouble, false)
    }

    #[test]
    fn store_then_probe() {
        let mut tt = TranspositionTable::new(1);
        tt.store(0xdead_beef, Some(dummy_move()), 42, 3);

        let entry = tt.probe(0xdead_beef).expect("entry stored");
        assert_eq!(entry.score(), 42);
        assert_eq!(entry.known_depth(), 3);
        assert!(entry.pv().is_some());
        assert!(tt.probe(0xfeed_f00d).is_none());
    }

    #[test]
    fn shallower_same_key_does_not_replace() {
        let mut tt = TranspositionTable::new(1);
        tt.store(1, None, 10, 5);
        tt.store(1, None, 99, 2);
        assert_eq!(tt.probe(1).unwrap().score(), 10);

        tt.store(1, None, 99, 5);
        assert_eq!(tt.probe(1).unwrap().score(), 99);
    }

    #[test]
    fn sizing_rounds_down_to_a_power_of_two() {
        let entry_size = mem::size_of::<Option<TtEntry>>();
        for size_mb in [1usize, 2, 3, 16] {
            let tt = TranspositionTable::new(size_mb);
            let len = tt.entries.len();
            assert!(len.is_power_of_two());
            // never over the requested bytes, never under half of them
            assert!(len * entry_size <= size_mb * 1024 * 1024);
            assert!(len * entry_size * 2 > size_mb * 1024 * 1024);
        }
    }

    #[test]
    fn clear_empties_the_table() {
        let mut tt = TranspositionTable::new(1);
        tt.store(7, None, 1, 1);
        tt.clear();
        assert!(tt.probe(7).is_none());
    }
}
