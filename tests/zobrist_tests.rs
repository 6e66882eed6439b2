//! Zobrist hash consistency: the incrementally maintained digest must
//! always equal a from-scratch recompute.

use proptest::prelude::*;
use rand::prelude::*;

use hyperbola::board::Position;
use hyperbola::perft::zobrist_walk;

#[test]
fn zobrist_consistent_over_depth_three_walk() {
    let pos = Position::startpos();
    zobrist_walk(&pos, 3).expect("incremental hash must match recompute");
}

#[test]
#[ignore] // the full depth-4 tree; slow in debug builds
fn zobrist_consistent_over_depth_four_walk() {
    let pos = Position::startpos();
    zobrist_walk(&pos, 4).expect("incremental hash must match recompute");
}

#[test]
fn zobrist_consistent_from_kiwipete() {
    let pos =
        Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    zobrist_walk(&pos, 2).expect("incremental hash must match recompute");
}

proptest! {
    /// Random legal playouts keep the hash and the board invariants
    /// intact at every step.
    #[test]
    fn prop_random_playout_keeps_hash_consistent(seed in any::<u64>(), plies in 1..=40usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pos = Position::startpos();

        for _ in 0..plies {
            let legal = pos.legal_moves();
            if legal.is_empty() {
                break;
            }
            let mv = legal[rng.gen_range(0..legal.len())];
            pos.apply_in_place(mv);

            prop_assert!(pos.board.is_legal());
            prop_assert_eq!(pos.board.hash(), pos.board.hash_from_scratch());
            pos.board.sanity_check();
        }
    }
}
