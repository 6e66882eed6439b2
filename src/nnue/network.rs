//! Network weights: loading and the feature indexing scheme.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::{HL_SIZE, INPUT_SIZE, NUM_BUCKETS};

/// Read-only NNUE weight blobs, loaded once at startup.
///
/// On-disk layout is raw little-endian f32 in declaration order:
/// accumulator weights `[INPUT_SIZE][HL_SIZE]`, accumulator biases
/// `[HL_SIZE]`, output weights `[NUM_BUCKETS][2 * HL_SIZE]`, output
/// biases `[NUM_BUCKETS]`.
pub struct Network {
    pub accumulator_weights: Box<[[f32; HL_SIZE]]>,
    pub accumulator_biases: Box<[f32; HL_SIZE]>,
    pub output_weights: Box<[[f32; 2 * HL_SIZE]]>,
    pub output_biases: [f32; NUM_BUCKETS],
}

impl Network {
    /// Load the weight blob from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::from_reader(&mut reader)
    }

    /// Load the weight blob from any reader.
    pub fn from_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut network = Network::zeroed();

        for row in network.accumulator_weights.iter_mut() {
            read_f32s(reader, row)?;
        }
        read_f32s(reader, network.accumulator_biases.as_mut_slice())?;
        for row in network.output_weights.iter_mut() {
            read_f32s(reader, row)?;
        }
        read_f32s(reader, &mut network.output_biases)?;

        Ok(network)
    }

    /// An all-zero network. Evaluates every position to the output
    /// bias (zero); search tests that only need mate detection use it.
    #[must_use]
    pub fn zeroed() -> Self {
        Network {
            accumulator_weights: vec![[0.0; HL_SIZE]; INPUT_SIZE].into_boxed_slice(),
            accumulator_biases: vec![0.0; HL_SIZE]
                .into_boxed_slice()
                .try_into()
                .expect("bias length"),
            output_weights: vec![[0.0; 2 * HL_SIZE]; NUM_BUCKETS].into_boxed_slice(),
            output_biases: [0.0; NUM_BUCKETS],
        }
    }
}

fn read_f32s<R: Read>(reader: &mut R, out: &mut [f32]) -> io::Result<()> {
    let mut buf = [0u8; 4];
    for value in out {
        reader.read_exact(&mut buf)?;
        *value = f32::from_le_bytes(buf);
    }
    Ok(())
}

/// Feature slot for a piece board occupying a square, from one of the
/// two perspectives. The flipped view swaps colors and mirrors the
/// board vertically.
#[inline]
#[must_use]
pub fn feature_index(flipped: bool, board: usize, square: usize) -> usize {
    if flipped {
        64 * ((board + 6) % 12) + (square ^ 0b111000)
    } else {
        64 * board + square
    }
}

/// Squared clipped ReLU.
#[inline]
#[must_use]
pub fn screlu(x: f32) -> f32 {
    let clamped = x.clamp(0.0, 1.0);
    clamped * clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_index_white_perspective() {
        // white pawn on e2 from white's view
        assert_eq!(feature_index(false, 0, 12), 12);
        // black king on e8 from white's view
        assert_eq!(feature_index(false, 11, 60), 64 * 11 + 60);
    }

    #[test]
    fn feature_index_black_perspective() {
        // white pawn on e2 seen flipped: becomes a black pawn on e7
        assert_eq!(feature_index(true, 0, 12), 64 * 6 + 52);
        // black king on e8 seen flipped: white king on e1
        assert_eq!(feature_index(true, 11, 60), 64 * 5 + 4);
    }

    #[test]
    fn screlu_clamps_and_squares() {
        assert_eq!(screlu(-1.0), 0.0);
        assert_eq!(screlu(0.5), 0.25);
        assert_eq!(screlu(2.0), 1.0);
    }

    #[test]
    fn loader_reads_declaration_order() {
        // tiny synthetic blob: all weights zero except a recognizable
        // first accumulator weight and the last output bias
        let floats = INPUT_SIZE * HL_SIZE + HL_SIZE + NUM_BUCKETS * 2 * HL_SIZE + NUM_BUCKETS;
        let mut blob = vec![0u8; floats * 4];
        blob[0..4].copy_from_slice(&1.5f32.to_le_bytes());
        let tail = blob.len() - 4;
        blob[tail..].copy_from_slice(&(-2.25f32).to_le_bytes());

        let net = Network::from_reader(&mut blob.as_slice()).unwrap();
        assert_eq!(net.accumulator_weights[0][0], 1.5);
        assert_eq!(net.output_biases[NUM_BUCKETS - 1], -2.25);
    }

    #[test]
    fn loader_rejects_short_blob() {
        let blob = vec![0u8; 128];
        assert!(Network::from_reader(&mut blob.as_slice()).is_err());
    }
}
