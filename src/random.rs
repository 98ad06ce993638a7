//! Deterministic random starting configuration.
//!
//! L'Ecuyer's combined linear congruential generator. A worker that owns rows
//! starting at global row `k` skips `k * width` draws first, so the
//! concatenation of every worker's rows equals what one process would draw.

const M1: i64 = 2_147_483_563;
const A1: i64 = 40_014;
const Q1: i64 = 53_668;
const R1: i64 = 12_211;

const M2: i64 = 2_147_483_399;
const A2: i64 = 40_692;
const Q2: i64 = 52_774;
const R2: i64 = 3_791;

const SCALE: f64 = 4.656_613e-10;

pub const DEFAULT_SEED: u64 = 424_243;

#[derive(Debug, Clone)]
pub struct RandomField {
    s1: i64,
    s2: i64,
}

impl RandomField {
    pub fn new(seed: u64) -> Self {
        RandomField {
            s1: fold_seed(seed, M1),
            s2: fold_seed(seed, M2),
        }
    }

    /// Next value in (0, 1).
    pub fn next_f64(&mut self) -> f64 {
        // Schrage's method keeps a * s inside i64 range.
        let k = self.s1 / Q1;
        self.s1 = A1 * (self.s1 - k * Q1) - k * R1;
        if self.s1 < 0 {
            self.s1 += M1;
        }

        let k = self.s2 / Q2;
        self.s2 = A2 * (self.s2 - k * Q2) - k * R2;
        if self.s2 < 0 {
            self.s2 += M2;
        }

        let mut z = self.s1 - self.s2;
        if z < 1 {
            z += M1 - 1;
        }
        z as f64 * SCALE
    }

    /// A fair coin: a draw in 0..100 that lands on 50 or above.
    pub fn next_bool(&mut self) -> bool {
        ((self.next_f64() * 100.0) as i32) >= 50
    }

    pub fn skip(&mut self, draws: usize) {
        for _ in 0..draws {
            self.next_f64();
        }
    }

    /// Discard the draws of `rows` rows of `width` cells.
    pub fn skip_rows(&mut self, rows: usize, width: usize) {
        self.skip(rows * width);
    }
}

/// Map a seed into the generator's valid state range `1..modulus`.
fn fold_seed(seed: u64, modulus: i64) -> i64 {
    let modulus = modulus as u64;
    if seed >= 1 && seed < modulus {
        seed as i64
    } else {
        (seed % (modulus - 1) + 1) as i64
    }
}
