#![allow(dead_code)]

use std::sync::Arc;

use toy_mkrlwe::{Decryptor, Encryptor, Evaluator, KeyGenerator, Parameters, Plaintext};

pub const N: usize = 32;
pub const SCALE_BITS: u32 = 40;

/// `q_0` of 55 bits followed by seven 40-bit rescaling primes and one
/// 61-bit special prime.
pub fn params(rotations: &[usize]) -> Arc<Parameters<N>> {
    Parameters::<N>::builder()
        .log_q(&[55, 40, 40, 40, 40, 40, 40, 40])
        .log_p(&[61])
        .rotations(rotations)
        .crs_seed([42u8; 32])
        .build()
        .expect("test parameters are valid")
}

pub fn seed(tag: u64) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[..8].copy_from_slice(&tag.to_le_bytes());
    seed
}

pub fn scale() -> f64 {
    (1u64 << SCALE_BITS) as f64
}

pub struct Harness {
    pub params: Arc<Parameters<N>>,
    pub kg: KeyGenerator<N>,
    pub enc: Encryptor<N>,
    pub dec: Decryptor<N>,
    pub eval: Evaluator<N>,
}

impl Harness {
    pub fn new(rotations: &[usize], tag: u64) -> Self {
        let params = params(rotations);
        Self {
            kg: KeyGenerator::from_seed(params.clone(), seed(tag)),
            enc: Encryptor::from_seed(params.clone(), seed(tag + 1)),
            dec: Decryptor::from_seed(params.clone(), seed(tag + 2)),
            eval: Evaluator::new(params.clone()),
            params,
        }
    }

    /// Coefficient-encoded plaintext at the top level.
    pub fn encode(&self, values: &[f64]) -> Plaintext<N> {
        Plaintext::from_scaled(values, scale(), &self.params, self.params.max_level())
            .expect("values fit the scale")
    }
}

pub fn padded(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.resize(N, 0.0);
    out
}

pub fn assert_close(got: &[f64], want: &[f64], epsilon: f64) {
    let want = padded(want);
    for (i, (g, w)) in got.iter().zip(&want).enumerate() {
        assert!(
            (g - w).abs() <= epsilon,
            "coefficient {i}: got {g}, want {w} (epsilon {epsilon})"
        );
    }
}

/// Product in `R[X]/(X^N + 1)`.
pub fn negacyclic_product(a: &[f64], b: &[f64]) -> Vec<f64> {
    let (a, b) = (padded(a), padded(b));
    let mut out = vec![0.0; N];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            let k = i + j;
            if k < N {
                out[k] += x * y;
            } else {
                out[k - N] -= x * y;
            }
        }
    }
    out
}

/// `m(X) -> m(X^galois)` in `R[X]/(X^N + 1)`.
pub fn automorphism(values: &[f64], galois: usize) -> Vec<f64> {
    let mut out = vec![0.0; N];
    for (i, &v) in padded(values).iter().enumerate() {
        let j = (i * galois) % (2 * N);
        if j < N {
            out[j] = v;
        } else {
            out[j - N] = -v;
        }
    }
    out
}
