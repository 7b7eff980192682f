//! Prime utilities for constructing NTT-friendly modulus chains.
//!
//! Primality uses Miller-Rabin with a fixed base set, which is deterministic
//! for every `u64` input. A chain is built by walking upward from `2^bits`
//! over candidates `p = 1 (mod 2n)` and skipping primes already taken by an
//! earlier position of the chain (or by the other chain).

use super::modular::{mod_pow, mul_mod};

// Deterministic for all n < 3.3 * 10^24, which covers all u64 values.
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Every modulus stays below `2^MAX_MODULUS_BITS`, which keeps `a + b`
/// inside `u64`.
pub const MAX_MODULUS_BITS: u32 = 62;

/// Returns `true` if `n` is prime using deterministic Miller-Rabin on `u64`.
pub fn is_prime(n: u64) -> bool {
    match n {
        0 | 1 => return false,
        2 | 3 => return true,
        _ if n & 1 == 0 => return false,
        _ => {}
    }

    let mut d = n - 1;
    let mut r = 0u32;
    while d & 1 == 0 {
        d >>= 1;
        r += 1;
    }

    'bases: for &a in MILLER_RABIN_BASES.iter() {
        if a >= n {
            continue;
        }
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

/// Returns `true` when `p` is prime and `p = 1 (mod 2n)`, so that `Z_p`
/// holds a primitive `2n`-th root of unity for the negacyclic NTT.
///
/// # Panics
///
/// Panics if `n == 0` or `2 * n` overflows `u64`.
#[inline]
pub fn is_ntt_friendly_prime(p: u64, n: u64) -> bool {
    assert!(n > 0, "is_ntt_friendly_prime: n must be positive");
    let order = n
        .checked_mul(2)
        .expect("is_ntt_friendly_prime: 2 * n must fit in u64");
    is_prime(p) && p % order == 1
}

/// Returns the first NTT-friendly prime `p >= 2^bits` for degree `n` that is
/// not contained in `taken`.
///
/// # Panics
///
/// Panics if `bits` is not in `1..MAX_MODULUS_BITS`, or if `n == 0`.
pub fn next_ntt_prime(bits: u32, n: u64, taken: &[u64]) -> u64 {
    assert!(
        bits > 0 && bits < MAX_MODULUS_BITS,
        "next_ntt_prime: bits must be in 1..{MAX_MODULUS_BITS}"
    );
    assert!(n > 0, "next_ntt_prime: n must be positive");
    let step = 2 * n;
    let start = 1u64 << bits;
    let mut candidate = start - (start % step) + 1;
    if candidate < start {
        candidate += step;
    }
    loop {
        if is_prime(candidate) && !taken.contains(&candidate) {
            return candidate;
        }
        candidate += step;
    }
}

/// Builds a chain of distinct NTT-friendly primes, one per entry of
/// `bit_sizes`, avoiding every prime in `taken`. The chosen primes are
/// appended to `taken` as they are found.
pub fn ntt_prime_chain(bit_sizes: &[u32], n: u64, taken: &mut Vec<u64>) -> Vec<u64> {
    let mut chain = Vec::with_capacity(bit_sizes.len());
    for &bits in bit_sizes {
        let prime = next_ntt_prime(bits, n, taken);
        taken.push(prime);
        chain.push(prime);
    }
    chain
}
