//! Word-sized modular arithmetic shared by the prime search, the NTT tables
//! and the RNS basis converter.
//!
//! All helpers expect reduced inputs (`a, b < modulus`) and a modulus below
//! `2^63` so that `a + b` cannot overflow `u64`.

#[inline]
pub fn add_mod(a: u64, b: u64, modulus: u64) -> u64 {
    let s = a + b;
    if s >= modulus { s - modulus } else { s }
}

#[inline]
pub fn sub_mod(a: u64, b: u64, modulus: u64) -> u64 {
    if a >= b { a - b } else { a + modulus - b }
}

#[inline]
pub fn neg_mod(a: u64, modulus: u64) -> u64 {
    if a == 0 { 0 } else { modulus - a }
}

/// Computes `(a * b) mod modulus` using `u128` intermediate arithmetic.
#[inline]
pub fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((a as u128 * b as u128) % modulus as u128) as u64
}

/// Computes `base^exponent mod modulus` via binary exponentiation.
///
/// # Panics
///
/// Panics if `modulus == 0`.
pub fn mod_pow(mut base: u64, mut exponent: u64, modulus: u64) -> u64 {
    assert!(modulus > 0, "mod_pow: modulus must be positive");
    if modulus == 1 {
        return 0;
    }
    let mut acc = 1u64;
    base %= modulus;
    while exponent > 0 {
        if exponent & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exponent >>= 1;
    }
    acc
}

/// Computes the inverse of `value` modulo `modulus` with the extended
/// Euclidean algorithm.
///
/// # Panics
///
/// Panics if `value` and `modulus` are not coprime.
pub fn mod_inverse(value: u64, modulus: u64) -> u64 {
    let (mut old_r, mut r) = ((value % modulus) as i128, modulus as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let quotient = old_r / r;
        (old_r, r) = (r, old_r - quotient * r);
        (old_s, s) = (s, old_s - quotient * s);
    }
    assert_eq!(old_r, 1, "mod_inverse: values must be coprime");
    old_s.rem_euclid(modulus as i128) as u64
}

/// Maps a signed integer into `[0, modulus)`.
#[inline]
pub fn reduce_i64(value: i64, modulus: u64) -> u64 {
    (value as i128).rem_euclid(modulus as i128) as u64
}

/// Lifts a residue to its representative in `(-modulus/2, modulus/2]`.
#[inline]
pub fn center(value: u64, modulus: u64) -> i64 {
    if value > modulus / 2 {
        -((modulus - value) as i64)
    } else {
        value as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_wrap_around_modulus() {
        assert_eq!(add_mod(16, 2, 17), 1);
        assert_eq!(sub_mod(1, 2, 17), 16);
        assert_eq!(neg_mod(0, 17), 0);
        assert_eq!(neg_mod(3, 17), 14);
    }

    #[test]
    fn mul_mod_matches_widened_reference() {
        let modulus = (1u64 << 61) - 1;
        let a = modulus - 11;
        let b = modulus - 17;
        let expected = ((a as u128 * b as u128) % modulus as u128) as u64;
        assert_eq!(mul_mod(a, b, modulus), expected);
    }

    #[test]
    fn mod_pow_handles_edge_cases() {
        assert_eq!(mod_pow(2, 0, 17), 1);
        assert_eq!(mod_pow(5, 0, 1), 0);
        assert_eq!(mod_pow(0, 5, 17), 0);
        assert_eq!(mod_pow(3, 16, 17), 1);
    }

    #[test]
    #[should_panic(expected = "mod_pow: modulus must be positive")]
    fn mod_pow_panics_on_zero_modulus() {
        let _ = mod_pow(2, 10, 0);
    }

    #[test]
    fn mod_inverse_inverts() {
        for value in 1..97u64 {
            assert_eq!(mul_mod(value, mod_inverse(value, 97), 97), 1);
        }
    }

    #[test]
    #[should_panic(expected = "mod_inverse: values must be coprime")]
    fn mod_inverse_panics_on_shared_factor() {
        let _ = mod_inverse(6, 9);
    }

    #[test]
    fn center_and_reduce_are_inverse() {
        for value in -8i64..=8 {
            assert_eq!(center(reduce_i64(value, 17), 17), value);
        }
    }
}
