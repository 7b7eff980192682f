//! Basis conversion between RNS chains and the operations built on it:
//! gadget decomposition, division by the auxiliary modulus `P` (mod-down)
//! and division by the last prime of the chain (rescale).

use std::sync::Arc;

use super::{
    basis::RnsBasis,
    errors::{RnsNttError, RnsNttResult},
    poly::RnsPoly,
};
use crate::math::modular::{
    add_mod, center, mod_inverse, mul_mod, reduce_i64, sub_mod,
};

/// Fast (approximate) base conversion from `from = {p_j}` to `to = {q_i}`.
///
/// For `x` with residues `x_j`, computes
/// `sum_j [x_j * (P/p_j)^{-1}]_{p_j} * (P/p_j) mod q_i`, which equals
/// `x + u * P` for some `0 <= u < |from|`.
#[derive(Debug, Clone)]
pub struct BasisConverter {
    from: Vec<u64>,
    to: Vec<u64>,
    // [(P / p_j)^{-1}]_{p_j}
    hat_inverses: Vec<u64>,
    // hat_mod_to[j][i] = (P / p_j) mod q_i
    hat_mod_to: Vec<Vec<u64>>,
}

impl BasisConverter {
    pub fn new(from: &[u64], to: &[u64]) -> Self {
        let hat_mod = |j: usize, modulus: u64| {
            from.iter()
                .enumerate()
                .filter(|&(k, _)| k != j)
                .fold(1u64, |acc, (_, &p)| mul_mod(acc, p % modulus, modulus))
        };
        let hat_inverses = from
            .iter()
            .enumerate()
            .map(|(j, &p)| mod_inverse(hat_mod(j, p), p))
            .collect();
        let hat_mod_to = (0..from.len())
            .map(|j| to.iter().map(|&q| hat_mod(j, q)).collect())
            .collect();
        Self {
            from: from.to_vec(),
            to: to.to_vec(),
            hat_inverses,
            hat_mod_to,
        }
    }

    pub fn source_moduli(&self) -> &[u64] {
        &self.from
    }

    pub fn target_moduli(&self) -> &[u64] {
        &self.to
    }

    /// Converts coefficient-domain residue rows (one per source modulus).
    pub fn convert<const DEGREE: usize>(
        &self,
        input: &[&[u64; DEGREE]],
    ) -> Vec<[u64; DEGREE]> {
        debug_assert_eq!(input.len(), self.from.len());
        let mut output = vec![[0u64; DEGREE]; self.to.len()];
        let mut scaled = vec![0u64; self.from.len()];
        for k in 0..DEGREE {
            for (j, row) in input.iter().enumerate() {
                scaled[j] = mul_mod(row[k], self.hat_inverses[j], self.from[j]);
            }
            for (i, out) in output.iter_mut().enumerate() {
                let q = self.to[i];
                let mut acc = 0u64;
                for (j, &y) in scaled.iter().enumerate() {
                    acc = add_mod(acc, mul_mod(y % q, self.hat_mod_to[j][i], q), q);
                }
                out[k] = acc;
            }
        }
        output
    }
}

/// Gadget decomposition from a fixed `Q_l` into a fixed `Q_l ∪ P`, with the
/// base converter of every digit block computed once.
///
/// Digit `k` carries the residues of the input on the `k`-th block of `alpha`
/// primes and the fast base conversion of that block everywhere else, so
/// `sum_k digit_k * g_k = poly (mod Q_l)` where `g_k` is `1` on block `k` and
/// `0` on the other `Q_l` channels.
#[derive(Debug, Clone)]
pub struct Decomposer<const DEGREE: usize> {
    source: Arc<RnsBasis<DEGREE>>,
    target: Arc<RnsBasis<DEGREE>>,
    // one converter per block, from the block's primes to the rest of `target`
    blocks: Vec<BasisConverter>,
}

impl<const DEGREE: usize> Decomposer<DEGREE> {
    pub fn new(
        source: Arc<RnsBasis<DEGREE>>,
        alpha: usize,
        target: Arc<RnsBasis<DEGREE>>,
    ) -> Self {
        let blocks = source
            .moduli()
            .chunks(alpha)
            .map(|block| {
                let others: Vec<u64> = target
                    .moduli()
                    .iter()
                    .copied()
                    .filter(|m| !block.contains(m))
                    .collect();
                BasisConverter::new(block, &others)
            })
            .collect();
        Self {
            source,
            target,
            blocks,
        }
    }

    pub fn target(&self) -> &Arc<RnsBasis<DEGREE>> {
        &self.target
    }

    pub fn digit_count(&self) -> usize {
        self.blocks.len()
    }

    /// Decomposes `poly` (over the source basis, either domain) into
    /// [`Self::digit_count`] digits over the target basis in NTT domain.
    pub fn decompose(&self, poly: &RnsPoly<DEGREE>) -> RnsNttResult<Vec<RnsPoly<DEGREE>>> {
        if poly.basis().moduli() != self.source.moduli() {
            return Err(RnsNttError::ChannelCountMismatch {
                expected: self.source.channel_count(),
                actual: poly.channel_count(),
            });
        }
        let coeff = if poly.is_ntt_domain() {
            poly.clone().into_coeff_domain()
        } else {
            poly.clone()
        };

        let mut digits = Vec::with_capacity(self.blocks.len());
        let mut block_start = 0;
        for converter in &self.blocks {
            let block_moduli = converter.source_moduli();
            let block_end = block_start + block_moduli.len();
            let rows: Vec<&[u64; DEGREE]> =
                coeff.channels()[block_start..block_end].iter().collect();
            let converted = converter.convert(&rows);

            let mut channels = Vec::with_capacity(self.target.channel_count());
            for &modulus in self.target.moduli() {
                if let Some(offset) = block_moduli.iter().position(|&m| m == modulus) {
                    channels.push(*rows[offset]);
                } else {
                    let index = converter
                        .target_moduli()
                        .iter()
                        .position(|&m| m == modulus)
                        .ok_or(RnsNttError::MissingModulus { modulus })?;
                    channels.push(converted[index]);
                }
            }
            digits.push(
                RnsPoly::new_unchecked(channels, self.target.clone(), false).into_ntt_domain(),
            );
            block_start = block_end;
        }
        Ok(digits)
    }
}

/// One-off gadget decomposition of `poly` (over `Q_l`) into
/// `ceil((l+1)/alpha)` digits lifted to `target` (`Q_l ∪ P`).
///
/// Repeated decompositions at a fixed level should go through a reused
/// [`Decomposer`].
pub fn decompose<const DEGREE: usize>(
    poly: &RnsPoly<DEGREE>,
    alpha: usize,
    target: &Arc<RnsBasis<DEGREE>>,
) -> RnsNttResult<Vec<RnsPoly<DEGREE>>> {
    Decomposer::new(poly.basis().clone(), alpha, target.clone()).decompose(poly)
}

/// Divides `poly` (over `keep ∪ tail`, with `keep` as a prefix of its basis)
/// by the product of the tail primes and returns the result over `keep`,
/// in the same domain as the input.
///
/// A single tail prime is center-lifted, giving a rounded division. Several
/// tail primes go through fast base conversion, which adds an error of at
/// most the number of tail primes.
pub fn divide_by_tail<const DEGREE: usize>(
    poly: &RnsPoly<DEGREE>,
    keep: &Arc<RnsBasis<DEGREE>>,
) -> RnsNttResult<RnsPoly<DEGREE>> {
    let was_ntt = poly.is_ntt_domain();
    let coeff = if was_ntt {
        poly.clone().into_coeff_domain()
    } else {
        poly.clone()
    };
    let moduli = coeff.basis().moduli();
    let keep_count = keep.channel_count();
    if keep_count >= moduli.len() || moduli[..keep_count] != *keep.moduli() {
        return Err(RnsNttError::InvalidModDrop {
            drop_count: moduli.len().saturating_sub(keep_count),
            channel_count: moduli.len(),
        });
    }
    let tail_moduli = &moduli[keep_count..];
    let tail_rows: Vec<&[u64; DEGREE]> = coeff.channels()[keep_count..].iter().collect();

    let lifted: Vec<[u64; DEGREE]> = if let [tail] = tail_moduli {
        keep.moduli()
            .iter()
            .map(|&q| {
                let mut row = [0u64; DEGREE];
                for (out, &x) in row.iter_mut().zip(tail_rows[0].iter()) {
                    *out = reduce_i64(center(x, *tail), q);
                }
                row
            })
            .collect()
    } else {
        BasisConverter::new(tail_moduli, keep.moduli()).convert(&tail_rows)
    };

    let mut channels = Vec::with_capacity(keep_count);
    for (i, &q) in keep.moduli().iter().enumerate() {
        let tail_inverse = mod_inverse(
            tail_moduli.iter().fold(1u64, |acc, &p| mul_mod(acc, p % q, q)),
            q,
        );
        let mut row = coeff.channels()[i];
        for (x, &r) in row.iter_mut().zip(lifted[i].iter()) {
            *x = mul_mod(sub_mod(*x, r, q), tail_inverse, q);
        }
        channels.push(row);
    }

    let mut result = RnsPoly::new_unchecked(channels, keep.clone(), false);
    result.set_domain(was_ntt);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: [u64; 3] = [17, 97, 113];
    const P: [u64; 1] = [193];

    fn q_basis() -> Arc<RnsBasis<8>> {
        Arc::new(RnsBasis::new(Q.to_vec()).unwrap())
    }

    fn qp_basis() -> Arc<RnsBasis<8>> {
        Arc::new(RnsBasis::new(Q.iter().chain(&P).copied().collect()).unwrap())
    }

    #[test]
    fn converter_is_exact_up_to_multiple_of_source_product() {
        let converter = BasisConverter::new(&[17, 97], &[113, 193]);
        for value in [0u64, 1, 500, 1_648] {
            let a = [value % 17; 8];
            let b = [value % 97; 8];
            let out = converter.convert::<8>(&[&a, &b]);
            let p = 17 * 97;
            let matches = |target: u64, got: u64| {
                (0..2).any(|u| (value + u * p) % target == got)
            };
            assert!(matches(113, out[0][0]), "value {value}");
            assert!(matches(193, out[1][0]), "value {value}");
        }
    }

    #[test]
    fn decomposition_recomposes_modulo_q() {
        let poly = RnsPoly::<8>::from_coeffs(&[1_000, -77_777, 3, 0, -1, 42, 9, -9], q_basis());
        let digits = decompose(&poly, 1, &qp_basis()).unwrap();
        assert_eq!(digits.len(), 3);

        // digit k restricted to channel k must equal poly's channel k
        for (k, digit) in digits.iter().enumerate() {
            let digit = digit.clone().into_coeff_domain();
            assert_eq!(digit.channels()[k], poly.channels()[k]);
        }
    }

    #[test]
    fn decomposition_with_wide_digits_covers_all_blocks() {
        let poly = RnsPoly::<8>::from_coeffs(&[5, -6], q_basis());
        let digits = decompose(&poly, 2, &qp_basis()).unwrap();
        assert_eq!(digits.len(), 2);
        let second = digits[1].clone().into_coeff_domain();
        assert_eq!(second.channels()[2], poly.channels()[2]);
    }

    #[test]
    fn decomposer_is_reusable_across_inputs() {
        let decomposer = Decomposer::new(q_basis(), 2, qp_basis());
        assert_eq!(decomposer.digit_count(), 2);
        for coeffs in [[1_000i64, -77_777, 3, 0, -1, 42, 9, -9], [5, -6, 0, 0, 0, 0, 0, 1]] {
            let poly = RnsPoly::<8>::from_coeffs(&coeffs, q_basis());
            let reused = decomposer.decompose(&poly).unwrap();
            assert_eq!(reused, decompose(&poly, 2, &qp_basis()).unwrap());
            // NTT-domain input decomposes to the same digits
            let ntt = poly.clone().into_ntt_domain();
            assert_eq!(decomposer.decompose(&ntt).unwrap(), reused);
        }
    }

    #[test]
    fn decomposer_rejects_foreign_basis() {
        let decomposer = Decomposer::new(q_basis(), 1, qp_basis());
        let poly = RnsPoly::<8>::zero(qp_basis());
        assert!(matches!(
            decomposer.decompose(&poly),
            Err(RnsNttError::ChannelCountMismatch { expected: 3, actual: 4 })
        ));
    }

    #[test]
    fn divide_by_single_tail_prime_rounds() {
        // x = 193 * y + e with small e; dividing by 193 yields y
        let y = [5i64, -3, 100, 0, -250, 1, 2, 3];
        let e = [3i64, -4, 0, 96, -96, 1, -1, 0];
        let x: Vec<i64> = y.iter().zip(&e).map(|(a, b)| 193 * a + b).collect();
        let poly = RnsPoly::<8>::from_coeffs(&x, qp_basis()).into_ntt_domain();
        let divided = divide_by_tail(&poly, &q_basis()).unwrap();
        assert!(divided.is_ntt_domain());
        assert_eq!(divided.to_coeffs(), y);
    }

    #[test]
    fn divide_by_two_tail_primes_is_close() {
        let keep = Arc::new(RnsBasis::<8>::new(vec![17, 193]).unwrap());
        let full = Arc::new(RnsBasis::<8>::new(vec![17, 193, 97, 113]).unwrap());
        let tail = 97 * 113i64;
        let y = [3i64, -2, 7, 0, 1, -1, 10, -10];
        let x: Vec<i64> = y.iter().map(|v| v * tail + 50).collect();
        let poly = RnsPoly::<8>::from_coeffs(&x, full);
        let divided = divide_by_tail(&poly, &keep).unwrap();
        for (got, want) in divided.to_coeffs().iter().zip(&y) {
            assert!((got - want).abs() <= 2, "got {got}, want {want}");
        }
    }

    #[test]
    fn divide_rejects_non_prefix_basis() {
        let poly = RnsPoly::<8>::zero(qp_basis());
        let wrong = Arc::new(RnsBasis::<8>::new(vec![97]).unwrap());
        assert!(divide_by_tail(&poly, &wrong).is_err());
    }
}
