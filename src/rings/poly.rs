use super::{
    basis::{NttTable, RnsBasis},
    errors::{RnsNttError, RnsNttResult},
};
use crate::math::{
    modular::{add_mod, mul_mod, neg_mod, reduce_i64, sub_mod},
    sampling::{
        gaussian_coefficients, ternary_coefficients, ternary_density_coefficients,
        uniform_coefficients,
    },
};
use rand::Rng;
use std::{
    ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign},
    sync::Arc,
};

/// Gaussian samples are truncated at this many standard deviations.
pub const GAUSSIAN_TAIL_CUT: f64 = 6.0;

/// A polynomial in `Z_{q_0} x … x Z_{q_{L-1}}[X] / (X^N + 1)`.
///
/// Stores one `[u64; DEGREE]` array per RNS channel. The `in_ntt_domain` flag
/// tracks whether the arrays hold coefficient-domain or NTT-domain values.
///
/// # Invariants
/// - `channels.len() == basis.channel_count()`
/// - Every `channels[i][j] < basis.moduli()[i]`
/// - `DEGREE` is a power of two
#[derive(Clone, Debug)]
pub struct RnsPoly<const DEGREE: usize> {
    channels: Vec<[u64; DEGREE]>,
    basis: Arc<RnsBasis<DEGREE>>,
    in_ntt_domain: bool,
}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl<const DEGREE: usize> RnsPoly<DEGREE> {
    /// Creates the zero polynomial in coefficient domain.
    pub fn zero(basis: Arc<RnsBasis<DEGREE>>) -> Self {
        Self::zero_in(basis, false)
    }

    /// Creates the zero polynomial in the requested domain.
    pub fn zero_in(basis: Arc<RnsBasis<DEGREE>>, in_ntt_domain: bool) -> Self {
        let channels = vec![[0u64; DEGREE]; basis.channel_count()];
        Self {
            channels,
            basis,
            in_ntt_domain,
        }
    }

    /// Creates a polynomial from signed integer coefficients.
    ///
    /// Each coefficient is reduced into `[0, q_i)` per channel via `rem_euclid`.
    /// Accepts at most DEGREE coefficients; missing high coefficients are zero.
    pub fn from_coeffs(coeffs: &[i64], basis: Arc<RnsBasis<DEGREE>>) -> Self {
        assert!(
            coeffs.len() <= DEGREE,
            "from_coeffs: at most {DEGREE} coefficients allowed, got {}",
            coeffs.len()
        );
        let mut channels = vec![[0u64; DEGREE]; basis.channel_count()];
        for (ch, channel) in channels.iter_mut().enumerate() {
            let q = basis.moduli()[ch];
            for (slot, &coeff) in channel.iter_mut().zip(coeffs) {
                *slot = reduce_i64(coeff, q);
            }
        }
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Creates a polynomial from pre-built channel arrays.
    ///
    /// Returns an error if the channel count doesn't match the basis, or if any
    /// coefficient is not reduced (i.e., ≥ the corresponding modulus).
    pub fn from_channels(
        channels: Vec<[u64; DEGREE]>,
        basis: Arc<RnsBasis<DEGREE>>,
        in_ntt_domain: bool,
    ) -> RnsNttResult<Self> {
        let expected = basis.channel_count();
        let actual = channels.len();
        if actual != expected {
            return Err(RnsNttError::ChannelCountMismatch { expected, actual });
        }
        for (ch, channel) in channels.iter().enumerate() {
            let q = basis.moduli()[ch];
            for &c in channel {
                if c >= q {
                    return Err(RnsNttError::NonReducedCoefficient {
                        coefficient: c,
                        modulus: q,
                    });
                }
            }
        }
        Ok(Self {
            channels,
            basis,
            in_ntt_domain,
        })
    }

    // Skips the O(N·L) reducedness check. Only for channels produced by
    // this crate's own arithmetic.
    pub(crate) fn new_unchecked(
        channels: Vec<[u64; DEGREE]>,
        basis: Arc<RnsBasis<DEGREE>>,
        in_ntt_domain: bool,
    ) -> Self {
        debug_assert_eq!(channels.len(), basis.channel_count());
        Self {
            channels,
            basis,
            in_ntt_domain,
        }
    }
}

// ─── Sampling ─────────────────────────────────────────────────────────────────

impl<const DEGREE: usize> RnsPoly<DEGREE> {
    /// Samples with coefficients uniform in `[0, q_i)` per channel.
    ///
    /// The result is flagged as coefficient domain; a uniform element is
    /// equally uniform after an NTT.
    pub fn sample_uniform<R: Rng + ?Sized>(
        basis: &Arc<RnsBasis<DEGREE>>,
        rng: &mut R,
    ) -> Self {
        let mut channels = vec![[0u64; DEGREE]; basis.channel_count()];
        for (ch, channel) in channels.iter_mut().enumerate() {
            *channel = uniform_coefficients::<DEGREE, _>(basis.moduli()[ch], rng);
        }
        Self::new_unchecked(channels, basis.clone(), false)
    }

    /// Samples noise from N(0, std_dev), truncated at
    /// [`GAUSSIAN_TAIL_CUT`] deviations and encoded in every channel from the
    /// same signed integers.
    pub fn sample_gaussian<R: Rng + ?Sized>(
        std_dev: f64,
        basis: &Arc<RnsBasis<DEGREE>>,
        rng: &mut R,
    ) -> Self {
        let bound = (GAUSSIAN_TAIL_CUT * std_dev).max(1.0);
        let noise = gaussian_coefficients::<DEGREE, _>(std_dev, bound, rng);
        Self::from_coeffs(&noise, basis.clone())
    }

    /// Samples a ternary polynomial whose entries are non-zero with
    /// probability `density`.
    pub fn sample_ternary<R: Rng + ?Sized>(
        density: f64,
        basis: &Arc<RnsBasis<DEGREE>>,
        rng: &mut R,
    ) -> Self {
        let ternary = ternary_density_coefficients::<DEGREE, _>(density, rng);
        Self::from_coeffs(&ternary, basis.clone())
    }

    /// Samples a ternary polynomial with exactly `hamming_weight` non-zero coefficients.
    pub fn sample_tribits<R: Rng + ?Sized>(
        hamming_weight: usize,
        basis: &Arc<RnsBasis<DEGREE>>,
        rng: &mut R,
    ) -> Self {
        let ternary = ternary_coefficients::<DEGREE, _>(hamming_weight, rng);
        Self::from_coeffs(&ternary, basis.clone())
    }
}

// ─── Accessors & domain conversion ───────────────────────────────────────────

impl<const DEGREE: usize> RnsPoly<DEGREE> {
    pub fn channels(&self) -> &[[u64; DEGREE]] {
        &self.channels
    }

    pub(crate) fn channels_mut(&mut self) -> &mut [[u64; DEGREE]] {
        &mut self.channels
    }

    pub fn basis(&self) -> &Arc<RnsBasis<DEGREE>> {
        &self.basis
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_ntt_domain(&self) -> bool {
        self.in_ntt_domain
    }

    /// Converts to NTT domain in-place (no-op if already there).
    pub fn to_ntt_domain(&mut self) {
        if self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            forward_ntt(channel, self.basis.ntt_table(ch));
        }
        self.in_ntt_domain = true;
    }

    /// Converts to coefficient domain in-place (no-op if already there).
    pub fn to_coeff_domain(&mut self) {
        if !self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            inverse_ntt(channel, self.basis.ntt_table(ch));
        }
        self.in_ntt_domain = false;
    }

    /// Moves into the requested domain.
    pub fn set_domain(&mut self, in_ntt_domain: bool) {
        if in_ntt_domain {
            self.to_ntt_domain();
        } else {
            self.to_coeff_domain();
        }
    }

    pub fn into_ntt_domain(mut self) -> Self {
        self.to_ntt_domain();
        self
    }

    pub fn into_coeff_domain(mut self) -> Self {
        self.to_coeff_domain();
        self
    }

    /// Returns a new polynomial with the last `drop_count` RNS channels removed.
    pub fn mod_drop_last(&self, drop_count: usize) -> RnsNttResult<Self> {
        let reduced_basis = Arc::new(self.basis.drop_last(drop_count)?);
        let keep = reduced_basis.channel_count();
        Ok(Self::new_unchecked(
            self.channels[..keep].to_vec(),
            reduced_basis,
            self.in_ntt_domain,
        ))
    }

    /// Keeps only the channels of `target`, in `target`'s order.
    ///
    /// Every modulus of `target` must be present in this polynomial's basis.
    /// Works in either domain since channels are independent.
    pub fn restrict_to(&self, target: &Arc<RnsBasis<DEGREE>>) -> RnsNttResult<Self> {
        let mut channels = Vec::with_capacity(target.channel_count());
        for &modulus in target.moduli() {
            let source = self
                .basis
                .position(modulus)
                .ok_or(RnsNttError::MissingModulus { modulus })?;
            channels.push(self.channels[source]);
        }
        Ok(Self::new_unchecked(
            channels,
            target.clone(),
            self.in_ntt_domain,
        ))
    }

    /// CRT-reconstructs each coefficient and returns them centered in `(-Q/2, Q/2]`.
    ///
    /// Exact while the centered values fit in `i64`. If the polynomial is in
    /// NTT domain, a temporary clone is converted to coefficient domain first.
    pub fn to_coeffs(&self) -> [i64; DEGREE] {
        let mut result = [0i64; DEGREE];
        self.for_each_residue_column(|i, residues| {
            result[i] = self.basis.reconstruct_centered_coeff(residues);
        });
        result
    }

    /// Like [`RnsPoly::to_coeffs`] but lifts to `f64`, which stays meaningful
    /// for values far beyond `i64`.
    pub fn to_f64_coeffs(&self) -> Vec<f64> {
        let mut result = vec![0f64; DEGREE];
        self.for_each_residue_column(|i, residues| {
            result[i] = self.basis.reconstruct_centered_f64(residues);
        });
        result
    }

    fn for_each_residue_column(&self, mut f: impl FnMut(usize, &[u64])) {
        // Ensure we operate on coefficient-domain data without mutating self.
        let tmp;
        let channels: &[[u64; DEGREE]] = if self.in_ntt_domain {
            tmp = self.clone().into_coeff_domain();
            &tmp.channels
        } else {
            &self.channels
        };

        let mut residues = vec![0u64; self.basis.channel_count()];
        for i in 0..DEGREE {
            for (ch, channel) in channels.iter().enumerate() {
                residues[ch] = channel[i];
            }
            f(i, &residues);
        }
    }
}

// ─── Arithmetic ───────────────────────────────────────────────────────────────

impl<const DEGREE: usize> RnsPoly<DEGREE> {
    fn assert_compatible(&self, rhs: &Self, op: &str) {
        debug_assert!(
            Arc::ptr_eq(&self.basis, &rhs.basis) || self.basis == rhs.basis,
            "{op}: basis mismatch"
        );
        debug_assert_eq!(
            self.in_ntt_domain, rhs.in_ntt_domain,
            "{op}: domain mismatch"
        );
    }

    /// `self += a * b`, all three in NTT domain over the same basis.
    pub fn mul_add_assign(&mut self, a: &Self, b: &Self) {
        self.assert_compatible(a, "mul_add_assign");
        self.assert_compatible(b, "mul_add_assign");
        debug_assert!(self.in_ntt_domain, "mul_add_assign: requires NTT domain");
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for ((acc, &x), &y) in channel
                .iter_mut()
                .zip(a.channels[ch].iter())
                .zip(b.channels[ch].iter())
            {
                *acc = add_mod(*acc, mul_mod(x, y, q), q);
            }
        }
    }

    /// Multiplies channel `i` by `scalars[i]`. Works in both domains.
    pub fn mul_scalar_assign(&mut self, scalars: &[u64]) {
        debug_assert_eq!(scalars.len(), self.channels.len());
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            let scalar = scalars[ch] % q;
            for c in channel.iter_mut() {
                *c = mul_mod(*c, scalar, q);
            }
        }
    }

    /// Applies `X -> X^galois_element`, an automorphism of the ring for odd
    /// `galois_element`. The result stays in this polynomial's domain.
    pub fn automorphism(&self, galois_element: usize) -> Self {
        debug_assert!(galois_element % 2 == 1, "automorphism: even galois element");
        let was_ntt = self.in_ntt_domain;
        let source = if was_ntt {
            self.clone().into_coeff_domain()
        } else {
            self.clone()
        };

        let two_n = 2 * DEGREE;
        let g = galois_element % two_n;
        let mut channels = vec![[0u64; DEGREE]; self.channels.len()];
        for (ch, (out, input)) in channels.iter_mut().zip(&source.channels).enumerate() {
            let q = self.basis.moduli()[ch];
            for (i, &c) in input.iter().enumerate() {
                let j = (i * g) % two_n;
                if j < DEGREE {
                    out[j] = c;
                } else {
                    out[j - DEGREE] = neg_mod(c, q);
                }
            }
        }
        let mut result = Self::new_unchecked(channels, self.basis.clone(), false);
        result.set_domain(was_ntt);
        result
    }
}

impl<const DEGREE: usize> AddAssign<&RnsPoly<DEGREE>> for RnsPoly<DEGREE> {
    /// Coefficient-wise addition modulo each `q_i`.
    ///
    /// Works in both coefficient and NTT domain. Both operands must share the
    /// same basis and be in the same domain.
    fn add_assign(&mut self, rhs: &RnsPoly<DEGREE>) {
        self.assert_compatible(rhs, "add_assign");
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for (a, &b) in channel.iter_mut().zip(rhs.channels[ch].iter()) {
                *a = add_mod(*a, b, q);
            }
        }
    }
}

impl<const DEGREE: usize> SubAssign<&RnsPoly<DEGREE>> for RnsPoly<DEGREE> {
    fn sub_assign(&mut self, rhs: &RnsPoly<DEGREE>) {
        self.assert_compatible(rhs, "sub_assign");
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for (a, &b) in channel.iter_mut().zip(rhs.channels[ch].iter()) {
                *a = sub_mod(*a, b, q);
            }
        }
    }
}

impl<const DEGREE: usize> MulAssign<&RnsPoly<DEGREE>> for RnsPoly<DEGREE> {
    /// Polynomial multiplication in `Z[X]/(X^N + 1)`.
    ///
    /// In NTT domain this is a pointwise product. Coefficient-domain operands
    /// are taken through the NTT and the result is returned to `self`'s
    /// original domain.
    fn mul_assign(&mut self, rhs: &RnsPoly<DEGREE>) {
        debug_assert!(
            Arc::ptr_eq(&self.basis, &rhs.basis) || self.basis == rhs.basis,
            "mul_assign: basis mismatch"
        );
        let was_ntt = self.in_ntt_domain;
        self.to_ntt_domain();
        let converted;
        let rhs = if rhs.in_ntt_domain {
            rhs
        } else {
            converted = rhs.clone().into_ntt_domain();
            &converted
        };
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for (a, &b) in channel.iter_mut().zip(rhs.channels[ch].iter()) {
                *a = mul_mod(*a, b, q);
            }
        }
        self.set_domain(was_ntt);
    }
}

impl<const DEGREE: usize> Neg for RnsPoly<DEGREE> {
    type Output = Self;

    /// Coefficient-wise negation modulo each `q_i`. Works in both domains.
    fn neg(mut self) -> Self {
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for c in channel.iter_mut() {
                *c = neg_mod(*c, q);
            }
        }
        self
    }
}

macro_rules! impl_binary_by_ref {
    ($trait:ident, $method:ident, $assign:ident) => {
        impl<const DEGREE: usize> $trait<&RnsPoly<DEGREE>> for &RnsPoly<DEGREE> {
            type Output = RnsPoly<DEGREE>;

            fn $method(self, rhs: &RnsPoly<DEGREE>) -> RnsPoly<DEGREE> {
                let mut result = self.clone();
                result.$assign(rhs);
                result
            }
        }
    };
}

impl_binary_by_ref!(Add, add, add_assign);
impl_binary_by_ref!(Sub, sub, sub_assign);
impl_binary_by_ref!(Mul, mul, mul_assign);

impl<const DEGREE: usize> PartialEq for RnsPoly<DEGREE> {
    fn eq(&self, other: &Self) -> bool {
        self.basis == other.basis
            && self.in_ntt_domain == other.in_ntt_domain
            && self.channels == other.channels
    }
}

impl<const DEGREE: usize> Eq for RnsPoly<DEGREE> {}

// ─── NTT kernels (private) ────────────────────────────────────────────────────

// Cooley-Tukey, natural order in, bit-reversed order out.
fn forward_ntt<const DEGREE: usize>(values: &mut [u64; DEGREE], table: &NttTable<DEGREE>) {
    let q = table.modulus;
    let mut t = DEGREE;
    let mut m = 1;
    while m < DEGREE {
        t /= 2;
        for i in 0..m {
            let start = 2 * i * t;
            let twiddle = table.forward_roots[m + i];
            for j in start..start + t {
                let u = values[j];
                let v = mul_mod(values[j + t], twiddle, q);
                values[j] = add_mod(u, v, q);
                values[j + t] = sub_mod(u, v, q);
            }
        }
        m *= 2;
    }
}

// Gentleman-Sande, bit-reversed order in, natural order out.
fn inverse_ntt<const DEGREE: usize>(values: &mut [u64; DEGREE], table: &NttTable<DEGREE>) {
    let q = table.modulus;
    let mut t = 1;
    let mut m = DEGREE;
    while m > 1 {
        let half = m / 2;
        for i in 0..half {
            let start = 2 * i * t;
            let twiddle = table.inverse_roots[half + i];
            for j in start..start + t {
                let u = values[j];
                let v = values[j + t];
                values[j] = add_mod(u, v, q);
                values[j + t] = mul_mod(sub_mod(u, v, q), twiddle, q);
            }
        }
        t *= 2;
        m = half;
    }
    for v in values.iter_mut() {
        *v = mul_mod(*v, table.n_inv, q);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
