use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal, Uniform};

/// Samples uniform integer coefficients in `[0, max_value)`.
///
/// # Panics
///
/// Panics if `max_value == 0`.
pub fn uniform_coefficients<const DEGREE: usize, R: Rng + ?Sized>(
    max_value: u64,
    rng: &mut R,
) -> [u64; DEGREE] {
    let distribution = Uniform::new(0, max_value).unwrap_or_else(|_| {
        panic!(
            "uniform_coefficients: invalid range [0, {max_value}), \
            max_value must be positive"
        )
    });
    let mut coeffs = [0u64; DEGREE];
    for coeff in &mut coeffs {
        *coeff = distribution.sample(rng);
    }
    coeffs
}

/// Samples rounded Gaussian integers from `N(0, std_dev)`, resampling any
/// draw whose magnitude exceeds `bound`.
///
/// # Panics
///
/// Panics if `std_dev` is not finite and positive, or if `bound < 1`.
pub fn gaussian_coefficients<const DEGREE: usize, R: Rng + ?Sized>(
    std_dev: f64,
    bound: f64,
    rng: &mut R,
) -> [i64; DEGREE] {
    assert!(
        std_dev.is_finite() && std_dev > 0.0,
        "gaussian_coefficients: std_dev must be finite and positive"
    );
    assert!(bound >= 1.0, "gaussian_coefficients: bound must be at least 1");
    let normal = Normal::new(0.0, std_dev)
        .expect("gaussian_coefficients: failed to create Normal distribution");
    let mut coeffs = [0i64; DEGREE];

    for coeff in &mut coeffs {
        let sample = loop {
            let draw = normal.sample(rng).round();
            if draw.abs() <= bound {
                break draw;
            }
        };
        *coeff = sample as i64;
    }

    coeffs
}

/// Samples a ternary vector with coefficients in `{-1, 0, 1}`.
///
/// Exactly `hamming_weight` entries are non-zero.
///
/// # Panics
///
/// Panics if `hamming_weight > DEGREE`.
pub fn ternary_coefficients<const DEGREE: usize, R: Rng + ?Sized>(
    hamming_weight: usize,
    rng: &mut R,
) -> [i64; DEGREE] {
    assert!(
        hamming_weight <= DEGREE,
        "ternary_coefficients: hamming_weight must be <= DEGREE"
    );
    let mut out = [0i64; DEGREE];
    // Shuffle indices and assign signs on the selected support.
    let mut indices: Vec<usize> = (0..DEGREE).collect();
    indices.shuffle(rng);
    for &idx in indices.iter().take(hamming_weight) {
        out[idx] = if rng.random_bool(0.5) { 1 } else { -1 };
    }
    out
}

/// Samples a ternary vector where each entry is non-zero with probability
/// `density`, split evenly between `1` and `-1`.
///
/// # Panics
///
/// Panics if `density` is outside `(0, 1]`.
pub fn ternary_density_coefficients<const DEGREE: usize, R: Rng + ?Sized>(
    density: f64,
    rng: &mut R,
) -> [i64; DEGREE] {
    assert!(
        density > 0.0 && density <= 1.0,
        "ternary_density_coefficients: density must be in (0, 1]"
    );
    let mut out = [0i64; DEGREE];
    for coeff in &mut out {
        if rng.random_bool(density) {
            *coeff = if rng.random_bool(0.5) { 1 } else { -1 };
        }
    }
    out
}
