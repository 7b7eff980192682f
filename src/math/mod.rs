pub mod modular;
pub mod primes;
pub mod sampling;

pub use primes::{is_ntt_friendly_prime, is_prime, ntt_prime_chain};
pub use sampling::{
    gaussian_coefficients, ternary_coefficients, ternary_density_coefficients,
    uniform_coefficients,
};
