use thiserror::Error;

use crate::{
    keys::PartyId,
    params::{CrsTarget, ParameterError},
    rings::RnsNttError,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MkError {
    #[error("randomness source unavailable: {0}")]
    Entropy(String),

    #[error("party identifier {0} is reserved for the common component")]
    ReservedPartyId(PartyId),

    #[error("invalid hamming weight {weight} for degree {degree}")]
    InvalidHammingWeight { weight: usize, degree: usize },

    #[error("cannot aggregate an empty key list")]
    EmptyKeyList,

    #[error("cannot multiply an empty list of ciphertexts")]
    EmptyCiphertextList,

    #[error("party identifier mismatch: expected {expected}, got {actual}")]
    PartyMismatch { expected: PartyId, actual: PartyId },

    #[error("rotation index mismatch: expected {expected}, got {actual}")]
    RotationMismatch { expected: usize, actual: usize },

    #[error("no common reference string provisioned for {0}")]
    MissingCrs(CrsTarget),

    #[error("no secret key or decryption share for party {0}")]
    MissingSecretKey(PartyId),

    #[error("no {kind} key for party {id}")]
    MissingEvaluationKey { kind: &'static str, id: PartyId },

    #[error("ciphertext has no component for party {0}")]
    MissingComponent(PartyId),

    #[error("a {kind} key for party {id} is already present")]
    DuplicateKey { kind: &'static str, id: PartyId },

    #[error("Scale mismatch: expected {expected:.2}, got {actual:.2}")]
    ScaleMismatch { expected: f64, actual: f64 },

    #[error("{count} coefficients do not fit a ring of degree {degree}")]
    TooManyCoefficients { count: usize, degree: usize },

    #[error("value {value} does not fit the coefficient range at the given scale")]
    ValueOutOfRange { value: f64 },

    #[error("ciphertext components are defined over different bases")]
    BasisMismatch,

    #[error("expected {expected} switching-key contributions, got {actual}")]
    ContributionCount { expected: usize, actual: usize },

    #[error("join request was prepared against a different aggregate switching key")]
    StaleJoinRequest,

    #[error("ciphertext is already at level 0")]
    LevelExhausted,

    #[error("cannot move from level {current} to level {requested}")]
    InvalidLevel { current: usize, requested: usize },

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Ring(#[from] RnsNttError),
}

pub type MkResult<T> = Result<T, MkError>;

/// Scales are tracked as `f64` and pass through divisions on rescale, so two
/// scales are treated as equal within a relative tolerance.
pub(crate) fn check_scale(expected: f64, actual: f64) -> MkResult<()> {
    if (expected - actual).abs() <= expected.abs() * 1e-9 {
        Ok(())
    } else {
        Err(MkError::ScaleMismatch { expected, actual })
    }
}
