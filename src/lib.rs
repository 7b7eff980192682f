pub mod ciphertext;
pub mod decryptor;
pub mod encryptor;
pub mod errors;
pub mod evaluator;
pub mod join;
pub mod keygen;
pub mod keys;
pub mod math;
pub mod params;
pub mod rings;

pub use ciphertext::{Ciphertext, Plaintext};
pub use decryptor::{DecryptionShare, Decryptor};
pub use encryptor::Encryptor;
pub use errors::{MkError, MkResult};
pub use evaluator::{Evaluator, KeySwitcher};
pub use join::{
    GroupKeys, GroupSetup, JoinRequest, KeyRegistry, MemberKeys, MemberPublicKeys, join_group,
};
pub use keygen::KeyGenerator;
pub use keys::{
    ConjugationKey, ConjugationKeySet, GadgetVector, PartyId, PublicKey, PublicKeySet,
    RelinearizationKey, RelinearizationKeySet, RotationKey, RotationKeySet, SecretKey,
    SecretKeySet, SwitchingKey, SwitchingKeySet,
};
pub use params::{CrsTarget, ParameterError, Parameters, ParametersBuilder};
pub use rings::{RnsBasis, RnsPoly};
