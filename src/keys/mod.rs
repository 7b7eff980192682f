pub mod galois_key;
pub mod key_set;
pub mod party;
pub mod public_key;
pub mod relin_key;
pub mod secret_key;
pub mod switching_key;

pub use galois_key::{ConjugationKey, RotationKey};
pub use key_set::{
    ConjugationKeySet, KeyKind, KeySet, PublicKeySet, RelinearizationKeySet,
    RotationKeySet, SecretKeySet, SwitchingKeySet,
};
pub use party::PartyId;
pub use public_key::PublicKey;
pub use relin_key::RelinearizationKey;
pub use secret_key::SecretKey;
pub use switching_key::{GadgetVector, SwitchingKey};
