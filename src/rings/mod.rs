//! RNS representation of `Z_Q[X]/(X^N + 1)` with a negacyclic NTT per prime.

pub mod basis;
pub mod conversion;
pub mod errors;
pub mod poly;

pub use basis::{NttTable, RnsBasis};
pub use conversion::{BasisConverter, Decomposer, decompose, divide_by_tail};
pub use errors::{RnsNttError, RnsNttResult};
pub use poly::RnsPoly;
