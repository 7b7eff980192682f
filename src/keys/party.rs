use std::fmt;

/// Identifier of a party (or of a group acting as one party).
///
/// The identifier `"0"` names the common ciphertext component and is never
/// issued to a party.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartyId(String);

impl PartyId {
    pub const COMMON: &'static str = "0";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_common(&self) -> bool {
        self.0 == Self::COMMON
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<&str> for PartyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PartyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
