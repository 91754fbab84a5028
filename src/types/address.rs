// Address - Ledger address of a transaction sender
// Principle: No keys here, the ledger already authenticated the sender
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base58 alphabet (no 0, O, I, l)
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Shortest well-formed base58 address
pub const MIN_ADDRESS_LEN: usize = 26;
/// Longest well-formed base58 address
pub const MAX_ADDRESS_LEN: usize = 35;

/// Base58 address as it appears on the ledger
///
/// Only well-formedness is checked. Checksums are the parsing layer's job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate an address string
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let len = s.len();
        if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len) {
            return Err(AddressError::InvalidLength(len));
        }

        if let Some(c) = s.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(AddressError::InvalidCharacter(c));
        }

        Ok(Address(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Address errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid address length: {0} (expected {}-{})", MIN_ADDRESS_LEN, MAX_ADDRESS_LEN)]
    InvalidLength(usize),

    #[error("Invalid base58 character: {0:?}")]
    InvalidCharacter(char),
}
