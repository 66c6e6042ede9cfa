use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an account or node address string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with '{expected}'")]
    InvalidPrefix { expected: char },
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("address payload must be exactly 32 bytes")]
    InvalidPayloadLength,
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 32;
/// Expected string length of an encoded address (prefix + 64 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = 1 + ADDRESS_BYTES * 2;

/// Prefix of account addresses (owners, providers, consumers).
pub const ACCOUNT_PREFIX: char = 'i';
/// Prefix of node addresses.
pub const NODE_PREFIX: char = 'n';

/// Encode 32 raw bytes into the human readable `<prefix><hex>` format.
pub fn encode_address(prefix: char, bytes: &[u8; ADDRESS_BYTES]) -> String {
    let mut encoded = String::with_capacity(ADDRESS_STRING_LENGTH);
    encoded.push(prefix);
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Attempt to decode a human readable address string into the raw bytes.
pub fn decode_address(prefix: char, address: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    if !address.starts_with(prefix) {
        return Err(AddressError::InvalidPrefix { expected: prefix });
    }

    if address.len() != ADDRESS_STRING_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_STRING_LENGTH,
            actual: address.len(),
        });
    }

    let decoded = hex::decode(&address[1..])?;

    let bytes: [u8; ADDRESS_BYTES] = decoded
        .try_into()
        .map_err(|_| AddressError::InvalidPayloadLength)?;

    Ok(bytes)
}

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; ADDRESS_BYTES]);

        impl $name {
            pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0 == [0u8; ADDRESS_BYTES]
            }
        }

        impl From<[u8; ADDRESS_BYTES]> for $name {
            fn from(value: [u8; ADDRESS_BYTES]) -> Self {
                Self(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                encode_address($prefix, &value.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = AddressError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl FromStr for $name {
            type Err = AddressError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_address($prefix, s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_address($prefix, &self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

address_type!(
    /// Account address of an owner, provider or bandwidth consumer.
    Address,
    ACCOUNT_PREFIX
);

address_type!(
    /// Address of a registered node, derived from its operator at registration.
    NodeAddress,
    NODE_PREFIX
);

impl NodeAddress {
    /// Deterministically derive a node address from its operator and the
    /// registry sequence number.
    pub fn derive(owner: &Address, sequence: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"bwhub/node");
        hasher.update(owner.as_bytes());
        hasher.update(&sequence.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        let address = Address::new([0xABu8; ADDRESS_BYTES]);
        let encoded = address.to_string();
        assert!(encoded.starts_with(ACCOUNT_PREFIX));
        assert_eq!(encoded.len(), ADDRESS_STRING_LENGTH);
        assert_eq!(encoded.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn node_prefix_is_not_an_account() {
        let node = NodeAddress::new([1u8; ADDRESS_BYTES]);
        let err = node.to_string().parse::<Address>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidPrefix { expected: 'i' }));
    }

    #[test]
    fn invalid_length_rejected() {
        let bad = "i".to_string() + &"00".repeat(ADDRESS_BYTES - 1);
        let err = bad.parse::<Address>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidLength { .. }));
    }

    #[test]
    fn invalid_hex_rejected() {
        let bad = format!("n{}", "gg".repeat(ADDRESS_BYTES));
        let err = bad.parse::<NodeAddress>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidHex(_)));
    }

    #[test]
    fn derived_node_addresses_are_stable_and_distinct() {
        let owner = Address::new([7u8; ADDRESS_BYTES]);
        assert_eq!(NodeAddress::derive(&owner, 1), NodeAddress::derive(&owner, 1));
        assert_ne!(NodeAddress::derive(&owner, 1), NodeAddress::derive(&owner, 2));
    }

    #[test]
    fn serde_uses_text_form() {
        let address = Address::new([2u8; ADDRESS_BYTES]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
