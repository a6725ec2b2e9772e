use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::{
    convert::TryInto,
    fmt::{Display, Error, Formatter},
    str::FromStr,
};

pub const HASH_SIZE: usize = 32; // 32 bytes / 256 bits

/// 32 bytes hash, used for transaction hashes and document hashes
/// Displayed and serialized as `0x` prefixed lowercase hex
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub const fn zero() -> Self {
        Hash::new([0; HASH_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; HASH_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; HASH_SIZE] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| "Invalid hex string")?;
        let bytes: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| "Invalid hash")?;
        Ok(Hash::new(bytes))
    }
}

// Hash a byte array using keccak256
#[inline]
pub fn keccak256(value: &[u8]) -> Hash {
    let result: [u8; HASH_SIZE] = Keccak256::digest(value).into();
    Hash(result)
}

impl AsRef<Hash> for Hash {
    fn as_ref(&self) -> &Hash {
        self
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", &self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let hex = String::deserialize(deserializer)?;
        Hash::from_str(&hex).map_err(SerdeError::custom)
    }
}

/// Incremental hasher binding the personal fields and every captured file
/// of a submission into the `documentHash` committed on-chain
///
/// Each input is length-prefixed so that field boundaries cannot shift.
pub struct DocumentHasher {
    inner: Keccak256,
}

impl DocumentHasher {
    pub fn new() -> Self {
        Self {
            inner: Keccak256::new(),
        }
    }

    pub fn field(mut self, value: &str) -> Self {
        self.update(value.as_bytes());
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.update(value);
        self
    }

    pub fn optional_bytes(mut self, value: Option<&[u8]>) -> Self {
        match value {
            Some(bytes) => {
                self.inner.update([1u8]);
                self.update(bytes);
            }
            None => self.inner.update([0u8]),
        }
        self
    }

    fn update(&mut self, value: &[u8]) {
        self.inner.update((value.len() as u64).to_be_bytes());
        self.inner.update(value);
    }

    pub fn finalize(self) -> Hash {
        Hash(self.inner.finalize().into())
    }
}

impl Default for DocumentHasher {
    fn default() -> Self {
        Self::new()
    }
}
