use thiserror::Error;

/// Errors raised while parsing hashes and addresses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Input is not valid hexadecimal
    #[error("Invalid hex string")]
    InvalidHex,

    /// Decoded bytes have the wrong length
    #[error("Invalid length: {got} bytes, expected: {expected} bytes")]
    InvalidLength { expected: usize, got: usize },
}
