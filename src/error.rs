// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

use core::fmt;

use crate::types::KeyType;

/// Result type.
pub type Result<T> = core::result::Result<T, Error>;

/// Error returned by every decoding operation.
///
/// Carries the [`ErrorKind`] and, once it has crossed a decoder boundary, the name of the field
/// or operation that failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    context: Option<&'static str>,
}

impl Error {
    /// Create a new [`Error`] without annotation
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Get the [`ErrorKind`] which occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Name of the field or operation that failed, if known.
    pub fn context(&self) -> Option<&'static str> {
        self.context
    }

    /// Annotate the error with the operation it happened in.
    ///
    /// The innermost annotation is kept: it names the field closest to the failure.
    pub fn during(self, context: &'static str) -> Self {
        Self {
            kind: self.kind,
            context: self.context.or(Some(context)),
        }
    }

    /// Shorthand for `matches!(err.kind(), ErrorKind::KeyNotPresent)`
    pub fn is_key_not_present(&self) -> bool {
        matches!(self.kind, ErrorKind::KeyNotPresent)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = self.context {
            write!(f, "{context}: ")?;
        }
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Error kinds.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Operation invoked on an absent record, or the key slot holds nothing
    #[error("key not present")]
    KeyNotPresent,

    /// Tag path missing from the decoded data
    #[error("no such tag: {path}")]
    NoSuchTag {
        /// Dotted tag path that was looked up
        path: String,
    },

    /// Algorithm identifier outside of the known range
    #[error("no such algorithm: {value:#04x}")]
    NoSuchAlgorithm {
        /// Raw algorithm byte
        value: u8,
    },

    /// Key origin outside of the known range
    #[error("unknown key origin: {value:#04x}")]
    UnknownKeyOrigin {
        /// Raw origin byte
        value: u8,
    },

    /// 1-based byte or range access out of bounds
    #[error("not found")]
    NotFound,

    /// Value present but shorter than required
    #[error("too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum number of bytes needed
        expected: usize,
        /// Number of bytes available
        actual: usize,
    },

    /// The key slot has no data object for the requested field
    #[error("unsupported key type: {key}")]
    UnsupportedKeyType {
        /// Requested key slot
        key: KeyType,
    },

    /// Declared length exceeds the remaining input
    #[error("BER-TLV data is truncated")]
    Truncated,

    /// Length field that cannot be decoded (indefinite or wider than 4 bytes)
    #[error("invalid BER-TLV length encoding: {first_byte:#04x}")]
    InvalidLength {
        /// First byte of the length field
        first_byte: u8,
    },

    /// Value too long to have its length encoded
    #[error("BER-TLV value is too long")]
    Overlength,

    /// Constructed data objects nested too deeply
    #[error("BER-TLV data nested deeper than {max} levels")]
    TooDeep {
        /// Maximum nesting supported
        max: usize,
    },

    /// Tag number wider than 4 bytes
    #[error("BER-TLV tag longer than 4 bytes")]
    TagTooLong,

    /// The data source failed to answer a GET DATA request
    #[error("failed to get data for tag {tag:04X}: {message}")]
    DataSource {
        /// Requested tag
        tag: u16,
        /// Error reported by the data source
        message: String,
    },
}

impl ErrorKind {
    /// Annotate an [`ErrorKind`] with the operation it occurred in, returning an error.
    pub fn during(self, context: &'static str) -> Error {
        Error::new(self).during(context)
    }
}
