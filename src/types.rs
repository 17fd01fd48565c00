// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

use core::fmt;

use serde_repr::Serialize_repr;

use crate::error::{Error, ErrorKind, Result};

/// Creates a `#[repr(u8)]` enum with a checked `TryFrom<u8>` and an `iter_all` associated
/// function giving an iterator over all variants
macro_rules! enum_u8 {
    (
        $(#[$outer:meta])*
        $vis:vis enum $name:ident else($err:expr) {
            $($(#[$attr:meta])* $var:ident = $num:expr),+
            $(,)*
        }
    ) => {
        $(#[$outer])*
        #[repr(u8)]
        $vis enum $name {
            $(
                $(#[$attr])*
                $var = $num,
            )*
        }

        impl TryFrom<u8> for $name {
            type Error = Error;
            fn try_from(val: u8) -> ::core::result::Result<Self, Error> {
                match val {
                    $(
                        $num => Ok($name::$var),
                    )*
                    _ => Err(($err)(val).into())
                }
            }
        }

        #[allow(unused)]
        impl $name {
            /// Returns an iterator over all of the enum's members
            $vis fn iter_all() -> impl Iterator<Item = Self> {
                [
                    $(
                        $name::$var,
                    )*
                ].into_iter()
            }
        }
    }
}
pub(crate) use enum_u8;

enum_u8! {
    /// Key slots of the card, in the order used by the packed per-key data objects
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr)]
    pub enum KeyType else(|_| ErrorKind::NotFound) {
        /// Signature key
        Signature = 0,
        /// Decryption key
        Decryption = 1,
        /// Authentication key
        Authentication = 2,
        /// Attestation key (Yubico extension)
        Attestation = 3,
    }
}

impl KeyType {
    /// Position of the key in packed data objects
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Three letter name used by GnuPG's card status output
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Signature => "Sig",
            Self::Decryption => "Dec",
            Self::Authentication => "Aut",
            Self::Attestation => "Att",
        }
    }

    /// Algorithm attributes data object of the key, if the card has one for it
    pub const fn algorithm_attributes(self) -> Option<DataObject> {
        match self {
            Self::Signature => Some(DataObject::AlgorithmAttributesSignature),
            Self::Decryption => Some(DataObject::AlgorithmAttributesDecryption),
            Self::Authentication => Some(DataObject::AlgorithmAttributesAuthentication),
            Self::Attestation => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Signature => "signature",
            Self::Decryption => "decryption",
            Self::Authentication => "authentication",
            Self::Attestation => "attestation",
        };
        f.pad(name)
    }
}

enum_u8! {
    /// Provenance of a key
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize_repr)]
    pub enum KeyOrigin else(|value| ErrorKind::UnknownKeyOrigin { value }) {
        /// Slot is empty
        Empty = 0,
        /// From GENERATE ASYMMETRIC KEY PAIR
        Generated = 1,
        /// From PUT DATA
        Imported = 2,
        /// No key information on the card
        #[default]
        NotPresent = 0xFF,
    }
}

impl KeyOrigin {
    /// Highest status byte that can be found in the key information data object
    pub const LAST: Self = Self::Imported;

    /// Decodes the status byte of the key information data object
    pub fn from_status(value: u8) -> Result<Self> {
        if value > Self::LAST as u8 {
            return Err(ErrorKind::UnknownKeyOrigin { value }.into());
        }
        Self::try_from(value)
    }
}

impl fmt::Display for KeyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotPresent => "not present",
            Self::Empty => "empty",
            Self::Generated => "generated",
            Self::Imported => "imported",
        };
        f.pad(name)
    }
}

/// Data objects read by this crate and their tag path in the GET DATA answers
///
/// See § 4.4.1 of the OpenPGP card specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataObject {
    /// Application Related Data, constructed
    ApplicationRelatedData,
    /// Cardholder Related Data, constructed
    CardHolderRelatedData,
    /// Full application identifier (AID), ISO 7816-4
    ApplicationIdentifier,
    /// Name of the cardholder, ISO 7501-1 formatting
    CardHolderName,
    /// Discretionary data objects, constructed
    DiscretionaryDataObjects,
    /// Extended capabilities, 10 bytes
    ExtendedCapabilities,
    /// Algorithm attributes of the signature key
    AlgorithmAttributesSignature,
    /// Algorithm attributes of the decryption key
    AlgorithmAttributesDecryption,
    /// Algorithm attributes of the authentication key
    AlgorithmAttributesAuthentication,
    /// Fingerprints of the three keys, 20 bytes each
    Fingerprints,
    /// Generation dates of the three keys, 4 bytes each
    KeyGenerationDates,
    /// Key reference and status byte for each key
    KeyInformation,
}

impl DataObject {
    /// Tag used in GET DATA
    pub const fn tag(self) -> u16 {
        match self {
            Self::ApplicationRelatedData => 0x006E,
            Self::CardHolderRelatedData => 0x0065,
            Self::ApplicationIdentifier => 0x004F,
            Self::CardHolderName => 0x005B,
            Self::DiscretionaryDataObjects => 0x0073,
            Self::ExtendedCapabilities => 0x00C0,
            Self::AlgorithmAttributesSignature => 0x00C1,
            Self::AlgorithmAttributesDecryption => 0x00C2,
            Self::AlgorithmAttributesAuthentication => 0x00C3,
            Self::Fingerprints => 0x00C5,
            Self::KeyGenerationDates => 0x00CD,
            Self::KeyInformation => 0x00DE,
        }
    }

    /// Dotted tag path in a [`TlvMap`](crate::tlv::TlvMap)
    pub const fn path(self) -> &'static str {
        match self {
            Self::ApplicationRelatedData => "6E",
            Self::CardHolderRelatedData => "65",
            Self::ApplicationIdentifier => "6E.4F",
            Self::CardHolderName => "65.5B",
            Self::DiscretionaryDataObjects => "6E.73",
            Self::ExtendedCapabilities => "6E.73.C0",
            Self::AlgorithmAttributesSignature => "6E.73.C1",
            Self::AlgorithmAttributesDecryption => "6E.73.C2",
            Self::AlgorithmAttributesAuthentication => "6E.73.C3",
            Self::Fingerprints => "6E.73.C5",
            Self::KeyGenerationDates => "6E.73.CD",
            Self::KeyInformation => "6E.73.DE",
        }
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Data object holding one fixed-width entry per key, concatenated in [`KeyType`] order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedKeyArray<'a, const WIDTH: usize>(&'a [u8]);

impl<'a, const WIDTH: usize> PackedKeyArray<'a, WIDTH> {
    /// Wraps the raw value of the data object
    pub const fn new(data: &'a [u8]) -> Self {
        Self(data)
    }

    /// Offset of the entry of `key`
    pub const fn key_offset(key: KeyType) -> usize {
        key.ordinal() * WIDTH
    }

    /// Entry of `key`, failing if the data object is too short to hold it
    pub fn key_part(&self, key: KeyType) -> Result<&'a [u8; WIDTH]> {
        let offset = Self::key_offset(key);
        let expected = offset + WIDTH;
        self.0
            .get(offset..expected)
            .and_then(|part| part.try_into().ok())
            .ok_or_else(|| {
                ErrorKind::TooShort {
                    expected,
                    actual: self.0.len(),
                }
                .into()
            })
    }
}

/// Length of a key fingerprint
pub const FINGERPRINT_LEN: usize = 20;
/// Length of a key generation date
pub const KEY_DATE_LEN: usize = 4;
/// Length of the key ID, the trailing part of the fingerprint
pub const KEY_ID_LEN: usize = 8;

/// `6E.73.C5`: fingerprints, 20 bytes per key
pub type Fingerprints<'a> = PackedKeyArray<'a, FINGERPRINT_LEN>;
/// `6E.73.CD`: generation dates, 4 bytes per key, big endian seconds since the epoch
pub type KeyGenDates<'a> = PackedKeyArray<'a, KEY_DATE_LEN>;
/// `6E.73.DE`: (key reference, status) for each key
pub type KeyInformation<'a> = PackedKeyArray<'a, 2>;
