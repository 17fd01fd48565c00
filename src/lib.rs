// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! This crate decodes what an [OpenPGP smart card v3.4][spec] reports about itself: identity,
//! cardholder, key metadata and optional features.
//!
//! [spec]: https://gnupg.org/ftp/specs/OpenPGP-smart-card-application-3.4.pdf
//!
//! # Data sources
//!
//! Talking to the card is left to the user of this crate.  Anything that can answer GET DATA for
//! a tag implements [`DataSource`]; [`Snapshot`] replays recorded answers.  The answers are
//! flattened into a [`TlvMap`], which addresses every data object by its dotted tag path
//! (`"6E.73.C5"`).
//!
//! # Decoding
//!
//! [`CardData`] is built once per session from the application related data (`6E`) and the
//! cardholder related data (`65`).  It can be configured using [`Options`].  The per-key accessors
//! ([`CardData::algorithm`], [`CardData::fingerprint`], ...) decode lazily, so a malformed key
//! slot doesn't prevent reading the others.  [`CardState`] holds the card of a session and answers
//! with [`ErrorKind::KeyNotPresent`] while none is loaded.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    non_ascii_idents,
    trivial_casts,
    unused,
    unused_qualifications,
    clippy::expect_used,
    clippy::unwrap_used
)]
#![deny(unsafe_code)]

pub mod capabilities;
mod card;
mod error;
mod logger;
pub mod name;
mod source;
mod state;
pub mod tlv;
pub mod types;
mod utils;

pub use capabilities::{CapabilityFlags, ExtendedCapabilities, SecureMessagingAlgorithm};
pub use card::{CardData, Options};
pub use error::{Error, ErrorKind, Result};
pub use logger::Logger;
pub use name::{parse_cardholder_name, NAME_NOT_SET};
pub use source::{DataSource, ReferencedDataNotFound, Snapshot};
pub use state::CardState;
pub use tlv::TlvMap;
pub use types::{DataObject, KeyOrigin, KeyType};
pub use utils::{byte_at, byte_range};
