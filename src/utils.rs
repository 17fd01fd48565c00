// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Bounds-checked access to data objects using the 1-based byte numbering of the OpenPGP card
//! specification ("byte 1", "bytes 3-4"), so that decoders read like the tables of § 4.4.

use crate::error::{ErrorKind, Result};

/// Returns byte number `position` (1-based) of `data`.
pub fn byte_at(data: &[u8], position: usize) -> Result<u8> {
    position
        .checked_sub(1)
        .and_then(|index| data.get(index))
        .copied()
        .ok_or_else(|| ErrorKind::NotFound.into())
}

/// Returns bytes `start` to `end` (1-based, inclusive) of `data`.
pub fn byte_range(data: &[u8], start: usize, end: usize) -> Result<&[u8]> {
    if start == 0 || start > end {
        return Err(ErrorKind::NotFound.into());
    }
    data.get(start - 1..end)
        .ok_or_else(|| ErrorKind::NotFound.into())
}

/// Uppercase hexadecimal without separators
pub fn upper_hex(data: &[u8]) -> String {
    hex::encode_upper(data)
}
