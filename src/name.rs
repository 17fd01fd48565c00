// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Cardholder name, stored as `SURNAME<<GIVEN<NAMES` following ISO/IEC 7501-1

/// Rendered in place of an empty name
pub const NAME_NOT_SET: &str = "[not set]";

const NAME_SEPARATOR: &str = "<<";
const FILLER: char = '<';

/// Converts the raw cardholder name into display form: given names first, then on a new line the
/// surname with fillers replaced by spaces.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn parse_cardholder_name(raw: &[u8]) -> String {
    if raw.is_empty() {
        return NAME_NOT_SET.into();
    }

    let raw = String::from_utf8_lossy(raw);
    let (surname, given) = raw.split_once(NAME_SEPARATOR).unwrap_or((&raw, ""));

    let mut name = String::with_capacity(raw.len() + 1);
    name.push_str(given);
    if !given.is_empty() {
        name.push('\n');
    }
    name.extend(surname.chars().map(|c| if c == FILLER { ' ' } else { c }));
    name
}
