// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: CC0-1.0

use arbitrary::Arbitrary;

/// GET DATA answers of a card
#[derive(Arbitrary, Debug)]
pub struct Input {
    pub reader: String,
    pub application_related_data: Vec<u8>,
    pub cardholder_related_data: Vec<u8>,
    pub key_information_missing: bool,
}
