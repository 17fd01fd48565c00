// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only
#![allow(unused)]

use std::cell::RefCell;
use std::rc::Rc;

use hex_literal::hex;
use opcard_info::tlv::encode_do;
use opcard_info::{CardData, DataSource, Options};

pub const READER: &str = "Yubico YubiKey OTP FIDO CCID 00 00";

pub const AID: [u8; 16] = hex!("D2 76 00 01 24 01 03 04 00 06 0F 1E 2D 3C 00 00");
pub const EXTENDED_CAPABILITIES: [u8; 10] = hex!("7D 00 0BFE 0800 00FF 00 00");
pub const SIGNATURE_FINGERPRINT: [u8; 20] = hex!("6B2F 6A80 3E43 4B9C 8A32 D6E1 A5C4 9F38 0D1E 2F70");
pub const DECRYPTION_FINGERPRINT: [u8; 20] = hex!("1D9A 2C06 0B5E 8F47 6C30 E2D1 9B84 57A3 F0C2 1E64");
/// 2019-03-14T09:27:28Z, 2019-03-14T09:27:29Z, not specified
pub const DATES: [u8; 12] = hex!("5C8A1E80 5C8A1E81 00000000");

fn tlv(tag: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_do(tag, value, &mut out).unwrap();
    out
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// Application related data of a YubiKey 5 with an RSA 2048 signature key, a Curve25519
/// decryption key and no authentication key
pub fn application_related_data() -> Vec<u8> {
    let mut fingerprints = Vec::new();
    fingerprints.extend_from_slice(&SIGNATURE_FINGERPRINT);
    fingerprints.extend_from_slice(&DECRYPTION_FINGERPRINT);
    fingerprints.extend_from_slice(&[0; 20]);

    let discretionary = concat(&[
        tlv(&[0xC0], &EXTENDED_CAPABILITIES),
        tlv(&[0xC1], &hex!("01 0800 0020 00")),
        tlv(&[0xC2], &hex!("12 2B060104019755010501")),
        tlv(&[0xC3], &hex!("16 2B06010401DA470F01")),
        tlv(&[0xC4], &hex!("00 7F 7F 7F 03 00 03")),
        tlv(&[0xC5], &fingerprints),
        tlv(&[0xC6], &[0; 60]),
        tlv(&[0xCD], &DATES),
        tlv(&[0xDE], &hex!("01 01 02 02 03 00 81 00 82 00 83 00")),
    ]);
    let value = concat(&[
        tlv(&[0x4F], &AID),
        tlv(&[0x5F, 0x52], &hex!("0073 0000 E0 05 90 00")),
        tlv(&[0x7F, 0x74], &tlv(&[0x81], &[0x20])),
        tlv(&[0x73], &discretionary),
    ]);
    tlv(&[0x6E], &value)
}

/// Cardholder related data for `DOE<<JOHN`
pub fn cardholder_related_data() -> Vec<u8> {
    tlv(
        &[0x65],
        &concat(&[
            tlv(&[0x5B], b"DOE<<JOHN"),
            tlv(&[0x5F, 0x2D], b"en"),
            tlv(&[0x5F, 0x35], b"9"),
        ]),
    )
}

#[derive(Debug, thiserror::Error)]
#[error("card returned status {0:04X}")]
pub struct StatusError(pub u16);

/// Answers GET DATA like a card, recording every request
#[derive(Clone, Debug, Default)]
pub struct FakeCard {
    pub application_related_data: Option<Vec<u8>>,
    pub cardholder_related_data: Option<Vec<u8>>,
    pub requests: Rc<RefCell<Vec<u16>>>,
}

impl FakeCard {
    pub fn yubikey() -> Self {
        Self {
            application_related_data: Some(application_related_data()),
            cardholder_related_data: Some(cardholder_related_data()),
            requests: Default::default(),
        }
    }
}

impl DataSource for FakeCard {
    type Error = StatusError;

    fn get_data(&mut self, tag: u16) -> Result<Vec<u8>, StatusError> {
        self.requests.borrow_mut().push(tag);
        let answer = match tag {
            0x6E => self.application_related_data.clone(),
            0x65 => self.cardholder_related_data.clone(),
            _ => None,
        };
        answer.ok_or(StatusError(0x6A88))
    }
}

pub fn with_card<F: FnOnce(CardData) -> R, R>(f: F) -> R {
    let mut card = FakeCard::yubikey();
    let data = CardData::from_source(&mut card, Options::new(READER)).unwrap();
    f(data)
}
