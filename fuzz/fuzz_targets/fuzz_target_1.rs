// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: CC0-1.0

#![no_main]
use libfuzzer_sys::fuzz_target;
use opcard_info::{CardData, KeyType, Options, Snapshot, TlvMap};
use opcard_info_fuzz::Input;

fuzz_target!(|input: Input| {
    #[cfg(feature = "log")]
    let _ = env_logger::builder().is_test(true).try_init();

    let Input {
        reader,
        application_related_data,
        cardholder_related_data,
        key_information_missing,
    } = input;

    TlvMap::parse(&application_related_data).ok();

    let mut source = Snapshot::new()
        .with(0x6E, application_related_data)
        .with(0x65, cardholder_related_data);
    let Ok(card) = CardData::from_source(&mut source, Options::new(reader)) else {
        return;
    };
    for key in KeyType::iter_all() {
        card.algorithm(key).ok();
        card.fingerprint(key).ok();
        card.id(key).ok();
        card.date(key).ok();
        card.origin(key).ok();
        card.key_summary(key);
    }
    card.keys_summary();
    let _ = card.to_string();

    if key_information_missing {
        let mut tlv = card.tlv().clone();
        tlv.insert("6E.73.DE", Vec::new());
        if let Ok(card) = CardData::new(Options::default(), tlv) {
            for key in KeyType::iter_all() {
                assert!(card.origin(key).is_err_and(|err| err.is_key_not_present()));
            }
        }
    }
});
