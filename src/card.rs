// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

use core::fmt;
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capabilities::ExtendedCapabilities;
use crate::error::{ErrorKind, Result};
use crate::logger::Logger;
use crate::name::parse_cardholder_name;
use crate::source::DataSource;
use crate::tlv::TlvMap;
use crate::types::{
    DataObject, Fingerprints, KeyGenDates, KeyInformation, KeyOrigin, KeyType, FINGERPRINT_LEN,
    KEY_ID_LEN,
};
use crate::utils::upper_hex;

// § 4.2.1
/// Registered application provider identifier of the OpenPGP card application
pub const RID: [u8; 5] = [0xD2, 0x76, 0x00, 0x01, 0x24];
/// Application byte of the AID for OpenPGP
pub const PIX_APPLICATION: u8 = 0x01;
/// Manufacturer ID of Yubico
pub const MANUFACTURER_YUBICO: [u8; 2] = [0x00, 0x06];
/// Bytes of the AID up to and including the serial number
pub const AID_MIN_LEN: usize = 14;

/// Algorithm IDs of RSA, § 4.4.3.10
const RSA_ALGORITHMS: core::ops::RangeInclusive<u8> = 0x01..=0x03;

/// Key slots listed by [`CardData::keys_summary`]
pub const SUMMARY_KEYS: [KeyType; 3] = [
    KeyType::Signature,
    KeyType::Decryption,
    KeyType::Authentication,
];

/// Options for decoding a card.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct Options {
    /// Name of the PC/SC reader, used in the long name of the card
    pub reader: String,
    /// Version of the applet, as reported by the host (e.g. from the firmware version DO)
    pub applet_version: String,
    /// Where diagnostics of the session go
    pub logger: Logger,
}

impl Options {
    /// Options for the card in `reader`, other fields at their default.
    pub fn new(reader: impl Into<String>) -> Self {
        Self {
            reader: reader.into(),
            ..Default::default()
        }
    }
}

/// Identity and key metadata of an OpenPGP card.
///
/// Built once per session from the application related data and the cardholder related data.
/// This is a snapshot: it has to be rebuilt after anything is written to the card.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CardData {
    #[serde(skip)]
    tlv: TlvMap,
    reader: String,
    long_name: String,
    serial: String,
    serial_int: u32,
    rid: String,
    application: String,
    version: String,
    manufacturer: String,
    card_holder: String,
    applet_version: String,
    #[serde(flatten)]
    capabilities: ExtendedCapabilities,
    #[serde(skip)]
    logger: Logger,
}

impl CardData {
    /// Decodes the card from the parsed GET DATA answers.
    ///
    /// `tlv` must hold the application identifier (`6E.4F`).  The cardholder name and the
    /// extended capabilities are optional.
    pub fn new(options: Options, tlv: TlvMap) -> Result<Self> {
        let Options {
            reader,
            applet_version,
            logger,
        } = options;

        let aid = tlv
            .get(DataObject::ApplicationIdentifier.path(), AID_MIN_LEN)
            .map_err(|err| err.during("application_identifier"))?;
        let Some(
            [
                rid @ ..,
                application,
                major,
                minor,
                manufacturer_0,
                manufacturer_1,
                serial_0,
                serial_1,
                serial_2,
                serial_3,
            ],
        ) = aid.get(..AID_MIN_LEN)
        else {
            return Err(ErrorKind::TooShort {
                expected: AID_MIN_LEN,
                actual: aid.len(),
            }
            .during("application_identifier"));
        };

        let serial_bytes = [*serial_0, *serial_1, *serial_2, *serial_3];
        let serial = format!("{serial_0:X}{serial_1:02X}{serial_2:02X}{serial_3:02X}");
        let version = format!("{major:X}.{minor:X}");
        let long_name = format!("{reader} SN {serial} OpenPGP {version}");

        if rid != RID {
            logger.warn(format_args!("Unexpected RID {}", upper_hex(rid)));
        }
        let rid = upper_hex(rid);
        let application = if *application == PIX_APPLICATION {
            format!("{application:02X} (OpenPGP)")
        } else {
            format!("{application:02X}")
        };
        let manufacturer = if [*manufacturer_0, *manufacturer_1] == MANUFACTURER_YUBICO {
            format!("{manufacturer_0:02X}{manufacturer_1:02X} (YubiCo)")
        } else {
            format!("{manufacturer_0:02X}{manufacturer_1:02X}")
        };

        let card_holder = parse_cardholder_name(
            tlv.value(DataObject::CardHolderName.path())
                .unwrap_or_default(),
        );
        let capabilities = ExtendedCapabilities::from_tlv(&tlv)?;

        let card = Self {
            reader,
            long_name,
            serial,
            serial_int: u32::from_be_bytes(serial_bytes),
            application,
            version,
            manufacturer,
            rid,
            card_holder,
            applet_version,
            capabilities,
            logger,
            tlv,
        };
        card.logger.debug(format_args!("Loaded card {}", card.long_name));
        card.logger.trace(format_args!("{:?}", card.capabilities));
        Ok(card)
    }

    /// Reads the application related data and the cardholder related data from `source` and
    /// decodes them.
    ///
    /// A card refusing to return the cardholder related data is read as having no cardholder
    /// name.
    pub fn from_source<S: DataSource>(source: &mut S, options: Options) -> Result<Self> {
        let mut tlv = TlvMap::new();
        tlv.fetch(source, &[DataObject::ApplicationRelatedData])?;
        match tlv.fetch(source, &[DataObject::CardHolderRelatedData]) {
            Err(err) if matches!(err.kind(), ErrorKind::DataSource { .. }) => {
                options
                    .logger
                    .warn(format_args!("No cardholder related data: {err}"));
            }
            res => res?,
        }
        Self::new(options, tlv)
    }

    /// Parsed GET DATA answers the card was built from
    pub fn tlv(&self) -> &TlvMap {
        &self.tlv
    }

    /// Reader the card was found in
    pub fn reader(&self) -> &str {
        &self.reader
    }

    /// `<reader> SN <serial> OpenPGP <version>`
    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    /// Serial number in hexadecimal, as printed on the device
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Serial number as an integer
    pub fn serial_number(&self) -> u32 {
        self.serial_int
    }

    /// Registered application provider identifier
    pub fn rid(&self) -> &str {
        &self.rid
    }

    /// Application byte of the AID
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Version of the OpenPGP card specification implemented by the card
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Manufacturer ID, annotated for known vendors
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Cardholder name in display form, see [`parse_cardholder_name`]
    pub fn cardholder(&self) -> &str {
        &self.card_holder
    }

    /// Applet version as given in [`Options`]
    pub fn applet_version(&self) -> &str {
        &self.applet_version
    }

    /// Optional features of the card
    pub fn capabilities(&self) -> &ExtendedCapabilities {
        &self.capabilities
    }

    /// Algorithm of the key, `RSA <modulus bits>` or `Alg=<id>`.
    pub fn algorithm(&self, key: KeyType) -> Result<String> {
        let object = key
            .algorithm_attributes()
            .ok_or_else(|| ErrorKind::UnsupportedKeyType { key }.during("algorithm"))?;
        let attributes = self
            .tlv
            .get(object.path(), 1)
            .map_err(|err| err.during("algorithm"))?;

        match *attributes {
            [id, modulus_0, modulus_1, ..] if RSA_ALGORITHMS.contains(&id) => Ok(format!(
                "RSA {}",
                u16::from_be_bytes([modulus_0, modulus_1])
            )),
            [id, ..] if RSA_ALGORITHMS.contains(&id) => {
                Err(ErrorKind::NoSuchAlgorithm { value: id }.during("algorithm"))
            }
            [id, ..] => Ok(format!("Alg={id:<4}")),
            [] => Err(ErrorKind::TooShort {
                expected: 1,
                actual: 0,
            }
            .during("algorithm")),
        }
    }

    /// Raw fingerprint of the key
    pub fn fingerprint_bytes(&self, key: KeyType) -> Result<&[u8; FINGERPRINT_LEN]> {
        let fingerprints = self
            .tlv
            .get(DataObject::Fingerprints.path(), 0)
            .map_err(|err| err.during("fingerprint"))?;
        Fingerprints::new(fingerprints)
            .key_part(key)
            .map_err(|err| err.during("fingerprint"))
    }

    /// Fingerprint of the key in uppercase hexadecimal
    pub fn fingerprint(&self, key: KeyType) -> Result<String> {
        self.fingerprint_bytes(key).map(|fp| upper_hex(fp))
    }

    /// Key ID: the last 8 bytes of the fingerprint in uppercase hexadecimal
    pub fn id(&self, key: KeyType) -> Result<String> {
        let fingerprint = self.fingerprint_bytes(key).map_err(|err| err.during("id"))?;
        Ok(upper_hex(&fingerprint[FINGERPRINT_LEN - KEY_ID_LEN..]))
    }

    /// Generation date of the key.
    ///
    /// Cards store `0` for "not specified", which can't be told apart from a key generated at the
    /// epoch.
    pub fn date(&self, key: KeyType) -> Result<DateTime<Utc>> {
        let dates = self
            .tlv
            .get(DataObject::KeyGenerationDates.path(), 0)
            .map_err(|err| err.during("date"))?;
        let seconds = KeyGenDates::new(dates)
            .key_part(key)
            .map(|date| u32::from_be_bytes(*date))
            .map_err(|err| err.during("date"))?;
        Ok((UNIX_EPOCH + Duration::from_secs(seconds.into())).into())
    }

    /// Origin of the key.
    ///
    /// Fails with [`ErrorKind::KeyNotPresent`] if the card has no key information.
    pub fn origin(&self, key: KeyType) -> Result<KeyOrigin> {
        let information = match self.tlv.value(DataObject::KeyInformation.path()) {
            Some(information) if !information.is_empty() => information,
            _ => return Err(ErrorKind::KeyNotPresent.during("origin")),
        };
        let [_reference, status] = *KeyInformation::new(information)
            .key_part(key)
            .map_err(|err| err.during("origin"))?;
        KeyOrigin::from_status(status).map_err(|err| err.during("origin"))
    }

    /// One line of key status: `  <slot>  <algorithm>  <id>  <fingerprint>  <date>  <origin>`
    ///
    /// Fields that can't be decoded are left blank.
    pub fn key_summary(&self, key: KeyType) -> String {
        let algorithm = self.algorithm(key).unwrap_or_default();
        let id = self.id(key).unwrap_or_default();
        let fingerprint = self.fingerprint(key).unwrap_or_default();
        let date = self
            .date(key)
            .map(|date| date.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let origin = self
            .origin(key)
            .map(|origin| format!("{origin:9}"))
            .unwrap_or_default();
        format!(
            "  {}  {algorithm:8}  {id}  {fingerprint:40}  {date}  {origin}",
            key.short_name()
        )
    }

    /// [`key_summary`](Self::key_summary) of the signature, decryption and authentication keys,
    /// one per line
    pub fn keys_summary(&self) -> String {
        let mut summary = String::new();
        for key in SUMMARY_KEYS {
            summary.push_str(&self.key_summary(key));
            summary.push('\n');
        }
        summary
    }
}

impl fmt::Display for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "  Card:            {}", self.long_name)?;
        writeln!(f, "  RID:             {}", self.rid)?;
        writeln!(f, "  Application:     {}", self.application)?;
        writeln!(f, "  Version:         {}", self.version)?;
        writeln!(f, "  Manufacturer:    {}", self.manufacturer)?;
        writeln!(f, "  Serial Number:   {}", self.serial)?;
        writeln!(f, "  Cardholder Name: {}", self.card_holder)
    }
}
