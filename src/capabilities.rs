// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Extended capabilities, § 4.4.3.7 of the OpenPGP card specification
//!
//! | Byte | Content                                           |
//! |------|---------------------------------------------------|
//! | 1    | Feature bit field, see [`CapabilityFlags`]         |
//! | 2    | Secure messaging algorithm                        |
//! | 3-4  | Maximum length of a challenge for GET CHALLENGE   |
//! | 5-6  | Maximum length of cardholder certificates         |
//! | 7-8  | Maximum length of special DOs                     |
//! | 9    | PIN block 2 format supported (`01`) or not (`00`) |
//! | 10   | MSE command supported (`01`) or not (`00`)        |

use bitflags::bitflags;
use serde::Serialize;
use serde_repr::Serialize_repr;

use crate::error::{Error, ErrorKind, Result};
use crate::tlv::TlvMap;
use crate::types::{enum_u8, DataObject};
use crate::utils::{byte_at, byte_range};

/// Expected length of the extended capabilities data object
pub const EXTENDED_CAPABILITIES_LEN: usize = 10;

bitflags! {
    /// Byte 1 of the extended capabilities
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CapabilityFlags: u8 {
        /// b8: Secure messaging supported
        const SECURE_MESSAGING = 1 << 7;
        /// b7: GET CHALLENGE supported
        const GET_CHALLENGE = 1 << 6;
        /// b6: Key import supported
        const KEY_IMPORT = 1 << 5;
        /// b5: PW status changeable
        const PW_STATUS_CHANGEABLE = 1 << 4;
        /// b4: Private use DOs supported
        const PRIVATE_USE_DOS = 1 << 3;
        /// b3: Algorithm attributes changeable
        const ALGORITHM_ATTRIBUTES_CHANGEABLE = 1 << 2;
        /// b2: PSO:DEC/ENC with AES
        const PSO_DEC_ENC_WITH_AES = 1 << 1;
        /// b1: KDF-DO supported
        const KDF = 1;
    }
}

enum_u8! {
    /// Secure messaging algorithm (byte 2)
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize_repr)]
    pub enum SecureMessagingAlgorithm else(|value| ErrorKind::NoSuchAlgorithm { value }) {
        /// No or proprietary secure messaging
        #[default]
        None = 0,
        /// AES 128 bit
        Aes128 = 1,
        /// AES 256 bit
        Aes256 = 2,
        /// SCP11b
        Scp11b = 3,
    }
}

impl SecureMessagingAlgorithm {
    /// Highest algorithm identifier known
    pub const LAST: Self = Self::Scp11b;
}

/// Optional features advertised by the card
///
/// Every field stays at its default when the card doesn't send extended capabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtendedCapabilities {
    /// Secure messaging advertised
    pub secure_messaging_supported: bool,
    /// Algorithm used for secure messaging, meaningful if supported
    pub secure_messaging: SecureMessagingAlgorithm,
    /// GET CHALLENGE advertised
    pub get_challenge_supported: bool,
    /// Maximum length of a challenge, `0` if GET CHALLENGE is not supported
    pub maximum_challenge_length: u16,
    /// Keys can be imported
    pub key_import_supported: bool,
    /// The PW1 status byte can be changed
    #[serde(rename = "PWStatusChangeable")]
    pub pw_status_changeable: bool,
    /// Private use data objects are available
    #[serde(rename = "PrivateUseDOsSupported")]
    pub private_use_dos_supported: bool,
    /// Algorithm attributes can be changed
    pub algorithm_attributes_changeable: bool,
    /// PSO:DECIPHER and PSO:ENCIPHER work with an AES key
    #[serde(rename = "SupportsPSODecryptionEncryptionWithAES")]
    pub supports_pso_dec_enc_with_aes: bool,
    /// KDF-DO available
    #[serde(rename = "KDFSupported")]
    pub kdf_supported: bool,
    /// Maximum length of cardholder certificates
    pub maximum_cardholder_certificates_length: u16,
    /// Maximum length of special DOs (private use, login data, URL, ...)
    #[serde(rename = "MaximumSpecialDOsLength")]
    pub maximum_special_dos_length: u16,
    /// PIN block 2 format supported
    pub pin_block_2_supported: bool,
    /// MANAGE SECURITY ENVIRONMENT supported
    #[serde(rename = "MSECommandSupported")]
    pub mse_command_supported: bool,
}

impl ExtendedCapabilities {
    /// Reads the extended capabilities from the application related data.
    ///
    /// Cards that predate version 2.0 don't have the data object: the defaults are returned.
    pub fn from_tlv(tlv: &TlvMap) -> Result<Self> {
        match tlv.value(DataObject::ExtendedCapabilities.path()) {
            Some(data) => Self::decode(data).map_err(|err| err.during("extended_capabilities")),
            None => Ok(Self::default()),
        }
    }

    /// Decodes the value of the extended capabilities data object.
    ///
    /// Bytes 2 and 3-4 are only read when their bit of byte 1 is set.  Any byte that is needed but
    /// missing is an error: a present but malformed data object is never silently ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let flags = CapabilityFlags::from_bits_retain(
            byte_at(data, 1).map_err(|err| err.during("capabilities"))?,
        );

        let mut caps = Self {
            key_import_supported: flags.contains(CapabilityFlags::KEY_IMPORT),
            pw_status_changeable: flags.contains(CapabilityFlags::PW_STATUS_CHANGEABLE),
            private_use_dos_supported: flags.contains(CapabilityFlags::PRIVATE_USE_DOS),
            algorithm_attributes_changeable: flags
                .contains(CapabilityFlags::ALGORITHM_ATTRIBUTES_CHANGEABLE),
            supports_pso_dec_enc_with_aes: flags.contains(CapabilityFlags::PSO_DEC_ENC_WITH_AES),
            kdf_supported: flags.contains(CapabilityFlags::KDF),
            ..Default::default()
        };

        if flags.contains(CapabilityFlags::SECURE_MESSAGING) {
            let algorithm = byte_at(data, 2).map_err(|err| err.during("secure_messaging"))?;
            caps.secure_messaging = secure_messaging_algorithm(algorithm)?;
            caps.secure_messaging_supported = true;
        }

        if flags.contains(CapabilityFlags::GET_CHALLENGE) {
            caps.maximum_challenge_length = byte_range(data, 3, 4)
                .and_then(be_u16)
                .map_err(|err| err.during("max_challenge_length"))?;
            caps.get_challenge_supported = true;
        }

        caps.maximum_cardholder_certificates_length = byte_range(data, 5, 6)
            .and_then(be_u16)
            .map_err(|err| err.during("max_cardholder_certificates_length"))?;
        caps.maximum_special_dos_length = byte_range(data, 7, 8)
            .and_then(be_u16)
            .map_err(|err| err.during("max_special_dos_length"))?;

        caps.pin_block_2_supported = byte_at(data, 9)
            .map_err(|err| err.during("pin_block_2_supported"))?
            & 0x01
            == 0x01;
        caps.mse_command_supported = byte_at(data, 10)
            .map_err(|err| err.during("mse_command_supported"))?
            & 0x01
            == 0x01;

        Ok(caps)
    }
}

fn secure_messaging_algorithm(value: u8) -> Result<SecureMessagingAlgorithm> {
    if value > SecureMessagingAlgorithm::LAST as u8 {
        return Err(ErrorKind::NoSuchAlgorithm { value }.during("secure_messaging"));
    }
    SecureMessagingAlgorithm::try_from(value).map_err(|err: Error| err.during("secure_messaging"))
}

fn be_u16(bytes: &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = bytes.try_into().map_err(|_| ErrorKind::TooShort {
        expected: 2,
        actual: bytes.len(),
    })?;
    Ok(u16::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use test_log::test;

    // Sent by a YubiKey 5
    const YUBIKEY_5: [u8; 10] = hex!("7D 00 0BFE 0800 00FF 00 00");

    #[test]
    fn yubikey() {
        let caps = ExtendedCapabilities::decode(&YUBIKEY_5).unwrap();
        assert_eq!(
            caps,
            ExtendedCapabilities {
                secure_messaging_supported: false,
                secure_messaging: SecureMessagingAlgorithm::None,
                get_challenge_supported: true,
                maximum_challenge_length: 0x0BFE,
                key_import_supported: true,
                pw_status_changeable: true,
                private_use_dos_supported: true,
                algorithm_attributes_changeable: true,
                supports_pso_dec_enc_with_aes: false,
                kdf_supported: true,
                maximum_cardholder_certificates_length: 0x0800,
                maximum_special_dos_length: 0x00FF,
                pin_block_2_supported: false,
                mse_command_supported: false,
            }
        );
    }

    #[test]
    fn secure_messaging_gating() {
        let caps = ExtendedCapabilities::decode(&hex!("80 02 0000 0000 0000 00 00")).unwrap();
        assert!(caps.secure_messaging_supported);
        assert_eq!(caps.secure_messaging, SecureMessagingAlgorithm::Aes256);
        assert!(!caps.get_challenge_supported);

        // Byte 2 is ignored when the bit is cleared
        let caps = ExtendedCapabilities::decode(&hex!("00 FF 0000 0000 0000 00 00")).unwrap();
        assert!(!caps.secure_messaging_supported);
        assert_eq!(caps.secure_messaging, SecureMessagingAlgorithm::None);

        let err = ExtendedCapabilities::decode(&hex!("80 04 0000 0000 0000 00 00")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NoSuchAlgorithm { value: 4 });
        assert_eq!(err.context(), Some("secure_messaging"));
    }

    #[test]
    fn challenge_only_when_advertised() {
        let caps = ExtendedCapabilities::decode(&hex!("00 00 FFFF 0000 0000 00 00")).unwrap();
        assert!(!caps.get_challenge_supported);
        assert_eq!(caps.maximum_challenge_length, 0);

        let caps = ExtendedCapabilities::decode(&hex!("40 00 0100 0000 0000 00 00")).unwrap();
        assert!(caps.get_challenge_supported);
        assert_eq!(caps.maximum_challenge_length, 0x0100);
    }

    #[test]
    fn last_bytes() {
        let caps = ExtendedCapabilities::decode(&hex!("00 00 0000 0000 0000 01 FF")).unwrap();
        assert!(caps.pin_block_2_supported);
        assert!(caps.mse_command_supported);
        let caps = ExtendedCapabilities::decode(&hex!("00 00 0000 0000 0000 FE 02")).unwrap();
        assert!(!caps.pin_block_2_supported);
        assert!(!caps.mse_command_supported);
    }

    #[test]
    fn malformed() {
        let err = ExtendedCapabilities::decode(&[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);

        // GET CHALLENGE advertised but the length is cut
        let err = ExtendedCapabilities::decode(&hex!("40 00 01")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
        assert_eq!(err.context(), Some("max_challenge_length"));

        let err = ExtendedCapabilities::decode(&YUBIKEY_5[..9]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
        assert_eq!(err.context(), Some("mse_command_supported"));
    }

    #[test]
    fn from_tlv() {
        let mut tlv = TlvMap::new();
        assert_eq!(
            ExtendedCapabilities::from_tlv(&tlv).unwrap(),
            ExtendedCapabilities::default()
        );

        tlv.insert("6E.73.C0", YUBIKEY_5);
        let caps = ExtendedCapabilities::from_tlv(&tlv).unwrap();
        assert!(caps.kdf_supported);

        tlv.insert("6E.73.C0", hex!("7D 00"));
        let err = ExtendedCapabilities::from_tlv(&tlv).unwrap_err();
        assert_eq!(err.context(), Some("max_challenge_length"));
    }

    #[test]
    fn serialize_names() {
        let json = serde_json::to_value(ExtendedCapabilities::decode(&YUBIKEY_5).unwrap()).unwrap();
        assert_eq!(json["MaximumChallengeLength"], 0x0BFE);
        assert_eq!(json["KDFSupported"], true);
        assert_eq!(json["SecureMessaging"], 0);
        assert_eq!(json["MSECommandSupported"], false);
    }
}
