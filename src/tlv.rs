// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Utilities for dealing with BER-TLV (Tag-Length-Value) encoded data
//!
//! [`TlvMap`] flattens a stream of nested data objects into a map from a dotted tag path
//! (`"6E.73.C5"`) to the raw value.  Constructed data objects are kept under their own path and
//! their children are added below it.  The codec knows nothing about which tags are meaningful.

use std::collections::{hash_map, HashMap};

use log::{trace, warn};

use crate::error::{ErrorKind, Result};
use crate::utils::upper_hex;

/// Separator between the tags of a path
pub const PATH_SEPARATOR: char = '.';

/// Maximum number of bytes in a tag field
const MAX_TAG_LEN: usize = 4;
/// Maximum number of subsequent bytes in a long form length field
const MAX_LEN_BYTES: usize = 4;

const CONSTRUCTED_FLAG: u8 = 0b0010_0000;
const MULTI_BYTE_TAG: u8 = 0b0001_1111;
const NOT_LAST_TAG_BYTE: u8 = 0b1000_0000;
const LONG_FORM_LENGTH: u8 = 0b1000_0000;

/// Flattened view of a BER-TLV stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlvMap {
    values: HashMap<String, Vec<u8>>,
}

impl TlvMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a stream of one or more data objects.
    ///
    /// An empty stream gives an empty map.  A truncated stream is an error, never a partial map.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            values: flatten(None, data)?,
        })
    }

    /// Parses `data` and adds its data objects below `prefix`.
    ///
    /// Nothing is added if `data` fails to parse.
    pub fn extend_from(&mut self, prefix: Option<&str>, data: &[u8]) -> Result<()> {
        let values = flatten(prefix, data)?;
        self.values.extend(values);
        Ok(())
    }

    /// Adds or replaces a single value
    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.values.insert(path.into(), value.into());
    }

    /// Raw value at `path`
    pub fn value(&self, path: &str) -> Option<&[u8]> {
        self.values.get(path).map(Vec::as_slice)
    }

    /// Value at `path`, required to exist and to hold at least `min_len` bytes
    pub fn get(&self, path: &str, min_len: usize) -> Result<&[u8]> {
        let value = self.value(path).ok_or_else(|| ErrorKind::NoSuchTag {
            path: path.into(),
        })?;
        if value.len() < min_len {
            return Err(ErrorKind::TooShort {
                expected: min_len,
                actual: value.len(),
            }
            .into());
        }
        Ok(value)
    }

    /// Returns the length of the value at `path` if the tag exists
    pub fn has_tag(&self, path: &str) -> Option<usize> {
        self.values.get(path).map(Vec::len)
    }

    /// Returns `true` if a data object exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// Number of data objects, constructed ones included
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no data object was decoded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all paths in no particular order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterates over all `(path, value)` pairs in no particular order
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.values.iter())
    }
}

impl<'a> IntoIterator for &'a TlvMap {
    type Item = (&'a str, &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Iterator over the entries of a [`TlvMap`]
#[derive(Debug)]
pub struct Iter<'a>(hash_map::Iter<'a, String, Vec<u8>>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .next()
            .map(|(path, value)| (path.as_str(), value.as_slice()))
    }
}

/// Joins a parent path and a tag
pub fn join_path(parent: Option<&str>, tag: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}{PATH_SEPARATOR}{tag}"),
        None => tag.into(),
    }
}

/// Maximum nesting of data objects, the outermost level counting as 1
pub const MAX_DEPTH: usize = 16;

fn flatten(prefix: Option<&str>, data: &[u8]) -> Result<HashMap<String, Vec<u8>>> {
    let mut values = HashMap::new();
    flatten_into(&mut values, prefix, data, 1)?;
    Ok(values)
}

/// Adds the data objects of `data` in stream order, each constructed one followed by its children
fn flatten_into(
    values: &mut HashMap<String, Vec<u8>>,
    parent: Option<&str>,
    mut data: &[u8],
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH && !data.is_empty() {
        warn!("Data objects nested deeper than {MAX_DEPTH} levels");
        return Err(ErrorKind::TooDeep { max: MAX_DEPTH }.into());
    }

    while !data.is_empty() {
        let (tag, value, rest) = take_do(data)?;
        data = rest;

        let path = join_path(parent, &upper_hex(tag));
        trace!("Found data object {path} ({} bytes)", value.len());
        if values.insert(path.clone(), value.to_vec()).is_some() {
            warn!("Data object {path} repeated, keeping the last occurrence");
            let descendants = join_path(Some(&path), "");
            values.retain(|other, _| !other.starts_with(&descendants));
        }
        if is_constructed(tag) {
            flatten_into(values, Some(&path), value, depth + 1)?;
        }
    }
    Ok(())
}

/// Returns `true` if the value of a data object with this tag is itself BER-TLV encoded
pub fn is_constructed(tag: &[u8]) -> bool {
    tag.first()
        .is_some_and(|b| b & CONSTRUCTED_FLAG == CONSTRUCTED_FLAG)
}

/// Returns (tag, data, remainder)
pub fn take_do(data: &[u8]) -> Result<(&[u8], &[u8], &[u8])> {
    let (tag, remainder) = take_tag(data)?;
    let (len, remainder) = take_len(remainder)?;
    if remainder.len() < len {
        warn!(
            "Tried to parse TLV with data length shorter that the length data: {tag:02x?} declares {len}, {} left",
            remainder.len()
        );
        return Err(ErrorKind::Truncated.into());
    }
    let (value, remainder) = remainder.split_at(len);
    Ok((tag, value, remainder))
}

// See
// https://www.emvco.com/wp-content/uploads/2017/05/EMV_v4.3_Book_3_Application_Specification_20120607062110791.pdf
// Annex B1
/// Returns (raw tag bytes, remainder)
pub fn take_tag(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let b1 = *data.first().ok_or(ErrorKind::Truncated)?;
    let mut len = 1;
    if b1 & MULTI_BYTE_TAG == MULTI_BYTE_TAG {
        loop {
            let b = *data.get(len).ok_or(ErrorKind::Truncated)?;
            len += 1;
            if b & NOT_LAST_TAG_BYTE == 0 {
                break;
            }
            if len == MAX_TAG_LEN {
                warn!("Got a tag larger than {MAX_TAG_LEN} bytes: {:02x?}", &data[..len]);
                return Err(ErrorKind::TagTooLong.into());
            }
        }
    }
    Ok(data.split_at(len))
}

/// Returns (length, remainder)
pub fn take_len(data: &[u8]) -> Result<(usize, &[u8])> {
    let l1 = *data.first().ok_or(ErrorKind::Truncated)?;
    if l1 & LONG_FORM_LENGTH == 0 {
        return Ok((l1.into(), &data[1..]));
    }

    let count = usize::from(l1 & !LONG_FORM_LENGTH);
    if count == 0 || count > MAX_LEN_BYTES {
        warn!("Got an unexpected length tag: {l1:02x}");
        return Err(ErrorKind::InvalidLength { first_byte: l1 }.into());
    }
    let bytes = data.get(1..=count).ok_or(ErrorKind::Truncated)?;
    let len = bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    Ok((len, &data[1 + count..]))
}

/// Appends the BER encoding of `len` (§ 4.4.4 of the OpenPGP card specification)
pub fn serialize_len(len: usize, out: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| ErrorKind::Overlength)?;
    let bytes = len.to_be_bytes();
    match len {
        0..=0x7F => out.push(bytes[3]),
        0x80..=0xFF => out.extend_from_slice(&[0x81, bytes[3]]),
        0x100..=0xFFFF => out.extend_from_slice(&[0x82, bytes[2], bytes[3]]),
        0x1_0000..=0xFF_FFFF => out.extend_from_slice(&[0x83, bytes[1], bytes[2], bytes[3]]),
        _ => {
            out.push(0x84);
            out.extend_from_slice(&bytes);
        }
    }
    Ok(())
}

/// Appends one data object (`tag`, length, `value`) to `out`
pub fn encode_do(tag: &[u8], value: &[u8], out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(tag);
    serialize_len(value.len(), out)?;
    out.extend_from_slice(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use test_log::test;

    #[test]
    fn nested() {
        let map = TlvMap::parse(&hex!("6E 0A 4F 02 D276 73 04 C0 02 7F00")).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.value("6E.4F"), Some(hex!("D276").as_slice()));
        assert_eq!(map.value("6E.73"), Some(hex!("C0 02 7F00").as_slice()));
        assert_eq!(map.value("6E.73.C0"), Some(hex!("7F00").as_slice()));
        assert_eq!(map.has_tag("6E"), Some(10));
        assert_eq!(map.has_tag("6E.C0"), None);
    }

    #[test]
    fn siblings() {
        let map = TlvMap::parse(&hex!("02 02 1DB9 5B 03 414243")).unwrap();
        assert_eq!(map.value("02"), Some(hex!("1DB9").as_slice()));
        assert_eq!(map.value("5B"), Some(b"ABC".as_slice()));
    }

    #[test]
    fn multi_byte_tags() {
        let map = TlvMap::parse(&hex!("7F49 03 86 01 04 9F8102 01 AA")).unwrap();
        assert_eq!(map.value("7F49.86"), Some(hex!("04").as_slice()));
        assert_eq!(map.value("9F8102"), Some(hex!("AA").as_slice()));
        assert!(!map.contains("9F8102.AA"));

        assert_eq!(
            TlvMap::parse(&hex!("1F 81 81 81 01 00")).unwrap_err().kind(),
            &ErrorKind::TagTooLong
        );
        assert_eq!(
            TlvMap::parse(&hex!("5F")).unwrap_err().kind(),
            &ErrorKind::Truncated
        );
    }

    #[test]
    fn long_form_lengths() {
        let mut data = hex!("5F50 81 80").to_vec();
        data.extend_from_slice(&[0x42; 0x80]);
        let map = TlvMap::parse(&data).unwrap();
        assert_eq!(map.has_tag("5F50"), Some(0x80));

        let map = TlvMap::parse(&hex!("C5 82 0003 AABBCC")).unwrap();
        assert_eq!(map.value("C5"), Some(hex!("AABBCC").as_slice()));

        assert_eq!(
            TlvMap::parse(&hex!("6E 80 0000")).unwrap_err().kind(),
            &ErrorKind::InvalidLength { first_byte: 0x80 }
        );
        assert_eq!(
            TlvMap::parse(&hex!("6E 85 0000000001 00")).unwrap_err().kind(),
            &ErrorKind::InvalidLength { first_byte: 0x85 }
        );
        assert_eq!(
            TlvMap::parse(&hex!("6E 82 00")).unwrap_err().kind(),
            &ErrorKind::Truncated
        );
    }

    #[test]
    fn truncated() {
        for data in [
            hex!("6E 05 4F 01").as_slice(),
            hex!("4F").as_slice(),
            // The inner data object overflows its parent
            hex!("6E 03 4F 05 00").as_slice(),
            // Second sibling is cut
            hex!("4F 01 00 5B 02 41").as_slice(),
        ] {
            assert_eq!(
                TlvMap::parse(data).unwrap_err().kind(),
                &ErrorKind::Truncated,
                "{data:02x?}"
            );
        }
    }

    #[test]
    fn empty() {
        assert!(TlvMap::parse(&[]).unwrap().is_empty());
        let map = TlvMap::parse(&hex!("65 00 5E 00")).unwrap();
        assert_eq!(map.has_tag("65"), Some(0));
        assert_eq!(map.has_tag("5E"), Some(0));
    }

    #[test]
    fn get() {
        let map = TlvMap::parse(&hex!("6E 04 4F 02 D276")).unwrap();
        assert_eq!(map.get("6E.4F", 2).unwrap(), &hex!("D276"));
        assert_eq!(
            map.get("6E.4F", 3).unwrap_err().kind(),
            &ErrorKind::TooShort {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(
            map.get("6E.5B", 0).unwrap_err().kind(),
            &ErrorKind::NoSuchTag {
                path: "6E.5B".into()
            }
        );
    }

    #[test]
    fn extend_under_prefix() {
        let mut map = TlvMap::new();
        map.extend_from(Some("6E"), &hex!("4F 01 01 73 03 C0 01 00"))
            .unwrap();
        assert_eq!(map.value("6E.4F"), Some(hex!("01").as_slice()));
        assert_eq!(map.value("6E.73.C0"), Some(hex!("00").as_slice()));

        assert!(map.extend_from(None, &hex!("65 03 5B 05")).is_err());
        assert!(!map.contains("65"));
    }

    #[test]
    fn repeated_constructed_keeps_last() {
        let map = TlvMap::parse(&hex!("73 06 C0 01 01 C1 01 11 73 03 C0 01 02")).unwrap();
        assert_eq!(map.value("73"), Some(hex!("C0 01 02").as_slice()));
        assert_eq!(map.value("73.C0"), Some(hex!("02").as_slice()));
        assert!(!map.contains("73.C1"));
        assert_eq!(map.len(), 2);

        let map = TlvMap::parse(&hex!("5B 01 41 5B 01 42")).unwrap();
        assert_eq!(map.value("5B"), Some(b"B".as_slice()));
    }

    fn nested_data(levels: usize) -> Vec<u8> {
        let mut data = hex!("01 01 AA").to_vec();
        for _ in 0..levels {
            let mut outer = Vec::new();
            encode_do(&[0x20], &data, &mut outer).unwrap();
            data = outer;
        }
        data
    }

    #[test]
    fn nesting_depth() {
        let map = TlvMap::parse(&nested_data(MAX_DEPTH - 1)).unwrap();
        assert_eq!(map.len(), MAX_DEPTH);
        let innermost = ["20"; MAX_DEPTH - 1].join(".") + ".01";
        assert_eq!(map.value(&innermost), Some(hex!("AA").as_slice()));

        assert_eq!(
            TlvMap::parse(&nested_data(MAX_DEPTH)).unwrap_err().kind(),
            &ErrorKind::TooDeep { max: MAX_DEPTH }
        );

        // Deeply nested empty constructed objects
        let mut data = Vec::new();
        for _ in 0..2_000 {
            let mut outer = Vec::new();
            encode_do(&[0x20], &data, &mut outer).unwrap();
            data = outer;
        }
        assert_eq!(
            TlvMap::parse(&data).unwrap_err().kind(),
            &ErrorKind::TooDeep { max: MAX_DEPTH }
        );
    }

    #[test]
    fn encoded_lengths() {
        let mut out = Vec::new();
        for (len, expected) in [
            (0, hex!("00").as_slice()),
            (0x7F, hex!("7F").as_slice()),
            (0x80, hex!("81 80").as_slice()),
            (0xFF, hex!("81 FF").as_slice()),
            (0x100, hex!("82 0100").as_slice()),
            (0x1_0000, hex!("83 010000").as_slice()),
        ] {
            out.clear();
            serialize_len(len, &mut out).unwrap();
            assert_eq!(out, expected, "{len}");
            let (decoded, rest) = take_len(&out).unwrap();
            assert_eq!(decoded, len);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn encode_then_parse() {
        let mut discretionary = Vec::new();
        encode_do(&[0xC5], &[0x11; 60], &mut discretionary).unwrap();
        encode_do(&[0xCD], &hex!("5F000000 00000000 00000000"), &mut discretionary).unwrap();
        let mut related = Vec::new();
        encode_do(&[0x4F], &hex!("D2760001240103040006"), &mut related).unwrap();
        encode_do(&[0x73], &discretionary, &mut related).unwrap();
        let mut data = Vec::new();
        encode_do(&[0x6E], &related, &mut data).unwrap();

        let map = TlvMap::parse(&data).unwrap();
        let mut paths: Vec<_> = map.paths().collect();
        paths.sort_unstable();
        assert_eq!(paths, ["6E", "6E.4F", "6E.73", "6E.73.C5", "6E.73.CD"]);
        assert_eq!(map.value("6E.73"), Some(discretionary.as_slice()));
        assert_eq!(map.value("6E.73.C5"), Some([0x11; 60].as_slice()));
    }
}
