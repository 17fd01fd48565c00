// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Input boundary: the raw answers to GET DATA
//!
//! Selecting the application and framing the APDUs is up to the implementor of [`DataSource`].
//! Only one exchange may be in flight per card session, which `&mut self` enforces.

use std::collections::HashMap;

use crate::error::{ErrorKind, Result};
use crate::tlv::{is_constructed, take_do, TlvMap, PATH_SEPARATOR};
use crate::types::DataObject;

/// Anything able to answer GET DATA for a tag
pub trait DataSource {
    /// Error reported by the transport
    type Error: std::error::Error;

    /// Returns the response data of GET DATA for `tag`, without the status word
    fn get_data(&mut self, tag: u16) -> core::result::Result<Vec<u8>, Self::Error>;
}

impl<T: DataSource + ?Sized> DataSource for &mut T {
    type Error = T::Error;

    fn get_data(&mut self, tag: u16) -> core::result::Result<Vec<u8>, Self::Error> {
        (**self).get_data(tag)
    }
}

/// Canned answers, keyed by tag
///
/// Useful for replaying a card dump.  Tags without an answer fail like a card answering
/// "referenced data not found".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    answers: HashMap<u16, Vec<u8>>,
}

impl Snapshot {
    /// Creates an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the answer to GET DATA for `tag`
    pub fn with(mut self, tag: u16, answer: impl Into<Vec<u8>>) -> Self {
        self.answers.insert(tag, answer.into());
        self
    }
}

/// A tag missing from a [`Snapshot`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("referenced data not found")]
pub struct ReferencedDataNotFound;

impl DataSource for Snapshot {
    type Error = ReferencedDataNotFound;

    fn get_data(&mut self, tag: u16) -> core::result::Result<Vec<u8>, Self::Error> {
        self.answers.get(&tag).cloned().ok_or(ReferencedDataNotFound)
    }
}

fn tag_bytes(tag: u16) -> Vec<u8> {
    match tag.to_be_bytes() {
        [0, low] => vec![low],
        bytes => bytes.to_vec(),
    }
}

impl TlvMap {
    /// Issues GET DATA for each object and adds the answers to the map.
    ///
    /// Cards differ in whether the answer repeats the header of the requested data object.  An
    /// answer that is exactly one data object with the requested tag is decoded as is; anything
    /// else is taken as the value of the requested tag and stored under its path.
    pub fn fetch<S: DataSource>(&mut self, source: &mut S, objects: &[DataObject]) -> Result<()> {
        for object in objects {
            let tag = object.tag();
            let answer = source.get_data(tag).map_err(|err| {
                ErrorKind::DataSource {
                    tag,
                    message: err.to_string(),
                }
                .during("get_data")
            })?;
            self.add_answer(*object, &answer)
                .map_err(|err| err.during("get_data"))?;
        }
        Ok(())
    }

    fn add_answer(&mut self, object: DataObject, answer: &[u8]) -> Result<()> {
        let path = object.path();
        let parent = path.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| parent);
        let tag = tag_bytes(object.tag());

        let with_header = matches!(
            take_do(answer),
            Ok((found, _, rest)) if found == tag.as_slice() && rest.is_empty()
        );
        if with_header {
            return self.extend_from(parent, answer);
        }

        if is_constructed(&tag) {
            self.extend_from(Some(path), answer)?;
        }
        self.insert(path, answer);
        Ok(())
    }
}
