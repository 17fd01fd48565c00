// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

use chrono::{DateTime, Utc};

use crate::card::{CardData, Options};
use crate::error::{ErrorKind, Result};
use crate::source::DataSource;
use crate::types::{KeyOrigin, KeyType};

/// Card of a session, decoded on first use
///
/// Keyed accessors fail with [`ErrorKind::KeyNotPresent`] until a card is loaded.  Plain getters
/// return an empty string instead.
#[derive(Clone, Debug, Default)]
pub struct CardState {
    card: Option<CardData>,
}

impl CardState {
    /// State without a card
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the card from `source` unless it is already loaded.
    pub fn load<S: DataSource>(&mut self, source: &mut S, options: Options) -> Result<&CardData> {
        if self.card.is_none() {
            self.card = Some(CardData::from_source(source, options)?);
        }
        self.loaded()
    }

    /// Replaces the loaded card
    pub fn set(&mut self, card: CardData) {
        self.card = Some(card);
    }

    /// Drops the loaded card.
    ///
    /// Must be called after any command that changes data on the card (PUT DATA, key generation or
    /// import): the next [`load`](Self::load) then reads it again.
    pub fn invalidate(&mut self) -> Option<CardData> {
        self.card.take()
    }

    /// Returns `true` if a card is loaded
    pub fn is_loaded(&self) -> bool {
        self.card.is_some()
    }

    /// The loaded card
    pub fn loaded(&self) -> Result<&CardData> {
        self.card
            .as_ref()
            .ok_or_else(|| ErrorKind::KeyNotPresent.during("card"))
    }

    /// See [`CardData::algorithm`]
    pub fn algorithm(&self, key: KeyType) -> Result<String> {
        self.loaded()?.algorithm(key)
    }

    /// See [`CardData::fingerprint`]
    pub fn fingerprint(&self, key: KeyType) -> Result<String> {
        self.loaded()?.fingerprint(key)
    }

    /// See [`CardData::id`]
    pub fn id(&self, key: KeyType) -> Result<String> {
        self.loaded()?.id(key)
    }

    /// See [`CardData::date`]
    pub fn date(&self, key: KeyType) -> Result<DateTime<Utc>> {
        self.loaded()?.date(key)
    }

    /// See [`CardData::origin`]
    pub fn origin(&self, key: KeyType) -> Result<KeyOrigin> {
        self.loaded()?.origin(key)
    }

    /// See [`CardData::keys_summary`]
    pub fn keys_summary(&self) -> Result<String> {
        self.loaded().map(CardData::keys_summary)
    }

    /// Card description, see the [`Display`](core::fmt::Display) implementation of [`CardData`]
    pub fn render(&self) -> Result<String> {
        self.loaded().map(ToString::to_string)
    }

    /// Cardholder name, empty if no card is loaded
    pub fn cardholder(&self) -> &str {
        self.card.as_ref().map_or("", CardData::cardholder)
    }

    /// Specification version, empty if no card is loaded
    pub fn version(&self) -> &str {
        self.card.as_ref().map_or("", CardData::version)
    }

    /// Applet version, empty if no card is loaded
    pub fn applet_version(&self) -> &str {
        self.card.as_ref().map_or("", CardData::applet_version)
    }
}

impl From<CardData> for CardState {
    fn from(card: CardData) -> Self {
        Self { card: Some(card) }
    }
}
