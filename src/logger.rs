// Copyright (C) 2022 Nitrokey GmbH
// SPDX-License-Identifier: LGPL-3.0-only

//! Logging capability handed to a [`CardData`](crate::card::CardData) at construction
//!
//! By default records go to whatever [`log`] implementation the host application installed.  A
//! caller that wants the diagnostics of one card session routed elsewhere (or dropped) passes its
//! own sink through [`Options`](crate::card::Options).

use core::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};

const TARGET: &str = "opcard_info::card";

#[derive(Clone, Default)]
enum Sink {
    #[default]
    Global,
    Nop,
    Custom(Arc<dyn Log>),
}

/// Cloneable handle to a [`log::Log`] implementation
#[derive(Clone, Default)]
pub struct Logger {
    sink: Sink,
}

impl Logger {
    /// Sends records to `log`
    pub fn new(log: impl Log + 'static) -> Self {
        Self::from_arc(Arc::new(log))
    }

    /// Sends records to a shared `log`
    pub fn from_arc(log: Arc<dyn Log>) -> Self {
        Self {
            sink: Sink::Custom(log),
        }
    }

    /// Forwards to the logger installed with [`log::set_logger`]
    pub fn global() -> Self {
        Self { sink: Sink::Global }
    }

    /// Drops every record
    pub fn nop() -> Self {
        Self { sink: Sink::Nop }
    }

    fn with_log<R>(&self, f: impl FnOnce(&dyn Log) -> R) -> Option<R> {
        match &self.sink {
            Sink::Global => Some(f(log::logger())),
            Sink::Nop => None,
            Sink::Custom(log) => Some(f(log.as_ref())),
        }
    }

    /// Returns `true` if a record at `level` would be kept
    pub fn enabled(&self, level: Level) -> bool {
        if matches!(self.sink, Sink::Global) && level > log::max_level() {
            return false;
        }
        let metadata = Metadata::builder().level(level).target(TARGET).build();
        self.with_log(|log| log.enabled(&metadata)).unwrap_or(false)
    }

    /// Emits one record
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        self.with_log(|log| {
            log.log(
                &Record::builder()
                    .args(args)
                    .level(level)
                    .target(TARGET)
                    .module_path_static(Some(module_path!()))
                    .build(),
            )
        });
    }

    /// Emits a warning
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args)
    }

    /// Emits a debug record
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args)
    }

    /// Emits a trace record
    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Trace, args)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Global => "global",
            Sink::Nop => "nop",
            Sink::Custom(_) => "custom",
        };
        f.debug_struct("Logger").field("sink", &sink).finish()
    }
}
