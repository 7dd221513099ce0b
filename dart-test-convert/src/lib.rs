// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Convert Dart `package:test` JSON reporter events into TeamCity-style
//! service messages.
//!
//! The runner emits one JSON object per line, describing test, group and
//! suite lifecycle occurrences that reference each other by integer id in an
//! arbitrary but causally-consistent order. [`EventsConverter`] folds that
//! stream into protocol lines for a test-results console: it rebuilds the
//! suite→group→test hierarchy, tracks per-group completion counts so group
//! finishes can be reported, hides virtual bookkeeping tests (suite
//! loading/compilation, `setUpAll`/`tearDownAll`) unless they fail, and
//! reshapes matcher failure text into structured `expected`/`actual`
//! attributes.
//!
//! The converter is a synchronous, single-pass fold: each call to
//! [`EventsConverter::feed`] fully processes one input line, emitting zero or
//! more lines to a [`MessageSink`], before the next line is accepted. Lines
//! that are not valid JSON pass through to the sink unchanged, which lets
//! already-formatted protocol text from older runners coexist with JSON
//! events on the same stream.

mod convert;
mod errors;
mod events;
mod location;
mod model;
mod naming;

pub use convert::{EventsConverter, MessageSink, WriteSink};
pub use errors::{FeedError, MalformedEvent};
pub use location::{FileUrlResolver, LocationResolver, DART_LOCATION_PREFIX};
pub use model::{EntityId, EntityKind};
