// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while converting runner output.

use crate::model::EntityKind;
use std::io;
use thiserror::Error;

/// An error produced by [`EventsConverter::feed`](crate::EventsConverter::feed).
///
/// The variants differ in severity. A [`Malformed`](Self::Malformed) event is
/// dropped without corrupting converter state, so callers may keep feeding
/// subsequent lines; [`UnknownResult`](Self::UnknownResult) and the I/O
/// variants are hard failures of the feed.
/// [`feed_lines`](crate::EventsConverter::feed_lines) applies exactly that
/// policy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedError {
    /// A structurally invalid event. The offending line is dropped;
    /// previously accumulated state stays valid.
    #[error("malformed event")]
    Malformed(#[from] MalformedEvent),

    /// A `testDone` event carried a result other than `success`, `failure`
    /// or `error`.
    #[error("unknown test result `{result}`")]
    UnknownResult {
        /// The unrecognized result value.
        result: String,
    },

    /// Reading a line from the runner failed.
    #[error("error reading runner output")]
    Read(#[source] io::Error),

    /// Writing to the downstream sink failed.
    #[error("error writing service message")]
    Write(#[source] io::Error),
}

/// Structural problems in a single event object.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MalformedEvent {
    /// A required field was missing, null, or of the wrong primitive kind.
    #[error("missing or invalid `{field}` field (expected {expected})")]
    InvalidField {
        /// The JSON field name.
        field: &'static str,
        /// What the field was expected to hold.
        expected: &'static str,
    },

    /// The event referenced an id that was never declared in this run.
    #[error("no {kind} registered under id {id}")]
    UnknownId {
        /// The entity category the reference was resolved against.
        kind: EntityKind,
        /// The unresolvable id.
        id: i64,
    },

    /// The event carried neither an id declaration, an id reference, nor a
    /// nested declaration object.
    #[error("no id in event")]
    NoId,
}
