// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by this crate.

use thiserror::Error;

/// An error that occurred while parsing a service-message line.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The line does not start with the `##teamcity[` prefix.
    #[error("line does not start with `##teamcity[`")]
    MissingPrefix,

    /// The message is not terminated by `]`.
    #[error("message is not terminated by `]`")]
    Unterminated,

    /// The message name is empty.
    #[error("message name is empty")]
    EmptyName,

    /// An attribute name contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid attribute name `{0}`")]
    InvalidAttributeName(String),

    /// An attribute name is not followed by `=`.
    #[error("expected `=` after an attribute name")]
    ExpectedEquals,

    /// An attribute value is not single-quoted.
    #[error("expected `'` to open an attribute value")]
    ExpectedQuote,

    /// An attribute value is missing its closing quote.
    #[error("unterminated attribute value")]
    UnterminatedValue,

    /// A `|` escape is followed by an unrecognized character.
    #[error("unrecognized escape sequence `|{0}`")]
    UnknownEscape(char),
}
