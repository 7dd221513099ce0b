// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Build and parse TeamCity service messages in Rust.
//!
//! A service message is a single line of text understood by TeamCity-style
//! test consoles: a message name followed by an ordered list of
//! single-quoted attributes, wrapped in `##teamcity[...]`. This crate
//! provides the data model ([`ServiceMessage`]), the wire encoding (via
//! [`Display`](std::fmt::Display)) including the `|`-based escape scheme,
//! and the inverse parser ([`ServiceMessage::parse`]).

mod errors;
mod message;
mod parse;
mod serialize;

pub use errors::ParseError;
pub use message::ServiceMessage;
