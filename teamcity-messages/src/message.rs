// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{errors::ParseError, parse::parse_message, serialize::write_message};
use std::fmt;

static TEST_STARTED: &str = "testStarted";
static TEST_FINISHED: &str = "testFinished";
static TEST_FAILED: &str = "testFailed";
static TEST_IGNORED: &str = "testIgnored";
static TEST_STD_OUT: &str = "testStdOut";
static TEST_STD_ERR: &str = "testStdErr";
static TEST_SUITE_STARTED: &str = "testSuiteStarted";
static TEST_SUITE_FINISHED: &str = "testSuiteFinished";

static NAME_ATTR: &str = "name";

/// A single service message: a name plus an ordered list of attributes.
///
/// The wire form is produced by the [`Display`](fmt::Display) impl:
///
/// ```
/// use teamcity_messages::ServiceMessage;
///
/// let mut msg = ServiceMessage::test_started("adds");
/// msg.add_attribute("locationHint", "unknown");
/// assert_eq!(
///     msg.to_string(),
///     "##teamcity[testStarted name='adds' locationHint='unknown']",
/// );
/// ```
///
/// Attribute order is preserved; attribute values are escaped on output and
/// unescaped on [`parse`](Self::parse).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceMessage {
    name: String,
    attributes: Vec<(String, String)>,
}

impl ServiceMessage {
    /// Creates a new message with the given name and no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Creates a `testStarted` message for the named test.
    pub fn test_started(test_name: impl Into<String>) -> Self {
        Self::named(TEST_STARTED, test_name)
    }

    /// Creates a `testFinished` message for the named test.
    pub fn test_finished(test_name: impl Into<String>) -> Self {
        Self::named(TEST_FINISHED, test_name)
    }

    /// Creates a `testFailed` message for the named test.
    pub fn test_failed(test_name: impl Into<String>) -> Self {
        Self::named(TEST_FAILED, test_name)
    }

    /// Creates a `testIgnored` message for the named test.
    pub fn test_ignored(test_name: impl Into<String>) -> Self {
        Self::named(TEST_IGNORED, test_name)
    }

    /// Creates a `testStdOut` message for the named test.
    pub fn test_std_out(test_name: impl Into<String>) -> Self {
        Self::named(TEST_STD_OUT, test_name)
    }

    /// Creates a `testStdErr` message for the named test.
    pub fn test_std_err(test_name: impl Into<String>) -> Self {
        Self::named(TEST_STD_ERR, test_name)
    }

    /// Creates a `testSuiteStarted` message for the named suite.
    pub fn test_suite_started(suite_name: impl Into<String>) -> Self {
        Self::named(TEST_SUITE_STARTED, suite_name)
    }

    /// Creates a `testSuiteFinished` message for the named suite.
    pub fn test_suite_finished(suite_name: impl Into<String>) -> Self {
        Self::named(TEST_SUITE_FINISHED, suite_name)
    }

    fn named(message: &str, name: impl Into<String>) -> Self {
        let mut msg = Self::new(message);
        msg.add_attribute(NAME_ATTR, name);
        msg
    }

    /// Parses one wire line back into a message.
    ///
    /// This is the exact inverse of the [`Display`](fmt::Display) impl:
    /// attribute order is preserved and values are unescaped.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        parse_message(line)
    }

    /// The message name, e.g. `testStarted`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an attribute. Attributes are emitted in insertion order; a
    /// repeated name is emitted twice rather than replaced.
    pub fn add_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Returns the value of the first attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_message(self, f)
    }
}
