// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field-level access to raw reporter events.
//!
//! Events are JSON objects with a `type` discriminator. Required fields
//! surface [`MalformedEvent`] when missing or of the wrong kind; optional
//! text fields degrade to documented sentinel defaults instead.

use crate::errors::MalformedEvent;
use serde_json::Value;

pub(crate) type JsonMap = serde_json::Map<String, Value>;

// Field names, as spelled by the reporter.
pub(crate) const TYPE: &str = "type";
pub(crate) const ID: &str = "id";
pub(crate) const NAME: &str = "name";
pub(crate) const TEST_ID: &str = "testID";
pub(crate) const SUITE_ID: &str = "suiteID";
pub(crate) const PARENT_ID: &str = "parentID";
pub(crate) const GROUP_IDS: &str = "groupIDs";
pub(crate) const RESULT: &str = "result";
pub(crate) const TIME: &str = "time";
pub(crate) const COUNT: &str = "count";
pub(crate) const TEST_COUNT: &str = "testCount";
pub(crate) const MESSAGE: &str = "message";
pub(crate) const ERROR_MESSAGE: &str = "error";
pub(crate) const STACK_TRACE: &str = "stackTrace";
pub(crate) const IS_FAILURE: &str = "isFailure";
pub(crate) const PATH: &str = "path";
pub(crate) const PLATFORM: &str = "platform";
pub(crate) const LINE: &str = "line";
pub(crate) const COLUMN: &str = "column";
pub(crate) const URL: &str = "url";
// root_* carries the test's original declaration site and wins over url/line/column.
pub(crate) const ROOT_URL: &str = "root_url";
pub(crate) const ROOT_LINE: &str = "root_line";
pub(crate) const ROOT_COLUMN: &str = "root_column";

// Nested declaration objects.
pub(crate) const TEST: &str = "test";
pub(crate) const GROUP: &str = "group";
pub(crate) const SUITE: &str = "suite";
pub(crate) const METADATA: &str = "metadata";

// Terminal results a testDone may carry.
pub(crate) const RESULT_SUCCESS: &str = "success";
pub(crate) const RESULT_FAILURE: &str = "failure";
pub(crate) const RESULT_ERROR: &str = "error";

// Sentinel defaults for optional text fields.
pub(crate) const NO_MESSAGE: &str = "<no message>";
pub(crate) const NO_ERROR_MESSAGE: &str = "<no error message>";
pub(crate) const NO_STACK_TRACE: &str = "<no stack trace>";
pub(crate) const NO_RESULT: &str = "<no result>";

/// The kind of lifecycle occurrence an event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EventType {
    TestStart,
    TestDone,
    Error,
    Print,
    Group,
    Suite,
    AllSuites,
    RunStart,
    RunDone,
    /// Anything else (e.g. `debug` events) is accepted and ignored.
    Unrecognized,
}

impl EventType {
    pub(crate) fn classify(raw: &str) -> Self {
        match raw {
            "testStart" => Self::TestStart,
            "testDone" => Self::TestDone,
            "error" => Self::Error,
            "print" => Self::Print,
            "group" => Self::Group,
            "suite" => Self::Suite,
            "allSuites" => Self::AllSuites,
            "start" => Self::RunStart,
            "done" => Self::RunDone,
            _ => Self::Unrecognized,
        }
    }
}

pub(crate) fn opt_i64(obj: &JsonMap, field: &str) -> Option<i64> {
    obj.get(field).and_then(Value::as_i64)
}

pub(crate) fn require_i64(obj: &JsonMap, field: &'static str) -> Result<i64, MalformedEvent> {
    opt_i64(obj, field).ok_or(MalformedEvent::InvalidField {
        field,
        expected: "an integer",
    })
}

pub(crate) fn require_bool(obj: &JsonMap, field: &'static str) -> Result<bool, MalformedEvent> {
    obj.get(field)
        .and_then(Value::as_bool)
        .ok_or(MalformedEvent::InvalidField {
            field,
            expected: "a boolean",
        })
}

pub(crate) fn opt_str<'a>(obj: &'a JsonMap, field: &str) -> Option<&'a str> {
    obj.get(field).and_then(Value::as_str)
}

pub(crate) fn opt_string(obj: &JsonMap, field: &str) -> Option<String> {
    opt_str(obj, field).map(str::to_owned)
}

pub(crate) fn require_str<'a>(
    obj: &'a JsonMap,
    field: &'static str,
) -> Result<&'a str, MalformedEvent> {
    opt_str(obj, field).ok_or(MalformedEvent::InvalidField {
        field,
        expected: "a string",
    })
}

/// Returns the field's text, or `default` when it is missing or not a string.
pub(crate) fn str_or<'a>(obj: &'a JsonMap, field: &str, default: &'a str) -> &'a str {
    opt_str(obj, field).unwrap_or(default)
}

pub(crate) fn nested<'a>(obj: &'a JsonMap, field: &str) -> Option<&'a JsonMap> {
    obj.get(field).and_then(Value::as_object)
}
