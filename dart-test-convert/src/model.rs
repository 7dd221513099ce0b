// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The suite/group/test hierarchy reconstructed from id-referencing events.
//!
//! Entities are stored arena-style: each category owns its entries in an
//! id-keyed table, and parentage is expressed as ids resolved against the
//! owning table rather than shared references. A parent group is routinely
//! looked up on its own (new children arrive, completion counts cascade), so
//! nothing here hands out long-lived references across categories.

use crate::{
    errors::MalformedEvent,
    events::{self, JsonMap},
    naming,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// An identifier assigned by the test runner.
///
/// Ids are unique per category within one run and are reused as table keys;
/// they are not globally unique across runs.
pub type EntityId = i64;

/// The node id substituted for entities without a visible parent.
pub(crate) const ROOT_ID: EntityId = 0;

/// The category of entity an event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// A single test case.
    Test,
    /// A group of tests (or of nested groups).
    Group,
    /// A test suite, i.e. one test file.
    Suite,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Test => "test",
            EntityKind::Group => "group",
            EntityKind::Suite => "suite",
        })
    }
}

/// Skip metadata attached to a test or group declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Metadata {
    pub(crate) skip: bool,
    pub(crate) skip_reason: Option<String>,
}

impl Metadata {
    /// Parses the optional `metadata` sub-object; anything missing or
    /// malformed reads as "not skipped".
    pub(crate) fn from_json(value: Option<&Value>) -> Self {
        let Some(obj) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        Self {
            skip: obj.get("skip").and_then(Value::as_bool).unwrap_or(false),
            skip_reason: events::opt_string(obj, "skipReason"),
        }
    }
}

/// A single test case. Its id lives in the owning table's key.
#[derive(Clone, Debug)]
pub(crate) struct Test {
    /// Raw name as given by the runner; `None` stands for the unnamed
    /// sentinel.
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<EntityId>,
    pub(crate) suite: Option<EntityId>,
    pub(crate) metadata: Metadata,
    /// 0-based, or -1 when the runner gave no position.
    pub(crate) line: i64,
    pub(crate) column: i64,
    pub(crate) url: Option<String>,
    /// Whether a `testStarted` message has been emitted for this test.
    pub(crate) start_reported: bool,
    /// Whether a `testFailed` message has been emitted; later errors for the
    /// same test degrade to stderr output.
    pub(crate) error_reported: bool,
}

impl Test {
    pub(crate) fn raw_name(&self) -> &str {
        self.name.as_deref().unwrap_or(naming::NO_NAME)
    }
}

/// A group of tests. Its id lives in the owning table's key.
#[derive(Clone, Debug)]
pub(crate) struct Group {
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<EntityId>,
    pub(crate) suite: Option<EntityId>,
    pub(crate) line: i64,
    pub(crate) column: i64,
    pub(crate) url: Option<String>,
    /// Declared number of tests under this group, 0 when the runner did not
    /// say (legacy runners omit the field).
    pub(crate) test_count: u64,
    /// Completed tests under this group, own and cascaded from descendants.
    /// Never exceeds a nonzero `test_count`.
    pub(crate) done_count: u64,
    /// Set once the finish message has been emitted (or suppressed, for
    /// artificial groups), making both the cascade and the final flush
    /// idempotent.
    pub(crate) finished: bool,
}

impl Group {
    pub(crate) fn raw_name(&self) -> &str {
        self.name.as_deref().unwrap_or(naming::NO_NAME)
    }
}

/// A test suite: one test file on some platform.
#[derive(Clone, Debug)]
pub(crate) struct Suite {
    pub(crate) path: Option<Utf8PathBuf>,
    pub(crate) platform: Option<String>,
}

impl Suite {
    pub(crate) fn has_path(&self) -> bool {
        self.path.is_some()
    }
}

/// The three per-category entity tables for one run.
#[derive(Debug, Default)]
pub(crate) struct EntityTables {
    tests: IndexMap<EntityId, Test>,
    groups: IndexMap<EntityId, Group>,
    suites: IndexMap<EntityId, Suite>,
}

impl EntityTables {
    pub(crate) fn clear(&mut self) {
        self.tests.clear();
        self.groups.clear();
        self.suites.clear();
    }

    pub(crate) fn test(&self, id: EntityId) -> &Test {
        self.tests.get(&id).expect("test id was resolved against this table")
    }

    pub(crate) fn test_mut(&mut self, id: EntityId) -> &mut Test {
        self.tests
            .get_mut(&id)
            .expect("test id was resolved against this table")
    }

    pub(crate) fn group(&self, id: EntityId) -> &Group {
        self.groups
            .get(&id)
            .expect("group id was resolved against this table")
    }

    pub(crate) fn group_mut(&mut self, id: EntityId) -> &mut Group {
        self.groups
            .get_mut(&id)
            .expect("group id was resolved against this table")
    }

    pub(crate) fn suite(&self, id: EntityId) -> &Suite {
        self.suites
            .get(&id)
            .expect("suite id was resolved against this table")
    }

    /// The path of the referenced suite, if the reference is set, the suite
    /// is still registered, and it has a path.
    pub(crate) fn suite_path(&self, id: Option<EntityId>) -> Option<&Utf8Path> {
        id.and_then(|sid| self.suites.get(&sid))
            .and_then(|suite| suite.path.as_deref())
    }

    /// Group ids in registration order, for the end-of-run flush.
    pub(crate) fn group_ids(&self) -> Vec<EntityId> {
        self.groups.keys().copied().collect()
    }

    pub(crate) fn remove_suite(&mut self, id: EntityId) {
        self.suites.shift_remove(&id);
    }

    /// Resolves the test an event refers to: a fresh `id` declaration
    /// creates or replaces the table entry, a `testID` follows the reference
    /// into the table, and a nested `test` object is resolved recursively.
    pub(crate) fn resolve_test(&mut self, obj: &JsonMap) -> Result<EntityId, MalformedEvent> {
        if obj.contains_key(events::ID) {
            return self.register_test(obj);
        }
        if obj.contains_key(events::TEST_ID) {
            let id = events::require_i64(obj, events::TEST_ID)?;
            return if self.tests.contains_key(&id) {
                Ok(id)
            } else {
                Err(MalformedEvent::UnknownId {
                    kind: EntityKind::Test,
                    id,
                })
            };
        }
        if let Some(nested) = events::nested(obj, events::TEST) {
            return self.resolve_test(nested);
        }
        Err(MalformedEvent::NoId)
    }

    /// Resolves a group declaration, either inline or nested under `group`.
    pub(crate) fn resolve_group(&mut self, obj: &JsonMap) -> Result<EntityId, MalformedEvent> {
        if obj.contains_key(events::ID) {
            return self.register_group(obj);
        }
        if let Some(nested) = events::nested(obj, events::GROUP) {
            return self.resolve_group(nested);
        }
        Err(MalformedEvent::NoId)
    }

    /// Resolves a suite declaration, either inline or nested under `suite`.
    pub(crate) fn resolve_suite(&mut self, obj: &JsonMap) -> Result<EntityId, MalformedEvent> {
        if obj.contains_key(events::ID) {
            return self.register_suite(obj);
        }
        if let Some(nested) = events::nested(obj, events::SUITE) {
            return self.resolve_suite(nested);
        }
        Err(MalformedEvent::NoId)
    }

    fn register_test(&mut self, obj: &JsonMap) -> Result<EntityId, MalformedEvent> {
        let id = events::require_i64(obj, events::ID)?;

        // The last entry of groupIDs is the immediate parent. Dangling
        // references degrade to "no parent" rather than failing, matching
        // the lookup-at-declaration-time semantics of the runner protocol.
        let parent = obj
            .get(events::GROUP_IDS)
            .and_then(Value::as_array)
            .and_then(|ids| ids.last())
            .and_then(Value::as_i64)
            .filter(|gid| self.groups.contains_key(gid));
        let suite = events::opt_i64(obj, events::SUITE_ID)
            .filter(|sid| self.suites.contains_key(sid));

        let (url, line, column) =
            if let Some(url) = events::opt_string(obj, events::ROOT_URL) {
                (
                    Some(url),
                    events::opt_i64(obj, events::ROOT_LINE).unwrap_or(-1),
                    events::opt_i64(obj, events::ROOT_COLUMN).unwrap_or(-1),
                )
            } else {
                (
                    events::opt_string(obj, events::URL),
                    events::opt_i64(obj, events::LINE).unwrap_or(-1),
                    events::opt_i64(obj, events::COLUMN).unwrap_or(-1),
                )
            };

        let test = Test {
            name: events::opt_string(obj, events::NAME),
            parent,
            suite,
            metadata: Metadata::from_json(obj.get(events::METADATA)),
            line: zero_based(line),
            column: zero_based(column),
            url,
            start_reported: false,
            error_reported: false,
        };
        self.tests.insert(id, test);
        Ok(id)
    }

    fn register_group(&mut self, obj: &JsonMap) -> Result<EntityId, MalformedEvent> {
        let id = events::require_i64(obj, events::ID)?;

        let parent = events::opt_i64(obj, events::PARENT_ID)
            .filter(|gid| self.groups.contains_key(gid));
        let suite = events::opt_i64(obj, events::SUITE_ID)
            .filter(|sid| self.suites.contains_key(sid));

        let group = Group {
            name: events::opt_string(obj, events::NAME),
            parent,
            suite,
            line: zero_based(events::opt_i64(obj, events::LINE).unwrap_or(-1)),
            column: zero_based(events::opt_i64(obj, events::COLUMN).unwrap_or(-1)),
            url: events::opt_string(obj, events::URL),
            test_count: events::opt_i64(obj, events::TEST_COUNT)
                .map_or(0, |count| count.max(0)) as u64,
            done_count: 0,
            finished: false,
        };
        self.groups.insert(id, group);
        Ok(id)
    }

    fn register_suite(&mut self, obj: &JsonMap) -> Result<EntityId, MalformedEvent> {
        let id = events::require_i64(obj, events::ID)?;
        let suite = Suite {
            path: events::opt_str(obj, events::PATH).map(Utf8PathBuf::from),
            platform: events::opt_string(obj, events::PLATFORM),
        };
        self.suites.insert(id, suite);
        Ok(id)
    }

    /// Records a terminal result for a test: every ancestor group's done
    /// count goes up by one, clamped at a nonzero declared count.
    pub(crate) fn record_test_done(&mut self, test_id: EntityId) {
        let mut current = self.test(test_id).parent;
        while let Some(gid) = current {
            let group = self.group_mut(gid);
            if group.test_count == 0 || group.done_count < group.test_count {
                group.done_count += 1;
            }
            current = group.parent;
        }
    }
}

/// Converts a 1-based position to 0-based; anything non-positive reads as
/// "absent" (-1).
fn zero_based(raw: i64) -> i64 {
    if raw < 0 { -1 } else { raw - 1 }
}

#[cfg(test)]
impl EntityTables {
    pub(crate) fn is_empty(&self) -> bool {
        self.tests.is_empty() && self.groups.is_empty() && self.suites.is_empty()
    }

    pub(crate) fn lookup_test(&self, id: EntityId) -> Option<&Test> {
        self.tests.get(&id)
    }
}
