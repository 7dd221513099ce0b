// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display names, name paths, and visibility of entities.
//!
//! The runner concatenates ancestor group names into test and group names by
//! convention ("math adds" inside group "math"), leaves the implicit group
//! at the root of each suite unnamed, and models suite loading/compilation
//! and `setUpAll`/`tearDownAll` hooks as so-called virtual tests. This
//! module recovers the local display name for each entity, builds the
//! root-to-leaf name path used in location hints, and decides which entities
//! stay invisible as long as they pass.

use crate::model::{EntityId, EntityTables, Group, Test, ROOT_ID};
use camino::Utf8Path;

/// Name sentinel meaning "the runner gave no name".
pub(crate) const NO_NAME: &str = "<no name>";
/// Prefix of virtual tests that load a test suite.
pub(crate) const LOADING_PREFIX: &str = "loading ";
/// Prefix of virtual tests that compile a test suite.
pub(crate) const COMPILING_PREFIX: &str = "compiling ";
/// Virtual test wrapping a group's `setUpAll` hook.
pub(crate) const SET_UP_ALL: &str = "(setUpAll)";
/// Virtual test wrapping a group's `tearDownAll` hook.
pub(crate) const TEAR_DOWN_ALL: &str = "(tearDownAll)";

/// Whether the test stays invisible while it passes.
///
/// Loading/compiling virtual tests sit at the root with no parent group;
/// `setUpAll` runs before any test of its group has finished and
/// `tearDownAll` after at least one has. None of them should clutter the
/// results tree unless they fail, in which case the error handler promotes
/// them to ordinary visible tests.
pub(crate) fn hidden_if_passed(tables: &EntityTables, test: &Test) -> bool {
    match test.parent {
        None => {
            test.raw_name().starts_with(LOADING_PREFIX)
                || test.raw_name().starts_with(COMPILING_PREFIX)
        }
        Some(parent) => {
            let group = tables.group(parent);
            let base = test_base_name(tables, test);
            (group.done_count == 0 && base == SET_UP_ALL)
                || (group.done_count > 0 && base == TEAR_DOWN_ALL)
        }
    }
}

/// A group with no name, no parent, and no suite path: pure bookkeeping,
/// never shown to the consumer.
pub(crate) fn is_artificial(tables: &EntityTables, group: &Group) -> bool {
    group.name.is_none() && group.parent.is_none() && tables.suite_path(group.suite).is_none()
}

/// The id reported as `parentNodeId`: the parent group unless it is missing
/// or artificial, in which case the fixed root id.
pub(crate) fn valid_parent_id(tables: &EntityTables, parent: Option<EntityId>) -> EntityId {
    match parent {
        Some(pid) if !is_artificial(tables, tables.group(pid)) => pid,
        _ => ROOT_ID,
    }
}

/// The display name of a test.
pub(crate) fn test_base_name(tables: &EntityTables, test: &Test) -> String {
    if test.parent.is_none() {
        // Virtual loading/compiling tests carry the full suite path; shorten
        // it to the file name.
        for prefix in [LOADING_PREFIX, COMPILING_PREFIX] {
            if let Some(rest) = test.raw_name().strip_prefix(prefix) {
                return format!("{prefix}{}", file_name(rest));
            }
        }
        return test.raw_name().to_owned();
    }
    strip_parent_prefix(tables, test.raw_name(), test.parent)
}

/// The display name of a group.
pub(crate) fn group_base_name(tables: &EntityTables, group: &Group) -> String {
    // The implicit unnamed group at the root of a suite is displayed as the
    // suite's file name.
    if group.name.is_none() && group.parent.is_none() {
        if let Some(path) = tables.suite_path(group.suite) {
            return file_name(path.as_str()).to_owned();
        }
        return NO_NAME.to_owned();
    }

    // A group directly under the implicit root keeps its full name.
    if let Some(parent) = group.parent {
        let parent = tables.group(parent);
        if parent.name.is_none() && parent.parent.is_none() {
            return group.raw_name().to_owned();
        }
    }

    strip_parent_prefix(tables, group.raw_name(), group.parent)
}

/// Recovers the local name segment when the runner prefixed it with the
/// parent group's name.
fn strip_parent_prefix(tables: &EntityTables, raw: &str, parent: Option<EntityId>) -> String {
    if let Some(pid) = parent {
        let parent = tables.group(pid);
        if !is_artificial(tables, parent) {
            if let Some(rest) = raw
                .strip_prefix(parent.raw_name())
                .and_then(|rest| rest.strip_prefix(' '))
            {
                return rest.to_owned();
            }
        }
    }
    raw.to_owned()
}

/// Root-to-leaf display names for a test, for the location-hint tail.
pub(crate) fn test_name_path(tables: &EntityTables, test: &Test) -> Vec<String> {
    let mut names = ancestor_names(tables, test.parent);
    names.push(test_base_name(tables, test));
    names
}

/// Root-to-leaf display names for a group.
pub(crate) fn group_name_path(tables: &EntityTables, group: &Group) -> Vec<String> {
    if group.name.is_none() && group.parent.is_none() {
        return Vec::new();
    }
    let mut names = ancestor_names(tables, group.parent);
    names.push(group_base_name(tables, group));
    names
}

/// Display names of the group chain, root first, skipping the unnamed root.
fn ancestor_names(tables: &EntityTables, mut current: Option<EntityId>) -> Vec<String> {
    let mut chain = Vec::new();
    while let Some(gid) = current {
        chain.push(gid);
        current = tables.group(gid).parent;
    }

    let mut names = Vec::new();
    for gid in chain.into_iter().rev() {
        let group = tables.group(gid);
        if group.name.is_none() && group.parent.is_none() {
            continue;
        }
        names.push(group_base_name(tables, group));
    }
    names
}

/// Final path segment, used when display names embed whole file paths.
fn file_name(path: &str) -> &str {
    Utf8Path::new(path).file_name().unwrap_or(path)
}
