// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stateful fold from runner events to service messages.

use crate::{
    errors::FeedError,
    events::{self, EventType, JsonMap},
    location::{LocationResolver, DART_LOCATION_PREFIX},
    model::{EntityId, EntityTables, ROOT_ID},
    naming,
};
use regex::Regex;
use serde_json::Value;
use std::{
    collections::HashMap,
    io::{self, BufRead},
    sync::LazyLock,
};
use teamcity_messages::ServiceMessage;
use tracing::{debug, warn};

static NODE_ID_ATTR: &str = "nodeId";
static PARENT_NODE_ID_ATTR: &str = "parentNodeId";
static LOCATION_HINT_ATTR: &str = "locationHint";
static MESSAGE_ATTR: &str = "message";
static OUT_ATTR: &str = "out";
static DURATION_ATTR: &str = "duration";
static EXPECTED_ATTR: &str = "expected";
static ACTUAL_ATTR: &str = "actual";
static ERROR_ATTR: &str = "error";
static COUNT_ATTR: &str = "count";

static TEST_COUNT_MESSAGE: &str = "testCount";
static RUN_START_MESSAGE: &str = "enteredTheMatrix";

static LOCATION_UNKNOWN: &str = "unknown";

/// Marker that a matcher failure message may carry an expected/actual diff.
static EXPECTED_MARKER: &str = "Expected: ";

/// The two-line diff block `package:test` matchers print. `.` does not
/// cross lines, so the capture groups stay on their own lines.
static EXPECTED_ACTUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Expected: (.*)\n {2}Actual: (.*)\n *\^\n Differ.*\n")
        .expect("diff pattern is valid")
});

/// Substring of the runner's complaint when its `package:test` version
/// predates the json reporter.
static REPORTER_OPTION_REJECTED: &str =
    r#""json" is not an allowed value for option "reporter""#;
static BOOTSTRAP_TEST_NAME: &str = "Failed to start";
static BOOTSTRAP_ADVICE: &str =
    "Please update your pubspec.yaml dependency on package:test to version 0.12.9 or later.";

/// Receives the converter's output, one protocol line per call.
pub trait MessageSink {
    /// Accepts one line of protocol text, without a trailing newline.
    fn emit(&mut self, line: &str) -> io::Result<()>;
}

impl MessageSink for Vec<String> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_owned());
        Ok(())
    }
}

/// Adapter that writes each line, newline-terminated, to an [`io::Write`].
#[derive(Debug)]
pub struct WriteSink<W>(
    /// The underlying writer.
    pub W,
);

impl<W: io::Write> MessageSink for WriteSink<W> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.0, "{line}")
    }
}

/// Stateful translator from `package:test` JSON reporter events to
/// TeamCity-style service messages.
///
/// Feed raw runner output one line at a time via [`feed`](Self::feed); every
/// resulting protocol line goes to the supplied [`MessageSink`]. A `start`
/// event resets all state for a fresh run; a `done` event finishes any
/// groups whose completion was never signalled and clears state again.
///
/// The runner executes tests asynchronously, so a `testDone` can in
/// principle be followed by an `error` event for the same test. That late
/// error is reported (as failure output for the test) but does not reopen
/// or fail the already-finished test.
pub struct EventsConverter<R> {
    resolver: R,
    tables: EntityTables,
    /// Start timestamps by test id, for computing `duration`.
    start_times: HashMap<EntityId, i64>,
    /// Total suite count advertised by `allSuites`. Informational.
    suite_count: u64,
    /// Location learned from the latest loading/compiling virtual test,
    /// used when an entity has neither a resolvable url nor a suite path.
    last_location: Option<String>,
}

impl<R: LocationResolver> EventsConverter<R> {
    /// Creates a converter that resolves location urls through `resolver`.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            tables: EntityTables::default(),
            start_times: HashMap::new(),
            suite_count: 0,
            last_location: None,
        }
    }

    /// The total number of suites the runner advertised, 0 until an
    /// `allSuites` event arrives.
    pub fn advertised_suite_count(&self) -> u64 {
        self.suite_count
    }

    /// Processes one line of runner output.
    ///
    /// Lines that are not valid JSON pass through to the sink unchanged
    /// (modulo the bootstrap special case below); valid events update the
    /// converter's state and emit zero or more protocol lines. See
    /// [`FeedError`] for how the error variants differ in severity.
    pub fn feed<S: MessageSink>(&mut self, line: &str, sink: &mut S) -> Result<(), FeedError> {
        debug!("<<< {}", line.trim_end());
        let event: Value = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(_) => return self.handle_unstructured(line, sink),
        };
        match event {
            Value::Object(obj) => self.dispatch(&obj, sink),
            // Arrays and bare primitives are valid JSON the protocol never
            // assigns a meaning to.
            _ => Ok(()),
        }
    }

    /// Feeds every line from `reader`, applying the documented error
    /// policy: malformed events are logged and dropped, anything else stops
    /// the fold.
    pub fn feed_lines<S: MessageSink>(
        &mut self,
        reader: impl BufRead,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        for line in reader.lines() {
            let line = line.map_err(FeedError::Read)?;
            match self.feed(&line, sink) {
                Ok(()) => {}
                Err(FeedError::Malformed(error)) => {
                    warn!("dropping malformed event: {error}: {line}");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    fn dispatch<S: MessageSink>(&mut self, obj: &JsonMap, sink: &mut S) -> Result<(), FeedError> {
        let event_type = events::require_str(obj, events::TYPE)?;
        match EventType::classify(event_type) {
            EventType::TestStart => self.handle_test_start(obj, sink),
            EventType::TestDone => self.handle_test_done(obj, sink),
            EventType::Error => self.handle_error(obj, sink),
            EventType::Print => self.handle_print(obj, sink),
            EventType::Group => self.handle_group(obj, sink),
            EventType::Suite => self.handle_suite(obj),
            EventType::AllSuites => self.handle_all_suites(obj),
            EventType::RunStart => self.handle_start(sink),
            EventType::RunDone => self.handle_done(sink),
            EventType::Unrecognized => Ok(()),
        }
    }

    /// A line that is not JSON: either the bootstrap failure of a runner too
    /// old to know the json reporter, or already-formatted protocol text to
    /// pass through.
    fn handle_unstructured<S: MessageSink>(
        &mut self,
        line: &str,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        if line.contains(REPORTER_OPTION_REJECTED) {
            let mut failed = ServiceMessage::test_failed(BOOTSTRAP_TEST_NAME);
            failed.add_attribute(MESSAGE_ATTR, BOOTSTRAP_ADVICE);
            let messages = [
                ServiceMessage::test_started(BOOTSTRAP_TEST_NAME),
                failed,
                ServiceMessage::test_finished(BOOTSTRAP_TEST_NAME),
            ];
            for msg in messages {
                self.finish_message(msg, 1, ROOT_ID, sink)?;
            }
            return Ok(());
        }
        self.emit_raw(line, sink)
    }

    fn handle_test_start<S: MessageSink>(
        &mut self,
        obj: &JsonMap,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        let test_id = self.tables.resolve_test(obj)?;
        let timestamp = events::opt_i64(obj, events::TIME).unwrap_or(0);
        self.start_times.insert(test_id, timestamp);

        let test = self.tables.test(test_id);
        if naming::hidden_if_passed(&self.tables, test) {
            // No message yet; if an error arrives later the test is promoted
            // to a visible one. Loading/compiling names carry the suite
            // path, which is worth remembering as a location fallback.
            let name = test.raw_name();
            let path = name
                .strip_prefix(naming::LOADING_PREFIX)
                .or_else(|| name.strip_prefix(naming::COMPILING_PREFIX))
                .unwrap_or("");
            if !path.is_empty() {
                self.last_location = Some(format!("{DART_LOCATION_PREFIX}{path}"));
            }
            return Ok(());
        }

        let base_name = naming::test_base_name(&self.tables, test);
        let parent_id = naming::valid_parent_id(&self.tables, test.parent);
        let mut started = ServiceMessage::test_started(base_name.as_str());
        let hint = self.location_hint(
            test.url.as_deref(),
            test.suite,
            test.line,
            test.column,
            &naming::test_name_path(&self.tables, test),
        );
        started.add_attribute(LOCATION_HINT_ATTR, hint);
        let metadata = test.metadata.clone();

        self.tables.test_mut(test_id).start_reported = true;
        self.finish_message(started, test_id, parent_id, sink)?;

        if metadata.skip {
            let mut ignored = ServiceMessage::test_ignored(base_name.as_str());
            if let Some(reason) = &metadata.skip_reason {
                ignored.add_attribute(MESSAGE_ATTR, reason.as_str());
            }
            self.finish_message(ignored, test_id, parent_id, sink)?;
        }
        Ok(())
    }

    fn handle_test_done<S: MessageSink>(
        &mut self,
        obj: &JsonMap,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        let test_id = self.tables.resolve_test(obj)?;
        if !self.tables.test(test_id).start_reported {
            // Hidden virtual tests finish silently.
            return Ok(());
        }

        let result = events::str_or(obj, events::RESULT, events::NO_RESULT);
        if !matches!(
            result,
            events::RESULT_SUCCESS | events::RESULT_FAILURE | events::RESULT_ERROR
        ) {
            return Err(FeedError::UnknownResult {
                result: result.to_owned(),
            });
        }
        let timestamp = events::require_i64(obj, events::TIME)?;

        self.tables.record_test_done(test_id);

        let test = self.tables.test(test_id);
        let base_name = naming::test_base_name(&self.tables, test);
        let parent_id = naming::valid_parent_id(&self.tables, test.parent);
        let parent = test.parent;
        let duration = timestamp - self.start_times.get(&test_id).copied().unwrap_or(0);

        let mut finished = ServiceMessage::test_finished(base_name.as_str());
        finished.add_attribute(DURATION_ATTR, duration.to_string());
        self.finish_message(finished, test_id, parent_id, sink)?;

        self.cascade_group_finish(parent, sink)
    }

    fn handle_error<S: MessageSink>(
        &mut self,
        obj: &JsonMap,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        let test_id = self.tables.resolve_test(obj)?;
        let message = events::str_or(obj, events::ERROR_MESSAGE, events::NO_ERROR_MESSAGE);

        let (already_errored, needs_start) = {
            let test = self.tables.test(test_id);
            (test.error_reported, !test.start_reported)
        };
        // Only the first error for a test reports a failure, and a failure
        // must know whether it was an assertion or an unexpected error.
        let is_failure = if already_errored {
            true
        } else {
            events::require_bool(obj, events::IS_FAILURE)?
        };

        let test = self.tables.test(test_id);
        let base_name = naming::test_base_name(&self.tables, test);
        let parent_id = naming::valid_parent_id(&self.tables, test.parent);

        if needs_start {
            // Promotion of a hidden virtual test into a visible, failing one.
            self.tables.test_mut(test_id).start_reported = true;
            self.finish_message(
                ServiceMessage::test_started(base_name.as_str()),
                test_id,
                parent_id,
                sink,
            )?;
        }

        if already_errored {
            let mut std_err = ServiceMessage::test_std_err(base_name.as_str());
            std_err.add_attribute(OUT_ATTR, with_line_break(message));
            self.finish_message(std_err, test_id, parent_id, sink)?;
        } else {
            self.tables.test_mut(test_id).error_reported = true;

            let mut failed = ServiceMessage::test_failed(base_name.as_str());
            let mut headline = message;
            if let Some(marker) = message.find(EXPECTED_MARKER) {
                if let Some(captures) = EXPECTED_ACTUAL.captures_at(message, marker) {
                    failed.add_attribute(EXPECTED_ATTR, &captures[1]);
                    failed.add_attribute(ACTUAL_ATTR, &captures[2]);
                    headline = if marker == 0 {
                        "Comparison failed"
                    } else {
                        &message[..marker]
                    };
                }
            }
            if !is_failure {
                failed.add_attribute(ERROR_ATTR, "true");
            }
            failed.add_attribute(MESSAGE_ATTR, with_line_break(headline));
            self.finish_message(failed, test_id, parent_id, sink)?;
        }

        let stack_trace = events::str_or(obj, events::STACK_TRACE, events::NO_STACK_TRACE);
        if !stack_trace.trim().is_empty() {
            let mut std_err = ServiceMessage::test_std_err(base_name.as_str());
            std_err.add_attribute(OUT_ATTR, with_line_break(stack_trace));
            self.finish_message(std_err, test_id, parent_id, sink)?;
        }
        Ok(())
    }

    fn handle_print<S: MessageSink>(
        &mut self,
        obj: &JsonMap,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        let test_id = self.tables.resolve_test(obj)?;
        let message = events::str_or(obj, events::MESSAGE, events::NO_MESSAGE);

        let test = self.tables.test(test_id);
        let base_name = naming::test_base_name(&self.tables, test);
        let parent_id = naming::valid_parent_id(&self.tables, test.parent);

        if !test.start_reported {
            if base_name == naming::SET_UP_ALL || base_name == naming::TEAR_DOWN_ALL {
                // Output from passing hooks is not worth making them visible.
                return Ok(());
            }
            self.tables.test_mut(test_id).start_reported = true;
            self.finish_message(
                ServiceMessage::test_started(base_name.as_str()),
                test_id,
                parent_id,
                sink,
            )?;
        }

        let mut std_out = ServiceMessage::test_std_out(base_name.as_str());
        std_out.add_attribute(OUT_ATTR, with_line_break(message));
        self.finish_message(std_out, test_id, parent_id, sink)
    }

    fn handle_group<S: MessageSink>(
        &mut self,
        obj: &JsonMap,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        let group_id = self.tables.resolve_group(obj)?;
        let group = self.tables.group(group_id);

        // The implicit group at the root of a suite advertises how many
        // tests the whole suite will run.
        if group.parent.is_none() && group.test_count > 0 {
            let mut count = ServiceMessage::new(TEST_COUNT_MESSAGE);
            count.add_attribute(COUNT_ATTR, group.test_count.to_string());
            self.emit(&count, sink)?;
        }

        if naming::is_artificial(&self.tables, group) {
            return Ok(());
        }

        let base_name = naming::group_base_name(&self.tables, group);
        let parent_id = naming::valid_parent_id(&self.tables, group.parent);
        let mut started = ServiceMessage::test_suite_started(base_name.as_str());
        let hint = self.location_hint(
            group.url.as_deref(),
            group.suite,
            group.line,
            group.column,
            &naming::group_name_path(&self.tables, group),
        );
        started.add_attribute(LOCATION_HINT_ATTR, hint);
        self.finish_message(started, group_id, parent_id, sink)
    }

    fn handle_suite(&mut self, obj: &JsonMap) -> Result<(), FeedError> {
        let suite_id = self.tables.resolve_suite(obj)?;
        let suite = self.tables.suite(suite_id);
        if let Some(platform) = &suite.platform {
            debug!("suite {suite_id} runs on {platform}");
        }
        if !suite.has_path() {
            // Without a path the suite contributes no location data; keep it
            // out of the table entirely.
            self.tables.remove_suite(suite_id);
        }
        Ok(())
    }

    fn handle_all_suites(&mut self, obj: &JsonMap) -> Result<(), FeedError> {
        if let Some(count) = events::opt_i64(obj, events::COUNT) {
            self.suite_count = count.max(0) as u64;
        }
        Ok(())
    }

    fn handle_start<S: MessageSink>(&mut self, sink: &mut S) -> Result<(), FeedError> {
        self.reset();
        self.emit(&ServiceMessage::new(RUN_START_MESSAGE), sink)
    }

    fn handle_done<S: MessageSink>(&mut self, sink: &mut S) -> Result<(), FeedError> {
        // Runners before package:test 0.12.9 declare no group test counts,
        // so any group still open is finished here, in registration order.
        for group_id in self.tables.group_ids() {
            if self.tables.group(group_id).finished {
                continue;
            }
            if let Err(error) = self.finish_group(group_id, sink) {
                debug!("ignoring failure while flushing group {group_id}: {error}");
            }
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.tables.clear();
        self.start_times.clear();
        self.suite_count = 0;
        self.last_location = None;
    }

    /// Walks up from a finished test's parent, finishing every group whose
    /// declared count has been reached. A parent can complete as an
    /// indirect consequence of its last child group completing.
    fn cascade_group_finish<S: MessageSink>(
        &mut self,
        mut current: Option<EntityId>,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        while let Some(group_id) = current {
            let group = self.tables.group(group_id);
            if group.finished || group.test_count == 0 || group.done_count != group.test_count {
                break;
            }
            let parent = group.parent;
            self.finish_group(group_id, sink)?;
            current = parent;
        }
        Ok(())
    }

    /// Marks a group finished, emitting its finish message unless the group
    /// is artificial. Idempotent through the `finished` flag.
    fn finish_group<S: MessageSink>(
        &mut self,
        group_id: EntityId,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        let group = self.tables.group(group_id);
        let artificial = naming::is_artificial(&self.tables, group);
        let base_name = naming::group_base_name(&self.tables, group);
        let parent_id = naming::valid_parent_id(&self.tables, group.parent);

        self.tables.group_mut(group_id).finished = true;
        if artificial {
            return Ok(());
        }
        self.finish_message(
            ServiceMessage::test_suite_finished(base_name.as_str()),
            group_id,
            parent_id,
            sink,
        )
    }

    /// The `locationHint` attribute value for an entity.
    fn location_hint(
        &self,
        url: Option<&str>,
        suite: Option<EntityId>,
        line: i64,
        column: i64,
        names: &[String],
    ) -> String {
        let base = match url.and_then(|url| self.resolver.resolve(url)) {
            Some(path) => Some(format!("{DART_LOCATION_PREFIX}{path}")),
            None => match self.tables.suite_path(suite) {
                Some(path) => Some(format!("{DART_LOCATION_PREFIX}{path}")),
                None => self.last_location.clone(),
            },
        };
        match base {
            Some(base) => {
                let name_path =
                    serde_json::to_string(names).expect("lists of strings serialize");
                format!("{base},{line},{column},{name_path}")
            }
            None => LOCATION_UNKNOWN.to_owned(),
        }
    }

    fn finish_message<S: MessageSink>(
        &self,
        mut msg: ServiceMessage,
        id: EntityId,
        parent_id: EntityId,
        sink: &mut S,
    ) -> Result<(), FeedError> {
        msg.add_attribute(NODE_ID_ATTR, id.to_string());
        msg.add_attribute(PARENT_NODE_ID_ATTR, parent_id.to_string());
        self.emit(&msg, sink)
    }

    fn emit<S: MessageSink>(&self, msg: &ServiceMessage, sink: &mut S) -> Result<(), FeedError> {
        self.emit_raw(&msg.to_string(), sink)
    }

    fn emit_raw<S: MessageSink>(&self, line: &str, sink: &mut S) -> Result<(), FeedError> {
        debug!(">>> {line}");
        sink.emit(line).map_err(FeedError::Write)
    }
}

fn with_line_break(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_owned()
    } else {
        format!("{text}\n")
    }
}
