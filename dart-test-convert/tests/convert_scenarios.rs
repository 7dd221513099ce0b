// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios: raw runner lines in, protocol lines out.

use dart_test_convert::{EventsConverter, FeedError, FileUrlResolver, MalformedEvent};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn convert(lines: &[&str]) -> Vec<String> {
    let mut converter = EventsConverter::new(FileUrlResolver);
    let mut sink = Vec::new();
    for line in lines {
        converter
            .feed(line, &mut sink)
            .unwrap_or_else(|error| panic!("line should convert cleanly: {error}: {line}"));
    }
    sink
}

#[test]
fn a_full_suite_run_produces_the_whole_message_sequence() {
    let input = indoc! {r#"
        {"type":"start","protocolVersion":"0.1.1","runnerVersion":"1.24.0"}
        {"type":"allSuites","count":1}
        {"type":"suite","suite":{"id":0,"platform":"vm","path":"/work/app/test/calc_test.dart"}}
        {"type":"group","group":{"id":2,"suiteID":0,"parentID":null,"name":null,"metadata":{"skip":false,"skipReason":null},"testCount":2}}
        {"type":"group","group":{"id":3,"suiteID":0,"parentID":2,"name":"math","metadata":{"skip":false},"testCount":2,"line":5,"column":3,"url":"file:///work/app/test/calc_test.dart"}}
        {"type":"testStart","test":{"id":4,"name":"math adds","groupIDs":[2,3],"suiteID":0,"metadata":{"skip":false},"line":7,"column":5,"url":"file:///work/app/test/calc_test.dart"},"time":10}
        {"type":"testDone","testID":4,"result":"success","time":250}
        {"type":"testStart","test":{"id":5,"name":"math subtracts","groupIDs":[2,3],"suiteID":0,"line":11,"column":5,"url":"file:///work/app/test/calc_test.dart"},"time":260}
        {"type":"testDone","testID":5,"result":"success","time":300}
        {"type":"done","success":true}
    "#};

    let mut converter = EventsConverter::new(FileUrlResolver);
    let mut sink = Vec::new();
    converter
        .feed_lines(Cursor::new(input), &mut sink)
        .expect("the run is well-formed");

    assert_eq!(
        sink,
        [
            "##teamcity[enteredTheMatrix]",
            "##teamcity[testCount count='2']",
            "##teamcity[testSuiteStarted name='calc_test.dart' \
             locationHint='dart_location:///work/app/test/calc_test.dart,-1,-1,|[|]' \
             nodeId='2' parentNodeId='0']",
            "##teamcity[testSuiteStarted name='math' \
             locationHint='dart_location:///work/app/test/calc_test.dart,4,2,|[\"math\"|]' \
             nodeId='3' parentNodeId='2']",
            "##teamcity[testStarted name='adds' \
             locationHint='dart_location:///work/app/test/calc_test.dart,6,4,|[\"math\",\"adds\"|]' \
             nodeId='4' parentNodeId='3']",
            "##teamcity[testFinished name='adds' duration='240' nodeId='4' parentNodeId='3']",
            "##teamcity[testStarted name='subtracts' \
             locationHint='dart_location:///work/app/test/calc_test.dart,10,4,|[\"math\",\"subtracts\"|]' \
             nodeId='5' parentNodeId='3']",
            "##teamcity[testFinished name='subtracts' duration='40' nodeId='5' parentNodeId='3']",
            "##teamcity[testSuiteFinished name='math' nodeId='3' parentNodeId='2']",
            "##teamcity[testSuiteFinished name='calc_test.dart' nodeId='2' parentNodeId='0']",
        ]
    );
}

#[test]
fn a_root_level_test_starts_and_finishes() {
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"foo","groupIDs":[]}}"#,
        r#"{"type":"testDone","testID":1,"result":"success","time":100}"#,
    ]);
    assert_eq!(
        output,
        [
            "##teamcity[testStarted name='foo' locationHint='unknown' \
             nodeId='1' parentNodeId='0']",
            "##teamcity[testFinished name='foo' duration='100' nodeId='1' parentNodeId='0']",
        ]
    );
}

#[test]
fn matcher_failures_extract_expected_and_actual() {
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"foo","groupIDs":[]},"time":0}"#,
        r#"{"type":"error","testID":1,"error":"Expected: 1\n  Actual: 2\n ^\n Differ...\n","isFailure":true,"stackTrace":""}"#,
    ]);
    assert_eq!(
        output[1],
        "##teamcity[testFailed name='foo' expected='1' actual='2' \
         message='Comparison failed|n' nodeId='1' parentNodeId='0']"
    );
}

#[test]
fn text_before_the_diff_becomes_the_headline() {
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"foo","groupIDs":[]},"time":0}"#,
        r#"{"type":"error","testID":1,"error":"intro\nExpected: x\n  Actual: y\n ^\n Differ at offset 0\n","isFailure":true,"stackTrace":""}"#,
    ]);
    assert_eq!(
        output[1],
        "##teamcity[testFailed name='foo' expected='x' actual='y' \
         message='intro|n' nodeId='1' parentNodeId='0']"
    );
}

#[test]
fn messages_without_the_diff_pattern_stay_verbatim() {
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"foo","groupIDs":[]},"time":0}"#,
        r#"{"type":"error","testID":1,"error":"Expected: something went wrong","isFailure":false,"stackTrace":""}"#,
    ]);
    assert_eq!(
        output[1],
        "##teamcity[testFailed name='foo' error='true' \
         message='Expected: something went wrong|n' nodeId='1' parentNodeId='0']"
    );
}

#[test]
fn later_errors_for_the_same_test_degrade_to_stderr() {
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"foo","groupIDs":[]},"time":0}"#,
        r#"{"type":"error","testID":1,"error":"Expected: 1\n  Actual: 2\n ^\n Differ...\n","isFailure":true,"stackTrace":""}"#,
        r##"{"type":"error","testID":1,"error":"lingering failure","isFailure":true,"stackTrace":"#0 main"}"##,
    ]);
    assert_eq!(
        output[2..].to_vec(),
        [
            "##teamcity[testStdErr name='foo' out='lingering failure|n' \
             nodeId='1' parentNodeId='0']",
            "##teamcity[testStdErr name='foo' out='#0 main|n' nodeId='1' parentNodeId='0']",
        ]
    );
}

#[test]
fn loading_tests_surface_only_when_they_fail() {
    // The happy path: loading starts and finishes without a trace.
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"loading /work/app/test/calc_test.dart","groupIDs":[]},"time":0}"#,
        r#"{"type":"testDone","testID":1,"result":"success","time":40}"#,
    ]);
    assert_eq!(output, Vec::<String>::new());

    // A load failure promotes the virtual test, with exactly one started
    // message ahead of the failure.
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"loading /work/app/test/calc_test.dart","groupIDs":[]},"time":0}"#,
        r#"{"type":"error","testID":1,"error":"Failed to load","isFailure":false,"stackTrace":""}"#,
    ]);
    assert_eq!(
        output,
        [
            "##teamcity[testStarted name='loading calc_test.dart' nodeId='1' parentNodeId='0']",
            "##teamcity[testFailed name='loading calc_test.dart' error='true' \
             message='Failed to load|n' nodeId='1' parentNodeId='0']",
        ]
    );
}

#[test]
fn prints_promote_hidden_tests_but_not_hooks() {
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"loading /work/app/test/a_test.dart","groupIDs":[]},"time":0}"#,
        r#"{"type":"print","testID":1,"message":"Some warning"}"#,
    ]);
    assert_eq!(
        output,
        [
            "##teamcity[testStarted name='loading a_test.dart' nodeId='1' parentNodeId='0']",
            "##teamcity[testStdOut name='loading a_test.dart' out='Some warning|n' \
             nodeId='1' parentNodeId='0']",
        ]
    );
}

#[test]
fn skipped_tests_report_ignored_with_their_reason() {
    let output = convert(&[
        r#"{"type":"testStart","test":{"id":1,"name":"skipped later","groupIDs":[],"metadata":{"skip":true,"skipReason":"flaky on CI"}},"time":0}"#,
        r#"{"type":"testDone","testID":1,"result":"success","time":5}"#,
    ]);
    assert_eq!(
        output,
        [
            "##teamcity[testStarted name='skipped later' locationHint='unknown' \
             nodeId='1' parentNodeId='0']",
            "##teamcity[testIgnored name='skipped later' message='flaky on CI' \
             nodeId='1' parentNodeId='0']",
            "##teamcity[testFinished name='skipped later' duration='5' \
             nodeId='1' parentNodeId='0']",
        ]
    );
}

#[test]
fn hooks_stay_hidden_and_failures_in_them_promote() {
    let output = convert(&[
        r#"{"type":"group","group":{"id":2,"name":"math","testCount":1}}"#,
        r#"{"type":"testStart","test":{"id":3,"name":"math (setUpAll)","groupIDs":[2]},"time":0}"#,
        r#"{"type":"print","testID":3,"message":"preparing"}"#,
        r#"{"type":"testDone","testID":3,"result":"success","time":2}"#,
        r#"{"type":"testStart","test":{"id":4,"name":"math works","groupIDs":[2]},"time":3}"#,
        r#"{"type":"testDone","testID":4,"result":"success","time":9}"#,
        r#"{"type":"testStart","test":{"id":5,"name":"math (tearDownAll)","groupIDs":[2]},"time":10}"#,
        r##"{"type":"error","testID":5,"error":"Cleanup failed","isFailure":false,"stackTrace":"#0 tearDownAll"}"##,
    ]);
    assert_eq!(
        output,
        [
            "##teamcity[testCount count='1']",
            "##teamcity[testSuiteStarted name='math' locationHint='unknown' \
             nodeId='2' parentNodeId='0']",
            "##teamcity[testStarted name='works' locationHint='unknown' \
             nodeId='4' parentNodeId='2']",
            "##teamcity[testFinished name='works' duration='6' nodeId='4' parentNodeId='2']",
            "##teamcity[testSuiteFinished name='math' nodeId='2' parentNodeId='0']",
            "##teamcity[testStarted name='(tearDownAll)' nodeId='5' parentNodeId='2']",
            "##teamcity[testFailed name='(tearDownAll)' error='true' \
             message='Cleanup failed|n' nodeId='5' parentNodeId='2']",
            "##teamcity[testStdErr name='(tearDownAll)' out='#0 tearDownAll|n' \
             nodeId='5' parentNodeId='2']",
        ]
    );
}

#[test]
fn legacy_groups_without_counts_finish_at_the_end_of_the_run() {
    let output = convert(&[
        r#"{"type":"group","group":{"id":1,"name":"legacy"}}"#,
        r#"{"type":"testStart","test":{"id":2,"name":"legacy still runs","groupIDs":[1]},"time":0}"#,
        r#"{"type":"testDone","testID":2,"result":"success","time":7}"#,
        r#"{"type":"done","success":true}"#,
    ]);
    assert_eq!(
        output,
        [
            "##teamcity[testSuiteStarted name='legacy' locationHint='unknown' \
             nodeId='1' parentNodeId='0']",
            "##teamcity[testStarted name='still runs' locationHint='unknown' \
             nodeId='2' parentNodeId='1']",
            "##teamcity[testFinished name='still runs' duration='7' nodeId='2' parentNodeId='1']",
            "##teamcity[testSuiteFinished name='legacy' nodeId='1' parentNodeId='0']",
        ]
    );
}

#[test]
fn a_finished_group_never_finishes_twice() {
    // A stray duplicate completion still reports the test, but the group's
    // finish is emitted exactly once.
    let output = convert(&[
        r#"{"type":"group","group":{"id":2,"name":"math","testCount":1}}"#,
        r#"{"type":"testStart","test":{"id":3,"name":"math adds","groupIDs":[2]},"time":0}"#,
        r#"{"type":"testDone","testID":3,"result":"success","time":5}"#,
        r#"{"type":"testDone","testID":3,"result":"success","time":6}"#,
        r#"{"type":"done","success":true}"#,
    ]);
    let finishes = output
        .iter()
        .filter(|line| line.contains("testSuiteFinished"))
        .count();
    assert_eq!(finishes, 1);
}

#[test]
fn unparseable_lines_pass_through_unchanged() {
    let output = convert(&["Observatory listening on http://127.0.0.1:8181/"]);
    assert_eq!(output, ["Observatory listening on http://127.0.0.1:8181/"]);
}

#[test]
fn an_old_runner_rejecting_the_json_reporter_fails_visibly() {
    let output = convert(&[
        r#"Exception: "json" is not an allowed value for option "reporter""#,
    ]);
    assert_eq!(
        output,
        [
            "##teamcity[testStarted name='Failed to start' nodeId='1' parentNodeId='0']",
            "##teamcity[testFailed name='Failed to start' \
             message='Please update your pubspec.yaml dependency on package:test \
             to version 0.12.9 or later.' nodeId='1' parentNodeId='0']",
            "##teamcity[testFinished name='Failed to start' nodeId='1' parentNodeId='0']",
        ]
    );
}

#[test]
fn a_first_error_without_the_failure_flag_is_malformed_and_emits_nothing() {
    let mut converter = EventsConverter::new(FileUrlResolver);
    let mut sink = Vec::new();
    converter
        .feed(
            r#"{"type":"testStart","test":{"id":1,"name":"foo","groupIDs":[]},"time":0}"#,
            &mut sink,
        )
        .unwrap();
    let before = sink.len();

    let err = converter
        .feed(r#"{"type":"error","testID":1,"error":"boom"}"#, &mut sink)
        .unwrap_err();
    assert!(matches!(
        err,
        FeedError::Malformed(MalformedEvent::InvalidField {
            field: "isFailure",
            ..
        })
    ));
    assert_eq!(sink.len(), before);

    // The converter is still usable afterwards.
    converter
        .feed(
            r#"{"type":"testDone","testID":1,"result":"success","time":1}"#,
            &mut sink,
        )
        .unwrap();
    assert_eq!(sink.len(), before + 1);
}
