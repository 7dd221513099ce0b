// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire encoding for [`ServiceMessage`].

use crate::ServiceMessage;
use std::fmt;

pub(crate) static MESSAGE_PREFIX: &str = "##teamcity[";
pub(crate) static MESSAGE_SUFFIX: char = ']';

pub(crate) fn write_message(msg: &ServiceMessage, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(MESSAGE_PREFIX)?;
    f.write_str(msg.name())?;
    for (name, value) in msg.attributes() {
        write!(f, " {name}='")?;
        write_escaped(f, value)?;
        f.write_str("'")?;
    }
    write!(f, "{MESSAGE_SUFFIX}")
}

/// Escapes an attribute value, writing unescaped spans in bulk.
fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let mut start = 0;
    for (i, ch) in value.char_indices() {
        let escaped = match ch {
            '|' => "||",
            '\'' => "|'",
            '\n' => "|n",
            '\r' => "|r",
            '[' => "|[",
            ']' => "|]",
            '\u{0085}' => "|x",
            '\u{2028}' => "|l",
            '\u{2029}' => "|p",
            _ => continue,
        };

        if start < i {
            f.write_str(&value[start..i])?;
        }
        f.write_str(escaped)?;
        start = i + ch.len_utf8();
    }

    if start < value.len() {
        f.write_str(&value[start..])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ServiceMessage;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("plain", "plain"; "no escapes")]
    #[test_case("a|b", "a||b"; "vertical bar")]
    #[test_case("it's", "it|'s"; "single quote")]
    #[test_case("line\nbreak", "line|nbreak"; "newline")]
    #[test_case("cr\rlf\n", "cr|rlf|n"; "carriage return")]
    #[test_case("[ok]", "|[ok|]"; "brackets")]
    #[test_case("\u{0085}\u{2028}\u{2029}", "|x|l|p"; "unicode line separators")]
    #[test_case("ünïcode ≤ fine", "ünïcode ≤ fine"; "multibyte passthrough")]
    fn escapes_attribute_values(raw: &str, escaped: &str) {
        let mut msg = ServiceMessage::test_std_out("t");
        msg.add_attribute("out", raw);
        assert_eq!(
            msg.to_string(),
            format!("##teamcity[testStdOut name='t' out='{escaped}']")
        );
    }

    #[test]
    fn json_name_list_is_escaped_inside_location_hint() {
        let mut msg = ServiceMessage::test_started("adds");
        msg.add_attribute("locationHint", "dart_location:///t.dart,6,4,[\"math\",\"adds\"]");
        assert_eq!(
            msg.to_string(),
            "##teamcity[testStarted name='adds' \
             locationHint='dart_location:///t.dart,6,4,|[\"math\",\"adds\"|]']"
        );
    }
}
