// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inverse of the wire encoding: one line back into a [`ServiceMessage`].

use crate::{
    errors::ParseError,
    serialize::{MESSAGE_PREFIX, MESSAGE_SUFFIX},
    ServiceMessage,
};

pub(crate) fn parse_message(line: &str) -> Result<ServiceMessage, ParseError> {
    let body = line
        .trim()
        .strip_prefix(MESSAGE_PREFIX)
        .ok_or(ParseError::MissingPrefix)?
        .strip_suffix(MESSAGE_SUFFIX)
        .ok_or(ParseError::Unterminated)?;

    let name_end = body.find(' ').unwrap_or(body.len());
    let name = &body[..name_end];
    if name.is_empty() {
        return Err(ParseError::EmptyName);
    }

    let mut message = ServiceMessage::new(name);
    let mut rest = body[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest.find('=').ok_or(ParseError::ExpectedEquals)?;
        let attr_name = &rest[..eq];
        if attr_name.is_empty()
            || !attr_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ParseError::InvalidAttributeName(attr_name.to_owned()));
        }

        let quoted = rest[eq + 1..]
            .strip_prefix('\'')
            .ok_or(ParseError::ExpectedQuote)?;
        let (value, remainder) = scan_value(quoted)?;
        message.add_attribute(attr_name, value);
        rest = remainder.trim_start();
    }

    Ok(message)
}

/// Unescapes an attribute value up to its closing quote, returning the value
/// and everything after the quote.
fn scan_value(input: &str) -> Result<(String, &str), ParseError> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\'' => return Ok((value, &input[i + 1..])),
            '|' => {
                let (_, escape) = chars.next().ok_or(ParseError::UnterminatedValue)?;
                value.push(match escape {
                    '|' => '|',
                    '\'' => '\'',
                    'n' => '\n',
                    'r' => '\r',
                    '[' => '[',
                    ']' => ']',
                    'x' => '\u{0085}',
                    'l' => '\u{2028}',
                    'p' => '\u{2029}',
                    other => return Err(ParseError::UnknownEscape(other)),
                });
            }
            other => value.push(other),
        }
    }
    Err(ParseError::UnterminatedValue)
}
