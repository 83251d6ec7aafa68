//! core::properties
//!
//! Codec for `.properties` configuration files.
//!
//! Each pid is stored as one properties file. Parsing follows the classic
//! line-oriented format:
//!
//! - `key=value`, `key: value` and `key value` are all accepted
//! - lines starting with `#` or `!` are comments
//! - a line ending in an odd number of backslashes continues on the next line
//! - escapes: `\t \n \r \f \\ \uXXXX`, any other escaped char stands for itself
//!
//! Serialization is deterministic (keys sorted) and escapes everything the
//! parser would otherwise interpret, so `parse(serialize(m)) == m`.
//!
//! # Example
//!
//! ```
//! use fleetconf::core::properties;
//! use std::collections::BTreeMap;
//!
//! let map = properties::parse("# comment\nx = 1\npath: /opt/app\n").unwrap();
//! assert_eq!(map.get("x").map(String::as_str), Some("1"));
//! assert_eq!(map.get("path").map(String::as_str), Some("/opt/app"));
//!
//! let mut out = BTreeMap::new();
//! out.insert("greeting".to_string(), "hello world".to_string());
//! assert_eq!(properties::serialize(&out), "greeting=hello world\n");
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors from properties parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropertiesError {
    #[error("properties content is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed \\u escape on line {line}")]
    InvalidEscape { line: usize },
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Parse properties from raw bytes.
pub fn parse_bytes(bytes: &[u8]) -> Result<BTreeMap<String, String>, PropertiesError> {
    let text = std::str::from_utf8(bytes).map_err(|_| PropertiesError::InvalidUtf8)?;
    parse(text)
}

/// Parse properties text into a sorted map.
///
/// Later duplicates of a key override earlier ones.
pub fn parse(input: &str) -> Result<BTreeMap<String, String>, PropertiesError> {
    let mut map = BTreeMap::new();
    let mut lines = input.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let line_no = index + 1;
        let trimmed = raw.trim_start_matches(is_blank);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        map.insert(unescape(key, line_no)?, unescape(value, line_no)?);
    }

    Ok(map)
}

fn ends_with_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}

/// Split a logical line into its raw (still escaped) key and value.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(|c| c == '=' || c == ':') {
        rest = stripped.trim_start_matches(is_blank);
    }
    (key, rest)
}

fn unescape(raw: &str, line: usize) -> Result<String, PropertiesError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let unit = read_code_unit(&mut chars, line)?;
                if (0xD800..=0xDBFF).contains(&unit) {
                    // High surrogate: a \uXXXX low surrogate must follow.
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(PropertiesError::InvalidEscape { line });
                    }
                    let low = read_code_unit(&mut chars, line)?;
                    let decoded = char::decode_utf16([unit, low])
                        .next()
                        .and_then(Result::ok)
                        .ok_or(PropertiesError::InvalidEscape { line })?;
                    out.push(decoded);
                } else {
                    let decoded = char::from_u32(u32::from(unit))
                        .ok_or(PropertiesError::InvalidEscape { line })?;
                    out.push(decoded);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

fn read_code_unit(chars: &mut std::str::Chars<'_>, line: usize) -> Result<u16, PropertiesError> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 {
        return Err(PropertiesError::InvalidEscape { line });
    }
    u16::from_str_radix(&digits, 16).map_err(|_| PropertiesError::InvalidEscape { line })
}

/// Serialize a map into properties text, one `key=value` line per entry.
pub fn serialize(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in map {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    for (i, c) in text.chars().enumerate() {
        match c {
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn separators() {
        let parsed = parse("a=1\nb: 2\nc 3\nd   =   4\ne\n").unwrap();
        assert_eq!(
            parsed,
            map(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "")])
        );
    }

    #[test]
    fn comments_and_blank_lines() {
        let parsed = parse("#Profile:web\n! bang comment\n\n   \nx=1\n").unwrap();
        assert_eq!(parsed, map(&[("x", "1")]));
    }

    #[test]
    fn line_continuation() {
        let parsed = parse("list=a,\\\n    b,\\\n    c\n").unwrap();
        assert_eq!(parsed, map(&[("list", "a,b,c")]));
    }

    #[test]
    fn even_backslashes_do_not_continue() {
        let parsed = parse("path=c:\\\\\nnext=1\n").unwrap();
        assert_eq!(parsed, map(&[("path", "c:\\"), ("next", "1")]));
    }

    #[test]
    fn escapes() {
        let parsed = parse("k\\=ey=tab\\there\\u00e9\nsp\\ ace=x\n").unwrap();
        assert_eq!(parsed.get("k=ey").unwrap(), "tab\there\u{e9}");
        assert_eq!(parsed.get("sp ace").unwrap(), "x");
    }

    #[test]
    fn surrogate_pair() {
        let parsed = parse("emoji=\\ud83d\\ude00\n").unwrap();
        assert_eq!(parsed.get("emoji").unwrap(), "\u{1F600}");
    }

    #[test]
    fn malformed_unicode_escape() {
        assert_eq!(
            parse("a=1\nb=\\u12\n"),
            Err(PropertiesError::InvalidEscape { line: 2 })
        );
        assert!(parse("b=\\uzzzz\n").is_err());
    }

    #[test]
    fn later_keys_override() {
        assert_eq!(parse("x=1\nx=2\n").unwrap(), map(&[("x", "2")]));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert_eq!(parse_bytes(&[0x78, 0x3d, 0xff]), Err(PropertiesError::InvalidUtf8));
    }

    #[test]
    fn serialize_is_sorted_and_escaped() {
        let m = map(&[("b", " leading"), ("a", "x=y#z"), ("key with space", "multi\nline")]);
        let text = serialize(&m);
        assert_eq!(
            text,
            "a=x\\=y\\#z\nb=\\ leading\nkey\\ with\\ space=multi\\nline\n"
        );
        assert_eq!(parse(&text).unwrap(), m);
    }

    #[test]
    fn serialize_control_chars() {
        let m = map(&[("bell", "\u{7}")]);
        let text = serialize(&m);
        assert_eq!(text, "bell=\\u0007\n");
        assert_eq!(parse(&text).unwrap(), m);
    }

    #[test]
    fn empty_map() {
        assert_eq!(serialize(&BTreeMap::new()), "");
        assert!(parse("").unwrap().is_empty());
    }
}
