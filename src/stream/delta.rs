//! Textual delta patcher
//!
//! Subscription updates arrive as textual edit scripts applied to the raw
//! text of the previous snapshot, not to the parsed JSON tree. The server
//! computes edit positions against the exact bytes it serialized, so the
//! stored snapshot text must never be re-serialized through a local JSON
//! encoder or subsequent deltas will misalign.
//!
//! A delta script is a whitespace-separated sequence of tokens:
//!
//! | Token   | Meaning                                                   |
//! |---------|-----------------------------------------------------------|
//! | `=N`    | Copy the next `N` characters from the previous snapshot.  |
//! | `-N`    | Skip the next `N` characters of the previous snapshot.    |
//! | `+TEXT` | Insert the literal characters `TEXT` into the output.     |
//!
//! The patcher walks the tokens left-to-right with a read cursor into the
//! previous text and an output buffer. It does not verify that the cursor
//! ends exactly at the end of the previous text; trailing characters are
//! implicitly discarded. An empty script therefore yields an empty
//! document.

use thiserror::Error;

/// Errors produced while applying a delta script.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeltaError {
    /// A `=` or `-` token whose argument is not a base-10 integer.
    #[error("invalid count in delta token {token:?}")]
    InvalidCount {
        /// The offending token, verbatim.
        token: String,
    },

    /// A token that starts with none of `=`, `-`, `+`.
    #[error("unknown delta token {token:?}")]
    UnknownToken {
        /// The offending token, verbatim.
        token: String,
    },
}

/// Apply a delta script to the previous snapshot text, producing the new
/// document text.
///
/// The function is pure: `previous` is not mutated and a fresh `String`
/// is returned. Counts address *characters* of `previous`, matching the
/// string-slicing semantics the server patches against. Copy and skip
/// runs that extend past the end of `previous` clamp at the end rather
/// than failing.
///
/// # Arguments
///
/// * `previous` - Raw text of the last stored snapshot.
/// * `delta` - Whitespace-separated edit script.
///
/// # Errors
///
/// Returns [`DeltaError`] when a token is malformed. The caller treats
/// this as a protocol anomaly: the frame is dropped and the stored
/// snapshot is left untouched.
///
/// # Examples
///
/// ```
/// use zetatrade::stream::delta::apply;
///
/// let next = apply("Hello", "=5 +World").unwrap();
/// assert_eq!(next, "HelloWorld");
/// ```
pub fn apply(previous: &str, delta: &str) -> Result<String, DeltaError> {
    let chars: Vec<char> = previous.chars().collect();
    let mut cursor = 0usize;
    let mut output = String::with_capacity(previous.len());

    for token in delta.split_whitespace() {
        match token.as_bytes().first() {
            Some(b'=') => {
                let count = parse_count(token)?;
                let end = cursor.saturating_add(count).min(chars.len());
                output.extend(&chars[cursor..end]);
                cursor = end;
            }
            Some(b'-') => {
                let count = parse_count(token)?;
                cursor = cursor.saturating_add(count).min(chars.len());
            }
            Some(b'+') => {
                output.push_str(&token[1..]);
            }
            _ => {
                return Err(DeltaError::UnknownToken {
                    token: token.to_string(),
                });
            }
        }
    }

    Ok(output)
}

/// Parse the base-10 argument of a `=N` or `-N` token.
fn parse_count(token: &str) -> Result<usize, DeltaError> {
    token[1..].parse::<usize>().map_err(|_| DeltaError::InvalidCount {
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Copy then insert: `"Hello"` + `"=5 +World"` ⇒ `"HelloWorld"`.
    #[test]
    fn test_copy_then_insert() {
        assert_eq!(apply("Hello", "=5 +World").unwrap(), "HelloWorld");
    }

    /// Copy then skip: `"Hello World"` + `"=5 -6"` ⇒ `"Hello"`.
    #[test]
    fn test_copy_then_skip() {
        assert_eq!(apply("Hello World", "=5 -6").unwrap(), "Hello");
    }

    /// Full copy reproduces the previous text.
    #[test]
    fn test_full_copy() {
        assert_eq!(apply("Hello World", "=11").unwrap(), "Hello World");
    }

    /// An empty script yields an empty document.
    #[test]
    fn test_empty_delta_yields_empty_document() {
        assert_eq!(apply("Hello World", "").unwrap(), "");
    }

    /// Skip from the start drops a prefix.
    #[test]
    fn test_skip_prefix() {
        assert_eq!(apply("Hello World", "-6 =5").unwrap(), "World");
    }

    /// Insert into the middle of a copied region.
    #[test]
    fn test_insert_mid_document() {
        assert_eq!(apply("ac", "=1 +b =1").unwrap(), "abc");
    }

    /// Trailing characters not covered by the script are discarded.
    #[test]
    fn test_trailing_characters_discarded() {
        assert_eq!(apply("abcdef", "=3").unwrap(), "abc");
    }

    /// Copy runs that overshoot the end of the previous text clamp.
    #[test]
    fn test_copy_overshoot_clamps() {
        assert_eq!(apply("abc", "=10").unwrap(), "abc");
    }

    /// Skip runs that overshoot leave the cursor at the end.
    #[test]
    fn test_skip_overshoot_clamps() {
        assert_eq!(apply("abc", "-10 +x").unwrap(), "x");
    }

    /// Counts address characters, not bytes.
    #[test]
    fn test_counts_are_characters_not_bytes() {
        // "äöü" is three characters but six UTF-8 bytes.
        assert_eq!(apply("äöü!", "=3").unwrap(), "äöü");
        assert_eq!(apply("äöü!", "-2 =2").unwrap(), "ü!");
    }

    /// A JSON document patched field-by-field composes correctly.
    #[test]
    fn test_json_snapshot_patch() {
        let prev = r#"{"a":1,"b":2}"#;
        let next = apply(prev, "=11 +9}").unwrap();
        assert_eq!(next, r#"{"a":1,"b":9}"#);
        let value: serde_json::Value = serde_json::from_str(&next).unwrap();
        assert_eq!(value["b"], 9);
    }

    /// Two deltas chain: the output of the first is the input of the second.
    #[test]
    fn test_deltas_compose() {
        let first = apply("Hello", "=5 +World").unwrap();
        assert_eq!(first, "HelloWorld");
        let second = apply(&first, "-5 =5 +!").unwrap();
        assert_eq!(second, "World!");
    }

    /// `apply` does not mutate its input.
    #[test]
    fn test_previous_is_untouched() {
        let prev = String::from("immutable");
        let _ = apply(&prev, "-9 +replaced").unwrap();
        assert_eq!(prev, "immutable");
    }

    /// A count of zero is legal and a no-op.
    #[test]
    fn test_zero_counts() {
        assert_eq!(apply("abc", "=0 -0 =3").unwrap(), "abc");
    }

    /// A non-numeric count is rejected.
    #[test]
    fn test_invalid_count_rejected() {
        let err = apply("abc", "=x").unwrap_err();
        assert_eq!(
            err,
            DeltaError::InvalidCount {
                token: "=x".to_string()
            }
        );
    }

    /// A negative count is rejected (counts are non-negative by grammar).
    #[test]
    fn test_negative_count_rejected() {
        assert!(matches!(
            apply("abc", "=-1"),
            Err(DeltaError::InvalidCount { .. })
        ));
    }

    /// A token with an unknown prefix is rejected.
    #[test]
    fn test_unknown_token_rejected() {
        let err = apply("abc", "=1 ?2").unwrap_err();
        assert_eq!(
            err,
            DeltaError::UnknownToken {
                token: "?2".to_string()
            }
        );
    }

    /// A bare `+` inserts nothing but is well-formed.
    #[test]
    fn test_bare_plus_inserts_nothing() {
        assert_eq!(apply("abc", "+ =3").unwrap(), "abc");
    }
}
