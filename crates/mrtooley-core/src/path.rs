// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key and path rules for the key-value tree.
//!
//! A key is `[A-Za-z0-9_.]+`. A path is one or more keys joined by `/`.
//! Empty segments (`a//b`, `/a`, `a/`) are rejected.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::MrTooleyError;

/// Separator between keys in a path.
pub const PATH_SEP: char = '/';

static VALID_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.]+$").unwrap());
static INVALID_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.]").unwrap());

/// True if `key` is a single valid key.
pub fn is_valid_key(key: &str) -> bool {
    VALID_KEY.is_match(key)
}

/// Validates a single key.
pub fn validate_key(key: &str) -> Result<(), MrTooleyError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(invalid(key))
    }
}

/// Validates every segment of a path.
pub fn validate_path(path: &str) -> Result<(), MrTooleyError> {
    if path.split(PATH_SEP).all(is_valid_key) {
        Ok(())
    } else {
        Err(invalid(path))
    }
}

/// Splits `"a/b/c"` into `("a", Some("b/c"))` and `"a"` into `("a", None)`.
pub fn split_first(path: &str) -> Result<(&str, Option<&str>), MrTooleyError> {
    validate_path(path)?;
    Ok(match path.split_once(PATH_SEP) {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    })
}

/// Splits `"a/b/c"` into `(Some("a/b"), "c")` and `"c"` into `(None, "c")`.
pub fn split_last(path: &str) -> Result<(Option<&str>, &str), MrTooleyError> {
    validate_path(path)?;
    Ok(match path.rsplit_once(PATH_SEP) {
        Some((begin, last)) => (Some(begin), last),
        None => (None, path),
    })
}

/// Joins a parent path and a key; a `None` parent yields the key itself.
pub fn join(parent: Option<&str>, key: &str) -> String {
    match parent {
        Some(p) if !p.is_empty() => format!("{p}{PATH_SEP}{key}"),
        _ => key.to_string(),
    }
}

/// Replaces characters not allowed in keys, e.g. to derive a key from a display name.
pub fn make_keyname(source: &str, replacement: &str) -> String {
    INVALID_KEY_CHARS.replace_all(source, replacement).into_owned()
}

fn invalid(path: &str) -> MrTooleyError {
    MrTooleyError::key(format!("invalid key or path: {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn simple_key_splits() {
        assert_eq!(split_first("key").unwrap(), ("key", None));
        assert_eq!(split_last("key").unwrap(), (None, "key"));
    }

    #[test]
    fn deep_path_splits() {
        assert_eq!(split_first("some/path/key").unwrap(), ("some", Some("path/key")));
        assert_eq!(split_last("some/path/key").unwrap(), (Some("some/path"), "key"));
    }

    #[test]
    fn single_char_parent_is_accepted() {
        assert_eq!(split_last("a/b").unwrap(), (Some("a"), "b"));
    }

    #[test]
    fn empty_segments_are_rejected() {
        for bad in ["", "/a", "a/", "a//b", "a b", "a:b", "ü"] {
            let err = split_last(bad).unwrap_err();
            assert!(err.is_missing_key(), "{bad}: {err}");
            assert!(err.to_string().contains("invalid key or path"));
        }
    }

    #[test]
    fn dots_are_part_of_keys() {
        assert!(is_valid_key("v1.2_beta"));
        assert_eq!(split_first("a.b/c").unwrap(), ("a.b", Some("c")));
    }

    #[test]
    fn keyname_replaces_invalid_chars() {
        assert_eq!(make_keyname("My Tool: v2", ""), "MyToolv2");
        assert_eq!(make_keyname("a b", "_"), "a_b");
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join(None, "k"), "k");
        assert_eq!(join(Some("a/b"), "k"), "a/b/k");
    }

    proptest! {
        #[test]
        fn split_last_joins_back(segments in prop::collection::vec("[a-zA-Z0-9_.]{1,8}", 1..6)) {
            let path = segments.join("/");
            let (begin, last) = split_last(&path).unwrap();
            prop_assert_eq!(join(begin, last), path.clone());
            let (first, rest) = split_first(&path).unwrap();
            let rejoined = match rest {
                Some(r) => format!("{first}/{r}"),
                None => first.to_string(),
            };
            prop_assert_eq!(rejoined, path);
        }
    }
}
