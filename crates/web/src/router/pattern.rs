//! Path patterns.
//!
//! A pattern is a `/` separated list of literal segments, optionally ended by a
//! `*` segment that matches the rest of the path. A leading `/` is ignored on
//! both sides and literal segments compare ASCII case-insensitively.
//!
//! | pattern   | path            | result            |
//! |-----------|-----------------|-------------------|
//! | `post/*`  | `post/123/edit` | captures `123/edit` |
//! | `post/*`  | `post/`         | captures `""`     |
//! | `post/*`  | `post`          | no match          |
//! | `""`      | anything        | match             |
//! | `/`       | `/`             | match             |

use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Pattern {
    raw: String,
    segments: Vec<String>,
    wildcard: bool,
}

impl Pattern {
    pub(crate) fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.is_empty() {
            return Self { raw, segments: vec![], wildcard: false };
        }

        let trimmed = raw.strip_prefix('/').unwrap_or(&raw);
        let mut segments = trimmed.split('/').map(str::to_string).collect::<Vec<_>>();
        let wildcard = segments.last().is_some_and(|last| last == "*");
        if wildcard {
            segments.pop();
        }

        Self { raw, segments, wildcard }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    /// `None` when the path doesn't match, otherwise the captured wildcard tail, if any.
    pub(crate) fn matches(&self, path: &str) -> Option<Option<String>> {
        if self.raw.is_empty() {
            return Some(None);
        }

        let mut rest = path.strip_prefix('/').unwrap_or(path);
        let count = self.segments.len();

        for (index, segment) in self.segments.iter().enumerate() {
            if index + 1 == count && !self.wildcard {
                return rest.eq_ignore_ascii_case(segment).then_some(None);
            }

            let (head, tail) = rest.split_once('/')?;
            if !head.eq_ignore_ascii_case(segment) {
                return None;
            }
            rest = tail;
        }

        Some(Some(rest.to_string()))
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.raw).finish()
    }
}
