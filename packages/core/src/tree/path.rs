//! Materialized Path Encoding
//!
//! Converts between a node's position in a tree and its `path` string.
//!
//! Every level of the tree contributes one fixed-width segment: the node's
//! local index among its siblings, written in the configured alphabet and
//! left-padded with the alphabet's first character. With the default
//! settings (4 characters, alphabet `0-9A-Z`):
//!
//! ```text
//! Technology            0001
//! ├── Software          00010001
//! │   └── Embedded      000100010001
//! └── Hardware          00010002
//! Design                0002
//! ```
//!
//! Because the alphabet is ascending in byte order and segments have a fixed
//! width, lexicographic order of paths equals pre-order traversal, and
//! "is ancestor of" is a string-prefix test.

use crate::config::{ConfigError, TreeConfig};
use crate::tree::TreeError;

/// Encoder/decoder for fixed-width path segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEncoder {
    step_len: usize,
    alphabet: Vec<u8>,
}

impl Default for PathEncoder {
    fn default() -> Self {
        let config = TreeConfig::default();
        Self {
            step_len: config.step_len,
            alphabet: config.alphabet.into_bytes(),
        }
    }
}

impl PathEncoder {
    /// Build an encoder from validated tree settings
    pub fn new(config: &TreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            step_len: config.step_len,
            alphabet: config.alphabet.as_bytes().to_vec(),
        })
    }

    pub fn step_len(&self) -> usize {
        self.step_len
    }

    fn base(&self) -> u64 {
        self.alphabet.len() as u64
    }

    /// Largest local index that fits in one segment
    pub fn max_index(&self) -> u64 {
        u32::try_from(self.step_len)
            .ok()
            .and_then(|exp| self.base().checked_pow(exp))
            .map(|capacity| capacity - 1)
            .unwrap_or(u64::MAX)
    }

    /// Encode a single segment
    pub fn encode_segment(&self, local_index: u64) -> Result<String, TreeError> {
        if local_index > self.max_index() {
            return Err(TreeError::PathOverflow {
                index: local_index,
                step_len: self.step_len,
            });
        }

        let base = self.base();
        let mut digits = vec![self.alphabet[0]; self.step_len];
        let mut remaining = local_index;
        for slot in digits.iter_mut().rev() {
            if remaining == 0 {
                break;
            }
            *slot = self.alphabet[(remaining % base) as usize];
            remaining /= base;
        }

        // alphabet is validated ASCII
        Ok(digits.into_iter().map(char::from).collect())
    }

    /// Append the segment for `local_index` to `parent_path`.
    ///
    /// Without a parent the result is a root path.
    pub fn encode(&self, parent_path: Option<&str>, local_index: u64) -> Result<String, TreeError> {
        let segment = self.encode_segment(local_index)?;
        match parent_path {
            Some(parent) => {
                self.check_shape(parent)?;
                Ok(format!("{parent}{segment}"))
            }
            None => Ok(segment),
        }
    }

    /// Split `path` into segments and return each segment's numeric value,
    /// root first.
    pub fn decode(&self, path: &str) -> Result<Vec<u64>, TreeError> {
        self.check_shape(path)?;

        path.as_bytes()
            .chunks(self.step_len)
            .map(|chunk| self.decode_segment(path, chunk))
            .collect()
    }

    fn decode_segment(&self, path: &str, chunk: &[u8]) -> Result<u64, TreeError> {
        let base = self.base();
        chunk.iter().try_fold(0u64, |acc, byte| {
            let digit = self
                .alphabet
                .iter()
                .position(|c| c == byte)
                .ok_or_else(|| {
                    TreeError::malformed_path(
                        path,
                        format!("character '{}' is outside the path alphabet", char::from(*byte)),
                    )
                })?;
            acc.checked_mul(base)
                .and_then(|v| v.checked_add(digit as u64))
                .ok_or_else(|| TreeError::malformed_path(path, "segment value overflows"))
        })
    }

    fn check_shape(&self, path: &str) -> Result<(), TreeError> {
        if path.is_empty() {
            return Err(TreeError::malformed_path(path, "path is empty"));
        }
        if !path.is_ascii() {
            return Err(TreeError::malformed_path(path, "path is not ASCII"));
        }
        if path.len() % self.step_len != 0 {
            return Err(TreeError::malformed_path(
                path,
                format!(
                    "length {} is not a multiple of the segment width {}",
                    path.len(),
                    self.step_len
                ),
            ));
        }
        Ok(())
    }

    /// Number of segments in `path`
    pub fn depth_of(&self, path: &str) -> Result<u32, TreeError> {
        self.check_shape(path)?;
        u32::try_from(path.len() / self.step_len)
            .map_err(|_| TreeError::malformed_path(path, "path is too deep"))
    }

    /// Path of the immediate parent, `None` for roots
    pub fn parent_path<'a>(&self, path: &'a str) -> Result<Option<&'a str>, TreeError> {
        self.check_shape(path)?;
        if path.len() == self.step_len {
            Ok(None)
        } else {
            Ok(Some(&path[..path.len() - self.step_len]))
        }
    }

    /// Numeric value of the last segment (the node's own local index)
    pub fn last_segment(&self, path: &str) -> Result<u64, TreeError> {
        self.decode(path)?
            .last()
            .copied()
            .ok_or_else(|| TreeError::malformed_path(path, "path has no segments"))
    }

    /// Paths of every ancestor, root first, excluding `path` itself
    pub fn ancestor_paths(&self, path: &str) -> Result<Vec<String>, TreeError> {
        let depth = self.depth_of(path)? as usize;
        Ok((1..depth)
            .map(|level| path[..level * self.step_len].to_string())
            .collect())
    }

    /// Whether `ancestor` is a strict ancestor of `path`
    pub fn is_ancestor_path(&self, ancestor: &str, path: &str) -> bool {
        path.len() > ancestor.len() && path.starts_with(ancestor)
    }
}

/// Exclusive upper bound for a range scan over every path that starts
/// with `prefix`
pub(crate) fn prefix_upper_bound(prefix: &str) -> String {
    format!("{prefix}{}", char::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_segment_is_zero_padded() {
        let encoder = PathEncoder::default();
        assert_eq!(encoder.encode(None, 1).unwrap(), "0001");
        assert_eq!(encoder.encode(None, 35).unwrap(), "000Z");
        assert_eq!(encoder.encode(None, 36).unwrap(), "0010");
    }

    #[test]
    fn child_segment_is_appended_to_parent() {
        let encoder = PathEncoder::default();
        assert_eq!(encoder.encode(Some("0001"), 1).unwrap(), "00010001");
        assert_eq!(encoder.encode(Some("00010001"), 2).unwrap(), "000100010002");
    }

    #[test]
    fn decode_returns_one_value_per_level() {
        let encoder = PathEncoder::default();
        assert_eq!(encoder.decode("0001").unwrap(), vec![1]);
        assert_eq!(encoder.decode("0001000Z0010").unwrap(), vec![1, 35, 36]);
    }

    #[test]
    fn decode_rejects_partial_segments() {
        let encoder = PathEncoder::default();
        let err = encoder.decode("00010").unwrap_err();
        assert!(matches!(err, TreeError::MalformedPath { .. }));
        assert!(matches!(
            encoder.decode("").unwrap_err(),
            TreeError::MalformedPath { .. }
        ));
    }

    #[test]
    fn decode_rejects_characters_outside_alphabet() {
        let encoder = PathEncoder::default();
        assert!(matches!(
            encoder.decode("00a1").unwrap_err(),
            TreeError::MalformedPath { .. }
        ));
    }

    #[test]
    fn encode_rejects_index_beyond_segment_capacity() {
        let encoder = PathEncoder::default();
        assert_eq!(encoder.max_index(), 36u64.pow(4) - 1);
        assert_eq!(encoder.encode(None, encoder.max_index()).unwrap(), "ZZZZ");
        assert!(matches!(
            encoder.encode(None, encoder.max_index() + 1).unwrap_err(),
            TreeError::PathOverflow { .. }
        ));
    }

    #[test]
    fn encode_validates_parent_path() {
        let encoder = PathEncoder::default();
        assert!(encoder.encode(Some("001"), 1).is_err());
    }

    #[test]
    fn lexicographic_order_matches_numeric_order() {
        let encoder = PathEncoder::default();
        let mut paths: Vec<String> = (1..200).map(|i| encoder.encode(None, i).unwrap()).collect();
        let expected = paths.clone();
        paths.sort();
        assert_eq!(paths, expected);
    }

    #[test]
    fn encode_of_parent_and_last_segment_rebuilds_path() {
        let encoder = PathEncoder::default();
        for path in ["0001", "00010003", "0001000300A7"] {
            let parent = encoder.parent_path(path).unwrap();
            let last = encoder.last_segment(path).unwrap();
            assert_eq!(encoder.encode(parent, last).unwrap(), path);
        }
    }

    #[test]
    fn ancestor_paths_are_successive_prefixes() {
        let encoder = PathEncoder::default();
        assert_eq!(
            encoder.ancestor_paths("000100020003").unwrap(),
            vec!["0001".to_string(), "00010002".to_string()]
        );
        assert!(encoder.ancestor_paths("0001").unwrap().is_empty());
        assert!(encoder.is_ancestor_path("0001", "00010002"));
        assert!(!encoder.is_ancestor_path("0001", "0001"));
        assert!(!encoder.is_ancestor_path("0002", "00010002"));
    }

    #[test]
    fn custom_step_len_and_alphabet() {
        let config = TreeConfig {
            step_len: 2,
            alphabet: "01".to_string(),
            ..TreeConfig::default()
        };
        let encoder = PathEncoder::new(&config).unwrap();
        assert_eq!(encoder.max_index(), 3);
        assert_eq!(encoder.encode(Some("01"), 2).unwrap(), "0110");
        assert_eq!(encoder.decode("0110").unwrap(), vec![1, 2]);
    }

    #[test]
    fn upper_bound_sorts_after_every_descendant() {
        let bound = prefix_upper_bound("0001");
        assert!("0001ZZZZ" < bound.as_str());
        assert!("0002" > bound.as_str());
    }
}
