// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Keyspace constraint model
//!
//! Describes what is known about each key byte: either a fixed value, or an
//! inclusive `[min, max]` range of raw values. Every position also carries an
//! additive offset modelling a known transformation between a raw parameter
//! (a month, an hour, a version number) and the byte that ends up in the key.
//! Arithmetic is modulo 256.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Constraint on a single key byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Position {
    /// Known byte, contributes `value + offset`
    Fixed { value: u8, offset: u8 },
    /// Unknown byte, raw value enumerated over `min..=max`
    Free { min: u8, max: u8, offset: u8 },
}

impl Position {
    pub fn offset(&self) -> u8 {
        match *self {
            Position::Fixed { offset, .. } | Position::Free { offset, .. } => offset,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Position::Free { .. })
    }

    /// Number of raw values this position can take
    pub fn range_len(&self) -> u16 {
        match *self {
            Position::Fixed { .. } => 1,
            Position::Free { min, max, .. } => u16::from(max) - u16::from(min) + 1,
        }
    }

    /// First raw value in enumeration order
    pub fn first_raw(&self) -> u8 {
        match *self {
            Position::Fixed { value, .. } => value,
            Position::Free { min, .. } => min,
        }
    }
}

/// Immutable description of the key space to search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyConstraints {
    positions: Vec<Position>,
}

impl KeyConstraints {
    /// Build the model from five parallel per-byte sequences.
    ///
    /// `min`/`max` are ignored where `is_known[i]` is set.
    pub fn new(
        known: &[u8],
        is_known: &[bool],
        offset: &[u8],
        min: &[u8],
        max: &[u8],
    ) -> Result<Self> {
        let len = known.len();
        let lengths = [is_known.len(), offset.len(), min.len(), max.len()];
        if lengths.iter().any(|&l| l != len) {
            return Err(Error::Config(format!(
                "Constraint sequences must have equal lengths (known={}, is_known={}, offset={}, min={}, max={})",
                len, lengths[0], lengths[1], lengths[2], lengths[3]
            )));
        }

        let positions = (0..len)
            .map(|i| {
                if is_known[i] {
                    Position::Fixed {
                        value: known[i],
                        offset: offset[i],
                    }
                } else {
                    Position::Free {
                        min: min[i],
                        max: max[i],
                        offset: offset[i],
                    }
                }
            })
            .collect();

        Self::from_positions(positions)
    }

    /// Build the model from per-position constraints
    pub fn from_positions(positions: Vec<Position>) -> Result<Self> {
        if positions.is_empty() {
            return Err(Error::Config("Key length must be at least 1".to_string()));
        }

        for (i, position) in positions.iter().enumerate() {
            if let Position::Free { min, max, .. } = *position {
                if min > max {
                    return Err(Error::Config(format!(
                        "Key byte {}: min {:#04x} exceeds max {:#04x}",
                        i, min, max
                    )));
                }
            }
        }

        Ok(Self { positions })
    }

    /// `len` unknown bytes spanning the full byte range, no offsets
    pub fn all_free(len: usize) -> Result<Self> {
        Self::from_positions(vec![
            Position::Free {
                min: 0,
                max: 255,
                offset: 0,
            };
            len
        ])
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, index: usize) -> Option<&Position> {
        self.positions.get(index)
    }

    /// Indices of the unknown bytes, left to right
    pub fn free_positions(&self) -> Vec<usize> {
        self.positions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_free())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of candidate keys: the product of the free ranges
    pub fn key_space_size(&self) -> Result<u128> {
        self.positions.iter().try_fold(1u128, |acc, p| {
            acc.checked_mul(u128::from(p.range_len()))
                .ok_or_else(|| Error::Config("Key space size overflows 128 bits".to_string()))
        })
    }

    /// Turn raw per-position values into key bytes
    #[inline]
    pub fn apply_offsets(&self, raw: &[u8], out: &mut [u8]) {
        for ((dst, &r), p) in out.iter_mut().zip(raw).zip(&self.positions) {
            *dst = r.wrapping_add(p.offset());
        }
    }

    /// Recover raw per-position values from a key
    pub fn raw_values(&self, key: &[u8]) -> Vec<u8> {
        key.iter()
            .zip(&self.positions)
            .map(|(&k, p)| k.wrapping_sub(p.offset()))
            .collect()
    }

    /// Check whether a key lies inside the constrained space
    pub fn contains(&self, key: &[u8]) -> bool {
        key.len() == self.len()
            && self
                .raw_values(key)
                .iter()
                .zip(&self.positions)
                .all(|(&r, p)| match *p {
                    Position::Fixed { value, .. } => r == value,
                    Position::Free { min, max, .. } => (min..=max).contains(&r),
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_constraints() -> KeyConstraints {
        KeyConstraints::new(
            &[0x62, 0x30, 0x30, 0x21, 0, 0, 0, 0, 0, 0, 0],
            &[true, true, true, true, false, false, false, false, false, false, false],
            &[0, 0, 0, 0, 0x35, 0x29, 0x40, 0x73, 0x5d, 0x3f, 0x6b],
            &[0, 0, 0, 0, 1, 1, 0, 5, 0, 0, 0],
            &[0, 0, 0, 0, 12, 31, 23, 12, 4, 2, 147],
        )
        .unwrap()
    }

    #[test]
    fn test_sample_space_size() {
        let constraints = sample_constraints();
        assert_eq!(constraints.len(), 11);
        assert_eq!(constraints.free_positions(), vec![4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(
            constraints.key_space_size().unwrap(),
            12 * 31 * 24 * 8 * 5 * 3 * 148
        );
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = KeyConstraints::new(&[0, 0], &[false], &[0, 0], &[0, 0], &[1, 1]).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = KeyConstraints::new(&[0], &[false], &[0], &[9], &[3]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_known_byte_ignores_bounds() {
        let constraints = KeyConstraints::new(&[7], &[true], &[0], &[9], &[3]).unwrap();
        assert_eq!(constraints.key_space_size().unwrap(), 1);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(KeyConstraints::new(&[], &[], &[], &[], &[]).is_err());
    }

    #[test]
    fn test_offsets_wrap() {
        let constraints = KeyConstraints::new(
            &[0xf0, 0],
            &[true, false],
            &[0x20, 0x80],
            &[0, 0],
            &[0, 255],
        )
        .unwrap();
        let mut key = [0u8; 2];
        constraints.apply_offsets(&[0xf0, 0x90], &mut key);
        assert_eq!(key, [0x10, 0x10]);
        assert_eq!(constraints.raw_values(&key), vec![0xf0, 0x90]);
        assert!(constraints.contains(&key));
    }

    #[test]
    fn test_full_range_space() {
        let constraints = KeyConstraints::all_free(6).unwrap();
        assert_eq!(constraints.key_space_size().unwrap(), 1u128 << 48);
    }

    #[test]
    fn test_contains() {
        let constraints = sample_constraints();
        let key = hex::decode("6230302141364a785e4073").unwrap();
        assert!(constraints.contains(&key));
        assert_eq!(constraints.raw_values(&key)[4..], [12, 13, 10, 5, 1, 1, 8]);
        assert!(!constraints.contains(&key[..10]));
    }
}
