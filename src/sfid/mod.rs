//! Record identifier tooling
//!
//! A 15-character record id is a 7-character prefix (object key prefix,
//! instance and reserved characters) followed by an 8-digit base62 record
//! counter. The 18-character form appends a 3-character case checksum.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::SfidError;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const CHECKSUM_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ012345";
const COUNTER_DIGITS: usize = 8;
const PREFIX_LEN: usize = 7;

/// Largest counter that fits in 8 base62 digits
pub const MAX_COUNTER: u64 = 62u64.pow(COUNTER_DIGITS as u32) - 1;

/// Strip the checksum from an 18-character id and validate the 15-character core
pub fn normalize_to_15(id: &str) -> Result<&str, SfidError> {
    let id = id.trim();
    let core = match id.len() {
        15 => id,
        18 => id.get(..15).ok_or(SfidError::NotAlphanumeric)?,
        len => return Err(SfidError::BadLength(len)),
    };
    if !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(SfidError::NotAlphanumeric);
    }
    Ok(core)
}

/// Checksum suffix for a validated 15-character id
///
/// Each 5-character segment is read right to left, uppercase letters as 1
/// bits, and the 5-bit value indexes the checksum alphabet.
pub fn checksum(id15: &str) -> String {
    id15.as_bytes()
        .chunks(5)
        .map(|segment| {
            let bits = segment
                .iter()
                .rev()
                .fold(0usize, |acc, b| (acc << 1) | usize::from(b.is_ascii_uppercase()));
            CHECKSUM_ALPHABET[bits] as char
        })
        .collect()
}

pub fn decode_base62(digits: &str) -> Result<u64, SfidError> {
    digits.chars().try_fold(0u64, |acc, c| {
        let digit = ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or(SfidError::InvalidBase62(c))?;
        acc.checked_mul(62)
            .and_then(|v| v.checked_add(digit as u64))
            .ok_or(SfidError::ValueOutOfRange(acc))
    })
}

/// Base62 digits of `value`, left-padded with `0` to `min_len`
pub fn encode_base62(mut value: u64, min_len: usize) -> String {
    let mut digits = Vec::with_capacity(min_len.max(COUNTER_DIGITS));
    while value > 0 {
        digits.push(ALPHABET[(value % 62) as usize]);
        value /= 62;
    }
    while digits.len() < min_len.max(1) {
        digits.push(b'0');
    }
    digits.iter().rev().map(|&b| b as char).collect()
}

/// A decoded record id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RecordId {
    prefix: String,
    counter: u64,
}

impl RecordId {
    pub fn parse(id: &str) -> Result<Self, SfidError> {
        let core = normalize_to_15(id)?;
        let (prefix, counter) = core.split_at(PREFIX_LEN);
        Ok(Self {
            prefix: prefix.to_string(),
            counter: decode_base62(counter)?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key prefix identifying the object type
    pub fn key_prefix(&self) -> &str {
        &self.prefix[..3]
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Same prefix with a different counter
    pub fn with_counter(&self, counter: u64) -> Result<Self, SfidError> {
        if counter > MAX_COUNTER {
            return Err(SfidError::ValueOutOfRange(counter));
        }
        Ok(Self {
            prefix: self.prefix.clone(),
            counter,
        })
    }

    pub fn to_id15(&self) -> String {
        format!("{}{}", self.prefix, encode_base62(self.counter, COUNTER_DIGITS))
    }

    pub fn to_id18(&self) -> String {
        let id15 = self.to_id15();
        let suffix = checksum(&id15);
        id15 + &suffix
    }

    /// Walk `count.abs()` ids from `start`, upward for positive counts
    ///
    /// The walk stops early at either end of the counter range.
    pub fn enumerate(&self, start: u64, count: i64) -> Result<Enumeration, SfidError> {
        if start > MAX_COUNTER {
            return Err(SfidError::ValueOutOfRange(start));
        }
        Ok(Enumeration {
            prefix: self.prefix.clone(),
            next: Some(start),
            remaining: count.unsigned_abs(),
            upward: count >= 0,
        })
    }

    /// Walk from this id's own counter
    pub fn enumerate_from_current(&self, count: i64) -> Enumeration {
        Enumeration {
            prefix: self.prefix.clone(),
            next: Some(self.counter),
            remaining: count.unsigned_abs(),
            upward: count >= 0,
        }
    }
}

impl FromStr for RecordId {
    type Err = SfidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_id15())
    }
}

/// Sequence of record ids sharing one prefix
#[derive(Debug, Clone)]
pub struct Enumeration {
    prefix: String,
    next: Option<u64>,
    remaining: u64,
    upward: bool,
}

impl Iterator for Enumeration {
    type Item = RecordId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let counter = self.next.filter(|&c| c <= MAX_COUNTER)?;
        self.remaining -= 1;
        self.next = if self.upward {
            counter.checked_add(1)
        } else {
            counter.checked_sub(1)
        };
        Some(RecordId {
            prefix: self.prefix.clone(),
            counter,
        })
    }
}
