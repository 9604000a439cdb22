//! Logical stream ids.
//!
//! Format: base62(seconds_since_2025) + base62(random_6bytes)
//! Length: ~14 characters (6 for time + 8 for random)

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const EPOCH_2025: u64 = 1735689600;

const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Stable identifier of a logical stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Generates a new roughly time-ordered id.
    pub fn generate() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .saturating_sub(EPOCH_2025) as u32;

        let mut random_bytes = [0u8; 6];
        if getrandom::fill(&mut random_bytes).is_err() {
            // no entropy source: use clock noise
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.subsec_nanos())
                .unwrap_or(0);
            random_bytes[..4].copy_from_slice(&nanos.to_le_bytes());
        }

        Self(format!(
            "{}{}",
            base62_encode(u64::from(secs)),
            base62_encode_bytes(&random_bytes)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn base62_encode(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut result = Vec::new();
    while n > 0 {
        result.push(BASE62_CHARS[(n % 62) as usize] as char);
        n /= 62;
    }
    result.iter().rev().collect()
}

fn base62_encode_bytes(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    let n = data.iter().fold(0u64, |n, &b| n * 256 + u64::from(b));
    base62_encode(n)
}
