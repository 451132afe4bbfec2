//! Cheap content fingerprint of an embedding set.
//!
//! `"{count}:{sum}"` where `sum` is the sum of every vector's first
//! component (ids in sorted order), printed to four decimals. Collisions are
//! possible and accepted.

use crate::similarity::EmbeddingMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(embeddings: &EmbeddingMap) -> Self {
        // BTreeMap iterates in sorted id order.
        let sum: f64 = embeddings
            .values()
            .filter_map(|v| v.first())
            .map(|x| f64::from(*x))
            .sum();
        // Avoid printing "-0.0000" for a sum that rounds to zero.
        let sum = if sum.abs() < 0.00005 { 0.0 } else { sum };
        Fingerprint(format!("{}:{:.4}", embeddings.len(), sum))
    }

    /// Number of embeddings the fingerprint was taken over.
    pub fn count(&self) -> usize {
        self.0
            .split_once(':')
            .and_then(|(count, _)| count.parse().ok())
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
