//! Status label canonicalization.

use std::collections::BTreeSet;

use crate::columns::normalize_header;
use crate::models::{CanonicalStatus, StatusCode};

/// Bumped whenever a keyword is added, removed or reordered.
pub const STATUS_TABLE_VERSION: u32 = 2;

/// Searched in order as substrings of the normalized label; first hit wins.
const STATUS_KEYWORDS: &[(&str, CanonicalStatus)] = &[
    ("ABANDON", CanonicalStatus::Cancelled),
    ("CONCLU", CanonicalStatus::Completed),
    ("FINAL", CanonicalStatus::Completed),
    ("FECHAD", CanonicalStatus::Completed),
    ("RESOLV", CanonicalStatus::Completed),
    ("QUITAD", CanonicalStatus::Completed),
    ("CLOSED", CanonicalStatus::Completed),
    ("COMPLET", CanonicalStatus::Completed),
    ("DONE", CanonicalStatus::Completed),
    ("PENDEN", CanonicalStatus::Pending),
    ("PENDING", CanonicalStatus::Pending),
    ("ABERTO", CanonicalStatus::Pending),
    ("OPEN", CanonicalStatus::Pending),
    ("EM ANDAMENTO", CanonicalStatus::InProgress),
    ("EM ANÁLISE", CanonicalStatus::InProgress),
    ("EM ANALISE", CanonicalStatus::InProgress),
    ("IN PROGRESS", CanonicalStatus::InProgress),
    ("IN_PROGRESS", CanonicalStatus::InProgress),
    ("CANCEL", CanonicalStatus::Cancelled),
    ("SUSPENS", CanonicalStatus::Cancelled),
];

pub fn classify(label: &str) -> Option<CanonicalStatus> {
    let normalized = normalize_header(label);
    STATUS_KEYWORDS
        .iter()
        .find(|(keyword, _)| normalized.contains(keyword))
        .map(|(_, status)| *status)
}

/// Canonicalizes labels for one sheet and remembers what it could not map.
#[derive(Debug, Default)]
pub struct StatusNormalizer {
    distinct: BTreeSet<String>,
    non_standard: BTreeSet<String>,
}

impl StatusNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, raw: &str) -> StatusCode {
        let normalized = normalize_header(raw);
        if normalized.is_empty() {
            return StatusCode::Blank;
        }
        self.distinct.insert(normalized.clone());
        match classify(&normalized) {
            Some(status) => StatusCode::Canonical(status),
            None => {
                self.non_standard.insert(normalized.clone());
                StatusCode::Unmapped(normalized)
            }
        }
    }

    pub fn distinct_count(&self) -> usize {
        self.distinct.len()
    }

    pub fn non_standard_values(&self) -> Vec<String> {
        self.non_standard.iter().cloned().collect()
    }

    /// Share of distinct labels that mapped onto the taxonomy, in `[0, 1]`.
    pub fn standardization_rate(&self) -> f64 {
        let distinct = self.distinct.len();
        if distinct == 0 {
            return 0.0;
        }
        let standard = distinct.saturating_sub(self.non_standard.len());
        (standard as f64 / distinct as f64).clamp(0.0, 1.0)
    }
}
