//! Data-entry quality of a sheet's STATUS column.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{CanonicalStatus, DataQuality, QualityIssue};
use crate::stats::{mean, round_to, std_dev};
use crate::status::{StatusNormalizer, STATUS_TABLE_VERSION};

const FILL_WEIGHT: f64 = 0.4;
const STANDARDIZATION_WEIGHT: f64 = 0.3;
const CONSISTENCY_WEIGHT: f64 = 0.3;
const LOW_CONSISTENCY: f64 = 0.5;

/// `1 - min(1, σ/μ)` over per-day record counts; 0 without dated records.
pub fn daily_consistency(daily_counts: &BTreeMap<NaiveDate, usize>) -> f64 {
    let counts: Vec<f64> = daily_counts.values().map(|c| *c as f64).collect();
    match (mean(&counts), std_dev(&counts)) {
        (Some(mu), Some(sigma)) if mu > 0.0 => 1.0 - (sigma / mu).min(1.0),
        _ => 0.0,
    }
}

pub fn assess_quality(
    total: usize,
    blank_statuses: usize,
    normalizer: &StatusNormalizer,
    daily_counts: &BTreeMap<NaiveDate, usize>,
) -> DataQuality {
    let fill_rate = if total == 0 {
        0.0
    } else {
        (total - blank_statuses.min(total)) as f64 / total as f64
    };
    let standardization_rate = normalizer.standardization_rate();
    let consistency = daily_consistency(daily_counts);
    let score = (FILL_WEIGHT * fill_rate
        + STANDARDIZATION_WEIGHT * standardization_rate
        + CONSISTENCY_WEIGHT * consistency)
        * 100.0;

    let non_standard_values = normalizer.non_standard_values();
    let mut issues = Vec::new();

    if blank_statuses > 0 {
        issues.push(QualityIssue {
            problem: format!("{blank_statuses} records with a blank STATUS"),
            suggestion: "Fill in the STATUS of every record".into(),
        });
    }
    if !non_standard_values.is_empty() {
        let standard: Vec<&str> = CanonicalStatus::ALL.iter().map(|s| s.label()).collect();
        issues.push(QualityIssue {
            problem: format!(
                "{} non-standard values: {}",
                non_standard_values.len(),
                non_standard_values.join(", ")
            ),
            suggestion: format!("Standardize STATUS values to: {}", standard.join(", ")),
        });
    }
    if daily_counts.is_empty() {
        issues.push(QualityIssue {
            problem: "No valid dates for temporal analysis".into(),
            suggestion: "Record a valid date on every entry".into(),
        });
    } else if consistency < LOW_CONSISTENCY {
        issues.push(QualityIssue {
            problem: "Low consistency in daily updates".into(),
            suggestion: "Keep a steady rhythm of daily updates".into(),
        });
    }

    DataQuality {
        fill_rate: round_to(fill_rate, 3),
        standardization_rate: round_to(standardization_rate, 3),
        daily_consistency: round_to(consistency, 3),
        score: round_to(score, 1),
        distinct_statuses: normalizer.distinct_count(),
        non_standard_values,
        status_table_version: STATUS_TABLE_VERSION,
        issues,
    }
}
