//! Qualitative reading of a metrics record: performance levels and
//! recommendations shown in reports.

use serde::Serialize;

use crate::models::MetricsRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
    Slow,
    High,
    Medium,
    Low,
    NotAvailable,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Excellent => "Excellent",
            Level::Good => "Good",
            Level::Fair => "Fair",
            Level::NeedsImprovement => "Needs improvement",
            Level::Slow => "Slow",
            Level::High => "High",
            Level::Medium => "Medium",
            Level::Low => "Low",
            Level::NotAvailable => "Not available",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub area: &'static str,
    pub recommendation: &'static str,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub efficiency: Level,
    pub resolution_time: Level,
    pub volume: Level,
    pub recommendations: Vec<Recommendation>,
}

pub fn efficiency_level(efficiency: f64) -> Level {
    let percent = efficiency * 100.0;
    if percent >= 80.0 {
        Level::Excellent
    } else if percent >= 60.0 {
        Level::Good
    } else if percent >= 40.0 {
        Level::Fair
    } else {
        Level::NeedsImprovement
    }
}

pub fn resolution_level(mean_days: Option<f64>) -> Level {
    match mean_days {
        None => Level::NotAvailable,
        Some(days) if days <= 1.0 => Level::Excellent,
        Some(days) if days <= 3.0 => Level::Good,
        Some(days) if days <= 7.0 => Level::Fair,
        Some(_) => Level::Slow,
    }
}

pub fn volume_level(total: usize) -> Level {
    match total {
        100.. => Level::High,
        50..=99 => Level::Medium,
        _ => Level::Low,
    }
}

pub fn assess(record: &MetricsRecord) -> Assessment {
    let mean_days = record.mean_resolution_days();
    let mut recommendations = Vec::new();

    if record.efficiency * 100.0 < 60.0 {
        recommendations.push(Recommendation {
            area: "Efficiency",
            recommendation: "Raise the share of completed work.",
            action: "Prioritize the oldest pending items and set daily completion targets.",
        });
    }
    if mean_days.is_some_and(|days| days > 5.0) {
        recommendations.push(Recommendation {
            area: "Resolution time",
            recommendation: "Shorten the mean resolution time.",
            action: "Find the bottlenecks in the process and work on time management.",
        });
    }
    if record.pending_share() > 0.3 {
        recommendations.push(Recommendation {
            area: "Backlog",
            recommendation: "Reduce the number of pending items.",
            action: "Reserve time every day for the oldest pending items.",
        });
    }
    if recommendations.is_empty() {
        recommendations.push(Recommendation {
            area: "Overall",
            recommendation: "Keep up the current performance.",
            action: "Share working practices with the team.",
        });
    }

    Assessment {
        efficiency: efficiency_level(record.efficiency),
        resolution_time: resolution_level(mean_days),
        volume: volume_level(record.total_records),
        recommendations,
    }
}
