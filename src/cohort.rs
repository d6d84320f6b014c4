//! Rankings and cohort-wide statistics over a set of per-person records.
//!
//! The caller owns the record set; summaries are recomputed from it on every
//! call and nothing is cached here.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::models::{
    Bottleneck, BottleneckKind, CohortSummary, MetricSummary, MetricsRecord, RankEntry,
};
use crate::stats::{mean, median, quantile, round_to, IqrFence};

pub fn summarize_cohort(
    records: &BTreeMap<String, MetricsRecord>,
    config: &EngineConfig,
) -> CohortSummary {
    let efficiency = collect(records, |record| Some(record.efficiency));
    let resolution = collect(records, MetricsRecord::mean_resolution_days);
    let volume = collect(records, |record| Some(record.total_records as f64));

    let mut status_totals: BTreeMap<String, usize> = BTreeMap::new();
    for record in records.values() {
        for (label, share) in &record.status_distribution {
            *status_totals.entry(label.clone()).or_insert(0) += share.count;
        }
    }

    CohortSummary {
        people: records.len(),
        total_records: records.values().map(|r| r.total_records).sum(),
        status_totals,
        efficiency_ranking: rank(&efficiency, Order::Descending),
        resolution_ranking: rank(&resolution, Order::Ascending),
        volume_ranking: rank(&volume, Order::Descending),
        efficiency: summarize_metric(&efficiency, config.iqr_multiplier),
        resolution_time: summarize_metric(&resolution, config.iqr_multiplier),
        volume: summarize_metric(&volume, config.iqr_multiplier),
        bottlenecks: find_bottlenecks(records, &efficiency, &resolution, &volume, config),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Ascending,
    Descending,
}

fn collect<F>(records: &BTreeMap<String, MetricsRecord>, metric: F) -> Vec<(String, f64)>
where
    F: Fn(&MetricsRecord) -> Option<f64>,
{
    records
        .iter()
        .filter_map(|(name, record)| metric(record).map(|value| (name.clone(), value)))
        .collect()
}

/// Stable sort, so equal values keep the lexical order of the names.
fn rank(values: &[(String, f64)], order: Order) -> Vec<RankEntry> {
    let mut ranked: Vec<RankEntry> = values
        .iter()
        .map(|(name, value)| RankEntry {
            name: name.clone(),
            value: *value,
        })
        .collect();
    ranked.sort_by(|a, b| match order {
        Order::Ascending => a.value.total_cmp(&b.value),
        Order::Descending => b.value.total_cmp(&a.value),
    });
    ranked
}

fn summarize_metric(values: &[(String, f64)], iqr_multiplier: f64) -> Option<MetricSummary> {
    let numbers: Vec<f64> = values.iter().map(|(_, value)| *value).collect();
    let fence = IqrFence::new(&numbers, iqr_multiplier)?;
    let outliers = values
        .iter()
        .filter(|(_, value)| fence.is_outlier(*value))
        .map(|(name, _)| name.clone())
        .collect();

    Some(MetricSummary {
        mean: round_to(mean(&numbers)?, 3),
        median: round_to(median(&numbers)?, 3),
        min: numbers.iter().copied().fold(f64::INFINITY, f64::min),
        max: numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        q1: round_to(fence.q1, 3),
        q3: round_to(fence.q3, 3),
        outliers,
    })
}

fn find_bottlenecks(
    records: &BTreeMap<String, MetricsRecord>,
    efficiency: &[(String, f64)],
    resolution: &[(String, f64)],
    volume: &[(String, f64)],
    config: &EngineConfig,
) -> Vec<Bottleneck> {
    let mut bottlenecks = Vec::new();
    let numbers = |values: &[(String, f64)]| values.iter().map(|(_, v)| *v).collect::<Vec<_>>();

    if let Some(threshold) = quantile(&numbers(resolution), 0.75) {
        push_beyond(&mut bottlenecks, BottleneckKind::SlowResolution, resolution, threshold, |v, t| v > t);
    }
    if let Some(threshold) = quantile(&numbers(efficiency), 0.25) {
        push_beyond(&mut bottlenecks, BottleneckKind::LowEfficiency, efficiency, threshold, |v, t| v < t);
    }
    if let Some(threshold) = quantile(&numbers(volume), 0.75) {
        push_beyond(&mut bottlenecks, BottleneckKind::HighVolume, volume, threshold, |v, t| v > t);
    }
    for (name, record) in records {
        let share = record.pending_share();
        if share > config.high_pending_share {
            bottlenecks.push(Bottleneck {
                kind: BottleneckKind::HighPending,
                name: name.clone(),
                value: round_to(share, 3),
                threshold: config.high_pending_share,
            });
        }
    }
    bottlenecks
}

fn push_beyond(
    bottlenecks: &mut Vec<Bottleneck>,
    kind: BottleneckKind,
    values: &[(String, f64)],
    threshold: f64,
    beyond: fn(f64, f64) -> bool,
) {
    for (name, value) in values {
        if beyond(*value, threshold) {
            bottlenecks.push(Bottleneck {
                kind,
                name: name.clone(),
                value: *value,
                threshold: round_to(threshold, 3),
            });
        }
    }
}
