//! Per-sheet metrics: volume, status mix, resolution time, efficiency,
//! daily/weekly load and trend.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use crate::columns::{resolve_columns, ColumnMap};
use crate::config::EngineConfig;
use crate::dates::normalize_date;
use crate::error::{EngineError, Result};
use crate::models::{
    CanonicalRow, CellValue, ColumnRole, MetricsRecord, ResolutionStats, Sheet, StatusCode,
    StatusShare, Trend, TrendDirection, TrendGranularity, WeekdayLoad,
};
use crate::quality::assess_quality;
use crate::stats::{count_outliers, linear_fit, mean, median, pearson, round_to};
use crate::status::StatusNormalizer;

/// Rows after normalization plus what normalization observed on the way.
#[derive(Debug)]
pub struct CanonicalSheet {
    pub rows: Vec<CanonicalRow>,
    pub unconvertible_dates: usize,
    pub normalizer: StatusNormalizer,
}

/// Resolver, date normalizer, status normalizer and calculator in one pass.
pub fn analyze_sheet(sheet: &Sheet, config: &EngineConfig) -> Result<MetricsRecord> {
    if sheet.row_count() == 0 {
        return Err(EngineError::EmptySheet {
            sheet: sheet.name.clone(),
        });
    }
    let columns = resolve_columns(sheet);
    debug!(
        sheet = %sheet.name,
        date = ?columns.header(ColumnRole::Date),
        status = ?columns.header(ColumnRole::Status),
        unresolved = ?columns.unresolved(),
        "columns resolved"
    );
    let canonical = canonicalize(sheet, &columns);
    if canonical.unconvertible_dates > 0 {
        debug!(
            sheet = %sheet.name,
            unconvertible = canonical.unconvertible_dates,
            "rows without a usable date"
        );
    }
    calculate_metrics(&sheet.name, &canonical, &columns, config)
}

pub fn canonicalize(sheet: &Sheet, columns: &ColumnMap) -> CanonicalSheet {
    let mut normalizer = StatusNormalizer::new();
    let mut unconvertible_dates = 0;
    let date_index = columns.index(ColumnRole::Date);
    let resolution_index = columns.index(ColumnRole::ResolutionDate);
    let status_index = columns.index(ColumnRole::Status);

    let rows = sheet
        .records()
        .map(|record| {
            let created = date_index.and_then(|index| match normalize_date(record.get(index)) {
                Ok(datetime) => Some(datetime),
                Err(_) => {
                    unconvertible_dates += 1;
                    None
                }
            });
            let resolved = resolution_index.and_then(|index| normalize_date(record.get(index)).ok());
            let status = match status_index {
                Some(index) => normalizer.normalize(&record.get(index).to_text()),
                None => StatusCode::Blank,
            };
            let text_of = |role: ColumnRole| {
                columns
                    .index(role)
                    .map(|index| record.get(index))
                    .filter(|cell| !cell.is_empty())
                    .map(CellValue::to_text)
            };
            CanonicalRow {
                created,
                resolved,
                status,
                responsible: text_of(ColumnRole::Responsible),
                id: text_of(ColumnRole::Id),
                description: text_of(ColumnRole::Description),
            }
        })
        .collect();

    CanonicalSheet {
        rows,
        unconvertible_dates,
        normalizer,
    }
}

pub fn calculate_metrics(
    person: &str,
    canonical: &CanonicalSheet,
    columns: &ColumnMap,
    config: &EngineConfig,
) -> Result<MetricsRecord> {
    let missing: Vec<ColumnRole> = [ColumnRole::Date, ColumnRole::Status]
        .into_iter()
        .filter(|role| columns.get(*role).is_none())
        .collect();
    if !missing.is_empty() {
        warn!(sheet = %person, ?missing, "required columns not found");
        return Err(EngineError::MissingColumns { roles: missing });
    }

    let rows = &canonical.rows;
    let total = rows.len();
    let dates: Vec<NaiveDate> = rows
        .iter()
        .filter_map(|row| row.created.map(|created| created.date()))
        .collect();
    let daily_counts = daily_counts(&dates);
    let blank_statuses = rows
        .iter()
        .filter(|row| row.status == StatusCode::Blank)
        .count();

    let resolution = columns
        .get(ColumnRole::ResolutionDate)
        .map(|_| resolution_stats(rows, config));

    Ok(MetricsRecord {
        person: person.to_string(),
        total_records: total,
        dated_records: dates.len(),
        unconvertible_dates: canonical.unconvertible_dates,
        status_distribution: status_distribution(rows),
        resolution,
        efficiency: efficiency(rows, config),
        weekly_pattern: weekly_pattern(&daily_counts),
        daily_status_means: daily_status_means(rows),
        trend: estimate_trend(&daily_counts, config),
        quality: assess_quality(total, blank_statuses, &canonical.normalizer, &daily_counts),
        daily_counts,
    })
}

fn daily_counts(dates: &[NaiveDate]) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for date in dates {
        *counts.entry(*date).or_insert(0) += 1;
    }
    counts
}

/// Counts per status label; each percentage is `count / total * 100` to one decimal.
pub fn status_distribution(rows: &[CanonicalRow]) -> BTreeMap<String, StatusShare> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.status.label().to_string()).or_insert(0) += 1;
    }
    let total = rows.len();
    counts
        .into_iter()
        .map(|(label, count)| {
            let percent = round_to(count as f64 / total as f64 * 100.0, 1);
            (label, StatusShare { count, percent })
        })
        .collect()
}

/// Whole days between creation and resolution, bounded to `0..=max_resolution_days`.
pub fn resolution_stats(rows: &[CanonicalRow], config: &EngineConfig) -> ResolutionStats {
    let mut discarded = 0;
    let mut durations = Vec::new();
    for row in rows {
        let (Some(created), Some(resolved)) = (row.created, row.resolved) else {
            continue;
        };
        let days = (resolved - created).num_seconds().div_euclid(86_400);
        if (0..=config.max_resolution_days).contains(&days) {
            durations.push(days as f64);
        } else {
            discarded += 1;
        }
    }

    ResolutionStats {
        samples: durations.len(),
        discarded,
        mean: mean(&durations).map(|m| round_to(m, 1)).unwrap_or(0.0),
        median: median(&durations).map(|m| round_to(m, 1)).unwrap_or(0.0),
        outliers: count_outliers(&durations, config.iqr_multiplier),
    }
}

/// Share of rows whose status is not pending-like, rounded to 3 decimals.
pub fn efficiency(rows: &[CanonicalRow], config: &EngineConfig) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let resolved = rows
        .iter()
        .filter(|row| !config.is_pending(row.status.label()))
        .count();
    round_to(resolved as f64 / rows.len() as f64, 3)
}

/// Load per weekday, Monday first; the mean only counts days with activity.
pub fn weekly_pattern(daily_counts: &BTreeMap<NaiveDate, usize>) -> Vec<WeekdayLoad> {
    let mut by_weekday: BTreeMap<u32, WeekdayLoad> = BTreeMap::new();
    for (date, count) in daily_counts {
        let load = by_weekday
            .entry(date.weekday().num_days_from_monday())
            .or_insert_with(|| WeekdayLoad {
                weekday: date.format("%A").to_string(),
                records: 0,
                active_days: 0,
                mean_per_day: 0.0,
            });
        load.records += count;
        load.active_days += 1;
    }
    by_weekday
        .into_values()
        .map(|mut load| {
            load.mean_per_day = round_to(load.records as f64 / load.active_days as f64, 2);
            load
        })
        .collect()
}

/// Per status, the mean number of records on the days that status shows up.
pub fn daily_status_means(rows: &[CanonicalRow]) -> BTreeMap<String, f64> {
    let mut per_day: BTreeMap<(&str, NaiveDate), usize> = BTreeMap::new();
    for row in rows {
        if let Some(created) = row.created {
            *per_day.entry((row.status.label(), created.date())).or_insert(0) += 1;
        }
    }
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for ((label, _), count) in per_day {
        grouped.entry(label).or_default().push(count as f64);
    }
    grouped
        .into_iter()
        .filter_map(|(label, counts)| mean(&counts).map(|m| (label.to_string(), round_to(m, 1))))
        .collect()
}

/// Linear trend over monthly counts, or daily counts when too few months exist.
pub fn estimate_trend(daily_counts: &BTreeMap<NaiveDate, usize>, config: &EngineConfig) -> Trend {
    let mut monthly: BTreeMap<i64, usize> = BTreeMap::new();
    for (date, count) in daily_counts {
        let month_index = date.year() as i64 * 12 + date.month0() as i64;
        *monthly.entry(month_index).or_insert(0) += count;
    }

    let (granularity, points) = if monthly.len() >= config.trend_min_points {
        (TrendGranularity::Monthly, offsets(&monthly))
    } else {
        let by_day: BTreeMap<i64, usize> = daily_counts
            .iter()
            .map(|(date, count)| (date.num_days_from_ce() as i64, *count))
            .collect();
        (TrendGranularity::Daily, offsets(&by_day))
    };

    let n = points.len();
    if n < 2 {
        return Trend::stable(n, granularity);
    }
    let xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    let ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
    let raw_correlation = pearson(&xs, &ys);
    let correlation = round_to(raw_correlation, 2);

    if n < config.trend_min_points.max(2) {
        return Trend {
            correlation,
            ..Trend::stable(n, granularity)
        };
    }

    let direction = if raw_correlation > config.trend_correlation_threshold {
        TrendDirection::Increasing
    } else if raw_correlation < -config.trend_correlation_threshold {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    let (slope, intercept, r_squared) = match linear_fit(&xs, &ys) {
        Some(fit) => (
            round_to(fit.slope, 4),
            round_to(fit.intercept, 2),
            round_to(fit.r_squared, 2),
        ),
        None => (0.0, 0.0, 0.0),
    };

    Trend {
        direction,
        correlation,
        slope,
        intercept,
        r_squared,
        points: n,
        granularity,
    }
}

/// Period index relative to the first period, paired with its count.
fn offsets(periods: &BTreeMap<i64, usize>) -> Vec<(f64, f64)> {
    let Some(first) = periods.keys().next().copied() else {
        return Vec::new();
    };
    periods
        .iter()
        .map(|(period, count)| ((period - first) as f64, *count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalStatus;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    fn sheet(headers: &[&str], rows: Vec<Vec<CellValue>>) -> Sheet {
        Sheet::with_text_headers("Avery", headers, rows)
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn two_row_scenario() {
        let sheet = sheet(
            &["DATA", "STATUS"],
            vec![
                vec![text("01/01/2024"), text("PENDENTE")],
                vec![text("05/01/2024"), text("CONCLUIDO")],
            ],
        );
        let record = analyze_sheet(&sheet, &EngineConfig::default()).expect("metrics");
        assert_eq!(record.total_records, 2);
        assert_eq!(record.status_count("PENDING"), 1);
        assert_eq!(record.status_count("COMPLETED"), 1);
        assert_eq!(record.status_distribution.len(), 2);
        assert_eq!(record.efficiency, 0.5);
        assert!(record.resolution.is_none());
    }

    #[test]
    fn missing_status_column_is_reported() {
        let sheet = sheet(
            &["DATA", "NOTES"],
            vec![vec![text("01/01/2024"), text("called client")]],
        );
        let err = analyze_sheet(&sheet, &EngineConfig::default()).expect_err("missing status");
        match err {
            EngineError::MissingColumns { roles } => assert_eq!(roles, vec![ColumnRole::Status]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_sheet_is_reported() {
        let sheet = sheet(&["DATA", "STATUS"], vec![]);
        assert!(matches!(
            analyze_sheet(&sheet, &EngineConfig::default()),
            Err(EngineError::EmptySheet { .. })
        ));
    }

    #[test]
    fn unconvertible_dates_still_count_toward_volume() {
        let sheet = sheet(
            &["DATA", "STATUS"],
            vec![
                vec![text("01/01/2024"), text("PENDENTE")],
                vec![text("sem data"), text("CONCLUIDO")],
                vec![CellValue::Empty, text("CONCLUIDO")],
            ],
        );
        let record = analyze_sheet(&sheet, &EngineConfig::default()).expect("metrics");
        assert_eq!(record.total_records, 3);
        assert_eq!(record.dated_records, 1);
        assert_eq!(record.unconvertible_dates, 2);
        assert_eq!(record.daily_counts.values().sum::<usize>(), 1);
        assert_eq!(record.status_count("COMPLETED"), 2);
    }

    #[test]
    fn resolution_for_identical_durations() {
        let rows = (0..10)
            .map(|_| vec![text("10/01/2024"), text("12/01/2024"), text("CONCLUIDO")])
            .collect();
        let sheet = sheet(&["DATA", "RESOLUCAO", "STATUS"], rows);
        let record = analyze_sheet(&sheet, &EngineConfig::default()).expect("metrics");
        let resolution = record.resolution.expect("resolution stats");
        assert_eq!(resolution.samples, 10);
        assert_eq!(resolution.mean, 2.0);
        assert_eq!(resolution.median, 2.0);
        assert_eq!(resolution.outliers, 0);
        assert_eq!(record.trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn resolution_discards_negative_and_excessive_durations() {
        let sheet = sheet(
            &["DATA", "RESOLUCAO", "STATUS"],
            vec![
                vec![text("10/01/2024"), text("09/01/2024"), text("CONCLUIDO")],
                vec![text("10/01/2023"), text("10/02/2024"), text("CONCLUIDO")],
                vec![text("10/01/2024"), text("13/01/2024"), text("CONCLUIDO")],
                vec![text("10/01/2024"), CellValue::Empty, text("PENDENTE")],
            ],
        );
        let record = analyze_sheet(&sheet, &EngineConfig::default()).expect("metrics");
        let resolution = record.resolution.expect("resolution stats");
        assert_eq!(resolution.samples, 1);
        assert_eq!(resolution.discarded, 2);
        assert_eq!(resolution.mean, 3.0);
    }

    #[test]
    fn resolution_outliers_ignore_row_order() {
        let durations = [1, 2, 2, 3, 3, 3, 4, 30];
        let build = |order: Vec<usize>| {
            order
                .into_iter()
                .map(|i| {
                    let created = date(2024, 1, 1).and_hms_opt(0, 0, 0).expect("time");
                    CanonicalRow {
                        created: Some(created),
                        resolved: Some(created + chrono::Duration::days(durations[i])),
                        status: StatusCode::Canonical(CanonicalStatus::Completed),
                        responsible: None,
                        id: None,
                        description: None,
                    }
                })
                .collect::<Vec<_>>()
        };
        let config = EngineConfig::default();
        let forward = resolution_stats(&build((0..8).collect()), &config);
        let backward = resolution_stats(&build((0..8).rev().collect()), &config);
        assert_eq!(forward.outliers, 1);
        assert_eq!(forward, backward);
    }

    #[test]
    fn distribution_percentages_are_plain_rounded_shares() {
        let labels = ["PENDENTE", "CONCLUIDO", "CANCELADO", "VERIFICADO", "APROVADO", "QUITADO", "EM ANDAMENTO"];
        let rows: Vec<Vec<CellValue>> = labels
            .iter()
            .map(|label| vec![text("01/01/2024"), text(label)])
            .collect();
        let record =
            analyze_sheet(&sheet(&["DATA", "STATUS"], rows), &EngineConfig::default()).expect("metrics");
        let sum: f64 = record.status_distribution.values().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() <= 0.1 + 1e-9, "sum was {sum}");
        for share in record.status_distribution.values() {
            assert_eq!(share.percent, round_to(share.count as f64 / 7.0 * 100.0, 1));
        }
    }

    #[test]
    fn three_way_split_keeps_each_share_at_one_third() {
        let rows = ["PENDENTE", "CONCLUIDO", "CANCELADO"]
            .iter()
            .map(|label| vec![text("01/01/2024"), text(label)])
            .collect();
        let record =
            analyze_sheet(&sheet(&["DATA", "STATUS"], rows), &EngineConfig::default()).expect("metrics");
        for label in ["PENDING", "COMPLETED", "CANCELLED"] {
            assert_eq!(record.status_distribution[label].percent, 33.3, "{label}");
        }
    }

    #[test]
    fn pending_like_statuses_lower_efficiency() {
        let sheet = sheet(
            &["DATA", "STATUS"],
            vec![
                vec![text("01/01/2024"), text("PRIORIDADE")],
                vec![text("01/01/2024"), text("ANÁLISE")],
                vec![text("01/01/2024"), text("PENDENTE")],
            ],
        );
        let record = analyze_sheet(&sheet, &EngineConfig::default()).expect("metrics");
        assert_eq!(record.efficiency, 0.0);
    }

    #[test]
    fn weekly_pattern_averages_over_active_days() {
        // 2024-01-01 and 2024-01-08 are Mondays, 2024-01-02 a Tuesday.
        let counts = BTreeMap::from([
            (date(2024, 1, 1), 4),
            (date(2024, 1, 8), 2),
            (date(2024, 1, 2), 1),
        ]);
        let pattern = weekly_pattern(&counts);
        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern[0].weekday, "Monday");
        assert_eq!(pattern[0].records, 6);
        assert_eq!(pattern[0].active_days, 2);
        assert_eq!(pattern[0].mean_per_day, 3.0);
        assert_eq!(pattern[1].weekday, "Tuesday");
    }

    #[test]
    fn daily_status_means_per_label() {
        let created = |d: u32| date(2024, 1, d).and_hms_opt(8, 0, 0);
        let row = |d: u32, status: CanonicalStatus| CanonicalRow {
            created: created(d),
            resolved: None,
            status: StatusCode::Canonical(status),
            responsible: None,
            id: None,
            description: None,
        };
        let rows = vec![
            row(1, CanonicalStatus::Pending),
            row(1, CanonicalStatus::Pending),
            row(2, CanonicalStatus::Pending),
            row(2, CanonicalStatus::Completed),
        ];
        let means = daily_status_means(&rows);
        assert_eq!(means.get("PENDING"), Some(&1.5));
        assert_eq!(means.get("COMPLETED"), Some(&1.0));
    }

    #[test]
    fn increasing_monthly_trend() {
        let mut counts = BTreeMap::new();
        for (month, n) in [(1, 1), (2, 3), (3, 5), (4, 7)] {
            counts.insert(date(2024, month, 10), n);
        }
        let trend = estimate_trend(&counts, &EngineConfig::default());
        assert_eq!(trend.granularity, TrendGranularity::Monthly);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.correlation, 1.0);
        assert_eq!(trend.slope, 2.0);
        assert_eq!(trend.intercept, 1.0);
        assert_eq!(trend.r_squared, 1.0);
    }

    #[test]
    fn decreasing_daily_trend_when_few_months() {
        let counts = BTreeMap::from([
            (date(2024, 1, 1), 9),
            (date(2024, 1, 2), 6),
            (date(2024, 1, 3), 3),
        ]);
        let trend = estimate_trend(&counts, &EngineConfig::default());
        assert_eq!(trend.granularity, TrendGranularity::Daily);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert_eq!(trend.slope, -3.0);
    }

    #[test]
    fn flat_series_is_stable_with_regression_stats() {
        let counts = BTreeMap::from([
            (date(2024, 1, 1), 2),
            (date(2024, 2, 1), 2),
            (date(2024, 3, 1), 2),
        ]);
        let trend = estimate_trend(&counts, &EngineConfig::default());
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.correlation, 0.0);
        assert_eq!(trend.intercept, 2.0);
        assert_eq!(trend.points, 3);
    }

    #[test]
    fn too_few_points_default_to_stable() {
        let one = BTreeMap::from([(date(2024, 1, 1), 5)]);
        assert_eq!(
            estimate_trend(&one, &EngineConfig::default()),
            Trend::stable(1, TrendGranularity::Daily)
        );

        let two = BTreeMap::from([(date(2024, 1, 1), 1), (date(2024, 1, 2), 4)]);
        let trend = estimate_trend(&two, &EngineConfig::default());
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.correlation, 1.0);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.r_squared, 0.0);
    }

    #[test]
    fn uncorrelated_series_is_stable() {
        let counts: BTreeMap<NaiveDate, usize> = [1, 3, 3, 1]
            .into_iter()
            .enumerate()
            .map(|(i, n)| (date(2024, 1, 1 + i as u32), n))
            .collect();
        let trend = estimate_trend(&counts, &EngineConfig::default());
        assert_eq!(trend.correlation, 0.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.r_squared, 0.0);
        assert_eq!(trend.intercept, 2.0);
    }

    #[test]
    fn direction_uses_unrounded_correlation() {
        // correlation is about 0.1001
        let counts: BTreeMap<NaiveDate, usize> = [1, 1, 2, 5, 1, 1]
            .into_iter()
            .enumerate()
            .map(|(i, n)| (date(2024, 1, 1 + i as u32), n))
            .collect();
        let trend = estimate_trend(&counts, &EngineConfig::default());
        assert_eq!(trend.correlation, 0.1);
        assert_eq!(trend.direction, TrendDirection::Increasing);
    }
}
