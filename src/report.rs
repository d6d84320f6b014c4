use std::fmt::Write;

use crate::assessment::assess;
use crate::batch::BatchOutcome;
use crate::models::{
    BottleneckKind, CohortSummary, MetricSummary, MetricsRecord, RankEntry, TrendDirection,
};

const RANKING_LIMIT: usize = 10;

fn trend_label(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Increasing => "increasing",
        TrendDirection::Decreasing => "decreasing",
        TrendDirection::Stable => "stable",
    }
}

fn bottleneck_label(kind: BottleneckKind) -> &'static str {
    match kind {
        BottleneckKind::SlowResolution => "slow resolution",
        BottleneckKind::LowEfficiency => "low efficiency",
        BottleneckKind::HighVolume => "high volume",
        BottleneckKind::HighPending => "high pending share",
    }
}

fn resolution_text(record: &MetricsRecord) -> String {
    match record.mean_resolution_days() {
        Some(days) => format!("{days:.1} days"),
        None => "n/a".to_string(),
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

fn ranking_value(title: &str, entry: &RankEntry) -> String {
    match title {
        "Efficiency" => percent(entry.value),
        "Resolution time" => format!("{:.1} days", entry.value),
        _ => format!("{:.0} records", entry.value),
    }
}

fn rankings(cohort: &CohortSummary) -> [(&'static str, &[RankEntry]); 3] {
    [
        ("Efficiency", cohort.efficiency_ranking.as_slice()),
        ("Resolution time", cohort.resolution_ranking.as_slice()),
        ("Volume", cohort.volume_ranking.as_slice()),
    ]
}

fn summaries(cohort: &CohortSummary) -> [(&'static str, Option<&MetricSummary>); 3] {
    [
        ("Efficiency", cohort.efficiency.as_ref()),
        ("Resolution time", cohort.resolution_time.as_ref()),
        ("Volume", cohort.volume.as_ref()),
    ]
}

/// One line per sheet that produced no record, failures first.
pub fn batch_notes(outcome: &BatchOutcome) -> Vec<String> {
    outcome
        .errors
        .iter()
        .map(|error| format!("failed {}: {}", error.sheet, error.message))
        .chain(outcome.skipped.iter().map(|name| format!("skipped {name}")))
        .collect()
}

pub fn build_report(outcome: &BatchOutcome, cohort: &CohortSummary) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Work Log Metrics Report");
    let _ = writeln!(
        output,
        "Run {}: {} people, {} records",
        outcome.run_id, cohort.people, cohort.total_records
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Status Totals");

    if cohort.status_totals.is_empty() {
        let _ = writeln!(output, "No records analyzed.");
    } else {
        for (label, count) in &cohort.status_totals {
            let _ = writeln!(output, "- {label}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## People");

    if outcome.records.is_empty() {
        let _ = writeln!(output, "No sheets produced metrics.");
    } else {
        let _ = writeln!(
            output,
            "| Person | Records | Efficiency | Mean resolution | Trend | Quality |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for record in outcome.records.values() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {:.1} |",
                record.person,
                record.total_records,
                percent(record.efficiency),
                resolution_text(record),
                trend_label(record.trend.direction),
                record.quality.score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rankings");

    for (title, entries) in rankings(cohort) {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {title}");
        if entries.is_empty() {
            let _ = writeln!(output, "No data.");
            continue;
        }
        for (position, entry) in entries.iter().take(RANKING_LIMIT).enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({})",
                position + 1,
                entry.name,
                ranking_value(title, entry)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outliers");

    let mut any_outlier = false;
    for (title, summary) in summaries(cohort) {
        if let Some(summary) = summary.filter(|s| !s.outliers.is_empty()) {
            any_outlier = true;
            let _ = writeln!(output, "- {}: {}", title, summary.outliers.join(", "));
        }
    }
    if !any_outlier {
        let _ = writeln!(output, "No outliers detected.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Bottlenecks");

    if cohort.bottlenecks.is_empty() {
        let _ = writeln!(output, "No bottlenecks detected.");
    } else {
        for bottleneck in &cohort.bottlenecks {
            let _ = writeln!(
                output,
                "- {} ({}): {:.2} against threshold {:.2}",
                bottleneck.name,
                bottleneck_label(bottleneck.kind),
                bottleneck.value,
                bottleneck.threshold
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");

    for record in outcome.records.values() {
        let assessment = assess(record);
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} (efficiency {}, resolution {}, volume {})",
            record.person,
            assessment.efficiency.label(),
            assessment.resolution_time.label(),
            assessment.volume.label()
        );
        for item in &assessment.recommendations {
            let _ = writeln!(
                output,
                "- {}: {} {}",
                item.area, item.recommendation, item.action
            );
        }
        for issue in &record.quality.issues {
            let _ = writeln!(output, "- Data quality: {} ({})", issue.problem, issue.suggestion);
        }
    }

    if !outcome.errors.is_empty() || !outcome.skipped.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Sheets Not Analyzed");
        for error in &outcome.errors {
            let _ = writeln!(output, "- {}: {}", error.sheet, error.message);
        }
        for name in &outcome.skipped {
            let _ = writeln!(output, "- {name}: skipped");
        }
    }

    output
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn build_html_report(outcome: &BatchOutcome, cohort: &CohortSummary) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(output, "<html><head><meta charset=\"utf-8\">");
    let _ = writeln!(output, "<title>Work Log Metrics Report</title></head><body>");
    let _ = writeln!(output, "<h1>Work Log Metrics Report</h1>");
    let _ = writeln!(
        output,
        "<p>Run {}: {} people, {} records</p>",
        outcome.run_id, cohort.people, cohort.total_records
    );

    let _ = writeln!(output, "<h2>Team Status Totals</h2><ul>");
    for (label, count) in &cohort.status_totals {
        let _ = writeln!(output, "<li>{}: {}</li>", escape_html(label), count);
    }
    let _ = writeln!(output, "</ul>");

    let _ = writeln!(output, "<h2>People</h2>");
    let _ = writeln!(
        output,
        "<table><tr><th>Person</th><th>Records</th><th>Efficiency</th>\
         <th>Mean resolution</th><th>Trend</th><th>Quality</th></tr>"
    );
    for record in outcome.records.values() {
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.1}</td></tr>",
            escape_html(&record.person),
            record.total_records,
            percent(record.efficiency),
            resolution_text(record),
            trend_label(record.trend.direction),
            record.quality.score
        );
    }
    let _ = writeln!(output, "</table>");

    let _ = writeln!(output, "<h2>Rankings</h2>");
    for (title, entries) in rankings(cohort) {
        let _ = writeln!(output, "<h3>{title}</h3><ol>");
        for entry in entries.iter().take(RANKING_LIMIT) {
            let _ = writeln!(
                output,
                "<li>{} ({})</li>",
                escape_html(&entry.name),
                ranking_value(title, entry)
            );
        }
        let _ = writeln!(output, "</ol>");
    }

    let _ = writeln!(output, "<h2>Outliers</h2><ul>");
    for (title, summary) in summaries(cohort) {
        if let Some(summary) = summary.filter(|s| !s.outliers.is_empty()) {
            let names: Vec<String> = summary.outliers.iter().map(|n| escape_html(n)).collect();
            let _ = writeln!(output, "<li>{}: {}</li>", title, names.join(", "));
        }
    }
    let _ = writeln!(output, "</ul>");

    let _ = writeln!(output, "<h2>Bottlenecks</h2><ul>");
    for bottleneck in &cohort.bottlenecks {
        let _ = writeln!(
            output,
            "<li>{} ({}): {:.2} against threshold {:.2}</li>",
            escape_html(&bottleneck.name),
            bottleneck_label(bottleneck.kind),
            bottleneck.value,
            bottleneck.threshold
        );
    }
    let _ = writeln!(output, "</ul>");

    let _ = writeln!(output, "<h2>Recommendations</h2>");
    for record in outcome.records.values() {
        let assessment = assess(record);
        let _ = writeln!(output, "<h3>{}</h3><ul>", escape_html(&record.person));
        for item in &assessment.recommendations {
            let _ = writeln!(
                output,
                "<li><strong>{}</strong>: {} {}</li>",
                item.area, item.recommendation, item.action
            );
        }
        for issue in &record.quality.issues {
            let _ = writeln!(
                output,
                "<li><strong>Data quality</strong>: {} ({})</li>",
                escape_html(&issue.problem),
                escape_html(&issue.suggestion)
            );
        }
        let _ = writeln!(output, "</ul>");
    }

    if !outcome.errors.is_empty() || !outcome.skipped.is_empty() {
        let _ = writeln!(output, "<h2>Sheets Not Analyzed</h2><ul>");
        for error in &outcome.errors {
            let _ = writeln!(
                output,
                "<li>{}: {}</li>",
                escape_html(&error.sheet),
                escape_html(&error.message)
            );
        }
        for name in &outcome.skipped {
            let _ = writeln!(output, "<li>{}: skipped</li>", escape_html(name));
        }
        let _ = writeln!(output, "</ul>");
    }

    let _ = writeln!(output, "</body></html>");
    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cohort::summarize_cohort;
    use crate::config::EngineConfig;
    use crate::metrics::analyze_sheet;
    use crate::models::{CellValue, Sheet, SheetError};
    use uuid::Uuid;

    fn outcome() -> BatchOutcome {
        let text = |s: &str| CellValue::Text(s.to_string());
        let sheet = Sheet::with_text_headers(
            "Avery <Lead>",
            &["DATA", "STATUS"],
            vec![
                vec![text("01/01/2024"), text("CONCLUIDO")],
                vec![text("02/01/2024"), text("PENDENTE")],
            ],
        );
        let record = analyze_sheet(&sheet, &EngineConfig::default()).expect("metrics");
        BatchOutcome {
            run_id: Uuid::new_v4(),
            records: BTreeMap::from([(record.person.clone(), record)]),
            errors: vec![SheetError {
                sheet: "Kiara".into(),
                message: "missing required columns: STATUS".into(),
            }],
            skipped: vec!["Resumo".into()],
        }
    }

    #[test]
    fn markdown_report_has_every_section() {
        let outcome = outcome();
        let cohort = summarize_cohort(&outcome.records, &EngineConfig::default());
        let report = build_report(&outcome, &cohort);
        for heading in [
            "# Work Log Metrics Report",
            "## People",
            "## Rankings",
            "## Outliers",
            "## Bottlenecks",
            "## Recommendations",
            "## Sheets Not Analyzed",
        ] {
            assert!(report.contains(heading), "missing {heading}");
        }
        assert!(report.contains("| Avery <Lead> | 2 | 50.0% | n/a | stable |"));
        assert!(report.contains("- Kiara: missing required columns: STATUS"));
        assert!(report.contains("- Resumo: skipped"));
    }

    #[test]
    fn html_report_escapes_names() {
        let outcome = outcome();
        let cohort = summarize_cohort(&outcome.records, &EngineConfig::default());
        let html = build_html_report(&outcome, &cohort);
        assert!(html.contains("Avery &lt;Lead&gt;"));
        assert!(!html.contains("Avery <Lead>"));
        assert!(html.ends_with("</body></html>\n"));
    }

    #[test]
    fn notes_separate_failures_from_skips() {
        let notes = batch_notes(&outcome());
        assert_eq!(
            notes,
            vec![
                "failed Kiara: missing required columns: STATUS".to_string(),
                "skipped Resumo".to_string(),
            ]
        );
    }

    #[test]
    fn escape_covers_quotes() {
        assert_eq!(escape_html(r#"a & "b" 'c'"#), "a &amp; &quot;b&quot; &#39;c&#39;");
    }
}
