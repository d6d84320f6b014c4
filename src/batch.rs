//! Runs the per-sheet pipeline over a whole workbook.
//!
//! Sheets share no state, so each one is analyzed on the blocking pool and
//! the results are gathered by name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::metrics::analyze_sheet;
use crate::models::{MetricsRecord, Sheet, SheetError};

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub records: BTreeMap<String, MetricsRecord>,
    pub errors: Vec<SheetError>,
    pub skipped: Vec<String>,
}

pub async fn analyze_batch(sheets: Vec<Sheet>, config: Arc<EngineConfig>) -> BatchOutcome {
    let run_id = Uuid::new_v4();
    let limiter = (config.max_workers > 0)
        .then(|| Arc::new(Semaphore::new(config.max_workers.min(Semaphore::MAX_PERMITS))));

    let mut records = BTreeMap::new();
    let mut errors = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = BTreeSet::new();
    let mut tasks = JoinSet::new();

    for sheet in sheets {
        if config.skips_sheet(&sheet.name) {
            info!(%run_id, sheet = %sheet.name, "skipping non-person sheet");
            skipped.push(sheet.name);
            continue;
        }
        if !seen.insert(sheet.name.clone()) {
            let err = EngineError::DuplicateSheet {
                sheet: sheet.name.clone(),
            };
            warn!(%run_id, sheet = %sheet.name, "{}", err);
            errors.push(SheetError {
                sheet: sheet.name,
                message: err.to_string(),
            });
            continue;
        }

        let config = config.clone();
        let limiter = limiter.clone();
        tasks.spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            let name = sheet.name.clone();
            let result = tokio::task::spawn_blocking(move || analyze_sheet(&sheet, &config))
                .await
                .map_err(|e| EngineError::InvalidInput(format!("sheet worker failed: {e}")))
                .and_then(|result| result);
            (name, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(record))) => {
                records.insert(name, record);
            }
            Ok((name, Err(EngineError::EmptySheet { .. }))) => {
                info!(%run_id, sheet = %name, "skipping sheet without rows");
                skipped.push(name);
            }
            Ok((name, Err(err))) => {
                warn!(%run_id, sheet = %name, "{}", err);
                errors.push(SheetError {
                    sheet: name,
                    message: err.to_string(),
                });
            }
            Err(e) => {
                warn!(%run_id, "sheet task aborted: {}", e);
                errors.push(SheetError {
                    sheet: String::from("<unknown>"),
                    message: format!("sheet task aborted: {e}"),
                });
            }
        }
    }

    errors.sort_by(|a, b| a.sheet.cmp(&b.sheet));
    skipped.sort();
    info!(
        %run_id,
        analyzed = records.len(),
        failed = errors.len(),
        skipped = skipped.len(),
        "batch complete"
    );

    BatchOutcome {
        run_id,
        records,
        errors,
        skipped,
    }
}

/// Convenience for callers that want the batch to fail as a whole when any
/// sheet does.
pub fn into_records(outcome: BatchOutcome) -> Result<BTreeMap<String, MetricsRecord>> {
    match outcome.errors.into_iter().next() {
        Some(first) => Err(EngineError::InvalidInput(format!(
            "sheet '{}' failed: {}",
            first.sheet, first.message
        ))),
        None => Ok(outcome.records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn person(name: &str, statuses: &[&str]) -> Sheet {
        let rows = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                vec![
                    CellValue::Text(format!("{:02}/01/2024", i + 1)),
                    CellValue::Text(status.to_string()),
                ]
            })
            .collect();
        Sheet::with_text_headers(name, &["DATA", "STATUS"], rows)
    }

    #[tokio::test]
    async fn failing_sheet_does_not_stop_the_batch() {
        let broken = Sheet::with_text_headers(
            "Kiara",
            &["DATA", "NOTES"],
            vec![vec![
                CellValue::Text("01/01/2024".into()),
                CellValue::Text("call back".into()),
            ]],
        );
        let sheets = vec![
            person("Avery", &["CONCLUIDO", "PENDENTE"]),
            broken,
            person("Resumo", &["CONCLUIDO"]),
        ];
        let outcome = analyze_batch(sheets, Arc::new(EngineConfig::default())).await;

        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.records.contains_key("Avery"));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].sheet, "Kiara");
        assert!(outcome.errors[0].message.contains("STATUS"));
        assert_eq!(outcome.skipped, vec!["Resumo".to_string()]);
        assert!(into_records(outcome).is_err());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let sheets = vec![person("Jules", &["CONCLUIDO"]), person("Jules", &["PENDENTE"])];
        let outcome = analyze_batch(sheets, Arc::new(EngineConfig::default())).await;
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records["Jules"].status_count("COMPLETED"), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("more than once"));
    }

    #[tokio::test]
    async fn bounded_workers_give_the_same_records() {
        let sheets = || {
            (0..6)
                .map(|i| person(&format!("P{i}"), &["CONCLUIDO", "PENDENTE", "EM ANDAMENTO"]))
                .collect::<Vec<_>>()
        };
        let unbounded = analyze_batch(sheets(), Arc::new(EngineConfig::default())).await;
        let bounded = analyze_batch(
            sheets(),
            Arc::new(EngineConfig {
                max_workers: 2,
                ..EngineConfig::default()
            }),
        )
        .await;
        assert_eq!(unbounded.records, bounded.records);
        assert_ne!(unbounded.run_id, bounded.run_id);
        assert!(into_records(bounded).is_ok());
    }

    #[tokio::test]
    async fn sheets_without_rows_are_skipped_not_failed() {
        let empty = Sheet::with_text_headers("Empty", &["DATA", "STATUS"], Vec::new());
        let sheets = vec![empty, person("Avery", &["CONCLUIDO"])];
        let outcome = analyze_batch(sheets, Arc::new(EngineConfig::default())).await;
        assert_eq!(outcome.skipped, vec!["Empty".to_string()]);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.records.len(), 1);
        assert!(into_records(outcome).is_ok());
    }
}
