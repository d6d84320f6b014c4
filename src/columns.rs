//! Maps arbitrary sheet headers onto semantic column roles.
//!
//! Every role is resolved by a ranked list of rules. Alias rules (exact match
//! on the normalized header) run for every role before any content rule, and
//! content rules only look at headers that no role has claimed yet. Within a
//! rule the leftmost matching header wins.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{CellValue, ColumnRole, Sheet};

const DATE_ALIASES: &[&str] = &[
    "DATA",
    "DT",
    "DATE",
    "DATA CRIACAO",
    "DATA CRIAÇÃO",
    "DATA DE CRIACAO",
    "DATA DE CRIAÇÃO",
    "CREATED",
    "CREATED AT",
];

const STATUS_ALIASES: &[&str] = &["STATUS", "SITUACAO", "SITUAÇÃO", "SITUAÇÂO", "ESTADO"];

const RESPONSIBLE_ALIASES: &[&str] = &[
    "RESPONSAVEL",
    "RESPONSÁVEL",
    "ATRIBUIDO",
    "ATRIBUÍDO",
    "ATENDENTE",
    "ASSIGNEE",
];

const ID_ALIASES: &[&str] = &["ID", "CODIGO", "CÓDIGO", "NUMERO", "NÚMERO", "#"];

const DESCRIPTION_ALIASES: &[&str] = &[
    "DESCRICAO",
    "DESCRIÇÃO",
    "ASSUNTO",
    "TEMA",
    "TITULO",
    "TÍTULO",
    "DESCRIPTION",
];

const RESOLUTION_ALIASES: &[&str] = &[
    "RESOLUCAO",
    "RESOLUÇÃO",
    "DATA RESOLUCAO",
    "DATA RESOLUÇÃO",
    "DATA DE RESOLUCAO",
    "DATA DE RESOLUÇÃO",
    "DATA CONCLUSAO",
    "DATA CONCLUSÃO",
    "DATA FECHAMENTO",
    "RESOLVED",
    "RESOLVED AT",
];

/// Workflow words that mark a column as holding statuses.
const STATUS_VOCABULARY: &[&str] = &[
    "CONCLUIDO",
    "CONCLUÍDO",
    "PENDENTE",
    "EM ANDAMENTO",
    "CANCELADO",
    "ABERTO",
    "FECHADO",
    "COMPLETED",
    "PENDING",
    "IN PROGRESS",
    "CANCELLED",
    "OPEN",
    "CLOSED",
];

fn aliases(role: ColumnRole) -> &'static [&'static str] {
    match role {
        ColumnRole::Date => DATE_ALIASES,
        ColumnRole::Status => STATUS_ALIASES,
        ColumnRole::Responsible => RESPONSIBLE_ALIASES,
        ColumnRole::Id => ID_ALIASES,
        ColumnRole::Description => DESCRIPTION_ALIASES,
        ColumnRole::ResolutionDate => RESOLUTION_ALIASES,
    }
}

/// Collapses whitespace runs and upper-cases.
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub index: usize,
    pub header: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    resolved: BTreeMap<ColumnRole, ResolvedColumn>,
}

impl ColumnMap {
    pub fn get(&self, role: ColumnRole) -> Option<&ResolvedColumn> {
        self.resolved.get(&role)
    }

    pub fn index(&self, role: ColumnRole) -> Option<usize> {
        self.get(role).map(|column| column.index)
    }

    pub fn header(&self, role: ColumnRole) -> Option<&str> {
        self.get(role).map(|column| column.header.as_str())
    }

    pub fn unresolved(&self) -> Vec<ColumnRole> {
        ColumnRole::ALL
            .into_iter()
            .filter(|role| !self.resolved.contains_key(role))
            .collect()
    }

    fn claims(&self, index: usize) -> bool {
        self.resolved.values().any(|column| column.index == index)
    }

    fn assign(&mut self, role: ColumnRole, index: usize, header: &str) {
        self.resolved.insert(
            role,
            ResolvedColumn {
                index,
                header: header.to_string(),
            },
        );
    }
}

pub fn resolve_columns(sheet: &Sheet) -> ColumnMap {
    let normalized: Vec<String> = sheet.headers.iter().map(|h| normalize_header(h)).collect();
    let mut map = ColumnMap::default();

    for role in ColumnRole::ALL {
        let found = aliases(role).iter().find_map(|alias| {
            normalized
                .iter()
                .enumerate()
                .find(|(index, header)| header.as_str() == *alias && !map.claims(*index))
                .map(|(index, _)| index)
        });
        if let Some(index) = found {
            map.assign(role, index, &sheet.headers[index]);
        }
    }

    if map.get(ColumnRole::Date).is_none() {
        if let Some(index) = sniff(sheet, &map, looks_like_date_column) {
            map.assign(ColumnRole::Date, index, &sheet.headers[index]);
        }
    }

    if map.get(ColumnRole::Status).is_none() {
        if let Some(index) = sniff(sheet, &map, looks_like_status_column) {
            map.assign(ColumnRole::Status, index, &sheet.headers[index]);
        }
    }

    map
}

fn sniff(sheet: &Sheet, map: &ColumnMap, rule: fn(&Sheet, usize) -> bool) -> Option<usize> {
    (0..sheet.headers.len()).find(|index| !map.claims(*index) && rule(sheet, *index))
}

/// Date-typed first value, or a text value carrying a separator and at least four digits.
fn looks_like_date_column(sheet: &Sheet, index: usize) -> bool {
    match sheet.column(index).find(|cell| !cell.is_empty()) {
        Some(CellValue::DateTime(_)) => true,
        Some(CellValue::Text(text)) => {
            let has_separator = text.contains('/') || text.contains('-');
            let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
            has_separator && digits >= 4
        }
        _ => false,
    }
}

fn looks_like_status_column(sheet: &Sheet, index: usize) -> bool {
    sheet.column(index).any(|cell| {
        let value = normalize_header(&cell.to_text());
        STATUS_VOCABULARY.contains(&value.as_str())
    })
}
