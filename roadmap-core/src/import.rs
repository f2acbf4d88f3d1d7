//! Spreadsheet import: column mapping, row validation and grouping into epics.
//!
//! Parsing CSV/XLSX files is left to the caller; this module starts from rows
//! already split into `header -> cell` maps.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{Epic, Module, Quarter, RoadmapItem};

/// One spreadsheet row keyed by header, in column order
pub type Row = IndexMap<String, String>;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Missing column mapping for: {}", .0.iter().map(|f| f.label()).collect::<Vec<_>>().join(", "))]
    IncompleteMapping(Vec<ImportField>),

    #[error("No valid rows found (every row needs an epic and a feature)")]
    NoValidRows,

    #[error("Rows must be a JSON array of objects: {0}")]
    InvalidRows(#[from] serde_json::Error),
}

/// Target field a spreadsheet column can be mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportField {
    Epic,
    Sprint,
    Quarter,
    Feature,
    Description,
    Customer,
    StartDate,
    EndDate,
    Module,
}

impl ImportField {
    pub const ALL: [ImportField; 9] = [
        ImportField::Epic,
        ImportField::Sprint,
        ImportField::Quarter,
        ImportField::Feature,
        ImportField::Description,
        ImportField::Customer,
        ImportField::StartDate,
        ImportField::EndDate,
        ImportField::Module,
    ];

    pub const REQUIRED: [ImportField; 5] = [
        ImportField::Epic,
        ImportField::Sprint,
        ImportField::Quarter,
        ImportField::Feature,
        ImportField::Description,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ImportField::Epic => "epic",
            ImportField::Sprint => "sprint",
            ImportField::Quarter => "quarter",
            ImportField::Feature => "feature",
            ImportField::Description => "description",
            ImportField::Customer => "customer",
            ImportField::StartDate => "startDate",
            ImportField::EndDate => "endDate",
            ImportField::Module => "module",
        }
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    /// Whether a lowercased header looks like this field
    fn matches(self, header: &str) -> bool {
        match self {
            ImportField::Epic => header.contains("epic"),
            ImportField::Sprint => header.contains("sprint"),
            ImportField::Quarter => header.contains("quarter") || header == "q",
            ImportField::Feature => header.contains("feature"),
            ImportField::Description => header.contains("desc"),
            ImportField::Customer => header.contains("customer") || header.contains("client"),
            ImportField::StartDate => header.contains("start"),
            ImportField::EndDate => header.contains("end"),
            ImportField::Module => header.contains("module") || header.contains("category"),
        }
    }
}

impl fmt::Display for ImportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which header feeds which field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    columns: HashMap<ImportField, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guesses the mapping from header names. When several headers match a
    /// field, the last one wins.
    pub fn auto_map<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut mapping = Self::new();
        for header in headers {
            let header = header.as_ref();
            let lower = header.to_lowercase();
            for field in ImportField::ALL {
                if field.matches(&lower) {
                    mapping.set(field, Some(header.to_string()));
                }
            }
        }
        mapping
    }

    pub fn get(&self, field: ImportField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    /// Maps `field` to a header, or unmaps it with `None`
    pub fn set(&mut self, field: ImportField, header: Option<String>) {
        match header.filter(|h| !h.is_empty()) {
            Some(h) => {
                self.columns.insert(field, h);
            }
            None => {
                self.columns.remove(&field);
            }
        }
    }

    pub fn missing_required(&self) -> Vec<ImportField> {
        ImportField::REQUIRED
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    fn cell<'r>(&self, row: &'r Row, field: ImportField) -> &'r str {
        self.get(field)
            .and_then(|header| row.get(header))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    fn optional_cell(&self, row: &Row, field: ImportField) -> Option<String> {
        Some(self.cell(row, field))
            .filter(|v| !v.is_empty())
            .map(String::from)
    }
}

/// Reads quarter labels like "Q3", "q3 2026", "3" or "Quarter 2"; Q1 otherwise
pub fn normalize_quarter(value: &str) -> Quarter {
    let stripped: String = value
        .to_uppercase()
        .chars()
        .filter(|c| matches!(c, 'Q' | '1' | '2' | '3' | '4'))
        .collect();
    if let Some(q) = Quarter::parse(&stripped) {
        return q;
    }

    for (digit, quarter) in ['1', '2', '3', '4'].into_iter().zip(Quarter::ALL) {
        if value.contains(digit) {
            return quarter;
        }
    }
    Quarter::Q1
}

/// Parses rows from a JSON array of objects; non-string cells are stringified
pub fn parse_rows(json: &str) -> Result<Vec<Row>, ImportError> {
    let raw: Vec<IndexMap<String, Value>> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|obj| {
            obj.into_iter()
                .map(|(k, v)| {
                    let cell = match v {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (k, cell)
                })
                .collect()
        })
        .collect())
}

/// Headers in first-seen order across all rows
pub fn headers(rows: &[Row]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !seen.contains(key) {
                seen.push(key.clone());
            }
        }
    }
    seen
}

/// Turns mapped rows into roadmap items, dropping rows without an epic or feature
pub fn rows_to_items(rows: &[Row], mapping: &ColumnMapping) -> Result<Vec<RoadmapItem>, ImportError> {
    let missing = mapping.missing_required();
    if !missing.is_empty() {
        return Err(ImportError::IncompleteMapping(missing));
    }

    let items: Vec<RoadmapItem> = rows
        .iter()
        .filter(|row| {
            !mapping.cell(row, ImportField::Epic).is_empty()
                && !mapping.cell(row, ImportField::Feature).is_empty()
        })
        .map(|row| {
            let quarter = mapping.cell(row, ImportField::Quarter);
            RoadmapItem {
                epic: mapping.cell(row, ImportField::Epic).to_string(),
                sprint: mapping.cell(row, ImportField::Sprint).to_string(),
                quarter: normalize_quarter(if quarter.is_empty() { "Q1" } else { quarter }),
                feature: mapping.cell(row, ImportField::Feature).to_string(),
                description: mapping.cell(row, ImportField::Description).to_string(),
                customer: mapping.optional_cell(row, ImportField::Customer),
                start_date: mapping.optional_cell(row, ImportField::StartDate),
                end_date: mapping.optional_cell(row, ImportField::EndDate),
                module: mapping.optional_cell(row, ImportField::Module),
            }
        })
        .collect();

    if items.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    info!(rows = rows.len(), items = items.len(), "mapped import rows");
    Ok(items)
}

/// Groups items sharing an epic name into one epic each, in first-appearance order.
///
/// The first row of a group supplies quarter, sprint, customer, dates and
/// module; every row contributes a `feature: description` line.
pub fn group_into_epics(items: &[RoadmapItem], product_id: &str, now: DateTime<Utc>) -> Vec<Epic> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&RoadmapItem>> = HashMap::new();
    for item in items {
        let group = groups.entry(item.epic.as_str()).or_default();
        if group.is_empty() {
            order.push(item.epic.as_str());
        }
        group.push(item);
    }

    order
        .into_iter()
        .filter_map(|name| {
            let group = groups.get(name)?;
            let first = group.first()?;
            Some(Epic {
                id: Uuid::new_v4(),
                product_id: product_id.to_string(),
                title: name.to_string(),
                description: group
                    .iter()
                    .map(|i| format!("{}: {}", i.feature, i.description))
                    .collect::<Vec<_>>()
                    .join("\n"),
                quarter: first.quarter,
                sprint: first.sprint.clone(),
                customer: first.customer.clone(),
                start_date: first.start_date.clone(),
                end_date: first.end_date.clone(),
                module: first.module.as_deref().map(Module::parse),
                dependencies: None,
                stories: Vec::new(),
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn standard_mapping() -> ColumnMapping {
        ColumnMapping::auto_map(&[
            "Epic Name",
            "Sprint",
            "Quarter",
            "Feature",
            "Description",
            "Customer",
            "Start Date",
            "End Date",
            "Module",
        ])
    }

    #[test]
    fn test_auto_map() {
        let mapping = standard_mapping();
        assert!(mapping.is_complete());
        assert_eq!(mapping.get(ImportField::Epic), Some("Epic Name"));
        assert_eq!(mapping.get(ImportField::StartDate), Some("Start Date"));
        assert_eq!(mapping.get(ImportField::Module), Some("Module"));

        let short = ColumnMapping::auto_map(&["Q", "Client", "Desc", "Category"]);
        assert_eq!(short.get(ImportField::Quarter), Some("Q"));
        assert_eq!(short.get(ImportField::Customer), Some("Client"));
        assert_eq!(short.get(ImportField::Description), Some("Desc"));
        assert_eq!(short.get(ImportField::Module), Some("Category"));
    }

    #[test]
    fn test_incomplete_mapping_is_rejected() {
        let mapping = ColumnMapping::auto_map(&["Epic", "Feature"]);
        assert_eq!(
            mapping.missing_required(),
            vec![ImportField::Sprint, ImportField::Quarter, ImportField::Description]
        );
        let err = rows_to_items(&[], &mapping).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing column mapping for: sprint, quarter, description"
        );
    }

    #[test]
    fn test_manual_mapping() {
        let mut mapping = ColumnMapping::new();
        mapping.set(ImportField::Epic, Some("A".into()));
        mapping.set(ImportField::Epic, Some(String::new()));
        assert_eq!(mapping.get(ImportField::Epic), None);
    }

    #[test]
    fn test_normalize_quarter() {
        assert_eq!(normalize_quarter("Q3"), Quarter::Q3);
        assert_eq!(normalize_quarter("q2"), Quarter::Q2);
        assert_eq!(normalize_quarter("Quarter 4"), Quarter::Q4);
        assert_eq!(normalize_quarter("3"), Quarter::Q3);
        assert_eq!(normalize_quarter("FY Q2 2026"), Quarter::Q2);
        assert_eq!(normalize_quarter("H2"), Quarter::Q2);
        assert_eq!(normalize_quarter("later"), Quarter::Q1);
    }

    #[test]
    fn test_rows_without_epic_or_feature_are_dropped() {
        let rows = vec![
            row(&[("Epic Name", "A"), ("Feature", "f"), ("Quarter", "Q2")]),
            row(&[("Epic Name", ""), ("Feature", "f")]),
            row(&[("Epic Name", "B"), ("Feature", "  ")]),
        ];
        let items = rows_to_items(&rows, &standard_mapping()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quarter, Quarter::Q2);
        assert_eq!(items[0].customer, None);
    }

    #[test]
    fn test_no_valid_rows() {
        let rows = vec![row(&[("Epic Name", ""), ("Feature", "")])];
        assert!(matches!(
            rows_to_items(&rows, &standard_mapping()),
            Err(ImportError::NoValidRows)
        ));
    }

    #[test]
    fn test_three_rows_group_into_one_epic() {
        let rows = vec![
            row(&[
                ("Epic Name", "Risk Engine"),
                ("Sprint", "Sprint 4"),
                ("Quarter", "Q2"),
                ("Feature", "VaR"),
                ("Description", "Historical VaR"),
                ("Customer", "Acme Fund"),
                ("Start Date", "2026-04-01"),
                ("End Date", "2026-06-30"),
                ("Module", "Model"),
            ]),
            row(&[
                ("Epic Name", "Risk Engine"),
                ("Sprint", "Sprint 9"),
                ("Quarter", "Q4"),
                ("Feature", "Stress"),
                ("Description", "Scenario stress tests"),
                ("Customer", "Other"),
            ]),
            row(&[
                ("Epic Name", "Risk Engine"),
                ("Quarter", "Q1"),
                ("Feature", "Reports"),
                ("Description", "PDF output"),
            ]),
        ];
        let items = rows_to_items(&rows, &standard_mapping()).unwrap();
        let now = Utc::now();
        let epics = group_into_epics(&items, "horizon", now);

        assert_eq!(epics.len(), 1);
        let epic = &epics[0];
        assert_eq!(epic.title, "Risk Engine");
        assert_eq!(
            epic.description,
            "VaR: Historical VaR\nStress: Scenario stress tests\nReports: PDF output"
        );
        assert_eq!(epic.quarter, Quarter::Q2);
        assert_eq!(epic.sprint, "Sprint 4");
        assert_eq!(epic.customer.as_deref(), Some("Acme Fund"));
        assert_eq!(epic.start_date.as_deref(), Some("2026-04-01"));
        assert_eq!(epic.end_date.as_deref(), Some("2026-06-30"));
        assert_eq!(epic.module, Some(Module::Model));
        assert!(epic.stories.is_empty());
        assert_eq!(epic.created_at, now);
        assert_eq!(epic.product_id, "horizon");
    }

    #[test]
    fn test_groups_keep_first_appearance_order() {
        let item = |epic: &str| RoadmapItem {
            epic: epic.into(),
            sprint: String::new(),
            quarter: Quarter::Q1,
            feature: "f".into(),
            description: "d".into(),
            customer: None,
            start_date: None,
            end_date: None,
            module: None,
        };
        let items = vec![item("B"), item("A"), item("B"), item("C")];
        let titles: Vec<String> = group_into_epics(&items, "horizon", Utc::now())
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_parse_rows_from_json() {
        let json = r#"[{"Epic": "A", "Sprint": 3, "Quarter": null}, {"Epic": "B"}]"#;
        let rows = parse_rows(json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Sprint"], "3");
        assert_eq!(rows[0]["Quarter"], "");
        assert_eq!(headers(&rows), vec!["Epic", "Sprint", "Quarter"]);

        assert!(matches!(parse_rows("{}"), Err(ImportError::InvalidRows(_))));
    }

    #[test]
    fn test_headers_keep_sheet_order_for_auto_map() {
        let rows = parse_rows(r#"[{"Epic Owner": "alice", "Epic": "Risk Engine"}]"#).unwrap();
        let headers = headers(&rows);
        assert_eq!(headers, vec!["Epic Owner", "Epic"]);

        let mapping = ColumnMapping::auto_map(&headers);
        assert_eq!(mapping.get(ImportField::Epic), Some("Epic"));
    }
}
