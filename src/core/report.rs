use std::sync::Arc;

use crate::core::db::Row;
use crate::core::error::{HookError, RenderError};

/// Per-row predicate. `Ok(false)` marks the row as filtered.
pub type RowFilter = Arc<dyn Fn(&Row) -> Result<bool, HookError> + Send + Sync>;

/// Per-row rewrite applied before the row is rendered.
pub type TextReplacer = Arc<dyn Fn(Row) -> Result<Row, HookError> + Send + Sync>;

/// Ordered `(label, column)` pairs that make up one report line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSpec {
    fields: Vec<(String, String)>,
}

impl RenderSpec {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Label, then the column value and a space when the value is non-empty.
    pub fn render_line(&self, row: &Row) -> String {
        let mut line = String::new();
        for (label, column) in &self.fields {
            line.push_str(label);
            let value = row.get(column);
            if !value.is_empty() {
                line.push_str(value);
                line.push(' ');
            }
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub body: String,
    pub should_send: bool,
    pub total_rows: usize,
    pub filtered_rows: usize,
}

/// Runs the filter and replacer over every row and renders the body.
///
/// Filtered rows still get a line in the body; they only count towards
/// suppression, which happens when no row passed. Any hook error aborts the
/// whole report.
pub fn render_report(
    rows: Vec<Row>,
    spec: &RenderSpec,
    filter: Option<&RowFilter>,
    replacer: Option<&TextReplacer>,
) -> Result<Report, RenderError> {
    let total_rows = rows.len();
    let mut filtered_rows = 0;
    let mut body = String::new();

    for (idx, mut row) in rows.into_iter().enumerate() {
        if let Some(filter) = filter {
            let passed =
                filter(&row).map_err(|source| RenderError::Filter { row: idx, source })?;
            if !passed {
                filtered_rows += 1;
            }
        }

        if let Some(replacer) = replacer {
            row = replacer(row).map_err(|source| RenderError::Transform { row: idx, source })?;
        }

        body.push_str(&spec.render_line(&row));
        body.push('\n');
    }

    Ok(Report {
        body,
        should_send: filtered_rows < total_rows,
        total_rows,
        filtered_rows,
    })
}
