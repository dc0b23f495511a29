use indexmap::IndexSet;

use crate::catalog::Catalog;
use crate::cell::CellStore;
use crate::errors::TimelineError;
use crate::field::{FieldId, Record};
use crate::timeline::{PipelineType, Timeline};

/// Returned instead of a table when no cell holds anything.
pub const EMPTY_EXPORT: &str = "No data to export";
pub const CSV_MIME_TYPE: &str = "text/csv";
pub const CSV_EXTENSION: &str = "csv";

/// Convert the populated cells of a pipeline to CSV
///
/// The table has one header row followed by one row per populated cell, in
/// ascending cell order:
/// - the header is `Cell,Period` followed by the label of every field that
///   appears in any cell, in first-seen order
/// - each row starts with the 1-based cell number and the cell's period label
/// - a field the cell does not hold (or holds unfilled) renders as an empty
///   string; lists and objects render as JSON text
/// - fields hidden by their visibility rule in a cell are not exported for it
/// - every row, the header included, ends with `\n`
///
/// # Arguments
/// * `timeline` - Source of the period labels
/// * `cells` - The cell contents to flatten
/// * `catalog` - Source of the column labels
///
/// # Returns
/// * `Result<String, TimelineError>` - The CSV text, or [`EMPTY_EXPORT`] when
///   nothing is populated. Fails only if a stored cell lies outside the
///   timeline.
pub fn to_csv(
    timeline: &Timeline,
    cells: &CellStore,
    catalog: &Catalog,
) -> Result<String, TimelineError> {
    if cells.is_empty() {
        return Ok(EMPTY_EXPORT.to_string());
    }

    let mut columns: IndexSet<&FieldId> = IndexSet::new();
    let mut rows = Vec::with_capacity(cells.len());
    for (index, content) in cells.populated() {
        let record = content.record();
        let mut shown = Vec::with_capacity(content.len());
        for (id, value) in content.entries() {
            if !is_exported(catalog, id, &record) {
                continue;
            }
            columns.insert(id);
            shown.push((id, value.map(|v| v.render()).unwrap_or_default()));
        }
        rows.push((index, shown));
    }

    let mut csv_content = String::new();
    push_row(
        &mut csv_content,
        ["Cell", "Period"]
            .into_iter()
            .map(str::to_string)
            .chain(columns.iter().map(|id| {
                catalog
                    .get_field(id.as_str())
                    .map_or_else(|| id.to_string(), |f| f.label.to_string())
            })),
    );

    for (index, shown) in rows {
        let period = timeline.label_for(index)?;
        let values = columns.iter().map(|column| {
            shown
                .iter()
                .find(|(id, _)| id == column)
                .map(|(_, text)| text.clone())
                .unwrap_or_default()
        });
        push_row(
            &mut csv_content,
            [(index + 1).to_string(), period].into_iter().chain(values),
        );
    }

    log::info!(
        "exported {} cell(s) across {} field column(s)",
        cells.len(),
        columns.len()
    );
    Ok(csv_content)
}

/// Escape one CSV value
///
/// Values containing a comma, a double quote or a line break are wrapped in
/// double quotes with inner quotes doubled; anything else is returned as is.
///
/// # Examples
/// ```
/// use review_pipeline::downloader::escape_csv;
///
/// assert_eq!(escape_csv("plain"), "plain");
/// assert_eq!(escape_csv("a,b"), "\"a,b\"");
/// assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
/// ```
pub fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// File name offered for a download of `pipeline`'s export.
pub fn export_file_name(pipeline: PipelineType) -> String {
    format!("{}-pipeline.{CSV_EXTENSION}", pipeline.as_str())
}

fn is_exported(catalog: &Catalog, id: &FieldId, record: &Record) -> bool {
    match catalog.get_field(id.as_str()) {
        Some(field) => !field.is_computed() && catalog.is_visible(field, record),
        None => false,
    }
}

fn push_row(out: &mut String, values: impl IntoIterator<Item = String>) {
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_csv(&value));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_only_when_needed() {
        assert_eq!(escape_csv("Day 1"), "Day 1");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(
            escape_csv(r#"{"on":18,"off":6}"#),
            r#""{""on"":18,""off"":6}""#
        );
    }

    #[test]
    fn file_name_carries_pipeline_and_extension() {
        assert_eq!(export_file_name(PipelineType::Curing), "curing-pipeline.csv");
    }
}
