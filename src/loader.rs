use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::cell::{CellContent, CellStore};
use crate::downloader::EMPTY_EXPORT;
use crate::errors::{CellError, LoadError, ValueError};
use crate::field::FieldDefinition;
use crate::timeline::Timeline;

/// Rebuild cell contents from a CSV export
///
/// This function reads a table in the layout produced by
/// [`crate::downloader::to_csv`] and turns it back into a [`CellStore`]
/// sized to `timeline`. Header labels are mapped to catalog fields by label
/// and every value is decoded according to its field kind.
///
/// Empty values are treated as absent. The `Period` column is derived data
/// and is not read back.
///
/// # Arguments
/// * `text` - The CSV text
/// * `timeline` - Timeline the cell numbers must fit into
/// * `catalog` - Catalog used to resolve labels and decode values
///
/// # Returns
/// * `Result<CellStore, LoadError>` - The populated store (with no undo
///   history) or the first problem found
pub fn from_csv(text: &str, timeline: &Timeline, catalog: Arc<Catalog>) -> Result<CellStore, LoadError> {
    let mut store = CellStore::new(Arc::clone(&catalog), timeline.cell_count());
    if text.trim() == EMPTY_EXPORT {
        return Ok(store);
    }

    let mut records = parse_csv_records(text)?.into_iter();
    let header = records.next().ok_or(LoadError::Empty)?;
    if header.len() < 2 || header[0] != "Cell" || header[1] != "Period" {
        return Err(LoadError::MissingHeader);
    }

    let mut columns: Vec<&FieldDefinition> = Vec::with_capacity(header.len() - 2);
    for label in &header[2..] {
        let field = catalog
            .field_by_label(label)
            .ok_or_else(|| LoadError::UnknownColumn(label.clone()))?;
        if field.is_computed() {
            return Err(CellError::from(ValueError::Computed(field.id.to_string())).into());
        }
        columns.push(field);
    }

    let mut cells: BTreeMap<usize, CellContent> = BTreeMap::new();
    for (n, row) in records.enumerate() {
        let row_number = n + 1;
        if row.len() != header.len() {
            return Err(LoadError::MalformedRow {
                row: row_number,
                reason: format!("expected {} values, found {}", header.len(), row.len()),
            });
        }
        let index = row[0]
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|cell| cell.checked_sub(1))
            .ok_or_else(|| LoadError::MalformedRow {
                row: row_number,
                reason: format!("`{}` is not a cell number", row[0]),
            })?;
        timeline.check_index(index)?;

        let mut content = CellContent::default();
        for (field, raw) in columns.iter().zip(&row[2..]) {
            if raw.is_empty() {
                continue;
            }
            let value = field.kind.decode(&field.id, raw).map_err(CellError::from)?;
            content.insert_entry(field.id.clone(), Some(value));
        }
        if cells.insert(index, content).is_some() {
            return Err(LoadError::MalformedRow {
                row: row_number,
                reason: format!("cell {} appears twice", index + 1),
            });
        }
    }

    store.restore(cells)?;
    log::info!("imported {} cell(s)", store.len());
    Ok(store)
}

/// Split CSV text into records of unescaped values.
///
/// Quoted values may contain commas, doubled quotes and line breaks. Blank
/// lines, including trailing ones, yield no record.
fn parse_csv_records(text: &str) -> Result<Vec<Vec<String>>, LoadError> {
    let mut records = Vec::new();
    let mut current_record = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    // an empty quoted value still counts as content
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => {
                in_quotes = true;
                quoted = true;
            }
            ',' if !in_quotes => {
                current_record.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                if current_record.is_empty() && current_field.is_empty() && !quoted {
                    continue;
                }
                current_record.push(std::mem::take(&mut current_field));
                records.push(std::mem::take(&mut current_record));
                quoted = false;
            }
            _ => current_field.push(c),
        }
    }

    if in_quotes {
        return Err(LoadError::MalformedRow {
            row: records.len(),
            reason: "unterminated quoted value".to_string(),
        });
    }
    if !current_field.is_empty() || !current_record.is_empty() || quoted {
        current_record.push(current_field);
        records.push(current_record);
    }
    if records.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(records)
}
