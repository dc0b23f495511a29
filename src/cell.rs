use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::errors::{CellError, TimelineError, ValueError};
use crate::field::{FieldId, Record, Value};

/// Maximum number of operations kept for undo.
pub const UNDO_LIMIT: usize = 100;

lazy_static! {
    static ref EMPTY_CELL: CellContent = CellContent::default();
}

/// What one cell holds. An entry mapped to `None` has been assigned from the
/// catalog but not filled in yet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellContent {
    #[serde(default)]
    values: IndexMap<FieldId, Option<Value>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    notes: String,
}

impl CellContent {
    /// No entries and no notes. Such a cell is never kept in a store.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.notes.is_empty()
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn has_field(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn value(&self, id: &str) -> Option<&Value> {
        self.values.get(id).and_then(Option::as_ref)
    }

    /// Assigned entries in assignment order, filled or not.
    pub fn entries(&self) -> impl Iterator<Item = (&FieldId, Option<&Value>)> {
        self.values.iter().map(|(id, v)| (id, v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn insert_entry(&mut self, id: FieldId, value: Option<Value>) {
        self.values.insert(id, value);
    }

    /// Filled values as a record, ready for the evaluator.
    pub fn record(&self) -> Record {
        self.values
            .iter()
            .filter_map(|(id, v)| v.as_ref().map(|v| (id.clone(), v.clone())))
            .collect()
    }

    /// Copy without the entries whose visibility rule fails for this cell.
    /// Hidden values stay in the store but never leave it.
    pub fn without_hidden(&self, catalog: &Catalog) -> CellContent {
        let record = self.record();
        let values = self
            .values
            .iter()
            .filter(|(id, _)| {
                catalog
                    .get_field(id.as_str())
                    .is_some_and(|field| catalog.is_visible(field, &record))
            })
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect();
        CellContent {
            values,
            notes: self.notes.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    Added,
    /// The field was already in the cell; nothing changed.
    AlreadyAssigned,
}

type Snapshot = Vec<(usize, Option<CellContent>)>;

/// Cell contents keyed by timeline index.
///
/// Only non-empty cells are stored. Every mutation either changes state and
/// records one undo snapshot, or leaves both untouched.
#[derive(Clone, Debug)]
pub struct CellStore {
    catalog: Arc<Catalog>,
    capacity: usize,
    cells: BTreeMap<usize, CellContent>,
    undo_stack: Vec<Snapshot>,
}

impl CellStore {
    pub fn new(catalog: Arc<Catalog>, capacity: usize) -> Self {
        CellStore {
            catalog,
            capacity,
            cells: BTreeMap::new(),
            undo_stack: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert, update or (with `None`) remove one field of a cell.
    pub fn set_value(
        &mut self,
        index: usize,
        field: &str,
        value: Option<Value>,
    ) -> Result<(), CellError> {
        let id = match &value {
            Some(value) => self.catalog.check_value(field, value)?,
            None => self.catalog.field_id(field)?,
        };
        self.mutate(&[index], |content| {
            match value.clone() {
                Some(value) => {
                    content.values.insert(id.clone(), Some(value));
                }
                None => {
                    content.values.shift_remove(&id);
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Never fails for an in-range index; absent cells read as empty.
    pub fn get_content(&self, index: usize) -> Result<&CellContent, CellError> {
        self.check_index(index)?;
        Ok(self.cells.get(&index).unwrap_or(&*EMPTY_CELL))
    }

    /// Attach a catalog entry to a cell, pre-filled with its default if it has
    /// one. Adding an entry the cell already holds changes nothing.
    pub fn add_catalog_entry(&mut self, index: usize, field: &str) -> Result<Assignment, CellError> {
        let definition = self
            .catalog
            .get_field(field)
            .ok_or_else(|| ValueError::UnknownField(field.to_string()))?;
        if definition.is_computed() {
            return Err(ValueError::Computed(field.to_string()).into());
        }
        let id = definition.id.clone();
        let default = definition.default.clone();

        if self.get_content(index)?.has_field(field) {
            log::debug!("cell {index} already holds `{field}`");
            return Ok(Assignment::AlreadyAssigned);
        }
        self.mutate(&[index], |content| {
            content.values.insert(id.clone(), default.clone());
            Ok(())
        })?;
        Ok(Assignment::Added)
    }

    pub fn remove_entry(&mut self, index: usize, field: &str) -> Result<(), CellError> {
        self.set_value(index, field, None)
    }

    pub fn set_notes(&mut self, index: usize, notes: &str) -> Result<(), CellError> {
        self.mutate(&[index], |content| {
            content.notes = notes.to_string();
            Ok(())
        })?;
        Ok(())
    }

    /// Copy `fields` of `source` onto every target, overwriting what the
    /// targets hold. Fields the source lacks are left alone in the targets.
    /// Returns the number of cells that changed.
    pub fn copy_fields(
        &mut self,
        source: usize,
        fields: &[&str],
        targets: &[usize],
    ) -> Result<usize, CellError> {
        let mut picked = Vec::new();
        for &field in fields {
            let id = self.catalog.field_id(field)?;
            if let Some(entry) = self.get_content(source)?.values.get(field) {
                picked.push((id, entry.clone()));
            }
        }
        let targets: Vec<usize> = targets.iter().copied().filter(|&t| t != source).collect();
        self.mutate(&targets, |content| {
            for (id, entry) in &picked {
                content.values.insert(id.clone(), entry.clone());
            }
            Ok(())
        })
    }

    /// Write `values` into every target cell. All values are checked before
    /// any cell changes.
    pub fn apply_values(
        &mut self,
        values: &IndexMap<FieldId, Value>,
        targets: &[usize],
    ) -> Result<usize, CellError> {
        let mut checked = Vec::with_capacity(values.len());
        for (id, value) in values {
            checked.push((self.catalog.check_value(id.as_str(), value)?, value.clone()));
        }
        self.mutate(targets, |content| {
            for (id, value) in &checked {
                content.values.insert(id.clone(), Some(value.clone()));
            }
            Ok(())
        })
    }

    /// Populated cells in ascending index order.
    pub fn populated(&self) -> impl Iterator<Item = (usize, &CellContent)> {
        self.cells.iter().map(|(&i, c)| (i, c))
    }

    pub fn populated_indices(&self) -> Vec<usize> {
        self.cells.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Change the addressable range. Cells at or past `capacity` are dropped
    /// and their indices returned.
    pub fn resize(&mut self, capacity: usize) -> Vec<usize> {
        self.capacity = capacity;
        let dropped: Vec<usize> = self.cells.split_off(&capacity).into_keys().collect();
        if !dropped.is_empty() {
            log::warn!(
                "dropped {} cell(s) outside the new timeline of {capacity}",
                dropped.len()
            );
            for snapshot in &mut self.undo_stack {
                snapshot.retain(|(i, _)| *i < capacity);
            }
            self.undo_stack.retain(|snapshot| !snapshot.is_empty());
        }
        dropped
    }

    /// Revert the last change. Returns the cells it touched, or `None` when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> Option<Vec<usize>> {
        let snapshot = self.undo_stack.pop()?;
        let mut touched = Vec::with_capacity(snapshot.len());
        for (index, before) in snapshot.into_iter().rev() {
            if index >= self.capacity {
                continue;
            }
            match before {
                Some(content) => {
                    self.cells.insert(index, content);
                }
                None => {
                    self.cells.remove(&index);
                }
            }
            touched.push(index);
        }
        touched.sort_unstable();
        touched.dedup();
        log::debug!("undo restored cells {touched:?}");
        Some(touched)
    }

    pub fn history_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Replace every cell with `cells` (a loaded document or an import).
    ///
    /// Each index and entry is validated; empty cells are skipped. History is
    /// cleared. On error the store is unchanged.
    pub fn restore(&mut self, cells: BTreeMap<usize, CellContent>) -> Result<(), CellError> {
        let mut checked = BTreeMap::new();
        for (index, content) in cells {
            self.check_index(index)?;
            for (id, value) in &content.values {
                match value {
                    Some(value) => {
                        self.catalog.check_value(id.as_str(), value)?;
                    }
                    None => {
                        let field = self
                            .catalog
                            .get_field(id.as_str())
                            .ok_or_else(|| ValueError::UnknownField(id.to_string()))?;
                        if field.is_computed() {
                            return Err(ValueError::Computed(id.to_string()).into());
                        }
                    }
                }
            }
            if !content.is_empty() {
                checked.insert(index, content);
            }
        }
        self.cells = checked;
        self.undo_stack.clear();
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), CellError> {
        if index >= self.capacity {
            return Err(TimelineError::CellOutOfRange {
                index,
                count: self.capacity,
            }
            .into());
        }
        Ok(())
    }

    /// Apply `op` to a working copy of each target, then commit the copies
    /// that differ from what is stored. Empty results are pruned.
    fn mutate<F>(&mut self, targets: &[usize], mut op: F) -> Result<usize, CellError>
    where
        F: FnMut(&mut CellContent) -> Result<(), CellError>,
    {
        let targets: BTreeSet<usize> = targets.iter().copied().collect();
        for &index in &targets {
            self.check_index(index)?;
        }

        let mut staged = Vec::with_capacity(targets.len());
        for index in targets {
            let before = self.cells.get(&index).cloned();
            let mut after = before.clone().unwrap_or_default();
            op(&mut after)?;
            let after = (!after.is_empty()).then_some(after);
            if after != before {
                staged.push((index, before, after));
            }
        }

        let mut snapshot = Vec::with_capacity(staged.len());
        for (index, before, after) in staged {
            match after {
                Some(content) => {
                    self.cells.insert(index, content);
                }
                None => {
                    self.cells.remove(&index);
                    log::debug!("cell {index} emptied and pruned");
                }
            }
            snapshot.push((index, before));
        }

        let changed = snapshot.len();
        if changed > 0 {
            self.undo_stack.push(snapshot);
            if self.undo_stack.len() > UNDO_LIMIT {
                self.undo_stack.remove(0);
            }
        }
        Ok(changed)
    }
}
