use indexmap::IndexMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::cell::{Assignment, CellContent, CellStore};
use crate::downloader;
use crate::errors::{CatalogError, LoadError, PipelineError, TimelineError};
use crate::evaluator;
use crate::field::{Record, Value};
use crate::loader;
use crate::preset::Preset;
use crate::timeline::{PipelineType, Timeline, TimelineConfig, TimelineUpdate};

/// One review document: catalog, timeline and the cells keyed into it.
///
/// The cell store's addressable range always equals the timeline's cell
/// count; reconfiguring drops cells that fall outside it.
#[derive(Clone, Debug)]
pub struct Pipeline {
    catalog: Arc<Catalog>,
    timeline: Timeline,
    cells: CellStore,
}

impl Pipeline {
    /// Fresh pipeline with the built-in catalog and default timeline.
    pub fn new(pipeline: PipelineType) -> Result<Self, CatalogError> {
        let catalog = Arc::new(Catalog::builtin(pipeline)?);
        Ok(Self::with_catalog(pipeline, catalog))
    }

    pub fn with_catalog(pipeline: PipelineType, catalog: Arc<Catalog>) -> Self {
        let timeline = Timeline::new(pipeline);
        let cells = CellStore::new(Arc::clone(&catalog), timeline.cell_count());
        Pipeline {
            catalog,
            timeline,
            cells,
        }
    }

    /// Assemble from parts loaded elsewhere. The store is resized to the
    /// timeline.
    pub(crate) fn from_parts(catalog: Arc<Catalog>, timeline: Timeline, mut cells: CellStore) -> Self {
        cells.resize(timeline.cell_count());
        Pipeline {
            catalog,
            timeline,
            cells,
        }
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.timeline.pipeline()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    pub fn set_notes(&mut self, index: usize, notes: &str) -> Result<(), PipelineError> {
        Ok(self.cells.set_notes(index, notes)?)
    }

    /// Copy `fields` from `source` onto `targets`. See [`CellStore::copy_fields`].
    pub fn copy_fields(
        &mut self,
        source: usize,
        fields: &[&str],
        targets: &[usize],
    ) -> Result<usize, PipelineError> {
        Ok(self.cells.copy_fields(source, fields, targets)?)
    }

    /// Reconfigure the timeline and drop cells past the new end.
    pub fn configure(&mut self, update: TimelineUpdate) -> Result<&TimelineConfig, TimelineError> {
        let count = self.timeline.configure(update)?.total_cells;
        let dropped = self.cells.resize(count);
        if !dropped.is_empty() {
            log::info!("timeline now {count} cells; removed content of {dropped:?}");
        }
        Ok(self.timeline.config())
    }

    pub fn set_value(
        &mut self,
        index: usize,
        field: &str,
        value: Option<Value>,
    ) -> Result<(), PipelineError> {
        Ok(self.cells.set_value(index, field, value)?)
    }

    pub fn add_catalog_entry(&mut self, index: usize, field: &str) -> Result<Assignment, PipelineError> {
        Ok(self.cells.add_catalog_entry(index, field)?)
    }

    pub fn remove_entry(&mut self, index: usize, field: &str) -> Result<(), PipelineError> {
        Ok(self.cells.remove_entry(index, field)?)
    }

    pub fn content(&self, index: usize) -> Result<&CellContent, PipelineError> {
        Ok(self.cells.get_content(index)?)
    }

    /// What the form shows for a cell: visible values plus computed ones.
    pub fn view(&self, index: usize) -> Result<Record, PipelineError> {
        let content = self.cells.get_content(index)?;
        Ok(evaluator::resolve(&self.catalog, &content.record()))
    }

    /// Labels of every cell in order.
    pub fn labels(&self) -> Result<Vec<String>, TimelineError> {
        (0..self.timeline.cell_count())
            .map(|i| self.timeline.label_for(i))
            .collect()
    }

    /// Capture `fields` of a cell (all filled fields when empty) as a new
    /// preset. The preset is not stored; hand it to a
    /// [`crate::preset::PresetStore`].
    pub fn capture_preset(
        &self,
        index: usize,
        name: &str,
        group: &str,
        fields: &[&str],
    ) -> Result<Preset, PipelineError> {
        for &field in fields {
            self.catalog.field_id(field)?;
        }
        let content = self.cells.get_content(index)?;
        Ok(Preset::from_cell(name, group, content, &self.catalog, fields)?)
    }

    /// Write a preset's values into each target cell. Returns the number of
    /// cells that changed.
    pub fn apply_preset(&mut self, preset: &Preset, targets: &[usize]) -> Result<usize, PipelineError> {
        let changed = self.cells.apply_values(&preset.fields, targets)?;
        log::debug!("preset \"{}\" changed {changed} cell(s)", preset.name);
        Ok(changed)
    }

    /// Set the same values on a range of cells in one undoable step.
    pub fn apply_values(
        &mut self,
        values: &IndexMap<String, Value>,
        targets: &[usize],
    ) -> Result<usize, PipelineError> {
        let mut checked = IndexMap::with_capacity(values.len());
        for (field, value) in values {
            checked.insert(self.catalog.check_value(field, value)?, value.clone());
        }
        Ok(self.cells.apply_values(&checked, targets)?)
    }

    pub fn undo(&mut self) -> Option<Vec<usize>> {
        self.cells.undo()
    }

    /// Replace every cell with the contents of a CSV export. On error the
    /// pipeline is unchanged.
    pub fn import_csv(&mut self, text: &str) -> Result<usize, LoadError> {
        self.cells = loader::from_csv(text, &self.timeline, Arc::clone(&self.catalog))?;
        Ok(self.cells.len())
    }

    /// CSV text of every populated cell, or the empty-export placeholder.
    pub fn export_csv(&self) -> Result<String, TimelineError> {
        downloader::to_csv(&self.timeline, &self.cells, &self.catalog)
    }
}
