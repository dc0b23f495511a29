/*!
# Review Pipeline Engine

A schema-driven engine for documenting a process (growing, curing) over time,
built in Rust.

## Overview

A review is a timeline of cells (hours, days, weeks, months or named phases).
Each cell holds values for fields drawn from a static catalog. Fields are
typed, may only apply under a condition on other fields, and may be computed
from other fields by a formula. Named presets capture reusable bundles of
values, and the whole timeline exports to CSV.

## Architecture

### Schema Layer
- **Field Catalog** - Sections of typed field definitions, validated once at
  load time (unique identifiers and labels, known references, acyclic formulas)
- **Dependency Graph** - Topological order over formula inputs and visibility
  sources, computed once and cached
- **Evaluator** - Resolves a cell record in a single pass: hides inactive
  fields and fills in computed ones

### Document Layer
- **Timeline** - Interval type, dates, duration and phases; derives the cell
  count (clamped to a per-interval ceiling) and per-cell labels
- **Cell Store** - Values per cell with pruning of empty cells and undo
- **Pipeline** - Ties catalog, timeline and cells together; reconfiguring drops
  cells outside the new range

### Persistence Layer
- Presets persisted as a JSON array in a key-value store, scoped per pipeline type
- Pipeline documents saved as gzip-compressed JSON
- CSV export and import

## Modules

- **field**: Field identifiers, values, records and the closed set of field kinds
- **catalog**: Sections, catalog loading and the built-in culture and curing catalogs
- **graph**: Dependency graph and cycle detection
- **evaluator**: Record resolution
- **timeline**: Pipeline and interval types, timeline configuration and labels
- **cell**: Cell contents and the cell store
- **preset**: Presets and the preset store
- **storage**: Key-value store port with memory and file implementations
- **pipeline**: The pipeline aggregate
- **downloader**: CSV export
- **loader**: CSV import
- **saving**: Document persistence with compression
- **config**: Command-line settings
- **errors**: Error types

## Design Highlights

- Field kinds are an exhaustively matched enum, so validation and decoding are
  checked by the compiler for every kind
- Formula order is sorted once per catalog, so evaluation is linear
- Mutations are idempotent: repeating one changes nothing and records no undo step
- Storage failures never roll back an in-memory edit; they come back as warnings
*/

pub mod catalog;
pub mod cell;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod evaluator;
pub mod field;
pub mod graph;
pub mod loader;
pub mod pipeline;
pub mod preset;
pub mod saving;
pub mod storage;
pub mod timeline;

pub use catalog::{Catalog, Section};
pub use cell::{Assignment, CellContent, CellStore};
pub use config::Settings;
pub use downloader::{to_csv, EMPTY_EXPORT};
pub use errors::*;
pub use evaluator::resolve;
pub use field::{
    CompositeKind, Computation, FieldDefinition, FieldId, FieldKind, Record, Value, Visibility,
};
pub use loader::from_csv;
pub use pipeline::Pipeline;
pub use preset::{Persisted, Preset, PresetId, PresetStore};
pub use saving::{load_pipeline, save_pipeline};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use timeline::{IntervalType, Phase, PipelineType, Timeline, TimelineConfig, TimelineUpdate};
