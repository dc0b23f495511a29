use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::cell::{CellContent, CellStore};
use crate::errors::LoadError;
use crate::pipeline::Pipeline;
use crate::timeline::{PipelineType, Timeline, TimelineConfig};

/// On-disk form of a [`Pipeline`]: gzip-compressed JSON.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDocument {
    pub pipeline_type: PipelineType,
    pub timeline: TimelineConfig,
    pub cells: BTreeMap<usize, CellContent>,
}

impl PipelineDocument {
    /// Snapshot of `pipeline`. Hidden entries are left out, and cells left
    /// empty by that are skipped.
    pub fn of(pipeline: &Pipeline) -> Self {
        PipelineDocument {
            pipeline_type: pipeline.pipeline_type(),
            timeline: pipeline.timeline().config().clone(),
            cells: pipeline
                .cells()
                .populated()
                .map(|(i, c)| (i, c.without_hidden(pipeline.catalog())))
                .filter(|(_, c)| !c.is_empty())
                .collect(),
        }
    }
}

pub fn save_pipeline(pipeline: &Pipeline, filename: impl AsRef<Path>) -> std::io::Result<()> {
    let file = File::create(filename.as_ref())?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serde_json::to_writer(&mut writer, &PipelineDocument::of(pipeline))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error())?.finish()?;

    log::info!(
        "saved {} pipeline ({} cells) to {}",
        pipeline.pipeline_type(),
        pipeline.cells().len(),
        filename.as_ref().display()
    );
    Ok(())
}

/// Load a saved document into a pipeline of type `expected`.
///
/// The timeline is revalidated and every stored entry is checked against
/// `catalog`, so a document from an older catalog fails loudly instead of
/// producing orphan data.
pub fn load_pipeline(
    filename: impl AsRef<Path>,
    catalog: Arc<Catalog>,
    expected: PipelineType,
) -> Result<Pipeline, LoadError> {
    let file = File::open(filename.as_ref())?;
    let decoder = GzDecoder::new(file);
    let reader = BufReader::new(decoder);

    let document: PipelineDocument = serde_json::from_reader(reader)?;
    if document.pipeline_type != expected {
        return Err(LoadError::PipelineMismatch {
            expected,
            found: document.pipeline_type,
        });
    }

    let timeline = Timeline::with_config(expected, document.timeline)?;
    let mut cells = CellStore::new(Arc::clone(&catalog), timeline.cell_count());
    cells.restore(document.cells)?;

    log::info!(
        "loaded {expected} pipeline ({} cells) from {}",
        cells.len(),
        filename.as_ref().display()
    );
    Ok(Pipeline::from_parts(catalog, timeline, cells))
}
