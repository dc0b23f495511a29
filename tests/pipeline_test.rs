use std::sync::Arc;

use indexmap::IndexMap;
use review_pipeline::saving::{load_pipeline, save_pipeline};
use review_pipeline::{
    Catalog, IntervalType, LoadError, MemoryStore, Pipeline, PipelineType, PresetStore,
    TimelineUpdate, Value,
};

#[test]
fn shrinking_the_timeline_drops_cells_past_the_end() {
    let mut pipeline = Pipeline::new(PipelineType::Culture).unwrap();
    pipeline.set_value(5, "waterPH", Some(Value::from(6.0))).unwrap();
    pipeline.set_value(60, "waterPH", Some(Value::from(6.4))).unwrap();

    let config = pipeline
        .configure(TimelineUpdate::new().interval(IntervalType::Weeks).duration(12))
        .unwrap();
    assert_eq!(config.total_cells, 12);
    assert_eq!(pipeline.cells().populated_indices(), vec![5]);
    assert!(pipeline.content(60).is_err());
    assert_eq!(pipeline.labels().unwrap().len(), 12);
}

#[test]
fn presets_apply_to_many_cells_as_one_undo_step() {
    let mut pipeline = Pipeline::new(PipelineType::Culture).unwrap();
    pipeline.set_value(0, "waterPH", Some(Value::from(6.3))).unwrap();
    pipeline.set_value(0, "waterEC", Some(Value::from(1.5))).unwrap();
    pipeline.set_value(0, "waterType", Some(Value::from("ro"))).unwrap();

    let preset = pipeline
        .capture_preset(0, "RO feed", "irrigation", &["waterPH", "waterEC"])
        .unwrap();
    assert_eq!(preset.fields.len(), 2);

    let mut presets =
        PresetStore::open(PipelineType::Culture, Box::new(MemoryStore::new()), pipeline.catalog())
            .unwrap();
    assert!(presets.save(preset.clone()).unwrap().is_clean());

    assert_eq!(pipeline.apply_preset(&preset, &[1, 2, 3]).unwrap(), 3);
    assert_eq!(pipeline.apply_preset(&preset, &[1, 2, 3]).unwrap(), 0);
    assert_eq!(
        pipeline.content(2).unwrap().value("waterEC"),
        Some(&Value::from(1.5))
    );
    assert!(!pipeline.content(2).unwrap().has_field("waterType"));

    assert_eq!(pipeline.undo(), Some(vec![1, 2, 3]));
    assert_eq!(pipeline.cells().populated_indices(), vec![0]);
}

#[test]
fn capturing_nothing_is_an_error() {
    let pipeline = Pipeline::new(PipelineType::Culture).unwrap();
    let err = pipeline
        .capture_preset(0, "Empty", "irrigation", &[])
        .unwrap_err();
    assert_eq!(err.to_string(), "no data to capture from the selected fields");
}

#[test]
fn bulk_values_are_all_checked_before_any_cell_changes() {
    let mut pipeline = Pipeline::new(PipelineType::Culture).unwrap();
    let mut values = IndexMap::new();
    values.insert("waterPH".to_string(), Value::from(6.0));
    values.insert("waterEC".to_string(), Value::from(9.0));

    assert!(pipeline.apply_values(&values, &[0, 1]).is_err());
    assert!(pipeline.cells().is_empty());

    values.insert("waterEC".to_string(), Value::from(1.0));
    assert_eq!(pipeline.apply_values(&values, &[0, 1]).unwrap(), 2);
    assert!(pipeline.apply_values(&values, &[0, 400]).is_err());
}

#[test]
fn saved_documents_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("culture.json.gz");

    let mut pipeline = Pipeline::new(PipelineType::Culture).unwrap();
    pipeline
        .configure(TimelineUpdate::new().interval(IntervalType::Phases))
        .unwrap();
    pipeline.set_value(3, "plantHeight", Some(Value::from(45.0))).unwrap();
    pipeline.add_catalog_entry(3, "spectrum").unwrap();
    pipeline.set_notes(7, "first pistils").unwrap();
    save_pipeline(&pipeline, &path).unwrap();

    let loaded = load_pipeline(&path, Arc::clone(pipeline.catalog()), PipelineType::Culture).unwrap();
    assert_eq!(loaded.timeline(), pipeline.timeline());
    assert_eq!(loaded.cells().populated_indices(), vec![3, 7]);
    assert_eq!(loaded.content(3).unwrap(), pipeline.content(3).unwrap());
    assert_eq!(loaded.content(7).unwrap().notes(), "first pistils");
    assert_eq!(loaded.labels().unwrap()[3], "Early vegetative");
}

#[test]
fn saved_documents_leave_hidden_values_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clones.json.gz");

    let mut pipeline = Pipeline::new(PipelineType::Culture).unwrap();
    pipeline.set_value(0, "propagation", Some(Value::from("clone"))).unwrap();
    pipeline.set_value(0, "germinationMethod", Some(Value::from("paper"))).unwrap();
    pipeline.set_value(1, "propagation", Some(Value::from("seed"))).unwrap();
    pipeline.set_value(1, "germinationMethod", Some(Value::from("paper"))).unwrap();
    save_pipeline(&pipeline, &path).unwrap();

    let loaded = load_pipeline(&path, Arc::clone(pipeline.catalog()), PipelineType::Culture).unwrap();
    assert!(!loaded.content(0).unwrap().has_field("germinationMethod"));
    assert!(loaded.content(0).unwrap().has_field("propagation"));
    assert_eq!(
        loaded.content(1).unwrap().value("germinationMethod"),
        Some(&Value::from("paper"))
    );
    // still held in memory
    assert!(pipeline.content(0).unwrap().has_field("germinationMethod"));
}

#[test]
fn documents_of_another_pipeline_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curing.json.gz");
    let curing = Pipeline::new(PipelineType::Curing).unwrap();
    save_pipeline(&curing, &path).unwrap();

    let catalog = Arc::new(Catalog::builtin(PipelineType::Culture).unwrap());
    let err = load_pipeline(&path, catalog, PipelineType::Culture).unwrap_err();
    assert!(matches!(
        err,
        LoadError::PipelineMismatch {
            expected: PipelineType::Culture,
            found: PipelineType::Curing,
        }
    ));
}
