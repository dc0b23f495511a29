use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;

use review_pipeline::preset::{backup_key, storage_key};
use review_pipeline::{
    Catalog, FieldId, KeyValueStore, MemoryStore, Pipeline, PipelineType, Preset, PresetError,
    PresetId, PresetStore, StoreError, Value,
};

/// Store whose writes always fail.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn read(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn write(&self, key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(format!("quota exceeded writing {key}")))
    }
}

/// Wraps a store and fails its first read.
struct FlakyStore {
    inner: MemoryStore,
    failed: AtomicBool,
}

impl KeyValueStore for FlakyStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("timed out reading {key}")));
        }
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.write(key, value)
    }
}

fn culture() -> Catalog {
    Catalog::builtin(PipelineType::Culture).unwrap()
}

fn open(backing: &MemoryStore, catalog: &Catalog) -> PresetStore {
    PresetStore::open(PipelineType::Culture, Box::new(backing.clone()), catalog).unwrap()
}

fn water(catalog: &Catalog, ph: f64) -> IndexMap<FieldId, Value> {
    [
        (catalog.field_id("waterPH").unwrap(), Value::from(ph)),
        (catalog.field_id("waterEC").unwrap(), Value::from(1.2)),
    ]
    .into_iter()
    .collect()
}

fn names(presets: &PresetStore) -> Vec<&str> {
    presets.list(None).iter().map(|p| p.name.as_str()).collect()
}

#[test]
fn duplicate_names_are_refused_within_a_group() {
    let catalog = culture();
    let mut presets = open(&MemoryStore::new(), &catalog);

    let persisted = presets
        .save(Preset::new("Standard", "irrigation", water(&catalog, 6.2)))
        .unwrap();
    assert!(persisted.is_clean());
    let err = presets
        .save(Preset::new("Standard", "irrigation", water(&catalog, 5.8)))
        .unwrap_err();
    assert_eq!(
        err,
        PresetError::DuplicateName {
            name: "Standard".to_string(),
            group: "irrigation".to_string(),
        }
    );
    assert!(err.user_message().contains("Standard"));
    assert_eq!(presets.len(), 1);
    assert_eq!(
        presets.list(None)[0].fields[&catalog.field_id("waterPH").unwrap()],
        Value::from(6.2)
    );

    // same name in another group is fine
    let persisted = presets
        .save(Preset::new("Standard", "fertilizer", water(&catalog, 6.0)))
        .unwrap();
    assert!(persisted.is_clean());
    assert_eq!(presets.len(), 2);
    assert_eq!(presets.groups(), vec!["irrigation", "fertilizer"]);
    assert_eq!(presets.list(Some("fertilizer")).len(), 1);
}

#[test]
fn saving_a_known_id_updates_in_place() {
    let catalog = culture();
    let mut presets = open(&MemoryStore::new(), &catalog);
    let first = Preset::new("Low pH", "irrigation", water(&catalog, 5.6));
    let id = first.id;
    let created = first.created_at;
    assert!(presets.save(first).unwrap().is_clean());
    assert!(presets
        .save(Preset::new("High pH", "irrigation", water(&catalog, 7.0)))
        .unwrap()
        .is_clean());

    let mut edited = presets.get(id).unwrap().clone();
    edited.name = "Acidic".to_string();
    edited.fields = water(&catalog, 5.5);
    assert!(presets.save(edited).unwrap().is_clean());

    assert_eq!(names(&presets), vec!["Acidic", "High pH"]);
    let stored = presets.get(id).unwrap();
    assert_eq!(stored.created_at, created);
    assert!(stored.updated_at >= created);

    let mut clash = presets.get(id).unwrap().clone();
    clash.name = "High pH".to_string();
    assert_eq!(presets.save(clash).unwrap_err().code(), "duplicate_name");
}

#[test]
fn names_are_trimmed_and_required() {
    let catalog = culture();
    let mut presets = open(&MemoryStore::new(), &catalog);
    assert_eq!(
        presets.save(Preset::new("   ", "irrigation", water(&catalog, 6.0))).unwrap_err(),
        PresetError::EmptyName
    );
    let persisted = presets
        .save(Preset::new("  Spaced  ", "irrigation", water(&catalog, 6.0)))
        .unwrap();
    assert!(persisted.is_clean());
    assert!(presets.find_by_name("irrigation", "Spaced").is_some());
}

#[test]
fn deleting_an_unknown_id_is_a_no_op() {
    let catalog = culture();
    let mut presets = open(&MemoryStore::new(), &catalog);
    let preset = Preset::new("Standard", "irrigation", water(&catalog, 6.2));
    let id = preset.id;
    assert!(presets.save(preset).unwrap().is_clean());

    assert!(presets.delete(PresetId::new()).is_clean());
    assert_eq!(presets.len(), 1);
    assert!(presets.delete(id).is_clean());
    assert!(presets.is_empty());
}

#[test]
fn presets_persist_under_the_pipeline_key() {
    let catalog = culture();
    let backing = MemoryStore::new();
    let mut presets = open(&backing, &catalog);
    let persisted = presets
        .save(Preset::new("Standard", "irrigation", water(&catalog, 6.2)))
        .unwrap();
    assert!(persisted.is_clean());

    assert_eq!(storage_key(PipelineType::Culture), "culturePipelinePresets");
    let json = backing.read("culturePipelinePresets").unwrap().unwrap();
    assert!(json.contains("\"groupId\":\"irrigation\""));
    assert!(json.contains("\"waterPH\":6.2"));
    assert_eq!(backing.read("curingPipelinePresets").unwrap(), None);

    let reopened = open(&backing, &catalog);
    assert_eq!(reopened.list(None), presets.list(None));
}

#[test]
fn storage_failures_keep_the_change_in_memory() {
    let catalog = culture();
    let mut presets =
        PresetStore::open(PipelineType::Culture, Box::new(BrokenStore), &catalog).unwrap();
    let persisted = presets
        .save(Preset::new("Standard", "irrigation", water(&catalog, 6.2)))
        .unwrap();
    assert!(matches!(persisted.warning, Some(StoreError::Unavailable(_))));
    assert_eq!(presets.len(), 1);
}

#[test]
fn a_failed_read_does_not_overwrite_stored_presets() {
    let catalog = culture();
    let backing = MemoryStore::new();
    let mut presets = open(&backing, &catalog);
    for (name, ph) in [("A", 5.8), ("B", 6.0), ("C", 6.2)] {
        assert!(presets
            .save(Preset::new(name, "irrigation", water(&catalog, ph)))
            .unwrap()
            .is_clean());
    }

    let flaky = FlakyStore {
        inner: backing.clone(),
        failed: AtomicBool::new(false),
    };
    let err = PresetStore::open(PipelineType::Culture, Box::new(flaky), &catalog)
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::Unavailable(_)));

    // a later open succeeds and a save keeps everything already stored
    let mut presets = open(&backing, &catalog);
    assert!(presets
        .save(Preset::new("D", "irrigation", water(&catalog, 6.4)))
        .unwrap()
        .is_clean());
    assert_eq!(names(&open(&backing, &catalog)), vec!["A", "B", "C", "D"]);
}

#[test]
fn reopening_drops_fields_the_catalog_no_longer_has() {
    let catalog = culture();
    let backing = MemoryStore::new();
    backing
        .write(
            "culturePipelinePresets",
            r#"[{"id":"5d0a4f4e-3c1b-4d5e-9f6a-1b2c3d4e5f60","name":"Old","groupId":"irrigation",
                "fields":{"waterPH":6.0,"retiredField":3,"vpd":1.1},
                "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}]"#,
        )
        .unwrap();

    let presets = open(&backing, &catalog);
    let preset = presets.find_by_name("irrigation", "Old").unwrap();
    let kept: Vec<&str> = preset.fields.keys().map(|id| id.as_str()).collect();
    assert_eq!(kept, vec!["waterPH"]);
    assert_eq!(backing.read(&backup_key(PipelineType::Culture)).unwrap(), None);
}

#[test]
fn corrupt_storage_is_backed_up_before_opening_empty() {
    let catalog = culture();
    let backing = MemoryStore::new();
    backing.write("culturePipelinePresets", "not json").unwrap();

    let presets = open(&backing, &catalog);
    assert!(presets.is_empty());
    assert_eq!(
        backing.read("culturePipelinePresets.corrupt").unwrap().as_deref(),
        Some("not json")
    );
}

#[test]
fn one_bad_entry_does_not_cost_the_others() {
    let catalog = culture();
    let backing = MemoryStore::new();
    let stored = r#"[
        {"id":"5d0a4f4e-3c1b-4d5e-9f6a-1b2c3d4e5f60","name":"Good","groupId":"irrigation",
         "fields":{"waterPH":6.0},
         "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"},
        {"id":"6e1b5a5f-4d2c-4e6f-8a7b-2c3d4e5f6a71","name":"Bad","groupId":"irrigation",
         "fields":{"waterPH":null},
         "createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}
    ]"#;
    backing.write("culturePipelinePresets", stored).unwrap();

    let presets = open(&backing, &catalog);
    assert_eq!(names(&presets), vec!["Good"]);
    assert_eq!(
        backing.read(&backup_key(PipelineType::Culture)).unwrap().as_deref(),
        Some(stored)
    );
}

#[test]
fn hidden_fields_are_not_captured() {
    let mut pipeline = Pipeline::new(PipelineType::Culture).unwrap();
    pipeline.set_value(0, "propagation", Some(Value::from("clone"))).unwrap();
    pipeline.set_value(0, "germinationMethod", Some(Value::from("paper"))).unwrap();

    let preset = pipeline.capture_preset(0, "Clones", "start", &[]).unwrap();
    let captured: Vec<&str> = preset.fields.keys().map(|id| id.as_str()).collect();
    assert_eq!(captured, vec!["propagation"]);

    let err = pipeline
        .capture_preset(0, "Germination", "start", &["germinationMethod"])
        .unwrap_err();
    assert_eq!(err.to_string(), "no data to capture from the selected fields");

    // the value is still held and comes back once the rule holds
    pipeline.set_value(0, "propagation", Some(Value::from("seed"))).unwrap();
    let preset = pipeline.capture_preset(0, "Seeds", "start", &[]).unwrap();
    assert!(preset.fields.contains_key("germinationMethod"));
}
