use std::sync::Arc;

use review_pipeline::cell::UNDO_LIMIT;
use review_pipeline::{
    Assignment, Catalog, CellError, CellStore, PipelineType, TimelineError, Value, ValueError,
};

fn store(capacity: usize) -> CellStore {
    let catalog = Arc::new(Catalog::builtin(PipelineType::Culture).unwrap());
    CellStore::new(catalog, capacity)
}

#[test]
fn setting_the_same_value_twice_changes_nothing() {
    let mut cells = store(10);
    cells.set_value(2, "waterPH", Some(Value::from(6.2))).unwrap();
    let snapshot = cells.get_content(2).unwrap().clone();
    let history = cells.history_len();

    cells.set_value(2, "waterPH", Some(Value::from(6.2))).unwrap();
    assert_eq!(cells.get_content(2).unwrap(), &snapshot);
    assert_eq!(cells.history_len(), history);
}

#[test]
fn removing_the_last_entry_prunes_the_cell() {
    let mut cells = store(10);
    cells.set_value(4, "waterEC", Some(Value::from(1.4))).unwrap();
    assert_eq!(cells.populated_indices(), vec![4]);

    cells.remove_entry(4, "waterEC").unwrap();
    assert!(cells.is_empty());
    assert!(cells.get_content(4).unwrap().is_empty());

    cells.set_notes(4, "topped today").unwrap();
    assert_eq!(cells.len(), 1);
    cells.set_notes(4, "").unwrap();
    assert!(cells.is_empty());
}

#[test]
fn catalog_entries_start_from_their_default() {
    let mut cells = store(10);
    assert_eq!(cells.add_catalog_entry(0, "waterPH").unwrap(), Assignment::Added);
    assert_eq!(cells.get_content(0).unwrap().value("waterPH"), Some(&Value::from(6.5)));

    cells.set_value(0, "waterPH", Some(Value::from(5.8))).unwrap();
    assert_eq!(
        cells.add_catalog_entry(0, "waterPH").unwrap(),
        Assignment::AlreadyAssigned
    );
    assert_eq!(cells.get_content(0).unwrap().value("waterPH"), Some(&Value::from(5.8)));

    assert_eq!(cells.add_catalog_entry(0, "waterType").unwrap(), Assignment::Added);
    let content = cells.get_content(0).unwrap();
    assert!(content.has_field("waterType"));
    assert_eq!(content.value("waterType"), None);
}

#[test]
fn computed_and_unknown_fields_are_refused() {
    let mut cells = store(10);
    assert_eq!(
        cells.set_value(0, "vpd", Some(Value::from(1.0))),
        Err(CellError::Value(ValueError::Computed("vpd".to_string())))
    );
    assert_eq!(
        cells.add_catalog_entry(0, "surfaceAuSol").unwrap_err().code(),
        "computed_field"
    );
    assert_eq!(
        cells.set_value(0, "unknown", Some(Value::from(1.0))).unwrap_err().code(),
        "unknown_field"
    );
    assert!(cells.is_empty());
    assert_eq!(cells.history_len(), 0);
}

#[test]
fn indices_outside_the_timeline_are_errors() {
    let mut cells = store(3);
    assert_eq!(
        cells.set_value(3, "waterPH", Some(Value::from(6.0))),
        Err(CellError::Timeline(TimelineError::CellOutOfRange { index: 3, count: 3 }))
    );
    assert!(cells.get_content(3).is_err());
}

#[test]
fn undo_reverts_one_operation_at_a_time() {
    let mut cells = store(10);
    cells.set_value(1, "waterPH", Some(Value::from(6.0))).unwrap();
    cells.set_value(1, "waterPH", Some(Value::from(6.4))).unwrap();

    assert_eq!(cells.undo(), Some(vec![1]));
    assert_eq!(cells.get_content(1).unwrap().value("waterPH"), Some(&Value::from(6.0)));
    assert_eq!(cells.undo(), Some(vec![1]));
    assert!(cells.is_empty());
    assert_eq!(cells.undo(), None);
}

#[test]
fn undo_history_is_bounded() {
    let mut cells = store(10);
    for i in 0..(UNDO_LIMIT + 20) {
        cells
            .set_value(0, "waterVolume", Some(Value::from(0.1 + (i % 40) as f64 * 0.1)))
            .unwrap();
    }
    assert!(cells.history_len() <= UNDO_LIMIT);
}

#[test]
fn copy_overwrites_targets_in_one_step() {
    let mut cells = store(10);
    cells.set_value(0, "waterPH", Some(Value::from(6.1))).unwrap();
    cells.set_value(0, "waterEC", Some(Value::from(1.6))).unwrap();
    cells.set_value(3, "waterPH", Some(Value::from(7.0))).unwrap();
    let history = cells.history_len();

    let changed = cells.copy_fields(0, &["waterPH", "waterEC"], &[2, 3, 4]).unwrap();
    assert_eq!(changed, 3);
    assert_eq!(cells.history_len(), history + 1);
    for target in [2, 3, 4] {
        let content = cells.get_content(target).unwrap();
        assert_eq!(content.value("waterPH"), Some(&Value::from(6.1)));
        assert_eq!(content.value("waterEC"), Some(&Value::from(1.6)));
    }

    assert_eq!(cells.copy_fields(0, &["waterPH", "waterEC"], &[2, 3, 4]).unwrap(), 0);

    assert_eq!(cells.undo(), Some(vec![2, 3, 4]));
    assert_eq!(cells.get_content(3).unwrap().value("waterPH"), Some(&Value::from(7.0)));
    assert!(cells.get_content(2).unwrap().is_empty());
}

#[test]
fn resizing_drops_cells_past_the_end() {
    let mut cells = store(10);
    cells.set_value(1, "waterPH", Some(Value::from(6.0))).unwrap();
    cells.set_value(8, "waterPH", Some(Value::from(6.0))).unwrap();

    assert_eq!(cells.resize(5), vec![8]);
    assert_eq!(cells.populated_indices(), vec![1]);
    assert_eq!(cells.undo(), Some(vec![1]));
    assert_eq!(cells.undo(), None);
}
