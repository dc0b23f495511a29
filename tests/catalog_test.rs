use review_pipeline::field::Record;
use review_pipeline::{
    Catalog, CatalogError, FieldDefinition, FieldKind, PipelineType, Section, Value, resolve,
};

fn sum(record: &Record) -> Value {
    Value::Number(record.number_or_zero("a") + record.number_or_zero("b"))
}

fn double(record: &Record) -> Value {
    Value::Number(record.number_or_zero("c") * 2.0)
}

fn always(_: &Record) -> bool {
    true
}

#[test]
fn builtin_catalogs_load() {
    for pipeline in PipelineType::ALL {
        let catalog = Catalog::builtin(pipeline).unwrap();
        assert!(!catalog.is_empty());
        assert_eq!(catalog.len(), catalog.fields().count());
    }

    let culture = Catalog::builtin(PipelineType::Culture).unwrap();
    let sections: Vec<&str> = culture.list_sections().iter().map(|s| s.id).collect();
    assert_eq!(sections.first(), Some(&"general"));
    assert_eq!(sections.last(), Some(&"harvest"));
    assert_eq!(culture.field_by_label("VPD").unwrap().id.as_str(), "vpd");
}

#[test]
fn duplicate_ids_are_rejected() {
    let sections = vec![
        Section::new("one", "One", vec![FieldDefinition::new("a", "A", FieldKind::number())]),
        Section::new("two", "Two", vec![FieldDefinition::new("a", "Other A", FieldKind::number())]),
    ];
    assert_eq!(
        Catalog::load(sections).unwrap_err(),
        CatalogError::DuplicateField("a".to_string())
    );
}

#[test]
fn duplicate_labels_are_rejected() {
    let sections = vec![Section::new(
        "one",
        "One",
        vec![
            FieldDefinition::new("a", "Same", FieldKind::number()),
            FieldDefinition::new("b", "Same", FieldKind::number()),
        ],
    )];
    assert_eq!(Catalog::load(sections).unwrap_err().code(), "duplicate_label");
}

#[test]
fn unknown_references_are_rejected() {
    let sections = vec![Section::new(
        "one",
        "One",
        vec![
            FieldDefinition::new("a", "A", FieldKind::number()),
            FieldDefinition::new("total", "Total", FieldKind::computed(&["a", "b"], sum)),
        ],
    )];
    assert_eq!(
        Catalog::load(sections).unwrap_err(),
        CatalogError::UnknownReference {
            field: "total".to_string(),
            reference: "b".to_string(),
        }
    );

    let sections = vec![Section::new(
        "one",
        "One",
        vec![FieldDefinition::new("a", "A", FieldKind::number()).visible_when("missing", always)],
    )];
    assert_eq!(Catalog::load(sections).unwrap_err().code(), "unknown_reference");
}

#[test]
fn computation_cycles_are_rejected() {
    let sections = vec![Section::new(
        "one",
        "One",
        vec![
            FieldDefinition::new("a", "A", FieldKind::computed(&["b"], sum)),
            FieldDefinition::new("b", "B", FieldKind::computed(&["c"], double)),
            FieldDefinition::new("c", "C", FieldKind::computed(&["a"], sum)),
        ],
    )];
    match Catalog::load(sections).unwrap_err() {
        CatalogError::Cycle(path) => {
            assert!(path.len() >= 3);
            assert_eq!(path.first(), path.last());
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn chained_computations_follow_their_inputs() {
    let sections = vec![Section::new(
        "one",
        "One",
        vec![
            FieldDefinition::new("d", "Doubled", FieldKind::computed(&["c"], double)),
            FieldDefinition::new("c", "Sum", FieldKind::computed(&["a", "b"], sum)),
            FieldDefinition::new("a", "A", FieldKind::number()),
            FieldDefinition::new("b", "B", FieldKind::number()),
        ],
    )];
    let catalog = Catalog::load(sections).unwrap();
    let order: Vec<&str> = catalog.evaluation_order().iter().map(|id| id.as_str()).collect();
    let position = |id: &str| order.iter().position(|o| *o == id).unwrap();
    assert!(position("a") < position("c"));
    assert!(position("c") < position("d"));

    let record = catalog.record([("a", 2.0), ("b", 3.0)]).unwrap();
    let resolved = resolve(&catalog, &record);
    assert_eq!(resolved.number("c"), Some(5.0));
    assert_eq!(resolved.number("d"), Some(10.0));
}

#[test]
fn germination_is_visible_only_from_seed() {
    let catalog = Catalog::builtin(PipelineType::Culture).unwrap();
    let germination = catalog.get_field("germinationMethod").unwrap();

    let seed = catalog.record([("propagation", "seed")]).unwrap();
    let clone = catalog.record([("propagation", "clone")]).unwrap();
    assert!(catalog.is_visible(germination, &seed));
    assert!(!catalog.is_visible(germination, &clone));
    assert!(!catalog.is_visible(germination, &Record::new()));

    let affected = catalog.affected_by("propagation");
    assert!(affected.contains("germinationMethod"));
    assert!(affected.contains("seedType"));
}

#[test]
fn records_reject_unknown_and_invalid_values() {
    let catalog = Catalog::builtin(PipelineType::Culture).unwrap();
    assert_eq!(
        catalog.record([("nope", 1.0)]).unwrap_err().code(),
        "unknown_field"
    );
    assert_eq!(
        catalog.record([("waterPH", 9.5)]).unwrap_err().code(),
        "out_of_bounds"
    );
    assert_eq!(
        catalog.record([("vpd", 1.0)]).unwrap_err().code(),
        "computed_field"
    );
}
