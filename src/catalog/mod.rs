//! Field catalog: the static schema every cell record is checked against.
//!
//! A catalog is built from ordered [`Section`]s and validated once by
//! [`Catalog::load`]. Loading rejects authoring mistakes (bad or duplicate
//! ids, unknown references, cyclic formulas) and caches the evaluation order
//! used by [`crate::evaluator::resolve`].

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use crate::errors::{CatalogError, ValueError};
use crate::field::{FieldDefinition, FieldId, Record, Value};
use crate::graph::DependencyGraph;
use crate::timeline::PipelineType;

pub mod culture;
pub mod curing;

lazy_static! {
    static ref FIELD_ID_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();
}

/// Named, ordered group of fields.
#[derive(Clone, Debug)]
pub struct Section {
    pub id: &'static str,
    pub label: &'static str,
    pub collapsed: bool,
    pub fields: Vec<FieldDefinition>,
}

impl Section {
    pub fn new(id: &'static str, label: &'static str, fields: Vec<FieldDefinition>) -> Self {
        Section {
            id,
            label,
            collapsed: false,
            fields,
        }
    }

    pub fn collapsed(mut self) -> Self {
        self.collapsed = true;
        self
    }
}

#[derive(Debug)]
pub struct Catalog {
    sections: Vec<Section>,
    /// id -> (section index, field index)
    index: HashMap<String, (usize, usize)>,
    labels: HashMap<&'static str, (usize, usize)>,
    order: Vec<FieldId>,
    graph: DependencyGraph,
}

impl Catalog {
    pub fn load(sections: Vec<Section>) -> Result<Self, CatalogError> {
        let mut index = HashMap::new();
        let mut labels = HashMap::new();
        let mut graph = DependencyGraph::new();

        for (s, section) in sections.iter().enumerate() {
            for (f, field) in section.fields.iter().enumerate() {
                let id = field.id.as_str();
                if !FIELD_ID_RE.is_match(id) {
                    return Err(CatalogError::InvalidFieldId(id.to_string()));
                }
                if !graph.add_node(id) {
                    return Err(CatalogError::DuplicateField(id.to_string()));
                }
                if labels.insert(field.label, (s, f)).is_some() {
                    return Err(CatalogError::DuplicateLabel(field.label.to_string()));
                }
                index.insert(id.to_string(), (s, f));
                check_definition(field)?;
            }
        }

        for field in sections.iter().flat_map(|s| s.fields.iter()) {
            for dep in field.dependencies() {
                graph.add_edge(field.id.as_str(), dep)?;
            }
        }

        let order = graph
            .topo_sort()?
            .into_iter()
            .map(FieldId::new)
            .collect::<Vec<_>>();

        log::debug!(
            "catalog loaded: {} sections, {} fields",
            sections.len(),
            order.len()
        );

        Ok(Catalog {
            sections,
            index,
            labels,
            order,
            graph,
        })
    }

    /// The catalog shipped for a pipeline type.
    pub fn builtin(pipeline: PipelineType) -> Result<Self, CatalogError> {
        match pipeline {
            PipelineType::Culture => Catalog::load(culture::sections()),
            PipelineType::Curing => Catalog::load(curing::sections()),
        }
    }

    pub fn list_sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn get_field(&self, id: &str) -> Option<&FieldDefinition> {
        self.index
            .get(id)
            .map(|&(s, f)| &self.sections[s].fields[f])
    }

    pub fn field_by_label(&self, label: &str) -> Option<&FieldDefinition> {
        self.labels
            .get(label)
            .map(|&(s, f)| &self.sections[s].fields[f])
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checked handle for `id`. Fails for ids the catalog does not define.
    pub fn field_id(&self, id: &str) -> Result<FieldId, ValueError> {
        self.get_field(id)
            .map(|field| field.id.clone())
            .ok_or_else(|| ValueError::UnknownField(id.to_string()))
    }

    /// Fields without a visibility rule are always visible.
    pub fn is_visible(&self, field: &FieldDefinition, record: &Record) -> bool {
        match &field.visible_when {
            Some(rule) => (rule.when)(record),
            None => true,
        }
    }

    /// Inputs before readers; cached at load time.
    pub fn evaluation_order(&self) -> &[FieldId] {
        &self.order
    }

    /// Fields whose value or visibility can change when `id` changes.
    pub fn affected_by(&self, id: &str) -> BTreeSet<String> {
        self.graph.dependents_of(id)
    }

    /// Check that `value` may be stored against `id`.
    pub fn check_value(&self, id: &str, value: &Value) -> Result<FieldId, ValueError> {
        let field = self
            .get_field(id)
            .ok_or_else(|| ValueError::UnknownField(id.to_string()))?;
        field.kind.validate(&field.id, value)?;
        Ok(field.id.clone())
    }

    /// Build a record from raw `(id, value)` pairs, validating each entry.
    pub fn record<I, K, V>(&self, entries: I) -> Result<Record, ValueError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Record::new();
        for (id, value) in entries {
            let value = value.into();
            let id = self.check_value(id.as_ref(), &value)?;
            record.insert(id, value);
        }
        Ok(record)
    }
}

fn check_definition(field: &FieldDefinition) -> Result<(), CatalogError> {
    let malformed = |reason: String| CatalogError::MalformedConstraints {
        field: field.id.to_string(),
        reason,
    };
    field.kind.check_constraints().map_err(malformed)?;
    if let Some(default) = &field.default {
        if field.is_computed() {
            return Err(malformed("computed fields take no default".to_string()));
        }
        field
            .kind
            .validate(&field.id, default)
            .map_err(|e| malformed(format!("default rejected: {e}")))?;
    }
    Ok(())
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `numerator / denominator`, or 0 when the denominator is zero.
pub(crate) fn ratio(numerator: f64, denominator: f64, decimals: i32) -> Value {
    if denominator == 0.0 {
        return Value::Number(0.0);
    }
    Value::Number(round_to(numerator / denominator, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;

    fn plain(id: &'static str, label: &'static str) -> FieldDefinition {
        FieldDefinition::new(id, label, FieldKind::number())
    }

    #[test]
    fn rounding_matches_fixed_decimals() {
        assert_eq!(round_to(1.193_67, 2), 1.19);
        assert_eq!(round_to(2.879_999_9, 2), 2.88);
        assert_eq!(round_to(0.125, 1), 0.1);
    }

    #[test]
    fn ids_must_be_identifiers() {
        let sections = vec![Section::new("s", "S", vec![plain("bad id", "Bad")])];
        assert_eq!(
            Catalog::load(sections).unwrap_err(),
            CatalogError::InvalidFieldId("bad id".to_string())
        );
    }

    #[test]
    fn defaults_are_checked_against_their_kind() {
        let field = FieldDefinition::new("t", "T", FieldKind::slider(0.0, 10.0, 1.0))
            .default_value(50.0);
        let err = Catalog::load(vec![Section::new("s", "S", vec![field])]).unwrap_err();
        assert_eq!(err.code(), "malformed_constraints");
    }
}
