//! Record resolution.
//!
//! [`resolve`] walks the catalog's cached evaluation order once. Every field
//! is visited after the fields it reads, so visibility predicates and
//! formulas always see their inputs already settled.

use crate::catalog::Catalog;
use crate::field::{FieldKind, Record, Value};

/// Resolve `record` against `catalog`.
///
/// * fields whose visibility rule fails are dropped from the result
///   (storage is untouched; this is a view),
/// * computed fields are (re)computed, inputs the record lacks read as the
///   neutral value of their formula,
/// * stored values for computed fields and ids unknown to the catalog are
///   discarded.
///
/// Output order follows the evaluation order.
pub fn resolve(catalog: &Catalog, record: &Record) -> Record {
    let mut resolved = Record::new();
    for id in catalog.evaluation_order() {
        let Some(field) = catalog.get_field(id.as_str()) else {
            continue;
        };
        if !catalog.is_visible(field, &resolved) {
            continue;
        }
        match &field.kind {
            FieldKind::Computed(computation) => {
                let value = (computation.compute)(&resolved);
                resolved.insert(id.clone(), value);
            }
            _ => {
                if let Some(value) = record.get(id.as_str()) {
                    resolved.insert(id.clone(), value.clone());
                }
            }
        }
    }
    log::debug!("resolved {} of {} stored fields", resolved.len(), record.len());
    resolved
}

/// Resolved value of one field, if it is visible and set.
pub fn resolve_field(catalog: &Catalog, record: &Record, id: &str) -> Option<Value> {
    resolve(catalog, record).get(id).cloned()
}
