use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::cell::CellContent;
use crate::errors::{PresetError, StoreError};
use crate::field::{FieldId, Value};
use crate::storage::KeyValueStore;
use crate::timeline::PipelineType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(Uuid);

impl PresetId {
    pub fn new() -> Self {
        PresetId(Uuid::new_v4())
    }
}

impl Default for PresetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PresetId {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(PresetId)
            .map_err(|_| PresetError::UnknownPreset(s.to_string()))
    }
}

/// Named bundle of field values, reusable across cells and reviews.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: PresetId,
    pub name: String,
    pub group_id: String,
    pub fields: IndexMap<FieldId, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Preset {
    pub fn new(
        name: impl Into<String>,
        group_id: impl Into<String>,
        fields: IndexMap<FieldId, Value>,
    ) -> Self {
        let now = Utc::now();
        Preset {
            id: PresetId::new(),
            name: name.into(),
            group_id: group_id.into(),
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Capture the filled values of `fields` from a cell; all filled values
    /// when `fields` is empty. Fields hidden by their visibility rule are
    /// never captured.
    pub fn from_cell(
        name: impl Into<String>,
        group_id: impl Into<String>,
        content: &CellContent,
        catalog: &Catalog,
        fields: &[&str],
    ) -> Result<Self, PresetError> {
        let captured: IndexMap<FieldId, Value> = content
            .without_hidden(catalog)
            .entries()
            .filter(|(id, _)| fields.is_empty() || fields.contains(&id.as_str()))
            .filter_map(|(id, value)| value.map(|v| (id.clone(), v.clone())))
            .collect();
        if captured.is_empty() {
            return Err(PresetError::NoData);
        }
        Ok(Preset::new(name, group_id, captured))
    }
}

/// Key under which a pipeline type's presets are persisted.
pub fn storage_key(pipeline: PipelineType) -> String {
    format!("{}PipelinePresets", pipeline.as_str())
}

/// Key holding a copy of stored presets that could not be parsed.
pub fn backup_key(pipeline: PipelineType) -> String {
    format!("{}.corrupt", storage_key(pipeline))
}

/// Parse each stored preset on its own so one bad entry does not cost the
/// rest. Returns the presets and the number skipped; text that is not a JSON
/// array counts as one skipped entry.
fn parse_presets(key: &str, text: &str) -> (Vec<Preset>, usize) {
    let entries = match serde_json::from_str::<Vec<serde_json::Value>>(text) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("presets under `{key}` are not a JSON list: {e}");
            return (Vec::new(), 1);
        }
    };
    let mut presets = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match serde_json::from_value::<Preset>(entry) {
            Ok(preset) => presets.push(preset),
            Err(e) => {
                log::warn!("skipping preset under `{key}`: {e}");
                skipped += 1;
            }
        }
    }
    (presets, skipped)
}

/// Outcome of the write that follows a successful mutation. The in-memory
/// change stands either way; `warning` carries a failed write.
#[must_use]
#[derive(Debug)]
pub struct Persisted {
    pub warning: Option<StoreError>,
}

impl Persisted {
    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }
}

/// Presets of one pipeline type, mirrored to a [`KeyValueStore`].
pub struct PresetStore {
    pipeline: PipelineType,
    store: Box<dyn KeyValueStore>,
    presets: Vec<Preset>,
}

impl PresetStore {
    /// Load the persisted list.
    ///
    /// A read failure is returned, since writing over an entry that could
    /// not be read would lose it. Entries that do not parse are skipped, and
    /// the stored text is first copied under [`backup_key`]; if that copy
    /// cannot be written the store is not opened. Fields the catalog does
    /// not define (or computes) are dropped.
    pub fn open(
        pipeline: PipelineType,
        store: Box<dyn KeyValueStore>,
        catalog: &Catalog,
    ) -> Result<Self, StoreError> {
        let key = storage_key(pipeline);
        let mut presets = match store.read(&key)? {
            Some(text) => {
                let (presets, skipped) = parse_presets(&key, &text);
                if skipped > 0 {
                    let backup = backup_key(pipeline);
                    store.write(&backup, &text)?;
                    log::warn!(
                        "skipped {skipped} unreadable preset(s); original kept under `{backup}`"
                    );
                }
                presets
            }
            None => Vec::new(),
        };

        for preset in &mut presets {
            let before = preset.fields.len();
            preset.fields.retain(|id, _| {
                catalog
                    .get_field(id.as_str())
                    .is_some_and(|field| !field.is_computed())
            });
            let dropped = before - preset.fields.len();
            if dropped > 0 {
                log::warn!(
                    "preset \"{}\": dropped {dropped} field(s) unknown to the {pipeline} catalog",
                    preset.name
                );
            }
        }
        log::info!("loaded {} {pipeline} preset(s)", presets.len());

        Ok(PresetStore {
            pipeline,
            store,
            presets,
        })
    }

    pub fn pipeline(&self) -> PipelineType {
        self.pipeline
    }

    /// Insert or update.
    ///
    /// A preset whose id is already stored replaces that entry in place and
    /// keeps its creation time. Otherwise it is appended, unless another
    /// preset in the same group already uses the name.
    pub fn save(&mut self, mut preset: Preset) -> Result<Persisted, PresetError> {
        preset.name = preset.name.trim().to_string();
        if preset.name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        let clash = self.presets.iter().any(|p| {
            p.id != preset.id && p.group_id == preset.group_id && p.name == preset.name
        });
        if clash {
            return Err(PresetError::DuplicateName {
                name: preset.name,
                group: preset.group_id,
            });
        }

        match self.presets.iter().position(|p| p.id == preset.id) {
            Some(i) => {
                preset.created_at = self.presets[i].created_at;
                preset.updated_at = Utc::now();
                log::debug!("updating preset \"{}\"", preset.name);
                self.presets[i] = preset;
            }
            None => {
                log::debug!("adding preset \"{}\"", preset.name);
                self.presets.push(preset);
            }
        }
        Ok(self.persist())
    }

    /// Remove by id. Unknown ids are ignored without touching storage.
    pub fn delete(&mut self, id: PresetId) -> Persisted {
        let before = self.presets.len();
        self.presets.retain(|p| p.id != id);
        if self.presets.len() == before {
            return Persisted { warning: None };
        }
        self.persist()
    }

    /// Presets in creation order, optionally limited to one group.
    pub fn list(&self, group: Option<&str>) -> Vec<&Preset> {
        self.presets
            .iter()
            .filter(|p| group.is_none_or(|g| p.group_id == g))
            .collect()
    }

    pub fn get(&self, id: PresetId) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn find_by_name(&self, group: &str, name: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.group_id == group && p.name == name)
    }

    /// Distinct group ids in first-use order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for preset in &self.presets {
            if !groups.contains(&preset.group_id.as_str()) {
                groups.push(&preset.group_id);
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    fn persist(&self) -> Persisted {
        let key = storage_key(self.pipeline);
        let result = serde_json::to_string(&self.presets)
            .map_err(|source| StoreError::Json {
                key: key.clone(),
                source,
            })
            .and_then(|json| self.store.write(&key, &json));
        match result {
            Ok(()) => Persisted { warning: None },
            Err(e) => {
                log::warn!("presets kept in memory only: {e}");
                Persisted { warning: Some(e) }
            }
        }
    }
}
