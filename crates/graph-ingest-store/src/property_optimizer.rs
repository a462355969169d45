use std::collections::{BTreeMap, BTreeSet, HashMap};

use graph_ingest_types::{Entity, PropertyMap, PropertyValue};

/// Default number of properties above which a property map is compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 16;

/// Configures the three independent storage-optimisation switches described
/// in §4.2: sparse storage, compression, and property indexing. Each switch
/// only changes *how* properties are stored on write/read — never which
/// properties exist from the caller's point of view (sparse storage aside,
/// which is explicitly allowed to drop nulls per I2).
#[derive(Debug, Clone)]
pub struct PropertyOptimizerConfig {
    pub sparse_storage: bool,
    pub compression: bool,
    pub compression_threshold: usize,
    pub indexed_keys: BTreeSet<String>,
}

impl Default for PropertyOptimizerConfig {
    fn default() -> Self {
        Self {
            sparse_storage: false,
            compression: false,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            indexed_keys: BTreeSet::new(),
        }
    }
}

/// A property map as it is actually written to a backend: either materialised
/// (the common case) or compressed into a small header-tagged blob once the
/// property count exceeds the configured threshold.
#[derive(Debug, Clone)]
pub enum StoredProperties {
    Materialized(PropertyMap),
    Compressed(CompressedProperties),
}

/// A compact encoding of a property map. The header identifies the encoding so
/// a future format change stays self-describing; today the only encoding is
/// `json-utf8`, chosen because it round-trips every [`PropertyValue`] variant
/// losslessly and needs no extra dependency beyond `serde_json`, which the
/// rest of the workspace already pulls in.
#[derive(Debug, Clone)]
pub struct CompressedProperties {
    pub encoding: &'static str,
    pub blob: Vec<u8>,
}

const JSON_ENCODING: &str = "json-utf8";

/// Applies sparse-storage and compression policy to a property map on write,
/// and owns the property-value inverted index used to answer
/// `get_entities_by_property` in O(1 + hit) for indexed keys.
#[derive(Debug, Default)]
pub struct PropertyOptimizer {
    config: PropertyOptimizerConfig,
    index: HashMap<String, HashMap<String, BTreeSet<String>>>,
}

impl PropertyOptimizer {
    #[must_use]
    pub fn new(config: PropertyOptimizerConfig) -> Self {
        Self {
            config,
            index: HashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PropertyOptimizerConfig {
        &self.config
    }

    /// Apply sparse-storage filtering, then compress if the result exceeds
    /// the configured threshold.
    #[must_use]
    pub fn encode(&self, properties: &PropertyMap) -> StoredProperties {
        let filtered = if self.config.sparse_storage {
            properties
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<PropertyMap>()
        } else {
            properties.clone()
        };

        if self.config.compression && filtered.len() > self.config.compression_threshold {
            let json = serde_json::to_vec(
                &filtered
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<serde_json::Map<_, _>>(),
            )
            .unwrap_or_default();
            StoredProperties::Compressed(CompressedProperties {
                encoding: JSON_ENCODING,
                blob: json,
            })
        } else {
            StoredProperties::Materialized(filtered)
        }
    }

    /// Materialise a [`StoredProperties`] back into a plain property map.
    #[must_use]
    pub fn decode(stored: &StoredProperties) -> PropertyMap {
        match stored {
            StoredProperties::Materialized(map) => map.clone(),
            StoredProperties::Compressed(blob) => {
                let value: serde_json::Value =
                    serde_json::from_slice(&blob.blob).unwrap_or(serde_json::Value::Null);
                match value {
                    serde_json::Value::Object(map) => map
                        .into_iter()
                        .map(|(k, v)| (k, PropertyValue::from_json(v)))
                        .collect(),
                    _ => PropertyMap::new(),
                }
            }
        }
    }

    /// Declare `key` as indexed, going forward, and rebuild the index from
    /// `existing_entities` by scanning them once — per §4.2, adding an index
    /// after entities already exist requires exactly this rebuild-by-scan.
    pub fn add_index(&mut self, key: impl Into<String>, existing_entities: &[Entity]) {
        let key = key.into();
        self.config.indexed_keys.insert(key.clone());
        let mut bucket: HashMap<String, BTreeSet<String>> = HashMap::new();
        for entity in existing_entities {
            if let Some(value) = entity.properties.get(&key) {
                if let Some(text) = property_index_key(value) {
                    bucket.entry(text).or_default().insert(entity.id.clone());
                }
            }
        }
        self.index.insert(key, bucket);
    }

    pub fn is_indexed(&self, key: &str) -> bool {
        self.config.indexed_keys.contains(key)
    }

    /// Record `entity`'s indexed properties. Must be called under the same
    /// lock as the entity write itself (§5): the index and the entity store
    /// must never observe a write out of order.
    pub fn observe_write(&mut self, entity: &Entity) {
        for key in self.config.indexed_keys.clone() {
            if let Some(value) = entity.properties.get(&key) {
                if let Some(text) = property_index_key(value) {
                    self.index
                        .entry(key)
                        .or_default()
                        .entry(text)
                        .or_default()
                        .insert(entity.id.clone());
                }
            }
        }
    }

    /// Look up entity ids whose `key` property equals `value`. Returns `None`
    /// if `key` is not indexed (the caller should fall back to a linear scan
    /// or fail with `UnsupportedQueryError`, per §4.2).
    #[must_use]
    pub fn lookup(&self, key: &str, value: &PropertyValue) -> Option<BTreeSet<String>> {
        if !self.is_indexed(key) {
            return None;
        }
        let text = property_index_key(value)?;
        Some(
            self.index
                .get(key)
                .and_then(|bucket| bucket.get(&text))
                .cloned()
                .unwrap_or_default(),
        )
    }
}

fn property_index_key(value: &PropertyValue) -> Option<String> {
    value.display_string()
}

#[cfg(test)]
mod tests {
    use graph_ingest_types::PropertyMap;

    use super::*;

    fn props(pairs: &[(&str, PropertyValue)]) -> PropertyMap {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn sparse_storage_drops_null_values() {
        let optimizer = PropertyOptimizer::new(PropertyOptimizerConfig {
            sparse_storage: true,
            ..Default::default()
        });
        let input = props(&[
            ("name", PropertyValue::from("Alice")),
            ("nickname", PropertyValue::Null),
        ]);
        let StoredProperties::Materialized(out) = optimizer.encode(&input) else {
            panic!("expected materialized output");
        };
        assert!(!out.contains_key("nickname"));
        assert_eq!(out.get("name"), Some(&PropertyValue::from("Alice")));
    }

    #[test]
    fn compression_round_trips_above_threshold() {
        let optimizer = PropertyOptimizer::new(PropertyOptimizerConfig {
            compression: true,
            compression_threshold: 1,
            ..Default::default()
        });
        let input = props(&[
            ("a", PropertyValue::from(1_i64)),
            ("b", PropertyValue::from(2_i64)),
        ]);
        let stored = optimizer.encode(&input);
        assert!(matches!(stored, StoredProperties::Compressed(_)));
        assert_eq!(PropertyOptimizer::decode(&stored), input);
    }

    #[test]
    fn index_rebuild_then_lookup() {
        let mut optimizer = PropertyOptimizer::new(PropertyOptimizerConfig::default());
        let entities = vec![
            Entity::new("1", "Person").with_properties(props(&[("name", PropertyValue::from("Alice"))])),
            Entity::new("2", "Person").with_properties(props(&[("name", PropertyValue::from("Bob"))])),
        ];
        optimizer.add_index("name", &entities);
        let hits = optimizer
            .lookup("name", &PropertyValue::from("Alice"))
            .expect("name is indexed");
        assert_eq!(hits.len(), 1);
        assert!(hits.contains("1"));
        assert!(optimizer.lookup("unindexed", &PropertyValue::from("x")).is_none());
    }
}
