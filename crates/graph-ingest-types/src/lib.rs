//! Shared data model for the graph construction pipeline.
//!
//! This crate carries only plain data: [`Entity`], [`Relation`], property
//! values, provenance, and the optional [`GraphSchema`] used by schema-aware
//! validation elsewhere in the workspace. It has no opinion on storage,
//! extraction, or orchestration — those live in the sibling `graph-ingest-*`
//! crates.

mod entity;
mod property;
mod provenance;
mod relation;
mod schema;

pub use self::{
    entity::Entity,
    property::{PropertyMap, PropertyValue},
    provenance::Provenance,
    relation::Relation,
    schema::{EntityTypeSchema, GraphSchema, RelationTypeSchema, ScalarType},
};

/// Normalises a name property value into a canonical dedup/link key: lower-cased,
/// whitespace-collapsed. Shared by `graph-ingest-fusion` (dedup/link) and
/// `graph-ingest-store` (property indexing) so both sides agree on identity.
#[must_use]
pub fn canonical_name_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                key.push(' ');
            }
            last_was_space = true;
        } else {
            key.extend(ch.to_lowercase());
            last_was_space = false;
        }
    }
    key
}
