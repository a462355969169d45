//! The fusion layer shared by both pipelines: entity deduplication (§4.4),
//! entity linking against the existing graph (§4.5), relation deduplication
//! (§4.6), and schema-based relation validation (§4.7).

mod dedup;
mod linker;
mod relation_dedup;
mod relation_validator;
mod similarity;

pub use self::{
    dedup::{DedupConfig, DedupStats, EntityDeduplicator},
    linker::{EntityLinker, LinkQueryError, LinkResult, LinkerConfig},
    relation_dedup::RelationDeduplicator,
    relation_validator::{RelationRejection, RelationValidator},
    similarity::{ExactCanonicalName, JaroWinklerSimilarity, NameSimilarity},
};
