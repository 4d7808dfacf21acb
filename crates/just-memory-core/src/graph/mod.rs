//! Graph layer: bi-temporal edges, named entities, entity type hierarchy.

mod edges;
mod entities;
mod entity_types;

pub use edges::{Direction, Edge};
pub use entities::{Entity, EntityRelation};
pub use entity_types::{EntityTypeHierarchy, DEFAULT_ENTITY_TYPES};

/// Prefix reserved for contradiction edges.
pub const CONTRADICTION_PREFIX: &str = "contradiction_";

pub fn contradiction_relation_type(kind: &str) -> String {
    format!("{CONTRADICTION_PREFIX}{kind}")
}
