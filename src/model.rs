/// The user-model contract (spec §6.2) and the edge-descriptor replacement
/// for runtime reflection (spec §9, Design Notes).
use serde_json::Value as JsonValue;

use crate::engine::Persister;
use crate::error::EngineResult;

/// How many vertices sit on the far side of a declared edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Static metadata for one outbound property a user type declares.
///
/// The source implementation discovers these by reflecting over the
/// record's fields at runtime; here each [`Persistable`] type instead lists
/// them explicitly via [`Persistable::edge_descriptors`]. The engine does
/// not dispatch through this table directly (Rust's static typing makes a
/// single heterogeneous getter/setter awkward); it exists so traversal
/// helpers and diagnostics can describe a type's outbound shape without
/// re-deriving it from `save_related`'s body.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDescriptor {
    pub property: &'static str,
    pub cardinality: Cardinality,
    pub target_type: &'static str,
}

/// A record type the engine can save, delete, and replay.
///
/// Implementors own their scalar fields and any related (edge-backed)
/// fields. Related fields are excluded from [`Persistable::to_scalar_json`]
/// — they are represented purely by rows in `relations`, never embedded in
/// the JSON blob (spec §6.4).
pub trait Persistable: Sized {
    /// Canonical type name stored in `by_type.type_name` and used to filter
    /// `retrieve`/`retrieve_by_id`. Must be stable across process restarts.
    fn type_name() -> &'static str;

    /// `None` means "never saved." Set by the repository after an insert.
    fn id(&self) -> Option<i64>;

    /// Called by the repository immediately after an insert assigns a row id.
    fn set_id(&mut self, id: i64);

    /// Encode the scalar (non-related) fields as a JSON object.
    fn to_scalar_json(&self) -> EngineResult<JsonValue>;

    /// Decode scalar fields from a previously encoded JSON object. Related
    /// fields are left at their default value; call [`Persistable::initialize`]
    /// to populate them from edges.
    fn from_scalar_json(id: i64, json: &JsonValue) -> EngineResult<Self>;

    /// Populate related (non-scalar) fields by consulting
    /// [`crate::engine::Persister::related`] / `related_item`. Called once,
    /// immediately after decode.
    fn initialize(&mut self, _engine: &Persister) -> EngineResult<()> {
        Ok(())
    }

    /// Persist every outbound edge collection declared by this type, via
    /// `Persister::save_relations`/`save_relation`. Called after the vertex
    /// row itself has been written by `save_properties`.
    fn save_related(&mut self, _engine: &Persister, _recurse: bool) -> EngineResult<()> {
        Ok(())
    }

    /// Enumerate children to cascade-delete. Optional: types with no
    /// outbound edges, or whose edges should not cascade, leave this empty.
    fn delete_related(&self, _engine: &Persister) -> EngineResult<()> {
        Ok(())
    }

    /// Static description of this type's outbound edges. Used only for
    /// introspection (e.g. by host tooling); the engine does not dispatch
    /// through it.
    fn edge_descriptors() -> Vec<EdgeDescriptor> {
        Vec::new()
    }
}
