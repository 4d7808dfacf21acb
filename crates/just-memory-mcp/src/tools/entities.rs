//! Entities family: `memory_entity_create|get|link|search|observe|delete`,
//! `memory_entity_type_define|hierarchy|list|search_by_hierarchy`.

use std::sync::Arc;

use just_memory_core::error::Result;
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "memory_entity_create",
            "Create or upsert a named entity; a duplicate (project, name) merges observations as a set union.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "entity_type": {"type": "string"},
                    "observations": {"type": "array", "items": {"type": "string"}},
                    "project_id": {"type": "string"}
                },
                "required": ["name", "entity_type"]
            }),
        ),
        (
            "memory_entity_get",
            "Fetch an entity by name.",
            serde_json::json!({"type": "object", "properties": {"name": {"type": "string"}, "project_id": {"type": "string"}}, "required": ["name"]}),
        ),
        (
            "memory_entity_link",
            "Create a directed relation between two entities.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "from": {"type": "string"},
                    "relation_type": {"type": "string"},
                    "to": {"type": "string"},
                    "project_id": {"type": "string"}
                },
                "required": ["from", "relation_type", "to"]
            }),
        ),
        (
            "memory_entity_search",
            "Search entities by name/observation substring, optionally filtered by type.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "entity_type": {"type": "string"},
                    "project_id": {"type": "string"}
                },
                "required": ["query"]
            }),
        ),
        (
            "memory_entity_observe",
            "Append observations to an existing entity (set union, truncated/capped per entity).",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "observations": {"type": "array", "items": {"type": "string"}},
                    "project_id": {"type": "string"}
                },
                "required": ["name", "observations"]
            }),
        ),
        (
            "memory_entity_delete",
            "Delete an entity and its relations.",
            serde_json::json!({"type": "object", "properties": {"name": {"type": "string"}, "project_id": {"type": "string"}}, "required": ["name"]}),
        ),
        (
            "memory_entity_type_define",
            "Define a new entity type, optionally nested under a parent (rejects cycles).",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "parent": {"type": "string"},
                    "description": {"type": "string"}
                },
                "required": ["name"]
            }),
        ),
        (
            "memory_entity_type_hierarchy",
            "Ancestors, descendants, and depth of an entity type.",
            serde_json::json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
        ),
        (
            "memory_entity_type_list",
            "List all defined entity types with their parent and description.",
            serde_json::json!({"type": "object", "properties": {}}),
        ),
        (
            "memory_entity_type_search_by_hierarchy",
            "Search entities of a type or any of its descendant types.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "entity_type": {"type": "string"},
                    "query": {"type": "string"},
                    "project_id": {"type": "string"}
                },
                "required": ["entity_type", "query"]
            }),
        ),
    ]
}

pub fn execute_entity_create(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        name: String,
        entity_type: String,
        #[serde(default)]
        observations: Vec<String>,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let (entity, created) = storage.entity_create(&args.name, &args.entity_type, args.observations, &default_project(args.project_id))?;
    Ok(serde_json::json!({ "entity": entity, "created": created }))
}

pub fn execute_entity_get(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        name: String,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let entity = storage.entity_get(&args.name, &default_project(args.project_id))?;
    Ok(serde_json::to_value(entity)?)
}

pub fn execute_entity_link(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        from: String,
        relation_type: String,
        to: String,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    storage.entity_link(&args.from, &args.relation_type, &args.to, &default_project(args.project_id))?;
    Ok(serde_json::json!({ "linked": true }))
}

pub fn execute_entity_search(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        query: String,
        #[serde(default)]
        entity_type: Option<String>,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let entities = storage.entity_search(&args.query, &default_project(args.project_id), args.entity_type.as_deref())?;
    Ok(serde_json::to_value(entities)?)
}

pub fn execute_entity_observe(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        name: String,
        observations: Vec<String>,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let entity = storage.entity_observe(&args.name, &default_project(args.project_id), args.observations)?;
    Ok(serde_json::to_value(entity)?)
}

pub fn execute_entity_delete(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        name: String,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    storage.entity_delete(&args.name, &default_project(args.project_id))?;
    Ok(serde_json::json!({ "deleted": args.name }))
}

pub fn execute_entity_type_define(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        name: String,
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        description: Option<String>,
    }
    let args: Args = parse_args(args)?;
    storage.entity_type_define(&args.name, args.parent.as_deref(), args.description.as_deref().unwrap_or(""))?;
    Ok(serde_json::json!({ "defined": args.name }))
}

pub fn execute_entity_type_hierarchy(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        name: String,
    }
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.entity_type_hierarchy(&args.name)?)?)
}

pub fn execute_entity_type_list(storage: &Arc<Storage>, _args: Value) -> Result<Value> {
    let types = storage.entity_type_list()?;
    let types: Vec<Value> = types
        .into_iter()
        .map(|(name, parent, description)| serde_json::json!({ "name": name, "parent": parent, "description": description }))
        .collect();
    Ok(serde_json::Value::Array(types))
}

pub fn execute_entity_type_search_by_hierarchy(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        entity_type: String,
        query: String,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let entities = storage.search_by_type_hierarchy(&args.entity_type, &args.query, &default_project(args.project_id))?;
    Ok(serde_json::to_value(entities)?)
}
