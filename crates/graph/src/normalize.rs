//! Schema-directed normalization
//!
//! Flattens a nested input tree into a [`NormalizedEntities`] store plus a
//! normalized skeleton. Entity nodes are replaced by their id; everything an
//! entity owns lands as one flat record under `entities[type][id]`.
//!
//! Normalization is pure with respect to the caller's store: the returned
//! store is freshly built and the caller merges it into the canonical one.
//! Structural problems (missing id, wrong shape, unknown discriminant) fail
//! fast with an `Err`; there is no partial-success mode.

use planar_core::{
    id_from_value, Entity, EntitySchema, Error, NormalizedEntities, Result, Schema, SchemaRegistry,
    UnionSchema,
};
use serde_json::Value;

/// Output of [`normalize`]: the skeleton plus the entities it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The input with every entity subtree collapsed to an id reference
    pub result: Value,
    /// Flat records extracted from the input
    pub entities: NormalizedEntities,
}

/// Normalize `input` against `schema`
///
/// Entity references inside `schema` are resolved through `registry`.
///
/// # Errors
/// - [`Error::MissingId`] when an entity input lacks its id field
/// - [`Error::ShapeMismatch`] when the input shape contradicts the schema
/// - [`Error::MissingDiscriminant`] / [`Error::UnknownDiscriminant`] for
///   union inputs that cannot be routed
/// - [`Error::SchemaNotFound`] when a referenced schema is unregistered
pub fn normalize(input: &Value, schema: &Schema, registry: &SchemaRegistry) -> Result<Normalized> {
    let mut entities = NormalizedEntities::new();
    let result = normalize_node(input, schema, registry, &mut entities, "input")?;
    Ok(Normalized { result, entities })
}

fn normalize_node(
    input: &Value,
    schema: &Schema,
    registry: &SchemaRegistry,
    entities: &mut NormalizedEntities,
    context: &str,
) -> Result<Value> {
    match schema {
        Schema::Value => Ok(input.clone()),
        Schema::Entity(name) => normalize_entity(input, registry.get(name)?, registry, entities),
        Schema::Array(inner) => {
            let items = input.as_array().ok_or_else(|| Error::ShapeMismatch {
                expected: "array",
                found: Error::shape_of(input),
                context: context.to_string(),
            })?;
            let normalized = items
                .iter()
                .map(|item| normalize_node(item, inner, registry, entities, context))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(normalized))
        }
        Schema::Object(shape) => {
            let fields = input.as_object().ok_or_else(|| Error::ShapeMismatch {
                expected: "object",
                found: Error::shape_of(input),
                context: context.to_string(),
            })?;
            let mut out = serde_json::Map::new();
            for (field, value) in fields {
                let normalized = match shape.get(field) {
                    Some(inner) => normalize_node(value, inner, registry, entities, field)?,
                    None => value.clone(),
                };
                out.insert(field.clone(), normalized);
            }
            Ok(Value::Object(out))
        }
        Schema::Union(union) => normalize_union(input, union, registry, entities, context),
    }
}

fn normalize_entity(
    input: &Value,
    schema: &EntitySchema,
    registry: &SchemaRegistry,
    entities: &mut NormalizedEntities,
) -> Result<Value> {
    // A bare id means the subtree is already normalized; pass it through.
    if matches!(input, Value::String(_) | Value::Number(_)) {
        let id = id_from_value(input).ok_or_else(|| Error::MissingId {
            schema: schema.name.clone(),
            id_field: schema.id_field.clone(),
        })?;
        return Ok(Value::String(id));
    }

    let fields = input.as_object().ok_or_else(|| Error::ShapeMismatch {
        expected: "object",
        found: Error::shape_of(input),
        context: format!("entity '{}'", schema.name),
    })?;

    let id = fields
        .get(&schema.id_field)
        .and_then(id_from_value)
        .ok_or_else(|| Error::MissingId {
            schema: schema.name.clone(),
            id_field: schema.id_field.clone(),
        })?;

    let mut record = Entity::new();
    for (field, value) in fields {
        let stored = match schema.relations.get(field) {
            Some(relation) => normalize_node(value, relation, registry, entities, field)?,
            None => value.clone(),
        };
        record.insert(field.clone(), stored);
    }
    // The id field is stored in canonical string form
    record.insert(schema.id_field.clone(), Value::String(id.clone()));

    entities.upsert(&schema.name, &id, record);
    Ok(Value::String(id))
}

fn normalize_union(
    input: &Value,
    union: &UnionSchema,
    registry: &SchemaRegistry,
    entities: &mut NormalizedEntities,
    context: &str,
) -> Result<Value> {
    let fields = input.as_object().ok_or_else(|| Error::ShapeMismatch {
        expected: "object",
        found: Error::shape_of(input),
        context: context.to_string(),
    })?;

    let tag = fields
        .get(&union.discriminant)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingDiscriminant(union.discriminant.clone()))?;
    let target = union.resolve(tag).ok_or_else(|| Error::UnknownDiscriminant {
        field: union.discriminant.clone(),
        value: tag.to_string(),
    })?;

    let id = normalize_entity(input, registry.get(target)?, registry, entities)?;

    // The skeleton keeps the tag so denormalization can route without probing
    let mut reference = serde_json::Map::new();
    reference.insert("id".to_string(), id);
    reference.insert(union.discriminant.clone(), Value::String(tag.to_string()));
    Ok(Value::Object(reference))
}
