//! Schema-directed denormalization
//!
//! Reconstructs nested views from the flat store. The inverse of
//! normalization, with one deliberate asymmetry: denormalization never fails
//! on missing data. A reference to an entity the store does not hold
//! resolves to the bare id, an unregistered schema name leaves the input
//! untouched. Strictness about such gaps belongs to the integrity checker.
//!
//! Cycles are cut by a visited set of `type:id` keys threaded down the
//! recursion. The set is cloned per branch so sibling subtrees can each
//! reach the same entity; only a true ancestor triggers the configured
//! [`CircularBehavior`].

use planar_core::{id_from_value, NormalizedEntities, Schema, SchemaRegistry, UnionSchema};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

/// What a re-visited entity inside its own expansion collapses to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CircularBehavior {
    /// Replace the revisit with `null`
    Skip,
    /// Replace the revisit with the bare id
    #[default]
    IdOnly,
    /// Emit the entity's own fields with relations left as stored
    Shallow,
}

/// Options controlling one denormalization pass
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DenormalizeOptions {
    /// Entity nesting depth after which references stay bare ids
    /// (`None` = unlimited)
    pub max_depth: Option<usize>,
    /// When set, only these fields (plus the id field) appear on entities
    pub include_fields: Option<Vec<String>>,
    /// Fields stripped from entities; wins over `include_fields`
    pub exclude_fields: Vec<String>,
    /// Reuse results for `(type, id, depth)` within this call
    ///
    /// Hits return a value-equal clone of the first expansion.
    pub memoize: bool,
    /// Cycle handling
    pub circular: CircularBehavior,
}

impl Default for DenormalizeOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            include_fields: None,
            exclude_fields: Vec::new(),
            memoize: true,
            circular: CircularBehavior::IdOnly,
        }
    }
}

/// Denormalize `input` (an id or normalized skeleton) against `schema`
///
/// Infallible by design; see the module docs for the tolerance rules.
pub fn denormalize(
    input: &Value,
    schema: &Schema,
    entities: &NormalizedEntities,
    registry: &SchemaRegistry,
    options: &DenormalizeOptions,
) -> Value {
    let mut walker = Walker {
        entities,
        registry,
        options,
        memo: FxHashMap::default(),
    };
    walker.walk(input, schema, 0, &FxHashSet::default())
}

/// Denormalize keeping only `include` fields (plus ids) on entities
pub fn denormalize_select(
    input: &Value,
    schema: &Schema,
    entities: &NormalizedEntities,
    registry: &SchemaRegistry,
    include: &[&str],
) -> Value {
    let options = DenormalizeOptions {
        include_fields: Some(include.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    };
    denormalize(input, schema, entities, registry, &options)
}

/// Denormalize one entity level deep; nested references stay bare ids
pub fn denormalize_shallow(
    input: &Value,
    schema: &Schema,
    entities: &NormalizedEntities,
    registry: &SchemaRegistry,
) -> Value {
    let options = DenormalizeOptions {
        max_depth: Some(1),
        ..Default::default()
    };
    denormalize(input, schema, entities, registry, &options)
}

struct Walker<'a> {
    entities: &'a NormalizedEntities,
    registry: &'a SchemaRegistry,
    options: &'a DenormalizeOptions,
    memo: FxHashMap<(String, String, usize), Value>,
}

impl Walker<'_> {
    fn walk(
        &mut self,
        input: &Value,
        schema: &Schema,
        depth: usize,
        visited: &FxHashSet<String>,
    ) -> Value {
        match schema {
            Schema::Value => input.clone(),
            Schema::Entity(name) => self.walk_entity(input, name, depth, visited),
            Schema::Array(inner) => match input {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| self.walk(item, inner, depth, visited))
                        .collect(),
                ),
                other => other.clone(),
            },
            Schema::Object(shape) => match input {
                Value::Object(fields) => {
                    let mut out = serde_json::Map::new();
                    for (field, value) in fields {
                        let expanded = match shape.get(field) {
                            Some(inner) => self.walk(value, inner, depth, visited),
                            None => value.clone(),
                        };
                        out.insert(field.clone(), expanded);
                    }
                    Value::Object(out)
                }
                other => other.clone(),
            },
            Schema::Union(union) => self.walk_union(input, union, depth, visited),
        }
    }

    fn walk_entity(
        &mut self,
        input: &Value,
        name: &str,
        depth: usize,
        visited: &FxHashSet<String>,
    ) -> Value {
        let Some(schema) = self.registry.get_opt(name) else {
            return input.clone();
        };
        let Some(id) = id_from_value(input) else {
            // Not an id reference (already nested, or null); leave untouched
            return input.clone();
        };

        let key = format!("{name}:{id}");
        if visited.contains(&key) {
            return self.resolve_circular(name, &id);
        }
        if let Some(max) = self.options.max_depth {
            if depth >= max {
                return Value::String(id);
            }
        }
        let Some(record) = self.entities.get(name, &id) else {
            return Value::String(id);
        };

        if self.options.memoize {
            if let Some(cached) = self.memo.get(&(name.to_string(), id.clone(), depth)) {
                return cached.clone();
            }
        }

        let mut branch_visited = visited.clone();
        branch_visited.insert(key);

        let mut out = serde_json::Map::new();
        for (field, value) in record {
            if !self.field_selected(field, &schema.id_field) {
                continue;
            }
            let expanded = match schema.relations.get(field) {
                Some(relation) => self.walk(value, relation, depth + 1, &branch_visited),
                None => value.clone(),
            };
            out.insert(field.clone(), expanded);
        }
        let expanded = Value::Object(out);

        if self.options.memoize {
            self.memo
                .insert((name.to_string(), id, depth), expanded.clone());
        }
        expanded
    }

    fn walk_union(
        &mut self,
        input: &Value,
        union: &UnionSchema,
        depth: usize,
        visited: &FxHashSet<String>,
    ) -> Value {
        let Value::Object(fields) = input else {
            return input.clone();
        };
        let Some(tag) = fields.get(&union.discriminant).and_then(Value::as_str) else {
            return input.clone();
        };
        let Some(target) = union.resolve(tag) else {
            return input.clone();
        };
        let Some(id) = fields.get("id") else {
            return input.clone();
        };
        self.walk_entity(id, target, depth, visited)
    }

    fn resolve_circular(&self, name: &str, id: &str) -> Value {
        match self.options.circular {
            CircularBehavior::Skip => Value::Null,
            CircularBehavior::IdOnly => Value::String(id.to_string()),
            CircularBehavior::Shallow => {
                let Some(record) = self.entities.get(name, id) else {
                    return Value::String(id.to_string());
                };
                let id_field = self
                    .registry
                    .get_opt(name)
                    .map(|s| s.id_field.clone())
                    .unwrap_or_else(|| planar_core::DEFAULT_ID_FIELD.to_string());
                let fields = record
                    .iter()
                    .filter(|(field, _)| self.field_selected(field, &id_field))
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect();
                Value::Object(fields)
            }
        }
    }

    fn field_selected(&self, field: &str, id_field: &str) -> bool {
        if self.options.exclude_fields.iter().any(|f| f == field) {
            return false;
        }
        if field == id_field {
            return true;
        }
        match &self.options.include_fields {
            Some(include) => include.iter().any(|f| f == field),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_core::EntitySchema;
    use serde_json::json;

    fn fixtures() -> (SchemaRegistry, NormalizedEntities) {
        let mut registry = SchemaRegistry::new();
        registry
            .register(EntitySchema::new("users").relation("posts", Schema::array(Schema::entity("posts"))))
            .unwrap();
        registry
            .register(EntitySchema::new("posts").relation("author", Schema::entity("users")))
            .unwrap();

        let store: NormalizedEntities = serde_json::from_value(json!({
            "users": {
                "9": {"id": "9", "name": "Alice", "posts": ["1"]}
            },
            "posts": {
                "1": {"id": "1", "title": "Hi", "author": "9"}
            }
        }))
        .unwrap();
        (registry, store)
    }

    #[test]
    fn test_cycle_terminates_with_id_only() {
        let (registry, store) = fixtures();
        let view = denormalize(
            &json!("1"),
            &Schema::entity("posts"),
            &store,
            &registry,
            &DenormalizeOptions::default(),
        );

        // post → author → posts → the original post collapses to its id
        assert_eq!(view["author"]["posts"], json!(["1"]));
        assert_eq!(view["title"], json!("Hi"));
    }

    #[test]
    fn test_cycle_skip_yields_null() {
        let (registry, store) = fixtures();
        let options = DenormalizeOptions {
            circular: CircularBehavior::Skip,
            ..Default::default()
        };
        let view = denormalize(&json!("1"), &Schema::entity("posts"), &store, &registry, &options);
        assert_eq!(view["author"]["posts"], json!([null]));
    }

    #[test]
    fn test_cycle_shallow_keeps_own_fields() {
        let (registry, store) = fixtures();
        let options = DenormalizeOptions {
            circular: CircularBehavior::Shallow,
            ..Default::default()
        };
        let view = denormalize(&json!("1"), &Schema::entity("posts"), &store, &registry, &options);
        // the revisited post appears with relations left as stored ids
        assert_eq!(
            view["author"]["posts"][0],
            json!({"id": "1", "title": "Hi", "author": "9"})
        );
    }

    #[test]
    fn test_missing_entity_resolves_to_bare_id() {
        let (registry, mut store) = fixtures();
        store.remove("users", "9");

        let view = denormalize(
            &json!("1"),
            &Schema::entity("posts"),
            &store,
            &registry,
            &DenormalizeOptions::default(),
        );
        assert_eq!(view["author"], json!("9"));
    }

    #[test]
    fn test_missing_root_resolves_to_bare_id() {
        let (registry, store) = fixtures();
        let view = denormalize(
            &json!("404"),
            &Schema::entity("posts"),
            &store,
            &registry,
            &DenormalizeOptions::default(),
        );
        assert_eq!(view, json!("404"));
    }

    #[test]
    fn test_max_depth_degrades_to_id() {
        let (registry, store) = fixtures();
        let view = denormalize_shallow(&json!("1"), &Schema::entity("posts"), &store, &registry);
        assert_eq!(view["author"], json!("9"));
        assert_eq!(view["title"], json!("Hi"));
    }

    #[test]
    fn test_include_fields_keeps_id_implicitly() {
        let (registry, store) = fixtures();
        let view = denormalize_select(
            &json!("1"),
            &Schema::entity("posts"),
            &store,
            &registry,
            &["title"],
        );
        assert_eq!(view, json!({"id": "1", "title": "Hi"}));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let (registry, store) = fixtures();
        let options = DenormalizeOptions {
            include_fields: Some(vec!["title".to_string()]),
            exclude_fields: vec!["title".to_string()],
            ..Default::default()
        };
        let view = denormalize(&json!("1"), &Schema::entity("posts"), &store, &registry, &options);
        assert_eq!(view, json!({"id": "1"}));
    }

    #[test]
    fn test_sibling_subtrees_do_not_collide() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntitySchema::new("users")).unwrap();
        registry
            .register(
                EntitySchema::new("threads")
                    .relation("first", Schema::entity("users"))
                    .relation("second", Schema::entity("users")),
            )
            .unwrap();
        let store: NormalizedEntities = serde_json::from_value(json!({
            "users": {"9": {"id": "9", "name": "Alice"}},
            "threads": {"t": {"id": "t", "first": "9", "second": "9"}}
        }))
        .unwrap();

        let view = denormalize(
            &json!("t"),
            &Schema::entity("threads"),
            &store,
            &registry,
            &DenormalizeOptions::default(),
        );
        // the same user expands fully in both sibling branches
        assert_eq!(view["first"]["name"], json!("Alice"));
        assert_eq!(view["second"]["name"], json!("Alice"));
    }

    #[test]
    fn test_union_reference_routes_by_tag() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntitySchema::new("users")).unwrap();
        registry.register(EntitySchema::new("groups")).unwrap();
        let schema = Schema::union(
            UnionSchema::new("kind")
                .variant("user", "users")
                .variant("group", "groups"),
        );
        let store: NormalizedEntities = serde_json::from_value(json!({
            "users": {"9": {"id": "9", "kind": "user", "name": "Alice"}}
        }))
        .unwrap();

        let view = denormalize(
            &json!({"id": "9", "kind": "user"}),
            &schema,
            &store,
            &registry,
            &DenormalizeOptions::default(),
        );
        assert_eq!(view["name"], json!("Alice"));

        // unknown tag: the stored skeleton comes back untouched
        let untouched = denormalize(
            &json!({"id": "9", "kind": "robot"}),
            &schema,
            &store,
            &registry,
            &DenormalizeOptions::default(),
        );
        assert_eq!(untouched, json!({"id": "9", "kind": "robot"}));
    }

    #[test]
    fn test_memoization_does_not_change_output() {
        let (registry, store) = fixtures();
        let memoized = DenormalizeOptions::default();
        let recomputed = DenormalizeOptions {
            memoize: false,
            ..Default::default()
        };

        let a = denormalize(&json!("1"), &Schema::entity("posts"), &store, &registry, &memoized);
        let b = denormalize(&json!("1"), &Schema::entity("posts"), &store, &registry, &recomputed);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unregistered_schema_is_tolerated() {
        let registry = SchemaRegistry::new();
        let store = NormalizedEntities::new();
        let view = denormalize(
            &json!("9"),
            &Schema::entity("ghosts"),
            &store,
            &registry,
            &DenormalizeOptions::default(),
        );
        assert_eq!(view, json!("9"));
    }
}
