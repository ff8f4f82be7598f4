//! JSON:API compound-document resolution.
//!
//! [`JsonApiResolver`] turns a document (primary `data` plus an `included`
//! pool) into plain nested JSON: each resource becomes an object holding its
//! `id`, `type`, flattened `attributes`, and one field per relationship whose
//! targets were found in `included`.
//!
//! Cycle policy: while resolving a relationship, a target equal (same `id`
//! and `type`) to the resource two levels up is skipped. This breaks the
//! parent ↔ child back-references the Gardena API emits (location → device →
//! location). Longer cycles are not detected; they are cut off by a nesting
//! depth limit instead.

use std::collections::{BTreeMap, HashMap};

use gs_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default nesting limit for relationship resolution.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A resolved resource: `id`, `type`, attributes and relationship fields.
pub type ResolvedEntity = Map<String, Value>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Document model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub data: PrimaryData,
    #[serde(default)]
    pub included: Vec<ResourceObject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    One(Box<ResourceObject>),
    #[default]
    Null,
}

/// Every member is optional; absent ones are simply not copied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<BTreeMap<String, Relationship>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Linkage>,
}

/// Resource linkage: to-one or to-many.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl ResourceObject {
    fn same_as(&self, other: &ResourceObject) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type Key<'a> = (Option<&'a str>, Option<&'a str>);

/// Lookup of `included` by `(id, type)`. The first occurrence wins.
struct IncludedIndex<'a> {
    by_key: HashMap<Key<'a>, &'a ResourceObject>,
}

impl<'a> IncludedIndex<'a> {
    fn new(included: &'a [ResourceObject]) -> Self {
        let mut by_key = HashMap::with_capacity(included.len());
        for obj in included {
            by_key
                .entry((obj.id.as_deref(), obj.kind.as_deref()))
                .or_insert(obj);
        }
        Self { by_key }
    }

    fn find(&self, ident: &ResourceIdentifier) -> Option<&'a ResourceObject> {
        self.by_key
            .get(&(ident.id.as_deref(), ident.kind.as_deref()))
            .copied()
    }
}

#[derive(Debug, Clone)]
pub struct JsonApiResolver {
    max_depth: usize,
}

impl Default for JsonApiResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl JsonApiResolver {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Resolve a document whose primary data is a single resource.
    pub fn deserialize(&self, doc: &Document) -> Result<ResolvedEntity> {
        match &doc.data {
            PrimaryData::One(obj) => {
                let index = IncludedIndex::new(&doc.included);
                Ok(self.resolve_object(obj, &index, None, 0))
            }
            PrimaryData::Many(_) => Err(Error::Decode(
                "expected a single primary resource, got a collection".into(),
            )),
            PrimaryData::Null => Err(Error::Decode("document has no primary data".into())),
        }
    }

    /// Parse a raw JSON body and resolve it as a single-resource document.
    pub fn deserialize_value(&self, body: &Value) -> Result<ResolvedEntity> {
        let doc: Document = serde_json::from_value(body.clone())
            .map_err(|e| Error::Decode(format!("not a JSON:API document: {e}")))?;
        self.deserialize(&doc)
    }

    /// Resolve any document: an object for single primary data, an array
    /// (in input order) for a collection, `null` when there is none.
    pub fn resolve_document(&self, doc: &Document) -> Value {
        let index = IncludedIndex::new(&doc.included);
        match &doc.data {
            PrimaryData::One(obj) => Value::Object(self.resolve_object(obj, &index, None, 0)),
            PrimaryData::Many(objs) => Value::Array(
                objs.iter()
                    .map(|obj| Value::Object(self.resolve_object(obj, &index, None, 0)))
                    .collect(),
            ),
            PrimaryData::Null => Value::Null,
        }
    }

    fn resolve_object(
        &self,
        obj: &ResourceObject,
        index: &IncludedIndex<'_>,
        parent: Option<&ResourceObject>,
        depth: usize,
    ) -> ResolvedEntity {
        let mut resolved = Map::new();
        if let Some(id) = &obj.id {
            resolved.insert("id".into(), Value::String(id.clone()));
        }
        if let Some(kind) = &obj.kind {
            resolved.insert("type".into(), Value::String(kind.clone()));
        }
        if let Some(attributes) = &obj.attributes {
            for (key, value) in attributes {
                resolved.insert(key.clone(), value.clone());
            }
        }
        if let Some(relationships) = &obj.relationships {
            for (name, relationship) in relationships {
                let Some(linkage) = &relationship.data else {
                    continue;
                };
                if let Some(value) = self.resolve_related(linkage, index, obj, parent, depth) {
                    resolved.insert(name.clone(), value);
                }
            }
        }
        resolved
    }

    /// Resolve the targets of one relationship of `owner`. Targets equal to
    /// `owner`'s own parent are skipped. Returns `None` when nothing
    /// resolved, so the field is omitted rather than set to `[]`.
    fn resolve_related(
        &self,
        linkage: &Linkage,
        index: &IncludedIndex<'_>,
        owner: &ResourceObject,
        grandparent: Option<&ResourceObject>,
        depth: usize,
    ) -> Option<Value> {
        if depth >= self.max_depth {
            tracing::warn!(
                depth,
                id = ?owner.id,
                "relationship nesting limit reached; omitting deeper relationships"
            );
            return None;
        }

        let resolve_one = |ident: &ResourceIdentifier| -> Option<Value> {
            let target = index.find(ident)?;
            if grandparent.is_some_and(|gp| target.same_as(gp)) {
                return None;
            }
            Some(Value::Object(self.resolve_object(
                target,
                index,
                Some(owner),
                depth + 1,
            )))
        };

        match linkage {
            Linkage::One(ident) => resolve_one(ident),
            Linkage::Many(idents) => {
                let items: Vec<Value> = idents.iter().filter_map(resolve_one).collect();
                (!items.is_empty()).then_some(Value::Array(items))
            }
        }
    }
}
