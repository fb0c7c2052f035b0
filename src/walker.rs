use serde::Serialize;
use serde_json::Value;

use crate::client::{ObjectStoreClient, entity_id, into_array};
use crate::domain::{EntityKind, EntityRef};
use crate::error::CuratorError;
use crate::normalize::normalize_keys;
use crate::query;

/// A node of the collection -> folder -> item -> file hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub entity: EntityRef,
    pub meta: Option<Value>,
}

impl TreeNode {
    /// Read `_modelType`, `_id` and `meta` from an entity document.
    pub fn from_document(document: &Value) -> Result<Self, CuratorError> {
        let kind = document
            .get("_modelType")
            .and_then(Value::as_str)
            .ok_or_else(|| CuratorError::MissingField {
                field: "_modelType".to_string(),
                context: "metadata walk".to_string(),
            })?
            .parse::<EntityKind>()?;
        let id = entity_id(document, "metadata walk")?;
        Ok(Self {
            entity: EntityRef::new(kind, id),
            meta: document.get("meta").cloned(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalkSummary {
    /// Nodes in visit order.
    pub visited: Vec<EntityRef>,
    /// Nodes whose metadata was written back.
    pub rewritten: Vec<EntityRef>,
}

/// Rewrite the metadata keys of `root` and everything below it to medial caps.
///
/// Nodes are processed from an explicit worklist, depth first with child
/// folders ahead of child items. Each node has its metadata written (when it
/// carries any, whether or not the keys change) before its children are
/// listed.
pub fn normalize_metadata_tree<C: ObjectStoreClient + ?Sized>(
    client: &C,
    root: &Value,
) -> Result<WalkSummary, CuratorError> {
    let root = TreeNode::from_document(root)?;
    check_walkable(root.entity.kind)?;

    let mut summary = WalkSummary::default();
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if let Some(meta) = &node.meta {
            let normalized = normalize_keys(meta);
            client.set_metadata(&node.entity, &normalized)?;
            tracing::debug!(entity = %node.entity, "rewrote metadata keys");
            summary.rewritten.push(node.entity.clone());
        }

        let children = list_children(client, &node.entity)?;
        // Reversed so the first listed child is popped next.
        pending.extend(children.into_iter().rev());
        summary.visited.push(node.entity);
    }
    tracing::info!(
        visited = summary.visited.len(),
        rewritten = summary.rewritten.len(),
        "metadata walk finished"
    );
    Ok(summary)
}

fn check_walkable(kind: EntityKind) -> Result<(), CuratorError> {
    match kind {
        EntityKind::Collection | EntityKind::Folder | EntityKind::Item | EntityKind::File => Ok(()),
        EntityKind::User | EntityKind::Group => {
            Err(CuratorError::UnsupportedTraversal(kind.to_string()))
        }
    }
}

fn list_children<C: ObjectStoreClient + ?Sized>(
    client: &C,
    entity: &EntityRef,
) -> Result<Vec<TreeNode>, CuratorError> {
    let mut queries = Vec::new();
    match entity.kind {
        EntityKind::Collection => {
            queries.push(query::listing_query(EntityKind::Folder, entity));
        }
        EntityKind::Folder => {
            queries.push(query::listing_query(EntityKind::Folder, entity));
            queries.push(query::listing_query(EntityKind::Item, entity));
        }
        EntityKind::Item => queries.push(query::files_query(&entity.id)),
        EntityKind::File | EntityKind::User | EntityKind::Group => {}
    }

    let mut children = Vec::new();
    for query in queries {
        for document in into_array(client.get(&query)?, &query)? {
            let child = TreeNode::from_document(&document)?;
            check_walkable(child.entity.kind)?;
            children.push(child);
        }
    }
    Ok(children)
}
