//! API path builders.
//!
//! Every entity kind maps to a name filter and a scope builder; the lookup,
//! listing, move and rename paths are assembled from those entries so that the
//! per-kind differences live in one table instead of string branches.

use crate::domain::{EntityId, EntityKind, EntityRef, ParentRef, SortDir};

/// Which query parameter matches an entity by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFilter {
    /// `?text=`, a substring/text search.
    Text,
    /// `?name=`, an exact name match.
    Name,
}

impl NameFilter {
    fn param(&self) -> &'static str {
        match self {
            NameFilter::Text => "text",
            NameFilter::Name => "name",
        }
    }
}

type ScopeBuilder = fn(&ParentRef) -> String;

struct KindQuery {
    name_filter: NameFilter,
    lookup_scope: ScopeBuilder,
}

fn parent_scope(parent: &ParentRef) -> String {
    format!("&parentType={}&parentId={}", parent.kind, parent.id)
}

fn folder_scope(parent: &ParentRef) -> String {
    format!("&folderId={}", parent.id)
}

fn kind_query(kind: EntityKind) -> KindQuery {
    match kind {
        EntityKind::Collection => KindQuery {
            name_filter: NameFilter::Text,
            lookup_scope: parent_scope,
        },
        // Items are always scoped by folder id, whatever kind of parent was given.
        EntityKind::Item => KindQuery {
            name_filter: NameFilter::Name,
            lookup_scope: folder_scope,
        },
        EntityKind::Folder | EntityKind::File | EntityKind::User | EntityKind::Group => {
            KindQuery {
                name_filter: NameFilter::Name,
                lookup_scope: parent_scope,
            }
        }
    }
}

pub fn name_filter(kind: EntityKind) -> NameFilter {
    kind_query(kind).name_filter
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub limit: u32,
    pub sort_dir: SortDir,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            limit: 1,
            sort_dir: SortDir::Descending,
        }
    }
}

/// `<kind>?<text|name>=<name>[scope]&limit=<n>&sortdir=<±1>`
pub fn lookup_query(
    kind: EntityKind,
    name: &str,
    parent: Option<&ParentRef>,
    paging: Paging,
) -> String {
    let table = kind_query(kind);
    let scope = parent.map(table.lookup_scope).unwrap_or_default();
    format!(
        "{kind}?{}={name}{scope}&limit={}&sortdir={}",
        table.name_filter.param(),
        paging.limit,
        paging.sort_dir
    )
}

/// Children of `child_kind` directly under `parent`.
pub fn listing_query(child_kind: EntityKind, parent: &ParentRef) -> String {
    match (child_kind, parent.kind) {
        (EntityKind::Item, EntityKind::Folder) => format!("item?folderId={}", parent.id),
        _ => format!(
            "{child_kind}?parentType={}&parentId={}",
            parent.kind, parent.id
        ),
    }
}

pub fn files_query(item_id: &EntityId) -> String {
    format!("item/{item_id}/files")
}

pub fn sorted_files_query(item_id: &EntityId, sort: &str, sort_dir: SortDir) -> String {
    format!("item/{item_id}/files?sort={sort}&sortdir={sort_dir}")
}

pub fn move_query(entity: &EntityRef, new_parent: &ParentRef) -> String {
    match (entity.kind, new_parent.kind) {
        (EntityKind::Item, EntityKind::Folder) => {
            format!("item/{}?folderId={}", entity.id, new_parent.id)
        }
        _ => format!(
            "{}?parentId={}&parentType={}",
            entity.path(),
            new_parent.id,
            new_parent.kind
        ),
    }
}

pub fn rename_query(entity: &EntityRef, new_name: &str) -> String {
    format!("{}?name={new_name}", entity.path())
}
