use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::client::{ObjectStoreClient, entity_id, into_array};
use crate::domain::{EntityId, EntityKind, EntityRef, ParentRef, SortDir};
use crate::error::CuratorError;
use crate::query::{self, Paging};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    pub limit: u32,
    pub sort_dir: SortDir,
    /// Accepted for compatibility; resolution always takes the first result.
    pub index: usize,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            limit: 1,
            sort_dir: SortDir::Descending,
            index: 0,
        }
    }
}

impl LookupOptions {
    fn paging(&self) -> Paging {
        Paging {
            limit: self.limit,
            sort_dir: self.sort_dir,
        }
    }
}

/// Resolve `(kind, name)` under `parent` to an id, creating the entity on a miss.
///
/// The first result under the server sort order wins. Collections are created
/// directly; every other kind is created by POSTing the lookup query itself.
pub fn resolve_or_create<C: ObjectStoreClient + ?Sized>(
    client: &C,
    kind: EntityKind,
    name: &str,
    parent: Option<&ParentRef>,
    options: &LookupOptions,
) -> Result<EntityRef, CuratorError> {
    if options.index != 0 {
        tracing::warn!(
            index = options.index,
            "lookup index is not honored; the first result is used"
        );
    }
    let query = query::lookup_query(kind, name, parent, options.paging());
    let matches = into_array(client.get(&query)?, &query)?;

    if let Some(first) = matches.first() {
        let id = entity_id(first, &query)?;
        tracing::debug!(%kind, name, %id, "resolved existing entity");
        return Ok(EntityRef::new(kind, id));
    }

    let created = match kind {
        EntityKind::Collection => client.create_collection(name, false)?,
        _ => client.post(&query, &[])?,
    };
    let id = entity_id(&created, &query)?;
    tracing::info!(%kind, name, %id, "created missing entity");
    Ok(EntityRef::new(kind, id))
}

/// `resolve_or_create` with default lookup options.
pub fn resolve<C: ObjectStoreClient + ?Sized>(
    client: &C,
    kind: EntityKind,
    name: &str,
    parent: Option<&ParentRef>,
) -> Result<EntityRef, CuratorError> {
    resolve_or_create(client, kind, name, parent, &LookupOptions::default())
}

pub fn find_or_create<C: ObjectStoreClient + ?Sized>(
    target: (EntityKind, &str),
    parent: &ParentRef,
    client: &C,
) -> Result<EntityRef, CuratorError> {
    let (kind, name) = target;
    resolve(client, kind, name, Some(parent))
}

pub fn default_groups() -> BTreeSet<String> {
    ["Editors", "Managers", "Users", "Viewers"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Group ids by name, creating missing groups.
pub fn get_group_ids<C: ObjectStoreClient + ?Sized>(
    client: &C,
    groups: &BTreeSet<String>,
) -> Result<BTreeMap<String, EntityId>, CuratorError> {
    groups
        .iter()
        .map(|group| {
            let entity = resolve(client, EntityKind::Group, group, None)?;
            Ok((group.clone(), entity.id))
        })
        .collect()
}

pub fn get_user_id_by_email<C: ObjectStoreClient + ?Sized>(
    client: &C,
    email: &str,
) -> Result<Option<EntityId>, CuratorError> {
    let email = email.to_lowercase();
    let query = format!("user?text={email}");
    let users = into_array(client.get(&query)?, &query)?;
    let field_is = |user: &Value, field: &str| {
        user.get(field).and_then(Value::as_str) == Some(email.as_str())
    };
    users
        .iter()
        .find(|user| field_is(user, "email") || field_is(user, "login"))
        .map(|user| entity_id(user, &query))
        .transpose()
}

/// List entities of `kind` directly under `parent`.
pub fn ls_x_in_y<C: ObjectStoreClient + ?Sized>(
    kind: EntityKind,
    parent: &ParentRef,
    client: &C,
) -> Result<Vec<Value>, CuratorError> {
    let query = query::listing_query(kind, parent);
    into_array(client.get(&query)?, &query)
}

pub fn get_files_in_item<C: ObjectStoreClient + ?Sized>(
    client: &C,
    item_id: &EntityId,
    sort: &str,
    sort_dir: SortDir,
) -> Result<Vec<Value>, CuratorError> {
    let query = query::sorted_files_query(item_id, sort, sort_dir);
    into_array(client.get(&query)?, &query)
}

const INFO_STRIPPED_FIELDS: [&str; 4] = ["_id", "_modelType", "baseParentId", "baseParentType"];

/// The entity's document with its identity fields stripped and its id kept
/// under `old_ids`, ready to recreate it elsewhere.
pub fn get_folder_or_item_info<C: ObjectStoreClient + ?Sized>(
    id: &EntityId,
    kind: EntityKind,
    client: &C,
) -> Result<Map<String, Value>, CuratorError> {
    let path = EntityRef::new(kind, id.clone()).path();
    let document = match client.get(&path)? {
        Value::Object(map) => map,
        other => {
            return Err(CuratorError::Decode(format!(
                "expected an object from {path}, got {other}"
            )));
        }
    };
    let mut info = Map::new();
    info.insert(
        "old_ids".to_string(),
        Value::Array(vec![Value::String(id.to_string())]),
    );
    info.extend(
        document
            .into_iter()
            .filter(|(key, _)| !INFO_STRIPPED_FIELDS.contains(&key.as_str())),
    );
    Ok(info)
}
