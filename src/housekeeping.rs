use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::{ObjectStoreClient, entity_id, into_array};
use crate::domain::{EntityId, EntityKind, EntityRef, ParentRef};
use crate::error::CuratorError;
use crate::query;
use crate::resolver::get_folder_or_item_info;

pub fn mv<C: ObjectStoreClient + ?Sized>(
    entity: &EntityRef,
    new_parent: &ParentRef,
    client: &C,
) -> Result<Value, CuratorError> {
    client.put(&query::move_query(entity, new_parent), &[])
}

pub fn rename<C: ObjectStoreClient + ?Sized>(
    entity: &EntityRef,
    new_name: &str,
    client: &C,
) -> Result<Value, CuratorError> {
    client.put(&query::rename_query(entity, new_name), &[])
}

/// Replace an item with a folder of the same name, metadata and description
/// holding the item's files. Returns the new folder's id.
pub fn move_item_to_folder<C: ObjectStoreClient + ?Sized>(
    item_id: &EntityId,
    client: &C,
) -> Result<EntityId, CuratorError> {
    let info = get_folder_or_item_info(item_id, EntityKind::Item, client)?;
    let info_str = |field: &str| {
        info.get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| CuratorError::MissingField {
                field: field.to_string(),
                context: "item info".to_string(),
            })
    };
    let name = info_str("name")?;
    let folder_id = info_str("folderId")?;
    let empty = Value::Object(Map::new());
    let metadata = serde_json::to_string(info.get("meta").unwrap_or(&empty))
        .map_err(|err| CuratorError::Decode(err.to_string()))?;
    let mut params = vec![
        ("name", name),
        ("parentId", folder_id),
        ("parentType", "folder"),
        ("reuseExisting", "true"),
        ("metadata", metadata.as_str()),
    ];
    if let Some(description) = info.get("description").and_then(Value::as_str) {
        params.push(("description", description));
    }

    let files_query = query::files_query(item_id);
    let files = into_array(client.get(&files_query)?, &files_query)?;

    let staging = tempfile::Builder::new()
        .prefix("girder-curator-item")
        .tempdir()
        .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
    let mut staged = Vec::with_capacity(files.len());
    for (position, file) in files.iter().enumerate() {
        let file_id = entity_id(file, &files_query)?;
        let file_name = required_str(file, "name", &files_query)?;
        // Staged by position; remote names may repeat or hold path separators.
        let destination = staging.path().join(position.to_string());
        client.download_file(&file_id, &destination)?;
        staged.push((destination, file_name.to_string()));
    }

    // Removed only after every file is staged.
    client.delete(&format!("item/{item_id}"))?;

    let folder = client.post("folder", &params)?;
    let new_folder = EntityRef::new(EntityKind::Folder, entity_id(&folder, "promoted folder")?);

    for (path, file_name) in &staged {
        client.upload_file(&new_folder, path, file_name)?;
    }
    tracing::info!(
        item = %item_id,
        folder = %new_folder.id,
        files = staged.len(),
        "replaced item with folder"
    );
    Ok(new_folder.id)
}

fn required_str<'a>(value: &'a Value, field: &str, context: &str) -> Result<&'a str, CuratorError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| CuratorError::MissingField {
            field: field.to_string(),
            context: context.to_string(),
        })
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionRow {
    pub id: EntityId,
    pub name: Option<String>,
    pub deleted: bool,
    pub document: Value,
}

/// Delete every collection whose id is not in `except`.
///
/// Returns one row per collection, kept rows first.
pub fn delete_collections<C: ObjectStoreClient + ?Sized>(
    client: &C,
    except: &BTreeSet<EntityId>,
) -> Result<Vec<DeletionRow>, CuratorError> {
    let listed = client.list_collections()?;
    sweep(client, EntityKind::Collection, listed, except, |id| {
        client.get_collection(id)
    })
}

/// Delete every user whose id is not in `except`.
pub fn delete_users<C: ObjectStoreClient + ?Sized>(
    client: &C,
    except: &BTreeSet<EntityId>,
) -> Result<Vec<DeletionRow>, CuratorError> {
    let listed = client.list_users()?;
    sweep(client, EntityKind::User, listed, except, |id| client.get_user(id))
}

fn sweep<C, F>(
    client: &C,
    kind: EntityKind,
    listed: Vec<Value>,
    except: &BTreeSet<EntityId>,
    fetch: F,
) -> Result<Vec<DeletionRow>, CuratorError>
where
    C: ObjectStoreClient + ?Sized,
    F: Fn(&EntityId) -> Result<Value, CuratorError>,
{
    let mut kept = Vec::new();
    let mut doomed = Vec::new();
    for entry in &listed {
        let id = entity_id(entry, kind.as_str())?;
        let document = fetch(&id)?;
        let row = DeletionRow {
            name: document
                .get("name")
                .or_else(|| document.get("login"))
                .and_then(Value::as_str)
                .map(str::to_string),
            deleted: !except.contains(&id),
            id,
            document,
        };
        if row.deleted {
            doomed.push(row);
        } else {
            kept.push(row);
        }
    }

    for row in &doomed {
        client.delete(&EntityRef::new(kind, row.id.clone()).path())?;
        tracing::warn!(%kind, id = %row.id, name = ?row.name, "deleted");
    }
    kept.extend(doomed);
    Ok(kept)
}
