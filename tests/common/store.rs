use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use girder_curator::client::ObjectStoreClient;
use girder_curator::domain::{EntityId, EntityKind, ParentRef};
use girder_curator::error::CuratorError;
use serde_json::{Map, Value, json};

/// One request seen by the mock, with path and form parameters merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub route: String,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct Doc {
    id: String,
    kind: EntityKind,
    name: String,
    parent_kind: Option<EntityKind>,
    parent_id: Option<String>,
    meta: Option<Value>,
    extra: Map<String, Value>,
    omitted: Vec<String>,
    bytes: Vec<u8>,
}

impl Doc {
    fn to_json(&self) -> Value {
        let mut doc = self.extra.clone();
        doc.insert("_id".to_string(), json!(self.id));
        doc.insert("_modelType".to_string(), json!(self.kind.as_str()));
        doc.insert("name".to_string(), json!(self.name));
        if let (Some(kind), Some(parent_id)) = (self.parent_kind, &self.parent_id) {
            match kind {
                EntityKind::Folder if self.kind == EntityKind::Item => {
                    doc.insert("folderId".to_string(), json!(parent_id));
                }
                EntityKind::Item => {
                    doc.insert("itemId".to_string(), json!(parent_id));
                }
                _ => {
                    doc.insert("parentCollection".to_string(), json!(kind.as_str()));
                    doc.insert("parentId".to_string(), json!(parent_id));
                }
            }
            doc.insert("baseParentId".to_string(), json!("base"));
            doc.insert("baseParentType".to_string(), json!("collection"));
        }
        if let Some(meta) = &self.meta {
            doc.insert("meta".to_string(), meta.clone());
        }
        for field in &self.omitted {
            doc.remove(field);
        }
        Value::Object(doc)
    }
}

#[derive(Default)]
struct State {
    docs: Vec<Doc>,
    calls: Vec<Call>,
    next_id: usize,
}

/// In-memory stand-in for the document store.
///
/// Understands the paths the library issues, keeps entities in creation order
/// (listings with `sortdir=-1` return the newest first) and records every call.
#[derive(Default)]
pub struct MockStore {
    state: Mutex<State>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity and return its id.
    pub fn insert(
        &self,
        kind: EntityKind,
        name: &str,
        parent: Option<(EntityKind, &str)>,
        meta: Option<Value>,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, kind);
        state.docs.push(Doc {
            id: id.clone(),
            kind,
            name: name.to_string(),
            parent_kind: parent.map(|(kind, _)| kind),
            parent_id: parent.map(|(_, id)| id.to_string()),
            meta,
            extra: Map::new(),
            omitted: Vec::new(),
            bytes: Vec::new(),
        });
        id
    }

    pub fn insert_user(&self, login: &str, email: &str) -> String {
        let id = self.insert(EntityKind::User, login, None, None);
        self.set_extra(&id, "login", json!(login));
        self.set_extra(&id, "email", json!(email));
        id
    }

    pub fn insert_file(&self, item_id: &str, name: &str, bytes: &[u8]) -> String {
        let id = self.insert(EntityKind::File, name, Some((EntityKind::Item, item_id)), None);
        let mut state = self.state.lock().unwrap();
        if let Some(doc) = state.docs.iter_mut().find(|doc| doc.id == id) {
            doc.bytes = bytes.to_vec();
        }
        id
    }

    pub fn set_extra(&self, id: &str, key: &str, value: Value) {
        let mut state = self.state.lock().unwrap();
        if let Some(doc) = state.docs.iter_mut().find(|doc| doc.id == id) {
            doc.extra.insert(key.to_string(), value);
        }
    }

    /// Leave `key` out of every document served for `id`.
    pub fn omit_field(&self, id: &str, key: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(doc) = state.docs.iter_mut().find(|doc| doc.id == id) {
            doc.omitted.push(key.to_string());
        }
    }

    pub fn document(&self, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.docs.iter().find(|doc| doc.id == id).map(Doc::to_json)
    }

    pub fn meta(&self, id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .docs
            .iter()
            .find(|doc| doc.id == id)
            .and_then(|doc| doc.meta.clone())
    }

    pub fn file_bytes(&self, id: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .docs
            .iter()
            .find(|doc| doc.id == id)
            .map(|doc| doc.bytes.clone())
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        let state = self.state.lock().unwrap();
        state.docs.iter().filter(|doc| doc.kind == kind).count()
    }

    pub fn children(&self, kind: EntityKind, parent_id: &str) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state
            .docs
            .iter()
            .filter(|doc| doc.kind == kind && doc.parent_id.as_deref() == Some(parent_id))
            .map(Doc::to_json)
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_with(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn record(&self, method: &'static str, path: &str, params: &[(&str, &str)]) -> Call {
        let (route, query) = path.split_once('?').unwrap_or((path, ""));
        let mut merged = BTreeMap::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            merged.insert(key.to_string(), value.to_string());
        }
        for (key, value) in params {
            merged.insert(key.to_string(), value.to_string());
        }
        let call = Call {
            method,
            route: route.to_string(),
            params: merged,
        };
        self.state.lock().unwrap().calls.push(call.clone());
        call
    }
}

fn next_id(state: &mut State, kind: EntityKind) -> String {
    state.next_id += 1;
    format!("{}-{}", kind.as_str(), state.next_id)
}

fn not_found(route: &str) -> CuratorError {
    CuratorError::Status {
        status: 400,
        message: format!("invalid ObjectId or missing resource: {route}"),
    }
}

fn matches_scope(doc: &Doc, params: &BTreeMap<String, String>) -> bool {
    if let Some(folder_id) = params.get("folderId") {
        return doc.parent_id.as_deref() == Some(folder_id.as_str());
    }
    match (params.get("parentType"), params.get("parentId")) {
        (Some(kind), Some(id)) => {
            doc.parent_kind.map(|k| k.as_str()) == Some(kind.as_str())
                && doc.parent_id.as_deref() == Some(id.as_str())
        }
        _ => true,
    }
}

fn listing(state: &State, kind: EntityKind, params: &BTreeMap<String, String>) -> Value {
    let mut found: Vec<&Doc> = state
        .docs
        .iter()
        .filter(|doc| doc.kind == kind)
        .filter(|doc| match params.get("name") {
            Some(name) => &doc.name == name,
            None => true,
        })
        .filter(|doc| match params.get("text") {
            Some(text) => {
                doc.name.contains(text.as_str())
                    || doc
                        .extra
                        .values()
                        .any(|value| value.as_str() == Some(text.as_str()))
            }
            None => true,
        })
        .filter(|doc| matches_scope(doc, params))
        .collect();
    if params.get("sortdir").map(String::as_str) == Some("-1") {
        found.reverse();
    }
    if let Some(limit) = params.get("limit").and_then(|limit| limit.parse::<usize>().ok()) {
        found.truncate(limit);
    }
    Value::Array(found.into_iter().map(Doc::to_json).collect())
}

fn find_by_path<'a>(state: &'a mut State, route: &str) -> Option<&'a mut Doc> {
    let (kind, id) = route.split_once('/')?;
    let kind: EntityKind = kind.parse().ok()?;
    state
        .docs
        .iter_mut()
        .find(|doc| doc.kind == kind && doc.id == id)
}

impl ObjectStoreClient for MockStore {
    fn get(&self, path: &str) -> Result<Value, CuratorError> {
        let call = self.record("GET", path, &[]);
        let state = self.state.lock().unwrap();
        if let Some(item_id) = call
            .route
            .strip_prefix("item/")
            .and_then(|rest| rest.strip_suffix("/files"))
        {
            let files = state
                .docs
                .iter()
                .filter(|doc| doc.kind == EntityKind::File && doc.parent_id.as_deref() == Some(item_id))
                .map(Doc::to_json)
                .collect();
            return Ok(Value::Array(files));
        }
        if let Ok(kind) = call.route.parse::<EntityKind>() {
            return Ok(listing(&state, kind, &call.params));
        }
        let (kind, id) = call
            .route
            .split_once('/')
            .ok_or_else(|| not_found(&call.route))?;
        state
            .docs
            .iter()
            .find(|doc| doc.kind.as_str() == kind && doc.id == id)
            .map(Doc::to_json)
            .ok_or_else(|| not_found(&call.route))
    }

    fn post(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, CuratorError> {
        let call = self.record("POST", path, params);
        let kind: EntityKind = call.route.parse()?;
        let name = call
            .params
            .get("name")
            .or_else(|| call.params.get("text"))
            .cloned()
            .unwrap_or_default();
        let parent = match (call.params.get("folderId"), call.params.get("parentId")) {
            (Some(folder), _) => Some((EntityKind::Folder, folder.clone())),
            (None, Some(parent)) => {
                let parent_kind = call
                    .params
                    .get("parentType")
                    .map(|kind| kind.parse::<EntityKind>())
                    .transpose()?
                    .unwrap_or(EntityKind::Folder);
                Some((parent_kind, parent.clone()))
            }
            (None, None) => None,
        };

        let mut state = self.state.lock().unwrap();
        if call.params.get("reuseExisting").map(String::as_str) == Some("true") {
            if let Some(existing) = state.docs.iter().find(|doc| {
                doc.kind == kind
                    && doc.name == name
                    && doc.parent_id.as_deref() == parent.as_ref().map(|(_, id)| id.as_str())
            }) {
                return Ok(existing.to_json());
            }
        }

        let meta = call
            .params
            .get("metadata")
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(|err| CuratorError::Decode(err.to_string()))?;
        let mut extra = Map::new();
        if let Some(description) = call.params.get("description") {
            extra.insert("description".to_string(), json!(description));
        }
        let id = next_id(&mut state, kind);
        let doc = Doc {
            id,
            kind,
            name,
            parent_kind: parent.as_ref().map(|(kind, _)| *kind),
            parent_id: parent.map(|(_, id)| id),
            meta,
            extra,
            omitted: Vec::new(),
            bytes: Vec::new(),
        };
        let json = doc.to_json();
        state.docs.push(doc);
        Ok(json)
    }

    fn put(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, CuratorError> {
        let call = self.record("PUT", path, params);
        let mut state = self.state.lock().unwrap();
        let doc = find_by_path(&mut state, &call.route).ok_or_else(|| not_found(&call.route))?;
        if let Some(raw) = call.params.get("metadata") {
            doc.meta = Some(
                serde_json::from_str(raw).map_err(|err| CuratorError::Decode(err.to_string()))?,
            );
        }
        if let Some(name) = call.params.get("name") {
            doc.name = name.clone();
        }
        if let Some(folder_id) = call.params.get("folderId") {
            doc.parent_kind = Some(EntityKind::Folder);
            doc.parent_id = Some(folder_id.clone());
        }
        if let (Some(kind), Some(id)) = (call.params.get("parentType"), call.params.get("parentId"))
        {
            doc.parent_kind = Some(kind.parse()?);
            doc.parent_id = Some(id.clone());
        }
        Ok(doc.to_json())
    }

    fn put_json(&self, path: &str, body: &Value) -> Result<Value, CuratorError> {
        let call = self.record("PUT", path, &[]);
        let route = call
            .route
            .strip_suffix("/metadata")
            .ok_or_else(|| not_found(&call.route))?;
        let mut state = self.state.lock().unwrap();
        let doc = find_by_path(&mut state, route).ok_or_else(|| not_found(route))?;
        let mut meta = match doc.meta.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Value::Object(update) = body {
            for (key, value) in update {
                meta.insert(key.clone(), value.clone());
            }
        }
        doc.meta = Some(Value::Object(meta));
        Ok(doc.to_json())
    }

    fn delete(&self, path: &str) -> Result<Value, CuratorError> {
        let call = self.record("DELETE", path, &[]);
        let mut state = self.state.lock().unwrap();
        let (kind, id) = call
            .route
            .split_once('/')
            .ok_or_else(|| not_found(&call.route))?;
        let before = state.docs.len();
        state
            .docs
            .retain(|doc| !(doc.kind.as_str() == kind && doc.id == id));
        if state.docs.len() == before {
            return Err(not_found(&call.route));
        }
        Ok(json!({ "message": format!("Deleted {kind} {id}.") }))
    }

    fn upload_file(
        &self,
        parent: &ParentRef,
        source: &Path,
        name: &str,
    ) -> Result<Value, CuratorError> {
        self.record(
            "UPLOAD",
            &format!("file?parentType={}&parentId={}", parent.kind, parent.id),
            &[("name", name)],
        );
        let bytes =
            std::fs::read(source).map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, EntityKind::File);
        let doc = Doc {
            id,
            kind: EntityKind::File,
            name: name.to_string(),
            parent_kind: Some(parent.kind),
            parent_id: Some(parent.id.to_string()),
            meta: None,
            extra: Map::new(),
            omitted: Vec::new(),
            bytes,
        };
        let json = doc.to_json();
        state.docs.push(doc);
        Ok(json)
    }

    fn download_file(&self, file_id: &EntityId, destination: &Path) -> Result<(), CuratorError> {
        self.record("DOWNLOAD", &format!("file/{file_id}/download"), &[]);
        let bytes = self
            .file_bytes(file_id.as_str())
            .ok_or_else(|| not_found(file_id.as_str()))?;
        std::fs::write(destination, bytes).map_err(|err| CuratorError::Filesystem(err.to_string()))
    }
}
