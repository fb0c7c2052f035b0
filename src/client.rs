use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::{EntityId, EntityRef, ParentRef};
use crate::error::CuratorError;

pub const TOKEN_HEADER: &str = "Girder-Token";

/// The remote document store.
///
/// Paths are relative to the API root and may carry a query string
/// (`folder?name=Schedules&parentType=collection&parentId=...`). The provided
/// methods are built on the required ones, so test doubles only implement the
/// raw verbs.
pub trait ObjectStoreClient: Send + Sync {
    fn get(&self, path: &str) -> Result<Value, CuratorError>;
    fn post(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, CuratorError>;
    fn put(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, CuratorError>;
    fn put_json(&self, path: &str, body: &Value) -> Result<Value, CuratorError>;
    fn delete(&self, path: &str) -> Result<Value, CuratorError>;
    fn upload_file(
        &self,
        parent: &ParentRef,
        source: &Path,
        name: &str,
    ) -> Result<Value, CuratorError>;
    fn download_file(&self, file_id: &EntityId, destination: &Path) -> Result<(), CuratorError>;

    fn create_collection(&self, name: &str, public: bool) -> Result<Value, CuratorError> {
        self.post(
            "collection",
            &[("name", name), ("public", bool_param(public))],
        )
    }

    fn create_folder(
        &self,
        name: &str,
        parent: &ParentRef,
        public: bool,
        reuse_existing: bool,
    ) -> Result<Value, CuratorError> {
        self.post(
            "folder",
            &[
                ("name", name),
                ("parentId", parent.id.as_str()),
                ("parentType", parent.kind.as_str()),
                ("public", bool_param(public)),
                ("reuseExisting", bool_param(reuse_existing)),
            ],
        )
    }

    fn create_item(
        &self,
        name: &str,
        folder_id: &EntityId,
        reuse_existing: bool,
    ) -> Result<Value, CuratorError> {
        self.post(
            "item",
            &[
                ("name", name),
                ("folderId", folder_id.as_str()),
                ("reuseExisting", bool_param(reuse_existing)),
            ],
        )
    }

    fn add_metadata_to_item(
        &self,
        item_id: &EntityId,
        metadata: &Value,
    ) -> Result<Value, CuratorError> {
        self.put_json(&format!("item/{item_id}/metadata"), metadata)
    }

    /// Replace an entity's metadata through its own resource.
    fn set_metadata(&self, entity: &EntityRef, metadata: &Value) -> Result<Value, CuratorError> {
        let encoded =
            serde_json::to_string(metadata).map_err(|err| CuratorError::Decode(err.to_string()))?;
        self.put(&entity.path(), &[("metadata", encoded.as_str())])
    }

    fn list_collections(&self) -> Result<Vec<Value>, CuratorError> {
        into_array(self.get("collection")?, "collection")
    }

    fn list_users(&self) -> Result<Vec<Value>, CuratorError> {
        into_array(self.get("user")?, "user")
    }

    fn get_collection(&self, id: &EntityId) -> Result<Value, CuratorError> {
        self.get(&format!("collection/{id}"))
    }

    fn get_user(&self, id: &EntityId) -> Result<Value, CuratorError> {
        self.get(&format!("user/{id}"))
    }
}

fn bool_param(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Expect a JSON array, as every listing endpoint returns.
pub fn into_array(value: Value, context: &str) -> Result<Vec<Value>, CuratorError> {
    match value {
        Value::Array(values) => Ok(values),
        other => Err(CuratorError::Decode(format!(
            "expected a list from {context}, got {other}"
        ))),
    }
}

/// Pull `_id` out of an entity document.
pub fn entity_id(value: &Value, context: &str) -> Result<EntityId, CuratorError> {
    value
        .get("_id")
        .and_then(Value::as_str)
        .map(EntityId::new)
        .ok_or_else(|| CuratorError::MissingField {
            field: "_id".to_string(),
            context: context.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Password { user: String, password: String },
    ApiKey { key: String },
}

#[derive(Clone)]
pub struct GirderHttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl fmt::Debug for GirderHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GirderHttpClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl GirderHttpClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, CuratorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("girder-curator/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CuratorError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| CuratorError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base_url: api_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Build a client and exchange the credentials for a session token.
    pub fn connect(
        api_url: &str,
        timeout: Duration,
        credentials: &Credentials,
    ) -> Result<Self, CuratorError> {
        let mut client = Self::new(api_url, timeout)?;
        client.authenticate(credentials)?;
        Ok(client)
    }

    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<(), CuratorError> {
        let response = match credentials {
            Credentials::Password { user, password } => self.send(
                self.client
                    .get(self.url("user/authentication"))
                    .basic_auth(user, Some(password)),
            )?,
            Credentials::ApiKey { key } => self.send(
                self.client
                    .post(self.url("api_key/token"))
                    .query(&[("key", key.as_str())]),
            )?,
        };
        let token = response
            .pointer("/authToken/token")
            .and_then(Value::as_str)
            .ok_or_else(|| CuratorError::MissingField {
                field: "authToken.token".to_string(),
                context: "authentication".to_string(),
            })?;
        self.token = Some(token.to_string());
        tracing::info!(api_url = %self.base_url, "authenticated");
        Ok(())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    fn execute(&self, request: RequestBuilder) -> Result<Response, CuratorError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|err| CuratorError::Http(err.to_string()))?;
        Self::handle_status(response)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, CuratorError> {
        let response = self.execute(request)?;
        let body = response
            .text()
            .map_err(|err| CuratorError::Http(err.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| CuratorError::Decode(err.to_string()))
    }

    fn handle_status(response: Response) -> Result<Response, CuratorError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "object store request failed".to_string());
        Err(CuratorError::Status { status, message })
    }
}

impl ObjectStoreClient for GirderHttpClient {
    fn get(&self, path: &str) -> Result<Value, CuratorError> {
        tracing::debug!(path, "GET");
        self.send(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, CuratorError> {
        tracing::debug!(path, "POST");
        self.send(self.client.post(self.url(path)).query(params))
    }

    fn put(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, CuratorError> {
        tracing::debug!(path, "PUT");
        self.send(self.client.put(self.url(path)).query(params))
    }

    fn put_json(&self, path: &str, body: &Value) -> Result<Value, CuratorError> {
        tracing::debug!(path, "PUT json");
        self.send(self.client.put(self.url(path)).json(body))
    }

    fn delete(&self, path: &str) -> Result<Value, CuratorError> {
        tracing::debug!(path, "DELETE");
        self.send(self.client.delete(self.url(path)))
    }

    fn upload_file(
        &self,
        parent: &ParentRef,
        source: &Path,
        name: &str,
    ) -> Result<Value, CuratorError> {
        let bytes = std::fs::read(source).map_err(|err| {
            CuratorError::Filesystem(format!("read {}: {err}", source.display()))
        })?;
        let size = bytes.len().to_string();
        let upload = self.post(
            "file",
            &[
                ("parentType", parent.kind.as_str()),
                ("parentId", parent.id.as_str()),
                ("name", name),
                ("size", size.as_str()),
            ],
        )?;
        if bytes.is_empty() {
            // The store finalizes empty uploads immediately and returns the file.
            return Ok(upload);
        }
        let upload_id = entity_id(&upload, "file upload")?;
        tracing::debug!(%upload_id, size = %size, "uploading file chunk");
        self.send(
            self.client
                .post(self.url("file/chunk"))
                .query(&[("uploadId", upload_id.as_str()), ("offset", "0")])
                .body(bytes),
        )
    }

    fn download_file(&self, file_id: &EntityId, destination: &Path) -> Result<(), CuratorError> {
        let mut response =
            self.execute(self.client.get(self.url(&format!("file/{file_id}/download"))))?;
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        }
        let mut file = File::create(destination)
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
