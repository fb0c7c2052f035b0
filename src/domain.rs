use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CuratorError;

/// Entity kinds exposed by the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Collection,
    Folder,
    Item,
    File,
    User,
    Group,
}

impl EntityKind {
    /// Lowercase name used in API paths and `parentType` parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Collection => "collection",
            EntityKind::Folder => "folder",
            EntityKind::Item => "item",
            EntityKind::File => "file",
            EntityKind::User => "user",
            EntityKind::Group => "group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "collection" => Ok(EntityKind::Collection),
            "folder" => Ok(EntityKind::Folder),
            "item" => Ok(EntityKind::Item),
            "file" => Ok(EntityKind::File),
            "user" => Ok(EntityKind::User),
            "group" => Ok(EntityKind::Group),
            _ => Err(CuratorError::InvalidKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// `<kind>/<id>`, the path of the entity's own resource.
    pub fn path(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for EntityRef {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, id) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| CuratorError::InvalidEntityRef(value.to_string()))?;
        if id.is_empty() {
            return Err(CuratorError::InvalidEntityRef(value.to_string()));
        }
        Ok(Self {
            kind: kind.parse()?,
            id: EntityId::new(id),
        })
    }
}

/// The scope a lookup or creation happens under.
pub type ParentRef = EntityRef;

/// Frequency to schedule-name mapping used by `add_to_schedule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timings(BTreeMap<String, String>);

impl Timings {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    pub fn get(&self, frequency: &str) -> Result<&str, CuratorError> {
        self.0
            .get(frequency)
            .map(String::as_str)
            .ok_or_else(|| CuratorError::UnknownFrequency(frequency.to_string()))
    }

    pub fn frequencies(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Default for Timings {
    fn default() -> Self {
        let entries = [
            ("1d", "Daily"),
            ("1", "Once"),
            ("8h", "3×Daily"),
            ("12h", "2×Daily"),
        ]
        .into_iter()
        .map(|(frequency, name)| (frequency.to_string(), name.to_string()))
        .collect();
        Self(entries)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Ascending,
    #[default]
    Descending,
}

impl SortDir {
    pub fn as_i8(&self) -> i8 {
        match self {
            SortDir::Ascending => 1,
            SortDir::Descending => -1,
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

impl FromStr for SortDir {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1" | "asc" => Ok(SortDir::Ascending),
            "-1" | "desc" => Ok(SortDir::Descending),
            other => Err(CuratorError::InvalidKind(format!("sort direction {other}"))),
        }
    }
}
