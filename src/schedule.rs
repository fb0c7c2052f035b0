use serde_json::{Map, Value, json};

use crate::client::{ObjectStoreClient, entity_id};
use crate::domain::{EntityId, EntityKind, EntityRef, Timings};
use crate::error::CuratorError;

/// Everything `add_to_schedule` needs; the optional ids skip the
/// corresponding find-or-create step.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub frequency: String,
    pub schedules_id: EntityId,
    pub activity_item_id: EntityId,
    pub context: Value,
    pub timings: Timings,
    pub schedule_folder_id: Option<EntityId>,
    pub schedule_item_id: Option<EntityId>,
}

impl ScheduleRequest {
    pub fn new(
        frequency: impl Into<String>,
        schedules_id: EntityId,
        activity_item_id: EntityId,
    ) -> Self {
        Self {
            frequency: frequency.into(),
            schedules_id,
            activity_item_id,
            context: Value::Object(Map::new()),
            timings: Timings::default(),
            schedule_folder_id: None,
            schedule_item_id: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_schedule_folder(mut self, id: EntityId) -> Self {
        self.schedule_folder_id = Some(id);
        self
    }

    pub fn with_schedule_item(mut self, id: EntityId) -> Self {
        self.schedule_item_id = Some(id);
        self
    }
}

/// Append an activity to the schedule item for `request.frequency`, creating
/// the schedule folder and item when they are missing. Returns the schedule
/// item's id.
pub fn add_to_schedule<C: ObjectStoreClient + ?Sized>(
    client: &C,
    request: &ScheduleRequest,
) -> Result<EntityId, CuratorError> {
    let timing = request.timings.get(&request.frequency)?;

    let folder_id = match &request.schedule_folder_id {
        Some(id) => id.clone(),
        None => {
            let parent = EntityRef::new(EntityKind::Collection, request.schedules_id.clone());
            let folder = client.create_folder(timing, &parent, false, true)?;
            entity_id(&folder, "schedule folder")?
        }
    };

    let item_id = match &request.schedule_item_id {
        Some(id) => id.clone(),
        None => {
            let name = format!("Version 0 {timing}");
            let item = client.create_item(&name, &folder_id, true)?;
            entity_id(&item, "schedule item")?
        }
    };

    let schedule_item = client.get(&format!("item/{item_id}"))?;
    let mut metadata = match schedule_item.get("meta") {
        Some(Value::Object(meta)) => meta.clone(),
        _ => Map::new(),
    };
    if !metadata.contains_key("@context") {
        metadata.insert("@context".to_string(), request.context.clone());
    }

    let activity = client.get(&format!("item/{}", request.activity_item_id))?;
    let activity_name = activity
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| CuratorError::MissingField {
            field: "name".to_string(),
            context: format!("item/{}", request.activity_item_id),
        })?;
    let entry = json!({
        "@id": format!("item/{}", request.activity_item_id),
        "name": activity_name,
    });
    match metadata.get_mut("activities") {
        Some(Value::Array(activities)) => activities.push(entry),
        None | Some(Value::Null) => {
            metadata.insert("activities".to_string(), Value::Array(vec![entry]));
        }
        Some(other) => {
            return Err(CuratorError::Decode(format!(
                "schedule item {item_id} holds non-list activities: {other}"
            )));
        }
    }

    let metadata = drop_empty_keys(metadata);
    client.add_metadata_to_item(&item_id, &Value::Object(metadata))?;
    tracing::info!(
        frequency = %request.frequency,
        %item_id,
        activity = %request.activity_item_id,
        "added activity to schedule"
    );
    Ok(item_id)
}

/// Remove top-level keys whose value is null, an empty string, an empty list
/// or an empty object.
pub fn drop_empty_keys(mut map: Map<String, Value>) -> Map<String, Value> {
    map.retain(|_, value| !is_empty(value));
    map
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
