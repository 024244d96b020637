use serde::Deserialize;

/// The webhook request body: a batch of events for one bot destination.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One inbound event. Only message events matter to the relay; everything
/// else (follow, join, unsend, ...) decodes into `Other` and is skipped.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookEvent {
    #[serde(rename_all = "camelCase")]
    Message {
        reply_token: String,
        #[serde(default)]
        source: Option<EventSource>,
        message: MessageContent,
    },
    #[serde(other)]
    Other,
}

/// Who sent the event: a user, group, or room.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventSource {
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl EventSource {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            EventSource::User { user_id } => format!("user {user_id}"),
            EventSource::Group { group_id, .. } => format!("group {group_id}"),
            EventSource::Room { room_id, .. } => format!("room {room_id}"),
        }
    }
}

/// The message attached to a message event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    #[serde(rename_all = "camelCase")]
    File {
        id: String,
        #[serde(default)]
        file_name: String,
        #[serde(default)]
        file_size: u64,
    },
    #[serde(rename_all = "camelCase")]
    Image { id: String },
    #[serde(rename_all = "camelCase")]
    Text { id: String, text: String },
    #[serde(other)]
    Other,
}
