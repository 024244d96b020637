//! Builds the reply for one pipeline run.
//!
//! Pure: the only external input is the clock, passed in by the caller so
//! tests stay deterministic. Raw error text never reaches the user; every
//! failure maps to one of a small set of fixed phrases.

use chrono::{DateTime, Local};

use crate::line::flex::{FlexAction, FlexComponent, FlexContainer, Layout, OutgoingMessage};
use crate::services::drive::UploadResult;
use crate::services::staging::StagingError;
use crate::services::UploadError;

const DRIVE_ICON_URL: &str = "https://drive.google.com/favicon.ico";

/// The outcome of one pipeline run. Exactly one is produced per run.
#[derive(Debug)]
pub enum ReplyPayload {
    Success {
        result: UploadResult,
        name: String,
    },
    Error {
        reason: FailureReason,
        name: String,
    },
    UnsupportedType {
        name: String,
        allowed: Vec<String>,
    },
}

/// User-facing failure categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    TooLarge { limit: u64 },
    StorageAuth,
    StoragePermission,
    StorageNetwork,
    Internal,
}

impl FailureReason {
    /// The fixed phrase shown to the user for this category.
    pub fn user_phrase(&self) -> String {
        match self {
            FailureReason::TooLarge { limit } => {
                format!("The file exceeds the {} upload limit.", format_size(*limit))
            }
            FailureReason::StorageAuth => "The storage credential was rejected.".to_string(),
            FailureReason::StoragePermission => {
                "The upload destination is not writable.".to_string()
            }
            FailureReason::StorageNetwork => {
                "The storage service could not be reached.".to_string()
            }
            FailureReason::Internal => "The file could not be uploaded.".to_string(),
        }
    }
}

impl From<&UploadError> for FailureReason {
    fn from(error: &UploadError) -> Self {
        match error {
            UploadError::Auth(_) => FailureReason::StorageAuth,
            UploadError::Permission(_) => FailureReason::StoragePermission,
            UploadError::Network(_) => FailureReason::StorageNetwork,
            UploadError::Unknown(_) => FailureReason::Internal,
        }
    }
}

impl From<&StagingError> for FailureReason {
    fn from(error: &StagingError) -> Self {
        match error {
            StagingError::TooLarge { limit, .. } => FailureReason::TooLarge { limit: *limit },
            // UnsupportedType gets its own payload variant upstream.
            StagingError::UnsupportedType { .. } | StagingError::Io(_) => FailureReason::Internal,
        }
    }
}

/// The primary structured reply plus the plain-text fallback sent when the
/// structured one is refused.
#[derive(Debug)]
pub struct FormattedReply {
    pub primary: OutgoingMessage,
    pub fallback: String,
}

/// Render the reply for a pipeline outcome.
pub fn format_reply(payload: &ReplyPayload, now: DateTime<Local>) -> FormattedReply {
    match payload {
        ReplyPayload::Success { result, name } => {
            let size_mb = result.size_bytes as f64 / (1024.0 * 1024.0);
            let uploaded_at = now.format("%Y/%m/%d %H:%M").to_string();
            let fallback = format!(
                "✅ Uploaded {name} ({}) — {}",
                format_size(result.size_bytes),
                result.web_link
            );

            let body = FlexComponent::Box {
                layout: Layout::Vertical,
                contents: vec![
                    FlexComponent::Box {
                        layout: Layout::Horizontal,
                        spacing: Some("sm".to_string()),
                        contents: vec![
                            FlexComponent::Icon {
                                url: DRIVE_ICON_URL.to_string(),
                                size: Some("lg".to_string()),
                            },
                            FlexComponent::Text {
                                text: "Uploaded to Drive".to_string(),
                                weight: Some("bold".to_string()),
                                size: Some("xl".to_string()),
                                wrap: None,
                            },
                        ],
                    },
                    FlexComponent::line(format!("File: {name}")),
                    FlexComponent::line(format!("Size: {size_mb:.2} MB")),
                    FlexComponent::line(format!("Uploaded: {uploaded_at}")),
                ],
                spacing: None,
            };
            let footer = FlexComponent::Box {
                layout: Layout::Vertical,
                contents: vec![FlexComponent::Button {
                    style: Some("primary".to_string()),
                    action: FlexAction::Uri {
                        label: "Open file".to_string(),
                        uri: result.web_link.clone(),
                    },
                }],
                spacing: None,
            };

            FormattedReply {
                primary: OutgoingMessage::Flex {
                    alt_text: format!("Uploaded {name}"),
                    contents: FlexContainer::Bubble {
                        body,
                        footer: Some(footer),
                    },
                },
                fallback,
            }
        }

        ReplyPayload::Error { reason, name } => {
            let text = format!(
                "❌ {name} was not uploaded. {} Please contact an administrator.",
                reason.user_phrase()
            );
            FormattedReply {
                primary: OutgoingMessage::text(text.clone()),
                fallback: text,
            }
        }

        ReplyPayload::UnsupportedType { name, allowed } => {
            let text = format!(
                "⚠️ {name} is not a supported file type. Allowed: {}",
                allowed.join(", ")
            );
            FormattedReply {
                primary: OutgoingMessage::text(text.clone()),
                fallback: text,
            }
        }
    }
}

/// Human-readable size with binary (1024-based) prefixes.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
