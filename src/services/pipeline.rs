use chrono::Local;
use std::sync::Arc;

use crate::line::events::{MessageContent, WebhookEvent};
use crate::line::flex::OutgoingMessage;
use crate::line::MessagingClient;
use crate::services::formatter::{self, FailureReason, FormattedReply, ReplyPayload};
use crate::services::staging::{IncomingFile, StagedFile, StagingError, StagingManager};
use crate::services::StorageClient;

/// One linear run per event: fetch bytes, stage, upload, reply, release
/// the staged file. Errors are converted to a reply payload here and never
/// escape to the HTTP layer.
pub struct UploadPipeline {
    staging: StagingManager,
    storage: Arc<dyn StorageClient>,
    messaging: Arc<dyn MessagingClient>,
    allowed_extensions: Vec<String>,
}

impl UploadPipeline {
    pub fn new(
        staging: StagingManager,
        storage: Arc<dyn StorageClient>,
        messaging: Arc<dyn MessagingClient>,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            staging,
            storage,
            messaging,
            allowed_extensions,
        }
    }

    /// Handle one webhook event. Never fails: every error ends up either
    /// in the reply or in the log.
    pub async fn dispatch(&self, event: WebhookEvent) {
        let WebhookEvent::Message {
            reply_token,
            source,
            message,
        } = event
        else {
            tracing::debug!("ignoring non-message event");
            return;
        };

        if let Some(source) = &source {
            tracing::info!(source = %source.describe(), "📥 message event");
        }

        match message {
            MessageContent::File {
                id,
                file_name,
                file_size,
            } => {
                let incoming = IncomingFile {
                    message_id: id,
                    name: file_name,
                    declared_size: file_size,
                    mime_hint: None,
                };
                self.handle_upload(&reply_token, incoming).await;
            }
            MessageContent::Image { id } => {
                // Images carry no name; synthesize one the way file names
                // are shown in the destination folder.
                let name = format!("LINE_image_{}.jpg", Local::now().format("%Y%m%d_%H%M%S"));
                let incoming = IncomingFile {
                    message_id: id,
                    name,
                    declared_size: 0,
                    mime_hint: Some("image/jpeg".to_string()),
                };
                self.handle_upload(&reply_token, incoming).await;
            }
            MessageContent::Text { text, .. } => {
                self.handle_command(&reply_token, &text).await;
            }
            MessageContent::Other => {
                tracing::debug!("ignoring unsupported message type");
            }
        }
    }

    async fn handle_upload(&self, reply_token: &str, incoming: IncomingFile) {
        let name = incoming.name.clone();
        let (payload, staged) = self.run(incoming).await;
        let reply = formatter::format_reply(&payload, Local::now());
        self.send_reply(reply_token, reply).await;

        // The staged file outlives the reply so cleanup is the last step of
        // the run, success or failure; drop releases it either way.
        drop(staged);
        tracing::info!(name = %name, outcome = payload_kind(&payload), "pipeline run finished");
    }

    /// The upload sequence proper. Returns the reply payload plus the
    /// staged-file guard so the caller controls when the file is released.
    async fn run(&self, incoming: IncomingFile) -> (ReplyPayload, Option<StagedFile>) {
        let display_name = if incoming.name.is_empty() {
            "(unnamed file)".to_string()
        } else {
            incoming.name.clone()
        };

        let bytes = match self.messaging.get_message_content(&incoming.message_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(message_id = %incoming.message_id, error = %e, "content download failed");
                return (
                    ReplyPayload::Error {
                        reason: FailureReason::Internal,
                        name: display_name,
                    },
                    None,
                );
            }
        };

        let staged = match self.staging.stage(&incoming, &bytes) {
            Ok(staged) => staged,
            Err(StagingError::UnsupportedType { extension }) => {
                tracing::warn!(name = %display_name, extension = %extension, "rejected unsupported type");
                return (
                    ReplyPayload::UnsupportedType {
                        name: display_name,
                        allowed: self.allowed_extensions.clone(),
                    },
                    None,
                );
            }
            Err(e) => {
                tracing::error!(name = %display_name, error = %e, "staging failed");
                return (
                    ReplyPayload::Error {
                        reason: FailureReason::from(&e),
                        name: display_name,
                    },
                    None,
                );
            }
        };

        match self.storage.upload(&staged.path, &staged.name).await {
            Ok(result) => {
                tracing::info!(remote_id = %result.remote_id, link = %result.web_link, "✅ upload complete");
                (
                    ReplyPayload::Success {
                        result,
                        name: staged.name.clone(),
                    },
                    Some(staged),
                )
            }
            Err(e) => {
                tracing::error!(name = %staged.name, error = %e, "🚨 upload failed");
                (
                    ReplyPayload::Error {
                        reason: FailureReason::from(&e),
                        name: staged.name.clone(),
                    },
                    Some(staged),
                )
            }
        }
    }

    /// Recognized text commands; anything else is left alone.
    async fn handle_command(&self, reply_token: &str, text: &str) {
        let reply = match text.trim().to_lowercase().as_str() {
            "help" => OutgoingMessage::text(
                "Send a file or an image and I will upload it to Drive. \
                 Commands: help, status.",
            ),
            "status" => {
                let diag = self.storage.diagnostics().await;
                let reachability = if diag.reachable { "reachable" } else { "unreachable" };
                OutgoingMessage::text(format!(
                    "Relay v{} — destination '{}' ({}) is {}.",
                    env!("CARGO_PKG_VERSION"),
                    diag.folder_name,
                    diag.folder_id,
                    reachability
                ))
            }
            _ => return,
        };

        if let Err(e) = self.messaging.reply_message(reply_token, &[reply]).await {
            tracing::warn!(error = %e, "command reply failed");
        }
    }

    /// Exactly one reply per event; if the structured reply is refused,
    /// try the plain-text fallback once, then log and give up. The webhook
    /// response to the platform is unaffected either way.
    async fn send_reply(&self, reply_token: &str, reply: FormattedReply) {
        match self.messaging.reply_message(reply_token, &[reply.primary]).await {
            Ok(()) => {}
            Err(primary_err) => {
                tracing::warn!(error = %primary_err, "structured reply failed, sending text fallback");
                let fallback = OutgoingMessage::text(reply.fallback);
                if let Err(fallback_err) = self
                    .messaging
                    .reply_message(reply_token, &[fallback])
                    .await
                {
                    tracing::error!(error = %fallback_err, "event left unreplied");
                }
            }
        }
    }
}

fn payload_kind(payload: &ReplyPayload) -> &'static str {
    match payload {
        ReplyPayload::Success { .. } => "success",
        ReplyPayload::Error { .. } => "error",
        ReplyPayload::UnsupportedType { .. } => "unsupported_type",
    }
}
