//! Typed Flex message tree.
//!
//! The reply card is a small closed set of node kinds rather than free-form
//! JSON, so a malformed card is a compile error instead of a LINE API 400.

use serde::Serialize;

/// A message sent back through the reply endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutgoingMessage {
    #[serde(rename_all = "camelCase")]
    Text { text: String },
    #[serde(rename_all = "camelCase")]
    Flex {
        alt_text: String,
        contents: FlexContainer,
    },
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingMessage::Text { text: text.into() }
    }
}

/// Top-level Flex container. Only single bubbles are used here.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlexContainer {
    #[serde(rename_all = "camelCase")]
    Bubble {
        body: FlexComponent,
        #[serde(skip_serializing_if = "Option::is_none")]
        footer: Option<FlexComponent>,
    },
}

/// Box stacking direction.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Vertical,
    Horizontal,
}

/// One node of the card tree.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlexComponent {
    #[serde(rename_all = "camelCase")]
    Box {
        layout: Layout,
        contents: Vec<FlexComponent>,
        #[serde(skip_serializing_if = "Option::is_none")]
        spacing: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        wrap: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    Icon {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Button {
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        action: FlexAction,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<String>,
    },
}

impl FlexComponent {
    /// Plain body text line, wrapped so long file names do not truncate.
    pub fn line(text: impl Into<String>) -> Self {
        FlexComponent::Text {
            text: text.into(),
            weight: None,
            size: None,
            wrap: Some(true),
        }
    }
}

/// What tapping a component does.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlexAction {
    #[serde(rename_all = "camelCase")]
    Uri { label: String, uri: String },
}
