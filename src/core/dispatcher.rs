//! Broadcast dispatch policy
//!
//! A room broadcast is resolved into one wire message per recipient.
//! Hybrid payloads carry a structured `json` view and/or a rendered `html`
//! view: display clients get the `json` view verbatim, standard clients get
//! the `html` view wrapped in a `view_update` envelope, and a recipient whose
//! view is absent gets nothing. Flat payloads go to everyone unchanged.

use serde_json::Value;

use crate::core::client::ClientKind;
use crate::core::message_types::ServerMessage;

/// Key of the structured view in a hybrid payload
pub const JSON_VIEW_KEY: &str = "json";
/// Key of the rendered view in a hybrid payload
pub const HTML_VIEW_KEY: &str = "html";

/// A logical broadcast, before per-recipient resolution
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastPayload {
    /// Opaque payload delivered byte-identical to every recipient
    Flat(String),
    /// Alternate renderings keyed by recipient capability
    Hybrid {
        json: Option<Value>,
        html: Option<Value>,
    },
}

impl BroadcastPayload {
    /// Classify a raw payload. Any JSON object carrying a `json` or `html`
    /// key is hybrid, everything else is flat.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(mut map))
                if map.contains_key(JSON_VIEW_KEY) || map.contains_key(HTML_VIEW_KEY) =>
            {
                BroadcastPayload::Hybrid {
                    json: map.remove(JSON_VIEW_KEY),
                    html: map.remove(HTML_VIEW_KEY),
                }
            }
            _ => BroadcastPayload::Flat(raw),
        }
    }

    /// The wire message for one recipient, or None to skip it
    pub fn render_for(&self, kind: ClientKind) -> Option<String> {
        match self {
            BroadcastPayload::Flat(raw) => Some(raw.clone()),
            BroadcastPayload::Hybrid { json, html } => match kind {
                ClientKind::DisplayView => json.as_ref().map(Value::to_string),
                ClientKind::Standard => html.as_ref().map(|html| {
                    ServerMessage::ViewUpdate { html: html.clone() }.to_json()
                }),
            },
        }
    }
}

impl From<String> for BroadcastPayload {
    fn from(raw: String) -> Self {
        BroadcastPayload::from_raw(raw)
    }
}

impl From<&str> for BroadcastPayload {
    fn from(raw: &str) -> Self {
        BroadcastPayload::from_raw(raw)
    }
}

impl From<ServerMessage> for BroadcastPayload {
    fn from(message: ServerMessage) -> Self {
        BroadcastPayload::Flat(message.to_json())
    }
}

/// Renders a payload once per capability and hands out the cached result
pub struct Dispatch<'a> {
    payload: &'a BroadcastPayload,
    standard: Option<Option<String>>,
    display: Option<Option<String>>,
}

impl<'a> Dispatch<'a> {
    pub fn new(payload: &'a BroadcastPayload) -> Self {
        Self {
            payload,
            standard: None,
            display: None,
        }
    }

    pub fn message_for(&mut self, kind: ClientKind) -> Option<String> {
        let payload = self.payload;
        let slot = match kind {
            ClientKind::Standard => &mut self.standard,
            ClientKind::DisplayView => &mut self.display,
        };
        slot.get_or_insert_with(|| payload.render_for(kind)).clone()
    }
}
