//! JSON control protocol.
//!
//! Inbound:
//!
//! ```json
//! {"type": "subscribe", "subscription_id": "optional",
//!  "event_types": ["accident"], "priorities": ["critical"],
//!  "location_filters": [{"center_lng": 120.1, "center_lat": 30.2, "radius_km": 5}]}
//! {"type": "unsubscribe", "subscription_id": "..."}
//! ```
//!
//! Omitted `event_types` or `priorities` accept everything; an explicit
//! empty list accepts nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::connection::ConnectionId;
use crate::events::{Event, EventType, LocationFilter, Priority};

fn all_event_types() -> Vec<EventType> {
    EventType::ALL.to_vec()
}

fn all_priorities() -> Vec<Priority> {
    Priority::ALL.to_vec()
}

/// Message from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(default)]
        subscription_id: Option<String>,
        #[serde(default = "all_event_types")]
        event_types: Vec<EventType>,
        #[serde(default = "all_priorities")]
        priorities: Vec<Priority>,
        #[serde(default)]
        location_filters: Vec<LocationFilter>,
    },
    Unsubscribe {
        subscription_id: String,
    },
}

/// Message to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        connection_id: ConnectionId,
        timestamp: DateTime<Utc>,
    },
    SubscriptionConfirmed {
        subscription_id: String,
        timestamp: DateTime<Utc>,
    },
    UnsubscriptionConfirmed {
        subscription_id: String,
        timestamp: DateTime<Utc>,
    },
    TrafficEvent {
        /// Set when the frame is delivered on behalf of a subscription.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subscription_id: Option<String>,
        data: Event,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serializes the message. Falls back to an error frame if the payload
    /// cannot be encoded.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":{}}}"#,
                serde_json::Value::String(format!("encoding failed: {}", e))
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscribe_with_defaults() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"subscribe"}"#).unwrap();
        match msg {
            ClientMessage::Subscribe {
                subscription_id,
                event_types,
                priorities,
                location_filters,
            } => {
                assert!(subscription_id.is_none());
                assert_eq!(event_types.len(), EventType::ALL.len());
                assert_eq!(priorities.len(), 4);
                assert!(location_filters.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_subscribe_full() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"subscribe","subscription_id":"s1","event_types":["accident","road_closure"],
                "priorities":["critical"],
                "location_filters":[{"center_lng":120.1,"center_lat":30.2,"radius_km":5.0}]}"#,
        )
        .unwrap();
        let ClientMessage::Subscribe {
            subscription_id,
            event_types,
            location_filters,
            ..
        } = msg
        else {
            panic!("expected subscribe");
        };
        assert_eq!(subscription_id.as_deref(), Some("s1"));
        assert_eq!(event_types, vec![EventType::Accident, EventType::RoadClosure]);
        assert_eq!(location_filters[0].radius_km, 5.0);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(
            r#"{"type":"subscribe","event_types":["meteor"]}"#
        )
        .is_err());
    }

    #[test]
    fn test_server_envelopes() {
        let now = Utc::now();
        let json = ServerMessage::SubscriptionConfirmed {
            subscription_id: "s1".into(),
            timestamp: now,
        }
        .to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "subscription_confirmed");
        assert_eq!(value["subscription_id"], "s1");

        let value: serde_json::Value =
            serde_json::from_str(&ServerMessage::error("bad input").to_json()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "bad input");
    }
}
