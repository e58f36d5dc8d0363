//! Applies client control messages to the publisher.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::connection::ConnectionId;
use super::protocol::{ClientMessage, ServerMessage};
use crate::events::{EventPublisher, SubscriptionFilter};

/// Handles one inbound text frame and returns the reply for the client.
///
/// Malformed input yields an error frame; the connection stays open.
pub fn handle_client_message(
    publisher: &EventPublisher,
    connection: ConnectionId,
    text: &str,
    now: DateTime<Utc>,
) -> ServerMessage {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(connection = %connection, error = %e, "Rejected client message");
            return ServerMessage::error(format!("invalid message: {}", e));
        }
    };

    match message {
        ClientMessage::Subscribe {
            subscription_id,
            event_types,
            priorities,
            location_filters,
        } => {
            let filter = SubscriptionFilter::new(event_types, priorities, location_filters);
            match publisher.subscribe_connection(subscription_id, filter, connection) {
                Ok(id) => ServerMessage::SubscriptionConfirmed {
                    subscription_id: id,
                    timestamp: now,
                },
                Err(e) => ServerMessage::error(e.to_string()),
            }
        }
        ClientMessage::Unsubscribe { subscription_id } => {
            if publisher.unsubscribe_connection(&subscription_id, connection) {
                ServerMessage::UnsubscriptionConfirmed {
                    subscription_id,
                    timestamp: now,
                }
            } else {
                ServerMessage::error(format!("unknown subscription '{}'", subscription_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionHandle;

    fn connected(publisher: &EventPublisher) -> (ConnectionId, tokio::sync::mpsc::Receiver<String>) {
        let (handle, rx) = ConnectionHandle::channel(8);
        (publisher.register_connection(handle), rx)
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let publisher = EventPublisher::default();
        let (conn, _rx) = connected(&publisher);
        let now = Utc::now();

        let reply = handle_client_message(
            &publisher,
            conn,
            r#"{"type":"subscribe","subscription_id":"s1","event_types":["accident"]}"#,
            now,
        );
        assert_eq!(
            reply,
            ServerMessage::SubscriptionConfirmed {
                subscription_id: "s1".into(),
                timestamp: now
            }
        );
        assert_eq!(publisher.subscription_owner("s1"), Some(Some(conn)));

        let reply = handle_client_message(&publisher, conn, r#"{"type":"unsubscribe","subscription_id":"s1"}"#, now);
        assert!(matches!(reply, ServerMessage::UnsubscriptionConfirmed { .. }));
        assert_eq!(publisher.subscription_count(), 0);
    }

    #[test]
    fn test_generated_subscription_id() {
        let publisher = EventPublisher::default();
        let (conn, _rx) = connected(&publisher);
        let ServerMessage::SubscriptionConfirmed { subscription_id, .. } =
            handle_client_message(&publisher, conn, r#"{"type":"subscribe"}"#, Utc::now())
        else {
            panic!("expected confirmation");
        };
        assert!(!subscription_id.is_empty());
    }

    #[test]
    fn test_foreign_subscription_is_protected() {
        let publisher = EventPublisher::default();
        let (a, _ra) = connected(&publisher);
        let (b, _rb) = connected(&publisher);
        let now = Utc::now();

        handle_client_message(&publisher, a, r#"{"type":"subscribe","subscription_id":"mine"}"#, now);

        let hijack = handle_client_message(&publisher, b, r#"{"type":"subscribe","subscription_id":"mine"}"#, now);
        assert!(matches!(hijack, ServerMessage::Error { .. }));
        let remove = handle_client_message(&publisher, b, r#"{"type":"unsubscribe","subscription_id":"mine"}"#, now);
        assert!(matches!(remove, ServerMessage::Error { .. }));
        assert_eq!(publisher.subscription_owner("mine"), Some(Some(a)));
    }

    #[test]
    fn test_malformed_input() {
        let publisher = EventPublisher::default();
        let (conn, _rx) = connected(&publisher);
        for text in ["not json", r#"{"type":"launch"}"#, r#"{"type":"unsubscribe"}"#] {
            let reply = handle_client_message(&publisher, conn, text, Utc::now());
            assert!(matches!(reply, ServerMessage::Error { .. }), "{}", text);
        }
    }
}
