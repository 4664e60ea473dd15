use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::sync::DroppedSubmission;

/// Notifications broadcast to every connected page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Outcome of a sync pass. `dropped` lists the submissions that ran out of attempts.
    FormsSynced {
        count: usize,
        failed: usize,
        dropped: Vec<DroppedSubmission>,
    },
    Reconnected,
    Disconnected,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::FormsSynced { .. } => "forms-synced",
            ClientEvent::Reconnected => "reconnected",
            ClientEvent::Disconnected => "disconnected",
        }
    }
}

pub type EventSender = broadcast::Sender<ClientEvent>;

pub fn channel() -> EventSender {
    broadcast::channel(64).0
}

/// Broadcast to whoever is listening. Having no listeners is not an error.
pub fn publish(events: &EventSender, event: ClientEvent) {
    let _ = events.send(event);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let synced = ClientEvent::FormsSynced {
            count: 2,
            failed: 1,
            dropped: vec![DroppedSubmission {
                id: 4,
                form_id: "expense-form".to_string(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&synced).unwrap(),
            json!({
                "type": "forms-synced",
                "count": 2,
                "failed": 1,
                "dropped": [{ "id": 4, "formId": "expense-form" }]
            })
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::Reconnected).unwrap(),
            json!({ "type": "reconnected" })
        );
        assert_eq!(synced.name(), "forms-synced");
    }
}
