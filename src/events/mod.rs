use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::models::RequestStatus;

/// Events emitted by the services layer. Consumed by the background
/// processor for audit logging; the email side effects (guest verification,
/// review notifications) hang off the same stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    RequestCreated {
        request_id: Uuid,
        auto_approved: bool,
    },
    RequestStatusChanged {
        request_id: Uuid,
        old_status: RequestStatus,
        new_status: RequestStatus,
    },
    GuestRequestSubmitted {
        request_id: Uuid,
        guest_id: Uuid,
    },
    GuestConfirmed {
        guest_id: Uuid,
    },
    ItemCreated(Uuid),
    ItemUpdated(Uuid),
    ItemDeleted(Uuid),
    AnalysisTaskDispatched {
        task_id: String,
    },
    AnalysisTaskFinished {
        task_id: String,
        succeeded: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background consumer draining the event channel. Runs until every sender
/// is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::RequestCreated {
                request_id,
                auto_approved,
            } => {
                info!(request_id = %request_id, auto_approved, "request created");
            }
            Event::RequestStatusChanged {
                request_id,
                old_status,
                new_status,
            } => {
                info!(request_id = %request_id, %old_status, %new_status, "request status changed");
            }
            Event::GuestRequestSubmitted { request_id, guest_id } => {
                info!(request_id = %request_id, guest_id = %guest_id, "guest request submitted");
            }
            Event::GuestConfirmed { guest_id } => {
                info!(guest_id = %guest_id, "guest email confirmed");
            }
            Event::ItemCreated(id) | Event::ItemUpdated(id) | Event::ItemDeleted(id) => {
                info!(item_id = %id, event = ?event, "item event");
            }
            Event::AnalysisTaskDispatched { task_id } => {
                info!(task_id = %task_id, "analysis task dispatched");
            }
            Event::AnalysisTaskFinished { task_id, succeeded } => {
                info!(task_id = %task_id, succeeded, "analysis task finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::ItemCreated(Uuid::new_v4()))
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(Event::ItemCreated(_))));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::GuestConfirmed {
                guest_id: Uuid::new_v4()
            })
            .await
            .is_err());
    }
}
