//! Notification service trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use common::UserId;

use crate::activity::ActivityError;

/// Trait for investor notifications.
///
/// Strictly best-effort: the engine logs delivery failures and moves on.
/// A notification outage never fails or blocks a workflow.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends an event notification to a user.
    async fn send(
        &self,
        user_id: UserId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), ActivityError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<(UserId, String, serde_json::Value)>,
    fail_sends: bool,
}

/// In-memory notification service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    /// Creates a new in-memory notification service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail subsequent sends.
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.write().unwrap().fail_sends = fail;
    }

    /// Returns the number of notifications delivered.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns the event types delivered to a user, in order.
    pub fn events_for(&self, user_id: UserId) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|(u, _, _)| *u == user_id)
            .map(|(_, event, _)| event.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send(
        &self,
        user_id: UserId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), ActivityError> {
        let mut state = self.state.write().unwrap();

        if state.fail_sends {
            return Err(ActivityError::Transient("smtp relay down".to_string()));
        }

        state.sent.push((user_id, event_type.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_records_events_in_order() {
        let service = InMemoryNotificationService::new();
        let user = UserId::new();

        service
            .send(user, "investment_created", serde_json::json!({}))
            .await
            .unwrap();
        service
            .send(user, "roi_paid", serde_json::json!({"amount_kobo": 1000}))
            .await
            .unwrap();

        assert_eq!(service.sent_count(), 2);
        assert_eq!(service.events_for(user), ["investment_created", "roi_paid"]);
    }

    #[tokio::test]
    async fn test_failures_do_not_record() {
        let service = InMemoryNotificationService::new();
        service.set_fail_sends(true);

        let result = service
            .send(UserId::new(), "investment_created", serde_json::json!({}))
            .await;
        assert!(result.is_err());
        assert_eq!(service.sent_count(), 0);
    }
}
