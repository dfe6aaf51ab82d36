//! Lifecycle notifications.
//!
//! Events are POSTed as JSON to a configurable HTTP sink (a webhook relay,
//! a messaging bridge, whatever the deployment wires up). Delivery is
//! fire-and-forget: failures are logged and swallowed, and no marketplace
//! operation ever fails because notifying did.

use serde::Serialize;
use url::Url;

use crate::config::NotificationsConfig;
use crate::types::{ApplicationId, BookingId, ShiftId, UserId};

/// Lifecycle events pushed to the notification sink.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    ApplicationSubmitted {
        application_id: ApplicationId,
        shift_id: ShiftId,
        provider_id: UserId,
    },
    ApplicationAccepted {
        application_id: ApplicationId,
        provider_id: UserId,
        booking_id: BookingId,
    },
    ApplicationRejected {
        application_id: ApplicationId,
        provider_id: UserId,
        shift_id: ShiftId,
    },
    BookingConfirmed {
        booking_id: BookingId,
        provider_id: UserId,
        shift_id: ShiftId,
    },
    BookingCancelled {
        booking_id: BookingId,
        provider_id: UserId,
        shift_id: ShiftId,
    },
    ShiftCancelled {
        shift_id: ShiftId,
        requester_id: UserId,
    },
    PaymentSettled {
        booking_id: BookingId,
        provider_id: UserId,
        provider_payout_cents: i64,
    },
    PaymentFailed {
        booking_id: BookingId,
        requester_id: UserId,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    sink: Option<Url>,
}

impl Notifier {
    pub fn new(config: &NotificationsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            sink: config.sink_url.clone(),
        }
    }

    /// A notifier that only logs, for tests and sink-less deployments.
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            sink: None,
        }
    }

    /// Dispatch an event without blocking the caller.
    pub fn notify(&self, event: NotificationEvent) {
        let Some(sink) = self.sink.clone() else {
            tracing::debug!(?event, "Notification sink not configured, dropping event");
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(sink.clone()).json(&event).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(?event, "Delivered notification");
                }
                Ok(response) => {
                    tracing::warn!(?event, status = %response.status(), "Notification sink rejected event");
                }
                Err(e) => {
                    tracing::warn!(?event, error = %e, "Failed to deliver notification");
                }
            }
        });
    }
}
