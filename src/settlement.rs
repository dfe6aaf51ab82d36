//! Settlement gateway: moves money for checked-out bookings.
//!
//! Settlement is split into two halves. `initiate` creates the destination
//! charge at the processor and claims the booking with the returned payment
//! reference; `reconcile` applies verified webhook events, completing or
//! failing the booking. The two halves are idempotent independently: charges
//! dedupe at the processor under a per-booking idempotency key, and events
//! dedupe against the `processor_events` ledger.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::SettlementConfig;
use crate::db::errors::DbError;
use crate::db::handlers::{Bookings, ProcessorEvents, Repository, Users};
use crate::db::models::{
    bookings::{BookingDBResponse, BookingStatus},
    processor_events::ProcessorEventCreateDBRequest,
};
use crate::errors::{Error, Result};
use crate::notifications::{NotificationEvent, Notifier};
use crate::payment_processors::{ChargeRequest, EventKind, PaymentProcessor, VerifiedEvent};
use crate::types::{abbrev_uuid, BookingId};

#[derive(Clone)]
pub struct SettlementGateway {
    pool: PgPool,
    processor: Arc<dyn PaymentProcessor>,
    notifier: Notifier,
}

impl SettlementGateway {
    pub fn new(pool: PgPool, processor: Arc<dyn PaymentProcessor>, notifier: Notifier) -> Self {
        Self {
            pool,
            processor,
            notifier,
        }
    }

    /// Kick off settlement for a checked-out booking.
    ///
    /// Creates the charge, then claims the booking by storing the payment
    /// reference. If another worker claimed it first, the claim matches zero
    /// rows and this call backs off; the processor's idempotency key ensures
    /// the requester was still only charged once.
    #[instrument(skip(self), fields(booking = %abbrev_uuid(&booking_id)))]
    pub async fn initiate(&self, booking_id: BookingId) -> Result<BookingDBResponse> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;

        let booking = Bookings::new(&mut conn)
            .get_by_id(booking_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Booking".to_string(),
                id: booking_id.to_string(),
            })?;

        if booking.status != BookingStatus::CheckedOut {
            return Err(Error::Conflict {
                message: "Booking is not awaiting settlement".to_string(),
            });
        }
        if booking.processor_payment_id.is_some() {
            return Err(Error::Conflict {
                message: "Settlement is already in progress for this booking".to_string(),
            });
        }
        if booking.payment_failure.is_some() {
            return Err(Error::Conflict {
                message: "Settlement previously failed for this booking; retry it explicitly".to_string(),
            });
        }

        let earnings = booking.earnings().ok_or_else(|| Error::Internal {
            operation: format!("settle booking {booking_id}: earnings were never recorded"),
        })?;

        let provider = Users::new(&mut conn)
            .get_by_id(booking.provider_id)
            .await?
            .ok_or_else(|| Error::Internal {
                operation: format!("settle booking {booking_id}: provider row is missing"),
            })?;

        let Some(payout_account_id) = provider.payout_account_id.as_deref() else {
            return Err(Error::BadRequest {
                message: "Provider has no payout account on file".to_string(),
            });
        };

        let charge = match self
            .processor
            .create_charge(&ChargeRequest {
                booking_id,
                amount_cents: earnings.requester_total_cents,
                application_fee_cents: earnings.platform_fee_cents,
                payout_account_id,
                description: "shiftctl booking settlement",
            })
            .await
        {
            Ok(charge) => charge,
            Err(e) => {
                warn!(error = %e, "Charge creation failed, parking booking");
                Bookings::new(&mut conn)
                    .record_payment_failure(booking_id, &e.to_string())
                    .await?;
                self.notifier.notify(NotificationEvent::PaymentFailed {
                    booking_id,
                    requester_id: booking.requester_id,
                    reason: e.to_string(),
                });
                return Err(Error::Processor { message: e.to_string() });
            }
        };

        match Bookings::new(&mut conn)
            .claim_for_settlement(booking_id, &charge.payment_id)
            .await
        {
            Ok(claimed) => {
                info!(payment_id = %charge.payment_id, "Initiated settlement");
                Ok(claimed)
            }
            Err(DbError::StaleState { .. }) => {
                // Another worker claimed the booking between our load and the
                // charge. The idempotency key means both workers hold the
                // same payment; nothing to undo.
                info!("Booking was claimed concurrently, backing off");
                Bookings::new(&mut conn)
                    .get_by_id(booking_id)
                    .await?
                    .ok_or_else(|| Error::NotFound {
                        resource: "Booking".to_string(),
                        id: booking_id.to_string(),
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Retry settlement for a booking parked on a recorded payment failure.
    pub async fn retry(&self, booking_id: BookingId) -> Result<BookingDBResponse> {
        {
            let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
            Bookings::new(&mut conn).clear_payment_failure(booking_id).await?;
        }
        self.initiate(booking_id).await
    }

    /// Apply a verified webhook event.
    ///
    /// The event is recorded in the ledger and the booking transition runs in
    /// the same transaction, so a crash between the two cannot leave an event
    /// marked applied without its effect. Replayed deliveries are no-ops.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, event_type = %event.event_type))]
    pub async fn reconcile(&self, event: VerifiedEvent) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Resolve the booking before recording, so the ledger row carries it
        let booking = match event.booking_id {
            Some(id) => Bookings::new(&mut tx).get_by_id(id).await?,
            None => match event.payment_id.as_deref() {
                Some(payment_ref) => Bookings::new(&mut tx).get_by_payment_ref(payment_ref).await?,
                None => None,
            },
        };

        let first_delivery = ProcessorEvents::new(&mut tx)
            .record(&ProcessorEventCreateDBRequest {
                event_id: event.event_id.clone(),
                event_type: event.event_type.clone(),
                booking_id: booking.as_ref().map(|b| b.id),
                payload: event.payload.clone(),
            })
            .await?;

        if !first_delivery {
            tx.commit().await.map_err(DbError::from)?;
            info!("Event already applied, skipping");
            return Ok(());
        }

        if matches!(event.kind, EventKind::Other) {
            tx.commit().await.map_err(DbError::from)?;
            return Ok(());
        }

        let Some(booking) = booking else {
            tx.commit().await.map_err(DbError::from)?;
            warn!("Event does not reference a known booking, recorded for audit only");
            return Ok(());
        };

        let notification = match event.kind {
            EventKind::PaymentSucceeded => {
                // Paid-at is when the processor settled the charge, not when
                // the delivery reached us.
                match Bookings::new(&mut tx).complete(booking.id, event.created).await? {
                    Some(completed) => {
                        info!(booking = %abbrev_uuid(&completed.id), "Settlement completed");
                        Some(NotificationEvent::PaymentSettled {
                            booking_id: completed.id,
                            provider_id: completed.provider_id,
                            provider_payout_cents: completed.provider_payout_cents.unwrap_or(0),
                        })
                    }
                    None => {
                        // Disputed or already completed; the ledger row keeps
                        // the event for audit either way.
                        warn!(
                            booking = %abbrev_uuid(&booking.id),
                            status = ?booking.status,
                            "Succeeded event for a booking no longer awaiting settlement"
                        );
                        None
                    }
                }
            }
            EventKind::PaymentFailed { reason } => {
                let parked = Bookings::new(&mut tx)
                    .record_payment_failure(booking.id, &reason)
                    .await?;
                match parked {
                    Some(parked) => Some(NotificationEvent::PaymentFailed {
                        booking_id: parked.id,
                        requester_id: parked.requester_id,
                        reason,
                    }),
                    None => {
                        warn!(
                            booking = %abbrev_uuid(&booking.id),
                            status = ?booking.status,
                            "Failed event for a booking no longer awaiting settlement"
                        );
                        None
                    }
                }
            }
            EventKind::Other => unreachable!("handled above"),
        };

        tx.commit().await.map_err(DbError::from)?;

        if let Some(notification) = notification {
            self.notifier.notify(notification);
        }

        Ok(())
    }
}

/// Background poller that sweeps checked-out bookings into settlement.
///
/// Webhooks complete bookings; this loop only starts charges that no API
/// call started, so a missed manual settle still gets paid eventually.
pub async fn run_settlement_poller(gateway: SettlementGateway, config: SettlementConfig, shutdown: CancellationToken) {
    tracing::info!(poll_interval = ?config.poll_interval, "Starting settlement poller");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Settlement poller shutting down");
                return;
            }
        }

        let pending = {
            let mut conn = match gateway.pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to acquire connection for settlement sweep");
                    continue;
                }
            };
            match Bookings::new(&mut conn).list_settleable(50).await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to list settleable bookings");
                    continue;
                }
            }
        };

        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "Found bookings awaiting settlement");
        }

        for booking in pending {
            if let Err(e) = gateway.initiate(booking.id).await {
                tracing::warn!(booking = %abbrev_uuid(&booking.id), error = %e, "Settlement initiation failed");
            }
        }
    }
}
