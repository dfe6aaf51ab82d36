//! Rate engine: prices a completed booking from its worked duration.
//!
//! Worked time is rounded to the nearest quarter hour (half-up), with a
//! half-hour minimum so that trivially short check-ins still pay out.
//! All monetary amounts are computed in integer cents; the three-way
//! split always reconciles exactly because the requester total is defined
//! as payout plus fee rather than computed independently.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Minimum billable time, in quarter hours.
const MIN_QUARTER_HOURS: i64 = 2;

/// Pricing inputs for a single booking.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCard {
    /// Hourly rate in currency units (e.g., dollars), as posted on the shift
    pub hourly_rate: Decimal,
    /// Platform fee as a fraction of the provider payout
    pub fee_rate: Decimal,
}

/// Priced earnings for a completed booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earnings {
    /// Billable time in quarter hours after rounding
    pub quarter_hours: i32,
    /// What the provider receives, in cents
    pub provider_payout_cents: i64,
    /// Platform fee on top of the payout, in cents
    pub platform_fee_cents: i64,
    /// What the requester is charged, in cents (payout + fee)
    pub requester_total_cents: i64,
}

impl Earnings {
    /// Billable time in hours as a decimal (e.g., 0.75).
    pub fn hours(&self) -> Decimal {
        Decimal::from(self.quarter_hours) / Decimal::from(4)
    }
}

/// Round a worked duration to billable quarter hours.
///
/// Rounds half-up to the nearest 15 minutes, then applies the half-hour
/// floor. Negative durations are treated as zero.
pub fn billable_quarter_hours(worked: chrono::Duration) -> i32 {
    let minutes = worked.num_minutes().max(0);
    // Half-up rounding to the nearest multiple of 15, in integer math:
    // 22 min rounds down to 15, 23 min rounds up to 30.
    let quarters = (minutes * 2 + 15) / 30;
    quarters.max(MIN_QUARTER_HOURS) as i32
}

/// Price a worked duration against a rate card.
pub fn compute(card: &RateCard, worked: chrono::Duration) -> Earnings {
    let quarter_hours = billable_quarter_hours(worked);
    let hours = Decimal::from(quarter_hours) / Decimal::from(4);

    let payout = (card.hourly_rate * hours * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let fee = (payout * card.fee_rate).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    // Amounts fit comfortably in i64 for any plausible shift; a rate large
    // enough to overflow would have been rejected at shift creation.
    let provider_payout_cents = payout.to_i64().unwrap_or(i64::MAX);
    let platform_fee_cents = fee.to_i64().unwrap_or(i64::MAX);

    Earnings {
        quarter_hours,
        provider_payout_cents,
        platform_fee_cents,
        requester_total_cents: provider_payout_cents + platform_fee_cents,
    }
}
