//! Proportional quantity recalculation when a contract's validity period changes.
//!
//! Quantity scales linearly with contract duration. Day counts include both
//! boundary dates, so a calendar year is 365 (or 366) days.
use crate::config::EngineConfig;
use crate::contract::{CalendarDate, MAX_QUANTITY_TONS};
use crate::error::ProrationError;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proration {
    pub adjusted_quantity: Decimal,
    pub tons_per_day: Decimal,
    pub original_days: i64,
    pub new_days: i64,
}

/// What the amendment form shows while the user edits a new end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProrationPreview {
    pub original: Decimal,
    pub adjusted: Decimal,
    pub difference: Decimal,
    pub tons_per_day: Decimal,
    pub total_days: i64,
    pub new_days: i64,
}

/// Prorate `original_quantity` from `original_start..=original_end` onto
/// `original_start..=new_end`.
///
/// A new end before the start yields a zero quantity rather than an error.
/// A result above [`MAX_QUANTITY_TONS`] is reported as `Overflow`.
pub fn compute_prorated(
    original_quantity: Decimal,
    original_start: CalendarDate,
    original_end: Option<CalendarDate>,
    new_end: CalendarDate,
    config: &EngineConfig,
) -> Result<Proration, ProrationError> {
    let original_end = original_end.ok_or(ProrationError::NotApplicable)?;
    if original_end <= original_start {
        return Err(ProrationError::DivisionByZero {
            start: original_start,
            end: original_end,
        });
    }

    let original_days = CalendarDate::inclusive_days(original_start, original_end);
    let new_days = CalendarDate::inclusive_days(original_start, new_end);

    let overflow = ProrationError::Overflow {
        limit: MAX_QUANTITY_TONS,
    };
    let tons_per_day = original_quantity
        .checked_div(Decimal::from(original_days))
        .ok_or(overflow)?;

    let adjusted_quantity = if new_days <= 0 {
        Decimal::ZERO
    } else {
        tons_per_day
            .checked_mul(Decimal::from(new_days))
            .map(|q| q.round_dp_with_strategy(config.quantity_scale, config.rounding))
            .filter(|q| *q <= MAX_QUANTITY_TONS)
            .ok_or(overflow)?
    };

    Ok(Proration {
        adjusted_quantity,
        tons_per_day,
        original_days,
        new_days,
    })
}

impl Proration {
    pub fn preview(&self, original_quantity: Decimal) -> ProrationPreview {
        ProrationPreview {
            original: original_quantity,
            adjusted: self.adjusted_quantity,
            difference: self.adjusted_quantity - original_quantity,
            tons_per_day: self.tons_per_day,
            total_days: self.original_days,
            new_days: self.new_days,
        }
    }
}
