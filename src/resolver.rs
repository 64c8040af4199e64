//! Folds an amendment chain over its base contract into the currently effective terms
use crate::amendment::{AmendmentRecord, AmendmentType};
use crate::config::{EngineConfig, ProrationBaseline};
use crate::contract::{CalendarDate, ContractRecord, Indicators};
use crate::error::ProrationError;
use crate::proration::{Proration, compute_prorated};
use rust_decimal::Decimal;

/// The resolved contract terms. Derived on demand, never the source of truth.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSnapshot {
    #[n(0)]
    pub contract_id: String,
    #[n(1)]
    pub effective_date_start: CalendarDate,
    #[n(2)]
    pub effective_date_end: Option<CalendarDate>,
    #[n(3)]
    pub effective_service_start_date: Option<CalendarDate>,
    #[n(4)]
    #[cbor(with = "crate::codec::decimal")]
    pub effective_tariff: Decimal,
    #[n(5)]
    #[cbor(with = "crate::codec::opt_decimal")]
    pub effective_cec: Option<Decimal>,
    #[n(6)]
    #[cbor(with = "crate::codec::decimal")]
    pub effective_quantity: Decimal,
    #[n(7)]
    pub effective_indicators: Indicators,
    #[n(8)]
    #[cbor(with = "crate::codec::decimal")]
    pub effective_total_value: Decimal,
    #[n(9)]
    pub is_active: bool,
}

impl EffectiveSnapshot {
    /// SHA-256 over the CBOR encoding. Equal inputs to [`resolve`] give equal digests.
    pub fn digest(&self) -> anyhow::Result<String> {
        let contents = minicbor::to_vec(self)?;
        Ok(sha256::digest(&contents))
    }

    fn from_contract(contract: &ContractRecord) -> Self {
        Self {
            contract_id: contract.id.clone(),
            effective_date_start: contract.date_start,
            effective_date_end: contract.date_end,
            effective_service_start_date: contract.service_start_date,
            effective_tariff: contract.tariff_per_ton,
            effective_cec: contract.cec_tax_per_ton,
            effective_quantity: contract.estimated_quantity_tons,
            effective_indicators: contract.indicators.clone(),
            effective_total_value: Decimal::ZERO,
            is_active: contract.is_active,
        }
    }
}

/// How one amendment contributed to the fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedAmendment {
    pub amendment_id: String,
    pub amendment_number: String,
    /// The quantity was recomputed by proration rather than set explicitly.
    pub quantity_adjustment_auto: bool,
    pub proration: Option<Proration>,
    /// Proration was due but the baseline didn't allow it; quantity left unchanged.
    pub proration_skipped: Option<ProrationError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub snapshot: EffectiveSnapshot,
    /// In fold order.
    pub applied: Vec<AppliedAmendment>,
}

impl Resolution {
    pub fn applied_for(&self, amendment_id: &str) -> Option<&AppliedAmendment> {
        self.applied.iter().find(|a| a.amendment_id == amendment_id)
    }
}

/// Amendments in fold order: `(amendment_date, sequence)`, id as a last resort
/// so that even duplicated sequence numbers sort deterministically.
pub fn sorted_chain(amendments: &[AmendmentRecord]) -> Vec<&AmendmentRecord> {
    let mut sorted: Vec<&AmendmentRecord> = amendments.iter().collect();
    sorted.sort_by(|a, b| {
        a.order_key()
            .cmp(&b.order_key())
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted
}

/// Period a validity change is prorated against, given the terms in effect before it.
pub(crate) fn proration_baseline(
    contract: &ContractRecord,
    running: &EffectiveSnapshot,
    config: &EngineConfig,
) -> (CalendarDate, Option<CalendarDate>) {
    match config.proration_baseline {
        ProrationBaseline::OriginalContract => (contract.date_start, contract.date_end),
        ProrationBaseline::PreviousEffective => {
            (running.effective_date_start, running.effective_date_end)
        }
    }
}

/// Resolve the effective terms of `contract` on `today`.
///
/// Later amendments supersede earlier ones field by field. A new end date
/// without an explicit quantity prorates the running quantity against the
/// baseline chosen by `config.proration_baseline`.
pub fn resolve(
    contract: &ContractRecord,
    amendments: &[AmendmentRecord],
    today: CalendarDate,
    config: &EngineConfig,
) -> Resolution {
    let mut snapshot = EffectiveSnapshot::from_contract(contract);
    let mut applied = Vec::with_capacity(amendments.len());
    let chain = sorted_chain(amendments);

    for amendment in chain.iter().copied() {
        let overrides = amendment.overrides();
        let mut step = AppliedAmendment {
            amendment_id: amendment.id.clone(),
            amendment_number: amendment.amendment_number.clone(),
            quantity_adjustment_auto: false,
            proration: None,
            proration_skipped: None,
        };

        let (baseline_start, baseline_end) = proration_baseline(contract, &snapshot, config);

        if let Some(start) = overrides.new_date_start {
            snapshot.effective_date_start = start;
        }
        if let Some(service_start) = overrides.new_service_start_date {
            snapshot.effective_service_start_date = Some(service_start);
        }
        if let Some(tariff) = overrides.new_tariff_per_ton {
            snapshot.effective_tariff = tariff;
        }
        if let Some(cec) = overrides.new_cec_tax_per_ton {
            snapshot.effective_cec = Some(cec);
        }
        if let Some(quantity) = overrides.new_estimated_quantity_tons {
            snapshot.effective_quantity = quantity;
        }
        if let Some(new_end) = overrides.new_date_end {
            if overrides.new_estimated_quantity_tons.is_none() {
                match compute_prorated(
                    snapshot.effective_quantity,
                    baseline_start,
                    baseline_end,
                    new_end,
                    config,
                ) {
                    Ok(proration) => {
                        snapshot.effective_quantity = proration.adjusted_quantity;
                        step.quantity_adjustment_auto = true;
                        step.proration = Some(proration);
                    }
                    Err(err) => {
                        tracing::warn!(
                            contract = %contract.contract_number,
                            amendment = %amendment.amendment_number,
                            error = %err,
                            "proration skipped, quantity left unchanged"
                        );
                        step.proration_skipped = Some(err);
                    }
                }
            }
            snapshot.effective_date_end = Some(new_end);
        }
        snapshot
            .effective_indicators
            .extend(overrides.new_indicators.iter().map(|(k, v)| (*k, *v)));

        tracing::debug!(
            contract = %contract.contract_number,
            amendment = %amendment.amendment_number,
            kind = amendment.amendment_type().as_str(),
            quantity = %snapshot.effective_quantity,
            prorated = step.quantity_adjustment_auto,
            "folded amendment"
        );
        applied.push(step);
    }

    let expired = snapshot
        .effective_date_end
        .is_some_and(|end| end < today);
    // an auto-termination holds only while the resolved end still precedes it,
    // wherever a later change of end date sits in the fold
    let terminated = chain
        .iter()
        .filter(|a| a.amendment_type() == AmendmentType::AutoTermination)
        .any(|t| {
            snapshot
                .effective_date_end
                .is_some_and(|end| end < t.amendment_date)
        });
    snapshot.is_active = contract.is_active && !expired && !terminated;

    let cec = contract.chargeable_cec(snapshot.effective_cec);
    snapshot.effective_total_value = match snapshot
        .effective_tariff
        .checked_add(cec)
        .and_then(|rate| rate.checked_mul(snapshot.effective_quantity))
    {
        Some(total) => total.round_dp_with_strategy(config.money_scale, config.rounding),
        None => {
            // only reachable with terms that skipped ContractRecord::finalise or validate
            tracing::error!(
                contract = %contract.contract_number,
                tariff = %snapshot.effective_tariff,
                quantity = %snapshot.effective_quantity,
                "contract value overflows, saturating"
            );
            Decimal::MAX
        }
    };

    Resolution { snapshot, applied }
}
