//! Field-level and cross-field checks run before an amendment joins a chain
use crate::amendment::{AmendmentDraft, AmendmentKind, AmendmentRecord, Field, Overrides};
use crate::config::EngineConfig;
use crate::contract::{CalendarDate, ContractRecord, MAX_QUANTITY_TONS, MAX_RATE_PER_TON, Percent};
use crate::error::{AmendmentError, FieldError, ProrationError, ValidationError, ValidationErrors};
use crate::proration::{ProrationPreview, compute_prorated};
use crate::resolver::{proration_baseline, resolve};
use rust_decimal::Decimal;

/// Accepted, but worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The new end date falls before the contract start; quantity drops to zero.
    ZeroQuantity { new_date_end: CalendarDate },
    /// The baseline period has zero length, quantity will be left unchanged.
    SingleDayBaseline,
    /// The baseline period is open-ended, quantity will be left unchanged.
    OpenEndedBaseline,
    /// Prorating would exceed the quantity bound, quantity will be left unchanged.
    ProrationOverflow,
    /// Dated before the latest existing amendment; it will be folded at its date, not last.
    OutOfOrder { latest: CalendarDate },
    /// Quantity will be recalculated from the new validity period.
    ProratedQuantity(ProrationPreview),
}

/// Check `candidate` against `contract` and the amendments already in its chain.
///
/// Business-rule violations come back as `Err`, one entry per offending field.
pub fn validate(
    contract: &ContractRecord,
    existing: &[AmendmentRecord],
    candidate: &AmendmentDraft,
    config: &EngineConfig,
) -> Result<Vec<Warning>, ValidationErrors> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut reject = |field: Field, error: ValidationError| errors.push(FieldError { field, error });

    match candidate.amendment_date {
        None => reject(Field::AmendmentDate, ValidationError::MissingRequiredField),
        Some(date) if date < contract.date_start => reject(
            Field::AmendmentDate,
            ValidationError::InvalidAmendmentDate {
                date,
                contract_start: contract.date_start,
            },
        ),
        Some(date) => {
            if let Some(latest) = existing.iter().map(|a| a.amendment_date).max() {
                if date < latest {
                    warnings.push(Warning::OutOfOrder { latest });
                }
            }
        }
    }

    if let Some(number) = candidate
        .amendment_number
        .as_deref()
        .filter(|n| !n.trim().is_empty())
    {
        if existing.iter().any(|a| a.amendment_number == number) {
            reject(
                Field::AmendmentNumber,
                ValidationError::DuplicateAmendmentNumber(number.to_string()),
            );
        }
    }

    check_required(&candidate.kind, &mut reject);
    check_overrides(contract, &candidate.kind.overrides(), &mut reject);

    if let Some(errors) = ValidationErrors::new(errors) {
        return Err(errors);
    }

    warnings.extend(proration_warnings(contract, existing, candidate, config));
    Ok(warnings)
}

/// System-generated records can be neither edited nor deleted.
pub fn ensure_mutable(amendment: &AmendmentRecord) -> Result<(), AmendmentError> {
    if amendment.is_system() {
        return Err(AmendmentError::ImmutableRecordViolation(
            amendment.amendment_number.clone(),
        ));
    }
    Ok(())
}

fn check_required(kind: &AmendmentKind, reject: &mut impl FnMut(Field, ValidationError)) {
    match kind {
        AmendmentKind::Manual(_) => {}
        AmendmentKind::Extension(terms)
        | AmendmentKind::Termination(terms)
        | AmendmentKind::ValidityChange(terms) => {
            if terms.new_date_end.is_none() {
                reject(Field::NewDateEnd, ValidationError::MissingRequiredField);
            }
        }
        AmendmentKind::TariffChange { new_tariff_per_ton } => {
            if new_tariff_per_ton.is_none() {
                reject(Field::NewTariffPerTon, ValidationError::MissingRequiredField);
            }
        }
        AmendmentKind::CecChange {
            new_cec_tax_per_ton,
        } => {
            if new_cec_tax_per_ton.is_none() {
                reject(Field::NewCecTaxPerTon, ValidationError::MissingRequiredField);
            }
        }
        AmendmentKind::QuantityChange {
            new_estimated_quantity_tons,
        } => {
            if new_estimated_quantity_tons.is_none() {
                reject(
                    Field::NewEstimatedQuantityTons,
                    ValidationError::MissingRequiredField,
                );
            }
        }
        AmendmentKind::IndicatorChange { new_indicators } => {
            if new_indicators.is_empty() {
                reject(Field::NewIndicators, ValidationError::MissingRequiredField);
            }
        }
        AmendmentKind::AutoTermination => {
            reject(Field::AmendmentType, ValidationError::ReservedAmendmentType)
        }
    }
}

fn check_overrides(
    contract: &ContractRecord,
    overrides: &Overrides,
    reject: &mut impl FnMut(Field, ValidationError),
) {
    for (field, value, max) in [
        (
            Field::NewTariffPerTon,
            overrides.new_tariff_per_ton,
            MAX_RATE_PER_TON,
        ),
        (
            Field::NewEstimatedQuantityTons,
            overrides.new_estimated_quantity_tons,
            MAX_QUANTITY_TONS,
        ),
    ] {
        if let Some(error) = value.and_then(|v| amount_error(v, max)) {
            reject(field, error);
        }
    }

    if let Some(cec) = overrides.new_cec_tax_per_ton {
        if !contract.category.supports_cec() {
            reject(
                Field::NewCecTaxPerTon,
                ValidationError::UnsupportedField(contract.category),
            );
        } else if let Some(error) = amount_error(cec, MAX_RATE_PER_TON) {
            reject(Field::NewCecTaxPerTon, error);
        }
    }

    for (indicator, value) in &overrides.new_indicators {
        let field = indicator.override_field();
        if !contract.category.supports_indicator(*indicator) {
            reject(field, ValidationError::UnsupportedField(contract.category));
        } else if !value.in_range() {
            reject(
                field,
                ValidationError::OutOfRange {
                    value: value.value(),
                    min: Percent::MIN,
                    max: Percent::MAX,
                },
            );
        }
    }
}

fn amount_error(value: Decimal, max: Decimal) -> Option<ValidationError> {
    if value < Decimal::ZERO {
        Some(ValidationError::Negative(value))
    } else if value > max {
        Some(ValidationError::OutOfRange {
            value,
            min: Decimal::ZERO,
            max,
        })
    } else {
        None
    }
}

/// Preview of the proration the resolver will apply once the candidate is
/// folded at its date.
fn proration_warnings(
    contract: &ContractRecord,
    existing: &[AmendmentRecord],
    candidate: &AmendmentDraft,
    config: &EngineConfig,
) -> Vec<Warning> {
    let overrides = candidate.kind.overrides();
    let (Some(new_end), Some(date)) = (overrides.new_date_end, candidate.amendment_date) else {
        return vec![];
    };
    if overrides.new_estimated_quantity_tons.is_some() {
        return vec![];
    }

    // the candidate gets the highest sequence, so it folds after everything up to its date
    let preceding: Vec<AmendmentRecord> = existing
        .iter()
        .filter(|a| a.amendment_date <= date)
        .cloned()
        .collect();
    let running = resolve(contract, &preceding, date, config).snapshot;
    let (start, end) = proration_baseline(contract, &running, config);

    match compute_prorated(running.effective_quantity, start, end, new_end, config) {
        Ok(proration) => {
            let mut warnings = Vec::new();
            if proration.new_days <= 0 {
                warnings.push(Warning::ZeroQuantity {
                    new_date_end: new_end,
                });
            }
            warnings.push(Warning::ProratedQuantity(
                proration.preview(running.effective_quantity),
            ));
            warnings
        }
        Err(ProrationError::NotApplicable) => vec![Warning::OpenEndedBaseline],
        Err(ProrationError::DivisionByZero { .. }) => vec![Warning::SingleDayBaseline],
        Err(ProrationError::Overflow { .. }) => vec![Warning::ProrationOverflow],
    }
}
