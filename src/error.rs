//! Error taxonomy for amendment validation, proration and chain mutation
use crate::amendment::Field;
use crate::contract::{CalendarDate, ContractCategory};
use rust_decimal::Decimal;
use std::fmt;

/// Business-rule violations reported back to the caller, one per field.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amendment date {date} precedes contract start {contract_start}")]
    InvalidAmendmentDate {
        date: CalendarDate,
        contract_start: CalendarDate,
    },
    #[error("Required field is missing")]
    MissingRequiredField,
    #[error("Field is not supported for {0:?} contracts")]
    UnsupportedField(ContractCategory),
    #[error("Amendment type is reserved for system-generated records")]
    ReservedAmendmentType,
    #[error("Value {value} is outside [{min}, {max}]")]
    OutOfRange {
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },
    #[error("Value {0} must not be negative")]
    Negative(Decimal),
    #[error("Amendment number {0} is already in use")]
    DuplicateAmendmentNumber(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub error: ValidationError,
}

/// Non-empty set of field-scoped validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub(crate) fn new(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
    /// Errors reported against a single persisted field.
    pub fn for_field(&self, field: Field) -> impl Iterator<Item = &ValidationError> {
        self.0
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| &e.error)
    }
    pub fn contains(&self, field: Field, error: &ValidationError) -> bool {
        self.for_field(field).any(|e| e == error)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amendment rejected:")?;
        for e in &self.0 {
            write!(f, " [{}: {}]", e.field.as_str(), e.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Proration edge cases, kept apart from a successful zero result.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProrationError {
    #[error("Base period has no end date, proration is not applicable")]
    NotApplicable,
    #[error("Base period {start}..{end} has zero length")]
    DivisionByZero {
        start: CalendarDate,
        end: CalendarDate,
    },
    #[error("Prorated quantity exceeds {limit} tons")]
    Overflow { limit: Decimal },
}

/// Broken chain invariants. These indicate an integration bug rather than bad input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmendmentError {
    #[error("Amendment {0} is system-owned and cannot be modified or deleted")]
    ImmutableRecordViolation(String),
    #[error("Contract {0} already carries an auto-termination amendment")]
    DuplicateTermination(String),
    #[error("Contract {contract_number} is still in effect on {now}")]
    NotExpired {
        contract_number: String,
        now: CalendarDate,
    },
    #[error("Amendment {amendment_id} does not belong to contract {contract_id}")]
    UnknownAmendment {
        contract_id: String,
        amendment_id: String,
    },
}
