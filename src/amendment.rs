//! Amendment records, their per-kind payloads and chain sequencing
use crate::contract::{CalendarDate, ContractRecord, Indicator, Indicators, TimeStamp};
use crate::utils;
use chrono::Utc;
use rust_decimal::Decimal;

/// Discriminant of [`AmendmentKind`], as stored in `amendment_type`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cbor(index_only)]
pub enum AmendmentType {
    #[n(0)]
    Manual,
    #[n(1)]
    Extension,
    #[n(2)]
    Termination,
    #[n(3)]
    TariffChange,
    #[n(4)]
    CecChange,
    #[n(5)]
    QuantityChange,
    #[n(6)]
    ValidityChange,
    #[n(7)]
    IndicatorChange,
    #[n(8)]
    AutoTermination,
}

impl AmendmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmendmentType::Manual => "MANUAL",
            AmendmentType::Extension => "PRELUNGIRE",
            AmendmentType::Termination => "INCETARE",
            AmendmentType::TariffChange => "TARIFF_CHANGE",
            AmendmentType::CecChange => "CEC_CHANGE",
            AmendmentType::QuantityChange => "QUANTITY_CHANGE",
            AmendmentType::ValidityChange => "VALIDITY_CHANGE",
            AmendmentType::IndicatorChange => "INDICATOR_CHANGE",
            AmendmentType::AutoTermination => "AUTO_TERMINATION",
        }
    }
    /// Kinds that must carry a new end date.
    pub fn changes_validity(&self) -> bool {
        matches!(
            self,
            AmendmentType::Extension | AmendmentType::Termination | AmendmentType::ValidityChange
        )
    }
}

/// Who created an amendment. System records are immutable.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cbor(index_only)]
pub enum Origin {
    #[n(0)]
    User,
    #[n(1)]
    System,
}

/// A payload field, named by its persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    AmendmentNumber,
    AmendmentDate,
    AmendmentType,
    NewDateStart,
    NewDateEnd,
    NewServiceStartDate,
    NewTariffPerTon,
    NewCecTaxPerTon,
    NewEstimatedQuantityTons,
    NewIndicators, // the indicator group as a whole
    NewIndicator(Indicator),
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::AmendmentNumber => "amendment_number",
            Field::AmendmentDate => "amendment_date",
            Field::AmendmentType => "amendment_type",
            Field::NewDateStart => "new_contract_date_start",
            Field::NewDateEnd => "new_contract_date_end",
            Field::NewServiceStartDate => "new_service_start_date",
            Field::NewTariffPerTon => "new_tariff_per_ton",
            Field::NewCecTaxPerTon => "new_cec_tax_per_ton",
            Field::NewEstimatedQuantityTons => "new_estimated_quantity_tons",
            Field::NewIndicators => "new_indicators",
            Field::NewIndicator(Indicator::Recycling) => "new_indicator_recycling_percent",
            Field::NewIndicator(Indicator::EnergyRecovery) => {
                "new_indicator_energy_recovery_percent"
            }
            Field::NewIndicator(Indicator::Disposal) => "new_indicator_disposal_percent",
        }
    }
}

/// The flattened, sparse view of any amendment payload. `None` means unchanged.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    #[n(0)]
    pub new_date_start: Option<CalendarDate>,
    #[n(1)]
    pub new_date_end: Option<CalendarDate>,
    #[n(2)]
    pub new_service_start_date: Option<CalendarDate>,
    #[n(3)]
    #[cbor(with = "crate::codec::opt_decimal")]
    pub new_tariff_per_ton: Option<Decimal>,
    #[n(4)]
    #[cbor(with = "crate::codec::opt_decimal")]
    pub new_cec_tax_per_ton: Option<Decimal>,
    #[n(5)]
    #[cbor(with = "crate::codec::opt_decimal")]
    pub new_estimated_quantity_tons: Option<Decimal>,
    #[n(6)]
    pub new_indicators: Indicators,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_date_start(mut self, date: CalendarDate) -> Self {
        self.new_date_start = Some(date);
        self
    }
    pub fn set_date_end(mut self, date: CalendarDate) -> Self {
        self.new_date_end = Some(date);
        self
    }
    pub fn set_service_start_date(mut self, date: CalendarDate) -> Self {
        self.new_service_start_date = Some(date);
        self
    }
    pub fn set_tariff_per_ton(mut self, tariff: Decimal) -> Self {
        self.new_tariff_per_ton = Some(tariff);
        self
    }
    pub fn set_cec_tax_per_ton(mut self, cec: Decimal) -> Self {
        self.new_cec_tax_per_ton = Some(cec);
        self
    }
    pub fn set_estimated_quantity_tons(mut self, quantity: Decimal) -> Self {
        self.new_estimated_quantity_tons = Some(quantity);
        self
    }
    pub fn set_indicator(mut self, indicator: Indicator, value: Decimal) -> Self {
        self.new_indicators.insert(indicator, value.into());
        self
    }
    pub fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }
    /// Fields this payload actually overrides, in column order.
    pub fn present_fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.new_date_start.is_some() {
            fields.push(Field::NewDateStart);
        }
        if self.new_date_end.is_some() {
            fields.push(Field::NewDateEnd);
        }
        if self.new_service_start_date.is_some() {
            fields.push(Field::NewServiceStartDate);
        }
        if self.new_tariff_per_ton.is_some() {
            fields.push(Field::NewTariffPerTon);
        }
        if self.new_cec_tax_per_ton.is_some() {
            fields.push(Field::NewCecTaxPerTon);
        }
        if self.new_estimated_quantity_tons.is_some() {
            fields.push(Field::NewEstimatedQuantityTons);
        }
        fields.extend(self.new_indicators.keys().map(Indicator::override_field));
        fields
    }
}

/// Payload of the validity-changing kinds (extension, termination, validity change).
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidityTerms {
    #[n(0)]
    pub new_date_start: Option<CalendarDate>,
    #[n(1)]
    pub new_date_end: Option<CalendarDate>,
    #[n(2)]
    pub new_service_start_date: Option<CalendarDate>,
    #[n(3)]
    #[cbor(with = "crate::codec::opt_decimal")]
    pub new_estimated_quantity_tons: Option<Decimal>, // suppresses proration when set
}

impl ValidityTerms {
    pub fn ending(date: CalendarDate) -> Self {
        Self {
            new_date_end: Some(date),
            ..Self::default()
        }
    }
    pub fn set_date_start(mut self, date: CalendarDate) -> Self {
        self.new_date_start = Some(date);
        self
    }
    pub fn set_service_start_date(mut self, date: CalendarDate) -> Self {
        self.new_service_start_date = Some(date);
        self
    }
    pub fn set_estimated_quantity_tons(mut self, quantity: Decimal) -> Self {
        self.new_estimated_quantity_tons = Some(quantity);
        self
    }
}

/// What an amendment changes. Each kind only carries the overrides legal for it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum AmendmentKind {
    #[n(0)]
    Manual(#[n(0)] Overrides),
    #[n(1)]
    Extension(#[n(0)] ValidityTerms),
    #[n(2)]
    Termination(#[n(0)] ValidityTerms),
    #[n(3)]
    TariffChange {
        #[n(0)]
        #[cbor(with = "crate::codec::opt_decimal")]
        new_tariff_per_ton: Option<Decimal>,
    },
    #[n(4)]
    CecChange {
        #[n(0)]
        #[cbor(with = "crate::codec::opt_decimal")]
        new_cec_tax_per_ton: Option<Decimal>,
    },
    #[n(5)]
    QuantityChange {
        #[n(0)]
        #[cbor(with = "crate::codec::opt_decimal")]
        new_estimated_quantity_tons: Option<Decimal>,
    },
    #[n(6)]
    ValidityChange(#[n(0)] ValidityTerms),
    #[n(7)]
    IndicatorChange {
        #[n(0)]
        new_indicators: Indicators,
    },
    #[n(8)]
    AutoTermination,
}

impl AmendmentKind {
    pub fn tariff_change(tariff: Decimal) -> Self {
        AmendmentKind::TariffChange {
            new_tariff_per_ton: Some(tariff),
        }
    }
    pub fn cec_change(cec: Decimal) -> Self {
        AmendmentKind::CecChange {
            new_cec_tax_per_ton: Some(cec),
        }
    }
    pub fn quantity_change(quantity: Decimal) -> Self {
        AmendmentKind::QuantityChange {
            new_estimated_quantity_tons: Some(quantity),
        }
    }
    pub fn validity_change(new_date_end: CalendarDate) -> Self {
        AmendmentKind::ValidityChange(ValidityTerms::ending(new_date_end))
    }
    pub fn indicator_change(indicators: Indicators) -> Self {
        AmendmentKind::IndicatorChange {
            new_indicators: indicators,
        }
    }
    pub fn amendment_type(&self) -> AmendmentType {
        match self {
            AmendmentKind::Manual(_) => AmendmentType::Manual,
            AmendmentKind::Extension(_) => AmendmentType::Extension,
            AmendmentKind::Termination(_) => AmendmentType::Termination,
            AmendmentKind::TariffChange { .. } => AmendmentType::TariffChange,
            AmendmentKind::CecChange { .. } => AmendmentType::CecChange,
            AmendmentKind::QuantityChange { .. } => AmendmentType::QuantityChange,
            AmendmentKind::ValidityChange(_) => AmendmentType::ValidityChange,
            AmendmentKind::IndicatorChange { .. } => AmendmentType::IndicatorChange,
            AmendmentKind::AutoTermination => AmendmentType::AutoTermination,
        }
    }
    /// Flatten the kind-specific payload into the common sparse override set.
    pub fn overrides(&self) -> Overrides {
        match self {
            AmendmentKind::Manual(overrides) => overrides.clone(),
            AmendmentKind::Extension(terms)
            | AmendmentKind::Termination(terms)
            | AmendmentKind::ValidityChange(terms) => Overrides {
                new_date_start: terms.new_date_start,
                new_date_end: terms.new_date_end,
                new_service_start_date: terms.new_service_start_date,
                new_estimated_quantity_tons: terms.new_estimated_quantity_tons,
                ..Overrides::default()
            },
            AmendmentKind::TariffChange { new_tariff_per_ton } => Overrides {
                new_tariff_per_ton: *new_tariff_per_ton,
                ..Overrides::default()
            },
            AmendmentKind::CecChange {
                new_cec_tax_per_ton,
            } => Overrides {
                new_cec_tax_per_ton: *new_cec_tax_per_ton,
                ..Overrides::default()
            },
            AmendmentKind::QuantityChange {
                new_estimated_quantity_tons,
            } => Overrides {
                new_estimated_quantity_tons: *new_estimated_quantity_tons,
                ..Overrides::default()
            },
            AmendmentKind::IndicatorChange { new_indicators } => Overrides {
                new_indicators: new_indicators.clone(),
                ..Overrides::default()
            },
            AmendmentKind::AutoTermination => Overrides::default(),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AmendmentRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub contract_id: String,
    #[n(2)]
    pub amendment_number: String, // <contract_number>-<sequence>
    #[n(3)]
    pub sequence: u32,
    #[n(4)]
    pub amendment_date: CalendarDate,
    #[n(5)]
    pub kind: AmendmentKind,
    #[n(6)]
    pub origin: Origin,
    #[n(7)]
    pub changes_description: String,
    #[n(8)]
    pub reason: Option<String>,
    #[n(9)]
    pub notes: Option<String>,
    #[n(10)]
    pub quantity_adjustment_auto: bool, // set when the fold prorated the quantity
    #[n(11)]
    pub created_by: String,
    #[n(12)]
    pub created_at: TimeStamp<Utc>,
}

impl AmendmentRecord {
    pub fn amendment_type(&self) -> AmendmentType {
        self.kind.amendment_type()
    }
    pub fn is_system(&self) -> bool {
        self.origin == Origin::System
    }
    /// Fold order: amendment date first, insertion sequence breaks ties.
    pub fn order_key(&self) -> (CalendarDate, u32) {
        (self.amendment_date, self.sequence)
    }
    pub fn overrides(&self) -> Overrides {
        self.kind.overrides()
    }
    /// Move a record to another position in the numbering, e.g. when a
    /// persisted chain has already issued the sequence it was built with.
    /// System ids are derived from the sequence and follow it.
    pub fn resequence(&mut self, contract_number: &str, sequence: u32) {
        self.sequence = sequence;
        self.amendment_number = amendment_number(contract_number, sequence);
        if self.is_system() {
            self.id = utils::system_amendment_id(&self.contract_id, sequence);
        }
    }
}

/// `<contract_number>-<n>`
pub fn amendment_number(contract_number: &str, sequence: u32) -> String {
    format!("{contract_number}-{sequence}")
}

/// Next sequence number after `existing`: the count of prior amendments plus
/// one, or past the highest sequence present if that is larger.
pub fn next_sequence(existing: &[AmendmentRecord]) -> u32 {
    let highest = existing.iter().map(|a| a.sequence).max().unwrap_or(0);
    let count = u32::try_from(existing.len()).unwrap_or(u32::MAX);
    count.max(highest).saturating_add(1)
}

/// A user's amendment before validation. Number and date may still be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmendmentDraft {
    pub kind: AmendmentKind,
    pub amendment_number: Option<String>,
    pub amendment_date: Option<CalendarDate>,
    pub changes_description: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

impl AmendmentDraft {
    pub fn new(kind: AmendmentKind) -> Self {
        Self {
            kind,
            amendment_number: None,
            amendment_date: None,
            changes_description: None,
            reason: None,
            notes: None,
            created_by: None,
        }
    }
    pub fn set_amendment_number(mut self, number: impl Into<String>) -> Self {
        self.amendment_number = Some(number.into());
        self
    }
    pub fn set_amendment_date(mut self, date: CalendarDate) -> Self {
        self.amendment_date = Some(date);
        self
    }
    pub fn set_changes_description(mut self, description: impl Into<String>) -> Self {
        self.changes_description = Some(description.into());
        self
    }
    pub fn set_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
    pub fn set_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
    pub fn set_created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = Some(user.into());
        self
    }
    /// Turn a validated draft into a user-origin record with the given sequence.
    pub fn finalise(
        self,
        id: String,
        contract: &ContractRecord,
        sequence: u32,
        created_at: TimeStamp<Utc>,
    ) -> anyhow::Result<AmendmentRecord> {
        let amendment_date = self
            .amendment_date
            .ok_or_else(|| anyhow::Error::msg("Amendment date is not set"))?;
        let amendment_number = self
            .amendment_number
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| amendment_number(&contract.contract_number, sequence));

        Ok(AmendmentRecord {
            id,
            contract_id: contract.id.clone(),
            amendment_number,
            sequence,
            amendment_date,
            kind: self.kind,
            origin: Origin::User,
            changes_description: self.changes_description.unwrap_or_default(),
            reason: self.reason,
            notes: self.notes,
            quantity_adjustment_auto: false,
            created_by: self.created_by.unwrap_or_default(),
            created_at,
        })
    }
}

impl AmendmentDraft {
    /// Apply an edit to an existing user record. Identity, sequence and audit
    /// fields are kept; the number is kept unless the draft sets a new one.
    pub fn revise(self, original: &AmendmentRecord) -> anyhow::Result<AmendmentRecord> {
        let amendment_date = self
            .amendment_date
            .ok_or_else(|| anyhow::Error::msg("Amendment date is not set"))?;

        Ok(AmendmentRecord {
            id: original.id.clone(),
            contract_id: original.contract_id.clone(),
            amendment_number: self
                .amendment_number
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| original.amendment_number.clone()),
            sequence: original.sequence,
            amendment_date,
            kind: self.kind,
            origin: original.origin,
            changes_description: self.changes_description.unwrap_or_default(),
            reason: self.reason,
            notes: self.notes,
            quantity_adjustment_auto: false,
            created_by: original.created_by.clone(),
            created_at: original.created_at.clone(),
        })
    }
}

/// All amendments of one contract, in insertion order as stored.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct AmendmentChain {
    #[n(0)]
    pub contract_id: String,
    #[n(1)]
    pub amendments: Vec<AmendmentRecord>,
    #[n(2)]
    pub last_sequence: u32, // highest sequence ever issued, deleted records included
}

impl AmendmentChain {
    pub fn new(contract_id: String) -> Self {
        Self {
            contract_id,
            amendments: vec![],
            last_sequence: 0,
        }
    }
    pub fn insert_amendment(&mut self, amendment: AmendmentRecord) {
        self.last_sequence = self.last_sequence.max(amendment.sequence);
        self.amendments.push(amendment);
    }
    pub fn next_sequence(&self) -> u32 {
        next_sequence(&self.amendments).max(self.last_sequence.saturating_add(1))
    }
    pub fn find(&self, amendment_id: &str) -> Option<&AmendmentRecord> {
        self.amendments.iter().find(|a| a.id == amendment_id)
    }
    pub fn has_auto_termination(&self) -> bool {
        has_auto_termination(&self.amendments)
    }
}

pub fn has_auto_termination(amendments: &[AmendmentRecord]) -> bool {
    amendments
        .iter()
        .any(|a| a.amendment_type() == AmendmentType::AutoTermination)
}
