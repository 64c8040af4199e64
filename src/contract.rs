//! Base contract record and the calendar/number types shared by the engine
use crate::amendment::Field;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A calendar day without time-of-day. Contract validity is always day-granular.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(CalendarDate)
    }
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
    /// The following calendar day, `None` at the end of chrono's range.
    pub fn next_day(&self) -> Option<Self> {
        self.0.succ_opt().map(CalendarDate)
    }
    /// Days from `start` to `end`, counting both boundary dates.
    /// Non-positive when `end` precedes `start`.
    pub fn inclusive_days(start: CalendarDate, end: CalendarDate) -> i64 {
        end.0.signed_duration_since(start.0).num_days() + 1
    }
    /// Midnight UTC at the start of this day.
    pub fn start_of_day(&self) -> TimeStamp<Utc> {
        TimeStamp(self.0.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(value: NaiveDate) -> Self {
        CalendarDate(value)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for CalendarDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(CalendarDate)
    }
}

impl<C> minicbor::Encode<C> for CalendarDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for CalendarDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(CalendarDate)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day number to a calendar date",
            ))
    }
}

/// Audit instant, used for creation timestamps.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Contract category. Decides which indicators apply and whether CEC tax is charged.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cbor(index_only)]
pub enum ContractCategory {
    #[n(0)]
    WasteCollector,
    #[n(1)]
    Sorting,
    #[n(2)]
    MechanicalBiologicalTreatment,
    #[n(3)]
    Incineration,
    #[n(4)]
    Disposal,
}

impl ContractCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractCategory::WasteCollector => "WASTE_COLLECTOR",
            ContractCategory::Sorting => "SORTING",
            ContractCategory::MechanicalBiologicalTreatment => "MECHANICAL_BIOLOGICAL_TREATMENT",
            ContractCategory::Incineration => "INCINERATION",
            ContractCategory::Disposal => "DISPOSAL",
        }
    }
    /// CEC tax is a landfill levy, charged on disposal contracts only.
    pub fn supports_cec(&self) -> bool {
        matches!(self, ContractCategory::Disposal)
    }
    pub fn indicators(&self) -> &'static [Indicator] {
        match self {
            ContractCategory::WasteCollector => &[Indicator::Recycling],
            ContractCategory::Sorting => &[Indicator::Recycling, Indicator::Disposal],
            ContractCategory::MechanicalBiologicalTreatment => &[
                Indicator::Recycling,
                Indicator::EnergyRecovery,
                Indicator::Disposal,
            ],
            ContractCategory::Incineration => &[Indicator::EnergyRecovery, Indicator::Disposal],
            ContractCategory::Disposal => &[Indicator::Disposal],
        }
    }
    pub fn supports_indicator(&self, indicator: Indicator) -> bool {
        self.indicators().contains(&indicator)
    }
}

/// Performance indicators tracked as a percentage of treated waste.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cbor(index_only)]
pub enum Indicator {
    #[n(0)]
    Recycling,
    #[n(1)]
    EnergyRecovery,
    #[n(2)]
    Disposal,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [
        Indicator::Recycling,
        Indicator::EnergyRecovery,
        Indicator::Disposal,
    ];

    /// Column name on the base contract, e.g. `recycling_percent`.
    pub fn column(&self) -> &'static str {
        match self {
            Indicator::Recycling => "recycling_percent",
            Indicator::EnergyRecovery => "energy_recovery_percent",
            Indicator::Disposal => "disposal_percent",
        }
    }
    /// Amendment payload field carrying an override for this indicator.
    pub fn override_field(&self) -> Field {
        Field::NewIndicator(*self)
    }
}

/// A percentage. Range checking happens in validation, not on construction,
/// so out-of-range input can be reported against the field it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(Decimal);

impl Percent {
    pub const MIN: Decimal = Decimal::ZERO;
    pub const MAX: Decimal = Decimal::ONE_HUNDRED;

    pub fn new(value: Decimal) -> Self {
        Percent(value)
    }
    pub fn value(&self) -> Decimal {
        self.0
    }
    pub fn in_range(&self) -> bool {
        self.0 >= Self::MIN && self.0 <= Self::MAX
    }
}

impl From<Decimal> for Percent {
    fn from(value: Decimal) -> Self {
        Percent(value)
    }
}

impl<C> minicbor::Encode<C> for Percent {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        crate::codec::decimal::encode(&self.0, e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Percent {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        crate::codec::decimal::decode(d, ctx).map(Percent)
    }
}

pub type Indicators = BTreeMap<Indicator, Percent>;

/// Largest tariff or CEC tax accepted per ton.
pub const MAX_RATE_PER_TON: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
/// Largest quantity accepted or produced by proration, 10^12 tons. Together
/// with [`MAX_RATE_PER_TON`] it keeps every contract value representable.
pub const MAX_QUANTITY_TONS: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// The original, unamended contract. Never mutated once finalised; all later
/// changes are layered on top as amendments.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ContractRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub contract_number: String,
    #[n(2)]
    pub institution_id: Option<String>,
    #[n(3)]
    pub category: ContractCategory,
    #[n(4)]
    pub date_start: CalendarDate,
    #[n(5)]
    pub date_end: Option<CalendarDate>, // open-ended when absent
    #[n(6)]
    pub service_start_date: Option<CalendarDate>,
    #[n(7)]
    #[cbor(with = "crate::codec::decimal")]
    pub tariff_per_ton: Decimal,
    #[n(8)]
    #[cbor(with = "crate::codec::opt_decimal")]
    pub cec_tax_per_ton: Option<Decimal>,
    #[n(9)]
    #[cbor(with = "crate::codec::decimal")]
    pub estimated_quantity_tons: Decimal,
    #[n(10)]
    pub indicators: Indicators,
    #[n(11)]
    pub is_active: bool, // manual override, dates can still expire the contract
}

impl ContractRecord {
    /// Start a contract draft. Commercial terms default to zero and the contract is active.
    pub fn new(
        id: impl Into<String>,
        contract_number: impl Into<String>,
        category: ContractCategory,
        date_start: CalendarDate,
    ) -> Self {
        Self {
            id: id.into(),
            contract_number: contract_number.into(),
            institution_id: None,
            category,
            date_start,
            date_end: None,
            service_start_date: None,
            tariff_per_ton: Decimal::ZERO,
            cec_tax_per_ton: None,
            estimated_quantity_tons: Decimal::ZERO,
            indicators: Indicators::new(),
            is_active: true,
        }
    }
    pub fn set_institution(mut self, institution_id: impl Into<String>) -> Self {
        self.institution_id = Some(institution_id.into());
        self
    }
    pub fn set_date_end(mut self, date: CalendarDate) -> Self {
        self.date_end = Some(date);
        self
    }
    pub fn set_service_start_date(mut self, date: CalendarDate) -> Self {
        self.service_start_date = Some(date);
        self
    }
    pub fn set_tariff_per_ton(mut self, tariff: Decimal) -> Self {
        self.tariff_per_ton = tariff;
        self
    }
    pub fn set_cec_tax_per_ton(mut self, cec: Decimal) -> Self {
        self.cec_tax_per_ton = Some(cec);
        self
    }
    pub fn set_estimated_quantity_tons(mut self, quantity: Decimal) -> Self {
        self.estimated_quantity_tons = quantity;
        self
    }
    pub fn set_indicator(mut self, indicator: Indicator, value: Decimal) -> Self {
        self.indicators.insert(indicator, Percent::new(value));
        self
    }
    pub fn set_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
    /// CEC counted towards the contract value. Always zero outside disposal contracts.
    pub fn chargeable_cec(&self, cec: Option<Decimal>) -> Decimal {
        if self.category.supports_cec() {
            cec.unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }
    /// Checks the record's own invariants before it is handed to the engine.
    pub fn finalise(self) -> anyhow::Result<Self> {
        if self.contract_number.trim().is_empty() {
            return Err(anyhow::Error::msg("Contract number is empty"));
        }
        if let Some(end) = self.date_end {
            if end < self.date_start {
                return Err(anyhow::anyhow!(
                    "Contract end {} precedes contract start {}",
                    end,
                    self.date_start
                ));
            }
        }
        if self.tariff_per_ton.is_sign_negative() {
            return Err(anyhow::Error::msg("Tariff per ton is negative"));
        }
        if self.tariff_per_ton > MAX_RATE_PER_TON {
            return Err(anyhow::anyhow!(
                "Tariff per ton {} exceeds {}",
                self.tariff_per_ton,
                MAX_RATE_PER_TON
            ));
        }
        if self.estimated_quantity_tons.is_sign_negative() {
            return Err(anyhow::Error::msg("Estimated quantity is negative"));
        }
        if self.estimated_quantity_tons > MAX_QUANTITY_TONS {
            return Err(anyhow::anyhow!(
                "Estimated quantity {} exceeds {}",
                self.estimated_quantity_tons,
                MAX_QUANTITY_TONS
            ));
        }
        if let Some(cec) = self.cec_tax_per_ton {
            if !self.category.supports_cec() {
                return Err(anyhow::anyhow!(
                    "{} contracts do not carry CEC tax",
                    self.category.as_str()
                ));
            }
            if cec.is_sign_negative() {
                return Err(anyhow::Error::msg("CEC tax per ton is negative"));
            }
            if cec > MAX_RATE_PER_TON {
                return Err(anyhow::anyhow!("CEC tax per ton {} exceeds {}", cec, MAX_RATE_PER_TON));
            }
        }
        for (indicator, value) in &self.indicators {
            if !self.category.supports_indicator(*indicator) {
                return Err(anyhow::anyhow!(
                    "{} does not apply to {} contracts",
                    indicator.column(),
                    self.category.as_str()
                ));
            }
            if !value.in_range() {
                return Err(anyhow::anyhow!(
                    "{} = {} is outside [0, 100]",
                    indicator.column(),
                    value.value()
                ));
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        CalendarDate::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn inclusive_days_counts_both_boundaries() {
        assert_eq!(
            CalendarDate::inclusive_days(date(2024, 1, 1), date(2024, 12, 31)),
            366
        );
        assert_eq!(
            CalendarDate::inclusive_days(date(2024, 1, 1), date(2024, 1, 1)),
            1
        );
        assert_eq!(
            CalendarDate::inclusive_days(date(2024, 1, 2), date(2024, 1, 1)),
            0
        );
    }

    #[test]
    fn calendar_date_encoding() {
        let original = date(2024, 2, 29);

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: CalendarDate = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn finalise_rejects_cec_outside_disposal() {
        let contract = ContractRecord::new("c1", "C-1", ContractCategory::Sorting, date(2024, 1, 1))
            .set_cec_tax_per_ton(Decimal::new(80, 0));

        assert!(contract.finalise().is_err());
    }

    #[test]
    fn finalise_rejects_inverted_period() {
        let contract =
            ContractRecord::new("c1", "C-1", ContractCategory::Disposal, date(2024, 6, 1))
                .set_date_end(date(2024, 5, 31));

        assert!(contract.finalise().is_err());
    }

    #[test]
    fn finalise_rejects_terms_beyond_bounds() {
        let huge = Decimal::new(1_000_000_000_000_000, 0);
        let base = || ContractRecord::new("c1", "C-1", ContractCategory::Disposal, date(2024, 1, 1));

        assert!(base().set_tariff_per_ton(huge).finalise().is_err());
        assert!(base().set_cec_tax_per_ton(huge).finalise().is_err());
        assert!(base().set_estimated_quantity_tons(huge).finalise().is_err());
        assert!(
            base()
                .set_tariff_per_ton(MAX_RATE_PER_TON)
                .set_estimated_quantity_tons(MAX_QUANTITY_TONS)
                .finalise()
                .is_ok()
        );
    }

    #[test]
    fn quantity_bound_is_ten_to_the_twelfth() {
        assert_eq!(MAX_QUANTITY_TONS, Decimal::new(1_000_000_000_000, 0));
        assert_eq!(MAX_RATE_PER_TON, Decimal::new(1_000_000_000, 0));
    }
}
