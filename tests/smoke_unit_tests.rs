//! Smoke Screen Unit tests for amendment engine components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from the scenario tests. These are intended as smoke-screen
//! and generally test the happy-path.
//!
#![allow(unused_imports)]

use amendment_engine::{
    amendment::{AmendmentKind, AmendmentType, Field, Overrides, amendment_number},
    config::{EngineConfig, ProrationBaseline},
    contract::{CalendarDate, ContractCategory, ContractRecord, Indicator, Percent, TimeStamp},
    utils::{new_uuid_to_bech32, system_amendment_id},
};
use chrono::{Datelike, Timelike, Utc};
use rust_decimal::Decimal;

fn date(y: i32, m: u32, d: u32) -> CalendarDate {
    CalendarDate::from_ymd(y, m, d).unwrap()
}

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Test that new_uuid_to_bech32 generates valid bech32-encoded strings
    /// with the correct human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let result = new_uuid_to_bech32("amendment_");
        assert!(result.is_ok());

        let encoded = result.unwrap();
        assert!(encoded.starts_with("amendment_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        let result = new_uuid_to_bech32("");
        assert!(result.is_err());
    }

    /// Test that multiple calls generate unique identifiers
    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("contract_").unwrap();
        let id2 = new_uuid_to_bech32("contract_").unwrap();
        let id3 = new_uuid_to_bech32("contract_").unwrap();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn system_ids_are_stable() {
        assert_eq!(system_amendment_id("c1", 4), "c1/system/4");
        assert_eq!(system_amendment_id("c1", 4), system_amendment_id("c1", 4));
    }
}

// CONTRACT MODULE TESTS
#[cfg(test)]
mod contract_tests {
    use super::*;

    /// Test that TimeStamp::new() creates a timestamp close to current time
    #[test]
    fn timestamp_new_creates_current_time() {
        let ts = TimeStamp::new();
        let now = Utc::now();

        let diff = (now - ts.to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1);
    }

    #[test]
    fn start_of_day_is_midnight_utc() {
        let dt = date(2024, 6, 15).start_of_day().to_datetime_utc();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.minute(), 0);
    }

    /// Test that TimeStamp CBOR encoding/decoding round-trips correctly
    #[test]
    fn timestamp_cbor_roundtrip() {
        let original = TimeStamp::new();

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: TimeStamp<Utc> = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn calendar_date_parses_and_prints_iso() {
        let parsed: CalendarDate = "2024-02-29".parse().unwrap();

        assert_eq!(parsed, date(2024, 2, 29));
        assert_eq!(parsed.to_string(), "2024-02-29");
        assert!("2023-02-29".parse::<CalendarDate>().is_err());
    }

    #[test]
    fn inclusive_days_counts_both_ends() {
        assert_eq!(CalendarDate::inclusive_days(date(2024, 1, 1), date(2024, 12, 31)), 366);
        assert_eq!(CalendarDate::inclusive_days(date(2024, 1, 1), date(2024, 1, 1)), 1);
        assert_eq!(CalendarDate::inclusive_days(date(2024, 1, 2), date(2024, 1, 1)), 0);
    }

    /// Test that ContractRecord builder pattern works correctly
    #[test]
    fn contract_builder_sets_fields() {
        let contract = ContractRecord::new("c1", "CT-1", ContractCategory::MechanicalBiologicalTreatment, date(2024, 1, 1))
            .set_institution("inst-7")
            .set_date_end(date(2024, 12, 31))
            .set_service_start_date(date(2024, 1, 15))
            .set_tariff_per_ton(Decimal::new(11050, 2))
            .set_estimated_quantity_tons(Decimal::new(1200, 0))
            .set_indicator(Indicator::Recycling, Decimal::new(40, 0))
            .finalise()
            .unwrap();

        assert_eq!(contract.institution_id.as_deref(), Some("inst-7"));
        assert_eq!(contract.date_end, Some(date(2024, 12, 31)));
        assert_eq!(contract.tariff_per_ton, Decimal::new(11050, 2));
        assert_eq!(
            contract.indicators.get(&Indicator::Recycling),
            Some(&Percent::new(Decimal::new(40, 0)))
        );
        assert!(contract.is_active);
    }

    #[test]
    fn cec_is_charged_only_for_disposal() {
        assert!(ContractCategory::Disposal.supports_cec());
        for category in [
            ContractCategory::WasteCollector,
            ContractCategory::Sorting,
            ContractCategory::MechanicalBiologicalTreatment,
            ContractCategory::Incineration,
        ] {
            assert!(!category.supports_cec(), "{}", category.as_str());
        }
    }

    #[test]
    fn indicators_follow_category() {
        assert_eq!(ContractCategory::WasteCollector.indicators(), &[Indicator::Recycling]);
        assert_eq!(ContractCategory::MechanicalBiologicalTreatment.indicators(), &Indicator::ALL);
        assert!(ContractCategory::Incineration.supports_indicator(Indicator::EnergyRecovery));
        assert!(!ContractCategory::Disposal.supports_indicator(Indicator::Recycling));
    }

    #[test]
    fn percent_bounds() {
        assert!(Percent::new(Decimal::ZERO).in_range());
        assert!(Percent::new(Decimal::ONE_HUNDRED).in_range());
        assert!(!Percent::new(Decimal::new(1001, 1)).in_range());
        assert!(!Percent::new(Decimal::new(-1, 0)).in_range());
    }
}

// CONFIG MODULE TESTS
#[cfg(test)]
mod config_tests {
    use super::*;
    use rust_decimal::RoundingStrategy;

    #[test]
    fn defaults_round_half_away_at_two_places() {
        let config = EngineConfig::default();

        assert_eq!(config.quantity_scale, 2);
        assert_eq!(config.money_scale, 2);
        assert_eq!(config.rounding, RoundingStrategy::MidpointAwayFromZero);
        assert_eq!(config.proration_baseline, ProrationBaseline::OriginalContract);
        assert_eq!(config.system_actor, "system");
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::new()
            .set_quantity_scale(3)
            .set_proration_baseline(ProrationBaseline::PreviousEffective)
            .set_system_actor("scheduler")
            .set_auto_termination_description("expired");

        assert_eq!(config.quantity_scale, 3);
        assert_eq!(config.money_scale, 2);
        assert_eq!(config.proration_baseline, ProrationBaseline::PreviousEffective);
        assert_eq!(config.system_actor, "scheduler");
        assert_eq!(config.auto_termination_description, "expired");
    }
}

// AMENDMENT MODULE TESTS
#[cfg(test)]
mod amendment_tests {
    use super::*;

    #[test]
    fn numbers_are_contract_number_and_sequence() {
        assert_eq!(amendment_number("CT-2024-01", 3), "CT-2024-01-3");
    }

    #[test]
    fn kind_codes_match_persisted_values() {
        assert_eq!(AmendmentType::Extension.as_str(), "PRELUNGIRE");
        assert_eq!(AmendmentType::Termination.as_str(), "INCETARE");
        assert_eq!(AmendmentType::AutoTermination.as_str(), "AUTO_TERMINATION");
        assert_eq!(
            AmendmentKind::tariff_change(Decimal::ONE).amendment_type(),
            AmendmentType::TariffChange
        );
    }

    #[test]
    fn fields_name_their_columns() {
        assert_eq!(Field::NewDateEnd.as_str(), "new_contract_date_end");
        assert_eq!(
            Field::NewIndicator(Indicator::Disposal).as_str(),
            "new_indicator_disposal_percent"
        );
        assert_eq!(Indicator::EnergyRecovery.override_field().as_str(), "new_indicator_energy_recovery_percent");
    }

    #[test]
    fn overrides_report_present_fields() {
        let overrides = Overrides::new()
            .set_date_end(date(2024, 6, 30))
            .set_tariff_per_ton(Decimal::new(90, 0));

        assert!(!overrides.is_empty());
        assert_eq!(
            overrides.present_fields(),
            vec![Field::NewDateEnd, Field::NewTariffPerTon]
        );
        assert!(Overrides::new().is_empty());
    }
}
