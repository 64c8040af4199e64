//! Engine configuration
use rust_decimal::RoundingStrategy;

/// Which period a validity-changing amendment prorates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProrationBaseline {
    /// The base contract's own `(date_start, date_end)`, whatever amendments came before.
    #[default]
    OriginalContract,
    /// The running effective period at the point the amendment is folded.
    PreviousEffective,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Decimal places kept on prorated quantities.
    pub quantity_scale: u32,
    /// Decimal places kept on the effective total value.
    pub money_scale: u32,
    pub rounding: RoundingStrategy,
    pub proration_baseline: ProrationBaseline,
    /// `changes_description` written on synthesized termination records.
    pub auto_termination_description: String,
    /// `created_by` on system-generated records.
    pub system_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quantity_scale: 2,
            money_scale: 2,
            // half away from zero, the way invoices round
            rounding: RoundingStrategy::MidpointAwayFromZero,
            proration_baseline: ProrationBaseline::OriginalContract,
            auto_termination_description:
                "Contract terminated automatically: effective end date has passed".into(),
            system_actor: "system".into(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_quantity_scale(mut self, scale: u32) -> Self {
        self.quantity_scale = scale;
        self
    }
    pub fn set_money_scale(mut self, scale: u32) -> Self {
        self.money_scale = scale;
        self
    }
    pub fn set_proration_baseline(mut self, baseline: ProrationBaseline) -> Self {
        self.proration_baseline = baseline;
        self
    }
    pub fn set_auto_termination_description(mut self, description: impl Into<String>) -> Self {
        self.auto_termination_description = description.into();
        self
    }
    pub fn set_system_actor(mut self, actor: impl Into<String>) -> Self {
        self.system_actor = actor.into();
        self
    }
}
