//! Resolution of contract amendments for waste-management contracts.
//!
//! A base [`contract::ContractRecord`] never changes after creation. Changes are
//! recorded as an ordered chain of [`amendment::AmendmentRecord`]s, and the
//! currently effective terms are derived by folding that chain with
//! [`resolver::resolve`].

pub mod amendment;
pub mod codec;
pub mod config;
pub mod contract;
pub mod error;
pub mod proration;
pub mod resolver;
pub mod service;
pub mod termination;
pub mod utils;
pub mod validator;

pub use amendment::{AmendmentDraft, AmendmentKind, AmendmentRecord, AmendmentType, Origin};
pub use config::{EngineConfig, ProrationBaseline};
pub use contract::{CalendarDate, ContractCategory, ContractRecord, Indicator};
pub use resolver::{EffectiveSnapshot, Resolution, resolve};
pub use termination::maybe_terminate;
pub use validator::validate;
