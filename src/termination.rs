//! Automatic termination of contracts whose effective end date has passed
use crate::amendment::{
    AmendmentKind, AmendmentRecord, AmendmentType, Origin, amendment_number, has_auto_termination,
    next_sequence,
};
use crate::config::EngineConfig;
use crate::contract::{CalendarDate, ContractRecord};
use crate::error::AmendmentError;
use crate::resolver::{resolve, sorted_chain};
use crate::utils;

/// Synthesize an `AUTO_TERMINATION` amendment if the contract expired before `now`.
///
/// Returns `None` when the contract is still in effect, is open-ended, already
/// carries an auto-termination, or its latest amendment is a termination or
/// validity change dated on or after `now`. Calling it again with the returned
/// record appended yields `None`.
pub fn maybe_terminate(
    contract: &ContractRecord,
    amendments: &[AmendmentRecord],
    now: CalendarDate,
    config: &EngineConfig,
) -> Option<AmendmentRecord> {
    terminate(contract, amendments, now, config).ok()
}

/// Like [`maybe_terminate`], but reports why no termination was produced:
/// `DuplicateTermination` when one already exists, `NotExpired` otherwise.
pub fn terminate(
    contract: &ContractRecord,
    amendments: &[AmendmentRecord],
    now: CalendarDate,
    config: &EngineConfig,
) -> Result<AmendmentRecord, AmendmentError> {
    if has_auto_termination(amendments) {
        return Err(AmendmentError::DuplicateTermination(
            contract.contract_number.clone(),
        ));
    }

    let not_expired = || AmendmentError::NotExpired {
        contract_number: contract.contract_number.clone(),
        now,
    };

    // a pending termination or validity change still governs the contract
    let pending = sorted_chain(amendments).last().is_some_and(|latest| {
        matches!(
            latest.amendment_type(),
            AmendmentType::Termination | AmendmentType::ValidityChange
        ) && latest.amendment_date >= now
    });
    if pending {
        return Err(not_expired());
    }

    let snapshot = resolve(contract, amendments, now, config).snapshot;
    let effective_end = match snapshot.effective_date_end {
        Some(end) if end < now => end,
        _ => return Err(not_expired()),
    };
    let amendment_date = effective_end.next_day().ok_or_else(not_expired)?;
    let sequence = next_sequence(amendments);

    tracing::info!(
        contract = %contract.contract_number,
        effective_end = %effective_end,
        "contract expired, synthesizing auto-termination"
    );

    Ok(AmendmentRecord {
        id: utils::system_amendment_id(&contract.id, sequence),
        contract_id: contract.id.clone(),
        amendment_number: amendment_number(&contract.contract_number, sequence),
        sequence,
        amendment_date,
        kind: AmendmentKind::AutoTermination,
        origin: Origin::System,
        changes_description: config.auto_termination_description.clone(),
        reason: None,
        notes: None,
        quantity_adjustment_auto: false,
        created_by: config.system_actor.clone(),
        created_at: now.start_of_day(),
    })
}
