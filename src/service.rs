//! Service layer: the read and append paths collaborators follow, over sled
use super::amendment::{AmendmentChain, AmendmentDraft, AmendmentRecord};
use super::config::EngineConfig;
use super::contract::{CalendarDate, ContractRecord, TimeStamp};
use super::error::AmendmentError;
use super::resolver::{EffectiveSnapshot, resolve};
use super::termination::maybe_terminate;
use super::utils;
use super::validator::{Warning, ensure_mutable, validate};
use sled::Db;
use std::sync::Arc;

/// An amendment accepted into its chain, with any warnings raised on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub amendment: AmendmentRecord,
    pub warnings: Vec<Warning>,
}

pub struct ContractLedger {
    instance: Arc<sled::Db>,
    config: EngineConfig,
}

fn contract_key(contract_id: &str) -> String {
    format!("contract/{contract_id}")
}

fn chain_key(contract_id: &str) -> String {
    format!("amendments/{contract_id}")
}

impl ContractLedger {
    pub fn new(instance: Arc<Db>) -> Self {
        Self::with_config(instance, EngineConfig::default())
    }

    pub fn with_config(instance: Arc<Db>, config: EngineConfig) -> Self {
        Self { instance, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Store a new base contract. Base contracts are never overwritten.
    pub fn register_contract(&self, contract: ContractRecord) -> anyhow::Result<ContractRecord> {
        let contract = contract.finalise()?;
        let encoded = minicbor::to_vec(&contract)?;

        let swapped =
            self.instance
                .compare_and_swap(contract_key(&contract.id), None::<&[u8]>, Some(encoded))?;
        if swapped.is_err() {
            return Err(anyhow::anyhow!(
                "Contract {} is already registered",
                contract.id
            ));
        }

        tracing::info!(contract = %contract.contract_number, "registered contract");
        Ok(contract)
    }

    /// Load contract from database
    pub fn load_contract(&self, contract_id: &str) -> anyhow::Result<ContractRecord> {
        let bytes = self
            .instance
            .get(contract_key(contract_id))?
            .ok_or_else(|| anyhow::anyhow!("Contract {} not found", contract_id))?;

        Ok(minicbor::decode(&bytes)?)
    }

    /// The contract's amendments as stored. Runs the auto-termination policy
    /// first and persists any termination it synthesizes.
    pub fn load_amendments(
        &self,
        contract_id: &str,
        today: CalendarDate,
    ) -> anyhow::Result<Vec<AmendmentRecord>> {
        let contract = self.load_contract(contract_id)?;

        self.update_chain(contract_id, |chain| {
            if let Some(mut termination) =
                maybe_terminate(&contract, &chain.amendments, today, &self.config)
            {
                let sequence = chain.next_sequence();
                if termination.sequence != sequence {
                    termination.resequence(&contract.contract_number, sequence);
                }
                tracing::info!(
                    contract = %contract.contract_number,
                    amendment = %termination.amendment_number,
                    "recorded auto-termination"
                );
                chain.insert_amendment(termination);
            }
            Ok(chain.amendments.clone())
        })
    }

    /// Effective terms on `today`, as shown by the contract views.
    pub fn snapshot(
        &self,
        contract_id: &str,
        today: CalendarDate,
    ) -> anyhow::Result<EffectiveSnapshot> {
        let contract = self.load_contract(contract_id)?;
        let amendments = self.load_amendments(contract_id, today)?;

        Ok(resolve(&contract, &amendments, today, &self.config).snapshot)
    }

    /// Validate and append a user amendment.
    ///
    /// Validation failures come back as a [`crate::error::ValidationErrors`]
    /// inside the `anyhow::Error`.
    pub fn append_amendment(
        &self,
        contract_id: &str,
        draft: AmendmentDraft,
    ) -> anyhow::Result<Accepted> {
        let contract = self.load_contract(contract_id)?;

        let accepted = self.update_chain(contract_id, |chain| {
            let warnings = validate(&contract, &chain.amendments, &draft, &self.config)
                .inspect_err(|errors| {
                    tracing::warn!(contract = %contract.contract_number, %errors, "amendment rejected")
                })?;
            let id = utils::new_uuid_to_bech32("amendment_")?;
            let amendment =
                draft
                    .clone()
                    .finalise(id, &contract, chain.next_sequence(), TimeStamp::new())?;
            let amendment_id = amendment.id.clone();

            chain.insert_amendment(amendment);
            self.mark_quantity_adjustments(&contract, chain);

            let amendment = chain
                .find(&amendment_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Amendment {} vanished", amendment_id))?;
            Ok(Accepted {
                amendment,
                warnings,
            })
        })?;

        tracing::info!(
            contract = %contract.contract_number,
            amendment = %accepted.amendment.amendment_number,
            kind = accepted.amendment.amendment_type().as_str(),
            "appended amendment"
        );
        Ok(accepted)
    }

    /// Replace a user amendment's date, payload and narrative.
    pub fn edit_amendment(
        &self,
        contract_id: &str,
        amendment_id: &str,
        draft: AmendmentDraft,
    ) -> anyhow::Result<Accepted> {
        let contract = self.load_contract(contract_id)?;

        let accepted = self.update_chain(contract_id, |chain| {
            let position = self.position_of(chain, amendment_id)?;
            ensure_mutable(&chain.amendments[position])?;

            let original = chain.amendments.remove(position);
            let mut draft = draft.clone();
            if draft.amendment_number.is_none() {
                draft.amendment_number = Some(original.amendment_number.clone());
            }
            let warnings = validate(&contract, &chain.amendments, &draft, &self.config)?;
            let revised = draft.revise(&original)?;

            chain.amendments.insert(position, revised);
            self.mark_quantity_adjustments(&contract, chain);

            Ok(Accepted {
                amendment: chain.amendments[position].clone(),
                warnings,
            })
        })?;

        tracing::info!(
            contract = %contract.contract_number,
            amendment = %accepted.amendment.amendment_number,
            "edited amendment"
        );
        Ok(accepted)
    }

    /// Remove a user amendment. System records are refused with
    /// [`AmendmentError::ImmutableRecordViolation`].
    pub fn delete_amendment(
        &self,
        contract_id: &str,
        amendment_id: &str,
    ) -> anyhow::Result<AmendmentRecord> {
        let contract = self.load_contract(contract_id)?;

        let removed = self.update_chain(contract_id, |chain| {
            let position = self.position_of(chain, amendment_id)?;
            ensure_mutable(&chain.amendments[position]).inspect_err(|err| {
                tracing::warn!(contract = %contract.contract_number, %err, "delete refused")
            })?;

            let removed = chain.amendments.remove(position);
            self.mark_quantity_adjustments(&contract, chain);
            Ok(removed)
        })?;

        tracing::info!(
            contract = %contract.contract_number,
            amendment = %removed.amendment_number,
            "deleted amendment"
        );
        Ok(removed)
    }

    fn position_of(&self, chain: &AmendmentChain, amendment_id: &str) -> anyhow::Result<usize> {
        chain
            .amendments
            .iter()
            .position(|a| a.id == amendment_id)
            .ok_or_else(|| {
                AmendmentError::UnknownAmendment {
                    contract_id: chain.contract_id.clone(),
                    amendment_id: amendment_id.to_string(),
                }
                .into()
            })
    }

    /// Record on each user amendment whether the fold prorated its quantity.
    fn mark_quantity_adjustments(&self, contract: &ContractRecord, chain: &mut AmendmentChain) {
        // whether proration fires does not depend on the day of evaluation
        let resolution = resolve(contract, &chain.amendments, contract.date_start, &self.config);

        for amendment in chain.amendments.iter_mut().filter(|a| !a.is_system()) {
            amendment.quantity_adjustment_auto = resolution
                .applied_for(&amendment.id)
                .is_some_and(|step| step.quantity_adjustment_auto);
        }
    }

    /// Read-modify-write of one contract's chain. The write is a compare-and-swap
    /// against the bytes read, retried on conflict, so concurrent writers to the
    /// same contract are serialized. Nothing is written when `f` fails or leaves
    /// the chain unchanged.
    fn update_chain<T>(
        &self,
        contract_id: &str,
        mut f: impl FnMut(&mut AmendmentChain) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let key = chain_key(contract_id);

        loop {
            let current = self.instance.get(&key)?;
            let mut chain = match &current {
                Some(bytes) => minicbor::decode(bytes)?,
                None => AmendmentChain::new(contract_id.to_string()),
            };

            let out = f(&mut chain)?;

            let encoded = minicbor::to_vec(&chain)?;
            if current.as_deref() == Some(encoded.as_slice()) {
                return Ok(out);
            }
            if current.is_none() && chain.amendments.is_empty() {
                return Ok(out);
            }

            match self
                .instance
                .compare_and_swap(&key, current, Some(encoded))?
            {
                Ok(()) => return Ok(out),
                Err(_) => {
                    tracing::debug!(contract_id, "amendment chain changed concurrently, retrying");
                }
            }
        }
    }
}
