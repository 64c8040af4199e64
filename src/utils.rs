//! Identifier generation for contracts and amendments

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32, e.g. `amendment_1...`
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Stable id for a system-generated amendment, so re-deriving it yields the same record.
pub fn system_amendment_id(contract_id: &str, sequence: u32) -> String {
    format!("{contract_id}/system/{sequence}")
}
