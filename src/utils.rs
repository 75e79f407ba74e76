//! Identifier minting helpers
//!
//! Every entity the engine stores is addressed by a uuid7 rendered as a
//! bech32 string with a human-readable prefix naming the entity kind:
//! `org_` for organizations, `asset_` for catalog assets, `rsv_` for
//! reservations, `kit_` for asset kits and `user_` for team members.

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Mint an id from a prefix literal the crate controls. Encoding a 16-byte
/// uuid cannot overflow bech32 limits, so failure here means the prefix
/// itself is not a valid human-readable part.
pub(crate) fn mint_id(hrp: &str) -> String {
    new_uuid_to_bech32(hrp).expect("prefix literal must be a valid bech32 hrp")
}
