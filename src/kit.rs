//! Asset kits: reusable booking templates
//!
//! A kit is a named constructor for a quantity set, never a live link.
//! Expansion copies the items into plain `AssetRequest`s at the moment a
//! booking is drafted; editing the template afterwards leaves every
//! reservation created from it untouched.

use crate::availability::AssetRequest;
use crate::error::{EngineError, ValidationError};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct AssetKitItem {
    #[n(0)]
    pub asset_id: String,
    #[n(1)]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct AssetKit {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub category: String,
    /// Held in ascending asset-id order, one entry per asset.
    #[n(3)]
    pub items: Vec<AssetKitItem>,
}

impl AssetKit {
    /// Snapshot the template into a request set. Deterministic: the same kit
    /// always expands to the same ordered list.
    pub fn expand(&self) -> Vec<AssetRequest> {
        self.items
            .iter()
            .map(|item| AssetRequest::new(&item.asset_id, item.quantity))
            .collect()
    }

    pub(crate) fn storage_key(org: &str, id: &str) -> Vec<u8> {
        format!("kit/{org}/{id}").into_bytes()
    }
}

/// Normalize template items: non-empty, positive quantities, duplicates
/// merged, sorted by asset id.
pub(crate) fn normalize_items(
    items: Vec<AssetKitItem>,
) -> Result<Vec<AssetKitItem>, ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyKit);
    }

    let mut merged: BTreeMap<String, u32> = BTreeMap::new();
    for item in items {
        if item.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        let total = merged.entry(item.asset_id).or_insert(0);
        *total = total
            .checked_add(item.quantity)
            .ok_or(ValidationError::QuantityOverflow)?;
    }

    Ok(merged
        .into_iter()
        .map(|(asset_id, quantity)| AssetKitItem { asset_id, quantity })
        .collect())
}

pub(crate) fn load_from_db(
    db: &sled::Db,
    org: &str,
    id: &str,
) -> Result<Option<AssetKit>, EngineError> {
    match db.get(AssetKit::storage_key(org, id))? {
        Some(raw) => Ok(Some(minicbor::decode(&raw)?)),
        None => Ok(None),
    }
}
