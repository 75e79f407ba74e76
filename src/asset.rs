//! Asset catalog: the bookable inventory an organization owns
//!
//! The engine treats the catalog as read-only; the writer surface here
//! (`register_asset`, `set_asset_status`) exists for the surrounding product
//! and the tests to populate it. All keys embed the organization id, so a
//! lookup with a foreign id simply misses.

use crate::error::{EngineError, ValidationError};
use crate::utils;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum AssetStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Maintenance,
    #[n(2)]
    Retired,
    #[n(3)]
    Sold,
}

/// A named, quantity-bounded resource. `quantity` is the number of
/// interchangeable physical units, never less than 1.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Asset {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub category: String,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub status: AssetStatus,
}

impl Asset {
    /// Only active assets accept new bookings.
    pub fn is_bookable(&self) -> bool {
        self.status == AssetStatus::Active
    }

    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            quantity: self.quantity,
        }
    }

    pub(crate) fn storage_key(org: &str, id: &str) -> Vec<u8> {
        format!("asset/{org}/{id}").into_bytes()
    }
}

/// The slice of an asset that read views carry alongside booked lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub quantity: u32,
}

pub struct AssetCatalog {
    instance: Arc<sled::Db>,
}

impl AssetCatalog {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Add an asset to a tenant's catalog. Rejects a zero quantity up front;
    /// an asset that can never satisfy a booking has no business existing.
    pub fn register_asset(
        &self,
        org: &str,
        name: &str,
        category: &str,
        quantity: u32,
    ) -> Result<Asset, EngineError> {
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }

        let asset = Asset {
            id: utils::mint_id("asset_"),
            name: name.to_owned(),
            category: category.to_owned(),
            quantity,
            status: AssetStatus::Active,
        };
        self.persist(org, &asset)?;

        Ok(asset)
    }

    pub fn set_asset_status(
        &self,
        org: &str,
        id: &str,
        status: AssetStatus,
    ) -> Result<Asset, EngineError> {
        let mut asset = self.get_asset(org, id)?;
        asset.status = status;
        self.persist(org, &asset)?;

        Ok(asset)
    }

    pub fn get_asset(&self, org: &str, id: &str) -> Result<Asset, EngineError> {
        let Some(raw) = self.instance.get(Asset::storage_key(org, id))? else {
            return Err(EngineError::not_found("asset", id));
        };

        Ok(minicbor::decode(&raw)?)
    }

    pub fn list_assets(&self, org: &str) -> Result<Vec<Asset>, EngineError> {
        let prefix = format!("asset/{org}/").into_bytes();

        let mut assets = Vec::new();
        for entry in self.instance.scan_prefix(prefix) {
            let (_, raw) = entry?;
            assets.push(minicbor::decode(&raw)?);
        }

        Ok(assets)
    }

    /// Collaborator contract consumed by the availability calculator: fetch
    /// the requested assets scoped to the tenant. Ids that do not exist for
    /// this tenant are silently absent from the result; the calculator
    /// fails closed on them.
    pub fn assets_by_ids(
        &self,
        org: &str,
        ids: &[String],
    ) -> Result<BTreeMap<String, Asset>, EngineError> {
        let mut found = BTreeMap::new();
        for id in ids {
            if let Some(raw) = self.instance.get(Asset::storage_key(org, id))? {
                let asset: Asset = minicbor::decode(&raw)?;
                found.insert(asset.id.clone(), asset);
            }
        }

        Ok(found)
    }

    fn persist(&self, org: &str, asset: &Asset) -> Result<(), EngineError> {
        self.instance.insert(
            Asset::storage_key(org, &asset.id),
            minicbor::to_vec(asset)?,
        )?;
        Ok(())
    }
}
