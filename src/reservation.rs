//! Reservation aggregate and its lifecycle state machine
//!
//! A reservation owns its per-asset lines (`ReservationAsset`) inline, so a
//! header and its lines are always written and read as one value. There is
//! never a reservation on disk with missing line items.

use crate::asset::AssetSummary;
use crate::dates::{DateRange, TimeOfDay, TimeStamp};
use crate::error::EngineError;
use chrono::Utc;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ReservationStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Confirmed,
    #[n(2)]
    Active,
    #[n(3)]
    Completed,
    #[n(4)]
    Cancelled,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Forward chain `Pending -> Confirmed -> Active -> Completed`, with
    /// `Cancelled` reachable from any non-terminal state. Re-asserting the
    /// current status is allowed; callers treat it as a no-op.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        if *self == next {
            return true;
        }

        match (*self, next) {
            (Self::Pending, Self::Confirmed) => true,
            (Self::Confirmed, Self::Active) => true,
            (Self::Active, Self::Completed) => true,
            (from, Self::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Priority {
    #[n(0)]
    Low,
    #[n(1)]
    Normal,
    #[n(2)]
    High,
    #[n(3)]
    Critical,
}

/// One asset's quantity commitment within a reservation. The check-out and
/// check-in stamps track the physical handoff only; availability never
/// looks at them.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct ReservationAsset {
    #[n(0)]
    pub asset_id: String,
    #[n(1)]
    pub quantity: u32,
    #[n(2)]
    pub checked_out_at: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub checked_in_at: Option<TimeStamp<Utc>>,
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Reservation {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub organization_id: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub project_name: Option<String>,
    #[n(4)]
    pub description: Option<String>,
    #[n(5)]
    pub date_range: DateRange,
    #[n(6)]
    pub start_time: Option<TimeOfDay>,
    #[n(7)]
    pub end_time: Option<TimeOfDay>,
    #[n(8)]
    pub location: Option<String>,
    #[n(9)]
    pub status: ReservationStatus,
    #[n(10)]
    pub priority: Priority,
    #[n(11)]
    pub team_members: BTreeSet<String>,
    #[n(12)]
    pub notes: Option<String>,
    /// Line items, at most one per asset id.
    #[n(13)]
    pub assets: Vec<ReservationAsset>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
}

impl Reservation {
    /// Quantity of `asset_id` this reservation holds, if any.
    pub fn consumes(&self, asset_id: &str) -> Option<u32> {
        self.assets
            .iter()
            .find(|line| line.asset_id == asset_id)
            .map(|line| line.quantity)
    }

    /// Cancelled reservations put no demand on the capacity ledger.
    pub fn holds_capacity(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }

    pub(crate) fn storage_key(org: &str, id: &str) -> Vec<u8> {
        format!("rsv/{org}/{id}").into_bytes()
    }

    pub(crate) fn load_from_db(
        db: &sled::Db,
        org: &str,
        id: &str,
    ) -> Result<Option<Self>, EngineError> {
        match db.get(Self::storage_key(org, id))? {
            Some(raw) => Ok(Some(minicbor::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn save_to_db(&self, db: &sled::Db) -> Result<(), EngineError> {
        db.insert(
            Self::storage_key(&self.organization_id, &self.id),
            minicbor::to_vec(self)?,
        )?;
        Ok(())
    }
}

/// A reservation joined with the catalog summary of each booked asset, the
/// shape the calendar and packing-list consumers read.
#[derive(Debug, Clone)]
pub struct ReservationView {
    pub reservation: Reservation,
    pub lines: Vec<BookedAsset>,
}

#[derive(Debug, Clone)]
pub struct BookedAsset {
    pub line: ReservationAsset,
    /// None when the asset has since left the catalog.
    pub asset: Option<AssetSummary>,
}
