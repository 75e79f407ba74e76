//! Service layer API for reservation lifecycle operations
//!
//! One `ReservationService` per store. Every mutation that depends on an
//! availability check holds `write_lock` from the check through the commit,
//! so two concurrent requests can never both pass the check and then both
//! book the last unit. Reads take no lock.

use crate::asset::{Asset, AssetCatalog};
use crate::availability::{self, AssetAvailability, AssetRequest, aggregate_requests};
use crate::builder::{ReservationDraft, ReservationPatch};
use crate::dates::{DateRange, TimeStamp};
use crate::error::{EngineError, ValidationError};
use crate::kit::{self, AssetKit, AssetKitItem};
use crate::reservation::{
    BookedAsset, Reservation, ReservationAsset, ReservationStatus, ReservationView,
};
use crate::utils;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub struct ReservationService {
    instance: Arc<sled::Db>,
    catalog: AssetCatalog,
    // Serializes check-then-commit sequences; see DESIGN.md on the
    // check-then-insert race.
    write_lock: Mutex<()>,
}

impl ReservationService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            catalog: AssetCatalog::new(instance.clone()),
            instance,
            write_lock: Mutex::new(()),
        }
    }

    /// Handle on the asset catalog collaborator backed by the same store.
    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_reservation(&self, org: &str, id: &str) -> Result<Reservation, EngineError> {
        Reservation::load_from_db(&self.instance, org, id)?
            .ok_or_else(|| EngineError::not_found("reservation", id))
    }

    fn tenant_reservations(&self, org: &str) -> Result<Vec<Reservation>, EngineError> {
        let prefix = format!("rsv/{org}/").into_bytes();

        let mut reservations = Vec::new();
        for entry in self.instance.scan_prefix(prefix) {
            let (_, raw) = entry?;
            reservations.push(minicbor::decode(&raw)?);
        }

        Ok(reservations)
    }

    /// Availability over the tenant's current reservation snapshot. Assumes
    /// `requests` is already aggregated.
    fn availability_report(
        &self,
        org: &str,
        requests: &[AssetRequest],
        range: DateRange,
        exclude: Option<&str>,
    ) -> Result<Vec<AssetAvailability>, EngineError> {
        let ids: Vec<String> = requests.iter().map(|r| r.asset_id.clone()).collect();
        let assets = self.catalog.assets_by_ids(org, &ids)?;
        let reservations = self.tenant_reservations(org)?;

        Ok(availability::check_availability(
            &assets,
            &reservations,
            requests,
            range,
            exclude,
        ))
    }

    /// Pure read: per-asset availability of `requests` over `range`,
    /// optionally ignoring one reservation's own demand.
    pub fn check_availability(
        &self,
        org: &str,
        requests: &[AssetRequest],
        range: DateRange,
        exclude_reservation: Option<&str>,
    ) -> Result<Vec<AssetAvailability>, EngineError> {
        let requests = aggregate_requests(requests)?;
        self.availability_report(org, &requests, range, exclude_reservation)
    }

    /// Book a new reservation. All requested assets must fit, or nothing is
    /// persisted and the conflict report names every offender.
    pub fn create_reservation(
        &self,
        org: &str,
        draft: ReservationDraft,
    ) -> Result<Reservation, EngineError> {
        let draft = draft.validate_and_finalise()?;

        let _guard = self.lock_writes();

        let report = self.availability_report(org, &draft.requests, draft.date_range, None)?;
        let unavailable: Vec<AssetAvailability> =
            report.into_iter().filter(|a| !a.is_available).collect();
        if !unavailable.is_empty() {
            warn!(
                org,
                assets = unavailable.len(),
                range = %draft.date_range,
                "booking rejected on availability"
            );
            return Err(EngineError::Conflict(unavailable));
        }

        let now = TimeStamp::now();
        let reservation = Reservation {
            id: utils::mint_id("rsv_"),
            organization_id: org.to_owned(),
            title: draft.title,
            project_name: draft.project_name,
            description: draft.description,
            date_range: draft.date_range,
            start_time: draft.start_time,
            end_time: draft.end_time,
            location: draft.location,
            status: draft.status,
            priority: draft.priority,
            team_members: draft.team_members,
            notes: draft.notes,
            assets: draft
                .requests
                .iter()
                .map(|r| ReservationAsset {
                    asset_id: r.asset_id.clone(),
                    quantity: r.quantity,
                    checked_out_at: None,
                    checked_in_at: None,
                })
                .collect(),
            created_at: now.clone(),
            updated_at: now,
        };

        // Header and lines are one value; this write is the whole booking.
        reservation.save_to_db(&self.instance)?;

        info!(org, reservation = %reservation.id, range = %reservation.date_range, "reservation created");
        Ok(reservation)
    }

    /// Apply a patch. Status changes go through the state machine; a new
    /// date range or asset set is re-validated with this reservation's own
    /// demand excluded. Rejection leaves the stored reservation untouched.
    pub fn update_reservation(
        &self,
        org: &str,
        id: &str,
        patch: ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let _guard = self.lock_writes();

        let mut reservation = self.load_reservation(org, id)?;

        if let Some(next) = patch.status {
            if !reservation.status.can_transition_to(next) {
                return Err(ValidationError::InvalidTransition {
                    from: reservation.status,
                    to: next,
                }
                .into());
            }
        }

        if patch.needs_recheck() {
            let new_range = patch.date_range.unwrap_or(reservation.date_range);
            let new_requests = match &patch.requests {
                Some(requests) => aggregate_requests(requests)?,
                None => reservation
                    .assets
                    .iter()
                    .map(|line| AssetRequest::new(&line.asset_id, line.quantity))
                    .collect(),
            };

            let report = self.availability_report(org, &new_requests, new_range, Some(id))?;
            let unavailable: Vec<AssetAvailability> =
                report.into_iter().filter(|a| !a.is_available).collect();
            if !unavailable.is_empty() {
                warn!(
                    org,
                    reservation = id,
                    assets = unavailable.len(),
                    "update rejected on availability"
                );
                return Err(EngineError::Conflict(unavailable));
            }

            // Replace the line set, carrying handoff stamps over for assets
            // that stay booked.
            let new_lines: Vec<ReservationAsset> = new_requests
                .iter()
                .map(|r| {
                    let prior = reservation
                        .assets
                        .iter()
                        .find(|line| line.asset_id == r.asset_id);
                    ReservationAsset {
                        asset_id: r.asset_id.clone(),
                        quantity: r.quantity,
                        checked_out_at: prior.and_then(|l| l.checked_out_at.clone()),
                        checked_in_at: prior.and_then(|l| l.checked_in_at.clone()),
                    }
                })
                .collect();
            reservation.assets = new_lines;
            reservation.date_range = new_range;
        }

        if let Some(title) = patch.title {
            reservation.title = title;
        }
        if let Some(project_name) = patch.project_name {
            reservation.project_name = Some(project_name);
        }
        if let Some(description) = patch.description {
            reservation.description = Some(description);
        }
        if let Some(location) = patch.location {
            reservation.location = Some(location);
        }
        if let Some(notes) = patch.notes {
            reservation.notes = Some(notes);
        }
        if let Some(start_time) = patch.start_time {
            reservation.start_time = Some(start_time);
        }
        if let Some(end_time) = patch.end_time {
            reservation.end_time = Some(end_time);
        }
        if let Some(priority) = patch.priority {
            reservation.priority = priority;
        }
        if let Some(team_members) = patch.team_members {
            reservation.team_members = team_members;
        }
        if let Some(status) = patch.status {
            reservation.status = status;
        }
        reservation.updated_at = TimeStamp::now();

        reservation.save_to_db(&self.instance)?;

        debug!(org, reservation = id, "reservation updated");
        Ok(reservation)
    }

    /// Shorthand for a status patch to `Cancelled`. The reservation stays in
    /// the store for audit and export but releases all held capacity.
    pub fn cancel_reservation(&self, org: &str, id: &str) -> Result<Reservation, EngineError> {
        let updated = self.update_reservation(
            org,
            id,
            ReservationPatch::new().set_status(ReservationStatus::Cancelled),
        )?;

        info!(org, reservation = id, "reservation cancelled");
        Ok(updated)
    }

    /// Hard removal, allowed in any status. Needs no availability check:
    /// removal only ever frees capacity.
    pub fn delete_reservation(&self, org: &str, id: &str) -> Result<(), EngineError> {
        // Existence check doubles as the tenant check.
        self.load_reservation(org, id)?;
        self.instance.remove(Reservation::storage_key(org, id))?;

        info!(org, reservation = id, "reservation deleted");
        Ok(())
    }

    pub fn get_reservation(&self, org: &str, id: &str) -> Result<ReservationView, EngineError> {
        let reservation = self.load_reservation(org, id)?;

        let ids: Vec<String> = reservation
            .assets
            .iter()
            .map(|line| line.asset_id.clone())
            .collect();
        let assets = self.catalog.assets_by_ids(org, &ids)?;

        let lines = reservation
            .assets
            .iter()
            .map(|line| BookedAsset {
                line: line.clone(),
                asset: assets.get(&line.asset_id).map(Asset::summary),
            })
            .collect();

        Ok(ReservationView { reservation, lines })
    }

    /// All of the tenant's reservations, oldest first. Bech32 ids do not
    /// sort chronologically, so store key order is not creation order.
    pub fn list_reservations(&self, org: &str) -> Result<Vec<Reservation>, EngineError> {
        let mut reservations = self.tenant_reservations(org)?;
        reservations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(reservations)
    }

    /// Calendar-view read: reservations sharing at least one day with
    /// `range`, cancelled ones included (callers filter on status).
    pub fn list_reservations_overlapping(
        &self,
        org: &str,
        range: DateRange,
    ) -> Result<Vec<Reservation>, EngineError> {
        let mut reservations = self.list_reservations(org)?;
        reservations.retain(|r| r.date_range.overlaps(&range));
        Ok(reservations)
    }

    /// Persist a kit template for the tenant.
    pub fn define_kit(
        &self,
        org: &str,
        name: &str,
        category: &str,
        items: Vec<AssetKitItem>,
    ) -> Result<AssetKit, EngineError> {
        let items = kit::normalize_items(items)?;
        let kit = AssetKit {
            id: utils::mint_id("kit_"),
            name: name.to_owned(),
            category: category.to_owned(),
            items,
        };

        self.instance
            .insert(AssetKit::storage_key(org, &kit.id), minicbor::to_vec(&kit)?)?;

        debug!(org, kit = %kit.id, "kit defined");
        Ok(kit)
    }

    /// Replace a kit's item set. Reservations already expanded from the kit
    /// own their lines and are not touched.
    pub fn update_kit_items(
        &self,
        org: &str,
        id: &str,
        items: Vec<AssetKitItem>,
    ) -> Result<AssetKit, EngineError> {
        let mut kit = self.get_kit(org, id)?;
        kit.items = kit::normalize_items(items)?;

        self.instance
            .insert(AssetKit::storage_key(org, id), minicbor::to_vec(&kit)?)?;

        debug!(org, kit = id, "kit items replaced");
        Ok(kit)
    }

    pub fn get_kit(&self, org: &str, id: &str) -> Result<AssetKit, EngineError> {
        kit::load_from_db(&self.instance, org, id)?
            .ok_or_else(|| EngineError::not_found("kit", id))
    }

    pub fn list_kits(&self, org: &str) -> Result<Vec<AssetKit>, EngineError> {
        let prefix = format!("kit/{org}/").into_bytes();

        let mut kits = Vec::new();
        for entry in self.instance.scan_prefix(prefix) {
            let (_, raw) = entry?;
            kits.push(minicbor::decode(&raw)?);
        }

        Ok(kits)
    }

    /// Snapshot a kit template into a request set ready for a draft. The
    /// resulting reservation owns its lines; later template edits do not
    /// reach it.
    pub fn expand_kit(&self, org: &str, kit_id: &str) -> Result<Vec<AssetRequest>, EngineError> {
        Ok(self.get_kit(org, kit_id)?.expand())
    }

    /// Record the physical handout of one booked asset.
    pub fn check_out(
        &self,
        org: &str,
        id: &str,
        asset_id: &str,
    ) -> Result<Reservation, EngineError> {
        // Load-modify-save like any other mutation: without the lock this
        // could write back a reservation snapshot from before a concurrent
        // update committed.
        let _guard = self.lock_writes();

        let mut reservation = self.load_reservation(org, id)?;

        let line = reservation
            .assets
            .iter_mut()
            .find(|line| line.asset_id == asset_id)
            .ok_or_else(|| EngineError::not_found("asset", asset_id))?;
        line.checked_out_at = Some(TimeStamp::now());
        line.checked_in_at = None;
        reservation.updated_at = TimeStamp::now();

        reservation.save_to_db(&self.instance)?;

        debug!(org, reservation = id, asset = asset_id, "asset checked out");
        Ok(reservation)
    }

    /// Record the return of one booked asset. Requires a prior check-out.
    pub fn check_in(
        &self,
        org: &str,
        id: &str,
        asset_id: &str,
    ) -> Result<Reservation, EngineError> {
        let _guard = self.lock_writes();

        let mut reservation = self.load_reservation(org, id)?;

        let line = reservation
            .assets
            .iter_mut()
            .find(|line| line.asset_id == asset_id)
            .ok_or_else(|| EngineError::not_found("asset", asset_id))?;
        if line.checked_out_at.is_none() {
            return Err(ValidationError::NotCheckedOut.into());
        }
        line.checked_in_at = Some(TimeStamp::now());
        reservation.updated_at = TimeStamp::now();

        reservation.save_to_db(&self.instance)?;

        debug!(org, reservation = id, asset = asset_id, "asset checked in");
        Ok(reservation)
    }
}
