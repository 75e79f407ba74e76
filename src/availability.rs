//! Availability calculator
//!
//! Pure functions over a snapshot of the catalog and the reservation set; no
//! store access and no side effects, so callers may run these concurrently.
//!
//! Capacity policy: demand is counted per overlap, not per day. Every
//! non-cancelled reservation whose range shares at least one day with the
//! requested range contributes its full quantity to the committed sum, even
//! if the two never coincide inside that range. That over-counts partially
//! overlapping bookings but can never admit an over-commitment.

use crate::asset::Asset;
use crate::dates::DateRange;
use crate::error::ValidationError;
use crate::reservation::{Reservation, ReservationStatus};
use std::collections::BTreeMap;

/// One requested asset with the number of units wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub asset_id: String,
    pub quantity: u32,
}

impl AssetRequest {
    pub fn new(asset_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            asset_id: asset_id.into(),
            quantity,
        }
    }
}

/// An existing reservation contributing to an asset's committed quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingReservation {
    pub reservation_id: String,
    pub title: String,
    pub date_range: DateRange,
    pub status: ReservationStatus,
    /// Units of the contested asset this reservation holds.
    pub quantity: u32,
}

/// Per-asset verdict. `conflicts` is populated even when the request fits,
/// so callers can show near-capacity context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAvailability {
    pub asset_id: String,
    pub requested: u32,
    pub is_available: bool,
    pub conflicts: Vec<ConflictingReservation>,
}

/// Validate a raw request list: it must be non-empty, every quantity at
/// least 1. Duplicate asset ids are merged by summing, so the result carries
/// at most one entry per asset, in ascending asset-id order.
pub fn aggregate_requests(
    requests: &[AssetRequest],
) -> Result<Vec<AssetRequest>, ValidationError> {
    if requests.is_empty() {
        return Err(ValidationError::EmptyAssetRequests);
    }

    let mut merged: BTreeMap<&str, u32> = BTreeMap::new();
    for request in requests {
        if request.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        let total = merged.entry(request.asset_id.as_str()).or_insert(0);
        *total = total
            .checked_add(request.quantity)
            .ok_or(ValidationError::QuantityOverflow)?;
    }

    Ok(merged
        .into_iter()
        .map(|(asset_id, quantity)| AssetRequest::new(asset_id, quantity))
        .collect())
}

/// Decide, per requested asset, whether `requests` fits into the capacity
/// left over `range` by the given reservation snapshot.
///
/// Unknown assets (absent from `assets`) and assets not currently bookable
/// report unavailable with no conflicts: the calculator fails closed rather
/// than guess at capacity it cannot see. `exclude_reservation` names a
/// reservation whose demand is ignored, used when re-validating an edit so
/// the reservation does not collide with its own prior booking.
pub fn check_availability(
    assets: &BTreeMap<String, Asset>,
    reservations: &[Reservation],
    requests: &[AssetRequest],
    range: DateRange,
    exclude_reservation: Option<&str>,
) -> Vec<AssetAvailability> {
    requests
        .iter()
        .map(|request| {
            let Some(asset) = assets.get(&request.asset_id) else {
                return AssetAvailability {
                    asset_id: request.asset_id.clone(),
                    requested: request.quantity,
                    is_available: false,
                    conflicts: Vec::new(),
                };
            };

            let conflicts = conflicts_for(asset, reservations, range, exclude_reservation);
            // Widen before summing: many u32 commitments can exceed u32.
            let committed: u64 = conflicts.iter().map(|c| u64::from(c.quantity)).sum();
            let is_available = asset.is_bookable()
                && committed + u64::from(request.quantity) <= u64::from(asset.quantity);

            AssetAvailability {
                asset_id: request.asset_id.clone(),
                requested: request.quantity,
                is_available,
                conflicts,
            }
        })
        .collect()
}

/// Every non-cancelled reservation overlapping `range` that holds units of
/// `asset`, except the excluded one.
fn conflicts_for(
    asset: &Asset,
    reservations: &[Reservation],
    range: DateRange,
    exclude_reservation: Option<&str>,
) -> Vec<ConflictingReservation> {
    reservations
        .iter()
        .filter(|r| r.holds_capacity())
        .filter(|r| exclude_reservation != Some(r.id.as_str()))
        .filter(|r| r.date_range.overlaps(&range))
        .filter_map(|r| {
            r.consumes(&asset.id).map(|quantity| ConflictingReservation {
                reservation_id: r.id.clone(),
                title: r.title.clone(),
                date_range: r.date_range,
                status: r.status,
                quantity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetStatus;
    use crate::dates::{Day, TimeStamp};
    use crate::reservation::{Priority, ReservationAsset};
    use std::collections::BTreeSet;

    fn range(m1: u32, d1: u32, m2: u32, d2: u32) -> DateRange {
        DateRange::new(
            Day::new(2026, m1, d1).unwrap(),
            Day::new(2026, m2, d2).unwrap(),
        )
        .unwrap()
    }

    fn asset(id: &str, quantity: u32) -> Asset {
        Asset {
            id: id.to_owned(),
            name: format!("asset {id}"),
            category: "camera".to_owned(),
            quantity,
            status: AssetStatus::Active,
        }
    }

    fn reservation(id: &str, asset_id: &str, quantity: u32, over: DateRange) -> Reservation {
        Reservation {
            id: id.to_owned(),
            organization_id: "org_test".to_owned(),
            title: format!("booking {id}"),
            project_name: None,
            description: None,
            date_range: over,
            start_time: None,
            end_time: None,
            location: None,
            status: ReservationStatus::Confirmed,
            priority: Priority::Normal,
            team_members: BTreeSet::new(),
            notes: None,
            assets: vec![ReservationAsset {
                asset_id: asset_id.to_owned(),
                quantity,
                checked_out_at: None,
                checked_in_at: None,
            }],
            created_at: TimeStamp::now(),
            updated_at: TimeStamp::now(),
        }
    }

    fn catalog(assets: &[Asset]) -> BTreeMap<String, Asset> {
        assets.iter().map(|a| (a.id.clone(), a.clone())).collect()
    }

    #[test]
    fn empty_request_list_is_rejected() {
        assert_eq!(
            aggregate_requests(&[]),
            Err(ValidationError::EmptyAssetRequests)
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let requests = [AssetRequest::new("a", 1), AssetRequest::new("b", 0)];
        assert_eq!(
            aggregate_requests(&requests),
            Err(ValidationError::ZeroQuantity)
        );
    }

    #[test]
    fn duplicate_requests_merge_by_summing() {
        let requests = [
            AssetRequest::new("b", 1),
            AssetRequest::new("a", 2),
            AssetRequest::new("b", 3),
        ];
        let merged = aggregate_requests(&requests).unwrap();

        assert_eq!(
            merged,
            vec![AssetRequest::new("a", 2), AssetRequest::new("b", 4)]
        );
    }

    #[test]
    fn merging_cannot_overflow_a_request() {
        let requests = [
            AssetRequest::new("a", u32::MAX),
            AssetRequest::new("a", 1),
        ];
        assert_eq!(
            aggregate_requests(&requests),
            Err(ValidationError::QuantityOverflow)
        );
    }

    // The committed sum spans every overlapping reservation, so two bookings
    // near u32::MAX that never overlap each other must still be summable
    // when one queried range covers both.
    #[test]
    fn huge_committed_quantities_do_not_overflow() {
        let assets = catalog(&[asset("a", u32::MAX)]);
        let existing = vec![
            reservation("r1", "a", u32::MAX, range(1, 1, 1, 5)),
            reservation("r2", "a", u32::MAX, range(1, 10, 1, 15)),
        ];

        let report = check_availability(
            &assets,
            &existing,
            &[AssetRequest::new("a", 1)],
            range(1, 3, 1, 12),
            None,
        );

        assert!(!report[0].is_available);
        assert_eq!(report[0].conflicts.len(), 2);
    }

    #[test]
    fn unknown_asset_fails_closed() {
        let report = check_availability(
            &catalog(&[]),
            &[],
            &[AssetRequest::new("ghost", 1)],
            range(1, 1, 1, 5),
            None,
        );

        assert_eq!(report.len(), 1);
        assert!(!report[0].is_available);
        assert!(report[0].conflicts.is_empty());
    }

    #[test]
    fn non_active_asset_is_not_bookable() {
        let mut broken = asset("a", 3);
        broken.status = AssetStatus::Maintenance;

        let report = check_availability(
            &catalog(&[broken]),
            &[],
            &[AssetRequest::new("a", 1)],
            range(1, 1, 1, 5),
            None,
        );

        assert!(!report[0].is_available);
    }

    // Two existing 1-unit bookings that never coincide with each other both
    // overlap the requested window, so on a 2-unit asset a 2-unit request
    // must be refused under the any-overlap policy.
    #[test]
    fn partial_overlaps_count_as_fully_concurrent() {
        let assets = catalog(&[asset("a", 2)]);
        let existing = vec![
            reservation("r1", "a", 1, range(1, 1, 1, 5)),
            reservation("r2", "a", 1, range(1, 10, 1, 15)),
        ];

        let report = check_availability(
            &assets,
            &existing,
            &[AssetRequest::new("a", 2)],
            range(1, 3, 1, 12),
            None,
        );

        assert!(!report[0].is_available);
        assert_eq!(report[0].conflicts.len(), 2);
    }

    #[test]
    fn adjacent_booking_is_admitted() {
        let assets = catalog(&[asset("a", 1)]);
        let existing = vec![reservation("r1", "a", 1, range(1, 1, 1, 5))];

        let report = check_availability(
            &assets,
            &existing,
            &[AssetRequest::new("a", 1)],
            range(1, 6, 1, 10),
            None,
        );

        assert!(report[0].is_available);
        assert!(report[0].conflicts.is_empty());
    }

    #[test]
    fn cancelled_reservations_hold_no_capacity() {
        let assets = catalog(&[asset("a", 1)]);
        let mut cancelled = reservation("r1", "a", 1, range(1, 1, 1, 5));
        cancelled.status = ReservationStatus::Cancelled;

        let report = check_availability(
            &assets,
            &[cancelled],
            &[AssetRequest::new("a", 1)],
            range(1, 3, 1, 8),
            None,
        );

        assert!(report[0].is_available);
    }

    #[test]
    fn excluded_reservation_does_not_conflict_with_itself() {
        let assets = catalog(&[asset("a", 1)]);
        let existing = vec![reservation("r1", "a", 1, range(1, 1, 1, 5))];

        let report = check_availability(
            &assets,
            &existing,
            &[AssetRequest::new("a", 1)],
            range(1, 2, 1, 7),
            Some("r1"),
        );

        assert!(report[0].is_available);
    }

    #[test]
    fn near_capacity_fit_still_reports_conflicts() {
        let assets = catalog(&[asset("a", 3)]);
        let existing = vec![reservation("r1", "a", 2, range(1, 1, 1, 5))];

        let report = check_availability(
            &assets,
            &existing,
            &[AssetRequest::new("a", 1)],
            range(1, 4, 1, 9),
            None,
        );

        assert!(report[0].is_available);
        assert_eq!(report[0].conflicts.len(), 1);
        assert_eq!(report[0].conflicts[0].reservation_id, "r1");
    }
}
