//! Draft and patch inputs for reservation mutations
//!
//! `ReservationDraft` is the chainable construction path for a new booking;
//! nothing reaches the store until `validate_and_finalise` has passed. A
//! `ReservationPatch` describes an edit: `None` fields are left untouched.

use crate::availability::{AssetRequest, aggregate_requests};
use crate::dates::{DateRange, TimeOfDay};
use crate::error::ValidationError;
use crate::reservation::{Priority, ReservationStatus};
use std::collections::BTreeSet;

// used for constructing bookings before any store interaction
#[derive(Debug, Default)]
pub struct ReservationDraft {
    title: Option<String>,
    project_name: Option<String>,
    description: Option<String>,
    location: Option<String>,
    notes: Option<String>,
    date_range: Option<DateRange>,
    start_time: Option<TimeOfDay>,
    end_time: Option<TimeOfDay>,
    status: Option<ReservationStatus>,
    priority: Option<Priority>,
    team_members: BTreeSet<String>,
    requests: Vec<AssetRequest>,
}

impl ReservationDraft {
    /// Construct a new builder object, the basis for a draft booking.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }
    pub fn set_project_name(mut self, project_name: &str) -> Self {
        self.project_name = Some(project_name.to_owned());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
    pub fn set_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_owned());
        self
    }
    pub fn set_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_owned());
        self
    }
    pub fn set_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }
    pub fn set_start_time(mut self, time: TimeOfDay) -> Self {
        self.start_time = Some(time);
        self
    }
    pub fn set_end_time(mut self, time: TimeOfDay) -> Self {
        self.end_time = Some(time);
        self
    }
    pub fn set_status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
    pub fn add_team_member(mut self, user_id: &str) -> Self {
        self.team_members.insert(user_id.to_owned());
        self
    }
    pub fn request_asset(mut self, asset_id: &str, quantity: u32) -> Self {
        self.requests.push(AssetRequest::new(asset_id, quantity));
        self
    }
    /// Append a pre-built request set, e.g. the output of a kit expansion.
    pub fn request_assets(mut self, requests: impl IntoIterator<Item = AssetRequest>) -> Self {
        self.requests.extend(requests);
        self
    }

    /// Checks fields and performs validation, returning the normalized input
    /// the lifecycle manager persists from.
    pub fn validate_and_finalise(self) -> Result<FinalisedDraft, ValidationError> {
        let title = match self.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(ValidationError::MissingTitle),
        };
        let date_range = self.date_range.ok_or(ValidationError::MissingDateRange)?;
        let requests = aggregate_requests(&self.requests)?;

        Ok(FinalisedDraft {
            title,
            project_name: self.project_name,
            description: self.description,
            location: self.location,
            notes: self.notes,
            date_range,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status.unwrap_or(ReservationStatus::Pending),
            priority: self.priority.unwrap_or(Priority::Normal),
            team_members: self.team_members,
            requests,
        })
    }
}

/// A draft that passed validation: title present, range well-formed, request
/// set non-empty with positive quantities and one entry per asset.
#[derive(Debug)]
pub struct FinalisedDraft {
    pub title: String,
    pub project_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub date_range: DateRange,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub status: ReservationStatus,
    pub priority: Priority,
    pub team_members: BTreeSet<String>,
    pub requests: Vec<AssetRequest>,
}

/// Field-wise edit of an existing reservation. Descriptive fields always
/// apply; a new `status` must be a legal transition; a new `date_range` or
/// `requests` set triggers re-validation against the capacity ledger.
#[derive(Debug, Default)]
pub struct ReservationPatch {
    pub title: Option<String>,
    pub project_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub status: Option<ReservationStatus>,
    pub priority: Option<Priority>,
    pub team_members: Option<BTreeSet<String>>,
    pub date_range: Option<DateRange>,
    pub requests: Option<Vec<AssetRequest>>,
}

impl ReservationPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }
    pub fn set_project_name(mut self, project_name: &str) -> Self {
        self.project_name = Some(project_name.to_owned());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
    pub fn set_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_owned());
        self
    }
    pub fn set_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_owned());
        self
    }
    pub fn set_start_time(mut self, time: TimeOfDay) -> Self {
        self.start_time = Some(time);
        self
    }
    pub fn set_end_time(mut self, time: TimeOfDay) -> Self {
        self.end_time = Some(time);
        self
    }
    pub fn set_status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
    pub fn set_team_members(mut self, members: BTreeSet<String>) -> Self {
        self.team_members = Some(members);
        self
    }
    pub fn set_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }
    pub fn set_requests(mut self, requests: Vec<AssetRequest>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// True when applying this patch can change committed capacity and so
    /// requires an availability re-check.
    pub fn needs_recheck(&self) -> bool {
        self.date_range.is_some() || self.requests.is_some()
    }
}
