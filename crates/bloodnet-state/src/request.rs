//! # Emergency Request Lifecycle
//!
//! A patient's request for blood, resolved by a hospital or an administrator.
//!
//! ## States
//!
//! ```text
//!            ┌──▶ Approved ──▶ Completed
//!            │
//! Pending ───┼──▶ Completed
//!            ├──▶ Rejected   (terminal)
//!            └──▶ Cancelled  (terminal)
//! ```
//!
//! `Completed`, `Rejected` and `Cancelled` are terminal. Every transition is
//! appended to the request's transition log. Assigning a hospital does not
//! change the status.
//!
//! Inventory deduction on approval is not performed here; the API layer
//! orchestrates it together with the transition.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bloodnet_core::{
    validate_bounded_text, validate_required_text, AccountId, BloodGroup, RequestId,
    ValidationError,
};

const REASON_MAX_CHARS: usize = 500;
const TEXT_MAX_CHARS: usize = 200;

/// Window for the `recentRequests` statistic.
pub const RECENT_WINDOW_DAYS: i64 = 30;

// ─── Urgency ─────────────────────────────────────────────────────────

/// Request priority. Ordering is priority order: `Critical < Urgent < Normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Critical,
    Urgent,
    #[default]
    Normal,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Urgent => "urgent",
            Self::Normal => "normal",
        }
    }
}

impl FromStr for UrgencyLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "urgent" => Ok(Self::Urgent),
            "normal" => Ok(Self::Normal),
            other => Err(ValidationError::invalid(
                "urgencyLevel",
                format!("unknown urgency level: {other:?}"),
            )),
        }
    }
}

// ─── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Completed,
        Self::Cancelled,
    ];

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [RequestStatus] {
        match self {
            Self::Pending => &[
                Self::Approved,
                Self::Rejected,
                Self::Completed,
                Self::Cancelled,
            ],
            Self::Approved => &[Self::Completed],
            Self::Rejected | Self::Completed | Self::Cancelled => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::invalid("status", format!("invalid status: {s:?}")))
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request is completed, rejected or cancelled.
    #[error("request {request_id} is {status} and cannot change status")]
    AlreadyTerminal {
        request_id: RequestId,
        status: RequestStatus,
    },

    #[error("invalid request transition: {from} -> {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("can only cancel pending requests (request is {status})")]
    CancelNotPending { status: RequestStatus },
}

// ─── Location ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Where the blood is needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLocation {
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
}

// ─── Request ─────────────────────────────────────────────────────────

/// One entry in the transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTransitionRecord {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub actor: AccountId,
    pub at: DateTime<Utc>,
}

/// Input for opening a request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub blood_group: BloodGroup,
    pub quantity: Option<i64>,
    pub urgency_level: Option<UrgencyLevel>,
    pub location: RequestLocation,
    pub patient_name: String,
    pub patient_phone: String,
    pub hospital: String,
    pub doctor_name: Option<String>,
    pub reason: Option<String>,
    pub required_by: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
    pub id: RequestId,
    pub patient_id: AccountId,
    pub blood_group: BloodGroup,
    pub quantity: u32,
    pub urgency_level: UrgencyLevel,
    pub status: RequestStatus,
    pub location: RequestLocation,
    pub assigned_hospital: Option<AccountId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub patient_name: String,
    pub patient_phone: String,
    /// Free-text name of the hospital the patient is at.
    pub hospital: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub required_by: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transitions: Vec<RequestTransitionRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn optional_text(
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(v) => Ok(Some(validate_bounded_text(field, &v, max)?).filter(|v| !v.is_empty())),
    }
}

impl EmergencyRequest {
    /// Open a new pending request for `patient_id`.
    pub fn open(
        patient_id: AccountId,
        input: NewRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, RequestError> {
        let quantity = match input.quantity.unwrap_or(1) {
            q if q < 1 => {
                return Err(ValidationError::invalid("quantity", "must be at least 1").into())
            }
            q => u32::try_from(q)
                .map_err(|_| ValidationError::invalid("quantity", "is too large"))?,
        };
        if input.required_by <= now {
            return Err(ValidationError::invalid("requiredBy", "must be in the future").into());
        }
        let location = RequestLocation {
            address: validate_required_text("location.address", &input.location.address, TEXT_MAX_CHARS)?,
            city: validate_required_text("location.city", &input.location.city, TEXT_MAX_CHARS)?,
            state: validate_required_text("location.state", &input.location.state, TEXT_MAX_CHARS)?,
            coordinates: input.location.coordinates,
        };
        Ok(Self {
            id: RequestId::new(),
            patient_id,
            blood_group: input.blood_group,
            quantity,
            urgency_level: input.urgency_level.unwrap_or_default(),
            status: RequestStatus::Pending,
            location,
            assigned_hospital: None,
            assigned_at: None,
            patient_name: validate_required_text("patientName", &input.patient_name, TEXT_MAX_CHARS)?,
            patient_phone: validate_required_text("patientPhone", &input.patient_phone, TEXT_MAX_CHARS)?,
            hospital: validate_required_text("hospital", &input.hospital, TEXT_MAX_CHARS)?,
            doctor_name: optional_text("doctorName", input.doctor_name, TEXT_MAX_CHARS)?,
            reason: optional_text("reason", input.reason, REASON_MAX_CHARS)?,
            notes: None,
            rejection_reason: None,
            required_by: input.required_by,
            completed_at: None,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// PENDING → APPROVED. The approving hospital becomes the assignee.
    pub fn approve(
        &mut self,
        hospital_id: AccountId,
        actor: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), RequestError> {
        self.require_transition(RequestStatus::Approved)?;
        self.assign_to(hospital_id, now);
        self.do_transition(RequestStatus::Approved, actor, now);
        Ok(())
    }

    /// PENDING → REJECTED. A non-empty reason is required.
    pub fn reject(
        &mut self,
        reason: Option<String>,
        actor: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), RequestError> {
        self.require_transition(RequestStatus::Rejected)?;
        let reason = optional_text("rejectionReason", reason, REASON_MAX_CHARS)?
            .ok_or(ValidationError::MissingField {
                field: "rejectionReason",
            })?;
        self.rejection_reason = Some(reason);
        self.do_transition(RequestStatus::Rejected, actor, now);
        Ok(())
    }

    /// PENDING/APPROVED → COMPLETED. When still unassigned, `claimant`
    /// becomes the assigned hospital.
    pub fn complete(
        &mut self,
        claimant: Option<AccountId>,
        actor: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), RequestError> {
        self.require_transition(RequestStatus::Completed)?;
        if let (None, Some(hospital_id)) = (self.assigned_hospital, claimant) {
            self.assign_to(hospital_id, now);
        }
        self.completed_at = Some(now);
        self.do_transition(RequestStatus::Completed, actor, now);
        Ok(())
    }

    /// PENDING → CANCELLED.
    pub fn cancel(&mut self, actor: AccountId, now: DateTime<Utc>) -> Result<(), RequestError> {
        if self.status != RequestStatus::Pending {
            return Err(RequestError::CancelNotPending {
                status: self.status,
            });
        }
        self.do_transition(RequestStatus::Cancelled, actor, now);
        Ok(())
    }

    /// Point the request at a hospital without changing its status.
    pub fn assign(&mut self, hospital_id: AccountId, now: DateTime<Utc>) {
        self.assign_to(hospital_id, now);
        self.updated_at = now;
    }

    pub fn set_notes(&mut self, notes: Option<String>) -> Result<(), RequestError> {
        if let Some(n) = optional_text("notes", notes, REASON_MAX_CHARS)? {
            self.notes = Some(n);
        }
        Ok(())
    }

    /// A hospital may act on a request that is unassigned or assigned to it.
    pub fn hospital_may_act(&self, hospital_id: AccountId) -> bool {
        self.assigned_hospital.map_or(true, |h| h == hospital_id)
    }

    /// Hospitals see requests assigned to them and every pending request.
    pub fn visible_to_hospital(&self, hospital_id: AccountId) -> bool {
        self.assigned_hospital == Some(hospital_id) || self.status == RequestStatus::Pending
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Pending && now > self.required_by
    }

    /// `"{h}h {m}m"` until the deadline, `"Overdue"` once passed, `None` when
    /// the request is no longer pending.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<String> {
        if self.status != RequestStatus::Pending {
            return None;
        }
        let remaining = self.required_by - now;
        if remaining < Duration::zero() {
            return Some("Overdue".to_string());
        }
        let hours = remaining.num_hours();
        let minutes = (remaining - Duration::hours(hours)).num_minutes();
        Some(format!("{hours}h {minutes}m"))
    }

    fn assign_to(&mut self, hospital_id: AccountId, now: DateTime<Utc>) {
        self.assigned_hospital = Some(hospital_id);
        self.assigned_at = Some(now);
    }

    fn require_transition(&self, to: RequestStatus) -> Result<(), RequestError> {
        if self.status.is_terminal() {
            return Err(RequestError::AlreadyTerminal {
                request_id: self.id,
                status: self.status,
            });
        }
        if !self.status.valid_transitions().contains(&to) {
            return Err(RequestError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: RequestStatus, actor: AccountId, now: DateTime<Utc>) {
        self.transitions.push(RequestTransitionRecord {
            from: self.status,
            to,
            actor,
            at: now,
        });
        self.status = to;
        self.updated_at = now;
    }
}

// ─── Queries ─────────────────────────────────────────────────────────

/// Listing filters. `city` is a case-insensitive substring match.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub blood_group: Option<BloodGroup>,
    pub urgency_level: Option<UrgencyLevel>,
    pub city: Option<String>,
}

impl RequestFilter {
    pub fn matches(&self, req: &EmergencyRequest) -> bool {
        self.status.map_or(true, |s| req.status == s)
            && self.blood_group.map_or(true, |g| req.blood_group == g)
            && self.urgency_level.map_or(true, |u| req.urgency_level == u)
            && self.city.as_deref().map_or(true, |c| {
                req.location
                    .city
                    .to_lowercase()
                    .contains(&c.to_lowercase())
            })
    }
}

/// Urgency first, newest first within a level.
pub fn sort_for_listing(requests: &mut [EmergencyRequest]) {
    requests.sort_by(|a, b| {
        a.urgency_level
            .cmp(&b.urgency_level)
            .then(b.created_at.cmp(&a.created_at))
    });
}

/// Urgency first, oldest first within a level.
pub fn sort_by_urgency_then_age(requests: &mut [EmergencyRequest]) {
    requests.sort_by(|a, b| {
        a.urgency_level
            .cmp(&b.urgency_level)
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// Pending critical requests, oldest first.
pub fn critical_queue<'a>(
    requests: impl IntoIterator<Item = &'a EmergencyRequest>,
) -> Vec<&'a EmergencyRequest> {
    let mut out: Vec<_> = requests
        .into_iter()
        .filter(|r| r.status == RequestStatus::Pending && r.urgency_level == UrgencyLevel::Critical)
        .collect();
    out.sort_by_key(|r| r.created_at);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: RequestStatus,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub blood_group: BloodGroup,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgencyCount {
    pub urgency_level: UrgencyLevel,
    pub count: usize,
}

/// Aggregate request statistics. Breakdowns list only keys that occur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub completed: usize,
    pub recent_requests: usize,
    pub by_status: Vec<StatusCount>,
    pub by_blood_group: Vec<GroupCount>,
    pub by_urgency: Vec<UrgencyCount>,
}

impl RequestStats {
    pub fn compute<'a>(
        requests: impl IntoIterator<Item = &'a EmergencyRequest>,
        now: DateTime<Utc>,
    ) -> Self {
        let since = now - Duration::days(RECENT_WINDOW_DAYS);
        let mut by_status = [0usize; 5];
        let mut by_group = [0usize; 8];
        let mut by_urgency = [0usize; 3];
        let mut total = 0;
        let mut recent = 0;
        for r in requests {
            total += 1;
            if r.created_at >= since {
                recent += 1;
            }
            by_status[r.status as usize] += 1;
            by_urgency[r.urgency_level as usize] += 1;
            if let Some(i) = BloodGroup::ALL.iter().position(|g| *g == r.blood_group) {
                by_group[i] += 1;
            }
        }
        Self {
            total,
            pending: by_status[RequestStatus::Pending as usize],
            approved: by_status[RequestStatus::Approved as usize],
            completed: by_status[RequestStatus::Completed as usize],
            recent_requests: recent,
            by_status: RequestStatus::ALL
                .into_iter()
                .zip(by_status)
                .filter(|(_, n)| *n > 0)
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            by_blood_group: BloodGroup::ALL
                .into_iter()
                .zip(by_group)
                .filter(|(_, n)| *n > 0)
                .map(|(blood_group, count)| GroupCount { blood_group, count })
                .collect(),
            by_urgency: [UrgencyLevel::Critical, UrgencyLevel::Urgent, UrgencyLevel::Normal]
                .into_iter()
                .zip(by_urgency)
                .filter(|(_, n)| *n > 0)
                .map(|(urgency_level, count)| UrgencyCount {
                    urgency_level,
                    count,
                })
                .collect(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn new_request(group: BloodGroup, urgency: UrgencyLevel) -> NewRequest {
        NewRequest {
            blood_group: group,
            quantity: Some(2),
            urgency_level: Some(urgency),
            location: RequestLocation {
                address: "12 MG Road".into(),
                city: "Pune".into(),
                state: "MH".into(),
                coordinates: None,
            },
            patient_name: "Meera".into(),
            patient_phone: "9876543210".into(),
            hospital: "Ruby Hall".into(),
            doctor_name: None,
            reason: None,
            required_by: now() + Duration::hours(6),
        }
    }

    fn pending() -> EmergencyRequest {
        EmergencyRequest::open(
            AccountId::new(),
            new_request(BloodGroup::APositive, UrgencyLevel::Critical),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn open_starts_pending() {
        let req = pending();
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(req.quantity, 2);
        assert_eq!(req.assigned_hospital, None);
        assert!(req.transitions.is_empty());
    }

    #[test]
    fn open_rejects_past_deadline() {
        let mut input = new_request(BloodGroup::APositive, UrgencyLevel::Normal);
        input.required_by = now() - Duration::minutes(1);
        assert!(matches!(
            EmergencyRequest::open(AccountId::new(), input, now()),
            Err(RequestError::Validation(ValidationError::InvalidField { field: "requiredBy", .. }))
        ));
        let mut input = new_request(BloodGroup::APositive, UrgencyLevel::Normal);
        input.required_by = now();
        assert!(EmergencyRequest::open(AccountId::new(), input, now()).is_err());
    }

    #[test]
    fn open_requires_location_and_defaults() {
        let mut input = new_request(BloodGroup::APositive, UrgencyLevel::Normal);
        input.location.city = "".into();
        assert!(matches!(
            EmergencyRequest::open(AccountId::new(), input, now()),
            Err(RequestError::Validation(ValidationError::MissingField { field: "location.city" }))
        ));

        let mut input = new_request(BloodGroup::APositive, UrgencyLevel::Normal);
        input.quantity = None;
        input.urgency_level = None;
        let req = EmergencyRequest::open(AccountId::new(), input, now()).unwrap();
        assert_eq!(req.quantity, 1);
        assert_eq!(req.urgency_level, UrgencyLevel::Normal);
    }

    #[test]
    fn approve_assigns_and_logs() {
        let mut req = pending();
        let hospital = AccountId::new();
        req.approve(hospital, hospital, now()).unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
        assert_eq!(req.assigned_hospital, Some(hospital));
        assert_eq!(req.assigned_at, Some(now()));
        assert_eq!(req.transitions.len(), 1);
        assert_eq!(req.transitions[0].from, RequestStatus::Pending);
        assert_eq!(req.transitions[0].to, RequestStatus::Approved);

        assert_eq!(
            req.approve(hospital, hospital, now()),
            Err(RequestError::InvalidTransition {
                from: RequestStatus::Approved,
                to: RequestStatus::Approved
            })
        );
        req.complete(None, hospital, now()).unwrap();
        assert_eq!(req.completed_at, Some(now()));
    }

    #[test]
    fn terminal_states_reject_everything() {
        let actor = AccountId::new();
        let mut rejected = pending();
        rejected.reject(Some("no stock".into()), actor, now()).unwrap();
        let mut completed = pending();
        completed.complete(Some(actor), actor, now()).unwrap();
        let mut cancelled = pending();
        cancelled.cancel(actor, now()).unwrap();

        for mut req in [rejected, completed, cancelled] {
            let status = req.status;
            assert!(matches!(
                req.approve(actor, actor, now()),
                Err(RequestError::AlreadyTerminal { .. })
            ));
            assert!(req.reject(Some("x".into()), actor, now()).is_err());
            assert!(req.complete(None, actor, now()).is_err());
            assert!(req.cancel(actor, now()).is_err());
            assert_eq!(req.status, status);
            assert_eq!(req.transitions.len(), 1);
        }
    }

    #[test]
    fn reject_requires_reason() {
        let mut req = pending();
        assert_eq!(
            req.reject(Some("  ".into()), AccountId::new(), now()),
            Err(RequestError::Validation(ValidationError::MissingField {
                field: "rejectionReason"
            }))
        );
        assert_eq!(req.status, RequestStatus::Pending);
    }

    #[test]
    fn complete_from_pending_claims_request() {
        let mut req = pending();
        let hospital = AccountId::new();
        req.complete(Some(hospital), hospital, now()).unwrap();
        assert_eq!(req.assigned_hospital, Some(hospital));
        assert_eq!(req.status, RequestStatus::Completed);
    }

    #[test]
    fn cancel_only_while_pending() {
        let mut req = pending();
        let hospital = AccountId::new();
        req.approve(hospital, hospital, now()).unwrap();
        assert_eq!(
            req.cancel(req.patient_id, now()),
            Err(RequestError::CancelNotPending {
                status: RequestStatus::Approved
            })
        );
    }

    #[test]
    fn hospital_access_rules() {
        let mut req = pending();
        let mine = AccountId::new();
        let other = AccountId::new();
        assert!(req.hospital_may_act(mine));
        assert!(req.visible_to_hospital(other));
        req.assign(mine, now());
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.hospital_may_act(mine));
        assert!(!req.hospital_may_act(other));
        req.approve(mine, mine, now()).unwrap();
        assert!(!req.visible_to_hospital(other));
        assert!(req.visible_to_hospital(mine));
    }

    #[test]
    fn time_remaining_formats() {
        let mut req = pending();
        assert_eq!(req.time_remaining(now()).as_deref(), Some("6h 0m"));
        assert_eq!(
            req.time_remaining(now() + Duration::minutes(95)).as_deref(),
            Some("4h 25m")
        );
        assert_eq!(
            req.time_remaining(now() + Duration::hours(7)).as_deref(),
            Some("Overdue")
        );
        assert!(req.is_overdue(now() + Duration::hours(7)));
        assert!(!req.is_overdue(now()));
        let hospital = AccountId::new();
        req.approve(hospital, hospital, now()).unwrap();
        assert_eq!(req.time_remaining(now()), None);
        assert!(!req.is_overdue(now() + Duration::hours(7)));
    }

    #[test]
    fn listing_sorts_by_urgency_then_newest() {
        let mut normal = pending();
        normal.urgency_level = UrgencyLevel::Normal;
        let mut old_critical = pending();
        old_critical.created_at = now() - Duration::hours(2);
        let new_critical = pending();
        let mut list = vec![normal.clone(), old_critical.clone(), new_critical.clone()];
        sort_for_listing(&mut list);
        let ids: Vec<_> = list.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new_critical.id, old_critical.id, normal.id]);

        let queue = critical_queue(&list);
        let ids: Vec<_> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![old_critical.id, new_critical.id]);
    }

    #[test]
    fn filter_matches_city_substring() {
        let req = pending();
        let filter = RequestFilter {
            city: Some("pUN".into()),
            status: Some(RequestStatus::Pending),
            ..Default::default()
        };
        assert!(filter.matches(&req));
        let filter = RequestFilter {
            blood_group: Some(BloodGroup::BPositive),
            ..Default::default()
        };
        assert!(!filter.matches(&req));
    }

    #[test]
    fn stats_tally_present_keys() {
        let mut a = pending();
        let b = pending();
        let mut old = pending();
        old.created_at = now() - Duration::days(45);
        old.blood_group = BloodGroup::ONegative;
        let hospital = AccountId::new();
        a.approve(hospital, hospital, now()).unwrap();
        let stats = RequestStats::compute(&[a, b, old], now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.recent_requests, 2);
        assert_eq!(
            stats.by_status,
            vec![
                StatusCount { status: RequestStatus::Pending, count: 2 },
                StatusCount { status: RequestStatus::Approved, count: 1 },
            ]
        );
        assert_eq!(stats.by_blood_group.len(), 2);
        assert_eq!(stats.by_blood_group[0].blood_group, BloodGroup::APositive);
        assert_eq!(
            stats.by_urgency,
            vec![UrgencyCount { urgency_level: UrgencyLevel::Critical, count: 3 }]
        );
    }

    #[test]
    fn status_parses_and_displays() {
        for s in RequestStatus::ALL {
            assert_eq!(s.as_str().parse::<RequestStatus>().unwrap(), s);
            assert_eq!(s.to_string(), s.as_str());
        }
        assert!("done".parse::<RequestStatus>().is_err());
        assert_eq!("urgent".parse::<UrgencyLevel>().unwrap(), UrgencyLevel::Urgent);
    }
}
