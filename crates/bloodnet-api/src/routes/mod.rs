//! # API Route Modules
//!
//! - `auth`: registration, login, logout and self-service profile.
//! - `users`: administrator user management, hospital and donor
//!   directories, the donor dashboard.
//! - `inventory`: the hospital stock ledger, alerts and public search.
//! - `donations`: donation recording with its donor/inventory fan-out,
//!   amendments and statistics.
//! - `requests`: the emergency-request lifecycle, listings and statistics.
//!
//! Each module exposes `router()` for authenticated routes; modules with
//! public endpoints also expose `public_router()`. Role checks happen in the
//! handlers via [`crate::auth::require_any_role`]; ownership checks that
//! need stored state happen in [`crate::orchestration`].

pub mod auth;
pub mod donations;
pub mod inventory;
pub mod requests;
pub mod users;

use bloodnet_core::{AccountId, BloodGroup};
use bloodnet_state::Role;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::parse_id;
use crate::state::AppState;

/// Parse an optional `bloodGroup` query value.
///
/// Form encoding turns an unescaped `+` into a space, so `B ` is read as
/// `B+`.
pub(crate) fn blood_group_param(raw: Option<&str>) -> Result<Option<BloodGroup>, AppError> {
    match raw.map(str::trim_start).filter(|s| !s.trim().is_empty()) {
        None => Ok(None),
        Some(s) => s
            .replace(' ', "+")
            .parse::<BloodGroup>()
            .map(Some)
            .map_err(AppError::from),
    }
}

/// Case-insensitive substring match used by the location filters.
pub(crate) fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |n| {
        haystack.to_lowercase().contains(&n.trim().to_lowercase())
    })
}

/// The hospital a hospital-scoped operation acts on.
///
/// Hospitals always act on their own records. Administrators must name an
/// active hospital through `hospitalId`.
pub(crate) fn hospital_scope(
    state: &AppState,
    caller: &CallerIdentity,
    hospital_id: Option<&str>,
) -> Result<AccountId, AppError> {
    match caller.role {
        Role::Hospital => Ok(caller.account_id),
        Role::Admin => {
            let raw = hospital_id
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| AppError::validation("Hospital ID is required"))?;
            let id = parse_id(raw.trim(), "Hospital")?;
            Ok(state.active_hospital(id)?.id)
        }
        role => Err(AppError::Forbidden(format!(
            "User role {role} is not authorized to access this route"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blood_group_param_accepts_decoded_plus() {
        assert_eq!(blood_group_param(None).unwrap(), None);
        assert_eq!(blood_group_param(Some("")).unwrap(), None);
        assert_eq!(
            blood_group_param(Some("AB+")).unwrap(),
            Some(BloodGroup::AbPositive)
        );
        assert_eq!(
            blood_group_param(Some("O ")).unwrap(),
            Some(BloodGroup::OPositive)
        );
        assert_eq!(
            blood_group_param(Some("A-")).unwrap(),
            Some(BloodGroup::ANegative)
        );
        assert!(matches!(
            blood_group_param(Some("Z+")),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn contains_ci_matches_substrings() {
        assert!(contains_ci("Navi Mumbai", Some("mumbai")));
        assert!(contains_ci("Pune", None));
        assert!(!contains_ci("Pune", Some("Delhi")));
    }

    #[test]
    fn admin_scope_requires_hospital_id() {
        let state = AppState::new();
        let admin = CallerIdentity {
            account_id: AccountId::new(),
            role: Role::Admin,
        };
        assert!(matches!(
            hospital_scope(&state, &admin, None),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            hospital_scope(&state, &admin, Some(&AccountId::new().to_string())),
            Err(AppError::NotFound(_))
        ));
        let hospital = CallerIdentity {
            account_id: AccountId::new(),
            role: Role::Hospital,
        };
        assert_eq!(
            hospital_scope(&state, &hospital, Some("ignored")).unwrap(),
            hospital.account_id
        );
        let donor = CallerIdentity {
            account_id: AccountId::new(),
            role: Role::Donor,
        };
        assert!(matches!(
            hospital_scope(&state, &donor, None),
            Err(AppError::Forbidden(_))
        ));
    }
}
