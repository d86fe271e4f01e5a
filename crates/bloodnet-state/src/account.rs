//! # Accounts
//!
//! A single identity record shared by all users, with role-specific data held
//! in a tagged union. The wire and storage shape is flat: `role` selects the
//! variant and the variant's fields sit next to the identity fields.
//!
//! ```text
//! Account { id, name, email, phone, city, state, address, isActive, ... }
//!   + role = "donor"    { bloodGroup, lastDonationDate, isAvailable }
//!   + role = "patient"  { bloodGroup }
//!   + role = "hospital" { hospitalName, registrationNumber }
//!   + role = "admin"    { }
//! ```
//!
//! A donor or patient without a blood group is unrepresentable.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bloodnet_core::{
    validate_bounded_text, validate_email, validate_phone, validate_required_text,
    AccountId, BloodGroup, ValidationError,
};

/// Minimum whole days between two donations by the same donor.
pub const DONATION_INTERVAL_DAYS: i64 = 90;

pub const NAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 6;
const PLACE_MAX_CHARS: usize = 100;
const ADDRESS_MAX_CHARS: usize = 200;
/// bcrypt work factor for stored passwords.
pub const PASSWORD_HASH_COST: u32 = 10;

// ─── Eligibility ─────────────────────────────────────────────────────

/// Whether a donor whose last donation was at `last_donation` may donate at
/// `now`. Elapsed time is floored to whole days.
pub fn is_eligible_to_donate(last_donation: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_donation {
        None => true,
        Some(last) => (now - last).num_days() >= DONATION_INTERVAL_DAYS,
    }
}

/// Days until the donor becomes eligible again, rounded up. Zero when already
/// eligible.
pub fn days_until_eligible(last_donation: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match last_donation {
        Some(last) if !is_eligible_to_donate(last_donation, now) => {
            let remaining = Duration::days(DONATION_INTERVAL_DAYS) - (now - last);
            let day_ms = Duration::days(1).num_milliseconds();
            let ms = remaining.num_milliseconds();
            (ms + day_ms - 1) / day_ms
        }
        _ => 0,
    }
}

// ─── Role ────────────────────────────────────────────────────────────

/// The four account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Patient,
    Hospital,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donor => "donor",
            Self::Patient => "patient",
            Self::Hospital => "hospital",
            Self::Admin => "admin",
        }
    }

    pub const ALL: [Role; 4] = [Self::Donor, Self::Patient, Self::Hospital, Self::Admin];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(Self::Donor),
            "patient" => Ok(Self::Patient),
            "hospital" => Ok(Self::Hospital),
            "admin" => Ok(Self::Admin),
            other => Err(ValidationError::invalid(
                "role",
                format!("unknown role: {other:?}"),
            )),
        }
    }
}

/// Role-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RoleProfile {
    Donor {
        blood_group: BloodGroup,
        #[serde(default)]
        last_donation_date: Option<DateTime<Utc>>,
        is_available: bool,
    },
    Patient {
        blood_group: BloodGroup,
    },
    Hospital {
        hospital_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        registration_number: Option<String>,
    },
    Admin,
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            Self::Donor { .. } => Role::Donor,
            Self::Patient { .. } => Role::Patient,
            Self::Hospital { .. } => Role::Hospital,
            Self::Admin => Role::Admin,
        }
    }
}

// ─── Location ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    fn validated(self, errors: &mut Vec<ValidationError>) -> Location {
        let city = collect(errors, validate_required_text("city", &self.city, PLACE_MAX_CHARS));
        let state = collect(
            errors,
            validate_required_text("state", &self.state, PLACE_MAX_CHARS),
        );
        let address = self
            .address
            .and_then(|a| collect(errors, validate_bounded_text("address", &a, ADDRESS_MAX_CHARS)))
            .filter(|a| !a.is_empty());
        Location {
            city: city.unwrap_or_default(),
            state: state.unwrap_or_default(),
            address,
        }
    }
}

fn collect<T>(errors: &mut Vec<ValidationError>, result: Result<T, ValidationError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

// ─── Password Hash ───────────────────────────────────────────────────

/// bcrypt password hash in its modular crypt form (`$2b$10$...`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash `password` under a fresh random salt.
    pub fn new(password: &str) -> Result<Self, AccountError> {
        Self::with_cost(password, PASSWORD_HASH_COST)
    }

    pub fn with_cost(password: &str, cost: u32) -> Result<Self, AccountError> {
        bcrypt::hash(password, cost)
            .map(Self)
            .map_err(|e| AccountError::PasswordHash(e.to_string()))
    }

    /// Check a candidate password. A malformed stored hash never verifies.
    pub fn verify(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.0).unwrap_or(false)
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField { field: "password" });
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::invalid(
            "password",
            format!("must be at least {PASSWORD_MIN_CHARS} characters"),
        ));
    }
    Ok(())
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountError {
    /// One or more fields failed validation.
    #[error("validation failed: {}", summarize(.0))]
    Invalid(Vec<ValidationError>),

    /// A donor-only operation was attempted on another role.
    #[error("account {account_id} is a {role}, not a donor")]
    NotADonor { account_id: AccountId, role: Role },

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl From<ValidationError> for AccountError {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(vec![err])
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ─── Account ─────────────────────────────────────────────────────────

/// A registered user of any role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub profile: RoleProfile,
    #[serde(flatten)]
    pub location: Location,
    pub password_hash: PasswordHash,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub role: Role,
    pub blood_group: Option<BloodGroup>,
    pub location: Location,
    pub hospital_name: Option<String>,
    pub registration_number: Option<String>,
}

impl Account {
    /// Validate a registration and build the account. All field errors are
    /// reported together.
    pub fn register(reg: Registration, now: DateTime<Utc>) -> Result<Self, AccountError> {
        let mut errors = Vec::new();
        let name = collect(
            &mut errors,
            validate_required_text("name", &reg.name, NAME_MAX_CHARS),
        );
        let email = collect(&mut errors, validate_email("email", &reg.email));
        let phone = collect(&mut errors, validate_phone("phone", &reg.phone));
        collect(&mut errors, validate_password(&reg.password));
        let location = reg.location.validated(&mut errors);

        let profile = match reg.role {
            Role::Donor | Role::Patient => match reg.blood_group {
                None => {
                    errors.push(ValidationError::MissingField { field: "bloodGroup" });
                    None
                }
                Some(blood_group) if reg.role == Role::Donor => Some(RoleProfile::Donor {
                    blood_group,
                    last_donation_date: None,
                    is_available: true,
                }),
                Some(blood_group) => Some(RoleProfile::Patient { blood_group }),
            },
            Role::Hospital => {
                let hospital_name = collect(
                    &mut errors,
                    validate_required_text(
                        "hospitalName",
                        reg.hospital_name.as_deref().unwrap_or_default(),
                        PLACE_MAX_CHARS,
                    ),
                );
                let registration_number = reg
                    .registration_number
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty());
                hospital_name.map(|hospital_name| RoleProfile::Hospital {
                    hospital_name,
                    registration_number,
                })
            }
            Role::Admin => Some(RoleProfile::Admin),
        };

        match (name, email, phone, profile) {
            (Some(name), Some(email), Some(phone), Some(profile)) if errors.is_empty() => {
                let password_hash = PasswordHash::new(&reg.password)?;
                Ok(Self {
                    id: AccountId::new(),
                    name,
                    email,
                    phone,
                    profile,
                    location,
                    password_hash,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
            }
            _ => Err(AccountError::Invalid(errors)),
        }
    }

    pub fn role(&self) -> Role {
        self.profile.role()
    }

    /// Blood group for donors and patients.
    pub fn blood_group(&self) -> Option<BloodGroup> {
        match &self.profile {
            RoleProfile::Donor { blood_group, .. } | RoleProfile::Patient { blood_group } => {
                Some(*blood_group)
            }
            _ => None,
        }
    }

    /// Hospital display name, for hospital accounts.
    pub fn hospital_name(&self) -> Option<&str> {
        match &self.profile {
            RoleProfile::Hospital { hospital_name, .. } => Some(hospital_name),
            _ => None,
        }
    }

    pub fn last_donation_date(&self) -> Option<DateTime<Utc>> {
        match &self.profile {
            RoleProfile::Donor {
                last_donation_date, ..
            } => *last_donation_date,
            _ => None,
        }
    }

    /// Donor availability flag. Always false for other roles.
    pub fn is_available(&self) -> bool {
        matches!(
            self.profile,
            RoleProfile::Donor {
                is_available: true,
                ..
            }
        )
    }

    /// Donors only: the 90-day rule applied to this account.
    pub fn is_eligible_to_donate(&self, now: DateTime<Utc>) -> bool {
        match &self.profile {
            RoleProfile::Donor {
                last_donation_date, ..
            } => is_eligible_to_donate(*last_donation_date, now),
            _ => false,
        }
    }

    pub fn days_until_eligible(&self, now: DateTime<Utc>) -> i64 {
        days_until_eligible(self.last_donation_date(), now)
    }

    /// Whether this account is an active account with the given role.
    pub fn is_active_with_role(&self, role: Role) -> bool {
        self.is_active && self.role() == role
    }

    /// Record a completed donation: the donor becomes unavailable until they
    /// opt back in.
    pub fn record_donation(
        &mut self,
        donated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        match &mut self.profile {
            RoleProfile::Donor {
                last_donation_date,
                is_available,
                ..
            } => {
                *last_donation_date = Some(donated_at);
                *is_available = false;
                self.updated_at = now;
                Ok(())
            }
            other => Err(AccountError::NotADonor {
                account_id: self.id,
                role: other.role(),
            }),
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        self.password_hash.verify(password)
    }

    pub fn set_password(&mut self, password: &str, now: DateTime<Utc>) -> Result<(), AccountError> {
        validate_password(password)?;
        self.password_hash = PasswordHash::new(password)?;
        self.updated_at = now;
        Ok(())
    }

    /// Self-service profile edit.
    pub fn apply_profile_update(
        &mut self,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let mut next = self.clone();
        let mut errors = Vec::new();
        if let Some(name) = update.name {
            if let Some(name) = collect(
                &mut errors,
                validate_required_text("name", &name, NAME_MAX_CHARS),
            ) {
                next.name = name;
            }
        }
        if let Some(phone) = update.phone {
            if let Some(phone) = collect(&mut errors, validate_phone("phone", &phone)) {
                next.phone = phone;
            }
        }
        next.location = Location {
            city: update.city.unwrap_or(next.location.city),
            state: update.state.unwrap_or(next.location.state),
            address: update.address.or(next.location.address),
        }
        .validated(&mut errors);
        if let Some(flag) = update.is_available {
            collect(&mut errors, next.set_available(flag));
        }
        if let Some(name) = update.hospital_name {
            match &mut next.profile {
                RoleProfile::Hospital { hospital_name, .. } => {
                    if let Some(name) = collect(
                        &mut errors,
                        validate_required_text("hospitalName", &name, PLACE_MAX_CHARS),
                    ) {
                        *hospital_name = name;
                    }
                }
                _ => errors.push(ValidationError::invalid(
                    "hospitalName",
                    "only applies to hospital accounts",
                )),
            }
        }
        self.commit(next, errors, now)
    }

    /// Administrative edit. Email uniqueness is checked by the caller, which
    /// owns the account index.
    pub fn apply_admin_update(
        &mut self,
        update: AccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let mut next = self.clone();
        let mut errors = Vec::new();
        if let Some(email) = update.email {
            if let Some(email) = collect(&mut errors, validate_email("email", &email)) {
                next.email = email;
            }
        }
        if let Some(group) = update.blood_group {
            match &mut next.profile {
                RoleProfile::Donor { blood_group, .. } | RoleProfile::Patient { blood_group } => {
                    *blood_group = group;
                }
                _ => errors.push(ValidationError::invalid(
                    "bloodGroup",
                    format!("does not apply to {} accounts", next.role()),
                )),
            }
        }
        if let Some(active) = update.is_active {
            next.is_active = active;
        }
        let profile = ProfileUpdate {
            name: update.name,
            phone: update.phone,
            city: update.city,
            state: update.state,
            address: None,
            is_available: update.is_available,
            hospital_name: None,
        };
        if let Err(AccountError::Invalid(mut more)) = next.apply_profile_update(profile, now) {
            errors.append(&mut more);
        }
        self.commit(next, errors, now)
    }

    fn set_available(&mut self, flag: bool) -> Result<(), ValidationError> {
        match &mut self.profile {
            RoleProfile::Donor { is_available, .. } => {
                *is_available = flag;
                Ok(())
            }
            _ => Err(ValidationError::invalid(
                "isAvailable",
                "only applies to donor accounts",
            )),
        }
    }

    fn commit(
        &mut self,
        mut next: Account,
        errors: Vec<ValidationError>,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        if !errors.is_empty() {
            return Err(AccountError::Invalid(errors));
        }
        next.updated_at = now;
        *self = next;
        Ok(())
    }
}

/// Fields an account holder may change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub is_available: Option<bool>,
    pub hospital_name: Option<String>,
}

/// Fields an administrator may change on any account.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub blood_group: Option<BloodGroup>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub is_active: Option<bool>,
    pub is_available: Option<bool>,
}

/// Account as shown to clients: everything except the password digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub profile: RoleProfile,
    #[serde(flatten)]
    pub location: Location,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for PublicAccount {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            name: a.name.clone(),
            email: a.email.clone(),
            phone: a.phone.clone(),
            profile: a.profile.clone(),
            location: a.location.clone(),
            is_active: a.is_active,
            created_at: a.created_at,
            updated_at: a.updated_at,
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

    fn registration(role: Role) -> Registration {
        Registration {
            name: "Asha Rao".into(),
            email: "Asha@Example.com".into(),
            password: "secret1".into(),
            phone: "9876543210".into(),
            role,
            blood_group: Some(BloodGroup::OPositive),
            location: Location {
                city: "Pune".into(),
                state: "Maharashtra".into(),
                address: None,
            },
            hospital_name: Some("City General".into()),
            registration_number: None,
        }
    }

    #[test]
    fn eligibility_boundaries() {
        let now = now();
        assert!(is_eligible_to_donate(None, now));
        assert!(!is_eligible_to_donate(Some(now - Duration::days(89)), now));
        assert!(is_eligible_to_donate(Some(now - Duration::days(90)), now));
        assert!(!is_eligible_to_donate(
            Some(now - Duration::days(90) + Duration::seconds(1)),
            now
        ));
    }

    #[test]
    fn days_until_eligible_rounds_up() {
        let now = now();
        assert_eq!(days_until_eligible(None, now), 0);
        assert_eq!(days_until_eligible(Some(now), now), 90);
        assert_eq!(days_until_eligible(Some(now - Duration::days(89)), now), 1);
        assert_eq!(
            days_until_eligible(Some(now - Duration::days(80) - Duration::hours(12)), now),
            10
        );
        assert_eq!(days_until_eligible(Some(now - Duration::days(120)), now), 0);
    }

    #[test]
    fn register_donor_defaults() {
        let acct = Account::register(registration(Role::Donor), now()).unwrap();
        assert_eq!(acct.email, "asha@example.com");
        assert_eq!(acct.role(), Role::Donor);
        assert!(acct.is_available());
        assert!(acct.is_active);
        assert!(acct.is_eligible_to_donate(now()));
        assert!(acct.verify_password("secret1"));
        assert!(!acct.verify_password("secret2"));
    }

    #[test]
    fn register_requires_blood_group_for_patient() {
        let mut reg = registration(Role::Patient);
        reg.blood_group = None;
        match Account::register(reg, now()) {
            Err(AccountError::Invalid(errs)) => {
                assert_eq!(errs, vec![ValidationError::MissingField { field: "bloodGroup" }]);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn register_hospital_ignores_blood_group() {
        let acct = Account::register(registration(Role::Hospital), now()).unwrap();
        assert_eq!(acct.blood_group(), None);
        assert_eq!(acct.hospital_name(), Some("City General"));
    }

    #[test]
    fn register_collects_every_field_error() {
        let mut reg = registration(Role::Donor);
        reg.name = "x".repeat(51);
        reg.phone = "123".into();
        reg.password = "abc".into();
        reg.location.city = " ".into();
        let Err(AccountError::Invalid(errs)) = Account::register(reg, now()) else {
            panic!("expected validation failure");
        };
        let fields: Vec<_> = errs.iter().map(ValidationError::field).collect();
        assert_eq!(fields, vec!["name", "phone", "password", "city"]);
    }

    #[test]
    fn record_donation_marks_unavailable() {
        let mut acct = Account::register(registration(Role::Donor), now()).unwrap();
        acct.record_donation(now(), now()).unwrap();
        assert_eq!(acct.last_donation_date(), Some(now()));
        assert!(!acct.is_available());
        assert!(!acct.is_eligible_to_donate(now() + Duration::days(30)));
        assert_eq!(acct.days_until_eligible(now() + Duration::days(30)), 60);
    }

    #[test]
    fn record_donation_rejects_non_donor() {
        let mut acct = Account::register(registration(Role::Patient), now()).unwrap();
        assert!(matches!(
            acct.record_donation(now(), now()),
            Err(AccountError::NotADonor {
                role: Role::Patient,
                ..
            })
        ));
    }

    #[test]
    fn profile_update_is_all_or_nothing() {
        let mut acct = Account::register(registration(Role::Patient), now()).unwrap();
        let before = acct.clone();
        let update = ProfileUpdate {
            name: Some("New Name".into()),
            is_available: Some(false),
            ..Default::default()
        };
        assert!(acct.apply_profile_update(update, now()).is_err());
        assert_eq!(acct, before);
    }

    #[test]
    fn admin_update_changes_blood_group_and_status() {
        let mut acct = Account::register(registration(Role::Donor), now()).unwrap();
        let later = now() + Duration::hours(1);
        let update = AccountUpdate {
            blood_group: Some(BloodGroup::AbNegative),
            is_active: Some(false),
            is_available: Some(false),
            email: Some("NEW@example.com".into()),
            ..Default::default()
        };
        acct.apply_admin_update(update, later).unwrap();
        assert_eq!(acct.blood_group(), Some(BloodGroup::AbNegative));
        assert_eq!(acct.email, "new@example.com");
        assert!(!acct.is_active);
        assert!(!acct.is_available());
        assert_eq!(acct.updated_at, later);
    }

    #[test]
    fn admin_update_rejects_blood_group_on_hospital() {
        let mut acct = Account::register(registration(Role::Hospital), now()).unwrap();
        let update = AccountUpdate {
            blood_group: Some(BloodGroup::APositive),
            ..Default::default()
        };
        let Err(AccountError::Invalid(errs)) = acct.apply_admin_update(update, now()) else {
            panic!("expected validation failure");
        };
        assert_eq!(errs[0].field(), "bloodGroup");
    }

    #[test]
    fn set_password_enforces_minimum() {
        let mut acct = Account::register(registration(Role::Donor), now()).unwrap();
        assert!(acct.set_password("abc", now()).is_err());
        acct.set_password("longer-secret", now()).unwrap();
        assert!(acct.verify_password("longer-secret"));
        assert!(!acct.verify_password("secret1"));
    }

    #[test]
    fn serde_shape_is_flat() {
        let acct = Account::register(registration(Role::Donor), now()).unwrap();
        let json = serde_json::to_value(PublicAccount::from(&acct)).unwrap();
        assert_eq!(json["role"], "donor");
        assert_eq!(json["bloodGroup"], "O+");
        assert_eq!(json["isAvailable"], true);
        assert_eq!(json["city"], "Pune");
        assert!(json.get("passwordHash").is_none());

        let stored = serde_json::to_string(&acct).unwrap();
        let back: Account = serde_json::from_str(&stored).unwrap();
        assert_eq!(back, acct);
    }

    #[test]
    fn password_hash_debug_is_redacted() {
        let hash = PasswordHash::with_cost("hunter22", 4).unwrap();
        assert_eq!(format!("{hash:?}"), "PasswordHash([REDACTED])");
        assert!(hash.verify("hunter22"));
    }

    #[test]
    fn password_hash_is_bcrypt() {
        let hash = PasswordHash::with_cost("hunter22", 4).unwrap();
        let stored = serde_json::to_value(&hash).unwrap();
        let stored = stored.as_str().unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert!(!stored.contains("hunter22"));
        assert!(!hash.verify("hunter23"));

        let salted_again = PasswordHash::with_cost("hunter22", 4).unwrap();
        assert_ne!(salted_again, hash);

        let corrupt: PasswordHash = serde_json::from_str("\"not-a-hash\"").unwrap();
        assert!(!corrupt.verify("hunter22"));
    }
}
