//! Member model - the subject of every authorization decision.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Member entity. Only the fields the prerequisite gates read are kept
/// here; full member profiles live in the portal application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub member_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub membership_expires_on: Option<NaiveDate>,
    pub background_check_expires_on: Option<NaiveDate>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub active_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl Member {
    /// Create a new member.
    pub fn new(display_name: String, email: String) -> Self {
        Self {
            member_id: Uuid::new_v4(),
            display_name,
            email,
            membership_expires_on: None,
            background_check_expires_on: None,
            birth_year: None,
            birth_month: None,
            active_flag: true,
            created_utc: Utc::now(),
        }
    }

    /// Membership is active when the expiration date is today or later.
    pub fn has_active_membership(&self, today: NaiveDate) -> bool {
        self.membership_expires_on.is_some_and(|d| d >= today)
    }

    /// Background check is valid when the expiration date is today or later.
    pub fn has_valid_background_check(&self, today: NaiveDate) -> bool {
        self.background_check_expires_on.is_some_and(|d| d >= today)
    }

    /// Age in whole years as of `today`, from birth year and month only.
    /// None when either field is missing.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let year = self.birth_year?;
        let month = self.birth_month?;
        let mut age = today.year() - year;
        if (today.month() as i32) < month {
            age -= 1;
        }
        Some(age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> Member {
        Member::new("Aline of the Mists".to_string(), "aline@example.com".to_string())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_membership_active_through_expiration_day() {
        let mut m = member();
        m.membership_expires_on = Some(date(2026, 6, 30));
        assert!(m.has_active_membership(date(2026, 6, 30)));
        assert!(m.has_active_membership(date(2026, 1, 1)));
        assert!(!m.has_active_membership(date(2026, 7, 1)));
    }

    #[test]
    fn test_membership_missing_is_inactive() {
        assert!(!member().has_active_membership(date(2026, 1, 1)));
    }

    #[test]
    fn test_age_counts_birth_month() {
        let mut m = member();
        m.birth_year = Some(2000);
        m.birth_month = Some(6);
        // Before the birth month the birthday has not happened yet.
        assert_eq!(m.age_on(date(2026, 5, 31)), Some(25));
        assert_eq!(m.age_on(date(2026, 6, 1)), Some(26));
        assert_eq!(m.age_on(date(2026, 12, 1)), Some(26));
    }

    #[test]
    fn test_age_unknown_without_birth_data() {
        let mut m = member();
        assert_eq!(m.age_on(date(2026, 1, 1)), None);
        m.birth_year = Some(2000);
        assert_eq!(m.age_on(date(2026, 1, 1)), None);
    }
}
