use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub is_premium: bool,
    pub premium_until: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// Premium granted by a guest code lapses at `premium_until` even if the
    /// flag has not been cleared yet.
    pub fn has_active_premium(&self, now: NaiveDateTime) -> bool {
        self.is_premium && self.premium_until.is_none_or(|until| until > now)
    }

    pub fn display_name(&self) -> String {
        display_name(self.full_name.as_deref(), &self.email)
    }
}

pub fn display_name(full_name: Option<&str>, email: &str) -> String {
    match full_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => email.split('@').next().unwrap_or(email).to_string(),
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub is_premium: bool,
    pub premium_until: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::guest_access_codes)]
pub struct GuestAccessCode {
    pub id: Uuid,
    #[schema(example = "FOREST24")]
    pub code: String,
    #[schema(example = "Spring school fair")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "/lessons")]
    pub destination_path: String,
    #[schema(example = "premium")]
    pub access_tier: String,
    #[schema(example = 48)]
    pub duration_hours: i32,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub expires_at: Option<NaiveDateTime>,
    pub is_active: bool,
    pub welcome_title: Option<String>,
    pub welcome_message: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::guest_access_codes)]
pub struct NewGuestAccessCode {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub destination_path: String,
    pub access_tier: String,
    pub duration_hours: i32,
    pub max_uses: Option<i32>,
    pub expires_at: Option<NaiveDateTime>,
    pub welcome_title: Option<String>,
    pub welcome_message: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::guest_access_codes)]
pub struct GuestAccessCodeChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub destination_path: Option<String>,
    pub max_uses: Option<Option<i32>>,
    pub expires_at: Option<Option<NaiveDateTime>>,
    pub is_active: Option<bool>,
    pub welcome_title: Option<Option<String>>,
    pub welcome_message: Option<Option<String>>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::guest_sessions)]
pub struct GuestSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_id: Uuid,
    #[schema(example = "active")]
    pub status: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub activated_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub converted_at: Option<NaiveDateTime>,
    pub cleaned_up_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::guest_sessions)]
pub struct NewGuestSession {
    pub user_id: Uuid,
    pub code_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::unpredictable_challenges)]
pub struct UnpredictableChallenge {
    pub id: Uuid,
    #[schema(example = "Spot three birds")]
    pub title: String,
    pub description: String,
    #[schema(example = "observation")]
    pub challenge_type: String,
    pub target_count: i32,
    pub duration_hours: i32,
    pub weight: i32,
    pub points_reward: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::ngo_challenges)]
pub struct NgoChallenge {
    pub id: Uuid,
    #[schema(example = "Ocean Guardians")]
    pub ngo_name: String,
    pub title: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub target_count: i32,
    pub duration_days: i32,
    pub points_reward: i32,
    pub is_active: bool,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl NgoChallenge {
    pub fn is_open(&self, now: NaiveDateTime) -> bool {
        self.is_active
            && self.starts_at.is_none_or(|start| start <= now)
            && self.ends_at.is_none_or(|end| end > now)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::ngo_challenges)]
pub struct NewNgoChallenge {
    pub ngo_name: String,
    pub title: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub target_count: i32,
    pub duration_days: i32,
    pub points_reward: i32,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::user_active_challenges)]
pub struct UserActiveChallenge {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "unpredictable")]
    pub challenge_kind: String,
    pub ngo_challenge_id: Option<Uuid>,
    pub unpredictable_challenge_id: Option<Uuid>,
    pub progress: i32,
    pub target: i32,
    #[schema(example = "active")]
    pub status: String,
    pub started_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub assignment_notified: bool,
    pub expiry_notified: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_active_challenges)]
pub struct NewUserActiveChallenge {
    pub user_id: Uuid,
    pub challenge_kind: String,
    pub ngo_challenge_id: Option<Uuid>,
    pub unpredictable_challenge_id: Option<Uuid>,
    pub target: i32,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::species_avatars)]
pub struct SpeciesAvatar {
    pub id: Uuid,
    #[schema(example = "Hawksbill turtle")]
    pub name: String,
    #[schema(example = "Eretmochelys imbricata")]
    pub scientific_name: Option<String>,
    pub image_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::user_species_journeys)]
pub struct UserSpeciesJourney {
    pub id: Uuid,
    pub user_id: Uuid,
    pub species_avatar_id: Option<Uuid>,
    pub total_points: i32,
    #[schema(example = "vulnerable")]
    pub current_status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_species_journeys)]
pub struct NewUserSpeciesJourney {
    pub user_id: Uuid,
    pub species_avatar_id: Option<Uuid>,
    pub total_points: i32,
    pub current_status: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::points_history)]
pub struct PointsHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub points: i32,
    pub reason: String,
    pub source: String,
    pub reference_id: Option<Uuid>,
    pub balance_after: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::points_history)]
pub struct NewPointsHistoryEntry {
    pub user_id: Uuid,
    pub points: i32,
    pub reason: String,
    pub source: String,
    pub reference_id: Option<Uuid>,
    pub balance_after: i32,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::observations)]
pub struct Observation {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "Eurasian otter")]
    pub species_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub notes: Option<String>,
    pub observed_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::observations)]
pub struct NewObservation {
    pub user_id: Uuid,
    pub species_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub notes: Option<String>,
    pub observed_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user(is_premium: bool, premium_until: Option<NaiveDateTime>) -> User {
        let now = Utc::now().naive_utc();
        User {
            id: Uuid::new_v4(),
            email: "guest_0a1b2c3d4e5f6071@habitat.guest".to_string(),
            password_hash: String::new(),
            full_name: None,
            role: "guest".to_string(),
            is_premium,
            premium_until,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_premium_expires_with_premium_until() {
        let now = Utc::now().naive_utc();
        assert!(user(true, Some(now + Duration::hours(1))).has_active_premium(now));
        assert!(!user(true, Some(now - Duration::hours(1))).has_active_premium(now));
        assert!(user(true, None).has_active_premium(now));
        assert!(!user(false, None).has_active_premium(now));
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        assert_eq!(display_name(Some("Ada"), "ada@example.com"), "Ada");
        assert_eq!(display_name(Some("   "), "ada@example.com"), "ada");
        assert_eq!(display_name(None, "ada@example.com"), "ada");
    }

    #[test]
    fn test_ngo_challenge_window() {
        let now = Utc::now().naive_utc();
        let mut challenge = NgoChallenge {
            id: Uuid::new_v4(),
            ngo_name: "Ocean Guardians".to_string(),
            title: "Beach clean".to_string(),
            description: "Pick up litter".to_string(),
            logo_url: None,
            target_count: 3,
            duration_days: 7,
            points_reward: 40,
            is_active: true,
            starts_at: Some(now - Duration::days(1)),
            ends_at: Some(now + Duration::days(1)),
            created_at: now,
        };
        assert!(challenge.is_open(now));

        challenge.ends_at = Some(now - Duration::minutes(1));
        assert!(!challenge.is_open(now));

        challenge.ends_at = None;
        challenge.is_active = false;
        assert!(!challenge.is_open(now));
    }
}
