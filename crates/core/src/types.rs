/// Surrogate primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Talents are keyed by the identity platform's user id.
pub type TalentId = String;
