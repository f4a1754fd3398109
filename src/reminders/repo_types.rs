use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Reminder row as stored. `notes` holds ciphertext.
#[derive(Debug, Clone, FromRow)]
pub struct ReminderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// Dose row as stored. `notes` holds ciphertext.
#[derive(Debug, Clone, FromRow)]
pub struct DoseRow {
    pub id: Uuid,
    pub reminder_id: Uuid,
    pub dose_time: String, // HH:MM
    pub dosage: String,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A reminder with its doses in position order.
#[derive(Debug, Clone)]
pub struct ReminderRecord {
    pub reminder: ReminderRow,
    pub doses: Vec<DoseRow>,
}

/// Replaceable scalar fields of a reminder, already validated and encrypted.
#[derive(Debug, Clone)]
pub struct ReminderFields {
    pub name: String,
    pub notes: Option<String>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub is_active: bool,
}

/// A dose to insert, already validated and encrypted.
#[derive(Debug, Clone)]
pub struct NewDose {
    pub dose_time: String,
    pub dosage: String,
    pub notes: Option<String>,
}
