use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

fn default_true() -> bool {
    true
}

/// Body of `POST /reminders` and `PUT /reminders/:id`.
///
/// `id` is honoured on create only. `user_id` is accepted so clients that echo
/// it back don't fail, but the authenticated caller always becomes the owner.
#[derive(Debug, Deserialize)]
pub struct ReminderPayload {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(default, with = "iso_date::option")]
    pub end_date: Option<Date>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub doses: Vec<DosePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DosePayload {
    pub time: String, // HH:MM, 24-hour
    pub dosage: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date::option")]
    pub end_date: Option<Date>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub doses: Vec<Dose>,
}

#[derive(Debug, Serialize)]
pub struct Dose {
    pub id: Uuid,
    pub time: String,
    pub dosage: String,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct DeletedReminder {
    pub message: String,
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn payload_defaults() {
        let p: ReminderPayload = serde_json::from_value(serde_json::json!({
            "name": "Vitamin D",
            "start_date": "2024-01-31"
        }))
        .unwrap();
        assert_eq!(p.start_date, date!(2024 - 01 - 31));
        assert!(p.is_active);
        assert!(!p.is_recurring);
        assert!(p.end_date.is_none());
        assert!(p.doses.is_empty());
    }

    #[test]
    fn payload_with_doses() {
        let p: ReminderPayload = serde_json::from_value(serde_json::json!({
            "name": "Metformin",
            "is_recurring": true,
            "recurrence_pattern": "daily",
            "start_date": "2024-01-01",
            "end_date": "2024-12-31",
            "doses": [
                {"time": "08:00", "dosage": "1 pill"},
                {"time": "20:00", "dosage": "1 pill", "notes": "with dinner"}
            ]
        }))
        .unwrap();
        assert_eq!(p.end_date, Some(date!(2024 - 12 - 31)));
        assert_eq!(p.doses.len(), 2);
        assert_eq!(p.doses[1].notes.as_deref(), Some("with dinner"));
    }

    #[test]
    fn bad_date_is_rejected_by_the_parser() {
        let res: Result<ReminderPayload, _> = serde_json::from_value(serde_json::json!({
            "name": "x",
            "start_date": "01/02/2024"
        }));
        assert!(res.is_err());
    }
}
