use time::{macros::format_description, Time};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    crypto::FieldCipher,
    error::{AppError, AppResult},
    reminders::{
        dto::{DeletedReminder, Dose, DosePayload, Reminder, ReminderPayload},
        repo::ReminderRepo,
        repo_types::{DoseRow, NewDose, ReminderFields, ReminderRecord},
    },
};

/// Accepts exactly `HH:MM` with hour in 0..=23 and minute in 0..=59.
pub fn validate_dose_time(raw: &str) -> AppResult<()> {
    Time::parse(raw, format_description!("[hour]:[minute]"))
        .map(|_| ())
        .map_err(|_| {
            AppError::Validation(format!(
                "Invalid time format for dose '{raw}', expected HH:MM"
            ))
        })
}

/// Reminder CRUD for a single authenticated owner at a time.
pub struct ReminderService<'a> {
    pub repo: &'a dyn ReminderRepo,
    pub cipher: &'a FieldCipher,
}

impl<'a> ReminderService<'a> {
    pub async fn list(&self, owner: Uuid) -> AppResult<Vec<Reminder>> {
        self.repo
            .list_for_owner(owner)
            .await?
            .into_iter()
            .map(|record| self.present(record))
            .collect()
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<Reminder> {
        let record = self
            .repo
            .get(owner, id)
            .await?
            .ok_or(AppError::NotFound("Reminder"))?;
        self.present(record)
    }

    pub async fn create(&self, owner: Uuid, payload: ReminderPayload) -> AppResult<Reminder> {
        if payload.user_id.is_some_and(|claimed| claimed != owner) {
            debug!(%owner, "ignoring user_id supplied in body");
        }
        let id = payload.id.unwrap_or_else(Uuid::new_v4);
        let (fields, doses) = self.prepare(payload)?;

        let record = self.repo.create(owner, id, fields, doses).await?;
        info!(user_id = %owner, reminder_id = %id, "reminder created");
        self.present(record)
    }

    /// Full replace of scalar fields and doses. Nothing is written unless the
    /// whole payload is valid.
    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        payload: ReminderPayload,
    ) -> AppResult<Reminder> {
        let (fields, doses) = self.prepare(payload)?;

        let record = self
            .repo
            .replace(owner, id, fields, doses)
            .await?
            .ok_or(AppError::NotFound("Reminder"))?;
        info!(user_id = %owner, reminder_id = %id, "reminder updated");
        self.present(record)
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<DeletedReminder> {
        if !self.repo.delete(owner, id).await? {
            return Err(AppError::NotFound("Reminder"));
        }
        info!(user_id = %owner, reminder_id = %id, "reminder deleted");
        Ok(DeletedReminder {
            message: format!("Successfully deleted reminder {id}"),
            id,
        })
    }

    /// Validates everything first, then encrypts into storage form.
    fn prepare(&self, payload: ReminderPayload) -> AppResult<(ReminderFields, Vec<NewDose>)> {
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Reminder name is required".into()));
        }
        if let Some(end) = payload.end_date {
            if end < payload.start_date {
                return Err(AppError::Validation(
                    "end_date must not be before start_date".into(),
                ));
            }
        }
        for dose in &payload.doses {
            validate_dose_time(&dose.time)?;
        }

        let fields = ReminderFields {
            name,
            notes: self.cipher.encrypt_opt(payload.notes.as_deref())?,
            is_recurring: payload.is_recurring,
            recurrence_pattern: payload.recurrence_pattern,
            start_date: payload.start_date,
            end_date: payload.end_date,
            is_active: payload.is_active,
        };
        let doses = payload
            .doses
            .into_iter()
            .map(|DosePayload { time, dosage, notes }| -> AppResult<NewDose> {
                Ok(NewDose {
                    dose_time: time,
                    dosage,
                    notes: self.cipher.encrypt_opt(notes.as_deref())?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok((fields, doses))
    }

    fn present(&self, record: ReminderRecord) -> AppResult<Reminder> {
        let ReminderRecord { reminder: r, doses } = record;
        Ok(Reminder {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            notes: self.cipher.decrypt_opt(r.notes.as_deref())?,
            is_recurring: r.is_recurring,
            recurrence_pattern: r.recurrence_pattern,
            start_date: r.start_date,
            end_date: r.end_date,
            is_active: r.is_active,
            created_at: r.created_at,
            doses: doses
                .into_iter()
                .map(|d| self.present_dose(d))
                .collect::<AppResult<Vec<_>>>()?,
        })
    }

    fn present_dose(&self, d: DoseRow) -> AppResult<Dose> {
        Ok(Dose {
            id: d.id,
            time: d.dose_time,
            dosage: d.dosage,
            notes: self.cipher.decrypt_opt(d.notes.as_deref())?,
            created_at: d.created_at,
        })
    }
}
