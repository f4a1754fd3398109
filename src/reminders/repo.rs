use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{conflict_on_unique, AppResult},
    reminders::repo_types::{DoseRow, NewDose, ReminderFields, ReminderRecord, ReminderRow},
};

/// Reminder and dose storage. Every query is scoped by owner.
///
/// Mutations are all-or-nothing: a failed create, replace or delete leaves no
/// trace.
#[async_trait]
pub trait ReminderRepo: Send + Sync {
    /// Oldest first.
    async fn list_for_owner(&self, owner: Uuid) -> AppResult<Vec<ReminderRecord>>;

    async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<Option<ReminderRecord>>;

    /// Fails with `Conflict` if `id` is already taken.
    async fn create(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ReminderFields,
        doses: Vec<NewDose>,
    ) -> AppResult<ReminderRecord>;

    /// Replaces scalar fields and the whole dose set. `None` when no reminder
    /// with `id` belongs to `owner`.
    async fn replace(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ReminderFields,
        doses: Vec<NewDose>,
    ) -> AppResult<Option<ReminderRecord>>;

    /// Deletes doses, then the reminder. `false` when not owned or absent.
    async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<bool>;
}

pub const REMINDER_ID_TAKEN: &str = "Reminder id already exists";

const REMINDER_COLUMNS: &str = "id, user_id, name, notes, is_recurring, recurrence_pattern, \
                                start_date, end_date, is_active, created_at";
const DOSE_COLUMNS: &str = "id, reminder_id, dose_time, dosage, notes, created_at";

#[derive(Clone)]
pub struct PgReminderRepo {
    db: PgPool,
}

impl PgReminderRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Row-locks the reminder if `owner` owns it.
async fn lock_owned(
    tx: &mut Transaction<'_, Postgres>,
    owner: Uuid,
    id: Uuid,
) -> AppResult<bool> {
    let found = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM reminders WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(found.is_some())
}

async fn insert_doses(
    tx: &mut Transaction<'_, Postgres>,
    reminder_id: Uuid,
    doses: Vec<NewDose>,
) -> AppResult<Vec<DoseRow>> {
    let mut rows = Vec::with_capacity(doses.len());
    for (position, dose) in doses.into_iter().enumerate() {
        let row = sqlx::query_as::<_, DoseRow>(&format!(
            r#"
            INSERT INTO doses (id, reminder_id, position, dose_time, dosage, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DOSE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(reminder_id)
        .bind(position as i32)
        .bind(&dose.dose_time)
        .bind(&dose.dosage)
        .bind(&dose.notes)
        .fetch_one(&mut **tx)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

async fn delete_doses(tx: &mut Transaction<'_, Postgres>, reminder_id: Uuid) -> AppResult<u64> {
    let done = sqlx::query("DELETE FROM doses WHERE reminder_id = $1")
        .bind(reminder_id)
        .execute(&mut **tx)
        .await?;
    Ok(done.rows_affected())
}

#[async_trait]
impl ReminderRepo for PgReminderRepo {
    async fn list_for_owner(&self, owner: Uuid) -> AppResult<Vec<ReminderRecord>> {
        let reminders = sqlx::query_as::<_, ReminderRow>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        if reminders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = reminders.iter().map(|r| r.id).collect();
        let doses = sqlx::query_as::<_, DoseRow>(&format!(
            "SELECT {DOSE_COLUMNS} FROM doses WHERE reminder_id = ANY($1) \
             ORDER BY reminder_id, position"
        ))
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_reminder: HashMap<Uuid, Vec<DoseRow>> = HashMap::new();
        for dose in doses {
            by_reminder.entry(dose.reminder_id).or_default().push(dose);
        }
        Ok(reminders
            .into_iter()
            .map(|reminder| ReminderRecord {
                doses: by_reminder.remove(&reminder.id).unwrap_or_default(),
                reminder,
            })
            .collect())
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<Option<ReminderRecord>> {
        let Some(reminder) = sqlx::query_as::<_, ReminderRow>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };

        let doses = sqlx::query_as::<_, DoseRow>(&format!(
            "SELECT {DOSE_COLUMNS} FROM doses WHERE reminder_id = $1 ORDER BY position"
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        Ok(Some(ReminderRecord { reminder, doses }))
    }

    async fn create(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ReminderFields,
        doses: Vec<NewDose>,
    ) -> AppResult<ReminderRecord> {
        let mut tx = self.db.begin().await?;

        let reminder = sqlx::query_as::<_, ReminderRow>(&format!(
            r#"
            INSERT INTO reminders
                (id, user_id, name, notes, is_recurring, recurrence_pattern,
                 start_date, end_date, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {REMINDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(&fields.name)
        .bind(&fields.notes)
        .bind(fields.is_recurring)
        .bind(&fields.recurrence_pattern)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(fields.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, REMINDER_ID_TAKEN))?;

        let doses = insert_doses(&mut tx, id, doses).await?;
        tx.commit().await?;
        debug!(reminder_id = %id, doses = doses.len(), "reminder inserted");
        Ok(ReminderRecord { reminder, doses })
    }

    async fn replace(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ReminderFields,
        doses: Vec<NewDose>,
    ) -> AppResult<Option<ReminderRecord>> {
        let mut tx = self.db.begin().await?;
        if !lock_owned(&mut tx, owner, id).await? {
            return Ok(None);
        }

        let reminder = sqlx::query_as::<_, ReminderRow>(&format!(
            r#"
            UPDATE reminders
               SET name = $1, notes = $2, is_recurring = $3, recurrence_pattern = $4,
                   start_date = $5, end_date = $6, is_active = $7
             WHERE id = $8 AND user_id = $9
            RETURNING {REMINDER_COLUMNS}
            "#
        ))
        .bind(&fields.name)
        .bind(&fields.notes)
        .bind(fields.is_recurring)
        .bind(&fields.recurrence_pattern)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(fields.is_active)
        .bind(id)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

        let removed = delete_doses(&mut tx, id).await?;
        let doses = insert_doses(&mut tx, id, doses).await?;
        tx.commit().await?;
        debug!(reminder_id = %id, removed, inserted = doses.len(), "reminder replaced");
        Ok(Some(ReminderRecord { reminder, doses }))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;
        if !lock_owned(&mut tx, owner, id).await? {
            return Ok(false);
        }

        let removed = delete_doses(&mut tx, id).await?;
        sqlx::query("DELETE FROM reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(reminder_id = %id, doses = removed, "reminder deleted");
        Ok(true)
    }
}
