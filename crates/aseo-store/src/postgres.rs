//! PostgreSQL store over sqlx.
//!
//! All writes are single-row statements; there is no multi-row transaction
//! anywhere. `set_occupied` relies on a conditional `UPDATE ... WHERE
//! state = 'free'` so the registry itself arbitrates concurrent entries.
//! The change feed rides on `pg_notify` triggers installed by the embedded
//! migrations; see `migrations/`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use tokio::sync::mpsc;
use uuid::Uuid;

use aseo_core::{
    CompletedUsage, Course, ExitCondition, Facility, FacilityId, NewStudent, Occupancy, Occupant,
    OccupancyState, RecordId, UsageRecord,
};

use crate::error::{LogError, RegistryError, StoreError};
use crate::feed::{ChangeKind, FacilityChange, Subscription, UsageInsert};
use crate::{ChangeFeed, FacilityRegistry, Roster, UsageLog};

const FACILITY_CHANNEL: &str = "aseo_facilities";
const USAGE_CHANNEL: &str = "aseo_usage_records";

/// Map a sqlx error under the logical operation that issued it.
fn transport(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |source| StoreError::transport(operation, source)
}

/// PostgreSQL-backed store. Cheaply cloneable; clones share the pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and run the embedded migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(transport("store.connect"))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::transport("store.migrate", e))?;

        tracing::info!("connected to PostgreSQL, migrations applied");
        Ok(Self { pool })
    }
}

// -- Row mapping --------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct FacilityRow {
    id: Uuid,
    name: String,
    state: String,
    occupant_name: Option<String>,
    occupant_group: Option<String>,
    entry_note: Option<String>,
    last_change: DateTime<Utc>,
}

impl FacilityRow {
    fn into_domain(self) -> Result<Facility, StoreError> {
        let occupancy = match self.state.as_str() {
            "free" => Occupancy::Free,
            "occupied" => match (self.occupant_name, self.occupant_group) {
                (Some(occupant_name), Some(occupant_group)) => Occupancy::Occupied(Occupant {
                    occupant_name,
                    occupant_group,
                    entry_note: self.entry_note,
                }),
                _ => {
                    tracing::warn!(id = %self.id, "occupied facility row without occupant fields");
                    return Err(StoreError::Decode {
                        entity: "facility",
                        detail: format!("facility {} is occupied but has no occupant", self.id),
                    });
                }
            },
            other => {
                tracing::warn!(id = %self.id, state = other, "unknown facility state");
                return Err(StoreError::Decode {
                    entity: "facility",
                    detail: format!("facility {} has unknown state '{other}'", self.id),
                });
            }
        };
        Ok(Facility {
            id: self.id.into(),
            name: self.name,
            occupancy,
            last_change: self.last_change,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    id: Uuid,
    student_name: String,
    student_group: String,
    facility_id: Uuid,
    entry_time: DateTime<Utc>,
    exit_time: Option<DateTime<Utc>>,
    exit_condition: Option<String>,
    exit_note: Option<String>,
}

impl UsageRow {
    fn into_domain(self) -> Result<UsageRecord, StoreError> {
        let exit_condition = self
            .exit_condition
            .as_deref()
            .map(|raw| {
                raw.parse::<ExitCondition>().map_err(|detail| {
                    tracing::warn!(id = %self.id, "unknown exit condition in usage row");
                    StoreError::Decode {
                        entity: "usage_record",
                        detail,
                    }
                })
            })
            .transpose()?;
        Ok(UsageRecord {
            id: self.id.into(),
            student_name: self.student_name,
            student_group: self.student_group,
            facility_id: self.facility_id.into(),
            entry_time: self.entry_time,
            exit_time: self.exit_time,
            exit_condition,
            exit_note: self.exit_note,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CompletedRow {
    #[sqlx(flatten)]
    usage: UsageRow,
    facility_name: String,
}

const FACILITY_COLUMNS: &str =
    "id, name, state, occupant_name, occupant_group, entry_note, last_change";
const USAGE_COLUMNS: &str = "id, student_name, student_group, facility_id, entry_time, \
     exit_time, exit_condition, exit_note";

// -- FacilityRegistry ---------------------------------------------------------

impl FacilityRegistry for PgStore {
    async fn list(&self) -> Result<Vec<Facility>, StoreError> {
        let rows = sqlx::query_as::<_, FacilityRow>(&format!(
            "SELECT {FACILITY_COLUMNS} FROM facilities ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(transport("registry.list"))?;
        rows.into_iter().map(FacilityRow::into_domain).collect()
    }

    async fn list_by_state(&self, state: OccupancyState) -> Result<Vec<Facility>, StoreError> {
        let rows = sqlx::query_as::<_, FacilityRow>(&format!(
            "SELECT {FACILITY_COLUMNS} FROM facilities WHERE state = $1 ORDER BY name, id"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(transport("registry.list_by_state"))?;
        rows.into_iter().map(FacilityRow::into_domain).collect()
    }

    async fn get(&self, id: FacilityId) -> Result<Option<Facility>, StoreError> {
        let row = sqlx::query_as::<_, FacilityRow>(&format!(
            "SELECT {FACILITY_COLUMNS} FROM facilities WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(transport("registry.get"))?;
        row.map(FacilityRow::into_domain).transpose()
    }

    async fn set_occupied(
        &self,
        id: FacilityId,
        occupant: Occupant,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let result = sqlx::query(
            "UPDATE facilities
             SET state = 'occupied', occupant_name = $2, occupant_group = $3,
                 entry_note = $4, last_change = $5
             WHERE id = $1 AND state = 'free'",
        )
        .bind(id.as_uuid())
        .bind(&occupant.occupant_name)
        .bind(&occupant.occupant_group)
        .bind(&occupant.entry_note)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(transport("registry.set_occupied"))
        .map_err(RegistryError::from)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing matched: the row is gone, or someone else won the race.
        match self.get(id).await? {
            Some(_) => Err(RegistryError::Conflict { id }),
            None => Err(RegistryError::NotFound { id }),
        }
    }

    async fn set_free(&self, id: FacilityId, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let result = sqlx::query(
            "UPDATE facilities
             SET state = 'free', occupant_name = NULL, occupant_group = NULL,
                 entry_note = NULL, last_change = $2
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(transport("registry.set_free"))
        .map_err(RegistryError::from)?;

        if result.rows_affected() > 0 {
            Ok(())
        } else {
            Err(RegistryError::NotFound { id })
        }
    }
}

// -- UsageLog -----------------------------------------------------------------

impl UsageLog for PgStore {
    async fn open_record(
        &self,
        facility_id: FacilityId,
        student_name: &str,
        student_group: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        let id = RecordId::new();
        sqlx::query(
            "INSERT INTO usage_records (id, student_name, student_group, facility_id, entry_time)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id.as_uuid())
        .bind(student_name)
        .bind(student_group)
        .bind(facility_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(transport("log.open_record"))?;
        Ok(id)
    }

    async fn find_open_record(
        &self,
        facility_id: FacilityId,
    ) -> Result<Option<UsageRecord>, LogError> {
        let mut rows = sqlx::query_as::<_, UsageRow>(&format!(
            "SELECT {USAGE_COLUMNS} FROM usage_records
             WHERE facility_id = $1 AND exit_time IS NULL"
        ))
        .bind(facility_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(transport("log.find_open_record"))
        .map_err(LogError::from)?;

        if rows.len() > 1 {
            return Err(LogError::MultipleOpen {
                id: facility_id,
                count: rows.len(),
            });
        }
        match rows.pop() {
            Some(row) => Ok(Some(row.into_domain()?)),
            None => Ok(None),
        }
    }

    async fn close_record(
        &self,
        id: RecordId,
        condition: ExitCondition,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LogError> {
        let result = sqlx::query(
            "UPDATE usage_records
             SET exit_time = $2, exit_condition = $3, exit_note = $4
             WHERE id = $1 AND exit_time IS NULL",
        )
        .bind(id.as_uuid())
        .bind(now)
        .bind(condition.as_str())
        .bind(note)
        .execute(&self.pool)
        .await
        .map_err(transport("log.close_record"))
        .map_err(LogError::from)?;

        if result.rows_affected() > 0 {
            Ok(())
        } else {
            Err(LogError::NotFound { id })
        }
    }

    async fn open_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UsageRow>(&format!(
            "SELECT {USAGE_COLUMNS} FROM usage_records
             WHERE exit_time IS NULL ORDER BY entry_time"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(transport("log.open_records"))?;
        rows.into_iter().map(UsageRow::into_domain).collect()
    }

    async fn completed_today(&self, since: DateTime<Utc>) -> Result<Vec<CompletedUsage>, StoreError> {
        let rows = sqlx::query_as::<_, CompletedRow>(
            "SELECT r.id, r.student_name, r.student_group, r.facility_id, r.entry_time,
                    r.exit_time, r.exit_condition, r.exit_note, f.name AS facility_name
             FROM usage_records r
             JOIN facilities f ON f.id = r.facility_id
             WHERE r.entry_time > $1 AND r.exit_time IS NOT NULL
             ORDER BY r.exit_time DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(transport("log.completed_today"))?;

        rows.into_iter()
            .map(|row| {
                Ok(CompletedUsage {
                    record: row.usage.into_domain()?,
                    facility_name: row.facility_name,
                })
            })
            .collect()
    }

    async fn count_opened_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM usage_records WHERE entry_time >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await
                .map_err(transport("log.count_opened_since"))?;
        Ok(count as u64)
    }

    async fn count_records(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_records")
            .fetch_one(&self.pool)
            .await
            .map_err(transport("log.count_records"))?;
        Ok(count as u64)
    }
}

// -- Roster -------------------------------------------------------------------

impl Roster for PgStore {
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct CourseRow {
            id: Uuid,
            name: String,
        }

        let rows = sqlx::query_as::<_, CourseRow>("SELECT id, name FROM courses ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(transport("roster.list_courses"))?;
        Ok(rows
            .into_iter()
            .map(|row| Course {
                id: row.id.into(),
                name: row.name,
            })
            .collect())
    }

    async fn insert_students(&self, students: &[NewStudent]) -> Result<u64, StoreError> {
        if students.is_empty() {
            return Ok(0);
        }
        let names: Vec<&str> = students.iter().map(|s| s.name.as_str()).collect();
        let courses: Vec<&str> = students.iter().map(|s| s.course.as_str()).collect();

        let result = sqlx::query(
            "INSERT INTO students (name, course)
             SELECT name, course FROM UNNEST($1::text[], $2::text[]) AS t(name, course)",
        )
        .bind(&names)
        .bind(&courses)
        .execute(&self.pool)
        .await
        .map_err(transport("roster.insert_students"))?;
        Ok(result.rows_affected())
    }

    async fn count_students(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await
            .map_err(transport("roster.count_students"))?;
        Ok(count as u64)
    }

    async fn count_courses(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await
            .map_err(transport("roster.count_courses"))?;
        Ok(count as u64)
    }
}

// -- ChangeFeed ---------------------------------------------------------------

/// Payload emitted by the `pg_notify` triggers: the trigger op plus the full
/// new row.
#[derive(Deserialize)]
struct Notification<R> {
    kind: String,
    row: R,
}

fn parse_kind(raw: &str) -> Option<ChangeKind> {
    match raw {
        "INSERT" => Some(ChangeKind::Insert),
        "UPDATE" => Some(ChangeKind::Update),
        _ => None,
    }
}

impl PgStore {
    async fn listener_for(&self, channel: &str) -> Result<PgListener, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(transport("feed.connect"))?;
        listener
            .listen(channel)
            .await
            .map_err(transport("feed.listen"))?;
        Ok(listener)
    }
}

impl ChangeFeed for PgStore {
    async fn subscribe_facilities(&self) -> Result<Subscription<FacilityChange>, StoreError> {
        let mut listener = self.listener_for(FACILITY_CHANNEL).await?;
        let (tx, rx) = mpsc::channel(256);
        let pump = tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        let parsed: Result<Notification<Facility>, _> =
                            serde_json::from_str(notification.payload());
                        match parsed {
                            Ok(event) => {
                                let Some(kind) = parse_kind(&event.kind) else {
                                    continue;
                                };
                                let change = FacilityChange {
                                    kind,
                                    facility: event.row,
                                };
                                if tx.send(change).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "undecodable facility change payload");
                            }
                        }
                    }
                    Err(e) => {
                        // PgListener reconnects on its own; back off and retry.
                        tracing::warn!(error = %e, "facility change feed interrupted");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
        Ok(Subscription::new(rx, pump))
    }

    async fn subscribe_usage_inserts(&self) -> Result<Subscription<UsageInsert>, StoreError> {
        let mut listener = self.listener_for(USAGE_CHANNEL).await?;
        let (tx, rx) = mpsc::channel(256);
        let pump = tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        let parsed: Result<Notification<UsageRecord>, _> =
                            serde_json::from_str(notification.payload());
                        match parsed {
                            Ok(event) => {
                                if parse_kind(&event.kind) != Some(ChangeKind::Insert) {
                                    continue;
                                }
                                let insert = UsageInsert { record: event.row };
                                if tx.send(insert).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "undecodable usage insert payload");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "usage change feed interrupted");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
        Ok(Subscription::new(rx, pump))
    }
}
