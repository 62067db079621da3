// Postgres-backed canonical store.

use async_trait::async_trait;
use roster_common::{normalize_name, CanonicalAthlete, CanonicalTeam, TeamId};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::{AthleteChanges, CanonicalStore};

pub struct PgCanonicalStore {
    pool: PgPool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TeamRow {
    id: i64,
    name: String,
    conference: Option<String>,
    primary_color: Option<String>,
    secondary_color: Option<String>,
    logo_url: Option<String>,
    roster_url: Option<String>,
    athlete_count: i32,
}

impl From<TeamRow> for CanonicalTeam {
    fn from(r: TeamRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            conference: r.conference,
            primary_color: r.primary_color,
            secondary_color: r.secondary_color,
            logo_url: r.logo_url,
            roster_url: r.roster_url,
            athlete_count: r.athlete_count,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct AthleteRow {
    id: Uuid,
    team_id: i64,
    name: String,
    photo_url: Option<String>,
    profile_url: Option<String>,
    role_type: Option<String>,
    class_year: Option<String>,
    hometown: Option<String>,
}

impl From<AthleteRow> for CanonicalAthlete {
    fn from(r: AthleteRow) -> Self {
        Self {
            id: r.id,
            team_id: r.team_id,
            name: r.name,
            photo_url: r.photo_url,
            profile_url: r.profile_url,
            role_type: r.role_type,
            class_year: r.class_year,
            hometown: r.hometown,
        }
    }
}

const TEAM_COLUMNS: &str = "id, name, conference, primary_color, secondary_color, logo_url, roster_url, athlete_count";
const ATHLETE_COLUMNS: &str =
    "id, team_id, name, photo_url, profile_url, role_type, class_year, hometown";

impl PgCanonicalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool. A failure here means the store is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Canonical store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Constraint and data errors reject the one record; everything else is
/// passed through so `is_fatal` can judge it.
fn write_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(db) => StoreError::Write(db.message().to_string()),
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl CanonicalStore for PgCanonicalStore {
    async fn get_team(&self, id: TeamId) -> Result<CanonicalTeam> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CanonicalTeam::from)
            .ok_or(StoreError::TeamNotFound(id))
    }

    async fn list_teams(&self) -> Result<Vec<CanonicalTeam>> {
        let rows = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CanonicalTeam::from).collect())
    }

    async fn list_athletes(&self, team_id: TeamId) -> Result<Vec<CanonicalAthlete>> {
        let rows = sqlx::query_as::<_, AthleteRow>(&format!(
            "SELECT {ATHLETE_COLUMNS} FROM athletes WHERE team_id = $1 ORDER BY created_at, name"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CanonicalAthlete::from).collect())
    }

    async fn upsert_athlete(&self, athlete: &CanonicalAthlete) -> Result<CanonicalAthlete> {
        let normalized = normalize_name(&athlete.name);

        // Matched records are keyed by id.
        let updated = sqlx::query_as::<_, AthleteRow>(&format!(
            r#"
            UPDATE athletes SET
                team_id = $2, name = $3, normalized_name = $4, photo_url = $5,
                profile_url = $6, role_type = $7, class_year = $8, hometown = $9,
                updated_at = now()
            WHERE id = $1
            RETURNING {ATHLETE_COLUMNS}
            "#
        ))
        .bind(athlete.id)
        .bind(athlete.team_id)
        .bind(&athlete.name)
        .bind(&normalized)
        .bind(&athlete.photo_url)
        .bind(&athlete.profile_url)
        .bind(&athlete.role_type)
        .bind(&athlete.class_year)
        .bind(&athlete.hometown)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        if let Some(row) = updated {
            debug!(athlete_id = %athlete.id, "Updated athlete by id");
            return Ok(row.into());
        }

        // New records are keyed by (team, normalized name) so a re-run that
        // mints a fresh id lands on the same row.
        let row = sqlx::query_as::<_, AthleteRow>(&format!(
            r#"
            INSERT INTO athletes
                (id, team_id, name, normalized_name, photo_url,
                 profile_url, role_type, class_year, hometown)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (team_id, normalized_name) DO UPDATE SET
                photo_url = COALESCE(athletes.photo_url, EXCLUDED.photo_url),
                profile_url = COALESCE(EXCLUDED.profile_url, athletes.profile_url),
                role_type = COALESCE(EXCLUDED.role_type, athletes.role_type),
                class_year = COALESCE(EXCLUDED.class_year, athletes.class_year),
                hometown = COALESCE(EXCLUDED.hometown, athletes.hometown),
                updated_at = now()
            RETURNING {ATHLETE_COLUMNS}
            "#
        ))
        .bind(athlete.id)
        .bind(athlete.team_id)
        .bind(&athlete.name)
        .bind(&normalized)
        .bind(&athlete.photo_url)
        .bind(&athlete.profile_url)
        .bind(&athlete.role_type)
        .bind(&athlete.class_year)
        .bind(&athlete.hometown)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        debug!(athlete_id = %row.id, team_id = athlete.team_id, "Inserted athlete");
        Ok(row.into())
    }

    async fn update_athlete(&self, changes: &AthleteChanges) -> Result<CanonicalAthlete> {
        let (swap_photo, expected_photo, new_photo) = match &changes.photo {
            Some(swap) => (true, swap.expected.as_deref(), swap.new.as_deref()),
            None => (false, None, None),
        };

        let row = sqlx::query_as::<_, AthleteRow>(&format!(
            r#"
            UPDATE athletes SET
                photo_url = CASE
                    WHEN $2 AND photo_url IS NOT DISTINCT FROM $3::text THEN $4::text
                    ELSE photo_url
                END,
                profile_url = COALESCE($5, profile_url),
                class_year = COALESCE($6, class_year),
                hometown = COALESCE($7, hometown),
                updated_at = now()
            WHERE id = $1
            RETURNING {ATHLETE_COLUMNS}
            "#
        ))
        .bind(changes.id)
        .bind(swap_photo)
        .bind(expected_photo)
        .bind(new_photo)
        .bind(&changes.profile_url)
        .bind(&changes.class_year)
        .bind(&changes.hometown)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        let row = row.ok_or(StoreError::AthleteNotFound(changes.id))?;
        debug!(athlete_id = %changes.id, "Updated athlete columns");
        Ok(row.into())
    }

    async fn delete_athlete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM athletes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AthleteNotFound(id));
        }
        Ok(())
    }

    async fn update_team_athlete_count(&self, team_id: TeamId, count: i32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE teams SET athlete_count = $2, updated_at = now() WHERE id = $1",
        )
        .bind(team_id)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TeamNotFound(team_id));
        }
        Ok(())
    }
}
