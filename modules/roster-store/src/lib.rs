//! Canonical team/athlete store: the persistent, authoritative records that
//! reconciliation reads from and writes to.

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use roster_common::{CanonicalAthlete, CanonicalTeam, TeamId};
use uuid::Uuid;

pub use error::{Result, StoreError};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use postgres::PgCanonicalStore;

/// The columns a reconciliation update changes on one athlete, computed
/// against the snapshot the decision was made from. Columns left `None`
/// are not touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AthleteChanges {
    pub id: Uuid,
    pub photo: Option<PhotoSwap>,
    pub profile_url: Option<String>,
    pub class_year: Option<String>,
    pub hometown: Option<String>,
}

/// Compare-and-set on the photo column: `new` is written only while the
/// stored value still equals `expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoSwap {
    pub expected: Option<String>,
    pub new: Option<String>,
}

impl AthleteChanges {
    /// Columns that differ between `before` and `after`. Clearing a
    /// non-photo column is never expressed; reconciliation only fills them.
    pub fn between(before: &CanonicalAthlete, after: &CanonicalAthlete) -> Self {
        fn changed(before: &Option<String>, after: &Option<String>) -> Option<String> {
            if before == after {
                None
            } else {
                after.clone()
            }
        }

        Self {
            id: before.id,
            photo: (before.photo_url != after.photo_url).then(|| PhotoSwap {
                expected: before.photo_url.clone(),
                new: after.photo_url.clone(),
            }),
            profile_url: changed(&before.profile_url, &after.profile_url),
            class_year: changed(&before.class_year, &after.class_year),
            hometown: changed(&before.hometown, &after.hometown),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.photo.is_none() && self.profile_url.is_none() && self.class_year.is_none() && self.hometown.is_none()
    }
}

/// Read/write access to canonical teams and athletes.
///
/// Athlete writes are idempotent upserts: keyed by `id` when the record
/// already exists, otherwise by `(team_id, normalized name)`.
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    async fn get_team(&self, id: TeamId) -> Result<CanonicalTeam>;

    async fn list_teams(&self) -> Result<Vec<CanonicalTeam>>;

    async fn list_athletes(&self, team_id: TeamId) -> Result<Vec<CanonicalAthlete>>;

    /// Insert or update one athlete and return the stored row. When a row
    /// with the same normalized name already exists, its photo is kept and
    /// its other columns are only filled, never cleared.
    async fn upsert_athlete(&self, athlete: &CanonicalAthlete) -> Result<CanonicalAthlete>;

    /// Apply `changes` to an existing athlete and return the stored row.
    /// The photo swap is skipped when the stored photo no longer matches
    /// `expected`, so an edit made since the snapshot survives.
    async fn update_athlete(&self, changes: &AthleteChanges) -> Result<CanonicalAthlete>;

    async fn delete_athlete(&self, id: Uuid) -> Result<()>;

    async fn update_team_athlete_count(&self, team_id: TeamId, count: i32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn athlete(photo: Option<&str>) -> CanonicalAthlete {
        CanonicalAthlete {
            id: Uuid::new_v4(),
            team_id: 1,
            name: "Jane Doe".into(),
            photo_url: photo.map(String::from),
            profile_url: None,
            role_type: Some("swimmer".into()),
            class_year: Some("Jr.".into()),
            hometown: None,
        }
    }

    #[test]
    fn changes_cover_only_differing_columns() {
        let before = athlete(None);
        let mut after = before.clone();
        after.photo_url = Some("https://cdn.example.com/logo.png".into());
        after.hometown = Some("Austin, Texas".into());

        let changes = AthleteChanges::between(&before, &after);
        assert_eq!(changes.id, before.id);
        assert_eq!(
            changes.photo,
            Some(PhotoSwap {
                expected: None,
                new: Some("https://cdn.example.com/logo.png".into()),
            })
        );
        assert_eq!(changes.hometown.as_deref(), Some("Austin, Texas"));
        assert!(changes.class_year.is_none());
        assert!(changes.profile_url.is_none());
    }

    #[test]
    fn identical_records_have_no_changes() {
        let before = athlete(Some("https://storage.googleapis.com/b/jane.jpg"));
        assert!(AthleteChanges::between(&before, &before.clone()).is_empty());
    }
}
