//! Integration tests for PgCanonicalStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use roster_common::{CanonicalAthlete, TeamId};
use roster_store::{AthleteChanges, CanonicalStore, PgCanonicalStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

/// Get a migrated store with one seeded team, or skip if no test DB is available.
async fn test_store(team_id: TeamId) -> Option<PgCanonicalStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = PgCanonicalStore::new(pool);
    store.migrate().await.ok()?;

    // Clean slate for this team
    sqlx::query("DELETE FROM athletes WHERE team_id = $1")
        .bind(team_id)
        .execute(store.pool())
        .await
        .ok()?;
    sqlx::query(
        r#"
        INSERT INTO teams (id, name, logo_url, roster_url)
        VALUES ($1, 'Test State', 'https://cdn.example.com/logo.png', 'https://example.com/roster')
        ON CONFLICT (id) DO UPDATE SET athlete_count = 0
        "#,
    )
    .bind(team_id)
    .execute(store.pool())
    .await
    .ok()?;

    Some(store)
}

fn athlete(team_id: TeamId, name: &str) -> CanonicalAthlete {
    CanonicalAthlete {
        id: Uuid::new_v4(),
        team_id,
        name: name.to_string(),
        photo_url: None,
        profile_url: Some(format!("https://example.com/roster/{}", name.replace(' ', "-"))),
        role_type: Some("swimmer".into()),
        class_year: None,
        hometown: None,
    }
}

#[tokio::test]
async fn get_team_and_missing_team() {
    let Some(store) = test_store(9001).await else {
        return;
    };

    let team = store.get_team(9001).await.unwrap();
    assert_eq!(team.name, "Test State");
    assert_eq!(team.roster_url.as_deref(), Some("https://example.com/roster"));

    let err = store.get_team(-1).await.unwrap_err();
    assert!(matches!(err, StoreError::TeamNotFound(-1)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn upsert_is_keyed_by_normalized_name() {
    let Some(store) = test_store(9002).await else {
        return;
    };

    store.upsert_athlete(&athlete(9002, "AJ Terry")).await.unwrap();
    // Fresh id, same normalized name: lands on the existing row.
    let mut again = athlete(9002, "A. J. Terry");
    again.class_year = Some("So.".into());
    let stored = store.upsert_athlete(&again).await.unwrap();

    let all = store.list_athletes(9002).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(stored.name, "AJ Terry");
    assert_eq!(stored.class_year.as_deref(), Some("So."));
}

#[tokio::test]
async fn upsert_by_id_updates_in_place() {
    let Some(store) = test_store(9003).await else {
        return;
    };

    let inserted = store.upsert_athlete(&athlete(9003, "Jane Doe")).await.unwrap();
    let mut changed = inserted.clone();
    changed.photo_url = Some("https://storage.googleapis.com/b/jane.jpg".into());
    let stored = store.upsert_athlete(&changed).await.unwrap();

    assert_eq!(stored.id, inserted.id);
    assert_eq!(stored.photo_url, changed.photo_url);
}

#[tokio::test]
async fn update_leaves_photo_edited_since_snapshot() {
    let Some(store) = test_store(9006).await else {
        return;
    };

    let snapshot = store.upsert_athlete(&athlete(9006, "Jane Doe")).await.unwrap();
    let mut edited = snapshot.clone();
    edited.photo_url = Some("https://storage.googleapis.com/b/jane-verified.jpg".into());
    store.upsert_athlete(&edited).await.unwrap();

    let mut merged = snapshot.clone();
    merged.photo_url = Some("https://cdn.example.com/logo.png".into());
    merged.hometown = Some("Austin, Texas".into());
    let stored = store
        .update_athlete(&AthleteChanges::between(&snapshot, &merged))
        .await
        .unwrap();

    assert_eq!(stored.photo_url, edited.photo_url);
    assert_eq!(stored.hometown.as_deref(), Some("Austin, Texas"));

    // Unchanged since the snapshot: the swap goes through.
    let mut better = stored.clone();
    better.photo_url = Some("https://storage.googleapis.com/b/jane-2025.jpg".into());
    let stored = store
        .update_athlete(&AthleteChanges::between(&stored, &better))
        .await
        .unwrap();
    assert_eq!(stored.photo_url, better.photo_url);

    let err = store
        .update_athlete(&AthleteChanges {
            id: Uuid::new_v4(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AthleteNotFound(_)));
}

#[tokio::test]
async fn delete_and_athlete_count() {
    let Some(store) = test_store(9004).await else {
        return;
    };

    let a = store.upsert_athlete(&athlete(9004, "Sam Lee")).await.unwrap();
    store.upsert_athlete(&athlete(9004, "Kim Park")).await.unwrap();
    store.delete_athlete(a.id).await.unwrap();
    assert!(matches!(
        store.delete_athlete(a.id).await,
        Err(StoreError::AthleteNotFound(_))
    ));

    let remaining = store.list_athletes(9004).await.unwrap();
    store
        .update_team_athlete_count(9004, remaining.len() as i32)
        .await
        .unwrap();
    assert_eq!(store.get_team(9004).await.unwrap().athlete_count, 1);
}

#[tokio::test]
async fn insert_for_unknown_team_is_a_write_failure() {
    let Some(store) = test_store(9005).await else {
        return;
    };

    let err = store.upsert_athlete(&athlete(-42, "Nobody Here")).await.unwrap_err();
    assert!(matches!(err, StoreError::Write(_)));
    assert!(!err.is_fatal());
}
