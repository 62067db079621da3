//! In-memory canonical store for tests. Mirrors the Postgres upsert keys and
//! lets tests inject per-record write failures or a dead connection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use roster_common::{normalize_name, CanonicalAthlete, CanonicalTeam, TeamId};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::{AthleteChanges, CanonicalStore};

#[derive(Default)]
pub struct MemoryStore {
    teams: Mutex<HashMap<TeamId, CanonicalTeam>>,
    /// Insertion order is kept so listings are stable.
    athletes: Mutex<Vec<CanonicalAthlete>>,
    fail_writes_for: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_team(self, team: CanonicalTeam) -> Self {
        self.teams.lock().unwrap().insert(team.id, team);
        self
    }

    pub fn with_athlete(self, athlete: CanonicalAthlete) -> Self {
        self.athletes.lock().unwrap().push(athlete);
        self
    }

    /// Reject writes for athletes whose normalized name equals `name`'s.
    pub fn fail_writes_for(&self, name: &str) {
        self.fail_writes_for
            .lock()
            .unwrap()
            .insert(normalize_name(name));
    }

    /// Every call fails with a fatal connection error from now on.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Overwrite one athlete's photo directly, as an operator edit would.
    pub fn set_photo(&self, team_id: TeamId, name: &str, photo: Option<&str>) {
        let normalized = normalize_name(name);
        let mut athletes = self.athletes.lock().unwrap();
        if let Some(a) = athletes
            .iter_mut()
            .find(|a| a.team_id == team_id && normalize_name(&a.name) == normalized)
        {
            a.photo_url = photo.map(String::from);
        }
    }

    /// Writes that reached the store (including rejected ones).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn team(&self, id: TeamId) -> Option<CanonicalTeam> {
        self.teams.lock().unwrap().get(&id).cloned()
    }

    pub fn athletes_snapshot(&self, team_id: TeamId) -> Vec<CanonicalAthlete> {
        self.athletes
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.team_id == team_id)
            .cloned()
            .collect()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store marked unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CanonicalStore for MemoryStore {
    async fn get_team(&self, id: TeamId) -> Result<CanonicalTeam> {
        self.check_reachable()?;
        self.team(id).ok_or(StoreError::TeamNotFound(id))
    }

    async fn list_teams(&self) -> Result<Vec<CanonicalTeam>> {
        self.check_reachable()?;
        let mut teams: Vec<_> = self.teams.lock().unwrap().values().cloned().collect();
        teams.sort_by_key(|t| t.id);
        Ok(teams)
    }

    async fn list_athletes(&self, team_id: TeamId) -> Result<Vec<CanonicalAthlete>> {
        self.check_reachable()?;
        Ok(self.athletes_snapshot(team_id))
    }

    async fn upsert_athlete(&self, athlete: &CanonicalAthlete) -> Result<CanonicalAthlete> {
        self.check_reachable()?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let normalized = normalize_name(&athlete.name);
        if self.fail_writes_for.lock().unwrap().contains(&normalized) {
            return Err(StoreError::Write(format!("injected failure for {}", athlete.name)));
        }
        if !self.teams.lock().unwrap().contains_key(&athlete.team_id) {
            return Err(StoreError::Write(format!(
                "team {} does not exist",
                athlete.team_id
            )));
        }

        let mut athletes = self.athletes.lock().unwrap();
        if let Some(existing) = athletes.iter_mut().find(|a| a.id == athlete.id) {
            *existing = athlete.clone();
            return Ok(existing.clone());
        }
        if let Some(existing) = athletes
            .iter_mut()
            .find(|a| a.team_id == athlete.team_id && normalize_name(&a.name) == normalized)
        {
            let merged = CanonicalAthlete {
                photo_url: existing.photo_url.clone().or_else(|| athlete.photo_url.clone()),
                profile_url: athlete.profile_url.clone().or_else(|| existing.profile_url.clone()),
                role_type: athlete.role_type.clone().or_else(|| existing.role_type.clone()),
                class_year: athlete.class_year.clone().or_else(|| existing.class_year.clone()),
                hometown: athlete.hometown.clone().or_else(|| existing.hometown.clone()),
                ..existing.clone()
            };
            *existing = merged;
            return Ok(existing.clone());
        }
        athletes.push(athlete.clone());
        Ok(athlete.clone())
    }

    async fn update_athlete(&self, changes: &AthleteChanges) -> Result<CanonicalAthlete> {
        self.check_reachable()?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let failing = self.fail_writes_for.lock().unwrap().clone();
        let mut athletes = self.athletes.lock().unwrap();
        let existing = athletes
            .iter_mut()
            .find(|a| a.id == changes.id)
            .ok_or(StoreError::AthleteNotFound(changes.id))?;
        if failing.contains(&normalize_name(&existing.name)) {
            return Err(StoreError::Write(format!("injected failure for {}", existing.name)));
        }

        if let Some(swap) = changes.photo.as_ref().filter(|s| s.expected == existing.photo_url) {
            existing.photo_url = swap.new.clone();
        }
        for (field, value) in [
            (&mut existing.profile_url, &changes.profile_url),
            (&mut existing.class_year, &changes.class_year),
            (&mut existing.hometown, &changes.hometown),
        ] {
            if value.is_some() {
                *field = value.clone();
            }
        }
        Ok(existing.clone())
    }

    async fn delete_athlete(&self, id: Uuid) -> Result<()> {
        self.check_reachable()?;
        let mut athletes = self.athletes.lock().unwrap();
        let before = athletes.len();
        athletes.retain(|a| a.id != id);
        if athletes.len() == before {
            return Err(StoreError::AthleteNotFound(id));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_team_athlete_count(&self, team_id: TeamId, count: i32) -> Result<()> {
        self.check_reachable()?;
        let mut teams = self.teams.lock().unwrap();
        let team = teams
            .get_mut(&team_id)
            .ok_or(StoreError::TeamNotFound(team_id))?;
        team.athlete_count = count;
        Ok(())
    }
}
