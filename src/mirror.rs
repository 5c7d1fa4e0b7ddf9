//! A local mirror of the working collections, kept as one JSON-array file per
//! collection inside a directory (the keys `events`, `teams`, `judges`,
//! `categories` and `evaluations` become `events.json` and so on).
//!
//! The store is deliberately explicit about persistence: mutations only touch
//! memory, and nothing is written until [`MirrorStore::save`] is called. When
//! several processes share a directory the last saver wins; there is no merge
//! logic. A missing or unparsable file silently falls back to the built-in
//! seed data for that collection.
//!
//! The authenticated profile is not mirrored; it is read from the `users`
//! table via [`fetch_profile`].

use std::io;
use std::path::{Path, PathBuf};

use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::schema::users;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MirrorEvent {
    pub id: String,
    pub name: String,
    pub status: String,
    pub round2_slots: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MirrorTeam {
    pub id: String,
    pub event_id: String,
    pub category_id: Option<String>,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MirrorJudge {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MirrorCategory {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub weight: f64,
    pub criteria: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MirrorEvaluation {
    pub judge_id: String,
    pub team_id: String,
    pub round_number: i64,
    pub criterion: String,
    pub value: f64,
}

pub struct MirrorStore {
    dir: PathBuf,
    pub events: Vec<MirrorEvent>,
    pub teams: Vec<MirrorTeam>,
    pub judges: Vec<MirrorJudge>,
    pub categories: Vec<MirrorCategory>,
    pub evaluations: Vec<MirrorEvaluation>,
}

fn load_key<T: DeserializeOwned>(dir: &Path, key: &str, seed: Vec<T>) -> Vec<T> {
    let path = dir.join(format!("{key}.json"));
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    key,
                    "mirror file unparsable, using seed data: {e}"
                );
                seed
            }
        },
        Err(_) => seed,
    }
}

impl MirrorStore {
    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            events: load_key(&dir, "events", seed_events()),
            teams: load_key(&dir, "teams", seed_teams()),
            judges: load_key(&dir, "judges", seed_judges()),
            categories: load_key(&dir, "categories", seed_categories()),
            evaluations: load_key(&dir, "evaluations", Vec::new()),
            dir,
        }
    }

    /// The single persistence boundary: rewrites every collection file.
    pub fn save(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let write = |key: &str, json: serde_json::Result<String>| {
            let json = json.map_err(io::Error::other)?;
            std::fs::write(self.dir.join(format!("{key}.json")), json)
        };

        write("events", serde_json::to_string(&self.events))?;
        write("teams", serde_json::to_string(&self.teams))?;
        write("judges", serde_json::to_string(&self.judges))?;
        write("categories", serde_json::to_string(&self.categories))?;
        write("evaluations", serde_json::to_string(&self.evaluations))?;

        Ok(())
    }
}

fn seed_events() -> Vec<MirrorEvent> {
    vec![MirrorEvent {
        id: "demo-event".to_string(),
        name: "Demo Event".to_string(),
        status: "draft".to_string(),
        round2_slots: 2,
    }]
}

fn seed_categories() -> Vec<MirrorCategory> {
    vec![MirrorCategory {
        id: "demo-general".to_string(),
        event_id: "demo-event".to_string(),
        name: "General".to_string(),
        weight: 1.0,
        criteria: vec![
            "Innovation".to_string(),
            "Execution".to_string(),
            "Presentation".to_string(),
        ],
    }]
}

fn seed_teams() -> Vec<MirrorTeam> {
    ["Alpha", "Beta", "Gamma"]
        .iter()
        .enumerate()
        .map(|(i, name)| MirrorTeam {
            id: format!("demo-team-{}", i + 1),
            event_id: "demo-event".to_string(),
            category_id: Some("demo-general".to_string()),
            name: format!("Team {name}"),
        })
        .collect()
}

fn seed_judges() -> Vec<MirrorJudge> {
    vec![
        MirrorJudge {
            id: "demo-judge-1".to_string(),
            event_id: "demo-event".to_string(),
            name: "Demo Judge One".to_string(),
            email: "judge1@example.com".to_string(),
        },
        MirrorJudge {
            id: "demo-judge-2".to_string(),
            event_id: "demo-event".to_string(),
            name: "Demo Judge Two".to_string(),
            email: "judge2@example.com".to_string(),
        },
    ]
}

#[derive(Queryable, Clone, Debug)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub username: String,
}

pub fn fetch_profile(
    user_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> QueryResult<Option<Profile>> {
    users::table
        .filter(users::id.eq(user_id))
        .select((users::id, users::email, users::username))
        .first::<Profile>(conn)
        .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("podium-mirror-tests")
            .join(format!("{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_files_fall_back_to_seed_data() {
        let store = MirrorStore::load(temp_dir("missing"));

        assert_eq!(store.events, seed_events());
        assert_eq!(store.teams.len(), 3);
        assert_eq!(store.judges.len(), 2);
        assert!(store.evaluations.is_empty());
    }

    #[test]
    fn corrupt_files_fall_back_to_seed_data() {
        let dir = temp_dir("corrupt");
        std::fs::write(dir.join("teams.json"), "{not json").unwrap();

        let store = MirrorStore::load(&dir);
        assert_eq!(store.teams, seed_teams());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = temp_dir("roundtrip");

        let mut store = MirrorStore::load(&dir);
        store.teams.push(MirrorTeam {
            id: "extra".to_string(),
            event_id: "demo-event".to_string(),
            category_id: None,
            name: "Team Extra".to_string(),
        });
        store.evaluations.push(MirrorEvaluation {
            judge_id: "demo-judge-1".to_string(),
            team_id: "extra".to_string(),
            round_number: 1,
            criterion: "Innovation".to_string(),
            value: 7.5,
        });
        store.save().unwrap();

        let reloaded = MirrorStore::load(&dir);
        assert_eq!(reloaded.teams, store.teams);
        assert_eq!(reloaded.evaluations, store.evaluations);
    }

    #[test]
    fn mutations_do_not_persist_until_save() {
        let dir = temp_dir("explicit-boundary");

        let mut store = MirrorStore::load(&dir);
        store.save().unwrap();
        store.events.clear();

        // No second save: on-disk state still holds the seed event.
        let reloaded = MirrorStore::load(&dir);
        assert_eq!(reloaded.events, seed_events());
    }

    #[test]
    fn last_save_wins() {
        let dir = temp_dir("last-write");

        let mut first = MirrorStore::load(&dir);
        let mut second = MirrorStore::load(&dir);

        first.events[0].name = "First Writer".to_string();
        second.events[0].name = "Second Writer".to_string();

        first.save().unwrap();
        second.save().unwrap();

        let reloaded = MirrorStore::load(&dir);
        assert_eq!(reloaded.events[0].name, "Second Writer");
    }
}
