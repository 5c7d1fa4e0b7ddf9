//! Loads the mirror collections into a database, creating an admin account
//! that owns every seeded event. Useful for standing up a demo instance.

use argon2::Argon2;
use argon2::PasswordHasher;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use chrono::Utc;
use clap::Parser;
use diesel::prelude::*;
use diesel_migrations::MigrationHarness;
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use podium::MIGRATIONS;
use podium::events::judges::ACCESS_TOKEN_LEN;
use podium::events::rounds::{STATUS_ACTIVE, STATUS_PENDING};
use podium::mirror::{MirrorStore, fetch_profile};
use podium::schema::{
    event_assignments, event_categories, event_judges, event_members,
    event_teams, events, scores, scoring_rounds, users,
};

#[derive(Parser)]
struct Seed {
    database_url: Option<String>,
    /// Directory holding the mirror's JSON collection files. Missing files
    /// fall back to the built-in seed data.
    #[clap(long, default_value = ".podium-mirror")]
    mirror_dir: String,
    /// Assign every judge to every team in round 1.
    #[clap(long, action)]
    assign_all: bool,
}

fn main() {
    let args = Seed::parse();
    let db_url = if let Some(url) = args.database_url {
        url
    } else {
        std::env::var("DATABASE_URL").expect(
            "please either set `DATABASE_URL` or pass the database url as an argument",
        )
    };

    let mut conn = SqliteConnection::establish(&db_url).unwrap();
    diesel::sql_query("PRAGMA foreign_keys = ON;")
        .execute(&mut conn)
        .unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();

    let store = MirrorStore::load(&args.mirror_dir);

    let admin_id = if users::table
        .filter(users::username.eq("admin"))
        .count()
        .get_result::<i64>(&mut conn)
        .unwrap()
        == 0
    {
        let uid = Uuid::now_v7().to_string();
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password("admin".as_bytes(), &salt)
            .unwrap()
            .to_string();

        diesel::insert_into(users::table)
            .values((
                users::id.eq(&uid),
                users::email.eq("admin@example.com"),
                users::username.eq("admin"),
                users::password_hash.eq(hash),
                users::created_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut conn)
            .unwrap();

        println!("created admin user (password: admin)");
        uid
    } else {
        users::table
            .filter(users::username.eq("admin"))
            .select(users::id)
            .first::<String>(&mut conn)
            .unwrap()
    };

    let profile = fetch_profile(&admin_id, &mut conn)
        .unwrap()
        .expect("admin user should exist at this point");
    println!("seeding as {} <{}>", profile.username, profile.email);

    for event in &store.events {
        diesel::insert_into(events::table)
            .values((
                events::id.eq(&event.id),
                events::name.eq(&event.name),
                events::slug.eq(&event.id),
                events::status.eq(&event.status),
                events::round2_slots.eq(event.round2_slots),
                events::created_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut conn)
            .unwrap();

        diesel::insert_into(event_members::table)
            .values((
                event_members::id.eq(Uuid::now_v7().to_string()),
                event_members::user_id.eq(&admin_id),
                event_members::event_id.eq(&event.id),
                event_members::is_organizer.eq(true),
            ))
            .execute(&mut conn)
            .unwrap();

        for round_number in 1..=2i64 {
            diesel::insert_into(scoring_rounds::table)
                .values((
                    scoring_rounds::id.eq(Uuid::now_v7().to_string()),
                    scoring_rounds::event_id.eq(&event.id),
                    scoring_rounds::round_number.eq(round_number),
                    scoring_rounds::status.eq(if round_number == 1 {
                        STATUS_ACTIVE
                    } else {
                        STATUS_PENDING
                    }),
                ))
                .execute(&mut conn)
                .unwrap();
        }
    }

    for category in &store.categories {
        diesel::insert_into(event_categories::table)
            .values((
                event_categories::id.eq(&category.id),
                event_categories::event_id.eq(&category.event_id),
                event_categories::name.eq(&category.name),
                event_categories::weight.eq(category.weight),
                event_categories::criteria
                    .eq(serde_json::to_string(&category.criteria).unwrap()),
            ))
            .execute(&mut conn)
            .unwrap();
    }

    for (i, team) in store.teams.iter().enumerate() {
        diesel::insert_into(event_teams::table)
            .values((
                event_teams::id.eq(&team.id),
                event_teams::event_id.eq(&team.event_id),
                event_teams::category_id.eq(team.category_id.clone()),
                event_teams::name.eq(&team.name),
                event_teams::number.eq(i as i64 + 1),
            ))
            .execute(&mut conn)
            .unwrap();
    }

    for (i, judge) in store.judges.iter().enumerate() {
        let token: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(ACCESS_TOKEN_LEN)
            .map(char::from)
            .collect();

        diesel::insert_into(event_judges::table)
            .values((
                event_judges::id.eq(&judge.id),
                event_judges::event_id.eq(&judge.event_id),
                event_judges::name.eq(&judge.name),
                event_judges::email.eq(&judge.email),
                event_judges::access_token.eq(&token),
                event_judges::number.eq(i as i64 + 1),
            ))
            .execute(&mut conn)
            .unwrap();

        println!("judge {} dashboard: /judge/{token}", judge.name);
    }

    if args.assign_all {
        for judge in &store.judges {
            for team in &store.teams {
                if team.event_id != judge.event_id {
                    continue;
                }
                diesel::insert_into(event_assignments::table)
                    .values((
                        event_assignments::id.eq(Uuid::now_v7().to_string()),
                        event_assignments::judge_id.eq(&judge.id),
                        event_assignments::category_id
                            .eq(team.category_id.clone()),
                        event_assignments::team_id.eq(&team.id),
                        event_assignments::round_number.eq(1_i64),
                    ))
                    .execute(&mut conn)
                    .unwrap();
            }
        }
    }

    for evaluation in &store.evaluations {
        let round_id = scoring_rounds::table
            .inner_join(
                event_judges::table
                    .on(event_judges::event_id.eq(scoring_rounds::event_id)),
            )
            .filter(event_judges::id.eq(&evaluation.judge_id))
            .filter(
                scoring_rounds::round_number.eq(evaluation.round_number),
            )
            .select(scoring_rounds::id)
            .first::<String>(&mut conn)
            .unwrap();

        diesel::insert_into(scores::table)
            .values((
                scores::id.eq(Uuid::now_v7().to_string()),
                scores::judge_id.eq(&evaluation.judge_id),
                scores::team_id.eq(&evaluation.team_id),
                scores::round_id.eq(&round_id),
                scores::criterion_name.eq(&evaluation.criterion),
                scores::value.eq(evaluation.value),
                scores::submitted_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut conn)
            .unwrap();
    }

    println!(
        "seeded {} events, {} teams, {} judges, {} categories, {} scores",
        store.events.len(),
        store.teams.len(),
        store.judges.len(),
        store.categories.len(),
        store.evaluations.len()
    );
}
