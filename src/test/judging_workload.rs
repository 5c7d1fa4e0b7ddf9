//! End-to-end workload driving the whole judging flow through the router:
//! event setup, tokenized score submission, normalization, promotion to the
//! final round and result aggregation. Runs against an in-memory database.

use axum::http::StatusCode;
use axum_test::{TestServer, TestServerConfig};
use diesel::prelude::*;

use crate::{
    config::create_app,
    schema::{
        event_assignments, event_judges, event_teams, events, final_results,
        normalized_scores, scores, scoring_rounds,
    },
    state::{DbPool, build_pool},
};

const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "password";

fn make_server() -> (TestServer, DbPool) {
    let pool = build_pool(":memory:");
    let app = create_app(pool.clone());

    let server = TestServer::new_with_config(
        app,
        TestServerConfig {
            save_cookies: true,
            ..TestServerConfig::default()
        },
    )
    .unwrap();

    (server, pool)
}

async fn register_and_login(
    server: &TestServer,
    username: &str,
    password: &str,
) {
    let res = server
        .post("/register")
        .form(&[
            ("username", username),
            ("email", &format!("{username}@test.com")),
            ("password", password),
            ("password2", password),
        ])
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    let res = server
        .post("/login")
        .form(&[("id", username), ("password", password)])
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
}

/// Creates an event and returns its id, parsed out of the redirect target.
async fn create_event(server: &TestServer, name: &str, slug: &str) -> String {
    let res = server
        .post("/events/create")
        .form(&[
            ("name", name),
            ("slug", slug),
            ("starts_on", ""),
            ("ends_on", ""),
            ("round2_slots", "2"),
        ])
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    let location = res.header("location").to_str().unwrap().to_string();
    location
        .strip_prefix("/events/")
        .expect("redirect should land on the event page")
        .to_string()
}

async fn create_category(
    server: &TestServer,
    event_id: &str,
    name: &str,
    criteria: &str,
) {
    let res = server
        .post(&format!("/events/{event_id}/categories"))
        .form(&[("name", name), ("weight", "1.0"), ("criteria", criteria)])
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
}

async fn create_team(server: &TestServer, event_id: &str, name: &str) {
    let res = server
        .post(&format!("/events/{event_id}/teams"))
        .form(&[("name", name), ("category_id", "-----")])
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
}

async fn create_judge(server: &TestServer, event_id: &str, name: &str) {
    let res = server
        .post(&format!("/events/{event_id}/judges"))
        .form(&[
            ("name", name),
            ("email", &format!("{}@test.com", name.to_lowercase().replace(' ', "."))),
        ])
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
}

async fn create_assignment(
    server: &TestServer,
    event_id: &str,
    judge_id: &str,
    team_id: &str,
    round_number: i64,
) {
    let res = server
        .post(&format!("/events/{event_id}/assignments"))
        .form(&[
            ("judge_id", judge_id),
            ("team_id", team_id),
            ("round_number", &round_number.to_string()),
        ])
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
}

async fn submit_score(
    server: &TestServer,
    token: &str,
    team_id: &str,
    criterion: &str,
    value: &str,
) -> StatusCode {
    server
        .post(&format!("/judge/{token}/scores"))
        .form(&[("team_id", team_id), ("criterion", criterion), ("value", value)])
        .await
        .status_code()
}

fn team_id_by_name(pool: &DbPool, event_id: &str, name: &str) -> String {
    let mut conn = pool.get().unwrap();
    event_teams::table
        .filter(event_teams::event_id.eq(event_id))
        .filter(event_teams::name.eq(name))
        .select(event_teams::id)
        .first::<String>(&mut conn)
        .unwrap()
}

fn judges_of_event(pool: &DbPool, event_id: &str) -> Vec<(String, String)> {
    let mut conn = pool.get().unwrap();
    event_judges::table
        .filter(event_judges::event_id.eq(event_id))
        .order_by(event_judges::number.asc())
        .select((event_judges::id, event_judges::access_token))
        .load::<(String, String)>(&mut conn)
        .unwrap()
}

/// Every judge scores every team on both criteria; `totals` holds the
/// desired per-team total, split evenly across the two criteria.
async fn score_teams(
    server: &TestServer,
    token: &str,
    teams: &[(String, f64)],
) {
    for (team_id, total) in teams {
        let half = total / 2.0;
        for criterion in ["Innovation", "Execution"] {
            let status = submit_score(
                server,
                token,
                team_id,
                criterion,
                &half.to_string(),
            )
            .await;
            assert_eq!(status, StatusCode::SEE_OTHER);
        }
    }
}

#[tokio::test]
async fn full_judging_workload() {
    let (server, pool) = make_server();
    register_and_login(&server, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let event_id = create_event(&server, "Demo Hackathon", "demo").await;
    create_category(&server, &event_id, "General", "Innovation\nExecution")
        .await;

    // Teams land in the sole category; the creation form deliberately sends
    // no category to also cover the uncategorized path elsewhere, so attach
    // them directly here.
    for name in ["Team One", "Team Two", "Team Three", "Team Four"] {
        create_team(&server, &event_id, name).await;
    }
    {
        let mut conn = pool.get().unwrap();
        let category_id = crate::schema::event_categories::table
            .filter(crate::schema::event_categories::event_id.eq(&event_id))
            .select(crate::schema::event_categories::id)
            .first::<String>(&mut conn)
            .unwrap();
        diesel::update(
            event_teams::table
                .filter(event_teams::event_id.eq(&event_id)),
        )
        .set(event_teams::category_id.eq(&category_id))
        .execute(&mut conn)
        .unwrap();
    }

    create_judge(&server, &event_id, "Judge A").await;
    create_judge(&server, &event_id, "Judge B").await;

    let judges = judges_of_event(&pool, &event_id);
    assert_eq!(judges.len(), 2);

    let team_ids: Vec<String> =
        ["Team One", "Team Two", "Team Three", "Team Four"]
            .iter()
            .map(|name| team_id_by_name(&pool, &event_id, name))
            .collect();

    for (judge_id, _) in &judges {
        for team_id in &team_ids {
            create_assignment(&server, &event_id, judge_id, team_id, 1).await;
        }
    }

    // Scores cannot be submitted before a round opens.
    let status = submit_score(
        &server,
        &judges[0].1,
        &team_ids[0],
        "Innovation",
        "5",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let res = server
        .post(&format!("/events/{event_id}/rounds/1/activate"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    // The dashboard lists the assigned teams.
    let dashboard = server.get(&format!("/judge/{}", judges[0].1)).await;
    assert_eq!(dashboard.status_code(), StatusCode::OK);
    assert!(dashboard.text().contains("Team One"));
    assert!(dashboard.text().contains("Innovation"));

    // Distinct per-judge totals with a common ordering: One > Two > Three >
    // Four for both judges.
    score_teams(
        &server,
        &judges[0].1,
        &[
            (team_ids[0].clone(), 18.0),
            (team_ids[1].clone(), 14.0),
            (team_ids[2].clone(), 10.0),
            (team_ids[3].clone(), 6.0),
        ],
    )
    .await;
    score_teams(
        &server,
        &judges[1].1,
        &[
            (team_ids[0].clone(), 16.0),
            (team_ids[1].clone(), 12.0),
            (team_ids[2].clone(), 8.0),
            (team_ids[3].clone(), 4.0),
        ],
    )
    .await;

    // Resubmission overwrites rather than duplicates.
    let status = submit_score(
        &server,
        &judges[0].1,
        &team_ids[0],
        "Innovation",
        "9",
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    {
        let mut conn = pool.get().unwrap();
        let n = scores::table
            .filter(scores::judge_id.eq(&judges[0].0))
            .filter(scores::team_id.eq(&team_ids[0]))
            .filter(scores::criterion_name.eq("Innovation"))
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap();
        assert_eq!(n, 1);
    }

    let res = server
        .post(&format!("/events/{event_id}/rounds/1/complete"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    let res = server
        .post(&format!("/events/{event_id}/rounds/1/normalize"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    {
        let mut conn = pool.get().unwrap();
        let round1_id = scoring_rounds::table
            .filter(scoring_rounds::event_id.eq(&event_id))
            .filter(scoring_rounds::round_number.eq(1))
            .select(scoring_rounds::id)
            .first::<String>(&mut conn)
            .unwrap();

        // Two judges, four teams each.
        let rows = normalized_scores::table
            .filter(normalized_scores::round_id.eq(&round1_id))
            .select((
                normalized_scores::team_id,
                normalized_scores::rank,
                normalized_scores::selected_for_round2,
            ))
            .load::<(String, i64, bool)>(&mut conn)
            .unwrap();
        assert_eq!(rows.len(), 8);

        // Each judge ranks Team One first and selects exactly the top two.
        for (team_id, rank, selected) in &rows {
            if team_id == &team_ids[0] {
                assert_eq!(*rank, 1);
            }
            assert_eq!(*selected, *rank <= 2);
        }
    }

    let res = server
        .post(&format!("/events/{event_id}/assignments/promote"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    {
        let mut conn = pool.get().unwrap();
        let round2_teams = event_assignments::table
            .filter(event_assignments::round_number.eq(2))
            .select(event_assignments::team_id)
            .distinct()
            .load::<String>(&mut conn)
            .unwrap();
        assert_eq!(round2_teams.len(), 2);
        assert!(round2_teams.contains(&team_ids[0]));
        assert!(round2_teams.contains(&team_ids[1]));
    }

    // Promotion is idempotent.
    let res = server
        .post(&format!("/events/{event_id}/assignments/promote"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
    {
        let mut conn = pool.get().unwrap();
        let n = event_assignments::table
            .filter(event_assignments::round_number.eq(2))
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap();
        assert_eq!(n, 4);
    }

    let res = server
        .post(&format!("/events/{event_id}/rounds/2/activate"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    // A finalist's score in round 2; the eliminated teams are no longer
    // scorable by this judge.
    let status = submit_score(
        &server,
        &judges[0].1,
        &team_ids[2],
        "Innovation",
        "5",
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    score_teams(
        &server,
        &judges[0].1,
        &[(team_ids[0].clone(), 16.0), (team_ids[1].clone(), 12.0)],
    )
    .await;
    score_teams(
        &server,
        &judges[1].1,
        &[(team_ids[0].clone(), 18.0), (team_ids[1].clone(), 10.0)],
    )
    .await;

    let res = server
        .post(&format!("/events/{event_id}/rounds/2/complete"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
    let res = server
        .post(&format!("/events/{event_id}/rounds/2/normalize"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    let res = server
        .post(&format!("/events/{event_id}/results/compute"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    {
        let mut conn = pool.get().unwrap();
        let rows = final_results::table
            .filter(final_results::event_id.eq(&event_id))
            .order_by(final_results::final_rank.asc())
            .select((
                final_results::team_id,
                final_results::final_score,
                final_results::final_rank,
                final_results::correlation_coefficient,
            ))
            .load::<(String, f64, i64, f64)>(&mut conn)
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, team_ids[0]);
        assert_eq!(rows[0].2, 1);
        assert_eq!(rows[1].0, team_ids[1]);
        assert_eq!(rows[1].2, 2);

        // With two teams per judge the z-scores are exactly +1 and -1, and
        // both judges agree on the ordering.
        assert!((rows[0].1 - 1.0).abs() < 1e-9);
        assert!((rows[1].1 + 1.0).abs() < 1e-9);
        assert!((rows[0].3 - 1.0).abs() < 1e-9);
    }

    let page = server.get(&format!("/events/{event_id}/results")).await;
    assert_eq!(page.status_code(), StatusCode::OK);
    assert!(page.text().contains("Team One"));
    assert!(page.text().contains("1.000"));

    let csv = server.get(&format!("/events/{event_id}/results.csv")).await;
    assert_eq!(csv.status_code(), StatusCode::OK);
    assert!(csv
        .text()
        .starts_with("rank,team,final_score,correlation_coefficient"));
    assert!(csv.text().contains("Team One"));
}

#[tokio::test]
async fn score_submission_is_bounded_and_assignment_gated() {
    let (server, pool) = make_server();
    register_and_login(&server, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let event_id = create_event(&server, "Bounds Event", "bounds").await;
    create_team(&server, &event_id, "Team One").await;
    create_team(&server, &event_id, "Team Two").await;
    create_judge(&server, &event_id, "Judge A").await;

    let judges = judges_of_event(&pool, &event_id);
    let (judge_id, token) = &judges[0];
    let team_one = team_id_by_name(&pool, &event_id, "Team One");
    let team_two = team_id_by_name(&pool, &event_id, "Team Two");

    create_assignment(&server, &event_id, judge_id, &team_one, 1).await;
    let res = server
        .post(&format!("/events/{event_id}/rounds/1/activate"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    // Out of range.
    let status =
        submit_score(&server, token, &team_one, "Overall", "10.5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let status =
        submit_score(&server, token, &team_one, "Overall", "-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown criterion for an uncategorized team.
    let status =
        submit_score(&server, token, &team_one, "Style", "5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Not assigned to this judge.
    let status =
        submit_score(&server, token, &team_two, "Overall", "5").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unknown token.
    let status =
        submit_score(&server, "nosuchtoken", &team_one, "Overall", "5").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The happy path still works.
    let status =
        submit_score(&server, token, &team_one, "Overall", "7.5").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn round_two_cannot_open_before_round_one_completes() {
    let (server, _pool) = make_server();
    register_and_login(&server, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let event_id = create_event(&server, "Gated Event", "gated").await;

    let res = server
        .post(&format!("/events/{event_id}/rounds/2/activate"))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    // Completing a round that was never activated is also rejected.
    let res = server
        .post(&format!("/events/{event_id}/rounds/1/complete"))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    // Normalization requires a completed round.
    let res = server
        .post(&format!("/events/{event_id}/rounds/1/normalize"))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_access_requires_membership() {
    let (mut server, _pool) = make_server();
    register_and_login(&server, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let event_id = create_event(&server, "Private Event", "private").await;

    server.clear_cookies();

    // Anonymous callers are turned away before the permission check.
    let res = server.get(&format!("/events/{event_id}/teams")).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);

    register_and_login(&server, "intruder", "hunter22").await;
    let res = server.get(&format!("/events/{event_id}/teams")).await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_an_event_cascades_to_all_children() {
    let (server, pool) = make_server();
    register_and_login(&server, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let event_id = create_event(&server, "Doomed Event", "doomed").await;
    create_category(&server, &event_id, "General", "Innovation").await;
    create_team(&server, &event_id, "Team One").await;
    create_judge(&server, &event_id, "Judge A").await;

    let judges = judges_of_event(&pool, &event_id);
    let team_one = team_id_by_name(&pool, &event_id, "Team One");
    create_assignment(&server, &event_id, &judges[0].0, &team_one, 1).await;

    let res = server
        .post(&format!("/events/{event_id}/rounds/1/activate"))
        .await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);
    let status =
        submit_score(&server, &judges[0].1, &team_one, "Overall", "5").await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let res = server.post(&format!("/events/{event_id}/delete")).await;
    assert_eq!(res.status_code(), StatusCode::SEE_OTHER);

    let mut conn = pool.get().unwrap();
    assert_eq!(
        events::table.count().get_result::<i64>(&mut conn).unwrap(),
        0
    );
    assert_eq!(
        event_teams::table
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap(),
        0
    );
    assert_eq!(
        event_judges::table
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap(),
        0
    );
    assert_eq!(
        event_assignments::table
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap(),
        0
    );
    assert_eq!(
        scores::table.count().get_result::<i64>(&mut conn).unwrap(),
        0
    );
    assert_eq!(
        scoring_rounds::table
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn invitation_endpoint_returns_a_preview() {
    let (server, _pool) = make_server();

    let res = server
        .post("/api/send-judge-invitation")
        .json(&serde_json::json!({
            "judgeName": "Ada",
            "judgeEmail": "ada@test.com",
            "eventName": "HackX",
            "accessToken": "tok123",
            "dashboardUrl": "https://podium.example.com/judge"
        }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let body = res.json::<serde_json::Value>();
    assert_eq!(body["success"], true);
    let preview = body["preview"].as_str().unwrap();
    assert!(preview.contains("tok123"));
    assert!(preview.contains("HackX"));

    // Malformed bodies surface as a JSON error, not a panic.
    let res = server
        .post("/api/send-judge-invitation")
        .text("this is not json")
        .await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.json::<serde_json::Value>();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}
