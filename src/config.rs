use axum::{
    Router, middleware,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use diesel::prelude::*;
use diesel_migrations::MigrationHarness;
use hypertext::prelude::*;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    MIGRATIONS,
    auth::{
        User,
        login::{do_login, login_page},
        register::{do_register, register_page},
    },
    events::{
        Event,
        assignments::{
            do_create_assignment, do_delete_assignment, do_promote_selected,
            manage_assignments_page,
        },
        categories::{
            do_create_category, do_delete_category, do_edit_category,
            edit_category_page, manage_categories_page,
        },
        create::{create_event_page, do_create_event},
        delete::do_delete_event,
        edit::{do_edit_event, edit_event_page},
        judges::{
            do_create_judge, do_regenerate_token,
            invite::send_judge_invitation, manage_judges_page,
        },
        rounds::{do_activate_round, do_complete_round, manage_rounds_page},
        scoring::{
            aggregate::do_compute_results,
            normalize::do_normalize_round,
            results::{results_csv, results_page},
            submit::{do_submit_score, judge_dashboard_page},
        },
        teams::{
            do_create_team, do_delete_team, do_edit_team, edit_team_page,
            manage_teams_page,
        },
        view::view_event_page,
    },
    schema::{event_members, events},
    state::{AppState, Conn, DbPool, commit_on_success},
    template::Page,
    util_resp::{FailureResponse, StandardResponse, success},
};

pub async fn home(
    user: Option<User<true>>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let my_events = match &user {
        Some(user) => events::table
            .inner_join(event_members::table)
            .filter(event_members::user_id.eq(&user.id))
            .order_by(events::created_at.desc())
            .select(events::all_columns)
            .load::<Event>(&mut *conn)
            .map_err(|_| FailureResponse::ServerError(()))?,
        None => Vec::new(),
    };

    success(
        Page::new()
            .user_opt(user)
            .body(maud! {
                div class="container py-4" {
                    h1 { "Podium" }

                    @if my_events.is_empty() {
                        p { "No events yet." }
                    } @else {
                        ul class="list-group mb-4" {
                            @for event in &my_events {
                                li class="list-group-item" {
                                    a href=(format!("/events/{}", event.id)) {
                                        (event.name)
                                    }
                                }
                            }
                        }
                    }

                    a href="/events/create" class="btn btn-primary" {
                        "Create new event"
                    }
                }
            })
            .render(),
    )
}

fn secret_key() -> Key {
    if let Ok(secret) = std::env::var("SECRET_KEY") {
        Key::from(secret.as_bytes())
    } else if cfg!(test) {
        Key::from(&[0u8; 64])
    } else {
        Key::generate()
    }
}

pub fn create_app(pool: DbPool) -> Router {
    {
        let mut conn = pool.get().unwrap();
        conn.run_pending_migrations(MIGRATIONS).unwrap();
    }

    let state = AppState { pool: pool.clone(), key: secret_key() };

    let invitation_api = Router::new()
        // The cors layer answers preflight requests itself.
        .route("/api/send-judge-invitation", post(send_judge_invitation))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(do_login))
        .route("/register", get(register_page).post(do_register))
        .route("/events/create", get(create_event_page).post(do_create_event))
        .route("/events/:event_id", get(view_event_page))
        .route(
            "/events/:event_id/edit",
            get(edit_event_page).post(do_edit_event),
        )
        .route("/events/:event_id/delete", post(do_delete_event))
        .route(
            "/events/:event_id/categories",
            get(manage_categories_page).post(do_create_category),
        )
        .route(
            "/events/:event_id/categories/:category_id/edit",
            get(edit_category_page).post(do_edit_category),
        )
        .route(
            "/events/:event_id/categories/:category_id/delete",
            post(do_delete_category),
        )
        .route(
            "/events/:event_id/teams",
            get(manage_teams_page).post(do_create_team),
        )
        .route(
            "/events/:event_id/teams/:team_id/edit",
            get(edit_team_page).post(do_edit_team),
        )
        .route(
            "/events/:event_id/teams/:team_id/delete",
            post(do_delete_team),
        )
        .route(
            "/events/:event_id/judges",
            get(manage_judges_page).post(do_create_judge),
        )
        .route(
            "/events/:event_id/judges/:judge_id/regenerate_token",
            post(do_regenerate_token),
        )
        .route(
            "/events/:event_id/assignments",
            get(manage_assignments_page).post(do_create_assignment),
        )
        .route(
            "/events/:event_id/assignments/promote",
            post(do_promote_selected),
        )
        .route(
            "/events/:event_id/assignments/:assignment_id/delete",
            post(do_delete_assignment),
        )
        .route("/events/:event_id/rounds", get(manage_rounds_page))
        .route(
            "/events/:event_id/rounds/:round_number/activate",
            post(do_activate_round),
        )
        .route(
            "/events/:event_id/rounds/:round_number/complete",
            post(do_complete_round),
        )
        .route(
            "/events/:event_id/rounds/:round_number/normalize",
            post(do_normalize_round),
        )
        .route("/events/:event_id/results", get(results_page))
        .route("/events/:event_id/results/compute", post(do_compute_results))
        .route("/events/:event_id/results.csv", get(results_csv))
        .route("/judge/:access_token", get(judge_dashboard_page))
        .route("/judge/:access_token/scores", post(do_submit_score))
        .merge(invitation_api)
        .layer(middleware::from_fn_with_state(pool, commit_on_success))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
