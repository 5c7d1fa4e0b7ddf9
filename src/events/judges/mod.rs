use axum::{
    extract::{Form, Path},
    response::Redirect,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use hypertext::prelude::*;
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::User,
    events::Event,
    permission::Permission,
    schema::event_judges,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, err_not_found,
        see_other_ok, success,
    },
    validation::is_valid_email,
};

pub mod invite;

pub const ACCESS_TOKEN_LEN: usize = 24;

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct Judge {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub email: String,
    pub access_token: String,
    pub number: i64,
}

impl Judge {
    pub fn fetch(
        judge_id: &str,
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Judge, FailureResponse> {
        event_judges::table
            .filter(
                event_judges::id
                    .eq(judge_id)
                    .and(event_judges::event_id.eq(event_id)),
            )
            .first::<Judge>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))?
            .ok_or(FailureResponse::NotFound(()))
    }

    /// Resolves a judge from a dashboard access token. The token is the
    /// judge's entire credential, so an unknown token is indistinguishable
    /// from a missing page.
    pub fn of_access_token(
        token: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Judge, FailureResponse> {
        event_judges::table
            .filter(event_judges::access_token.eq(token))
            .first::<Judge>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))?
            .ok_or(FailureResponse::NotFound(()))
    }

    pub fn all_of_event(
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Judge>, FailureResponse> {
        event_judges::table
            .filter(event_judges::event_id.eq(event_id))
            .order_by(event_judges::number.asc())
            .load::<Judge>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }
}

/// Tokens are globally unique (they are resolved without an event id), so
/// the uniqueness probe spans all events.
pub fn get_unique_access_token(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> String {
    loop {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ACCESS_TOKEN_LEN)
            .map(char::from)
            .collect();

        let is_duplicate = diesel::dsl::select(diesel::dsl::exists(
            event_judges::table
                .filter(event_judges::access_token.eq(&token))
                .select(event_judges::id),
        ))
        .get_result::<bool>(conn)
        .unwrap_or(true);

        if !is_duplicate {
            return token;
        }
    }
}

pub async fn manage_judges_page(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    let judges = Judge::all_of_event(&event.id, &mut *conn)?;

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { "Judges" }

                    table class="table" {
                        thead {
                            tr {
                                th { "#" }
                                th { "Name" }
                                th { "Email" }
                                th { "Dashboard link" }
                                th { }
                            }
                        }
                        tbody {
                            @for judge in &judges {
                                tr {
                                    td { (judge.number) }
                                    td { (judge.name) }
                                    td { (judge.email) }
                                    td {
                                        a href=(format!("/judge/{}", judge.access_token)) {
                                            "Dashboard"
                                        }
                                    }
                                    td {
                                        form method="post"
                                             action=(format!("/events/{}/judges/{}/regenerate_token", event.id, judge.id)) {
                                            button type="submit" class="btn btn-sm btn-outline-danger" {
                                                "Regenerate token"
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }

                    h2 { "Add a judge" }
                    form method="post" {
                        div class="mb-3" {
                            label for="judgeName" class="form-label" { "Name of the judge" }
                            input
                                type="text"
                                class="form-control"
                                id="judgeName"
                                name="name"
                                required;
                        }
                        div class="mb-3" {
                            label for="judgeEmail" class="form-label" { "Email of the judge" }
                            input
                                type="text"
                                class="form-control"
                                id="judgeEmail"
                                aria-describedby="emailHelp"
                                name="email"
                                required;
                            div id="emailHelp" class="form-text" {
                                "Invitations with the judge's dashboard link are
                                 addressed here."
                            }
                        }
                        button type="submit" class="btn btn-primary" { "Create judge" }
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct CreateJudgeForm {
    pub name: String,
    pub email: String,
}

pub async fn do_create_judge(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<CreateJudgeForm>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;

    tracing::trace!("Retrieved event with id = {}", event.id);

    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    if form.name.is_empty() || form.name.len() > 128 {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    "Error: Name must be between 1 and 128 characters."
                })
                .render(),
        );
    }
    if form.email.len() > 254 {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    "Error: Email is too long (max 254 characters)."
                })
                .render(),
        );
    }
    if is_valid_email(&form.email).is_err() {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    "Error: Invalid email address."
                })
                .render(),
        );
    }

    let access_token = get_unique_access_token(&mut *conn);

    let next_number = event_judges::table
        .filter(event_judges::event_id.eq(&event.id))
        .order_by(event_judges::number.desc())
        .select(event_judges::number)
        .first::<i64>(&mut *conn)
        .optional()
        .map_err(|_| FailureResponse::ServerError(()))?
        .unwrap_or(0)
        + 1;

    let n = diesel::insert_into(event_judges::table)
        .values((
            event_judges::id.eq(Uuid::now_v7().to_string()),
            event_judges::event_id.eq(&event.id),
            event_judges::name.eq(&form.name),
            event_judges::email.eq(&form.email),
            event_judges::access_token.eq(access_token),
            event_judges::number.eq(next_number),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    assert_eq!(n, 1);

    see_other_ok(Redirect::to(&format!("/events/{}/judges", event.id)))
}

/// Invalidates the old dashboard link; scores already submitted stay.
pub async fn do_regenerate_token(
    Path((event_id, judge_id)): Path<(String, String)>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    let judge = Judge::fetch(&judge_id, &event.id, &mut *conn)?;
    let token = get_unique_access_token(&mut *conn);

    let n = diesel::update(
        event_judges::table.filter(event_judges::id.eq(&judge.id)),
    )
    .set(event_judges::access_token.eq(token))
    .execute(&mut *conn)
    .map_err(|_| FailureResponse::ServerError(()))?;

    if n == 0 {
        return err_not_found();
    }

    see_other_ok(Redirect::to(&format!("/events/{}/judges", event.id)))
}
