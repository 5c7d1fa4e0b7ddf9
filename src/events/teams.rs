use axum::{
    extract::{Form, Path},
    response::Redirect,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use hypertext::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::User,
    events::{Event, categories::Category},
    permission::Permission,
    schema::event_teams,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, err_not_found,
        see_other_ok, success,
    },
};

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct Team {
    pub id: String,
    pub event_id: String,
    pub category_id: Option<String>,
    pub name: String,
    pub number: i64,
}

impl Team {
    #[tracing::instrument(skip(conn))]
    pub fn fetch(
        team_id: &str,
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Team, FailureResponse> {
        event_teams::table
            .filter(
                event_teams::id
                    .eq(team_id)
                    .and(event_teams::event_id.eq(event_id)),
            )
            .first::<Team>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))?
            .ok_or(FailureResponse::NotFound(()))
    }

    pub fn all_of_event(
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Team>, FailureResponse> {
        event_teams::table
            .filter(event_teams::event_id.eq(event_id))
            .order_by(event_teams::number.asc())
            .load::<Team>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }
}

pub async fn manage_teams_page(
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

    let teams = Team::all_of_event(&event.id, &mut *conn)?;
    let categories = Category::all_of_event(&event.id, &mut *conn)?;
    let categories_ref = &categories;
    let category_name = |id: &Option<String>| -> String {
        id.as_ref()
            .and_then(|id| {
                categories.iter().find(|c| &c.id == id).map(|c| c.name.clone())
            })
            .unwrap_or_else(|| "-----".to_string())
    };

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { "Teams" }

                    table class="table" {
                        thead {
                            tr {
                                th { "#" }
                                th { "Name" }
                                th { "Category" }
                                th {}
                            }
                        }
                        tbody {
                            @for team in &teams {
                                tr {
                                    td { (team.number) }
                                    td { (team.name) }
                                    td { (category_name(&team.category_id)) }
                                    td {
                                        a class="btn btn-sm btn-outline-secondary me-2"
                                          href=(format!("/events/{}/teams/{}/edit", event.id, team.id)) {
                                            "Edit"
                                        }
                                        form method="post" class="d-inline"
                                             action=(format!("/events/{}/teams/{}/delete", event.id, team.id)) {
                                            button type="submit" class="btn btn-sm btn-outline-danger" {
                                                "Delete"
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }

                    h2 { "Add a team" }
                    form method="post" {
                        div class="mb-3" {
                            label for="teamName" class="form-label" { "Name" }
                            input type="text" class="form-control"
                                  id="teamName" name="name" required
                                  maxlength="128";
                        }
                        div class="mb-3" {
                            label for="teamCategory" { "Category" }
                            select name="category_id" id="teamCategory" class="form-select" {
                                option value = "-----" {
                                    "No category"
                                }
                                @for category in categories_ref {
                                    option value = (category.id) {
                                        (category.name)
                                    }
                                }
                            }
                        }
                        button type="submit" class="btn btn-primary" { "Create team" }
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct CreateTeamForm {
    pub name: String,
    pub category_id: String,
}

pub async fn do_create_team(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<CreateTeamForm>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    if form.name.is_empty() || form.name.len() > 128 {
        return bad_request(
            maud! {p {"Team name must be between 1 and 128 characters."}}
                .render(),
        );
    }

    // A team's category, when set, must belong to the same event.
    let category_id = match form.category_id.as_str() {
        "-----" => None,
        id => Some(Category::fetch(id, &event.id, &mut *conn)?.id),
    };

    let next_number = event_teams::table
        .filter(event_teams::event_id.eq(&event.id))
        .order_by(event_teams::number.desc())
        .select(event_teams::number)
        .first::<i64>(&mut *conn)
        .optional()
        .map_err(|_| FailureResponse::ServerError(()))?
        .unwrap_or(0)
        + 1;

    let n = diesel::insert_into(event_teams::table)
        .values((
            event_teams::id.eq(Uuid::now_v7().to_string()),
            event_teams::event_id.eq(&event.id),
            event_teams::category_id.eq(category_id),
            event_teams::name.eq(&form.name),
            event_teams::number.eq(next_number),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    assert_eq!(n, 1);

    see_other_ok(Redirect::to(&format!("/events/{}/teams", event.id)))
}

pub async fn edit_team_page(
    Path((event_id, team_id)): Path<(String, String)>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    let team = Team::fetch(&team_id, &event.id, &mut *conn)?;
    let categories = Category::all_of_event(&event.id, &mut *conn)?;

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" style="max-width: 600px;" {
                    h1 { "Edit team" }
                    form method="post" {
                        div class="mb-3" {
                            label for="teamName" class="form-label" { "Name" }
                            input type="text" class="form-control"
                                  id="teamName" name="name" required
                                  maxlength="128" value=(team.name);
                        }
                        div class="mb-3" {
                            label for="teamCategory" { "Category" }
                            select name="category_id" id="teamCategory" class="form-select" {
                                option value = "-----"
                                       selected[team.category_id.is_none()] {
                                    "No category"
                                }
                                @for category in &categories {
                                    option value = (category.id)
                                           selected[team.category_id.as_deref() == Some(category.id.as_str())] {
                                        (category.name)
                                    }
                                }
                            }
                        }
                        button type="submit" class="btn btn-primary" { "Save" }
                    }
                }
            })
            .render(),
    )
}

pub async fn do_edit_team(
    Path((event_id, team_id)): Path<(String, String)>,
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<CreateTeamForm>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    let team = Team::fetch(&team_id, &event.id, &mut *conn)?;

    if form.name.is_empty() || form.name.len() > 128 {
        return bad_request(
            maud! {p {"Team name must be between 1 and 128 characters."}}
                .render(),
        );
    }

    // Same-event rule as on create.
    let category_id = match form.category_id.as_str() {
        "-----" => None,
        id => Some(Category::fetch(id, &event.id, &mut *conn)?.id),
    };

    diesel::update(event_teams::table.filter(event_teams::id.eq(&team.id)))
        .set((
            event_teams::name.eq(&form.name),
            event_teams::category_id.eq(category_id),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    see_other_ok(Redirect::to(&format!("/events/{}/teams", event.id)))
}

pub async fn do_delete_team(
    Path((event_id, team_id)): Path<(String, String)>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    let n = diesel::delete(
        event_teams::table.filter(
            event_teams::id
                .eq(&team_id)
                .and(event_teams::event_id.eq(&event.id)),
        ),
    )
    .execute(&mut *conn)
    .map_err(|_| FailureResponse::ServerError(()))?;

    if n == 0 {
        return err_not_found();
    }

    see_other_ok(Redirect::to(&format!("/events/{}/teams", event.id)))
}
