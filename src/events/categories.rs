use axum::{
    extract::{Form, Path},
    response::Redirect,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use hypertext::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::User,
    events::Event,
    permission::Permission,
    schema::event_categories,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, err_not_found,
        see_other_ok, success,
    },
};

#[derive(Queryable, Clone, Debug)]
pub struct Category {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub weight: f64,
    pub criteria: String,
}

impl Category {
    pub fn fetch(
        category_id: &str,
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Category, FailureResponse> {
        event_categories::table
            .filter(
                event_categories::id
                    .eq(category_id)
                    .and(event_categories::event_id.eq(event_id)),
            )
            .first::<Category>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))?
            .ok_or(FailureResponse::NotFound(()))
    }

    pub fn all_of_event(
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Category>, FailureResponse> {
        event_categories::table
            .filter(event_categories::event_id.eq(event_id))
            .order_by(event_categories::name.asc())
            .load::<Category>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }

    /// The criteria column stores a JSON-encoded list of names. Rows written
    /// by hand (or by older versions) may not parse; treat those as empty.
    pub fn criteria_list(&self) -> Vec<String> {
        serde_json::from_str(&self.criteria).unwrap_or_default()
    }
}

pub async fn manage_categories_page(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageEvent,
        &mut *conn,
    )?;

    let categories = Category::all_of_event(&event.id, &mut *conn)?;

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { "Categories" }

                    table class="table" {
                        thead {
                            tr {
                                th { "Name" }
                                th { "Weight" }
                                th { "Criteria" }
                                th { }
                            }
                        }
                        tbody {
                            @for category in &categories {
                                tr {
                                    td { (category.name) }
                                    td { (category.weight) }
                                    td { (category.criteria_list().join(", ")) }
                                    td {
                                        a class="btn btn-sm btn-outline-secondary me-2"
                                          href=(format!("/events/{}/categories/{}/edit", event.id, category.id)) {
                                            "Edit"
                                        }
                                        form method="post" class="d-inline"
                                             action=(format!("/events/{}/categories/{}/delete", event.id, category.id)) {
                                            button type="submit" class="btn btn-sm btn-danger" {
                                                "Delete"
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }

                    h2 { "Add a category" }
                    form method="post" {
                        div class="mb-3" {
                            label for="categoryName" class="form-label" { "Name" }
                            input type="text" class="form-control"
                                  id="categoryName" name="name" required
                                  maxlength="64";
                        }
                        div class="mb-3" {
                            label for="categoryWeight" class="form-label" { "Weight" }
                            input type="number" class="form-control"
                                  id="categoryWeight" name="weight"
                                  step="0.1" min="0" value="1.0" required;
                            div class="form-text" {
                                "Multiplier applied to raw scores of teams in
                                 this category."
                            }
                        }
                        div class="mb-3" {
                            label for="categoryCriteria" class="form-label" { "Criteria" }
                            textarea class="form-control" id="categoryCriteria"
                                     name="criteria" rows="4" {
                            }
                            div class="form-text" {
                                "One scoring criterion per line, e.g.
                                 \"Innovation\" or \"Execution\"."
                            }
                        }
                        button type="submit" class="btn btn-primary" { "Create category" }
                    }
                }
            })
            .render(),
    )
}

/// One criterion per line; surrounding whitespace and blank lines dropped.
fn parse_criteria(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
pub struct CreateCategoryForm {
    pub name: String,
    pub weight: f64,
    pub criteria: String,
}

pub async fn do_create_category(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<CreateCategoryForm>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageEvent,
        &mut *conn,
    )?;

    if form.name.is_empty() || form.name.len() > 64 {
        return bad_request(
            maud! {p {"Category name must be between 1 and 64 characters."}}
                .render(),
        );
    }
    if !form.weight.is_finite() || form.weight < 0.0 {
        return bad_request(
            maud! {p {"Weight must be a non-negative number."}}.render(),
        );
    }

    let criteria = parse_criteria(&form.criteria);
    if criteria.is_empty() {
        return bad_request(
            maud! {p {"A category needs at least one scoring criterion."}}
                .render(),
        );
    }

    let n = diesel::insert_into(event_categories::table)
        .values((
            event_categories::id.eq(Uuid::now_v7().to_string()),
            event_categories::event_id.eq(&event.id),
            event_categories::name.eq(&form.name),
            event_categories::weight.eq(form.weight),
            event_categories::criteria
                .eq(serde_json::to_string(&criteria)
                    .map_err(|_| FailureResponse::ServerError(()))?),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    assert_eq!(n, 1);

    see_other_ok(Redirect::to(&format!("/events/{}/categories", event.id)))
}

pub async fn edit_category_page(
    Path((event_id, category_id)): Path<(String, String)>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageEvent,
        &mut *conn,
    )?;

    let category = Category::fetch(&category_id, &event.id, &mut *conn)?;

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" style="max-width: 600px;" {
                    h1 { "Edit category" }
                    form method="post" {
                        div class="mb-3" {
                            label for="categoryName" class="form-label" { "Name" }
                            input type="text" class="form-control"
                                  id="categoryName" name="name" required
                                  maxlength="64" value=(category.name);
                        }
                        div class="mb-3" {
                            label for="categoryWeight" class="form-label" { "Weight" }
                            input type="number" class="form-control"
                                  id="categoryWeight" name="weight"
                                  step="0.1" min="0" required
                                  value=(category.weight);
                        }
                        div class="mb-3" {
                            label for="categoryCriteria" class="form-label" { "Criteria" }
                            textarea class="form-control" id="categoryCriteria"
                                     name="criteria" rows="4" {
                                (category.criteria_list().join("\n"))
                            }
                        }
                        button type="submit" class="btn btn-primary" { "Save" }
                    }
                }
            })
            .render(),
    )
}

pub async fn do_edit_category(
    Path((event_id, category_id)): Path<(String, String)>,
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<CreateCategoryForm>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageEvent,
        &mut *conn,
    )?;

    let category = Category::fetch(&category_id, &event.id, &mut *conn)?;

    if form.name.is_empty() || form.name.len() > 64 {
        return bad_request(
            maud! {p {"Category name must be between 1 and 64 characters."}}
                .render(),
        );
    }
    if !form.weight.is_finite() || form.weight < 0.0 {
        return bad_request(
            maud! {p {"Weight must be a non-negative number."}}.render(),
        );
    }

    let criteria = parse_criteria(&form.criteria);
    if criteria.is_empty() {
        return bad_request(
            maud! {p {"A category needs at least one scoring criterion."}}
                .render(),
        );
    }

    diesel::update(
        event_categories::table.filter(event_categories::id.eq(&category.id)),
    )
    .set((
        event_categories::name.eq(&form.name),
        event_categories::weight.eq(form.weight),
        event_categories::criteria
            .eq(serde_json::to_string(&criteria)
                .map_err(|_| FailureResponse::ServerError(()))?),
    ))
    .execute(&mut *conn)
    .map_err(|_| FailureResponse::ServerError(()))?;

    see_other_ok(Redirect::to(&format!("/events/{}/categories", event.id)))
}

pub async fn do_delete_category(
    Path((event_id, category_id)): Path<(String, String)>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageEvent,
        &mut *conn,
    )?;

    let n = diesel::delete(
        event_categories::table.filter(
            event_categories::id
                .eq(&category_id)
                .and(event_categories::event_id.eq(&event.id)),
        ),
    )
    .execute(&mut *conn)
    .map_err(|_| FailureResponse::ServerError(()))?;

    if n == 0 {
        return err_not_found();
    }

    see_other_ok(Redirect::to(&format!("/events/{}/categories", event.id)))
}
