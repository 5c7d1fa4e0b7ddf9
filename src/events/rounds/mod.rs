use axum::{extract::Path, response::Redirect};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use hypertext::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    auth::User,
    events::Event,
    permission::Permission,
    schema::scoring_rounds,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, err_not_found,
        see_other_ok, success,
    },
    widgets::alert::ErrorAlert,
};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct ScoringRound {
    pub id: String,
    pub event_id: String,
    pub round_number: i64,
    pub status: String,
}

impl ScoringRound {
    pub fn fetch(
        round_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Self, FailureResponse> {
        scoring_rounds::table
            .filter(scoring_rounds::id.eq(round_id))
            .first::<ScoringRound>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))?
            .ok_or(FailureResponse::NotFound(()))
    }

    pub fn of_number(
        event_id: &str,
        round_number: i64,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Self, FailureResponse> {
        scoring_rounds::table
            .filter(
                scoring_rounds::event_id
                    .eq(event_id)
                    .and(scoring_rounds::round_number.eq(round_number)),
            )
            .first::<ScoringRound>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))?
            .ok_or(FailureResponse::NotFound(()))
    }

    pub fn all_of_event(
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Self>, FailureResponse> {
        scoring_rounds::table
            .filter(scoring_rounds::event_id.eq(event_id))
            .order_by(scoring_rounds::round_number.asc())
            .load::<ScoringRound>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }

    /// The round judges may currently submit scores for, if any.
    pub fn active_round(
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Option<Self>, FailureResponse> {
        scoring_rounds::table
            .filter(
                scoring_rounds::event_id
                    .eq(event_id)
                    .and(scoring_rounds::status.eq(STATUS_ACTIVE)),
            )
            .first::<ScoringRound>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

pub async fn manage_rounds_page(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageScoring,
        &mut *conn,
    )?;

    let rounds = ScoringRound::all_of_event(&event.id, &mut *conn)?;

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { "Scoring rounds" }
                    table class="table" {
                        thead {
                            tr {
                                th { "Round" }
                                th { "Status" }
                                th { "Actions" }
                            }
                        }
                        tbody {
                            @for round in &rounds {
                                tr {
                                    td { "Round " (round.round_number) }
                                    td { (round.status) }
                                    td {
                                        @if round.status == STATUS_PENDING {
                                            form method="post"
                                                 action=(format!("/events/{}/rounds/{}/activate", event.id, round.round_number)) {
                                                button type="submit" class="btn btn-sm btn-primary" {
                                                    "Activate"
                                                }
                                            }
                                        } @else if round.is_active() {
                                            form method="post"
                                                 action=(format!("/events/{}/rounds/{}/complete", event.id, round.round_number)) {
                                                button type="submit" class="btn btn-sm btn-warning" {
                                                    "Complete"
                                                }
                                            }
                                        } @else {
                                            form method="post"
                                                 action=(format!("/events/{}/rounds/{}/normalize", event.id, round.round_number)) {
                                                button type="submit" class="btn btn-sm btn-secondary" {
                                                    "Recompute normalized scores"
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            })
            .render(),
    )
}

/// Rounds only move forward: pending → active → completed. Round 2 cannot
/// open before round 1 has finished.
pub async fn do_activate_round(
    Path((event_id, round_number)): Path<(String, i64)>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageScoring,
        &mut *conn,
    )?;

    if !(1..=2).contains(&round_number) {
        return err_not_found();
    }

    let round = ScoringRound::of_number(&event.id, round_number, &mut *conn)?;

    if round.status != STATUS_PENDING {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    ErrorAlert msg="This round has already been opened.";
                })
                .render(),
        );
    }

    if round_number == 2 {
        let round1 = ScoringRound::of_number(&event.id, 1, &mut *conn)?;
        if !round1.is_completed() {
            return bad_request(
                Page::new()
                    .user(user)
                    .event(event)
                    .body(maud! {
                        ErrorAlert
                            msg="Round 1 must be completed before round 2 can
                                 begin.";
                    })
                    .render(),
            );
        }
    }

    diesel::update(scoring_rounds::table.filter(scoring_rounds::id.eq(&round.id)))
        .set(scoring_rounds::status.eq(STATUS_ACTIVE))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    see_other_ok(Redirect::to(&format!("/events/{}/rounds", event.id)))
}

pub async fn do_complete_round(
    Path((event_id, round_number)): Path<(String, i64)>,
    user: User<true>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageScoring,
        &mut *conn,
    )?;

    let round = ScoringRound::of_number(&event.id, round_number, &mut *conn)?;

    if !round.is_active() {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    ErrorAlert msg="Only an active round can be completed.";
                })
                .render(),
        );
    }

    diesel::update(scoring_rounds::table.filter(scoring_rounds::id.eq(&round.id)))
        .set(scoring_rounds::status.eq(STATUS_COMPLETED))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    see_other_ok(Redirect::to(&format!("/events/{}/rounds", event.id)))
}
