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
    events::{
        Event,
        categories::Category,
        judges::Judge,
        rounds::ScoringRound,
        teams::Team,
    },
    permission::Permission,
    schema::{event_assignments, event_teams, normalized_scores},
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, err_not_found,
        see_other_ok, success,
    },
    widgets::alert::ErrorAlert,
};

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct Assignment {
    pub id: String,
    pub judge_id: String,
    pub category_id: Option<String>,
    pub team_id: String,
    pub round_number: i64,
}

impl Assignment {
    /// Teams this judge should score in the given round, in team-number
    /// order.
    pub fn teams_for_judge_in_round(
        judge_id: &str,
        round_number: i64,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Team>, FailureResponse> {
        event_assignments::table
            .inner_join(
                event_teams::table
                    .on(event_assignments::team_id.eq(event_teams::id)),
            )
            .filter(
                event_assignments::judge_id
                    .eq(judge_id)
                    .and(event_assignments::round_number.eq(round_number)),
            )
            .order_by(event_teams::number.asc())
            .select(event_teams::all_columns)
            .load::<Team>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }

    pub fn exists(
        judge_id: &str,
        team_id: &str,
        round_number: i64,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<bool, FailureResponse> {
        diesel::select(diesel::dsl::exists(
            event_assignments::table.filter(
                event_assignments::judge_id
                    .eq(judge_id)
                    .and(event_assignments::team_id.eq(team_id))
                    .and(event_assignments::round_number.eq(round_number)),
            ),
        ))
        .get_result::<bool>(conn)
        .map_err(|_| FailureResponse::ServerError(()))
    }
}

pub async fn manage_assignments_page(
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
    let teams = Team::all_of_event(&event.id, &mut *conn)?;
    let assignments = event_assignments::table
        .inner_join(
            crate::schema::event_judges::table
                .on(event_assignments::judge_id
                    .eq(crate::schema::event_judges::id)),
        )
        .filter(crate::schema::event_judges::event_id.eq(&event.id))
        .select(event_assignments::all_columns)
        .order_by(event_assignments::round_number.asc())
        .load::<Assignment>(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    let judges_ref = &judges;
    let teams_ref = &teams;
    let name_of_judge = |id: &str| -> &str {
        judges
            .iter()
            .find(|j| j.id == id)
            .map(|j| j.name.as_str())
            .unwrap_or("?")
    };
    let name_of_team = |id: &str| -> &str {
        teams
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.as_str())
            .unwrap_or("?")
    };

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { "Assignments" }

                    table class="table" {
                        thead {
                            tr {
                                th { "Judge" }
                                th { "Team" }
                                th { "Round" }
                                th { }
                            }
                        }
                        tbody {
                            @for assignment in &assignments {
                                tr {
                                    td { (name_of_judge(&assignment.judge_id)) }
                                    td { (name_of_team(&assignment.team_id)) }
                                    td { (assignment.round_number) }
                                    td {
                                        form method="post"
                                             action=(format!("/events/{}/assignments/{}/delete", event.id, assignment.id)) {
                                            button type="submit" class="btn btn-sm btn-danger" {
                                                "Delete"
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }

                    h2 { "Assign a judge to a team" }
                    form method="post" {
                        div class="mb-3" {
                            label for="assignJudge" { "Judge" }
                            select name="judge_id" id="assignJudge" class="form-select" {
                                @for judge in judges_ref {
                                    option value = (judge.id) { (judge.name) }
                                }
                            }
                        }
                        div class="mb-3" {
                            label for="assignTeam" { "Team" }
                            select name="team_id" id="assignTeam" class="form-select" {
                                @for team in teams_ref {
                                    option value = (team.id) { (team.name) }
                                }
                            }
                        }
                        div class="mb-3" {
                            label for="assignRound" { "Round" }
                            select name="round_number" id="assignRound" class="form-select" {
                                option value="1" { "Round 1" }
                                option value="2" { "Round 2" }
                            }
                        }
                        button type="submit" class="btn btn-primary" { "Assign" }
                    }

                    h2 { "Round 2" }
                    form method="post"
                         action=(format!("/events/{}/assignments/promote", event.id)) {
                        button type="submit" class="btn btn-outline-primary" {
                            "Create round 2 assignments from round 1 selections"
                        }
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct CreateAssignmentForm {
    pub judge_id: String,
    pub team_id: String,
    pub round_number: i64,
}

pub async fn do_create_assignment(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<CreateAssignmentForm>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageParticipants,
        &mut *conn,
    )?;

    if !(1..=2).contains(&form.round_number) {
        return bad_request(
            maud! {p {"Round number must be 1 or 2."}}.render(),
        );
    }

    // Both ends of the pair must belong to this event; the category is
    // inherited from the team so scores pick up the right weight.
    let judge = Judge::fetch(&form.judge_id, &event.id, &mut *conn)?;
    let team = Team::fetch(&form.team_id, &event.id, &mut *conn)?;
    let category_id = match &team.category_id {
        Some(id) => Some(Category::fetch(id, &event.id, &mut *conn)?.id),
        None => None,
    };

    if Assignment::exists(&judge.id, &team.id, form.round_number, &mut *conn)? {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    ErrorAlert
                        msg="That judge is already assigned to that team for
                             this round.";
                })
                .render(),
        );
    }

    let n = diesel::insert_into(event_assignments::table)
        .values((
            event_assignments::id.eq(Uuid::now_v7().to_string()),
            event_assignments::judge_id.eq(&judge.id),
            event_assignments::category_id.eq(category_id),
            event_assignments::team_id.eq(&team.id),
            event_assignments::round_number.eq(form.round_number),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    assert_eq!(n, 1);

    see_other_ok(Redirect::to(&format!("/events/{}/assignments", event.id)))
}

pub async fn do_delete_assignment(
    Path((event_id, assignment_id)): Path<(String, String)>,
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
        event_assignments::table.filter(
            event_assignments::id.eq(&assignment_id).and(
                event_assignments::judge_id.eq_any(
                    crate::schema::event_judges::table
                        .filter(
                            crate::schema::event_judges::event_id
                                .eq(&event.id),
                        )
                        .select(crate::schema::event_judges::id),
                ),
            ),
        ),
    )
    .execute(&mut *conn)
    .map_err(|_| FailureResponse::ServerError(()))?;

    if n == 0 {
        return err_not_found();
    }

    see_other_ok(Redirect::to(&format!("/events/{}/assignments", event.id)))
}

/// Turns each judge's round-1 `selected_for_round2` flags into round-2
/// assignments. Running it twice adds nothing new.
pub async fn do_promote_selected(
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

    let round1 = ScoringRound::of_number(&event.id, 1, &mut *conn)?;
    if !round1.is_completed() {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    ErrorAlert
                        msg="Round 1 must be completed (and normalized) before
                             promoting teams to round 2.";
                })
                .render(),
        );
    }

    let selected: Vec<(String, String)> = normalized_scores::table
        .filter(
            normalized_scores::round_id
                .eq(&round1.id)
                .and(normalized_scores::selected_for_round2.eq(true)),
        )
        .select((normalized_scores::judge_id, normalized_scores::team_id))
        .load::<(String, String)>(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    let mut created = 0;
    for (judge_id, team_id) in &selected {
        if Assignment::exists(judge_id, team_id, 2, &mut *conn)? {
            continue;
        }

        let team = Team::fetch(team_id, &event.id, &mut *conn)?;

        diesel::insert_into(event_assignments::table)
            .values((
                event_assignments::id.eq(Uuid::now_v7().to_string()),
                event_assignments::judge_id.eq(judge_id),
                event_assignments::category_id.eq(team.category_id),
                event_assignments::team_id.eq(team_id),
                event_assignments::round_number.eq(2i64),
            ))
            .execute(&mut *conn)
            .map_err(|_| FailureResponse::ServerError(()))?;
        created += 1;
    }

    tracing::info!(
        event = %event.id,
        selected = selected.len(),
        created,
        "promoted round 1 selections to round 2 assignments"
    );

    see_other_ok(Redirect::to(&format!("/events/{}/assignments", event.id)))
}
