//! The judge dashboard. Judges reach this through their tokenized link; there
//! is no login. Writes are bound to the token's judge: a caller can only
//! submit scores for the judge whose token it presents, and only for teams
//! that judge is assigned in the currently active round.

use axum::extract::Path;
use axum::response::Redirect;
use axum_extra::extract::Form;
use chrono::Utc;
use diesel::prelude::*;
use hypertext::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    events::{
        Event,
        assignments::Assignment,
        categories::Category,
        judges::Judge,
        rounds::ScoringRound,
        scoring::{SCORE_MAX, SCORE_MIN, Score},
        teams::Team,
    },
    schema::scores,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, see_other_ok, success,
    },
    widgets::alert::ErrorAlert,
};

/// Criteria offered for a team, from its category; uncategorized teams get a
/// single overall score.
fn criteria_for_team(
    team: &Team,
    event_id: &str,
    conn: &mut crate::state::PooledConn,
) -> Result<Vec<String>, FailureResponse> {
    Ok(match &team.category_id {
        Some(category_id) => {
            let category = Category::fetch(category_id, event_id, conn)?;
            let list = category.criteria_list();
            if list.is_empty() {
                vec!["Overall".to_string()]
            } else {
                list
            }
        }
        None => vec!["Overall".to_string()],
    })
}

pub async fn judge_dashboard_page(
    Path(access_token): Path<String>,
    mut conn: Conn<true>,
) -> StandardResponse {
    let judge = Judge::of_access_token(&access_token, &mut *conn)?;
    let event = Event::fetch(&judge.event_id, &mut *conn)?;

    let active_round = ScoringRound::active_round(&event.id, &mut *conn)?;

    let round = match active_round {
        Some(round) => round,
        None => {
            return success(
                Page::<_, true>::new()
                    .event(event.clone())
                    .body(maud! {
                        div class="container py-5" {
                            h1 { "Hello, " (judge.name) }
                            p {
                                "No scoring round is open right now. Check
                                 back once the organizers have opened one."
                            }
                        }
                    })
                    .render(),
            );
        }
    };

    let teams = Assignment::teams_for_judge_in_round(
        &judge.id,
        round.round_number,
        &mut *conn,
    )?;

    let existing = Score::of_judge_in_round(&judge.id, &round.id, &mut *conn)?;
    let existing_value = |team_id: &str, criterion: &str| -> Option<f64> {
        existing
            .iter()
            .find(|s| s.team_id == team_id && s.criterion_name == criterion)
            .map(|s| s.value)
    };

    let mut sections = Vec::new();
    for team in &teams {
        let criteria = criteria_for_team(team, &event.id, &mut conn)?;
        sections.push((team.clone(), criteria));
    }

    success(
        Page::<_, true>::new()
            .event(event.clone())
            .body(maud! {
                div class="container py-5" style="max-width: 800px;" {
                    header class="mb-5" {
                        h1 class="display-4 fw-bold mb-3" { "Score teams" }
                        span class="badge bg-light text-dark" {
                            "Round " (round.round_number)
                        }
                        p class="mt-2" { "Judging as " strong { (judge.name) } }
                    }

                    @if sections.is_empty() {
                        p {
                            "You have no teams assigned for this round."
                        }
                    }

                    @for (team, criteria) in &sections {
                        div class="card mb-4" {
                            div class="card-header" { (team.name) }
                            div class="card-body" {
                                @for criterion in criteria {
                                    form method="post"
                                         action=(format!("/judge/{}/scores", access_token))
                                         class="row g-2 align-items-center mb-2" {
                                        input type="hidden" name="team_id" value=(team.id);
                                        input type="hidden" name="criterion" value=(criterion);
                                        div class="col-4" {
                                            label class="col-form-label" { (criterion) }
                                        }
                                        div class="col-4" {
                                            input type="number" class="form-control"
                                                  name="value" min="0" max="10"
                                                  step="0.1" required
                                                  value=(existing_value(&team.id, criterion)
                                                      .map(|v| v.to_string())
                                                      .unwrap_or_default());
                                        }
                                        div class="col-4" {
                                            button type="submit" class="btn btn-sm btn-dark" {
                                                "Save"
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

#[derive(Deserialize)]
pub struct SubmitScoreForm {
    pub team_id: String,
    pub criterion: String,
    pub value: f64,
}

pub async fn do_submit_score(
    Path(access_token): Path<String>,
    mut conn: Conn<true>,
    Form(form): Form<SubmitScoreForm>,
) -> StandardResponse {
    let judge = Judge::of_access_token(&access_token, &mut *conn)?;
    let event = Event::fetch(&judge.event_id, &mut *conn)?;

    let round = match ScoringRound::active_round(&event.id, &mut *conn)? {
        Some(round) => round,
        None => {
            return bad_request(
                Page::<_, true>::new()
                    .event(event)
                    .body(maud! {
                        ErrorAlert
                            msg="Error: no scoring round is open. Scores can
                                 only be submitted while a round is active.";
                    })
                    .render(),
            );
        }
    };

    if !(SCORE_MIN..=SCORE_MAX).contains(&form.value)
        || !form.value.is_finite()
    {
        return bad_request(
            Page::<_, true>::new()
                .event(event)
                .body(maud! {
                    ErrorAlert msg="Error: scores must be between 0 and 10.";
                })
                .render(),
        );
    }

    let team = Team::fetch(&form.team_id, &event.id, &mut *conn)?;

    if !Assignment::exists(&judge.id, &team.id, round.round_number, &mut *conn)?
    {
        tracing::debug!(
            judge = %judge.id,
            team = %team.id,
            round = round.round_number,
            "score rejected: no assignment"
        );
        return Err(FailureResponse::Unauthorized(()));
    }

    let criteria = criteria_for_team(&team, &event.id, &mut conn)?;
    if !criteria.iter().any(|c| c == &form.criterion) {
        return bad_request(
            Page::<_, true>::new()
                .event(event)
                .body(maud! {
                    ErrorAlert
                        msg="Error: that is not a scoring criterion for this
                             team.";
                })
                .render(),
        );
    }

    // Latest write wins per (judge, team, round, criterion).
    diesel::insert_into(scores::table)
        .values((
            scores::id.eq(Uuid::now_v7().to_string()),
            scores::judge_id.eq(&judge.id),
            scores::team_id.eq(&team.id),
            scores::category_id.eq(team.category_id.clone()),
            scores::round_id.eq(&round.id),
            scores::criterion_name.eq(&form.criterion),
            scores::value.eq(form.value),
            scores::submitted_at.eq(Utc::now().naive_utc()),
        ))
        .on_conflict((
            scores::judge_id,
            scores::team_id,
            scores::round_id,
            scores::criterion_name,
        ))
        .do_update()
        .set((
            scores::value.eq(form.value),
            scores::submitted_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    see_other_ok(Redirect::to(&format!("/judge/{access_token}")))
}
