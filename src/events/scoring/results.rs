use axum::{
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use hypertext::prelude::*;

use crate::{
    auth::User,
    events::{
        Event,
        scoring::aggregate::FinalResult,
        teams::Team,
    },
    permission::Permission,
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, StandardResponse, success},
};

pub async fn results_page(
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

    let results = FinalResult::all_of_event(&event.id, &mut *conn)?;
    let teams = Team::all_of_event(&event.id, &mut *conn)?;
    let name_of_team = |id: &str| -> &str {
        teams
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.as_str())
            .unwrap_or("?")
    };

    let agreement = results.first().map(|r| r.correlation_coefficient);

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { "Final results" }

                    @if results.is_empty() {
                        p {
                            "No final results yet. Complete and normalize both
                             rounds, then compute the results."
                        }
                    } @else {
                        @if let Some(agreement) = agreement {
                            p {
                                "Inter-judge agreement (Spearman): "
                                strong { (format!("{agreement:.3}")) }
                            }
                        }

                        table class="table" {
                            thead {
                                tr {
                                    th { "Rank" }
                                    th { "Team" }
                                    th { "Final score" }
                                }
                            }
                            tbody {
                                @for result in &results {
                                    tr {
                                        td { (result.final_rank) }
                                        td { (name_of_team(&result.team_id)) }
                                        td { (format!("{:.4}", result.final_score)) }
                                    }
                                }
                            }
                        }

                        a href=(format!("/events/{}/results.csv", event.id))
                          class="btn btn-outline-secondary" {
                            "Download as CSV"
                        }
                    }

                    form method="post"
                         action=(format!("/events/{}/results/compute", event.id))
                         class="mt-3" {
                        button type="submit" class="btn btn-primary" {
                            "Compute final results"
                        }
                    }
                }
            })
            .render(),
    )
}

pub async fn results_csv(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
) -> Result<Response, FailureResponse> {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageScoring,
        &mut *conn,
    )?;

    let results = FinalResult::all_of_event(&event.id, &mut *conn)?;
    let teams = Team::all_of_event(&event.id, &mut *conn)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "rank",
            "team",
            "final_score",
            "correlation_coefficient",
        ])
        .map_err(|_| FailureResponse::ServerError(()))?;

    for result in &results {
        let team_name = teams
            .iter()
            .find(|t| t.id == result.team_id)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        writer
            .write_record([
                result.final_rank.to_string(),
                team_name.to_string(),
                format!("{:.6}", result.final_score),
                format!("{:.6}", result.correlation_coefficient),
            ])
            .map_err(|_| FailureResponse::ServerError(()))?;
    }

    let body = writer
        .into_inner()
        .map_err(|_| FailureResponse::ServerError(()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"results.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}
