use axum::extract::Path;
use diesel::prelude::*;
use hypertext::prelude::*;

use crate::{
    auth::User,
    events::{Event, rounds::ScoringRound},
    permission::Permission,
    schema::{event_judges, event_teams},
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, StandardResponse, success},
};

pub async fn view_event_page(
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

    let team_count = event_teams::table
        .filter(event_teams::event_id.eq(&event.id))
        .count()
        .get_result::<i64>(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    let judge_count = event_judges::table
        .filter(event_judges::event_id.eq(&event.id))
        .count()
        .get_result::<i64>(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    let rounds = ScoringRound::all_of_event(&event.id, &mut *conn)?;

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { (event.name) }
                    p {
                        (team_count) " teams, " (judge_count) " judges."
                    }
                    @if let (Some(start), Some(end)) =
                        (event.starts_on, event.ends_on)
                    {
                        p { (start.to_string()) " – " (end.to_string()) }
                    }

                    h2 { "Rounds" }
                    ul {
                        @for round in &rounds {
                            li {
                                "Round " (round.round_number) ": "
                                (round.status)
                            }
                        }
                    }

                    ul {
                        li { a href=(format!("/events/{}/teams", event.id)) { "Manage teams" } }
                        li { a href=(format!("/events/{}/categories", event.id)) { "Manage categories" } }
                        li { a href=(format!("/events/{}/judges", event.id)) { "Manage judges" } }
                        li { a href=(format!("/events/{}/assignments", event.id)) { "Manage assignments" } }
                        li { a href=(format!("/events/{}/rounds", event.id)) { "Manage rounds" } }
                        li { a href=(format!("/events/{}/results", event.id)) { "Final results" } }
                        li { a href=(format!("/events/{}/edit", event.id)) { "Event settings" } }
                    }

                    form method="post"
                         action=(format!("/events/{}/delete", event.id))
                         class="mt-4" {
                        button type="submit" class="btn btn-danger" {
                            "Delete this event"
                        }
                    }
                }
            })
            .render(),
    )
}
