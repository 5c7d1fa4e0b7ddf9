use axum::{extract::Form, response::Redirect};
use chrono::Utc;
use diesel::prelude::*;
use hypertext::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::User;
use crate::events::{STATUS_DRAFT, rounds};
use crate::schema::{event_members, events, scoring_rounds};
use crate::state::Conn;
use crate::template::Page;
use crate::util_resp::{
    FailureResponse, StandardResponse, SuccessResponse, bad_request,
    see_other_ok,
};
use crate::validation::is_valid_slug;

pub async fn create_event_page(user: User<true>) -> SuccessResponse {
    SuccessResponse::Success(
        Page::new()
            .user(user)
            .body(maud! {
                form method="post" {
                    div class="mb-3" {
                        label for = "eventName" class="form-label" {
                            "Event name"
                        }
                        input type = "text"
                              class = "form-control"
                              id = "eventName"
                              aria-describedby="eventNameHelp"
                              minlength = "4"
                              maxlength = "64"
                              required
                              name="name";
                        div id = "eventNameHelp" class="form-text" {
                            "The full name of the event."
                        }
                    }
                    div class="mb-3" {
                        label for = "eventSlug" class="form-label" {
                            "Event slug"
                        }
                        input type = "text"
                                class = "form-control"
                                id = "eventSlug"
                                aria-describedby="eventSlugHelp"
                                required
                                pattern = "[a-zA-Z0-9_]+"
                                name="slug";
                        div id = "eventSlugHelp" class="form-text" {
                            "A unique identifier for the event, used in URLs."
                        }
                    }
                    div class="mb-3" {
                        label for = "startsOn" class="form-label" {
                            "First day"
                        }
                        input type = "date" class = "form-control"
                              id = "startsOn" name="starts_on";
                    }
                    div class="mb-3" {
                        label for = "endsOn" class="form-label" {
                            "Last day"
                        }
                        input type = "date" class = "form-control"
                              id = "endsOn" name="ends_on";
                    }
                    div class="mb-3" {
                        label for = "round2Slots" class="form-label" {
                            "Finalists per judge"
                        }
                        input type = "number" class = "form-control"
                              id = "round2Slots" min="1" value="3"
                              name="round2_slots";
                        div class="form-text" {
                            "How many of each judge's top-ranked teams advance
                             to round 2."
                        }
                    }
                    button type="submit" class="btn btn-primary" {
                        "Submit"
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct CreateEventForm {
    name: String,
    slug: String,
    // Unfilled date inputs arrive as empty strings, so these cannot be
    // deserialized directly into `NaiveDate`.
    starts_on: Option<String>,
    ends_on: Option<String>,
    round2_slots: i64,
}

pub(super) fn parse_date(
    input: &Option<String>,
) -> Result<Option<chrono::NaiveDate>, ()> {
    match input.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<chrono::NaiveDate>().map(Some).map_err(|_| ()),
    }
}

pub async fn do_create_event(
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<CreateEventForm>,
) -> StandardResponse {
    let eid = Uuid::now_v7().to_string();

    if !(4..=64).contains(&form.name.len()) {
        return bad_request(
            maud! {p {"Event name must be between 4 and 64 characters."}}
                .render(),
        );
    }
    if let Err(e) = is_valid_slug(&form.slug) {
        return bad_request(maud! {p {(e)}}.render());
    }
    if form.round2_slots < 1 {
        return bad_request(
            maud! {p {"At least one team per judge must advance to round 2."}}
                .render(),
        );
    }
    let (starts_on, ends_on) =
        match (parse_date(&form.starts_on), parse_date(&form.ends_on)) {
            (Ok(s), Ok(e)) => (s, e),
            _ => {
                return bad_request(
                    maud! {p {"Dates must be in YYYY-MM-DD format."}}.render(),
                );
            }
        };
    if let (Some(start), Some(end)) = (starts_on, ends_on) {
        if end < start {
            return bad_request(
                maud! {p {"The event cannot end before it starts."}}.render(),
            );
        }
    }

    let slug_taken = diesel::select(diesel::dsl::exists(
        events::table.filter(events::slug.eq(&form.slug)),
    ))
    .get_result::<bool>(&mut *conn)
    .map_err(|_| FailureResponse::ServerError(()))?;
    if slug_taken {
        return bad_request(
            maud! {p {"That slug is already in use."}}.render(),
        );
    }

    let n = diesel::insert_into(events::table)
        .values((
            events::id.eq(&eid),
            events::name.eq(&form.name),
            events::slug.eq(&form.slug),
            events::status.eq(STATUS_DRAFT),
            events::starts_on.eq(starts_on),
            events::ends_on.eq(ends_on),
            events::round2_slots.eq(form.round2_slots),
            events::created_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    assert_eq!(n, 1);

    let n = diesel::insert_into(event_members::table)
        .values((
            event_members::id.eq(Uuid::now_v7().to_string()),
            event_members::user_id.eq(user.id),
            event_members::event_id.eq(&eid),
            event_members::is_organizer.eq(true),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    assert_eq!(n, 1);

    // Both scoring rounds exist from the start; they open one at a time.
    for round_number in [1i64, 2] {
        diesel::insert_into(scoring_rounds::table)
            .values((
                scoring_rounds::id.eq(Uuid::now_v7().to_string()),
                scoring_rounds::event_id.eq(&eid),
                scoring_rounds::round_number.eq(round_number),
                scoring_rounds::status.eq(rounds::STATUS_PENDING),
            ))
            .execute(&mut *conn)
            .map_err(|_| FailureResponse::ServerError(()))?;
    }

    see_other_ok(Redirect::to(&format!("/events/{eid}")))
}
