//! Event settings. The slug is fixed at creation (it is the event's public
//! URL handle); everything else can be changed here.

use axum::{
    extract::{Form, Path},
    response::Redirect,
};
use diesel::prelude::*;
use hypertext::prelude::*;
use serde::Deserialize;

use crate::auth::User;
use crate::events::{
    Event, STATUS_ACTIVE, STATUS_ARCHIVED, STATUS_DRAFT, create::parse_date,
};
use crate::permission::Permission;
use crate::schema::events;
use crate::state::Conn;
use crate::template::Page;
use crate::util_resp::{
    FailureResponse, StandardResponse, bad_request, see_other_ok, success,
};

pub async fn edit_event_page(
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

    let date_value = |d: &Option<chrono::NaiveDate>| -> String {
        d.map(|d| d.to_string()).unwrap_or_default()
    };

    success(
        Page::new()
            .user(user)
            .event(event.clone())
            .body(maud! {
                div class="container py-4" style="max-width: 600px;" {
                    h1 { "Event settings" }
                    p class="text-muted" { "Slug: " code { (event.slug) } }

                    form method="post" {
                        div class="mb-3" {
                            label for="eventName" class="form-label" {
                                "Event name"
                            }
                            input type="text" class="form-control"
                                  id="eventName" minlength="4" maxlength="64"
                                  required name="name" value=(event.name);
                        }
                        div class="mb-3" {
                            label for="eventStatus" class="form-label" {
                                "Status"
                            }
                            select class="form-select" id="eventStatus"
                                   name="status" {
                                @for status in [STATUS_DRAFT, STATUS_ACTIVE, STATUS_ARCHIVED] {
                                    option value=(status)
                                           selected[event.status == status] {
                                        (status)
                                    }
                                }
                            }
                        }
                        div class="mb-3" {
                            label for="startsOn" class="form-label" {
                                "First day"
                            }
                            input type="date" class="form-control"
                                  id="startsOn" name="starts_on"
                                  value=(date_value(&event.starts_on));
                        }
                        div class="mb-3" {
                            label for="endsOn" class="form-label" {
                                "Last day"
                            }
                            input type="date" class="form-control"
                                  id="endsOn" name="ends_on"
                                  value=(date_value(&event.ends_on));
                        }
                        div class="mb-3" {
                            label for="round2Slots" class="form-label" {
                                "Finalists per judge"
                            }
                            input type="number" class="form-control"
                                  id="round2Slots" min="1"
                                  name="round2_slots"
                                  value=(event.round2_slots);
                        }
                        button type="submit" class="btn btn-primary" {
                            "Save"
                        }
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct EditEventForm {
    pub name: String,
    pub status: String,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub round2_slots: i64,
}

pub async fn do_edit_event(
    Path(event_id): Path<String>,
    user: User<true>,
    mut conn: Conn<true>,
    Form(form): Form<EditEventForm>,
) -> StandardResponse {
    let event = Event::fetch(&event_id, &mut *conn)?;
    event.check_user_has_permission(
        &user.id,
        Permission::ManageEvent,
        &mut *conn,
    )?;

    if !(4..=64).contains(&form.name.len()) {
        return bad_request(
            maud! {p {"Event name must be between 4 and 64 characters."}}
                .render(),
        );
    }
    if ![STATUS_DRAFT, STATUS_ACTIVE, STATUS_ARCHIVED]
        .contains(&form.status.as_str())
    {
        return bad_request(maud! {p {"Unknown event status."}}.render());
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

    diesel::update(events::table.filter(events::id.eq(&event.id)))
        .set((
            events::name.eq(&form.name),
            events::status.eq(&form.status),
            events::starts_on.eq(starts_on),
            events::ends_on.eq(ends_on),
            events::round2_slots.eq(form.round2_slots),
        ))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    see_other_ok(Redirect::to(&format!("/events/{}", event.id)))
}
