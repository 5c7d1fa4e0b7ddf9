use axum::{extract::Path, response::Redirect};
use diesel::prelude::*;

use crate::{
    auth::User,
    events::Event,
    permission::Permission,
    schema::events,
    state::Conn,
    util_resp::{FailureResponse, StandardResponse, see_other_ok},
};

/// Deleting an event removes every descendant row (categories, teams, judges,
/// assignments, rounds, scores, normalized scores, final results) through the
/// `ON DELETE CASCADE` chain; the pool enables `PRAGMA foreign_keys` so
/// SQLite actually honors it.
pub async fn do_delete_event(
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

    let n = diesel::delete(events::table.filter(events::id.eq(&event.id)))
        .execute(&mut *conn)
        .map_err(|_| FailureResponse::ServerError(()))?;
    assert_eq!(n, 1);

    tracing::info!(event = %event.id, "deleted event and all descendants");

    see_other_ok(Redirect::to("/"))
}
