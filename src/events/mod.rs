use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{
    permission::Permission,
    schema::{event_members, events},
    util_resp::FailureResponse,
};

pub mod assignments;
pub mod categories;
pub mod create;
pub mod delete;
pub mod edit;
pub mod judges;
pub mod rounds;
pub mod scoring;
pub mod teams;
pub mod view;

pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_ARCHIVED: &str = "archived";

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub status: String,
    pub starts_on: Option<chrono::NaiveDate>,
    pub ends_on: Option<chrono::NaiveDate>,
    pub round2_slots: i64,
    pub created_at: chrono::NaiveDateTime,
}

impl Event {
    #[tracing::instrument(skip(conn))]
    pub fn fetch(
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Event, FailureResponse> {
        events::table
            .filter(events::id.eq(event_id))
            .first::<Event>(conn)
            .optional()
            .map_err(|_| FailureResponse::ServerError(()))?
            .ok_or(FailureResponse::NotFound(()))
    }

    /// All management actions require organizer membership, whatever the
    /// specific permission asked for.
    pub fn check_user_has_permission(
        &self,
        user_id: &str,
        permission: Permission,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<(), FailureResponse> {
        let is_organizer = diesel::select(diesel::dsl::exists(
            event_members::table.filter(
                event_members::user_id
                    .eq(user_id)
                    .and(event_members::event_id.eq(&self.id))
                    .and(event_members::is_organizer.eq(true)),
            ),
        ))
        .get_result::<bool>(conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

        if is_organizer {
            Ok(())
        } else {
            tracing::debug!(?permission, "user lacks organizer membership");
            Err(FailureResponse::Unauthorized(()))
        }
    }
}
