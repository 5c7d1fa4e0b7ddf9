use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{schema::scores, util_resp::FailureResponse};

pub mod aggregate;
pub mod normalize;
pub mod results;
pub mod submit;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 10.0;

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct Score {
    pub id: String,
    pub judge_id: String,
    pub team_id: String,
    pub category_id: Option<String>,
    pub round_id: String,
    pub criterion_name: String,
    pub value: f64,
    pub submitted_at: chrono::NaiveDateTime,
}

impl Score {
    pub fn all_of_round(
        round_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Score>, FailureResponse> {
        scores::table
            .filter(scores::round_id.eq(round_id))
            .load::<Score>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }

    pub fn of_judge_in_round(
        judge_id: &str,
        round_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Score>, FailureResponse> {
        scores::table
            .filter(
                scores::judge_id
                    .eq(judge_id)
                    .and(scores::round_id.eq(round_id)),
            )
            .load::<Score>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }
}
