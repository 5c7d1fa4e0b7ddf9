//! Converts each judge's raw scores into values comparable across judges.
//!
//! Judges use their scales differently: one may score everything 7–9, another
//! 2–8. Per judge and round we therefore z-score the (category-weighted) raw
//! team totals, rank them, and flag each judge's top teams for promotion to
//! round 2. The computation is a pure function of the round's score rows, so
//! recomputing with unchanged input rewrites identical rows.

use std::collections::HashMap;

use axum::{extract::Path, response::Redirect};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use hypertext::prelude::*;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::User,
    events::{
        Event,
        categories::Category,
        rounds::ScoringRound,
        scoring::Score,
    },
    permission::Permission,
    schema::normalized_scores,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, see_other_ok,
    },
    widgets::alert::ErrorAlert,
};

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct NormalizedScore {
    pub id: String,
    pub judge_id: String,
    pub team_id: String,
    pub round_id: String,
    pub raw_score: f64,
    pub normalized_score: f64,
    pub percentile: f64,
    pub rank: i64,
    pub selected_for_round2: bool,
}

/// One computed row, before it is given an id and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    pub judge_id: String,
    pub team_id: String,
    pub raw_score: f64,
    pub normalized_score: f64,
    pub percentile: f64,
    pub rank: i64,
    pub selected_for_round2: bool,
}

/// The normalization itself. `weight_of_category` maps category ids to their
/// weights; scores without a category (or with an unknown one) weigh 1.0.
/// Only round 1 selects teams for promotion.
pub fn compute_round_normalization(
    scores: &[Score],
    weight_of_category: &HashMap<String, f64>,
    round_number: i64,
    round2_slots: i64,
) -> Vec<NormalizedEntry> {
    // Raw score per (judge, team): criterion values summed, then weighted by
    // the team's category.
    let mut raw: HashMap<(String, String), (f64, f64)> = HashMap::new();
    for score in scores {
        let weight = score
            .category_id
            .as_ref()
            .and_then(|id| weight_of_category.get(id).copied())
            .unwrap_or(1.0);
        let entry = raw
            .entry((score.judge_id.clone(), score.team_id.clone()))
            .or_insert((0.0, weight));
        entry.0 += score.value;
        entry.1 = weight;
    }

    let mut by_judge: HashMap<String, Vec<(String, f64)>> = HashMap::new();
    for ((judge_id, team_id), (total, weight)) in raw {
        by_judge
            .entry(judge_id)
            .or_default()
            .push((team_id, total * weight));
    }

    let mut entries = Vec::new();

    for (judge_id, teams) in by_judge {
        let n = teams.len();
        let mean =
            teams.iter().map(|(_, raw)| raw).sum::<f64>() / n as f64;
        let variance = teams
            .iter()
            .map(|(_, raw)| (raw - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        let stddev = variance.sqrt();

        let normalized = teams
            .into_iter()
            .map(|(team_id, raw)| {
                // A judge who scored every team identically carries no
                // ordering information.
                let z = if stddev == 0.0 {
                    0.0
                } else {
                    (raw - mean) / stddev
                };
                (team_id, raw, z)
            })
            // Descending by normalized score, ties broken by team id so
            // reruns always agree.
            .sorted_by(|a, b| {
                b.2.partial_cmp(&a.2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            })
            .collect::<Vec<_>>();

        for (i, (team_id, raw, z)) in normalized.into_iter().enumerate() {
            let rank = (i + 1) as i64;
            let percentile = if n == 1 {
                100.0
            } else {
                (n as i64 - rank) as f64 / (n - 1) as f64 * 100.0
            };

            entries.push(NormalizedEntry {
                judge_id: judge_id.clone(),
                team_id,
                raw_score: raw,
                normalized_score: z,
                percentile,
                rank,
                selected_for_round2: round_number == 1 && rank <= round2_slots,
            });
        }
    }

    entries.sort_by(|a, b| {
        a.judge_id.cmp(&b.judge_id).then_with(|| a.rank.cmp(&b.rank))
    });

    entries
}

/// Replaces the round's normalized rows with a fresh computation. Runs in the
/// request transaction, so a failure part-way leaves the old rows in place.
pub fn recompute_for_round(
    event: &Event,
    round: &ScoringRound,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, FailureResponse> {
    let scores = Score::all_of_round(&round.id, conn)?;
    let weight_of_category: HashMap<String, f64> =
        Category::all_of_event(&event.id, conn)?
            .into_iter()
            .map(|c| (c.id, c.weight))
            .collect();

    let entries = compute_round_normalization(
        &scores,
        &weight_of_category,
        round.round_number,
        event.round2_slots,
    );

    diesel::delete(
        normalized_scores::table
            .filter(normalized_scores::round_id.eq(&round.id)),
    )
    .execute(conn)
    .map_err(|_| FailureResponse::ServerError(()))?;

    for entry in &entries {
        diesel::insert_into(normalized_scores::table)
            .values((
                normalized_scores::id.eq(Uuid::now_v7().to_string()),
                normalized_scores::judge_id.eq(&entry.judge_id),
                normalized_scores::team_id.eq(&entry.team_id),
                normalized_scores::round_id.eq(&round.id),
                normalized_scores::raw_score.eq(entry.raw_score),
                normalized_scores::normalized_score
                    .eq(entry.normalized_score),
                normalized_scores::percentile.eq(entry.percentile),
                normalized_scores::rank.eq(entry.rank),
                normalized_scores::selected_for_round2
                    .eq(entry.selected_for_round2),
            ))
            .execute(conn)
            .map_err(|_| FailureResponse::ServerError(()))?;
    }

    Ok(entries.len())
}

pub async fn do_normalize_round(
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

    if !round.is_completed() {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    ErrorAlert
                        msg="Scores can only be normalized once the round is
                             completed.";
                })
                .render(),
        );
    }

    let n = recompute_for_round(&event, &round, &mut *conn)?;

    tracing::info!(
        event = %event.id,
        round = round.round_number,
        rows = n,
        "normalized round scores"
    );

    see_other_ok(Redirect::to(&format!("/events/{}/rounds", event.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn score(judge: &str, team: &str, criterion: &str, value: f64) -> Score {
        Score {
            id: format!("{judge}-{team}-{criterion}"),
            judge_id: judge.to_string(),
            team_id: team.to_string(),
            category_id: None,
            round_id: "round1".to_string(),
            criterion_name: criterion.to_string(),
            value,
            submitted_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn z_scores_are_centered_and_ranked() {
        let scores = vec![
            score("j1", "a", "Overall", 2.0),
            score("j1", "b", "Overall", 4.0),
            score("j1", "c", "Overall", 6.0),
        ];

        let entries =
            compute_round_normalization(&scores, &HashMap::new(), 1, 2);

        assert_eq!(entries.len(), 3);
        // mean 4, population stddev sqrt(8/3)
        let by_team: HashMap<_, _> = entries
            .iter()
            .map(|e| (e.team_id.as_str(), e))
            .collect();
        assert!(by_team["b"].normalized_score.abs() < 1e-12);
        assert!(by_team["c"].normalized_score > 0.0);
        assert!(by_team["a"].normalized_score < 0.0);
        assert_eq!(by_team["c"].rank, 1);
        assert_eq!(by_team["b"].rank, 2);
        assert_eq!(by_team["a"].rank, 3);
        assert_eq!(by_team["c"].percentile, 100.0);
        assert_eq!(by_team["b"].percentile, 50.0);
        assert_eq!(by_team["a"].percentile, 0.0);
    }

    #[test]
    fn criterion_values_sum_before_weighting() {
        let mut weights = HashMap::new();
        weights.insert("cat".to_string(), 2.0);

        let mut scores = vec![
            score("j1", "a", "Design", 3.0),
            score("j1", "a", "Execution", 4.0),
        ];
        for s in &mut scores {
            s.category_id = Some("cat".to_string());
        }

        let entries = compute_round_normalization(&scores, &weights, 1, 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_score, 14.0);
    }

    #[test]
    fn top_n_per_judge_selected_in_round_1_only() {
        let scores = vec![
            score("j1", "a", "Overall", 9.0),
            score("j1", "b", "Overall", 7.0),
            score("j1", "c", "Overall", 5.0),
            score("j1", "d", "Overall", 3.0),
            score("j2", "a", "Overall", 1.0),
            score("j2", "b", "Overall", 8.0),
        ];

        let entries =
            compute_round_normalization(&scores, &HashMap::new(), 1, 2);

        let selected: Vec<_> = entries
            .iter()
            .filter(|e| e.selected_for_round2)
            .map(|e| (e.judge_id.as_str(), e.team_id.as_str()))
            .collect();
        assert_eq!(
            selected,
            vec![("j1", "a"), ("j1", "b"), ("j2", "b"), ("j2", "a")]
        );

        let round2 =
            compute_round_normalization(&scores, &HashMap::new(), 2, 2);
        assert!(round2.iter().all(|e| !e.selected_for_round2));
    }

    #[test]
    fn equal_scores_get_zero_and_tie_break_by_team_id() {
        let scores = vec![
            score("j1", "b", "Overall", 5.0),
            score("j1", "a", "Overall", 5.0),
        ];

        let entries =
            compute_round_normalization(&scores, &HashMap::new(), 1, 1);

        assert!(entries.iter().all(|e| e.normalized_score == 0.0));
        let first = entries.iter().find(|e| e.rank == 1).unwrap();
        assert_eq!(first.team_id, "a");
        assert!(first.selected_for_round2);
    }

    #[test]
    fn recomputation_is_deterministic() {
        let scores = vec![
            score("j1", "a", "Overall", 2.5),
            score("j1", "b", "Overall", 7.5),
            score("j2", "a", "Overall", 4.0),
            score("j2", "b", "Overall", 4.0),
        ];

        let first =
            compute_round_normalization(&scores, &HashMap::new(), 1, 1);
        let second =
            compute_round_normalization(&scores, &HashMap::new(), 1, 1);
        assert_eq!(first, second);
    }
}
