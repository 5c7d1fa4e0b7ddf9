//! Combines round-2 normalized scores into the event's final standings.
//!
//! Each team's final score is the mean of its normalized scores across the
//! judges who scored it. Alongside the ranking we store a judge-agreement
//! signal: the mean pairwise Spearman correlation between judges' rankings,
//! carried on every result row.

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
        rounds::ScoringRound,
        scoring::normalize::NormalizedScore,
    },
    permission::Permission,
    schema::{final_results, normalized_scores},
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, bad_request, see_other_ok,
    },
    widgets::alert::ErrorAlert,
};

#[derive(Serialize, Deserialize, Queryable, Clone, Debug)]
pub struct FinalResult {
    pub id: String,
    pub event_id: String,
    pub team_id: String,
    pub final_score: f64,
    pub final_rank: i64,
    pub correlation_coefficient: f64,
}

impl FinalResult {
    pub fn all_of_event(
        event_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<FinalResult>, FailureResponse> {
        final_results::table
            .filter(final_results::event_id.eq(event_id))
            .order_by(final_results::final_rank.asc())
            .load::<FinalResult>(conn)
            .map_err(|_| FailureResponse::ServerError(()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalEntry {
    pub team_id: String,
    pub final_score: f64,
    pub final_rank: i64,
}

/// Ranks with ties averaged, over descending values (best team gets the
/// lowest rank number).
fn rank_with_ties(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j hold equal values; all get the average rank.
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    ranks
}

/// Spearman rank correlation: Pearson correlation over tie-averaged ranks.
/// `None` when either side has no variance (the coefficient is undefined).
fn spearman(a: &[f64], b: &[f64]) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len());
    if a.len() < 2 {
        return None;
    }

    let ra = rank_with_ties(a);
    let rb = rank_with_ties(b);

    let n = ra.len() as f64;
    let mean_a = ra.iter().sum::<f64>() / n;
    let mean_b = rb.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in ra.iter().zip(&rb) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }

    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Mean pairwise Spearman correlation between judges' scores of their common
/// teams. Judge pairs with fewer than two teams in common are skipped; if no
/// pair qualifies the coefficient is 0.0.
pub fn inter_judge_agreement(rows: &[NormalizedScore]) -> f64 {
    let mut scores_of_judge: HashMap<&str, HashMap<&str, f64>> =
        HashMap::new();
    for row in rows {
        scores_of_judge
            .entry(&row.judge_id)
            .or_default()
            .insert(&row.team_id, row.normalized_score);
    }

    let judges: Vec<&str> = scores_of_judge.keys().copied().sorted().collect();

    let mut total = 0.0;
    let mut pairs = 0;
    for (i, a) in judges.iter().enumerate() {
        for b in &judges[i + 1..] {
            let scores_a = &scores_of_judge[a];
            let scores_b = &scores_of_judge[b];

            let common: Vec<&str> = scores_a
                .keys()
                .filter(|team| scores_b.contains_key(**team))
                .copied()
                .sorted()
                .collect();
            if common.len() < 2 {
                continue;
            }

            let xs: Vec<f64> =
                common.iter().map(|team| scores_a[*team]).collect();
            let ys: Vec<f64> =
                common.iter().map(|team| scores_b[*team]).collect();

            if let Some(rho) = spearman(&xs, &ys) {
                total += rho;
                pairs += 1;
            }
        }
    }

    if pairs == 0 { 0.0 } else { total / pairs as f64 }
}

/// Final standings from round-2 normalized rows. Strictly ordered: ranks are
/// 1..=n with ties broken by team id, so no two teams ever share a rank.
pub fn compute_final_entries(rows: &[NormalizedScore]) -> Vec<FinalEntry> {
    let mut scores_of_team: HashMap<&str, Vec<f64>> = HashMap::new();
    for row in rows {
        scores_of_team
            .entry(&row.team_id)
            .or_default()
            .push(row.normalized_score);
    }

    scores_of_team
        .into_iter()
        .map(|(team_id, scores)| {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            (team_id.to_string(), mean)
        })
        .sorted_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        })
        .enumerate()
        .map(|(i, (team_id, final_score))| FinalEntry {
            team_id,
            final_score,
            final_rank: (i + 1) as i64,
        })
        .collect()
}

/// Replaces the event's final results from the current round-2 normalized
/// rows. Idempotent for unchanged input.
pub fn recompute_final_results(
    event: &Event,
    round2: &ScoringRound,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, FailureResponse> {
    let rows = normalized_scores::table
        .filter(normalized_scores::round_id.eq(&round2.id))
        .load::<NormalizedScore>(conn)
        .map_err(|_| FailureResponse::ServerError(()))?;

    let agreement = inter_judge_agreement(&rows);
    let entries = compute_final_entries(&rows);

    diesel::delete(
        final_results::table.filter(final_results::event_id.eq(&event.id)),
    )
    .execute(conn)
    .map_err(|_| FailureResponse::ServerError(()))?;

    for entry in &entries {
        diesel::insert_into(final_results::table)
            .values((
                final_results::id.eq(Uuid::now_v7().to_string()),
                final_results::event_id.eq(&event.id),
                final_results::team_id.eq(&entry.team_id),
                final_results::final_score.eq(entry.final_score),
                final_results::final_rank.eq(entry.final_rank),
                final_results::correlation_coefficient.eq(agreement),
            ))
            .execute(conn)
            .map_err(|_| FailureResponse::ServerError(()))?;
    }

    Ok(entries.len())
}

pub async fn do_compute_results(
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

    let round2 = ScoringRound::of_number(&event.id, 2, &mut *conn)?;
    if !round2.is_completed() {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    ErrorAlert
                        msg="Round 2 must be completed before final results
                             can be computed.";
                })
                .render(),
        );
    }

    let has_normalized = diesel::select(diesel::dsl::exists(
        normalized_scores::table
            .filter(normalized_scores::round_id.eq(&round2.id)),
    ))
    .get_result::<bool>(&mut *conn)
    .map_err(|_| FailureResponse::ServerError(()))?;
    if !has_normalized {
        return bad_request(
            Page::new()
                .user(user)
                .event(event)
                .body(maud! {
                    ErrorAlert
                        msg="Round 2 has no normalized scores yet. Normalize
                             it first.";
                })
                .render(),
        );
    }

    let n = recompute_final_results(&event, &round2, &mut *conn)?;

    tracing::info!(event = %event.id, teams = n, "computed final results");

    see_other_ok(Redirect::to(&format!("/events/{}/results", event.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(judge: &str, team: &str, normalized: f64) -> NormalizedScore {
        NormalizedScore {
            id: format!("{judge}-{team}"),
            judge_id: judge.to_string(),
            team_id: team.to_string(),
            round_id: "round2".to_string(),
            raw_score: 0.0,
            normalized_score: normalized,
            percentile: 0.0,
            rank: 0,
            selected_for_round2: false,
        }
    }

    #[test]
    fn final_scores_are_means_and_ranks_are_strict() {
        let rows = vec![
            row("j1", "a", 1.0),
            row("j2", "a", 0.0),
            row("j1", "b", 0.5),
            row("j2", "b", 0.5),
            row("j1", "c", -1.0),
        ];

        let entries = compute_final_entries(&rows);

        assert_eq!(entries.len(), 3);
        // a and b both average 0.5; the tie breaks towards the smaller id.
        assert_eq!(entries[0].team_id, "a");
        assert_eq!(entries[0].final_rank, 1);
        assert_eq!(entries[1].team_id, "b");
        assert_eq!(entries[1].final_rank, 2);
        assert_eq!(entries[2].team_id, "c");
        assert_eq!(entries[2].final_rank, 3);

        let ranks: Vec<i64> =
            entries.iter().map(|e| e.final_rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn agreement_is_one_for_identical_orderings() {
        let rows = vec![
            row("j1", "a", 2.0),
            row("j1", "b", 1.0),
            row("j1", "c", 0.0),
            row("j2", "a", 9.0),
            row("j2", "b", 5.0),
            row("j2", "c", 1.0),
        ];

        assert!((inter_judge_agreement(&rows) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn agreement_is_minus_one_for_opposite_orderings() {
        let rows = vec![
            row("j1", "a", 2.0),
            row("j1", "b", 1.0),
            row("j1", "c", 0.0),
            row("j2", "a", 0.0),
            row("j2", "b", 1.0),
            row("j2", "c", 2.0),
        ];

        assert!((inter_judge_agreement(&rows) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_judges_yield_zero_agreement() {
        let rows = vec![
            row("j1", "a", 1.0),
            row("j1", "b", 0.0),
            row("j2", "c", 1.0),
            row("j2", "d", 0.0),
        ];

        assert_eq!(inter_judge_agreement(&rows), 0.0);
    }

    #[test]
    fn tied_ranks_are_averaged() {
        assert_eq!(
            rank_with_ties(&[3.0, 1.0, 1.0, 0.0]),
            vec![1.0, 2.5, 2.5, 4.0]
        );
    }
}
