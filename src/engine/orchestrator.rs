use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::finder::{MatchCandidates, find_matches};
use crate::error::AppError;
use crate::models::emergency::EmergencyStatus;
use crate::models::matching::{Feedback, Helper, Match, MatchStatus};
use crate::state::AppState;
use crate::store::{Claim, Store};

pub const NO_MATCHES_MESSAGE: &str = "No suitable matches found";

#[derive(Debug, Clone)]
pub struct AutoMatchOutcome {
    pub success: bool,
    pub match_ids: Vec<Uuid>,
    pub message: String,
}

pub async fn find(state: &AppState, emergency_id: Uuid) -> Result<MatchCandidates, AppError> {
    let start = Instant::now();
    let result = find_matches(state.store.as_ref(), emergency_id).await;
    state.metrics.observe_match_action("find", start, result.is_ok());
    result
}

/// Picks the helper for a manual match. When both ids are given the volunteer wins.
pub fn resolve_helper(volunteer_id: Option<Uuid>, business_id: Option<Uuid>) -> Result<Helper, AppError> {
    match (volunteer_id, business_id) {
        (Some(volunteer_id), Some(business_id)) => {
            warn!(%volunteer_id, %business_id, "both helpers supplied; matching the volunteer");
            Ok(Helper::Volunteer(volunteer_id))
        }
        (Some(volunteer_id), None) => Ok(Helper::Volunteer(volunteer_id)),
        (None, Some(business_id)) => Ok(Helper::Business(business_id)),
        (None, None) => Err(AppError::BadRequest(
            "either volunteerId or businessId is required".to_string(),
        )),
    }
}

pub async fn create(state: &AppState, emergency_id: Uuid, helper: Helper) -> Result<Match, AppError> {
    let start = Instant::now();
    let result = create_match(state, emergency_id, helper, None).await;
    state.metrics.observe_match_action("create", start, result.is_ok());
    result
}

pub async fn auto(state: &AppState, emergency_id: Uuid) -> Result<AutoMatchOutcome, AppError> {
    let start = Instant::now();
    let result = auto_match(state, emergency_id).await;
    state
        .metrics
        .observe_match_action("auto", start, result.as_ref().is_ok_and(|outcome| outcome.success));
    result
}

async fn auto_match(state: &AppState, emergency_id: Uuid) -> Result<AutoMatchOutcome, AppError> {
    let candidates = find_matches(state.store.as_ref(), emergency_id).await?;

    let mut picks = Vec::new();
    if let Some(top) = candidates.volunteers.first() {
        picks.push((Helper::Volunteer(top.volunteer.id), top.score));
    }
    if let Some(top) = candidates.businesses.first() {
        picks.push((Helper::Business(top.business.id), top.score));
    }

    if picks.is_empty() {
        info!(%emergency_id, "auto-match found no candidates");
        return Ok(AutoMatchOutcome {
            success: false,
            match_ids: Vec::new(),
            message: NO_MATCHES_MESSAGE.to_string(),
        });
    }

    // Each branch commits or compensates on its own; one failing does not undo the other.
    let mut match_ids = Vec::new();
    let mut failures = Vec::new();
    for (helper, score) in picks {
        match create_match(state, emergency_id, helper, Some(score)).await {
            Ok(record) => match_ids.push(record.id),
            Err(err) => {
                warn!(%emergency_id, helper = helper.kind(), error = %err, "auto-match branch failed");
                failures.push(format!("{}: {err}", helper.kind()));
            }
        }
    }

    if match_ids.is_empty() {
        return Ok(AutoMatchOutcome {
            success: false,
            match_ids,
            message: format!("Failed to create matches ({})", failures.join("; ")),
        });
    }

    Ok(AutoMatchOutcome {
        success: true,
        message: format!("Successfully matched with {} helper(s)", match_ids.len()),
        match_ids,
    })
}

/// Claim helper, insert match, mark emergency matched; undo completed steps on failure.
async fn create_match(
    state: &AppState,
    emergency_id: Uuid,
    helper: Helper,
    score: Option<u32>,
) -> Result<Match, AppError> {
    let store = state.store.as_ref();

    if store.get_emergency(emergency_id).await?.is_none() {
        return Err(AppError::NotFound(format!("emergency {emergency_id} not found")));
    }

    let claim = match helper {
        Helper::Volunteer(id) => store.claim_volunteer(id).await?,
        Helper::Business(id) => store.claim_business(id).await?,
    };
    match claim {
        Claim::Claimed => {}
        Claim::Unavailable => {
            return Err(AppError::Conflict(format!(
                "{} {} is not available",
                helper.kind(),
                helper.id()
            )));
        }
        Claim::Missing => {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                helper.kind(),
                helper.id()
            )));
        }
    }

    let record = Match {
        id: Uuid::new_v4(),
        emergency_id,
        helper,
        score,
        status: MatchStatus::Pending,
        created_at: Utc::now(),
        accepted_at: None,
        completed_at: None,
        feedback: None,
    };

    if let Err(err) = store.insert_match(record.clone()).await {
        release_helper(store, helper).await;
        return Err(err.into());
    }

    let marked = store
        .set_emergency_status(emergency_id, EmergencyStatus::Matched)
        .await;
    if !matches!(marked, Ok(true)) {
        let mut cancelled = record.clone();
        cancelled.status = MatchStatus::Cancelled;
        if let Err(err) = store.update_match(cancelled).await {
            error!(match_id = %record.id, error = %err, "failed to cancel match during rollback");
        }
        release_helper(store, helper).await;

        return Err(match marked {
            Err(err) => err.into(),
            _ => AppError::NotFound(format!("emergency {emergency_id} not found")),
        });
    }

    state.metrics.matches_created_total.with_label_values(&[helper.kind()]).inc();
    info!(
        match_id = %record.id,
        %emergency_id,
        helper = helper.kind(),
        helper_id = %helper.id(),
        score = ?score,
        "match created"
    );

    Ok(record)
}

async fn release_helper(store: &dyn Store, helper: Helper) {
    let released = match helper {
        Helper::Volunteer(id) => store.release_volunteer(id).await,
        Helper::Business(id) => store.release_business(id).await,
    };

    if let Err(err) = released {
        error!(helper = helper.kind(), helper_id = %helper.id(), error = %err, "failed to release helper");
    }
}

pub async fn update_status(
    state: &AppState,
    match_id: Uuid,
    status: MatchStatus,
    feedback: Option<Feedback>,
) -> Result<Match, AppError> {
    let store = state.store.as_ref();

    let mut record = store
        .get_match(match_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("match {match_id} not found")))?;

    if !record.status.can_transition_to(status) {
        return Err(AppError::Conflict(format!(
            "match {match_id} cannot move from {:?} to {:?}",
            record.status, status
        )));
    }

    let now = Utc::now();
    record.status = status;
    match status {
        MatchStatus::Accepted => record.accepted_at = Some(now),
        MatchStatus::Completed => record.completed_at = Some(now),
        _ => {}
    }
    if feedback.is_some() {
        record.feedback = feedback;
    }

    if !store.update_match(record.clone()).await? {
        return Err(AppError::NotFound(format!("match {match_id} not found")));
    }

    if status.releases_helper() {
        release_helper(store, record.helper).await;
    }

    if status == MatchStatus::Accepted {
        if let Err(err) = store
            .set_emergency_status(record.emergency_id, EmergencyStatus::InProgress)
            .await
        {
            warn!(emergency_id = %record.emergency_id, error = %err, "failed to mark emergency in progress");
        }
    }

    info!(%match_id, status = ?status, "match status updated");
    Ok(record)
}
