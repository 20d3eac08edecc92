use std::collections::HashSet;

use donasiin_shared::api::{DashboardStatsDto, ReviewView};
use donasiin_shared::domain::{Donation, DonationStatus, now_utc};
use tracing::info;

use super::ServiceError;
use crate::backend::{Backend, DonationQuery};

/// Dashboard counters over every donation regardless of the selected view.
pub fn dashboard_stats(all: &[Donation]) -> DashboardStatsDto {
    let verified = all.iter().filter(|d| d.status == DonationStatus::Success);
    let mut donors = HashSet::new();
    let mut total_amount = 0i64;
    for d in verified {
        total_amount += d.amount;
        donors.insert(d.phone_number.as_str());
    }
    DashboardStatsDto {
        total_donations: all.len(),
        pending_donations: all
            .iter()
            .filter(|d| d.status == DonationStatus::Pending)
            .count(),
        total_amount,
        total_donors: donors.len(),
    }
}

pub struct ReviewList {
    pub view: ReviewView,
    pub stats: DashboardStatsDto,
    pub donations: Vec<Donation>,
}

pub async fn list(backend: &Backend, view: ReviewView, bearer: &str) -> Result<ReviewList, ServiceError> {
    let all = backend
        .records
        .list_donations(&DonationQuery::default(), Some(bearer))
        .await?;
    let stats = dashboard_stats(&all);
    let donations = match view {
        ReviewView::All => all,
        ReviewView::Pending => all
            .into_iter()
            .filter(|d| d.status == DonationStatus::Pending)
            .collect(),
    };
    Ok(ReviewList {
        view,
        stats,
        donations,
    })
}

/// Approves or rejects a pending donation, then reloads the full list.
pub async fn decide(
    backend: &Backend,
    id: &str,
    decision: DonationStatus,
    reviewer: &str,
    bearer: &str,
) -> Result<ReviewList, ServiceError> {
    if !DonationStatus::Pending.can_transition_to(decision) {
        return Err(ServiceError::Invalid(format!(
            "cannot move a donation to {decision}"
        )));
    }
    let updated = backend
        .records
        .verify_donation(id, decision, now_utc(), bearer)
        .await?;
    let Some(donation) = updated else {
        return match backend.records.get_donation(id, Some(bearer)).await? {
            None => Err(ServiceError::NotFound(id.to_string())),
            Some(current) => Err(ServiceError::Conflict {
                id: id.to_string(),
                status: current.status,
            }),
        };
    };
    info!(
        donation_id = %donation.id,
        status = %donation.status,
        amount = donation.amount,
        reviewer,
        "donation reviewed"
    );
    list(backend, ReviewView::All, bearer).await
}
