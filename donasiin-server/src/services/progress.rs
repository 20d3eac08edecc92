use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use donasiin_shared::api::WeeklyProgressDto;
use donasiin_shared::domain::{WeeklyTarget, WeeklyTotals, progress_percentage};
use donasiin_shared::week::{WeekWindow, local_date};
use futures::future::try_join_all;
use tracing::info;

use super::ServiceError;
use crate::backend::Backend;

/// Number of past weeks shown in the history view.
pub const HISTORY_WEEKS: usize = 4;

pub fn progress_for(window: WeekWindow, target: i64, totals: WeeklyTotals) -> WeeklyProgressDto {
    let current = totals.amount;
    let average = if totals.donor_count > 0 {
        (current as f64 / totals.donor_count as f64).round() as i64
    } else {
        0
    };
    WeeklyProgressDto {
        week_start: window.start.to_string(),
        week_end: window.end.to_string(),
        target_amount: target,
        current_amount: current,
        donor_count: totals.donor_count,
        percentage: progress_percentage(current, target),
        remaining_amount: (target - current).max(0),
        average_donation: average,
    }
}

/// Progress of the fundraising week containing `now` in `tz`.
pub async fn current_week(
    backend: &Backend,
    tz: Tz,
    fallback_target: i64,
    now: DateTime<Utc>,
) -> Result<WeeklyProgressDto, ServiceError> {
    let window = WeekWindow::containing(local_date(&tz, now));
    let (start, end) = window.utc_bounds(&tz);
    let (target, totals) = futures::try_join!(
        backend.records.weekly_target(window.start),
        backend.records.weekly_totals(start, end)
    )?;
    let target = target.map_or(fallback_target, |t| t.target_amount);
    Ok(progress_for(window, target, totals))
}

/// Progress for the most recent configured weeks, newest first.
pub async fn history(backend: &Backend, tz: Tz) -> Result<Vec<WeeklyProgressDto>, ServiceError> {
    let targets = backend.records.recent_weekly_targets(HISTORY_WEEKS).await?;
    let weeks = targets.into_iter().map(|t| async move {
        let window = WeekWindow::new(t.week_start, t.week_end);
        let (start, end) = window.utc_bounds(&tz);
        let totals = backend.records.weekly_totals(start, end).await?;
        Ok::<_, ServiceError>(progress_for(window, t.target_amount, totals))
    });
    try_join_all(weeks).await
}

pub async fn set_weekly_target(
    backend: &Backend,
    week_start: NaiveDate,
    week_end: NaiveDate,
    target_amount: i64,
    bearer: &str,
) -> Result<WeeklyTarget, ServiceError> {
    if week_end < week_start {
        return Err(ServiceError::invalid("week_end must not be before week_start"));
    }
    if target_amount <= 0 {
        return Err(ServiceError::invalid("target_amount must be positive"));
    }
    let target = WeeklyTarget {
        week_start,
        week_end,
        target_amount,
    };
    let saved = backend
        .records
        .upsert_weekly_target(&target, bearer)
        .await?;
    info!(week_start = %saved.week_start, target = saved.target_amount, "weekly target saved");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> WeekWindow {
        WeekWindow::new(
            NaiveDate::from_ymd_opt(2026, 10, 10).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        )
    }

    #[test]
    fn derives_remaining_and_average() {
        let p = progress_for(
            window(),
            1_000_000,
            WeeklyTotals {
                amount: 250_000,
                donor_count: 3,
            },
        );
        assert_eq!(p.week_start, "2026-10-10");
        assert_eq!(p.week_end, "2026-10-16");
        assert_eq!(p.percentage, 25.0);
        assert_eq!(p.remaining_amount, 750_000);
        assert_eq!(p.average_donation, 83_333);
    }

    #[test]
    fn overshoot_clamps_and_empty_week_is_zero() {
        let over = progress_for(
            window(),
            100_000,
            WeeklyTotals {
                amount: 150_000,
                donor_count: 2,
            },
        );
        assert_eq!(over.percentage, 100.0);
        assert_eq!(over.remaining_amount, 0);
        assert_eq!(over.average_donation, 75_000);

        let empty = progress_for(window(), 100_000, WeeklyTotals::default());
        assert_eq!(empty.percentage, 0.0);
        assert_eq!(empty.average_donation, 0);
        assert_eq!(empty.remaining_amount, 100_000);
    }
}
