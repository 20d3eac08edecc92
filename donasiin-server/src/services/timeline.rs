use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use donasiin_shared::domain::{Activity, NewActivity};
use donasiin_shared::period::Period;
use tracing::info;

use super::ServiceError;
use super::images::{ImageUpload, store_image};
use crate::backend::{Backend, Bucket};

/// Images shown inline per activity; the rest are summarised as a count.
pub const PREVIEW_LIMIT: usize = 4;
pub const MAX_IMAGES: usize = 10;

pub fn preview<T: Clone>(images: &[T]) -> (Vec<T>, usize) {
    let shown = images.len().min(PREVIEW_LIMIT);
    (images[..shown].to_vec(), images.len() - shown)
}

pub async fn list(
    backend: &Backend,
    period: Period,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Vec<Activity>, ServiceError> {
    let mut all = backend.records.list_activities().await?;
    all.retain(|a| period.contains_date(a.activity_date, now, &tz));
    Ok(all)
}

#[derive(Debug, Clone)]
pub struct ActivityInput {
    pub title: String,
    pub description: String,
    pub location: String,
    pub activity_date: NaiveDate,
    pub participant_count: Option<i32>,
}

/// Stores every image, in order, then records the activity.
pub async fn record_activity(
    backend: &Backend,
    input: ActivityInput,
    images: Vec<ImageUpload>,
    max_image_bytes: usize,
    bearer: &str,
) -> Result<Activity, ServiceError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ServiceError::invalid("activity title is required"));
    }
    if input.participant_count.is_some_and(|n| n < 0) {
        return Err(ServiceError::invalid("participant_count must not be negative"));
    }
    if images.len() > MAX_IMAGES {
        return Err(ServiceError::invalid(format!(
            "at most {MAX_IMAGES} images per activity"
        )));
    }
    for image in &images {
        image.validate(max_image_bytes)?;
    }
    let mut image_urls = Vec::with_capacity(images.len());
    for image in images {
        image_urls.push(
            store_image(
                backend,
                Bucket::TimelineImages,
                image,
                max_image_bytes,
                Some(bearer),
            )
            .await?,
        );
    }
    let new = NewActivity {
        title: title.to_string(),
        description: input.description.trim().to_string(),
        location: input.location.trim().to_string(),
        activity_date: input.activity_date,
        image_urls,
        participant_count: input.participant_count,
    };
    let activity = backend.records.insert_activity(&new, bearer).await?;
    info!(
        activity_id = %activity.id,
        images = activity.image_urls.len(),
        "activity recorded"
    );
    Ok(activity)
}
