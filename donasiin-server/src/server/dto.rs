//! Domain rows to wire DTOs. Timestamps go out as RFC3339 UTC, stored object
//! names as public URLs.

use chrono::{DateTime, SecondsFormat, Utc};
use donasiin_shared::api;
use donasiin_shared::domain::{Activity, Donation, Expense, WeeklyTarget};
use donasiin_shared::mask::mask_phone_number;

use crate::backend::{Bucket, ObjectStore};
use crate::services::review::ReviewList;
use crate::services::timeline;

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn receipt(d: &Donation) -> api::DonationReceiptDto {
    api::DonationReceiptDto {
        id: d.id.clone(),
        status: d.status,
        amount: d.amount,
        created_at: rfc3339(d.created_at),
    }
}

/// Public ledger row; the phone number never leaves unmasked.
pub fn public_donation(d: &Donation) -> api::PublicDonationDto {
    api::PublicDonationDto {
        id: d.id.clone(),
        donor_name: d.donor_name.clone(),
        phone_masked: mask_phone_number(&d.phone_number),
        amount: d.amount,
        status: d.status,
        created_at: rfc3339(d.created_at),
        verified_at: d.verified_at.map(rfc3339),
    }
}

pub fn expense(files: &dyn ObjectStore, e: &Expense) -> api::ExpenseDto {
    api::ExpenseDto {
        id: e.id.clone(),
        amount: e.amount,
        description: e.description.clone(),
        location: e.location.clone(),
        receipt_url: e
            .receipt_url
            .as_deref()
            .map(|r| files.resolve(Bucket::Receipts, r)),
        created_at: rfc3339(e.created_at),
    }
}

pub fn weekly_target(t: &WeeklyTarget) -> api::WeeklyTargetDto {
    api::WeeklyTargetDto {
        week_start: t.week_start.to_string(),
        week_end: t.week_end.to_string(),
        target_amount: t.target_amount,
    }
}

pub fn activity(files: &dyn ObjectStore, a: &Activity) -> api::ActivityDto {
    let image_urls: Vec<String> = a
        .image_urls
        .iter()
        .map(|i| files.resolve(Bucket::TimelineImages, i))
        .collect();
    let (preview_images, extra_image_count) = timeline::preview(&image_urls);
    api::ActivityDto {
        id: a.id.clone(),
        title: a.title.clone(),
        description: a.description.clone(),
        location: a.location.clone(),
        activity_date: a.activity_date.to_string(),
        participant_count: a.participant_count,
        image_urls,
        preview_images,
        extra_image_count,
    }
}

fn admin_donation(files: &dyn ObjectStore, d: &Donation) -> api::AdminDonationDto {
    api::AdminDonationDto {
        id: d.id.clone(),
        donor_name: d.donor_name.clone(),
        phone_number: d.phone_number.clone(),
        amount: d.amount,
        status: d.status,
        payment_proof_url: d
            .payment_proof_url
            .as_deref()
            .map(|p| files.resolve(Bucket::PaymentProofs, p)),
        created_at: rfc3339(d.created_at),
        verified_at: d.verified_at.map(rfc3339),
    }
}

pub fn admin_donations(files: &dyn ObjectStore, list: ReviewList) -> api::AdminDonationsDto {
    api::AdminDonationsDto {
        view: list.view,
        stats: list.stats,
        donations: list
            .donations
            .iter()
            .map(|d| admin_donation(files, d))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local_files::LocalFiles;
    use chrono::NaiveDate;
    use donasiin_shared::domain::DonationStatus;

    fn files() -> LocalFiles {
        LocalFiles::new("/tmp/unused".into(), Some("https://donasi.example.org"))
    }

    #[test]
    fn public_rows_mask_the_phone() {
        let d = Donation {
            id: "d1".into(),
            donor_name: "Siti".into(),
            phone_number: "081234567890".into(),
            amount: 50_000,
            status: DonationStatus::Success,
            payment_proof_url: Some("p.png".into()),
            qris_data: None,
            created_at: DateTime::from_timestamp(1_760_000_000, 0).unwrap(),
            verified_at: None,
        };
        let dto = public_donation(&d);
        assert_eq!(dto.phone_masked, "08xxxxxxx890");
        assert_eq!(dto.created_at, "2025-10-09T08:53:20Z");
    }

    #[test]
    fn activity_images_resolve_and_split_into_preview() {
        let a = Activity {
            id: "a1".into(),
            title: "Bagi takjil".into(),
            description: String::new(),
            location: "Masjid".into(),
            activity_date: NaiveDate::from_ymd_opt(2026, 10, 9).unwrap(),
            image_urls: (1..=6)
                .map(|i| format!("{i}.jpg"))
                .chain(["https://cdn.example.org/x.jpg".to_string()])
                .collect(),
            participant_count: Some(12),
            created_at: Utc::now(),
        };
        let dto = activity(&files(), &a);
        assert_eq!(dto.image_urls.len(), 7);
        assert_eq!(
            dto.preview_images[0],
            "https://donasi.example.org/files/timeline-images/1.jpg"
        );
        assert_eq!(dto.image_urls[6], "https://cdn.example.org/x.jpg");
        assert_eq!(dto.preview_images.len(), 4);
        assert_eq!(dto.extra_image_count, 3);
        assert_eq!(dto.activity_date, "2026-10-09");
    }
}
