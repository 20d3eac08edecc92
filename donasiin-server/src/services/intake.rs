//! Public donation intake: pledge validation, payment code, proof upload and
//! the pending donation record.

use donasiin_shared::api::{PaymentCodeReq, PaymentCodeResp};
use donasiin_shared::domain::{Donation, DonationStatus, NewDonation};
use tracing::{info, warn};

use super::images::{ImageUpload, store_image};
use super::{ServiceError, qris};
use crate::backend::{Backend, Bucket};
use crate::server::config::AppConfig;

/// Trimmed, validated donor details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pledge {
    pub donor_name: String,
    pub phone_number: String,
    pub amount: i64,
}

impl Pledge {
    pub fn validate(req: &PaymentCodeReq, min_amount: i64) -> Result<Self, ServiceError> {
        let donor_name = req.donor_name.trim();
        let phone_number = req.phone_number.trim();
        if donor_name.is_empty() {
            return Err(ServiceError::invalid("donor name is required"));
        }
        if phone_number.is_empty() {
            return Err(ServiceError::invalid("phone number is required"));
        }
        if req.amount < min_amount {
            return Err(ServiceError::Invalid(format!(
                "minimum donation is Rp {min_amount}"
            )));
        }
        Ok(Pledge {
            donor_name: donor_name.to_string(),
            phone_number: phone_number.to_string(),
            amount: req.amount,
        })
    }
}

pub fn payment_code(config: &AppConfig, req: &PaymentCodeReq) -> Result<PaymentCodeResp, ServiceError> {
    let pledge = Pledge::validate(req, config.min_donation)?;
    let payload = qris::payment_payload(&config.merchant, pledge.amount)?;
    let qr_image = qris::qr_data_url(&payload)?;
    Ok(PaymentCodeResp {
        payload,
        qr_image,
        amount: pledge.amount,
        merchant_name: config.merchant.name.clone(),
    })
}

/// Validates everything locally, then uploads the proof and inserts a pending
/// donation. Nothing is sent to the backend for an invalid submission.
pub async fn submit(
    config: &AppConfig,
    backend: &Backend,
    req: &PaymentCodeReq,
    proof: Option<ImageUpload>,
) -> Result<Donation, ServiceError> {
    let pledge = Pledge::validate(req, config.min_donation)?;
    let proof = proof.ok_or_else(|| ServiceError::invalid("payment proof image is required"))?;
    proof.validate(config.max_proof_bytes)?;
    let payload = qris::payment_payload(&config.merchant, pledge.amount)?;

    let object = store_image(
        backend,
        Bucket::PaymentProofs,
        proof,
        config.max_proof_bytes,
        None,
    )
    .await?;

    let new = NewDonation {
        donor_name: pledge.donor_name,
        phone_number: pledge.phone_number,
        amount: pledge.amount,
        status: DonationStatus::Pending,
        payment_proof_url: Some(object.clone()),
        qris_data: Some(payload),
    };
    match backend.records.insert_donation(&new).await {
        Ok(donation) => {
            info!(donation_id = %donation.id, amount = donation.amount, "donation submitted");
            Ok(donation)
        }
        Err(e) => {
            warn!(
                bucket = Bucket::PaymentProofs.as_str(),
                object = %object,
                error = %e,
                "donation insert failed; uploaded proof is orphaned"
            );
            Err(e.into())
        }
    }
}
