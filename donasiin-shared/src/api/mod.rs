use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::domain::DonationStatus;
use crate::period::Period;

pub mod endpoints;
#[cfg(feature = "rest-client")]
pub mod rest;

pub const API_V1_PREFIX: &str = "/api/v1";

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUserDto {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDto {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: i64, // unix seconds
    pub user: SessionUserDto,
}

// Donation intake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCodeReq {
    pub donor_name: String,
    pub phone_number: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentCodeResp {
    pub payload: String,
    /// `data:image/svg+xml;base64,...` rendering of `payload`.
    pub qr_image: String,
    pub amount: i64,
    pub merchant_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonationReceiptDto {
    pub id: String,
    pub status: DonationStatus,
    pub amount: i64,
    pub created_at: String, // RFC3339 UTC
}

// Ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Success,
    Rejected,
}

impl StatusFilter {
    pub fn matches(&self, status: DonationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == DonationStatus::Pending,
            StatusFilter::Success => status == DonationStatus::Success,
            StatusFilter::Rejected => status == DonationStatus::Rejected,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LedgerQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub status: Option<StatusFilter>,
    #[serde(default)]
    pub period: Option<Period>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerSummaryDto {
    pub total_income: i64,
    pub total_expense: i64,
    pub balance: i64,
    pub total_donors: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicDonationDto {
    pub id: String,
    pub donor_name: String,
    pub phone_masked: String,
    pub amount: i64,
    pub status: DonationStatus,
    pub created_at: String,
    pub verified_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpenseDto {
    pub id: String,
    pub amount: i64,
    pub description: String,
    pub location: String,
    pub receipt_url: Option<String>, // public URL
    pub created_at: String,
}

// Progress
#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyProgressDto {
    pub week_start: String, // YYYY-MM-DD
    pub week_end: String,
    pub target_amount: i64,
    pub current_amount: i64,
    pub donor_count: usize,
    pub percentage: f64,
    pub remaining_amount: i64,
    pub average_donation: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyTargetReq {
    pub week_start: String,
    pub week_end: String,
    pub target_amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyTargetDto {
    pub week_start: String,
    pub week_end: String,
    pub target_amount: i64,
}

// Timeline
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TimelineQuery {
    #[serde(default)]
    pub period: Option<Period>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityDto {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub activity_date: String,
    pub participant_count: Option<i32>,
    pub image_urls: Vec<String>,
    pub preview_images: Vec<String>,
    pub extra_image_count: usize,
}

// Admin review
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewView {
    #[default]
    Pending,
    All,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReviewQuery {
    #[serde(default)]
    pub view: Option<ReviewView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStatsDto {
    pub total_donations: usize,
    pub pending_donations: usize,
    pub total_amount: i64,
    pub total_donors: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminDonationDto {
    pub id: String,
    pub donor_name: String,
    pub phone_number: String,
    pub amount: i64,
    pub status: DonationStatus,
    pub payment_proof_url: Option<String>, // public URL
    pub created_at: String,
    pub verified_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminDonationsDto {
    pub view: ReviewView,
    pub stats: DashboardStatsDto,
    pub donations: Vec<AdminDonationDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfoDto {
    pub version: String,
}
