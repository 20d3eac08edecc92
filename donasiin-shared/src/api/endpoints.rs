use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::API_V1_PREFIX;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn v1(base: &str, path: &str) -> String {
    base_join(base, &format!("{}/{}", API_V1_PREFIX, path))
}

pub fn version(base: &str) -> String {
    v1(base, "version")
}

pub fn auth_login(base: &str) -> String {
    v1(base, "auth/login")
}
pub fn auth_logout(base: &str) -> String {
    v1(base, "auth/logout")
}
pub fn auth_session(base: &str) -> String {
    v1(base, "auth/session")
}

pub fn payment_code(base: &str) -> String {
    v1(base, "donations/payment-code")
}
pub fn donations(base: &str) -> String {
    v1(base, "donations")
}

pub fn ledger_summary(base: &str) -> String {
    v1(base, "ledger/summary")
}
pub fn ledger_donations(base: &str) -> String {
    v1(base, "ledger/donations")
}
pub fn ledger_expenses(base: &str) -> String {
    v1(base, "ledger/expenses")
}
pub fn ledger_donations_export(base: &str) -> String {
    v1(base, "ledger/donations/export")
}
pub fn ledger_expenses_export(base: &str) -> String {
    v1(base, "ledger/expenses/export")
}

pub fn progress(base: &str) -> String {
    v1(base, "progress")
}
pub fn progress_history(base: &str) -> String {
    v1(base, "progress/history")
}

pub fn activities(base: &str) -> String {
    v1(base, "activities")
}

pub fn admin_donations(base: &str) -> String {
    v1(base, "admin/donations")
}
pub fn admin_approve(base: &str, donation_id: &str) -> String {
    v1(base, &format!("admin/donations/{}/approve", enc(donation_id)))
}
pub fn admin_reject(base: &str, donation_id: &str) -> String {
    v1(base, &format!("admin/donations/{}/reject", enc(donation_id)))
}
pub fn admin_expenses(base: &str) -> String {
    v1(base, "admin/expenses")
}
pub fn admin_activities(base: &str) -> String {
    v1(base, "admin/activities")
}
pub fn admin_weekly_targets(base: &str) -> String {
    v1(base, "admin/weekly-targets")
}
