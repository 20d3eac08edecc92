//! EMVCo merchant-presented QR payloads in the Indonesian QRIS profile.
//!
//! Each data object is `ID (2) | LEN (2) | VALUE`, and the payload ends with
//! tag `63`, a CRC-16/CCITT-FALSE over everything up to and including `6304`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use qrcode::QrCode;
use qrcode::render::svg;

use crate::server::config::MerchantConfig;

const PAYLOAD_FORMAT: &str = "01";
/// Point of initiation `12`: dynamic code, the amount is fixed per payment.
const DYNAMIC_INITIATION: &str = "12";
const CURRENCY_IDR: &str = "360";
const COUNTRY_ID: &str = "ID";
const NATIONAL_DOMAIN: &str = "ID.CO.QRIS.WWW";
const MAX_NAME_LEN: usize = 25;
const MAX_CITY_LEN: usize = 15;
const QR_SIZE: u32 = 300;
const QR_DARK: &str = "#1E293B";
const QR_LIGHT: &str = "#FFFFFF";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QrisError {
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("tag {tag} value is too long ({len} bytes)")]
    ValueTooLong { tag: &'static str, len: usize },
    #[error("cannot render qr code: {0}")]
    Render(String),
}

/// CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no reflection.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn tlv(out: &mut String, tag: &'static str, value: &str) -> Result<(), QrisError> {
    if value.len() > 99 {
        return Err(QrisError::ValueTooLong {
            tag,
            len: value.len(),
        });
    }
    out.push_str(tag);
    out.push_str(&format!("{:02}", value.len()));
    out.push_str(value);
    Ok(())
}

/// Truncates to `max` characters; QRIS names and cities are plain ASCII upper case.
fn field(value: &str, max: usize) -> String {
    value
        .trim()
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .take(max)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Builds the payment payload for `amount` rupiah.
pub fn payment_payload(merchant: &MerchantConfig, amount: i64) -> Result<String, QrisError> {
    if amount <= 0 {
        return Err(QrisError::NonPositiveAmount);
    }
    let mut out = String::with_capacity(160);
    tlv(&mut out, "00", PAYLOAD_FORMAT)?;
    tlv(&mut out, "01", DYNAMIC_INITIATION)?;

    let mut account = String::new();
    tlv(&mut account, "00", &merchant.acquirer_guid)?;
    tlv(&mut account, "01", &merchant.merchant_id)?;
    tlv(&mut out, "26", &account)?;

    if let Some(nmid) = merchant.nmid.as_deref().filter(|n| !n.is_empty()) {
        let mut national = String::new();
        tlv(&mut national, "00", NATIONAL_DOMAIN)?;
        tlv(&mut national, "02", nmid)?;
        tlv(&mut out, "51", &national)?;
    }

    tlv(&mut out, "52", &merchant.category_code)?;
    tlv(&mut out, "53", CURRENCY_IDR)?;
    tlv(&mut out, "54", &amount.to_string())?;
    tlv(&mut out, "58", COUNTRY_ID)?;
    tlv(&mut out, "59", &field(&merchant.name, MAX_NAME_LEN))?;
    tlv(&mut out, "60", &field(&merchant.city, MAX_CITY_LEN))?;
    if let Some(postal) = merchant.postal_code.as_deref().filter(|p| !p.is_empty()) {
        tlv(&mut out, "61", postal)?;
    }

    out.push_str("6304");
    let crc = crc16_ccitt(out.as_bytes());
    out.push_str(&format!("{crc:04X}"));
    Ok(out)
}

/// Renders `payload` as an SVG QR code wrapped in a `data:` URL.
pub fn qr_data_url(payload: &str) -> Result<String, QrisError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| QrisError::Render(e.to_string()))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .quiet_zone(true)
        .dark_color(svg::Color(QR_DARK))
        .light_color(svg::Color(QR_LIGHT))
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image.as_bytes())
    ))
}
