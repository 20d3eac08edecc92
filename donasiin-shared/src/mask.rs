/// Masks a phone number for public display.
///
/// Keeps the first 2 and the last 3 characters and replaces the middle with
/// `x`. Inputs shorter than 4 characters are returned unchanged. A 5 character
/// input has no middle and comes back as is. At exactly 4 characters the
/// prefix and suffix overlap, so everything after the first 2 is masked.
pub fn mask_phone_number(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let len = chars.len();
    if len < 4 {
        return phone.to_string();
    }
    let start: String = chars[..2].iter().collect();
    if len == 4 {
        return format!("{}xx", start);
    }
    let end: String = chars[len - 3..].iter().collect();
    format!("{}{}{}", start, "x".repeat(len - 5), end)
}
