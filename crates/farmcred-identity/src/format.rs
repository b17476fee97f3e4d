use regex::Regex;
use std::sync::LazyLock;

static NIGERIAN_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+234|234|0)?[789][01]\d{8}$").expect("phone pattern is valid")
});

/// NIN and BVN are both 11 ASCII digits.
pub fn is_valid_identity_number(value: &str) -> bool {
    value.len() == 11 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Mobile numbers in local (`080...`), bare (`80...`) or international
/// (`+234...`, `234...`) form; whitespace is ignored.
pub fn is_valid_nigerian_phone(phone: &str) -> bool {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    NIGERIAN_PHONE.is_match(&compact)
}

/// Rewrite a phone number into `+234...` form. Inputs that do not look like
/// a Nigerian number are returned unchanged.
pub fn normalize_nigerian_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.starts_with("234") {
        format!("+{digits}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("+234{rest}")
    } else if digits.len() == 10 {
        format!("+234{digits}")
    } else {
        phone.to_string()
    }
}

/// Keep only the last four characters, for logs.
pub(crate) fn mask(value: &str) -> String {
    let count = value.chars().count();
    let hidden = count.saturating_sub(4);
    let tail: String = value.chars().skip(hidden).collect();
    format!("{}{tail}", "*".repeat(hidden))
}
