//! Phone number normalisation into canonical session addresses.

use crate::error::CommandError;
use regex::Regex;
use std::sync::LazyLock;

/// Country code substituted for a leading trunk prefix.
pub const COUNTRY_CODE: &str = "62";

/// Suffix of a canonical user address.
pub const ADDRESS_SUFFIX: &str = "@c.us";

/// 62 + mobile prefix 8 + operator digit 1-9 + 7..=11 subscriber digits.
static LOCAL_MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^628[1-9][0-9]{7,11}$").expect("valid mobile pattern"));

/// Digits (optionally a `-` group suffix) followed by a user or group
/// server, or a hidden-user (`@lid`) id.
static CANONICAL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(-[0-9]+)?@(c|g)\.us|[0-9]+@lid)$").expect("valid address pattern")
});

/// Normalise a human-entered number into a canonical address.
///
/// Non-digits are stripped, a leading `0` becomes the country code, and the
/// address suffix is appended. Already canonical input is returned unchanged.
pub fn format(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_suffix(ADDRESS_SUFFIX).unwrap_or(raw);
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let digits = match digits.strip_prefix('0') {
        Some(rest) => format!("{COUNTRY_CODE}{rest}"),
        None => digits,
    };

    format!("{digits}{ADDRESS_SUFFIX}")
}

/// Digit-only part of a canonical address.
pub fn local_part(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

/// Whether the digit-only form is a valid local mobile number.
pub fn is_valid_local(digits: &str) -> bool {
    LOCAL_MOBILE.is_match(digits)
}

/// Whether `address` is a reply target: `<digits>@c.us`, `<id>@g.us` or `<id>@lid`.
pub fn is_canonical_address(address: &str) -> bool {
    CANONICAL_ADDRESS.is_match(address)
}

/// Format and validate a number for a manual send.
pub fn canonical_for_send(raw: &str) -> Result<String, CommandError> {
    let address = format(raw);
    let digits = local_part(&address);
    if !is_valid_local(digits) {
        return Err(CommandError::InvalidNumber(digits.to_string()));
    }
    Ok(address)
}
