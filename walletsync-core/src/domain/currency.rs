//! ISO 4217 currency table
//!
//! The remote banking API reports currencies by their numeric ISO code and
//! amounts in minor units. This module maps numeric codes to alphabetic ones
//! and knows each currency's minor-unit exponent.

use rust_decimal::Decimal;

/// Exponent used when a currency is not in the table
pub const DEFAULT_MINOR_UNITS: u32 = 2;

/// (numeric code, alphabetic code, minor-unit exponent)
const CURRENCIES: &[(u16, &str, u32)] = &[
    (8, "ALL", 2),
    (12, "DZD", 2),
    (32, "ARS", 2),
    (36, "AUD", 2),
    (48, "BHD", 3),
    (50, "BDT", 2),
    (51, "AMD", 2),
    (104, "MMK", 2),
    (116, "KHR", 2),
    (124, "CAD", 2),
    (144, "LKR", 2),
    (152, "CLP", 0),
    (156, "CNY", 2),
    (170, "COP", 2),
    (203, "CZK", 2),
    (208, "DKK", 2),
    (230, "ETB", 2),
    (344, "HKD", 2),
    (348, "HUF", 2),
    (352, "ISK", 0),
    (356, "INR", 2),
    (360, "IDR", 2),
    (364, "IRR", 2),
    (368, "IQD", 3),
    (376, "ILS", 2),
    (392, "JPY", 0),
    (398, "KZT", 2),
    (400, "JOD", 3),
    (404, "KES", 2),
    (410, "KRW", 0),
    (414, "KWD", 3),
    (417, "KGS", 2),
    (418, "LAK", 2),
    (422, "LBP", 2),
    (434, "LYD", 3),
    (458, "MYR", 2),
    (484, "MXN", 2),
    (496, "MNT", 2),
    (498, "MDL", 2),
    (504, "MAD", 2),
    (512, "OMR", 3),
    (524, "NPR", 2),
    (554, "NZD", 2),
    (566, "NGN", 2),
    (578, "NOK", 2),
    (586, "PKR", 2),
    (604, "PEN", 2),
    (608, "PHP", 2),
    (634, "QAR", 2),
    (643, "RUB", 2),
    (646, "RWF", 0),
    (682, "SAR", 2),
    (702, "SGD", 2),
    (704, "VND", 0),
    (710, "ZAR", 2),
    (752, "SEK", 2),
    (756, "CHF", 2),
    (760, "SYP", 2),
    (764, "THB", 2),
    (784, "AED", 2),
    (788, "TND", 3),
    (800, "UGX", 0),
    (807, "MKD", 2),
    (818, "EGP", 2),
    (826, "GBP", 2),
    (834, "TZS", 2),
    (840, "USD", 2),
    (860, "UZS", 2),
    (886, "YER", 2),
    (901, "TWD", 2),
    (933, "BYN", 2),
    (934, "TMT", 2),
    (941, "RSD", 2),
    (944, "AZN", 2),
    (946, "RON", 2),
    (949, "TRY", 2),
    (950, "XAF", 0),
    (952, "XOF", 0),
    (972, "TJS", 2),
    (975, "BGN", 2),
    (977, "BAM", 2),
    (978, "EUR", 2),
    (980, "UAH", 2),
    (981, "GEL", 2),
    (985, "PLN", 2),
    (986, "BRL", 2),
];

/// Alphabetic code for a numeric ISO 4217 code
pub fn alpha_code(numeric: u16) -> Option<&'static str> {
    CURRENCIES
        .iter()
        .find(|(n, _, _)| *n == numeric)
        .map(|(_, alpha, _)| *alpha)
}

/// Numeric code for an alphabetic ISO 4217 code
pub fn numeric_code(alpha: &str) -> Option<u16> {
    let alpha = normalize_code(alpha);
    CURRENCIES
        .iter()
        .find(|(_, a, _)| *a == alpha)
        .map(|(n, _, _)| *n)
}

/// Minor-unit exponent for an alphabetic code (2 when unknown)
pub fn minor_units(alpha: &str) -> u32 {
    let alpha = normalize_code(alpha);
    CURRENCIES
        .iter()
        .find(|(_, a, _)| *a == alpha)
        .map(|(_, _, exp)| *exp)
        .unwrap_or(DEFAULT_MINOR_UNITS)
}

/// Convert an amount in minor units to major units for the given currency
///
/// 12345 kopiyky in UAH becomes 123.45; 500 in JPY stays 500.
pub fn to_major_units(minor: i64, alpha: &str) -> Decimal {
    Decimal::new(minor, minor_units(alpha))
}

/// Normalize a currency code to trimmed uppercase
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
