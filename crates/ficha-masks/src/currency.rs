//! Brazilian real amounts. Typed digits are read as cents.

use crate::digits::only_digits;

const MAX_DIGITS: usize = 15;

/// Cents encoded by the digits of `raw`, or `None` when no digit was typed.
pub fn parse_cents(raw: &str) -> Option<u64> {
    let digits = only_digits(raw, usize::MAX);
    if digits.is_empty() {
        return None;
    }
    let significant: String = digits
        .trim_start_matches('0')
        .chars()
        .take(MAX_DIGITS)
        .collect();
    if significant.is_empty() {
        return Some(0);
    }
    significant.parse().ok()
}

/// `123456` → `R$ 1.234,56`.
pub fn mask_currency(raw: &str) -> String {
    match parse_cents(raw) {
        Some(cents) => format_cents(cents),
        None => String::new(),
    }
}

pub fn format_cents(cents: u64) -> String {
    let reais = (cents / 100).to_string();
    let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
    for (i, c) in reais.chars().enumerate() {
        if i > 0 && (reais.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("R$ {grouped},{:02}", cents % 100)
}

/// Decimal amount submitted to the API.
pub fn currency_amount(display: &str) -> Option<f64> {
    parse_cents(display).map(|cents| cents as f64 / 100.0)
}
