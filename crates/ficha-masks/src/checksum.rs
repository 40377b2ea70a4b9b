//! Check-digit predicates for the two national registry numbers.
//!
//! Punctuation is ignored, so both freshly typed and previously stored
//! (masked) values can be checked.

use crate::digits::only_digits;

const CNPJ_WEIGHTS_1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// CPF: 11 digits, two mod-11 check digits, repeated-digit numbers rejected.
pub fn is_valid_cpf(raw: &str) -> bool {
    let Some(digits) = document_digits(raw, 11) else {
        return false;
    };

    let check = |len: usize| {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 { 0 } else { rest }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

/// CNPJ: 14 digits, two weighted mod-11 check digits.
pub fn is_valid_cnpj(raw: &str) -> bool {
    let Some(digits) = document_digits(raw, 14) else {
        return false;
    };

    let check = |weights: &[u32]| {
        let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
        let rest = sum % 11;
        if rest < 2 { 0 } else { 11 - rest }
    };

    check(&CNPJ_WEIGHTS_1) == digits[12] && check(&CNPJ_WEIGHTS_2) == digits[13]
}

/// CPF or CNPJ, chosen by digit count.
pub fn is_valid_document(raw: &str) -> bool {
    match only_digits(raw, usize::MAX).len() {
        11 => is_valid_cpf(raw),
        14 => is_valid_cnpj(raw),
        _ => false,
    }
}

fn document_digits(raw: &str, len: usize) -> Option<Vec<u32>> {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != len || digits.iter().all(|d| *d == digits[0]) {
        return None;
    }
    Some(digits)
}
