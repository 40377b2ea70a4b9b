//! Free-text masks: name casing and email.

/// Lower-case connectives kept in lower case inside a name.
const PARTICLES: &[&str] = &["da", "das", "de", "di", "do", "dos", "e"];

/// Title-case a person or company name.
///
/// Leading whitespace is dropped and inner runs collapse to one space. A
/// single trailing space survives so the next word can still be typed.
pub fn mask_name(raw: &str) -> String {
    let trimmed = raw.trim_start();
    let mut out = trimmed
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| case_word(i, word))
        .collect::<Vec<_>>()
        .join(" ");
    if !out.is_empty() && trimmed.ends_with(char::is_whitespace) {
        out.push(' ');
    }
    out
}

fn case_word(position: usize, word: &str) -> String {
    let lower = word.to_lowercase();
    if position > 0 && PARTICLES.contains(&lower.as_str()) {
        return lower;
    }
    lower
        .split('-')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join("-")
}

/// Upper-case the first letter. Letters whose upper case is more than one
/// character (`ß`, `ŉ`) are left alone, or masking twice would differ.
fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut upper = first.to_uppercase();
    let head = match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => first,
    };
    std::iter::once(head).chain(chars).collect()
}

pub fn mask_email(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Structural email check: one `@`, a non-empty local part, and a dotted
/// domain with no empty labels.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
