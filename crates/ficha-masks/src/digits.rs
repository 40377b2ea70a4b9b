//! Digit-template masks: CPF, CNPJ, CEP and phone numbers.

pub const CPF_TEMPLATE: &str = "###.###.###-##";
pub const CNPJ_TEMPLATE: &str = "##.###.###/####-##";
pub const CEP_TEMPLATE: &str = "#####-###";
const LANDLINE_TEMPLATE: &str = "(##) ####-####";
const MOBILE_TEMPLATE: &str = "(##) #####-####";

/// ASCII digits of `raw`, at most `max` of them.
pub fn only_digits(raw: &str, max: usize) -> String {
    raw.chars().filter(char::is_ascii_digit).take(max).collect()
}

/// Lay `digits` into `template`, where `#` is a digit slot.
///
/// Literal characters are emitted only when a digit follows them, so a
/// partially typed value never ends in dangling punctuation.
pub fn apply_template(digits: &str, template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut remaining = digits.chars().peekable();
    for slot in template.chars() {
        if remaining.peek().is_none() {
            break;
        }
        if slot == '#' {
            if let Some(d) = remaining.next() {
                out.push(d);
            }
        } else {
            out.push(slot);
        }
    }
    out
}

pub fn mask_cpf(raw: &str) -> String {
    apply_template(&only_digits(raw, 11), CPF_TEMPLATE)
}

pub fn mask_cnpj(raw: &str) -> String {
    apply_template(&only_digits(raw, 14), CNPJ_TEMPLATE)
}

/// CPF layout up to 11 digits, CNPJ layout beyond.
pub fn mask_document(raw: &str) -> String {
    let digits = only_digits(raw, 14);
    if digits.len() <= 11 {
        apply_template(&digits, CPF_TEMPLATE)
    } else {
        apply_template(&digits, CNPJ_TEMPLATE)
    }
}

pub fn mask_cep(raw: &str) -> String {
    apply_template(&only_digits(raw, 8), CEP_TEMPLATE)
}

/// Area code plus an 8-digit landline or 9-digit mobile number.
pub fn mask_phone(raw: &str) -> String {
    let digits = only_digits(raw, 11);
    if digits.len() <= 10 {
        apply_template(&digits, LANDLINE_TEMPLATE)
    } else {
        apply_template(&digits, MOBILE_TEMPLATE)
    }
}
