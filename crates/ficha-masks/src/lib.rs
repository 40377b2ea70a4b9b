//! ficha-masks
//!
//! Input masking and normalization for wizard fields, plus the check-digit
//! predicates for Brazilian registry numbers. Pure functions, no I/O.
//!
//! Every mask is idempotent: applying it to its own output changes nothing,
//! because the UI re-masks already-masked values on every render.

pub mod checksum;
pub mod currency;
pub mod digits;
pub mod error;
pub mod pix;
pub mod text;

use std::fmt;
use std::str::FromStr;

use ficha_core::Value;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::MaskError;
pub use crate::pix::PixKeyType;

/// The kinds of field that have an input mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MaskKind {
    /// National individual registry number (CPF).
    Cpf,
    /// National company registry number (CNPJ).
    Cnpj,
    Phone,
    /// Amount in reais.
    Currency,
    /// Postal code (CEP).
    Cep,
    /// Payment key; masked according to the selected [`PixKeyType`].
    PixKey,
    /// Person or company name.
    Name,
    Email,
}

impl MaskKind {
    pub const ALL: [MaskKind; 8] = [
        Self::Cpf,
        Self::Cnpj,
        Self::Phone,
        Self::Currency,
        Self::Cep,
        Self::PixKey,
        Self::Name,
        Self::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpf => "cpf",
            Self::Cnpj => "cnpj",
            Self::Phone => "phone",
            Self::Currency => "currency",
            Self::Cep => "cep",
            Self::PixKey => "pix_key",
            Self::Name => "name",
            Self::Email => "email",
        }
    }

    /// Whether the display form differs from what is submitted.
    pub fn has_canonical_form(&self) -> bool {
        matches!(self, Self::Currency | Self::PixKey)
    }
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaskKind {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MaskError::UnknownKind(s.to_string()))
    }
}

/// External context a mask may depend on.
///
/// Only the payment key uses it: its mask follows the key type selected in a
/// sibling field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskContext {
    pub pix_key_type: Option<PixKeyType>,
}

impl MaskContext {
    pub fn with_pix_key_type(pix_key_type: Option<PixKeyType>) -> Self {
        Self { pix_key_type }
    }
}

/// Transform raw keystroke input into the display form.
pub fn mask(kind: MaskKind, raw: &str, ctx: MaskContext) -> String {
    match kind {
        MaskKind::Cpf => digits::mask_cpf(raw),
        MaskKind::Cnpj => digits::mask_cnpj(raw),
        MaskKind::Phone => digits::mask_phone(raw),
        MaskKind::Currency => currency::mask_currency(raw),
        MaskKind::Cep => digits::mask_cep(raw),
        MaskKind::PixKey => pix::mask_pix_key(raw, ctx.pix_key_type),
        MaskKind::Name => text::mask_name(raw),
        MaskKind::Email => text::mask_email(raw),
    }
}

/// Canonical value for submission. Only called when the record is sent.
///
/// Currency becomes a number, payment keys their network form; every other
/// kind submits its display text. Blank input denormalizes to `Null`.
pub fn denormalize(kind: MaskKind, display: &str, ctx: MaskContext) -> Value {
    if display.trim().is_empty() {
        return Value::Null;
    }
    match kind {
        MaskKind::Currency => currency::currency_amount(display).map_or(Value::Null, Value::Number),
        MaskKind::PixKey => Value::Text(pix::pix_key_canonical(display, ctx.pix_key_type)),
        MaskKind::Name => Value::Text(display.trim_end().to_string()),
        _ => Value::Text(display.to_string()),
    }
}

/// Whether the display value has been typed out fully.
///
/// Used to defer checks (and lookups) that would be noise mid-typing.
pub fn is_complete(kind: MaskKind, display: &str, ctx: MaskContext) -> bool {
    let digit_count = || digits::only_digits(display, usize::MAX).len();
    match kind {
        MaskKind::Cpf => digit_count() == 11,
        MaskKind::Cnpj => digit_count() == 14,
        MaskKind::Cep => digit_count() == 8,
        MaskKind::Phone => digit_count() >= 10,
        MaskKind::Currency => currency::parse_cents(display).is_some(),
        MaskKind::Name => !display.trim().is_empty(),
        MaskKind::Email => text::is_valid_email(display),
        MaskKind::PixKey => match ctx.pix_key_type {
            Some(PixKeyType::Email) => text::is_valid_email(display),
            Some(PixKeyType::Phone) => digit_count() >= 10,
            Some(PixKeyType::Document) => matches!(digit_count(), 11 | 14),
            Some(PixKeyType::Random) => display.len() == 36,
            None => false,
        },
    }
}
