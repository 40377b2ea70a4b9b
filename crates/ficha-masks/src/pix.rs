//! Payment (Pix) keys. The mask depends on the selected key type.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::checksum::is_valid_document;
use crate::digits::{mask_document, mask_phone, only_digits};
use crate::error::MaskError;
use crate::text::{is_valid_email, mask_email};

const RANDOM_KEY_LEN: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PixKeyType {
    Email,
    Phone,
    /// CPF or CNPJ.
    Document,
    /// Bank-issued random key (UUID).
    Random,
}

impl FromStr for PixKeyType {
    type Err = MaskError;

    /// Accepts the English names and the labels stored by the wizards.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" | "e-mail" => Ok(Self::Email),
            "phone" | "telefone" | "celular" => Ok(Self::Phone),
            "document" | "cpf" | "cnpj" | "documento" | "cpf/cnpj" => Ok(Self::Document),
            "random" | "aleatoria" | "aleatória" | "chave aleatoria" | "chave aleatória" => {
                Ok(Self::Random)
            }
            other => Err(MaskError::UnknownKeyType(other.to_string())),
        }
    }
}

pub fn mask_pix_key(raw: &str, key_type: Option<PixKeyType>) -> String {
    match key_type {
        Some(PixKeyType::Email) => mask_email(raw),
        Some(PixKeyType::Phone) => mask_phone(raw),
        Some(PixKeyType::Document) => mask_document(raw),
        Some(PixKeyType::Random) => raw
            .chars()
            .flat_map(char::to_lowercase)
            .filter(|c| c.is_ascii_hexdigit() || *c == '-')
            .take(RANDOM_KEY_LEN)
            .collect(),
        None => raw.trim().to_string(),
    }
}

/// Canonical key as the payment network expects it.
pub fn pix_key_canonical(display: &str, key_type: Option<PixKeyType>) -> String {
    match key_type {
        Some(PixKeyType::Phone) => format!("+55{}", only_digits(display, 11)),
        Some(PixKeyType::Document) => only_digits(display, 14),
        Some(PixKeyType::Email) | Some(PixKeyType::Random) | None => display.to_string(),
    }
}

pub fn is_valid_pix_key(display: &str, key_type: PixKeyType) -> bool {
    match key_type {
        PixKeyType::Email => is_valid_email(display),
        PixKeyType::Phone => only_digits(display, 11).len() >= 10,
        PixKeyType::Document => is_valid_document(display),
        PixKeyType::Random => {
            uuid::Uuid::try_parse(display).is_ok() && display.len() == RANDOM_KEY_LEN
        }
    }
}
