//! Declarative validation rules.
//!
//! A rule is a pure function of the record snapshot and the concrete path
//! being validated. Rules may read other fields (conditional requirement)
//! but never write.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ficha_core::{Path, PathError, PathPattern, Record, Value};
use ficha_masks::checksum::{is_valid_cnpj, is_valid_cpf, is_valid_document};
use ficha_masks::pix::is_valid_pix_key;
use ficha_masks::text::is_valid_email;
use ficha_masks::{MaskContext, MaskKind, is_complete};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::collaborators::OptionItem;
use crate::error_map::{FieldError, FieldErrorKind};

/// Reference-data pick lists, by kind (`"bancos"`, `"cargos"`, ...).
pub type OptionCatalog = BTreeMap<String, Vec<OptionItem>>;

/// When a rule runs: on every keystroke, or only once the field is left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    #[default]
    Change,
    Blur,
}

/// A field other than the one being validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Same parent record as the validated field.
    Sibling(String),
    /// Absolute pattern; wildcards take the validated path's indices.
    Path(PathPattern),
}

const SIBLING_PREFIX: &str = "sibling:";

impl Target {
    pub fn sibling(key: impl Into<String>) -> Self {
        Self::Sibling(key.into())
    }

    /// Concrete path of the target as seen from `path`.
    pub fn resolve(&self, path: &Path) -> Result<Path, PathError> {
        match self {
            Self::Sibling(key) => Ok(path.parent().unwrap_or_default().key(key.clone())),
            Self::Path(pattern) => pattern.instantiate(&path.indices()),
        }
    }

    /// Pattern of the target relative to a field declared at `field`.
    pub fn pattern_from(&self, field: &PathPattern) -> PathPattern {
        match self {
            Self::Sibling(key) => field.sibling(key),
            Self::Path(pattern) => pattern.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Sibling(key) => write!(f, "{SIBLING_PREFIX}{key}"),
            Self::Path(pattern) => write!(f, "{pattern}"),
        }
    }
}

impl FromStr for Target {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(SIBLING_PREFIX) {
            Some(key) => Ok(Self::Sibling(key.to_string())),
            None => PathPattern::parse(s).map(Self::Path),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Predicate over the record deciding whether a conditional rule applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals { field: Target, value: String },
    NotEquals { field: Target, value: String },
    Filled { field: Target },
    Empty { field: Target },
}

impl Condition {
    pub fn target(&self) -> &Target {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::Filled { field }
            | Self::Empty { field } => field,
        }
    }

    pub fn holds(&self, record: &Record, path: &Path) -> bool {
        // An unresolvable target reads as absent.
        let value = self
            .target()
            .resolve(path)
            .ok()
            .and_then(|target| record.get(&target).cloned());
        let text = value.as_ref().and_then(Value::to_plain_string);
        match self {
            Self::Equals { value: expected, .. } => text.as_deref() == Some(expected.as_str()),
            Self::NotEquals { value: expected, .. } => {
                text.as_deref() != Some(expected.as_str())
            }
            Self::Filled { .. } => value.is_some_and(|v| !v.is_blank()),
            Self::Empty { .. } => value.is_none_or(|v| v.is_blank()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Cpf,
    Cnpj,
    /// CPF or CNPJ, by digit count.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum FormatCheck {
    Email,
    /// The mask for `kind` has been typed out fully.
    Complete { kind: MaskKind },
    /// A payment key valid for the key type selected in the mask context.
    PixKey,
    MinLength { len: usize },
    MaxLength { len: usize },
    Digits { len: usize },
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub record: &'a Record,
    pub path: &'a Path,
    pub options: &'a OptionCatalog,
    pub mask: MaskContext,
}

impl<'a> RuleContext<'a> {
    pub fn value(&self) -> Option<&'a Value> {
        self.record.get(self.path)
    }
}

/// Code-only rule for checks no declarative rule covers.
#[derive(Clone, Copy)]
pub struct CustomRule(pub fn(&RuleContext<'_>) -> Option<FieldError>);

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("CustomRule(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    Required,
    RequiredIf { when: Condition },
    Format(FormatCheck),
    Checksum { document: DocumentKind },
    OneOf { values: Vec<String> },
    /// Value must be the id of an entry in the named reference-data list.
    Option { kind: String },
    MinItems { min: usize },
    #[serde(skip)]
    Custom(CustomRule),
}

impl Rule {
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Self::RequiredIf { when } => Some(when),
            _ => None,
        }
    }

    /// Run the rule, returning the error with its default message.
    ///
    /// Every rule except the requirement rules passes on a blank value.
    pub fn check(&self, ctx: &RuleContext<'_>) -> Option<FieldError> {
        let value = ctx.value();
        let blank = value.is_none_or(Value::is_blank);
        match self {
            Self::Required => {
                blank.then(|| FieldError::new(FieldErrorKind::Required, "Campo obrigatório"))
            }
            Self::RequiredIf { when } => (blank && when.holds(ctx.record, ctx.path)).then(|| {
                FieldError::new(FieldErrorKind::ConditionalRequired, "Campo obrigatório")
            }),
            Self::MinItems { min } => {
                let count = value.and_then(Value::as_list).map_or(0, <[Value]>::len);
                (count < *min).then(|| {
                    FieldError::new(
                        FieldErrorKind::Required,
                        format!("Adicione pelo menos {min} item(ns)"),
                    )
                })
            }
            Self::Custom(CustomRule(rule)) => rule(ctx),
            _ if blank => None,
            Self::Format(check) => {
                let text = value.and_then(Value::to_plain_string).unwrap_or_default();
                check_format(check, &text, ctx.mask)
            }
            Self::Checksum { document } => {
                let text = value.and_then(Value::to_plain_string).unwrap_or_default();
                let (valid, message) = match document {
                    DocumentKind::Cpf => (is_valid_cpf(&text), "CPF inválido"),
                    DocumentKind::Cnpj => (is_valid_cnpj(&text), "CNPJ inválido"),
                    DocumentKind::Any => (is_valid_document(&text), "CPF/CNPJ inválido"),
                };
                (!valid).then(|| FieldError::new(FieldErrorKind::Checksum, message))
            }
            Self::OneOf { values } => {
                let text = value.and_then(Value::to_plain_string).unwrap_or_default();
                (!values.contains(&text))
                    .then(|| FieldError::new(FieldErrorKind::Format, "Opção inválida"))
            }
            Self::Option { kind } => {
                let text = value.and_then(Value::to_plain_string).unwrap_or_default();
                let known = ctx
                    .options
                    .get(kind)
                    .is_some_and(|items| items.iter().any(|item| item.id == text));
                (!known).then(|| FieldError::new(FieldErrorKind::Format, "Opção inválida"))
            }
        }
    }
}

fn check_format(check: &FormatCheck, text: &str, mask: MaskContext) -> Option<FieldError> {
    let (valid, message) = match check {
        FormatCheck::Email => (is_valid_email(text), "E-mail inválido".to_string()),
        FormatCheck::Complete { kind } => (
            is_complete(*kind, text, mask),
            "Preenchimento incompleto".to_string(),
        ),
        FormatCheck::PixKey => (
            mask.pix_key_type
                .is_some_and(|key_type| is_valid_pix_key(text, key_type)),
            "Chave Pix inválida".to_string(),
        ),
        FormatCheck::MinLength { len } => (
            text.chars().count() >= *len,
            format!("Mínimo de {len} caracteres"),
        ),
        FormatCheck::MaxLength { len } => (
            text.chars().count() <= *len,
            format!("Máximo de {len} caracteres"),
        ),
        FormatCheck::Digits { len } => (
            text.chars().filter(char::is_ascii_digit).count() == *len,
            format!("Deve conter {len} dígitos"),
        ),
    };
    (!valid).then(|| FieldError::new(FieldErrorKind::Format, message))
}

/// A rule as declared on a field: the rule, its trigger tier, and an
/// optional message overriding the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(flatten)]
    pub rule: Rule,
    #[serde(default)]
    pub on: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RuleSpec {
    pub fn new(rule: Rule, on: Trigger) -> Self {
        Self {
            rule,
            on,
            message: None,
        }
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<FieldError> {
        let mut error = self.rule.check(ctx)?;
        if let Some(message) = &self.message {
            error.message = message.clone();
        }
        error.deferred = self.on == Trigger::Blur;
        Some(error)
    }
}
