use std::str::FromStr;

use ficha_core::{Path, PathError, PathPattern, Record};
use ficha_masks::{MaskContext, MaskKind, PixKeyType};
use serde::{Deserialize, Serialize};

use crate::rules::{CustomRule, Rule, RuleSpec, Target, Trigger};

/// Binds a path pattern to its mask, its ordered rules, and its wizard step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub path: PathPattern,
    pub step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskKind>,
    /// Field holding the payment key type, for [`MaskKind::PixKey`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type_from: Option<Target>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl FieldDescriptor {
    pub fn new(pattern: &str, step: usize) -> Result<Self, PathError> {
        Ok(Self {
            path: PathPattern::parse(pattern)?,
            step,
            mask: None,
            key_type_from: None,
            rules: Vec::new(),
        })
    }

    pub fn mask(mut self, kind: MaskKind) -> Self {
        self.mask = Some(kind);
        self
    }

    pub fn key_type_from(mut self, target: Target) -> Self {
        self.key_type_from = Some(target);
        self
    }

    /// Add a rule checked on every change.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(RuleSpec::new(rule, Trigger::Change));
        self
    }

    /// Add a rule deferred until the field loses focus.
    pub fn on_blur(mut self, rule: Rule) -> Self {
        self.rules.push(RuleSpec::new(rule, Trigger::Blur));
        self
    }

    pub fn custom(self, rule: CustomRule) -> Self {
        self.rule(Rule::Custom(rule))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.rules.last_mut() {
            last.message = Some(message.into());
        }
        self
    }

    /// The deepest trigger tier among the rules.
    pub fn tier(&self) -> Trigger {
        self.rules
            .iter()
            .map(|spec| spec.on)
            .max()
            .unwrap_or_default()
    }

    /// Fields read by this descriptor's conditions, as patterns.
    pub fn condition_patterns(&self) -> impl Iterator<Item = PathPattern> + '_ {
        self.rules
            .iter()
            .filter_map(|spec| spec.rule.condition())
            .map(|condition| condition.target().pattern_from(&self.path))
    }

    /// Mask context for an instance of this field in `record`.
    pub fn mask_context(&self, record: &Record, path: &Path) -> MaskContext {
        let pix_key_type = self
            .key_type_from
            .as_ref()
            .and_then(|target| target.resolve(path).ok())
            .and_then(|target| record.get_str(&target).map(str::to_string))
            .and_then(|raw| PixKeyType::from_str(&raw).ok());
        MaskContext::with_pix_key_type(pix_key_type)
    }
}
