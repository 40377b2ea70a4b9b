//! Wizard definitions: the declaration a wizard is made of.
//!
//! A definition lists the steps, the field descriptors, default shapes for
//! array items, postal-code lookup bindings, and how server-side conflicts
//! map back onto fields. Definitions are plain JSON documents.

use std::collections::{BTreeMap, BTreeSet};

use ficha_core::{Path, PathPattern, Record};
use serde::{Deserialize, Serialize};

use crate::descriptor::FieldDescriptor;
use crate::error::FormsError;
use crate::lookup::LookupBinding;
use crate::rules::Rule;

/// Current definition version. Bump this when changing the document shape.
/// Each bump requires a corresponding entry in [`migrate`].
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub title: String,
}

/// Default shape of a new item in the sequence at `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayTemplate {
    pub path: PathPattern,
    #[serde(default)]
    pub template: Record,
}

/// Field blamed for a uniqueness conflict reported on submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictTarget {
    pub path: Path,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardDefinition {
    /// Document version. Missing or 0 = pre-versioned definition.
    #[serde(default)]
    pub definition_version: u32,
    pub name: String,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub descriptors: Vec<FieldDescriptor>,
    #[serde(default)]
    pub templates: Vec<ArrayTemplate>,
    #[serde(default)]
    pub lookups: Vec<LookupBinding>,
    /// Conflict kind reported by the submission service → blamed field.
    #[serde(default)]
    pub conflicts: BTreeMap<String, ConflictTarget>,
}

impl WizardDefinition {
    pub fn new(name: impl Into<String>, steps: &[&str]) -> Self {
        Self {
            definition_version: CURRENT_VERSION,
            name: name.into(),
            steps: steps
                .iter()
                .map(|title| StepDefinition {
                    title: title.to_string(),
                })
                .collect(),
            descriptors: Vec::new(),
            templates: Vec::new(),
            lookups: Vec::new(),
            conflicts: BTreeMap::new(),
        }
    }

    pub fn descriptor(mut self, descriptor: FieldDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn template(mut self, path: PathPattern, template: Record) -> Self {
        self.templates.push(ArrayTemplate { path, template });
        self
    }

    pub fn lookup(mut self, binding: LookupBinding) -> Self {
        self.lookups.push(binding);
        self
    }

    pub fn conflict(
        mut self,
        kind: impl Into<String>,
        path: Path,
        message: impl Into<String>,
    ) -> Self {
        self.conflicts.insert(
            kind.into(),
            ConflictTarget {
                path,
                message: message.into(),
            },
        );
        self
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// First descriptor, in declaration order, whose pattern matches `path`.
    pub fn descriptor_for(&self, path: &Path) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.path.matches(path))
    }

    /// Step owning `path`, if any descriptor declares it.
    pub fn step_of(&self, path: &Path) -> Option<usize> {
        self.descriptor_for(path).map(|d| d.step)
    }

    pub fn descriptors_for_step(&self, step: usize) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().filter(move |d| d.step == step)
    }

    /// Default item for the sequence at `base`; an empty record if none is declared.
    pub fn template_for(&self, base: &Path) -> Record {
        self.templates
            .iter()
            .find(|t| t.path.matches(base))
            .map(|t| t.template.clone())
            .unwrap_or_default()
    }

    pub fn lookup_for(&self, path: &Path) -> Option<&LookupBinding> {
        self.lookups.iter().find(|l| l.trigger.matches(path))
    }

    /// Reference-data lists referenced by `Option` rules.
    pub fn option_kinds(&self) -> BTreeSet<String> {
        self.descriptors
            .iter()
            .flat_map(|d| &d.rules)
            .filter_map(|spec| match &spec.rule {
                Rule::Option { kind } => Some(kind.clone()),
                _ => None,
            })
            .collect()
    }

    /// Check internal consistency: step numbers in range, conditions that
    /// can be bound from the field they guard.
    pub fn validate(&self) -> Result<(), FormsError> {
        if self.steps.is_empty() {
            return Err(FormsError::Definition(format!("'{}' declares no steps", self.name)));
        }
        for descriptor in &self.descriptors {
            if descriptor.step == 0 || descriptor.step > self.steps.len() {
                return Err(FormsError::Definition(format!(
                    "'{}' is assigned to step {} of {}",
                    descriptor.path,
                    descriptor.step,
                    self.steps.len()
                )));
            }
            for target in descriptor.condition_patterns() {
                if target.wildcard_count() > descriptor.path.wildcard_count() {
                    return Err(FormsError::Definition(format!(
                        "condition on '{}' reads '{target}', which has unbound wildcards",
                        descriptor.path
                    )));
                }
            }
        }
        for (kind, target) in &self.conflicts {
            if self.step_of(&target.path).is_none() {
                tracing::warn!(
                    kind = %kind,
                    path = %target.path,
                    "conflict target has no descriptor"
                );
            }
        }
        Ok(())
    }

    pub fn from_json_str(contents: &str) -> Result<Self, FormsError> {
        // Parse as raw JSON so we can run migrations before deserializing.
        let json: serde_json::Value = serde_json::from_str(contents)?;
        Self::from_json_value(json)
    }

    pub fn from_json_value(json: serde_json::Value) -> Result<Self, FormsError> {
        let on_disk_version = json
            .get("definition_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        let migrated = migrate(json, on_disk_version)?;
        let definition: WizardDefinition = serde_json::from_value(migrated)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, FormsError> {
        let contents = std::fs::read_to_string(path)?;
        let definition = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            name = %definition.name,
            steps = definition.steps.len(),
            descriptors = definition.descriptors.len(),
            "wizard definition loaded"
        );
        Ok(definition)
    }
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(
    mut json: serde_json::Value,
    from_version: u32,
) -> Result<serde_json::Value, FormsError> {
    if from_version > CURRENT_VERSION {
        return Err(FormsError::Definition(format!(
            "definition_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    // v0 → v1: `fields` renamed to `descriptors`
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| FormsError::Definition("definition is not a JSON object".to_string()))?;
        if let Some(fields) = obj.remove("fields") {
            obj.entry("descriptors").or_insert(fields);
        }
        obj.insert(
            "definition_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated definition v0 → v1 (fields renamed to descriptors)");
    }

    Ok(json)
}
