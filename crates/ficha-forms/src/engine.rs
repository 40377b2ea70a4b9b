//! Validation rule engine.
//!
//! Rules of a descriptor run in declaration order and the first failure
//! wins, so a path shows at most one message. Keystrokes run only the
//! change-tier rules; blur and step validation run everything.

use ficha_core::{Path, PathPattern, PatternSegment, Record, Value};

use crate::definition::WizardDefinition;
use crate::descriptor::FieldDescriptor;
use crate::error_map::{ErrorMap, FieldError};
use crate::rules::{OptionCatalog, RuleContext, Trigger};

pub struct Validator<'a> {
    definition: &'a WizardDefinition,
    options: &'a OptionCatalog,
}

impl<'a> Validator<'a> {
    pub fn new(definition: &'a WizardDefinition, options: &'a OptionCatalog) -> Self {
        Self {
            definition,
            options,
        }
    }

    /// Run every rule for the field at `path`.
    pub fn validate_field(&self, record: &Record, path: &Path) -> Option<FieldError> {
        let descriptor = self.definition.descriptor_for(path)?;
        self.run(descriptor, record, path, |_| true)
    }

    /// Fresh error map for every instance of every descriptor of `step`.
    pub fn validate_step(&self, record: &Record, step: usize) -> ErrorMap {
        self.definition
            .descriptors_for_step(step)
            .flat_map(|descriptor| {
                expand(record, &descriptor.path)
                    .into_iter()
                    .map(move |path| (descriptor, path))
            })
            .filter_map(|(descriptor, path)| {
                // An earlier descriptor matching the same path owns it.
                let owner = self.definition.descriptor_for(&path)?;
                if !std::ptr::eq(owner, descriptor) {
                    return None;
                }
                let error = self.run(descriptor, record, &path, |_| true)?;
                Some((path.to_string(), error))
            })
            .collect()
    }

    pub fn validate_all(&self, record: &Record) -> ErrorMap {
        let mut errors = ErrorMap::new();
        for step in 1..=self.definition.step_count() {
            errors.extend(self.validate_step(record, step));
        }
        errors
    }

    /// Revalidate after a keystroke into `path`.
    ///
    /// A failing change-tier rule sets its error. Otherwise an existing
    /// error is cleared once the value satisfies every rule; an error raised
    /// by a deferred rule that still fails is kept until then.
    pub fn on_change(&self, record: &Record, path: &Path, errors: &mut ErrorMap) {
        if let Some(descriptor) = self.definition.descriptor_for(path) {
            let key = path.to_string();
            if let Some(error) = self.run(descriptor, record, path, |on| on == Trigger::Change) {
                errors.insert(key, error);
            } else if self.run(descriptor, record, path, |on| on == Trigger::Blur).is_none() {
                errors.remove(&key);
            } else if errors.get(&key).is_some_and(|e| !e.deferred) {
                errors.remove(&key);
            }
        } else {
            // Collaborator-reported errors on undeclared paths clear on edit.
            errors.remove(&path.to_string());
        }
        self.clear_dependents(record, path, errors);
    }

    /// Revalidate when `path` loses focus: every rule, first failure wins.
    pub fn on_blur(&self, record: &Record, path: &Path, errors: &mut ErrorMap) {
        let key = path.to_string();
        match self.validate_field(record, path) {
            Some(error) => errors.insert(key, error),
            None => {
                errors.remove(&key);
            }
        }
    }

    /// Clear errors that `path` now satisfies, without raising new ones.
    pub fn clear_if_valid(&self, record: &Record, path: &Path, errors: &mut ErrorMap) {
        let key = path.to_string();
        if errors.contains(&key) && self.validate_field(record, path).is_none() {
            errors.remove(&key);
        }
    }

    /// Fields whose conditions read `edited`.
    pub fn dependents(&self, record: &Record, edited: &Path) -> Vec<Path> {
        let mut found = Vec::new();
        for descriptor in &self.definition.descriptors {
            for target in descriptor.condition_patterns() {
                let Some(indices) = target.bind(edited) else {
                    continue;
                };
                if descriptor.path.wildcard_count() <= indices.len() {
                    if let Ok(path) = descriptor.path.instantiate(&indices) {
                        found.push(path);
                    }
                } else {
                    found.extend(
                        expand(record, &descriptor.path)
                            .into_iter()
                            .filter(|path| path.indices().starts_with(&indices)),
                    );
                }
            }
        }
        found.sort();
        found.dedup();
        found
    }

    fn clear_dependents(&self, record: &Record, edited: &Path, errors: &mut ErrorMap) {
        for dependent in self.dependents(record, edited) {
            if dependent != *edited {
                self.clear_if_valid(record, &dependent, errors);
            }
        }
    }

    fn run(
        &self,
        descriptor: &FieldDescriptor,
        record: &Record,
        path: &Path,
        tier: impl Fn(Trigger) -> bool,
    ) -> Option<FieldError> {
        let ctx = RuleContext {
            record,
            path,
            options: self.options,
            mask: descriptor.mask_context(record, path),
        };
        descriptor
            .rules
            .iter()
            .filter(|spec| tier(spec.on))
            .find_map(|spec| spec.evaluate(&ctx))
    }
}

/// Concrete paths of `pattern` in `record`.
///
/// Each wildcard is expanded once per existing element; a missing sequence
/// yields no instances. Keys are followed whether or not they exist, so
/// fields of not-yet-created sub-records are still reported.
pub fn expand(record: &Record, pattern: &PathPattern) -> Vec<Path> {
    let mut out = Vec::new();
    let root = Value::Record(record.clone());
    expand_from(Some(&root), pattern, 0, Path::root(), &mut out);
    out
}

fn expand_from(
    current: Option<&Value>,
    pattern: &PathPattern,
    depth: usize,
    prefix: Path,
    out: &mut Vec<Path>,
) {
    let Some(segment) = pattern.segments().get(depth) else {
        out.push(prefix);
        return;
    };
    match segment {
        PatternSegment::Key(key) => {
            let next = current.and_then(Value::as_record).and_then(|r| r.field(key));
            expand_from(next, pattern, depth + 1, prefix.key(key.clone()), out);
        }
        PatternSegment::Index(index) => {
            let next = current.and_then(Value::as_list).and_then(|items| items.get(*index));
            expand_from(next, pattern, depth + 1, prefix.index(*index), out);
        }
        PatternSegment::Wildcard => {
            let items = current.and_then(Value::as_list).unwrap_or_default();
            for (index, item) in items.iter().enumerate() {
                expand_from(
                    Some(item),
                    pattern,
                    depth + 1,
                    prefix.clone().index(index),
                    out,
                );
            }
        }
    }
}
