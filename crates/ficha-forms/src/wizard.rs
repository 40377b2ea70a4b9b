//! Step orchestrator: the single owner of a wizard's record and errors.
//!
//! Phases run `Step(1)` … `Step(N)`, then `Submitting`, then `Done`.
//! Forward navigation is gated on step validation; going back never
//! validates. The record is only ever changed through path-scoped edits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use ficha_core::{Path, Record, Value};
use ficha_masks::{MaskKind, denormalize, is_complete, mask};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::arrays;
use crate::collaborators::{
    AddressFields, CollaboratorError, OptionItem, ReferenceData, Rejection, SubmissionService,
    SubmitOutcome,
};
use crate::definition::WizardDefinition;
use crate::engine::{Validator, expand};
use crate::error::FormsError;
use crate::error_map::{ErrorMap, FieldError, FieldErrorKind};
use crate::lookup::{LookupOutcome, LookupTicket};
use crate::rules::OptionCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Phase {
    /// 1-based step index.
    Step(usize),
    Submitting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Step(step) => write!(f, "on step {step}"),
            Self::Submitting => f.write_str("submitting"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Transition {
    Moved { to: Phase },
    /// Step validation failed; the phase is unchanged.
    Blocked { errors: usize },
    /// The request is not allowed from the current phase.
    Refused,
}

pub struct Wizard {
    definition: Arc<WizardDefinition>,
    record: Record,
    errors: ErrorMap,
    phase: Phase,
    highest_reached: usize,
    completed: BTreeSet<usize>,
    options: OptionCatalog,
    in_flight: bool,
    submitted_id: Option<String>,
    /// Last ticket generation issued; never reset, so tickets stay unique.
    lookup_counter: u64,
    lookup_generations: BTreeMap<Path, u64>,
    pending_lookups: Vec<LookupTicket>,
}

impl Wizard {
    /// A fresh wizard on step 1 with an empty record.
    pub fn new(definition: Arc<WizardDefinition>) -> Self {
        Self::with_record(definition, Record::new())
    }

    /// Resume editing an existing record (e.g. a clinical record being amended).
    pub fn with_record(definition: Arc<WizardDefinition>, record: Record) -> Self {
        Self {
            definition,
            record,
            errors: ErrorMap::new(),
            phase: Phase::Step(1),
            highest_reached: 1,
            completed: BTreeSet::new(),
            options: OptionCatalog::new(),
            in_flight: false,
            submitted_id: None,
            lookup_counter: 0,
            lookup_generations: BTreeMap::new(),
            pending_lookups: Vec::new(),
        }
    }

    pub fn definition(&self) -> &WizardDefinition {
        &self.definition
    }

    /// Read-only snapshot of the record.
    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn highest_reached(&self) -> usize {
        self.highest_reached
    }

    pub fn completed_steps(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    pub fn submitted_id(&self) -> Option<&str> {
        self.submitted_id.as_deref()
    }

    /// Errors belonging to `step`.
    pub fn step_errors(&self, step: usize) -> ErrorMap {
        self.errors
            .iter()
            .filter(|(key, _)| self.step_of_key(key) == Some(step))
            .map(|(key, error)| (key.clone(), error.clone()))
            .collect()
    }

    pub fn step_title(&self, step: usize) -> Result<&str, FormsError> {
        step.checked_sub(1)
            .and_then(|i| self.definition.steps.get(i))
            .map(|s| s.title.as_str())
            .ok_or(FormsError::UnknownStep(step))
    }

    fn ensure_editable(&self) -> Result<(), FormsError> {
        match self.phase {
            Phase::Step(_) => Ok(()),
            other => Err(FormsError::Locked(other)),
        }
    }

    /// Mask `raw`, write it at `path`, and revalidate on change.
    ///
    /// Blank text is stored as unset. Non-text values are written as given.
    pub fn update(&mut self, path: &str, raw: impl Into<Value>) -> Result<(), FormsError> {
        self.ensure_editable()?;
        let path = Path::parse(path)?;
        let value = match raw.into() {
            Value::Text(text) => {
                let masked = match self.definition.descriptor_for(&path) {
                    Some(descriptor) => match descriptor.mask {
                        Some(kind) => {
                            mask(kind, &text, descriptor.mask_context(&self.record, &path))
                        }
                        None => text,
                    },
                    None => text,
                };
                if masked.trim().is_empty() {
                    Value::Null
                } else {
                    Value::Text(masked)
                }
            }
            other => other,
        };

        self.record = self.record.set(&path, value)?;
        Validator::new(&self.definition, &self.options)
            .on_change(&self.record, &path, &mut self.errors);
        self.remask_dependents(&path)?;
        self.track_lookup(&path);
        Ok(())
    }

    /// Run the deferred (blur-tier) validations for `path`.
    pub fn blur(&mut self, path: &str) -> Result<(), FormsError> {
        self.ensure_editable()?;
        let path = Path::parse(path)?;
        Validator::new(&self.definition, &self.options)
            .on_blur(&self.record, &path, &mut self.errors);
        Ok(())
    }

    /// Append a default-shaped item to the sequence at `base`.
    pub fn insert_item(&mut self, base: &str) -> Result<(), FormsError> {
        self.ensure_editable()?;
        let base = Path::parse(base)?;
        let template = self.definition.template_for(&base);
        self.record = arrays::insert(&self.record, &base, template)?;
        Validator::new(&self.definition, &self.options)
            .clear_if_valid(&self.record, &base, &mut self.errors);
        Ok(())
    }

    /// Remove the item at `index` from the sequence at `base`, re-keying errors.
    pub fn remove_item(&mut self, base: &str, index: usize) -> Result<(), FormsError> {
        self.ensure_editable()?;
        let base = Path::parse(base)?;
        let (record, errors) = arrays::remove_at(&self.record, &base, index, &self.errors)?;
        self.record = record;
        self.errors = errors;
        // Lookups follow their item down; the removed item's are dropped.
        self.lookup_generations = std::mem::take(&mut self.lookup_generations)
            .into_iter()
            .filter_map(|(path, generation)| {
                arrays::shift_path(&path, &base, index).map(|moved| (moved, generation))
            })
            .collect();
        self.pending_lookups = std::mem::take(&mut self.pending_lookups)
            .into_iter()
            .filter_map(|mut ticket| {
                ticket.path = arrays::shift_path(&ticket.path, &base, index)?;
                Some(ticket)
            })
            .collect();
        Validator::new(&self.definition, &self.options)
            .on_change(&self.record, &base, &mut self.errors);
        Ok(())
    }

    /// Validate the current step and advance when it is clean.
    pub fn go_next(&mut self) -> Transition {
        let Phase::Step(step) = self.phase else {
            return Transition::Refused;
        };

        let fresh =
            Validator::new(&self.definition, &self.options).validate_step(&self.record, step);
        self.errors.retain(|key, _| {
            Path::parse(key)
                .ok()
                .and_then(|path| self.definition.step_of(&path))
                != Some(step)
        });
        let count = fresh.len();
        self.errors.extend(fresh);

        if count > 0 {
            tracing::debug!(step, errors = count, "step blocked by validation");
            return Transition::Blocked { errors: count };
        }

        self.completed.insert(step);
        let to = if step >= self.definition.step_count() {
            Phase::Submitting
        } else {
            Phase::Step(step + 1)
        };
        if let Phase::Step(next) = to {
            self.highest_reached = self.highest_reached.max(next);
        }
        tracing::info!(from = step, to = %to, "wizard advanced");
        self.phase = to;
        Transition::Moved { to }
    }

    /// Go back one step. Never validates.
    pub fn go_back(&mut self) -> Transition {
        let to = match self.phase {
            Phase::Step(1) => return Transition::Moved { to: Phase::Step(1) },
            Phase::Step(step) => Phase::Step(step - 1),
            Phase::Submitting if !self.in_flight => Phase::Step(self.definition.step_count()),
            Phase::Submitting | Phase::Done => return Transition::Refused,
        };
        self.phase = to;
        Transition::Moved { to }
    }

    /// Jump to any step already reached.
    pub fn go_to_step(&mut self, step: usize) -> Transition {
        let editable = matches!(self.phase, Phase::Step(_))
            || (self.phase == Phase::Submitting && !self.in_flight);
        if !editable || step == 0 || step > self.highest_reached {
            return Transition::Refused;
        }
        self.phase = Phase::Step(step);
        Transition::Moved { to: self.phase }
    }

    /// Cache a reference-data list for `Option` rules.
    pub fn load_options(&mut self, kind: impl Into<String>, items: Vec<OptionItem>) {
        self.options.insert(kind.into(), items);
    }

    pub fn options(&self, kind: &str) -> &[OptionItem] {
        self.options.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Fetch every list the definition's rules reference.
    pub async fn load_reference_data(
        &mut self,
        service: &dyn ReferenceData,
    ) -> Result<(), FormsError> {
        for kind in self.definition.option_kinds() {
            let items = service.fetch_options(&kind).await?;
            tracing::debug!(kind = %kind, count = items.len(), "reference data loaded");
            self.options.insert(kind, items);
        }
        Ok(())
    }

    /// Tickets issued by edits since the last call.
    pub fn take_lookup_requests(&mut self) -> Vec<LookupTicket> {
        std::mem::take(&mut self.pending_lookups)
    }

    /// Apply a finished lookup if its ticket is still current.
    ///
    /// Returns whether the record was changed.
    pub fn apply_lookup(&mut self, outcome: LookupOutcome) -> Result<bool, FormsError> {
        let LookupOutcome::Completed { ticket, result } = outcome else {
            return Ok(false);
        };
        let current = self.lookup_generations.get(&ticket.path) == Some(&ticket.generation)
            && self.record.get_str(&ticket.path) == Some(ticket.value.as_str());
        if !current || !matches!(self.phase, Phase::Step(_)) {
            tracing::debug!(
                path = %ticket.path,
                generation = ticket.generation,
                "discarding stale lookup"
            );
            return Ok(false);
        }
        self.apply_address(&ticket.path, result)
    }

    fn apply_address(
        &mut self,
        trigger: &Path,
        result: Result<Option<AddressFields>, CollaboratorError>,
    ) -> Result<bool, FormsError> {
        let fields = match result {
            Ok(Some(fields)) => fields,
            Ok(None) => {
                self.errors.insert(
                    trigger.to_string(),
                    FieldError::new(FieldErrorKind::NotFound, "CEP não encontrado"),
                );
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!(path = %trigger, error = %e, "address lookup failed");
                return Ok(false);
            }
        };
        let Some(binding) = self.definition.lookup_for(trigger) else {
            return Ok(false);
        };

        let writes = binding.writes(trigger, &fields);
        for (path, text) in &writes {
            self.record = self.record.set(path, Value::text(text.clone()))?;
        }
        let validator = Validator::new(&self.definition, &self.options);
        for (path, _) in &writes {
            validator.clear_if_valid(&self.record, path, &mut self.errors);
        }
        tracing::debug!(path = %trigger, fields = writes.len(), "address lookup applied");
        Ok(true)
    }

    /// Enter the in-flight submission and return the canonical payload.
    pub fn begin_submit(&mut self) -> Result<Record, FormsError> {
        if self.phase != Phase::Submitting {
            return Err(FormsError::NotSubmitting);
        }
        if self.in_flight {
            return Err(FormsError::SubmissionInFlight);
        }
        self.in_flight = true;
        self.canonical_record()
    }

    /// Resolve the in-flight submission.
    ///
    /// Field rejections and conflicts are written into the error map and
    /// the wizard returns to the earliest step that owns one of them.
    pub fn finish_submit(
        &mut self,
        outcome: Result<SubmitOutcome, CollaboratorError>,
    ) -> Result<Phase, FormsError> {
        if !self.in_flight {
            return Err(FormsError::NotSubmitting);
        }
        self.in_flight = false;
        let last_step = self.definition.step_count();

        match outcome {
            Ok(SubmitOutcome::Ok { id }) => {
                tracing::info!(wizard = %self.definition.name, id = %id, "submission accepted");
                self.submitted_id = Some(id);
                self.phase = Phase::Done;
            }
            Ok(SubmitOutcome::ValidationRejected { rejections }) => {
                tracing::warn!(count = rejections.len(), "submission rejected");
                let step = self.record_rejections(&rejections);
                self.return_to(step.unwrap_or(last_step));
            }
            Ok(SubmitOutcome::Conflict { kind }) => {
                tracing::warn!(kind = %kind, "submission conflict");
                let step = self.record_conflict(&kind);
                self.return_to(step.unwrap_or(last_step));
            }
            Err(e) => {
                tracing::warn!(error = %e, "submission failed");
                self.phase = Phase::Step(last_step);
                return Err(FormsError::Collaborator(e));
            }
        }
        Ok(self.phase)
    }

    /// Submit through `service`: begin, await, resolve.
    pub async fn submit(&mut self, service: &dyn SubmissionService) -> Result<Phase, FormsError> {
        let payload = self.begin_submit()?;
        let outcome = service.submit(&payload).await;
        self.finish_submit(outcome)
    }

    /// The record with masked fields converted to their submitted form.
    pub fn canonical_record(&self) -> Result<Record, FormsError> {
        let mut canonical = self.record.clone();
        for descriptor in &self.definition.descriptors {
            let Some(kind) = descriptor.mask.filter(MaskKind::has_canonical_form) else {
                continue;
            };
            for path in expand(&self.record, &descriptor.path) {
                let Some(display) = self.record.get_str(&path) else {
                    continue;
                };
                let ctx = descriptor.mask_context(&self.record, &path);
                canonical = canonical.set(&path, denormalize(kind, display, ctx))?;
            }
        }
        Ok(canonical)
    }

    fn record_rejections(&mut self, rejections: &[Rejection]) -> Option<usize> {
        let mut earliest: Option<usize> = None;
        for rejection in rejections {
            self.errors.insert(
                rejection.path.clone(),
                FieldError::new(FieldErrorKind::Format, rejection.message.clone()),
            );
            if let Some(step) = self.step_of_key(&rejection.path) {
                earliest = Some(earliest.map_or(step, |e| e.min(step)));
            }
        }
        earliest
    }

    fn record_conflict(&mut self, kind: &str) -> Option<usize> {
        let Some(target) = self.definition.conflicts.get(kind) else {
            tracing::warn!(kind = %kind, "no field declared for conflict kind");
            return None;
        };
        let key = target.path.to_string();
        let step = self.definition.step_of(&target.path);
        self.errors.insert(
            key,
            FieldError::new(FieldErrorKind::Duplicate, target.message.clone()),
        );
        step
    }

    fn return_to(&mut self, step: usize) {
        self.completed.retain(|s| *s < step);
        self.phase = Phase::Step(step);
        tracing::info!(step, "returned to step after submission failure");
    }

    fn step_of_key(&self, key: &str) -> Option<usize> {
        Path::parse(key)
            .ok()
            .and_then(|path| self.definition.step_of(&path))
    }

    /// Re-mask fields whose mask context reads `edited` (a payment key after
    /// its key type changes).
    fn remask_dependents(&mut self, edited: &Path) -> Result<(), FormsError> {
        let definition = Arc::clone(&self.definition);
        for descriptor in &definition.descriptors {
            let (Some(kind), Some(source)) = (descriptor.mask, &descriptor.key_type_from) else {
                continue;
            };
            if !source.pattern_from(&descriptor.path).matches(edited) {
                continue;
            }
            for path in expand(&self.record, &descriptor.path) {
                if source.resolve(&path).ok().as_ref() != Some(edited) {
                    continue;
                }
                let Some(display) = self.record.get_str(&path).map(str::to_string) else {
                    continue;
                };
                let ctx = descriptor.mask_context(&self.record, &path);
                let masked = mask(kind, &display, ctx);
                if masked != display {
                    let value = if masked.is_empty() { Value::Null } else { Value::Text(masked) };
                    self.record = self.record.set(&path, value)?;
                }
                Validator::new(&definition, &self.options).clear_if_valid(
                    &self.record,
                    &path,
                    &mut self.errors,
                );
            }
        }
        Ok(())
    }

    /// Issue a lookup ticket when `path` is a bound postal-code field.
    fn track_lookup(&mut self, path: &Path) {
        if self.definition.lookup_for(path).is_none() {
            return;
        }
        self.lookup_counter += 1;
        let generation = self.lookup_counter;
        self.lookup_generations.insert(path.clone(), generation);
        let value = self.record.get_str(path).unwrap_or_default().to_string();
        let ready = is_complete(MaskKind::Cep, &value, Default::default());
        self.pending_lookups.push(LookupTicket {
            path: path.clone(),
            value,
            generation,
            ready,
        });
    }
}
