//! Drives a [`Wizard`] through a recorded session.

use std::sync::Arc;
use std::time::Duration;

use ficha_core::{Record, Value};
use ficha_forms::collaborators::{MemoryAddressBook, MemoryReferenceData, ScriptedSubmission};
use ficha_forms::lookup::{LookupDebouncer, LookupOutcome};
use ficha_forms::{ErrorMap, FormsError, Phase, Transition, Wizard, WizardDefinition};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::session::{Event, Session};

/// What happened to one event of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLog {
    pub index: usize,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    /// Set when the wizard refused the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final state after the whole session has been replayed.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub wizard: String,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_title: Option<String>,
    pub highest_reached: usize,
    pub completed_steps: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_id: Option<String>,
    pub record: Record,
    pub errors: ErrorMap,
    pub events: Vec<EventLog>,
}

pub struct Replay {
    wizard: Wizard,
    debouncer: LookupDebouncer,
    addresses: Arc<MemoryAddressBook>,
    reference_data: MemoryReferenceData,
    submissions: ScriptedSubmission,
    lookups: JoinSet<LookupOutcome>,
}

impl Replay {
    pub fn new(definition: Arc<WizardDefinition>, session: &Session, window: Duration) -> Self {
        let wizard = match &session.record {
            Some(record) => Wizard::with_record(definition, record.clone()),
            None => Wizard::new(definition),
        };
        let collaborators = session.collaborators.clone();
        Self {
            wizard,
            debouncer: LookupDebouncer::new(window),
            addresses: Arc::new(collaborators.addresses),
            reference_data: collaborators.reference_data,
            submissions: ScriptedSubmission::new(
                collaborators
                    .submissions
                    .into_iter()
                    .map(|response| response.into_result())
                    .collect(),
            ),
            lookups: JoinSet::new(),
        }
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    /// Fetch the reference-data lists the definition's rules use.
    pub async fn load_reference_data(&mut self) -> Result<(), FormsError> {
        self.wizard.load_reference_data(&self.reference_data).await
    }

    /// Apply one event. Refusals by the wizard are returned as `Err` and do
    /// not stop the replay.
    pub async fn apply(&mut self, event: Event) -> Result<Option<Transition>, FormsError> {
        let transition = match event {
            Event::Update { path, value } => {
                self.wizard.update(&path, Value::from(value))?;
                self.schedule_lookups();
                None
            }
            Event::Blur { path } => {
                self.wizard.blur(&path)?;
                None
            }
            Event::Insert { path } => {
                self.wizard.insert_item(&path)?;
                None
            }
            Event::Remove { path, index } => {
                self.wizard.remove_item(&path, index)?;
                None
            }
            Event::Next => Some(self.wizard.go_next()),
            Event::Back => Some(self.wizard.go_back()),
            Event::Goto { step } => Some(self.wizard.go_to_step(step)),
            Event::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                None
            }
            Event::Settle => {
                self.settle().await?;
                None
            }
            Event::Submit => {
                // The UI submits from a settled form.
                self.settle().await?;
                let phase = self.wizard.submit(&self.submissions).await?;
                Some(Transition::Moved { to: phase })
            }
        };
        self.drain_finished()?;
        Ok(transition)
    }

    /// Wait for every pending lookup and apply the answers in completion order.
    pub async fn settle(&mut self) -> Result<(), FormsError> {
        while let Some(joined) = self.lookups.join_next().await {
            match joined {
                Ok(outcome) => {
                    self.wizard.apply_lookup(outcome)?;
                }
                Err(e) => tracing::warn!(error = %e, "lookup task failed"),
            }
        }
        Ok(())
    }

    pub fn report(&self, events: Vec<EventLog>) -> Report {
        let step_title = match self.wizard.phase() {
            Phase::Step(step) => self.wizard.step_title(step).ok().map(str::to_string),
            Phase::Submitting | Phase::Done => None,
        };
        Report {
            wizard: self.wizard.definition().name.clone(),
            phase: self.wizard.phase(),
            step_title,
            highest_reached: self.wizard.highest_reached(),
            completed_steps: self.wizard.completed_steps().iter().copied().collect(),
            submitted_id: self.wizard.submitted_id().map(str::to_string),
            record: self.wizard.record().clone(),
            errors: self.wizard.errors().clone(),
            events,
        }
    }

    fn schedule_lookups(&mut self) {
        for ticket in self.wizard.take_lookup_requests() {
            self.debouncer.register(&ticket);
            let debouncer = self.debouncer.clone();
            let addresses = Arc::clone(&self.addresses);
            self.lookups
                .spawn(async move { debouncer.run(addresses.as_ref(), ticket).await });
        }
    }

    fn drain_finished(&mut self) -> Result<(), FormsError> {
        while let Some(joined) = self.lookups.try_join_next() {
            match joined {
                Ok(outcome) => {
                    self.wizard.apply_lookup(outcome)?;
                }
                Err(e) => tracing::warn!(error = %e, "lookup task failed"),
            }
        }
        Ok(())
    }
}

/// Replay every event of `session` and report the final state.
pub async fn run(
    definition: Arc<WizardDefinition>,
    session: Session,
    window: Duration,
) -> Result<Report, FormsError> {
    let mut replay = Replay::new(definition, &session, window);
    replay.load_reference_data().await?;

    let mut log = Vec::with_capacity(session.events.len());
    for (index, event) in session.events.into_iter().enumerate() {
        let action = event.name();
        let entry = match replay.apply(event).await {
            Ok(transition) => {
                tracing::debug!(index, action, phase = %replay.wizard().phase(), "event applied");
                EventLog {
                    index,
                    action,
                    transition,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(index, action, error = %e, "event refused");
                EventLog {
                    index,
                    action,
                    transition: None,
                    error: Some(e.to_string()),
                }
            }
        };
        log.push(entry);
    }
    replay.settle().await?;

    let report = replay.report(log);
    tracing::info!(
        wizard = %report.wizard,
        phase = %report.phase,
        errors = report.errors.len(),
        "replay finished"
    );
    Ok(report)
}
