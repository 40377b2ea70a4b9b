//! Debounced postal-code lookups.
//!
//! An edit to a bound postal-code field issues a [`LookupTicket`] carrying a
//! generation that only ever grows within a wizard. A lookup fires only after the quiescence window has
//! passed with no newer ticket for that path, and its answer is applied only
//! if the field still holds the value that started it. Last edit wins, not
//! last response.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ficha_core::{Path, PathPattern};
use serde::{Deserialize, Serialize};

use crate::collaborators::{AddressFields, AddressLookup, AddressPart, CollaboratorError};

/// Default quiescence window between the last keystroke and the lookup.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// A postal-code field whose lookup result fills sibling fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupBinding {
    pub trigger: PathPattern,
    /// Sibling key receiving each address part.
    #[serde(default = "default_targets")]
    pub targets: BTreeMap<AddressPart, String>,
}

fn default_targets() -> BTreeMap<AddressPart, String> {
    BTreeMap::from([
        (AddressPart::Street, "logradouro".to_string()),
        (AddressPart::Neighborhood, "bairro".to_string()),
        (AddressPart::City, "cidade".to_string()),
        (AddressPart::State, "uf".to_string()),
    ])
}

impl LookupBinding {
    pub fn new(trigger: PathPattern) -> Self {
        Self {
            trigger,
            targets: default_targets(),
        }
    }

    /// Concrete `(path, text)` writes for a lookup answer on `trigger`.
    pub fn writes(&self, trigger: &Path, fields: &AddressFields) -> Vec<(Path, String)> {
        let parent = trigger.parent().unwrap_or_default();
        self.targets
            .iter()
            .filter_map(|(part, key)| {
                fields
                    .part(*part)
                    .map(|text| (parent.clone().key(key.clone()), text.to_string()))
            })
            .collect()
    }
}

/// One edit of a bound postal-code field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub path: Path,
    pub value: String,
    pub generation: u64,
    /// The value is a complete postal code; incomplete edits only supersede.
    pub ready: bool,
}

#[derive(Debug)]
pub enum LookupOutcome {
    /// A newer edit arrived during the window; the collaborator was not called.
    Superseded(LookupTicket),
    Completed {
        ticket: LookupTicket,
        result: Result<Option<AddressFields>, CollaboratorError>,
    },
}

/// Tracks the newest ticket per path and runs lookups after the window.
#[derive(Debug, Clone)]
pub struct LookupDebouncer {
    window: Duration,
    latest: Arc<Mutex<HashMap<Path, u64>>>,
}

impl LookupDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            latest: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a ticket as the newest for its path. Tickets are registered in
    /// the order the wizard issued them.
    pub fn register(&self, ticket: &LookupTicket) {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ticket.path.clone(), ticket.generation);
    }

    pub fn is_latest(&self, ticket: &LookupTicket) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ticket.path)
            .is_some_and(|generation| *generation == ticket.generation)
    }

    /// Wait out the window, then call the collaborator unless superseded.
    pub async fn run(&self, service: &dyn AddressLookup, ticket: LookupTicket) -> LookupOutcome {
        tokio::time::sleep(self.window).await;
        if !ticket.ready || !self.is_latest(&ticket) {
            tracing::debug!(
                path = %ticket.path,
                generation = ticket.generation,
                "lookup superseded"
            );
            return LookupOutcome::Superseded(ticket);
        }
        let result = service.lookup(&ticket.value).await;
        LookupOutcome::Completed { ticket, result }
    }
}

impl Default for LookupDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
