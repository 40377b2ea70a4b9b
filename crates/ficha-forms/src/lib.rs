//! ficha-forms
//!
//! Form-state and validation engine for multi-step registration wizards.
//! Field descriptors, the rule engine, the array record manager, and the
//! step orchestrator. The only async code is at the collaborator seams.
//!
//! Public API:
//! - [`Wizard`]: owns the record and error map; `update`, `blur`,
//!   `insert_item`, `remove_item`, `go_next`, `go_back`, `go_to_step`
//! - [`Validator`]: `validate_field`, `validate_step`, change/blur triggers
//! - [`arrays`]: `insert`, `remove_at`, `reindex_errors`
//! - [`WizardDefinition`]: the declaration a wizard is built from

pub mod arrays;
pub mod collaborators;
pub mod definition;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod error_map;
pub mod lookup;
pub mod rules;
pub mod wizard;

pub use crate::definition::WizardDefinition;
pub use crate::descriptor::FieldDescriptor;
pub use crate::engine::Validator;
pub use crate::error::FormsError;
pub use crate::error_map::{ErrorMap, FieldError, FieldErrorKind};
pub use crate::rules::{Condition, Rule, Target, Trigger};
pub use crate::wizard::{Phase, Transition, Wizard};
