//! Seams to the services the engine consumes but does not implement:
//! postal-code lookup, reference-data pick lists, and record submission.
//!
//! Methods return boxed futures for dyn compatibility.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use ficha_core::Record;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Address components returned by a postal-code lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AddressFields {
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub complement: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressPart {
    Street,
    Neighborhood,
    City,
    State,
    Complement,
}

impl AddressFields {
    pub fn part(&self, part: AddressPart) -> Option<&str> {
        match part {
            AddressPart::Street => Some(&self.street),
            AddressPart::Neighborhood => Some(&self.neighborhood),
            AddressPart::City => Some(&self.city),
            AddressPart::State => Some(&self.state),
            AddressPart::Complement => self.complement.as_deref(),
        }
    }
}

/// One entry of a reference-data pick list (bank, role, practice area).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OptionItem {
    pub id: String,
    pub label: String,
}

/// A field-level complaint returned by the submission service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rejection {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum SubmitOutcome {
    Ok { id: String },
    ValidationRejected { rejections: Vec<Rejection> },
    /// A uniqueness conflict (e.g. `"cpf"` already registered).
    Conflict { kind: String },
}

pub trait AddressLookup: Send + Sync {
    /// `Ok(None)` when the postal code is unknown.
    fn lookup<'a>(
        &'a self,
        cep: &'a str,
    ) -> BoxFuture<'a, Result<Option<AddressFields>, CollaboratorError>>;
}

pub trait ReferenceData: Send + Sync {
    fn fetch_options<'a>(
        &'a self,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Vec<OptionItem>, CollaboratorError>>;
}

pub trait SubmissionService: Send + Sync {
    fn submit<'a>(&'a self, payload: &'a Record)
    -> BoxFuture<'a, Result<SubmitOutcome, CollaboratorError>>;
}

/// Postal codes answered from memory. Keys are the bare 8 digits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryAddressBook {
    pub addresses: BTreeMap<String, AddressFields>,
}

impl AddressLookup for MemoryAddressBook {
    fn lookup<'a>(
        &'a self,
        cep: &'a str,
    ) -> BoxFuture<'a, Result<Option<AddressFields>, CollaboratorError>> {
        Box::pin(async move {
            let digits: String = cep.chars().filter(char::is_ascii_digit).collect();
            Ok(self.addresses.get(&digits).cloned())
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryReferenceData {
    pub lists: BTreeMap<String, Vec<OptionItem>>,
}

impl ReferenceData for MemoryReferenceData {
    fn fetch_options<'a>(
        &'a self,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Vec<OptionItem>, CollaboratorError>> {
        Box::pin(async move {
            self.lists
                .get(kind)
                .cloned()
                .ok_or_else(|| CollaboratorError::InvalidResponse(format!("unknown list: {kind}")))
        })
    }
}

/// Answers submissions from a queue of canned outcomes, recording payloads.
#[derive(Debug, Default)]
pub struct ScriptedSubmission {
    outcomes: Mutex<Vec<Result<SubmitOutcome, CollaboratorError>>>,
    received: Mutex<Vec<Record>>,
}

impl ScriptedSubmission {
    /// Outcomes are returned in order, one per call.
    pub fn new(outcomes: Vec<Result<SubmitOutcome, CollaboratorError>>) -> Self {
        let mut outcomes = outcomes;
        outcomes.reverse();
        Self {
            outcomes: Mutex::new(outcomes),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<Record> {
        self.received
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl SubmissionService for ScriptedSubmission {
    fn submit<'a>(
        &'a self,
        payload: &'a Record,
    ) -> BoxFuture<'a, Result<SubmitOutcome, CollaboratorError>> {
        Box::pin(async move {
            self.received
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(payload.clone());
            self.outcomes
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop()
                .unwrap_or_else(|| {
                    Err(CollaboratorError::Unavailable(
                        "no scripted outcome left".to_string(),
                    ))
                })
        })
    }
}
