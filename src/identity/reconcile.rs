//! Startup identity reconciliation
//!
//! Decides whether the device has to (re-)register with the cloud service by
//! comparing what was requested on this run against what was persisted by the
//! last successful registration. Runs in two phases: [`resolve`] needs no
//! network and fails fast on a missing model id, [`ResolvedIdentity::decide`]
//! runs once the assistant session has reported the device id.

use super::registration::DeviceRegistration;
use crate::{Error, Result};

/// Identity inputs supplied at startup (CLI, env or config file)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationRequest {
    /// Model id the operator asked for, overriding the persisted one
    pub requested_model_id: Option<String>,

    /// Project id the operator asked for
    pub requested_project_id: Option<String>,

    /// Nickname shown in the user's device list
    pub nickname: Option<String>,
}

/// Outcome of reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationDecision {
    /// Persisted registration still matches this device
    NoActionNeeded,

    /// The registration call must run, then the record is persisted
    MustRegister {
        /// Model id to register under
        model_id: String,
        /// Project to register in
        project_id: String,
    },

    /// Registration is needed but no project id is known; run unregistered
    Unregistered {
        /// Model id the session runs with
        model_id: String,
    },
}

impl ReconciliationDecision {
    /// Whether the registration call has to be made
    #[must_use]
    pub const fn must_register(&self) -> bool {
        matches!(self, Self::MustRegister { .. })
    }
}

/// Identity settled before the assistant session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    model_id: String,
    project_id: Option<String>,
    nickname: Option<String>,
    last_device_id: Option<String>,
    model_changed: bool,
}

/// Settle the effective model and project id
///
/// # Errors
///
/// Returns [`Error::MissingModelId`] when neither the request nor the
/// persisted record carries a model id
pub fn resolve(
    requested: &RegistrationRequest,
    persisted: Option<&DeviceRegistration>,
) -> Result<ResolvedIdentity> {
    let persisted_model = persisted.and_then(|p| non_empty(&p.model_id));
    let requested_model = requested.requested_model_id.as_deref().and_then(non_empty);

    let model_id = requested_model
        .or(persisted_model)
        .ok_or(Error::MissingModelId)?
        .to_string();

    // An explicit model id that differs from the registered one forces a new
    // registration even if the device id never changes.
    let model_changed = requested_model.is_some_and(|m| Some(m) != persisted_model);

    let project_id = requested
        .requested_project_id
        .as_deref()
        .and_then(non_empty)
        .or_else(|| persisted.and_then(|p| non_empty(&p.project_id)))
        .map(ToString::to_string);

    Ok(ResolvedIdentity {
        model_id,
        project_id,
        nickname: requested.nickname.clone(),
        last_device_id: persisted.and_then(|p| p.last_device_id.clone()),
        model_changed,
    })
}

/// Empty values count as not given
fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

impl ResolvedIdentity {
    /// Effective model id for the assistant session
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Effective project id, if any
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Nickname for the registration call
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Whether the requested model id overrides the persisted one
    #[must_use]
    pub const fn model_changed(&self) -> bool {
        self.model_changed
    }

    /// Decide the registration action once the device id is known
    #[must_use]
    pub fn decide(&self, device_id: &str) -> ReconciliationDecision {
        let device_changed = self.last_device_id.as_deref() != Some(device_id);
        let should_register = self.model_changed || device_changed;

        if !should_register {
            return ReconciliationDecision::NoActionNeeded;
        }

        match &self.project_id {
            Some(project_id) => ReconciliationDecision::MustRegister {
                model_id: self.model_id.clone(),
                project_id: project_id.clone(),
            },
            None => ReconciliationDecision::Unregistered {
                model_id: self.model_id.clone(),
            },
        }
    }

    /// Record to persist after a successful registration for `device_id`
    #[must_use]
    pub fn registration_for(&self, project_id: &str, device_id: &str) -> DeviceRegistration {
        DeviceRegistration {
            model_id: self.model_id.clone(),
            project_id: project_id.to_string(),
            last_device_id: Some(device_id.to_string()),
        }
    }
}

/// Run both reconciliation phases at once
///
/// # Errors
///
/// Returns [`Error::MissingModelId`] when no model id is available
pub fn reconcile(
    requested: &RegistrationRequest,
    persisted: Option<&DeviceRegistration>,
    device_id: &str,
) -> Result<ReconciliationDecision> {
    resolve(requested, persisted).map(|identity| identity.decide(device_id))
}
