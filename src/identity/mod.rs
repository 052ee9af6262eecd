//! Device identity: persisted registration, startup reconciliation and the
//! cloud registration call

pub mod credentials;
pub mod reconcile;
pub mod registrar;
pub mod registration;

pub use credentials::Credentials;
pub use reconcile::{
    ReconciliationDecision, RegistrationRequest, ResolvedIdentity, reconcile, resolve,
};
pub use registrar::{CloudRegistrar, Registrar, RegistrationCall};
pub use registration::DeviceRegistration;
