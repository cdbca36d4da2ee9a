//! Client-side session lifecycle for the Sauron API.
//!
//! This crate provides:
//! - Token inspection (expiry from the bearer token payload)
//! - Single-flight token refresh with rotation
//! - A background refresh scheduler with an explicit FSM
//! - Authenticated requests that refresh and retry once on 401
//! - An `AuthClient` for login, signup, logout and account operations

mod client;
mod endpoints;
mod error;
mod expiry;
mod fetch;
pub mod inspector;
mod refresh;
mod scheduler;
mod transport;

#[cfg(test)]
mod test_support;

pub use client::{AuthClient, AuthStatus};
pub use endpoints::ApiEndpoints;
pub use error::{AuthError, AuthResult};
pub use expiry::{SessionExpiredHook, SessionExpiry};
pub use fetch::AuthenticatedClient;
pub use inspector::Claims;
pub use refresh::RefreshCoordinator;
pub use scheduler::scheduler_machine;
pub use scheduler::{
    RefreshScheduler, SchedulerConfig, SchedulerMachine, SchedulerMachineInput,
    SchedulerMachineState, SchedulerState, TickOutcome, DEFAULT_CHECK_INTERVAL,
};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};

pub use reqwest::{Method, StatusCode};
pub use sauron_storage::{TokenStore, UserProfile};
