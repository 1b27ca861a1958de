//! # ce-core — Foundational Types for Chartered Ease
//!
//! Every other crate in the workspace depends on `ce-core`; it depends on
//! nothing internal. It defines the domain primitives that the service layer
//! passes around instead of bare strings.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `ClientId`, `ProfileId`,
//!    `SubmissionId`, `FilingId` and `TaskId` are distinct types. You cannot
//!    pass a `ClientId` where a `SubmissionId` is expected.
//!
//! 2. **Validated value types.** `MobileNumber`, `Pan`, `Email`, `Gstin` and
//!    `Username` validate at construction and at deserialization. A value of
//!    one of these types is always well-formed.
//!
//! 3. **One principal type.** `Principal` is a sum type over the five roles
//!    (customer, agent, corporate, admin, associate). Authorization code
//!    matches on it exhaustively.
//!
//! 4. **UTC-only timestamps.** `Timestamp` is UTC, seconds precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ce-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod client;
pub mod document;
pub mod error;
pub mod identity;
pub mod legacy;
pub mod password;
pub mod principal;
pub mod service;
pub mod task;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use client::{Client, CreatedBy, EntityType, GstCredentials, ItrCredentials, NewClient, Profile};
pub use document::{DataUrl, Document, DocumentKind};
pub use error::ValidationError;
pub use identity::{
    ClientId, Email, FilingId, Gstin, MobileNumber, Pan, ProfileId, SubmissionId, TaskId,
    Username,
};
pub use password::{hash_password, verify_password, PasswordError};
pub use principal::{Principal, Role};
pub use service::ServiceKind;
pub use task::{AssociateTask, TaskError, TaskStatus};
pub use temporal::Timestamp;
