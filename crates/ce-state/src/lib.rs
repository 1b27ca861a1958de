//! # ce-state — State Machines for Chartered Ease
//!
//! Each machine is an enum-valued state with methods that validate the
//! current state before moving, returning a structured error otherwise.
//!
//! ## State Machines
//!
//! - **Submission status** (`status.rs`, `submission.rs`): seven statuses
//!   from `Scheduled` to `Filed`/`Completed`, with an append-only transition
//!   log on each submission.
//!
//! - **GST return** (`gst_return.rs`): `Init → Login → Dashboard →
//!   TypeSelection → (Upload | NilConfirmation) → Processing`.
//!
//! - **Income tax return** (`income_tax.rs`): `Init → Login → AssessmentYear
//!   → IncomeSources → Upload → Review → Processing`.
//!
//! Both wizards support `back()` to exactly one predecessor per step and
//! finish with a [`FilingOutcome`] that the service layer turns into a client
//! profile plus a submission.

pub mod gst_return;
pub mod income_tax;
pub mod status;
pub mod submission;
pub mod wizard;

pub use gst_return::{GstReturnWizard, GstStep, ReturnPeriod, ReturnType};
pub use income_tax::{AssessmentYear, IncomeSource, IncomeTaxWizard, ItrStep};
pub use status::{StatusError, SubmissionStatus};
pub use submission::{StatusTransition, Submission, SubmissionError};
pub use wizard::{FilingOutcome, WizardError};
