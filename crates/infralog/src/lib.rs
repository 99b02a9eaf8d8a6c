//! `infralog` - Terraform state drift notifications
//!
//! This library watches a Terraform state file (on S3 or local disk), diffs
//! successive versions and reports the resource and output changes to
//! configured targets. It can also report the changes proposed by a
//! `terraform show -json` plan.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod poller;
pub mod redact;
pub mod target;
pub mod tfplan;
pub mod tfstate;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use poller::{PollOutcome, Poller};
