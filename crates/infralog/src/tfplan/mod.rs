//! Terraform plan parsing.
//!
//! Reads the JSON produced by `terraform show -json <planfile>` and converts
//! the proposed changes into the same [`StateDiff`](crate::tfstate::StateDiff)
//! the state poller produces, so every target can report on plans too.

mod filter;
mod plan;

pub use filter::apply_filter;
pub use plan::{actions_to_status, Action, Change, OutputChange, Plan, ResourceChange};
