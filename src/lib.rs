#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod gateway;
pub mod init;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod paths;
pub mod progress;
pub mod provisioning;
pub mod session;
pub mod snapshots;
pub mod store;
pub mod view;

#[cfg(test)]
pub mod test_support;

/// How a state-changing controller operation ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The backend confirmed the change and the store reflects it.
    Applied,
    /// The user declined the confirmation; nothing was sent.
    Declined,
    /// The target disappeared from the store while the backend call was
    /// pending; the backend result was dropped.
    Vanished,
}
