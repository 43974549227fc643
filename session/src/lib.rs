//! Client-side orchestration of the capture-verify-report flow.
//!
//! A session crosses the token gate once, acquires an ID document and a
//! portrait through [`capture`], submits both through the state machine in
//! [`machine`], and on a passed verdict hands the result to the pipeline in
//! [`report`], which renders, stores, registers and optionally emails the
//! finished report.

pub mod actions;
pub mod capture;
pub mod clock;
pub mod machine;
pub mod pdf;
pub mod report;
pub mod token;

#[cfg(test)]
pub(crate) mod testutil;
