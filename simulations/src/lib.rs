//! End-to-end simulations of the capture-verify-report flow against an
//! in-process stub of the backing services.

pub mod harness;

#[cfg(test)]
mod flow;
