//! Items common to all components of the identity scan client.

pub mod config;
pub mod messages;
pub mod model;
