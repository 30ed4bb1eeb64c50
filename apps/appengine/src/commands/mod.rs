//! Command implementations for the appengine CLI.
//!
//! - [`install`] - Resolve, download and install the SDK, then publish its tools

pub mod install;
