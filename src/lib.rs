//! Crate for the `datadog-receiver` project
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod http;
pub mod logger;
pub mod otlp;
pub mod traces;

pub const RECEIVER_NAME: &str = "datadog-receiver";
pub const RECEIVER_VERSION: &str = env!("CARGO_PKG_VERSION");
