//! Command handlers — thin glue between the CLI surface and the
//! application services.

pub mod check;
pub mod cleanup;
pub mod update;
