//! Core business logic for inkwell.

pub mod services;

pub use services::*;
