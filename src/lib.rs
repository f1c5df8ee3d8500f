//! Normalization of U.S. postal addresses into five upper-cased, abbreviated
//! components, with CSV batch processing and optional remote verification.

pub mod address;
pub mod cli;
pub mod pipeline;
pub mod record;
pub mod samples;
pub mod utils;
pub mod verify;
