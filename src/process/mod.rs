// src/process/mod.rs

//! Bulk arrow transformations shared by every reader.

pub mod convert;
pub mod filter;
pub mod trimming;
pub mod utils;
