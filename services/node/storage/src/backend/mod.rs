//! Configuration store backends

pub mod file;
pub mod mem;
