//! Report assembly, persistence and rendering.

pub mod assembler;
pub mod generator;

pub use assembler::{assemble, persist, RunRecord};
pub use generator::write_report;
