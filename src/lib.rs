// Static probe for Z-Machine story files: header, memory regions, a linear
// instruction trace, and object property compliance.

pub mod config;
pub mod error;
pub mod header;
pub mod instruction;
pub mod memory;
pub mod opcode_tables;
pub mod properties;
pub mod report;
pub mod story;
pub mod text;
pub mod tracer;

pub use error::{ProbeError, ProbeResult};

#[cfg(test)]
mod test_utils;
