//! Binary encoding primitives used by the bytecode compiler, the program loader
//! and the two wire protocols spoken by the session multiplexer.
//!
//! Everything in this crate is little-endian, matching the bytecode format
//! described by the driver's internal wire contract.

pub mod binary_reader;
pub mod binary_writer;
pub mod error;
pub mod sandbox;

pub use binary_reader::BinaryReader;
pub use binary_writer::BinaryWriter;
pub use error::{IoError, IoResult};
pub use sandbox::resolve_under_root;
