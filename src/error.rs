//! The fatal/non-fatal error taxonomy for the interpreter core.
//!
//! Grounded on `pierreyoda-rustif/rustifzm/src/errors.rs`'s structured
//! `ZmErrorKind` enum (there built on the now-unmaintained `failure` crate);
//! here rebuilt on `thiserror`, the modern equivalent for the same
//! "one variant per fault, `Display` derived from the attributes" shape.
//! Every variant corresponds to a row in the error taxonomy table.

use thiserror::Error;

/// An error raised by any core subsystem.
///
/// All variants except [`ZError::QuetzalMismatch`] are fatal: the engine
/// halts, reports the message via [`crate::host::Host::error`], and does
/// not resume. `QuetzalMismatch` is caught by the engine and turned into a
/// normal save/restore store or branch result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ZError {
    #[error("invalid story file: {reason}")]
    InvalidStoryFile { reason: String },

    #[error("unsupported Z-Machine version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("out-of-bounds memory access at {address:#06x} (len {len})")]
    OutOfBoundsMemoryAccess { address: u32, len: usize },

    #[error("write to static/high memory at {address:#06x} (static base {static_base:#06x})")]
    WriteToStaticMemory { address: u32, static_base: u16 },

    #[error("unsupported opcode {opcode:#04x} at PC {pc:#06x}")]
    UnsupportedOpcode { opcode: u8, pc: u32 },

    #[error("stack underflow: {context}")]
    StackUnderflow { context: String },

    #[error("local variable index {index} out of range (frame has {num_locals} locals)")]
    LocalOutOfRange { index: u8, num_locals: u8 },

    #[error("malformed object tree: {reason}")]
    MalformedObjectTree { reason: String },

    #[error("property {property} write length mismatch: declared {declared}, value needs {needed}")]
    PropertyWriteLengthMismatch {
        property: u8,
        declared: u8,
        needed: u8,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid ZSCII string: {reason}")]
    BadZsciiString { reason: String },

    #[error("Quetzal save/restore mismatch: {reason}")]
    QuetzalMismatch { reason: String },
}

pub type ZResult<T> = Result<T, ZError>;
