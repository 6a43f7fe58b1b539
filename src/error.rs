use thiserror::Error;

use crate::isa::{ArgKind, Opcode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}: unrecognised character '{}'", escaped(.byte))]
    UnrecognizedCharacter { line: usize, byte: u8 },
    #[error("line {line}: invalid register \"{text}\": expected r0 to r7")]
    InvalidRegister { line: usize, text: String },
    #[error("line {line}: register token without 'r' marker")]
    MissingRegisterMarker { line: usize },
}

/// Printable ASCII as itself, anything else as `\xNN`.
fn escaped(byte: &u8) -> std::ascii::EscapeDefault {
    std::ascii::escape_default(*byte)
}

impl LexError {
    /// Fatal errors stop the lexer; the rest are collected and lexing goes on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingRegisterMarker { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("line {line}: unexpected end of tokens: '{opcode}' expects {expected} argument(s)")]
    UnexpectedEndOfTokens {
        line: usize,
        opcode: Opcode,
        expected: usize,
    },
    #[error("line {line}: '{opcode}' expected {expected} for argument {index}, found {found}")]
    ArgumentMismatch {
        line: usize,
        opcode: Opcode,
        index: usize,
        expected: ArgKind,
        found: &'static str,
    },
    #[error("too many instructions: {len} > {capacity}")]
    ProgramTooLarge { len: usize, capacity: usize },
}

impl AssembleError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ArgumentMismatch { .. })
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("invalid register index {0}")]
    InvalidRegister(u8),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("invalid opcode 0x{byte:02x} at address {ip}")]
    InvalidOpcode { ip: u16, byte: u8 },
    #[error("invalid register index {index} at address {ip}")]
    InvalidRegister { ip: u16, index: u8 },
    #[error("instruction pointer out of range: {ip} >= {capacity}")]
    InstructionPointerOutOfRange { ip: u16, capacity: usize },
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },
}

/// Any error from the pipeline, tagged with the stage that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("lexer: {0}")]
    Lex(#[from] LexError),
    #[error("assembler: {0}")]
    Assemble(#[from] AssembleError),
    #[error("execute: {0}")]
    Exec(#[from] ExecError),
}
