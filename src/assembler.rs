use std::iter::Peekable;
use std::slice::Iter;

use log::{debug, warn};

use crate::error::AssembleError;
use crate::isa::{ArgKind, Opcode, WordBuilder};
use crate::lex::{Token, TokenKind};
use crate::Verbosity;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const MAX_CAPACITY: usize = 1 << 16;

/// Assembled words in a fixed-capacity, zero-filled memory image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    mem: Vec<u32>,
    len: usize,
}

impl Program {
    pub fn new(mut words: Vec<u32>, capacity: usize) -> Self {
        let len = words.len().min(capacity);
        words.resize(capacity, 0);
        Self { mem: words, len }
    }

    pub fn words(&self) -> &[u32] {
        &self.mem[..self.len]
    }

    pub fn memory(&self) -> &[u32] {
        &self.mem
    }

    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

struct Assembler<'a> {
    it: Peekable<Iter<'a, Token>>,
    words: Vec<u32>,
    errors: Vec<AssembleError>,
    verbosity: Verbosity,
}

impl<'a> Assembler<'a> {
    fn new(tokens: &'a [Token], verbosity: Verbosity) -> Self {
        Self {
            it: tokens.iter().peekable(),
            words: vec![],
            errors: vec![],
            verbosity,
        }
    }

    fn make_words(mut self) -> (Vec<u32>, Vec<AssembleError>) {
        while let Some(token) = self.consume() {
            let TokenKind::Opcode(opcode) = token.kind else {
                warn!(
                    "line {}: skipping {} token outside of an instruction",
                    token.line,
                    token.kind.name()
                );
                continue;
            };

            if let Err(e) = self.instruction(opcode, token.line) {
                self.errors.push(e);
                break;
            }
        }

        (self.words, self.errors)
    }

    fn consume(&mut self) -> Option<Token> {
        self.it.next().copied()
    }

    fn peek(&mut self) -> Option<Token> {
        self.it.peek().copied().copied()
    }

    fn add_word(&mut self, word: u32) {
        if self.verbosity >= Verbosity::Debug {
            debug!("assemble: {:04x}: {word:08x}", self.words.len());
        }
        self.words.push(word);
    }

    /// Consumes one token per signature entry. A mismatched register or
    /// literal drops the instruction but is still consumed; an opcode in
    /// argument position drops it and is left to start the next instruction.
    /// Running out of tokens is fatal.
    fn instruction(&mut self, opcode: Opcode, line: usize) -> Result<(), AssembleError> {
        let signature = opcode.signature();
        let mut builder = WordBuilder::new(opcode);
        let mut valid = true;

        for (index, &expected) in signature.iter().enumerate() {
            let Some(arg) = self.peek() else {
                return Err(AssembleError::UnexpectedEndOfTokens {
                    line,
                    opcode,
                    expected: signature.len(),
                });
            };

            if let TokenKind::Opcode(_) = arg.kind {
                self.errors.push(AssembleError::ArgumentMismatch {
                    line,
                    opcode,
                    index,
                    expected,
                    found: arg.kind.name(),
                });
                warn!("line {line}: dropping '{opcode}' instruction with missing arguments");
                return Ok(());
            }
            self.consume();

            match (expected, arg.kind) {
                (ArgKind::Register, TokenKind::Register(reg)) => builder.push_register(reg),
                (ArgKind::Literal, TokenKind::Literal(val)) => builder.push_literal(val),
                (_, found) => {
                    self.errors.push(AssembleError::ArgumentMismatch {
                        line: arg.line,
                        opcode,
                        index,
                        expected,
                        found: found.name(),
                    });
                    valid = false;
                }
            }
        }

        if valid {
            self.add_word(builder.finish());
        } else {
            warn!("line {line}: dropping malformed '{opcode}' instruction");
        }

        Ok(())
    }
}

pub fn assemble(
    tokens: &[Token],
    capacity: usize,
    verbosity: Verbosity,
) -> Result<Program, (Program, Vec<AssembleError>)> {
    let (words, mut errors) = Assembler::new(tokens, verbosity).make_words();

    if words.len() > capacity {
        errors.push(AssembleError::ProgramTooLarge {
            len: words.len(),
            capacity,
        });
    }

    let program = Program::new(words, capacity);

    if errors.is_empty() {
        Ok(program)
    } else {
        Err((program, errors))
    }
}
