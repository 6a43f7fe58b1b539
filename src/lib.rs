mod assembler;
mod lex;
#[cfg(test)]
mod vec_log;

pub mod cli;
pub mod error;
pub mod interpreter;
pub mod isa;

use clap::ValueEnum;
use log::LevelFilter;

use error::{Diagnostic, LexError};

pub use assembler::{Program, DEFAULT_CAPACITY, MAX_CAPACITY};
pub use lex::{Token, TokenKind};

/// How much each stage reports while it works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, ValueEnum)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Listings and the register trace.
    #[default]
    Normal,
    /// Also every token, assembled word and fetched instruction.
    Debug,
}

impl Verbosity {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Error,
            Self::Normal => LevelFilter::Warn,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

#[derive(Debug)]
pub struct AesopProgram {
    pub tokens: Vec<Token>,
    pub program: Program,
}

/// Lexes and assembles `source`. Recoverable diagnostics from both stages are
/// collected; a fatal one stops the pipeline where it happened.
///
/// ```
/// use aesop::{make_program, TokenKind, Verbosity, DEFAULT_CAPACITY};
///
/// let built = make_program(b"A r0, 2\nq", DEFAULT_CAPACITY, Verbosity::Quiet).unwrap();
/// assert_eq!(built.tokens.len(), 4);
/// assert!(matches!(built.tokens[2].kind, TokenKind::Literal(2)));
/// assert_eq!(built.program.words(), &[0x0200_0002, 0x0900_0000]);
/// ```
pub fn make_program(
    source: &[u8],
    capacity: usize,
    verbosity: Verbosity,
) -> Result<AesopProgram, Vec<Diagnostic>> {
    let mut errors: Vec<Diagnostic> = vec![];

    let tokens = match lex::tokenize(source, verbosity) {
        Ok(toks) => toks,
        Err((toks, errs)) => {
            let fatal = errs.iter().any(LexError::is_fatal);
            errors.extend(errs.into_iter().map(Diagnostic::from));
            if fatal {
                return Err(errors);
            }
            toks
        }
    };

    let program = match assembler::assemble(&tokens, capacity, verbosity) {
        Ok(p) => p,
        Err((p, errs)) => {
            errors.extend(errs.into_iter().map(Diagnostic::from));
            p
        }
    };

    if !errors.is_empty() {
        Err(errors)
    } else {
        Ok(AesopProgram { tokens, program })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssembleError, ExecError};
    use crate::interpreter::Interpreter;
    use crate::isa::Reg;
    use crate::vec_log::VecLog;

    fn build(source: &str) -> Result<AesopProgram, Vec<Diagnostic>> {
        make_program(source.as_bytes(), DEFAULT_CAPACITY, Verbosity::Quiet)
    }

    #[test]
    fn runs_a_countdown() {
        let src = "
            ; count r0 down from 5, summing into r1
            A r0, 5
            a r1, r0     ; 1: loop
            S r0, 1
            jz 5
            j 1
            q            ; 5";
        let program = build(src).unwrap().program;
        assert_eq!(program.len(), 6);

        let mut logger = VecLog::default();
        let mut interpreter = Interpreter::new(&program, 0, &mut logger, Verbosity::Quiet);
        let summary = interpreter.run(Some(1000)).unwrap();

        assert_eq!(summary.registers[Reg::new(0).unwrap()], 0);
        assert_eq!(summary.registers[Reg::new(1).unwrap()], 15);
        assert!(summary.registers.zero_flag());
    }

    #[test]
    fn missing_quit_runs_off_memory() {
        let program = make_program(b"A r0, 1\nn", 8, Verbosity::Quiet)
            .unwrap()
            .program;
        let mut logger = VecLog::default();
        let mut interpreter = Interpreter::new(&program, 0, &mut logger, Verbosity::Quiet);

        assert_eq!(
            interpreter.run(None),
            Err(ExecError::InstructionPointerOutOfRange { ip: 8, capacity: 8 })
        );
        assert_eq!(interpreter.state().steps, 8);
    }

    #[test]
    fn collects_errors_from_both_stages() {
        let errors = build("A r0, # 3\nA r9, 1\nq").unwrap_err();
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();

        assert_eq!(
            msgs,
            vec![
                "lexer: line 1: unrecognised character '#'",
                "lexer: line 2: invalid register \"r9\": expected r0 to r7",
                "assembler: line 2: 'A' expected register for argument 0, found literal",
                "assembler: line 2: 'A' expected literal for argument 1, found opcode",
            ]
        );
    }

    #[test]
    fn malformed_instruction_leaves_the_rest() {
        let errors = build("A r0\nq").unwrap_err();
        assert_eq!(errors.len(), 1);

        let tokens = lex::tokenize(b"A r0\nq", Verbosity::Quiet).unwrap();
        let (program, _) = assembler::assemble(&tokens, 4, Verbosity::Quiet).unwrap_err();
        assert_eq!(program.words(), &[0x0900_0000]);
    }

    #[test]
    fn end_of_tokens_is_reported() {
        let errors = build("q\nS r1").unwrap_err();
        assert!(matches!(
            errors[..],
            [Diagnostic::Assemble(AssembleError::UnexpectedEndOfTokens { .. })]
        ));
    }
}
