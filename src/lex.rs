use log::debug;

use crate::error::LexError;
use crate::isa::{Opcode, Reg};
use crate::Verbosity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Opcode(Opcode),
    Register(Reg),
    Literal(u16),
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opcode(_) => "opcode",
            Self::Register(_) => "register",
            Self::Literal(_) => "literal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn value(&self) -> u16 {
        match self.kind {
            TokenKind::Opcode(op) => op.code() as u16,
            TokenKind::Register(reg) => reg.index() as u16,
            TokenKind::Literal(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Opcode,
    Register,
    Digit,
    Comment,
    Newline,
    Whitespace,
    Unrecognized,
}

fn classify(b: u8) -> Class {
    match b {
        b'n' | b'a' | b'A' | b's' | b'S' | b'^' | b'|' | b'&' | b'm' | b'q' | b'j' => Class::Opcode,
        b'r' => Class::Register,
        b'0'..=b'9' => Class::Digit,
        b';' => Class::Comment,
        b'\n' => Class::Newline,
        b' ' | b'\t' | b',' | b'\r' => Class::Whitespace,
        _ => Class::Unrecognized,
    }
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    verbosity: Verbosity,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a [u8], verbosity: Verbosity) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            tokens: vec![],
            errors: vec![],
            verbosity,
        }
    }

    fn make_tokens(mut self) -> Result<Vec<Token>, (Vec<Token>, Vec<LexError>)> {
        while let Some(b) = self.consume() {
            let res = match classify(b) {
                Class::Opcode => self.opcode(b),
                Class::Register => self.register(b),
                Class::Digit => {
                    self.literal(b);
                    Ok(())
                }
                Class::Comment => {
                    self.consume_while(|b| b != b'\n');
                    Ok(())
                }
                Class::Newline | Class::Whitespace => Ok(()),
                Class::Unrecognized => Err(LexError::UnrecognizedCharacter {
                    line: self.line,
                    byte: b,
                }),
            };

            if let Err(e) = res {
                let fatal = e.is_fatal();
                self.errors.push(e);
                if fatal {
                    break;
                }
            }
        }

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err((self.tokens, self.errors))
        }
    }

    fn consume(&mut self) -> Option<u8> {
        let b = *self.source.get(self.pos)?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn consume_while<F>(&mut self, condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(b) = self.peek() {
            if condition(b) {
                self.consume();
            } else {
                break;
            }
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        if self.verbosity >= Verbosity::Debug {
            debug!("lex: line {}: {:?}", self.line, kind);
        }
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn opcode(&mut self, ch: u8) -> Result<(), LexError> {
        let Some(op) = Opcode::from_mnemonic(ch, self.peek()) else {
            return Err(LexError::UnrecognizedCharacter {
                line: self.line,
                byte: ch,
            });
        };
        self.add_token(TokenKind::Opcode(op));

        // stray letters after a mnemonic ("add", "jz", "quit") belong to it
        self.consume_while(|b| matches!(classify(b), Class::Opcode | Class::Unrecognized));

        Ok(())
    }

    fn register(&mut self, marker: u8) -> Result<(), LexError> {
        if marker != b'r' {
            return Err(LexError::MissingRegisterMarker { line: self.line });
        }

        let start = self.pos;
        self.consume_while(|b| b.is_ascii_digit());
        let digits = &self.source[start..self.pos];

        let reg = match digits {
            [d] => Reg::new(d - b'0'),
            _ => None,
        };

        match reg {
            Some(reg) => {
                self.add_token(TokenKind::Register(reg));
                Ok(())
            }
            None => Err(LexError::InvalidRegister {
                line: self.line,
                text: format!("r{}", String::from_utf8_lossy(digits)),
            }),
        }
    }

    fn literal(&mut self, first: u8) {
        let mut val = (first - b'0') as u16;

        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            val = val.wrapping_mul(10).wrapping_add((b - b'0') as u16);
            self.consume();
        }

        self.add_token(TokenKind::Literal(val));
    }
}

pub fn tokenize(
    source: &[u8],
    verbosity: Verbosity,
) -> Result<Vec<Token>, (Vec<Token>, Vec<LexError>)> {
    Lexer::new(source, verbosity).make_tokens()
}
