//! Opcode table, register file layout and the 32-bit word format.
//!
//! A word holds the opcode in bits 31-24 and up to three operand bytes after
//! it, filled left to right by the opcode's argument signature: a register
//! takes one byte, a literal two bytes big-endian. Unused bytes stay zero.

use std::fmt;

use crate::error::DecodeError;

pub const REGISTER_COUNT: usize = 8;

pub const REG_BP: usize = 5;
pub const REG_IP: usize = 6;
pub const REG_FL: usize = 7;

pub const REGISTER_NAMES: [&str; REGISTER_COUNT] = ["A", "B", "C", "D", "E", "BP", "IP", "FL"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Register,
    Literal,
}

impl ArgKind {
    /// Bytes taken in the instruction word.
    pub fn width(self) -> usize {
        match self {
            Self::Register => 1,
            Self::Literal => 2,
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => write!(f, "register"),
            Self::Literal => write!(f, "literal"),
        }
    }
}

use ArgKind::{Literal, Register};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop = 0x00,
    AddReg = 0x01,
    AddImm = 0x02,
    SubReg = 0x03,
    SubImm = 0x04,
    Xor = 0x05,
    Or = 0x06,
    And = 0x07,
    Move = 0x08,
    Quit = 0x09,
    Jump = 0x0a,
    JumpZero = 0x0b,
}

impl Opcode {
    pub const ALL: [Opcode; 12] = [
        Self::Nop,
        Self::AddReg,
        Self::AddImm,
        Self::SubReg,
        Self::SubImm,
        Self::Xor,
        Self::Or,
        Self::And,
        Self::Move,
        Self::Quit,
        Self::Jump,
        Self::JumpZero,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Maps a mnemonic character to its opcode. `next` is the byte after it,
    /// needed to tell `jz` from `j`.
    pub fn from_mnemonic(ch: u8, next: Option<u8>) -> Option<Self> {
        let op = match ch {
            b'n' => Self::Nop,
            b'a' => Self::AddReg,
            b'A' => Self::AddImm,
            b's' => Self::SubReg,
            b'S' => Self::SubImm,
            b'^' => Self::Xor,
            b'|' => Self::Or,
            b'&' => Self::And,
            b'm' => Self::Move,
            b'q' => Self::Quit,
            b'j' if next == Some(b'z') => Self::JumpZero,
            b'j' => Self::Jump,
            _ => return None,
        };

        Some(op)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "n",
            Self::AddReg => "a",
            Self::AddImm => "A",
            Self::SubReg => "s",
            Self::SubImm => "S",
            Self::Xor => "^",
            Self::Or => "|",
            Self::And => "&",
            Self::Move => "m",
            Self::Quit => "q",
            Self::Jump => "j",
            Self::JumpZero => "jz",
        }
    }

    pub fn signature(self) -> &'static [ArgKind] {
        match self {
            Self::Nop | Self::Quit => &[],
            Self::AddImm | Self::SubImm => &[Register, Literal],
            Self::AddReg | Self::SubReg | Self::Xor | Self::Or | Self::And | Self::Move => {
                &[Register, Register]
            }
            Self::Jump | Self::JumpZero => &[Literal],
        }
    }

    /// Arithmetic, bitwise and move instructions set the zero flag from their
    /// destination register. `n` has no destination and clears it.
    pub fn sets_flags(self) -> bool {
        !matches!(self, Self::Quit | Self::Jump | Self::JumpZero)
    }

    /// Instructions that manage the instruction pointer themselves.
    pub fn jumps(self) -> bool {
        matches!(self, Self::Quit | Self::Jump | Self::JumpZero)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Register index, always below [`REGISTER_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(u8);

impl Reg {
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < REGISTER_COUNT {
            Some(Reg(index))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Packs operands into a word left to right, one signature entry at a time.
pub struct WordBuilder {
    word: u32,
    offset: usize,
}

impl WordBuilder {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            word: (opcode.code() as u32) << 24,
            offset: 1,
        }
    }

    pub fn push_register(&mut self, reg: Reg) {
        self.word |= (reg.0 as u32) << (24 - 8 * self.offset);
        self.offset += 1;
    }

    pub fn push_literal(&mut self, val: u16) {
        self.word |= (val as u32) << (16 - 8 * self.offset);
        self.offset += 2;
    }

    pub fn finish(self) -> u32 {
        self.word
    }
}

struct OperandReader {
    bytes: [u8; 4],
    offset: usize,
}

impl OperandReader {
    fn new(word: u32) -> Self {
        Self {
            bytes: word.to_be_bytes(),
            offset: 1,
        }
    }

    fn register(&mut self) -> Result<Reg, DecodeError> {
        let byte = self.bytes[self.offset];
        self.offset += 1;
        Reg::new(byte).ok_or(DecodeError::InvalidRegister(byte))
    }

    fn literal(&mut self) -> u16 {
        let val = u16::from_be_bytes([self.bytes[self.offset], self.bytes[self.offset + 1]]);
        self.offset += 2;
        val
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    AddReg(Reg, Reg),
    AddImm(Reg, u16),
    SubReg(Reg, Reg),
    SubImm(Reg, u16),
    Xor(Reg, Reg),
    Or(Reg, Reg),
    And(Reg, Reg),
    Move(Reg, Reg),
    Quit,
    Jump(u16),
    JumpZero(u16),
}

impl Instruction {
    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        let code = (word >> 24) as u8;
        let opcode = Opcode::from_byte(code).ok_or(DecodeError::InvalidOpcode(code))?;
        let mut r = OperandReader::new(word);

        let ins = match opcode {
            Opcode::Nop => Self::Nop,
            Opcode::AddReg => Self::AddReg(r.register()?, r.register()?),
            Opcode::AddImm => Self::AddImm(r.register()?, r.literal()),
            Opcode::SubReg => Self::SubReg(r.register()?, r.register()?),
            Opcode::SubImm => Self::SubImm(r.register()?, r.literal()),
            Opcode::Xor => Self::Xor(r.register()?, r.register()?),
            Opcode::Or => Self::Or(r.register()?, r.register()?),
            Opcode::And => Self::And(r.register()?, r.register()?),
            Opcode::Move => Self::Move(r.register()?, r.register()?),
            Opcode::Quit => Self::Quit,
            Opcode::Jump => Self::Jump(r.literal()),
            Opcode::JumpZero => Self::JumpZero(r.literal()),
        };

        Ok(ins)
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::AddReg(..) => Opcode::AddReg,
            Self::AddImm(..) => Opcode::AddImm,
            Self::SubReg(..) => Opcode::SubReg,
            Self::SubImm(..) => Opcode::SubImm,
            Self::Xor(..) => Opcode::Xor,
            Self::Or(..) => Opcode::Or,
            Self::And(..) => Opcode::And,
            Self::Move(..) => Opcode::Move,
            Self::Quit => Opcode::Quit,
            Self::Jump(_) => Opcode::Jump,
            Self::JumpZero(_) => Opcode::JumpZero,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match self {
            Self::Nop | Self::Quit => write!(f, "{op}"),
            Self::AddReg(d, s)
            | Self::SubReg(d, s)
            | Self::Xor(d, s)
            | Self::Or(d, s)
            | Self::And(d, s)
            | Self::Move(d, s) => write!(f, "{op} {d}, {s}"),
            Self::AddImm(d, imm) | Self::SubImm(d, imm) => write!(f, "{op} {d}, {imm}"),
            Self::Jump(target) | Self::JumpZero(target) => write!(f, "{op} {target}"),
        }
    }
}
