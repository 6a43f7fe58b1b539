use std::fmt;
use std::ops::{Index, IndexMut};

use log::debug;

use crate::assembler::Program;
use crate::error::{DecodeError, ExecError};
use crate::isa::{Instruction, Reg, REGISTER_COUNT, REGISTER_NAMES, REG_FL, REG_IP};
use crate::Verbosity;

/// Console sink for listings and register traces.
pub trait Log {
    fn log(&mut self, msg: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers([u16; REGISTER_COUNT]);

impl Registers {
    /// All zero except the instruction pointer.
    pub fn new(entry: u16) -> Self {
        let mut regs = [0; REGISTER_COUNT];
        regs[REG_IP] = entry;
        Self(regs)
    }

    pub fn ip(&self) -> u16 {
        self.0[REG_IP]
    }

    pub fn set_ip(&mut self, ip: u16) {
        self.0[REG_IP] = ip;
    }

    pub fn zero_flag(&self) -> bool {
        self.0[REG_FL] != 0
    }

    pub fn set_zero_flag(&mut self, set: bool) {
        self.0[REG_FL] = set as u16;
    }

    pub fn values(&self) -> [u16; REGISTER_COUNT] {
        self.0
    }
}

impl Index<Reg> for Registers {
    type Output = u16;

    fn index(&self, reg: Reg) -> &u16 {
        &self.0[reg.index()]
    }
}

impl IndexMut<Reg> for Registers {
    fn index_mut(&mut self, reg: Reg) -> &mut u16 {
        &mut self.0[reg.index()]
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, val)) in REGISTER_NAMES.iter().zip(self.0).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}={val:04X}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    pub registers: Registers,
    pub steps: u64,
    pub halted: bool,
}

/// Result of a run that ended on `q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u64,
    pub registers: Registers,
}

pub struct Interpreter<'a, L: Log> {
    program: &'a Program,
    registers: Registers,
    steps: u64,
    halted: bool,
    logger: &'a mut L,
    verbosity: Verbosity,
}

impl<'a, L: Log> Interpreter<'a, L> {
    pub fn new(program: &'a Program, entry: u16, logger: &'a mut L, verbosity: Verbosity) -> Self {
        Self {
            program,
            registers: Registers::new(entry),
            steps: 0,
            halted: false,
            logger,
            verbosity,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn state(&self) -> State {
        State {
            registers: self.registers,
            steps: self.steps,
            halted: self.halted,
        }
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// Steps until `q`. Leaving program memory, a bad word, or passing
    /// `max_steps` ends the run with an error.
    pub fn run(&mut self, max_steps: Option<u64>) -> Result<RunSummary, ExecError> {
        while !self.halted {
            if let Some(limit) = max_steps {
                if self.steps >= limit {
                    self.halted = true;
                    return Err(ExecError::StepLimitExceeded { limit });
                }
            }
            self.step()?;
        }

        Ok(RunSummary {
            steps: self.steps,
            registers: self.registers,
        })
    }

    pub fn step(&mut self) -> Result<(), ExecError> {
        if self.halted {
            self.logger.log("Cannot step: machine is halted".into());
            return Ok(());
        }

        let ins = match self.fetch() {
            Ok(ins) => ins,
            Err(e) => {
                self.halted = true;
                return Err(e);
            }
        };
        self.steps += 1;

        let op = ins.opcode();
        let dest = self.execute(ins);

        if self.halted {
            return Ok(());
        }

        if op.sets_flags() {
            let zero = dest.is_some_and(|d| self.registers[d] == 0);
            self.registers.set_zero_flag(zero);
        }

        if !op.jumps() {
            let ip = self.registers.ip();
            self.registers.set_ip(ip.wrapping_add(1));
        }

        if self.verbosity >= Verbosity::Normal {
            self.logger.log(format!("{}", self.registers));
        }

        Ok(())
    }

    fn fetch(&mut self) -> Result<Instruction, ExecError> {
        let ip = self.registers.ip();

        let Some(&word) = self.program.memory().get(ip as usize) else {
            return Err(ExecError::InstructionPointerOutOfRange {
                ip,
                capacity: self.program.capacity(),
            });
        };

        let ins = Instruction::decode(word).map_err(|e| match e {
            DecodeError::InvalidOpcode(byte) => ExecError::InvalidOpcode { ip, byte },
            DecodeError::InvalidRegister(index) => ExecError::InvalidRegister { ip, index },
        })?;

        if self.verbosity >= Verbosity::Debug {
            debug!("execute: {ip:04x}: {word:08x} {ins}");
        }

        Ok(ins)
    }

    /// Runs one instruction, returning the register it wrote, if any.
    fn execute(&mut self, ins: Instruction) -> Option<Reg> {
        let regs = &mut self.registers;

        match ins {
            Instruction::Nop => None,
            Instruction::AddReg(d, s) => {
                regs[d] = regs[d].wrapping_add(regs[s]);
                Some(d)
            }
            Instruction::AddImm(d, imm) => {
                regs[d] = regs[d].wrapping_add(imm);
                Some(d)
            }
            Instruction::SubReg(d, s) => {
                regs[d] = regs[d].wrapping_sub(regs[s]);
                Some(d)
            }
            Instruction::SubImm(d, imm) => {
                regs[d] = regs[d].wrapping_sub(imm);
                Some(d)
            }
            Instruction::Xor(d, s) => {
                regs[d] ^= regs[s];
                Some(d)
            }
            Instruction::Or(d, s) => {
                regs[d] |= regs[s];
                Some(d)
            }
            Instruction::And(d, s) => {
                regs[d] &= regs[s];
                Some(d)
            }
            Instruction::Move(d, s) => {
                regs[d] = regs[s];
                Some(d)
            }
            Instruction::Quit => {
                let ip = regs.ip();
                self.halted = true;
                if self.verbosity >= Verbosity::Normal {
                    self.logger.log(format!("--> q at address {ip}: done"));
                }
                None
            }
            Instruction::Jump(target) => {
                regs.set_ip(target);
                None
            }
            Instruction::JumpZero(target) => {
                let next = if regs.zero_flag() {
                    target
                } else {
                    regs.ip().wrapping_add(1)
                };
                regs.set_ip(next);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{assemble, DEFAULT_CAPACITY};
    use crate::lex::tokenize;
    use crate::vec_log::VecLog;

    fn program(source: &str) -> Program {
        program_with_capacity(source, DEFAULT_CAPACITY)
    }

    fn program_with_capacity(source: &str, capacity: usize) -> Program {
        let tokens = tokenize(source.as_bytes(), Verbosity::Quiet).unwrap();
        assemble(&tokens, capacity, Verbosity::Quiet).unwrap()
    }

    fn run(program: &Program, entry: u16) -> Result<RunSummary, ExecError> {
        let mut logger = VecLog::default();
        let mut interpreter = Interpreter::new(program, entry, &mut logger, Verbosity::Quiet);
        interpreter.run(Some(10_000))
    }

    fn reg(i: u8) -> Reg {
        Reg::new(i).unwrap()
    }

    #[test]
    fn add_immediate() {
        let summary = run(&program("A r0,300\nq\n"), 0).unwrap();
        assert_eq!(summary.registers[reg(0)], 300);
        assert_eq!(summary.steps, 2);
    }

    #[test]
    fn move_then_xor_sets_zero_flag() {
        let program = program("m r1,r0\n^ r0,r1\nq\n");
        let mut logger = VecLog::default();
        let mut interpreter = Interpreter::new(&program, 0, &mut logger, Verbosity::Quiet);
        interpreter.registers_mut()[reg(0)] = 5;

        interpreter.step().unwrap();
        interpreter.step().unwrap();

        let state = interpreter.state();
        assert_eq!(state.registers[reg(0)], 0);
        assert_eq!(state.registers[reg(1)], 5);
        assert!(state.registers.zero_flag());
        assert_eq!(
            Instruction::decode(program.memory()[state.registers.ip() as usize]),
            Ok(Instruction::Quit)
        );

        interpreter.step().unwrap();
        assert!(interpreter.is_halted());
    }

    #[test]
    fn arithmetic_wraps() {
        let summary = run(&program("S r0, 1\nA r1, 65535\nA r1, 2\nq"), 0).unwrap();
        assert_eq!(summary.registers[reg(0)], 0xffff);
        assert_eq!(summary.registers[reg(1)], 1);
        assert!(!summary.registers.zero_flag());
    }

    #[test]
    fn register_operations() {
        let src = "
            A r0, 12   ; 0b1100
            A r1, 10   ; 0b1010
            m r2, r0
            & r2, r1
            m r3, r0
            | r3, r1
            m r4, r0
            ^ r4, r1
            a r0, r1
            s r1, r0
            q";
        let regs = run(&program(src), 0).unwrap().registers;
        assert_eq!(regs[reg(2)], 8);
        assert_eq!(regs[reg(3)], 14);
        assert_eq!(regs[reg(4)], 6);
        assert_eq!(regs[reg(0)], 22);
        assert_eq!(regs[reg(1)], 10u16.wrapping_sub(22));
    }

    #[test]
    fn jump_if_zero() {
        // not taken: r0 is 1
        let regs = run(&program("A r0,1\njz 4\nA r1,1\nq\nA r2,1\nq"), 0)
            .unwrap()
            .registers;
        assert_eq!((regs[reg(1)], regs[reg(2)]), (1, 0));

        // taken: r0 is 0
        let regs = run(&program("S r0,0\njz 3\nA r1,1\nq"), 0).unwrap().registers;
        assert_eq!(regs[reg(1)], 0);
        assert_eq!(regs.ip(), 3);
    }

    #[test]
    fn jumps_keep_flags() {
        let src = "^ r0,r0\nj 2\njz 4\nq\nA r1, 9\nq";
        let regs = run(&program(src), 0).unwrap().registers;
        assert_eq!(regs[reg(1)], 9);
    }

    #[test]
    fn nop_clears_flag() {
        let regs = run(&program("^ r0,r0\nn\nq"), 0).unwrap().registers;
        assert!(!regs.zero_flag());
    }

    #[test]
    fn starts_at_entry_offset() {
        let summary = run(&program("A r0,1\nq\nA r1,2\nq"), 2).unwrap();
        assert_eq!(summary.registers[reg(0)], 0);
        assert_eq!(summary.registers[reg(1)], 2);
        assert_eq!(summary.steps, 2);
    }

    #[test]
    fn endless_loop_hits_step_limit() {
        let program = program("n\nj 0");
        let mut logger = VecLog::default();
        let mut interpreter = Interpreter::new(&program, 0, &mut logger, Verbosity::Quiet);

        assert_eq!(
            interpreter.run(Some(100)),
            Err(ExecError::StepLimitExceeded { limit: 100 })
        );
        assert_eq!(interpreter.state().steps, 100);
    }

    #[test]
    fn running_off_the_end_is_an_error() {
        let program = program_with_capacity("A r0, 1", 4);
        assert_eq!(
            run(&program, 0),
            Err(ExecError::InstructionPointerOutOfRange { ip: 4, capacity: 4 })
        );

        assert_eq!(
            run(&self::program("j 5000"), 0),
            Err(ExecError::InstructionPointerOutOfRange {
                ip: 5000,
                capacity: DEFAULT_CAPACITY
            })
        );
    }

    #[test]
    fn rejects_undecodable_words() {
        let program = Program::new(vec![0x0200_0001, 0x0c00_0000], 4);
        assert_eq!(
            run(&program, 0),
            Err(ExecError::InvalidOpcode { ip: 1, byte: 0x0c })
        );

        let program = Program::new(vec![0x0109_0000], 4);
        assert_eq!(
            run(&program, 0),
            Err(ExecError::InvalidRegister { ip: 0, index: 9 })
        );
    }

    #[test]
    fn traces_registers() {
        let program = program("A r0, 1\nq");
        let mut logger = VecLog::default();
        let mut interpreter = Interpreter::new(&program, 0, &mut logger, Verbosity::Normal);
        interpreter.run(None).unwrap();
        interpreter.step().unwrap();

        assert_eq!(
            logger.lines,
            vec![
                "A=0001 B=0000 C=0000 D=0000 E=0000 BP=0000 IP=0001 FL=0000".to_owned(),
                "--> q at address 1: done".to_owned(),
                "Cannot step: machine is halted".to_owned(),
            ]
        );
    }
}
