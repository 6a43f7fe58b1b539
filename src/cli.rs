use tabled::{builder::Builder, settings::Style, Table, Tabled};

use std::{io, io::Write};

use crate::assembler::Program;
use crate::error::{Diagnostic, ExecError};
use crate::interpreter::{Interpreter, Log, Registers, State};
use crate::isa::{Instruction, REGISTER_NAMES};
use crate::lex::Token;
use crate::{AesopProgram, Verbosity};

pub struct Options {
    pub entry: u16,
    pub capacity: usize,
    pub max_steps: Option<u64>,
    pub verbosity: Verbosity,
}

struct CLILogger;

impl Log for CLILogger {
    fn log(&mut self, msg: String) {
        println!("{msg}");
    }
}

#[derive(Tabled)]
struct TokenRow {
    line: usize,
    kind: &'static str,
    value: String,
}

#[derive(Tabled)]
struct WordRow {
    address: String,
    word: String,
    instruction: String,
}

fn token_table(tokens: &[Token]) -> String {
    let rows = tokens.iter().map(|t| TokenRow {
        line: t.line,
        kind: t.kind.name(),
        value: format!("0x{:04x}", t.value()),
    });

    Table::new(rows).with(Style::sharp()).to_string()
}

fn listing_table(program: &Program) -> String {
    let rows = program.words().iter().enumerate().map(|(addr, &word)| WordRow {
        address: format!("{addr:08x}"),
        word: format!("{word:08X}"),
        instruction: disassemble(word),
    });

    Table::new(rows).with(Style::sharp()).to_string()
}

fn registers_table(registers: &Registers, steps: u64) -> String {
    let mut builder = Builder::default();

    let mut header = vec!["steps".to_owned()];
    header.extend(REGISTER_NAMES.iter().map(|n| n.to_string()));
    builder.push_record(header);

    let mut row = vec![steps.to_string()];
    row.extend(registers.values().iter().map(|v| format!("{v:04X}")));
    builder.push_record(row);

    builder.build().with(Style::sharp()).to_string()
}

fn disassemble(word: u32) -> String {
    match Instruction::decode(word) {
        Ok(ins) => ins.to_string(),
        Err(e) => format!("?? ({e})"),
    }
}

fn print_listings(tokens: &[Token], program: &Program) {
    println!("\n--- {} tokens ---", tokens.len());
    println!("{}", token_table(tokens));
    println!("\n--- {} instructions ---", program.len());
    println!("{}", listing_table(program));
}

/// Writes each diagnostic on its own line. Goes straight to `out` so errors
/// are shown whatever the log filter is.
pub fn report(out: &mut impl Write, errors: &[Diagnostic]) -> io::Result<()> {
    for e in errors {
        writeln!(out, "error: {e}")?;
    }
    Ok(())
}

/// Assembles `source` and runs it to completion.
pub fn run(source: &[u8], options: &Options) -> Result<(), Vec<Diagnostic>> {
    let AesopProgram { tokens, program } =
        crate::make_program(source, options.capacity, options.verbosity)?;

    if options.verbosity >= Verbosity::Normal {
        print_listings(&tokens, &program);
        println!("\n--- trace ---");
    }

    let released = tokens.len();
    drop(tokens);

    let mut logger = CLILogger;
    let mut interpreter = Interpreter::new(&program, options.entry, &mut logger, options.verbosity);
    let summary = interpreter
        .run(options.max_steps)
        .map_err(|e| vec![Diagnostic::from(e)])?;

    println!("\n--- summary ---");
    println!("{}", registers_table(&summary.registers, summary.steps));
    println!("released {released} tokens");

    Ok(())
}

/// Rows of memory shown around the instruction pointer.
const WINDOW_HEIGHT: usize = 15;

fn window(ip: usize, len: usize, height: usize) -> (usize, usize) {
    let last = len.saturating_sub(1);

    if ip < height / 2 {
        (0, (height - 1).min(last))
    } else if ip + height / 2 > last {
        (last.saturating_sub(height - 1), last)
    } else {
        (ip - height / 2, ip + height / 2)
    }
}

fn memory_window(program: &Program, state: &State) -> String {
    let ip = state.registers.ip() as usize;
    let (min, max) = window(ip, program.capacity(), WINDOW_HEIGHT);

    let mut builder = Builder::default();
    builder.push_record(["ip", "addr", "word", "instruction"]);

    for (addr, &word) in program
        .memory()
        .iter()
        .enumerate()
        .filter(|(addr, _)| *addr >= min && *addr <= max)
    {
        let arrow = if addr == ip { ">" } else { "" };
        builder.push_record([
            arrow.to_owned(),
            format!("{addr:04x}"),
            format!("{word:08X}"),
            disassemble(word),
        ]);
    }

    builder.build().with(Style::sharp()).to_string()
}

/// Reads how many instructions to run before stopping again. An empty line
/// means one, end of input means run to the end.
fn prompt_step_count() -> u64 {
    loop {
        print!(">>> ");
        let _ = io::stdout().flush();

        let mut input = String::new();

        match io::stdin().read_line(&mut input) {
            Ok(0) => return u64::MAX,
            Ok(_) => (),
            Err(_) => continue,
        }

        let input = input.trim();

        if input.is_empty() {
            return 1;
        }

        if let Ok(n) = input.parse::<u64>() {
            return n.max(1);
        }
    }
}

/// Runs `source` one instruction at a time, showing memory around the
/// instruction pointer and the registers before each step.
pub fn run_debugger(source: &[u8], options: &Options) -> Result<(), Vec<Diagnostic>> {
    let AesopProgram { tokens, program } =
        crate::make_program(source, options.capacity, options.verbosity)?;

    if options.verbosity >= Verbosity::Normal {
        print_listings(&tokens, &program);
    }

    let released = tokens.len();
    drop(tokens);

    let mut logger = CLILogger;
    let mut interpreter = Interpreter::new(&program, options.entry, &mut logger, options.verbosity);
    let mut skip_count = 0;

    while !interpreter.is_halted() {
        let state = interpreter.state();

        if let Some(limit) = options.max_steps {
            if state.steps >= limit {
                return Err(vec![ExecError::StepLimitExceeded { limit }.into()]);
            }
        }

        if skip_count == 0 {
            println!("\n--- step #{} ---", state.steps);
            println!("{}", memory_window(&program, &state));
            println!("{}", registers_table(&state.registers, state.steps));

            skip_count = prompt_step_count();
        }

        interpreter.step().map_err(|e| vec![Diagnostic::from(e)])?;
        skip_count -= 1;
    }

    let state = interpreter.state();

    println!("\n--- summary ---");
    println!("{}", registers_table(&state.registers, state.steps));
    println!("released {released} tokens");

    Ok(())
}
