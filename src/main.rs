use clap::Parser;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use aesop::cli::{self, Options};
use aesop::{Verbosity, DEFAULT_CAPACITY, MAX_CAPACITY};

#[derive(Parser, Debug)]
#[command(author, version, about = "Assembler and register machine for the AESOP instruction set")]
struct Args {
    /// Program source file
    path: PathBuf,

    /// Address of the first instruction to execute
    #[arg(short, long, default_value_t = 0)]
    entry: u16,

    /// Program memory size in 32-bit words
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_CAPACITY as u32,
        value_parser = clap::value_parser!(u32).range(1..=MAX_CAPACITY as i64),
    )]
    memory: u32,

    /// Stop with an error after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// How much to print while assembling and running
    #[arg(short, long, value_enum, default_value_t = Verbosity::Normal)]
    verbosity: Verbosity,

    /// Pause before each instruction and show memory and registers
    #[arg(long)]
    step: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbosity.level_filter())
        .parse_default_env()
        .init();

    let source = match fs::read(&args.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: could not read {}: {e}", args.path.display());
            return ExitCode::FAILURE;
        }
    };

    if args.verbosity >= Verbosity::Normal {
        println!("read {} bytes from {}", source.len(), args.path.display());
    }

    let options = Options {
        entry: args.entry,
        capacity: args.memory as usize,
        max_steps: args.max_steps,
        verbosity: args.verbosity,
    };

    let res = if args.step {
        cli::run_debugger(&source, &options)
    } else {
        cli::run(&source, &options)
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(errors) => {
            let _ = cli::report(&mut io::stderr(), &errors);
            ExitCode::FAILURE
        }
    }
}
