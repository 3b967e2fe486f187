//! LM Language IR compiler CLI.
//!
//! Provides the `lmlang` binary with a `check` subcommand that runs the
//! textual IR (SPEC §6) through parsing, type checking, borrow
//! checking, and the optional module/function passes, reporting
//! diagnostics or a JSON summary.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use lmlang_core::{NumberEnv, TypeRegistry, ValueTable};

mod config;
mod lexer;
mod parser;

use config::Config;
use parser::Parser as IrParser;

/// LM Language IR compiler and analysis tools.
#[derive(Parser)]
#[command(name = "lmlang", about = "LM Language IR compiler and analysis tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, type check, and borrow check a textual IR file.
    Check {
        /// Path to a textual IR source file.
        path: PathBuf,

        /// Prune functions unreachable from `main`.
        #[arg(long)]
        prune: bool,

        /// Insert automatic `free` instructions for every `alloc`.
        #[arg(long = "insert-drops")]
        insert_drops: bool,

        /// Remove unreachable blocks and run local DCE/LVN/canonicalize
        /// on every remaining block.
        #[arg(long)]
        optimize: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Check { path, prune, insert_drops, optimize } => {
            let config = Config { prune, insert_drops, optimize, ..Config::default() };
            run_check(&path, &config)
        }
    };

    process::exit(exit_code);
}

/// Exit codes: 0 = success, 1 = parse error, 2 = type error,
/// 3 = borrow conflict, 4 = lifetime (drop-insertion) error, 5 = I/O error.
fn run_check(path: &PathBuf, config: &Config) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", path.display(), e);
            return 5;
        }
    };

    let module_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("module");

    let mut registry = TypeRegistry::new();
    let mut module = match IrParser::new(&source).and_then(|mut p| p.parse_module(module_name, &mut registry)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if config.prune {
        let removed = lmlang_check::passes::prune_unreachable_functions(&mut module);
        if !removed.is_empty() {
            eprintln!("pruned unreachable functions: {}", removed.join(", "));
        }
    }

    if let Err(e) = lmlang_check::check_module(&mut module, &mut registry) {
        eprintln!("Error: type check failed: {}", e);
        return 2;
    }

    for function in module.functions.values() {
        if let Err(e) = lmlang_check::borrow_check_function(function) {
            eprintln!("Error: borrow check failed in '{}': {}", function.name, e);
            return 3;
        }
    }

    if config.insert_drops {
        for function in module.functions.values_mut() {
            if let Err(e) = lmlang_check::passes::insert_drops(function) {
                eprintln!("Error: {}", e);
                return 4;
            }
        }
    }

    if config.optimize {
        for function in module.functions.values_mut() {
            lmlang_check::analysis::prune_unreachable_blocks(function);
            for block in function.blocks.iter_mut() {
                block.canonicalize();
                block.dce(None);
                let mut table = ValueTable::new();
                let mut env = NumberEnv::new();
                block.lvn(&mut table, &mut env);
            }
            function.invalidate_cfg();
        }
    }

    let summary = serde_json::json!({
        "module": module.name,
        "functions": module.functions.keys().collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)));
    0
}
