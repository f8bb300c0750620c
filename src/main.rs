//! CLI for packing a computed witness into a `wtns` file.
//!
//! Usage examples:
//!   cargo run --release -- circuit.wasm witness.json witness.wtns
//!   cargo run --release -- export circuit.wasm witness.json witness.wtns --sanity-check
//!   cargo run --release -- inspect witness.wtns

use std::{env::args, path::PathBuf, process, time::Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;
use wtns_export::{
    load_module_bytes, load_witness_json, load_wtns, save_witness, WitnessExtractor,
    WitnessOptions,
};

#[derive(Debug, Clone)]
struct ExportOptions {
    wasm: PathBuf,
    witness: PathBuf,
    output: PathBuf,
    sanity_check: bool,
}

#[derive(Debug, Clone)]
enum Command {
    Export(ExportOptions),
    Inspect { wtns: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = args().collect();
    let command_args: &[String] = if args.len() > 1 { &args[1..] } else { &[] };

    let command = match parse_command(command_args) {
        Ok(cmd) => cmd,
        Err(err) => {
            eprintln!("Error: {}", err);
            print_usage();
            process::exit(1);
        }
    };

    let result = match command {
        Command::Export(options) => execute_export(options),
        Command::Inspect { wtns } => execute_inspect(wtns),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn execute_export(options: ExportOptions) -> wtns_export::Result<()> {
    let t0 = Instant::now();
    let wasm = load_module_bytes(&options.wasm)?;
    let elements = load_witness_json(&options.witness)?;

    let mut extractor = WitnessExtractor::from_module_bytes(
        &wasm,
        &WitnessOptions {
            sanity_check: options.sanity_check,
        },
    )?;
    let bytes = extractor.to_binary(&elements, false)?;
    save_witness(&options.output, &bytes)?;

    info!(
        elapsed_ms = t0.elapsed().as_millis(),
        circom_version = extractor.circom_version(),
        witness_size = extractor.witness_size(),
        "Witness export completed"
    );
    Ok(())
}

fn execute_inspect(wtns: PathBuf) -> wtns_export::Result<()> {
    let file = load_wtns(&wtns)?;
    println!("{}", serde_json::to_string_pretty(&file.summary())?);
    Ok(())
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("No command provided".into());
    }

    match args[0].as_str() {
        "-h" | "--help" => {
            print_usage();
            process::exit(0);
        }
        "export" => parse_export(&args[1..]),
        "inspect" => match &args[1..] {
            [path] => Ok(Command::Inspect {
                wtns: PathBuf::from(path),
            }),
            [] => Err("Missing wtns file for inspect".into()),
            rest => Err(format!("Unexpected arguments: {}", rest[1..].join(" "))),
        },
        _ => parse_export(args),
    }
}

fn parse_export(args: &[String]) -> Result<Command, String> {
    let mut positional = Vec::with_capacity(3);
    let mut sanity_check = false;

    for arg in args {
        match arg.as_str() {
            "--sanity-check" => sanity_check = true,
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            s if s.starts_with('-') => return Err(format!("Unknown option '{s}'")),
            s => positional.push(PathBuf::from(s)),
        }
    }

    match <[PathBuf; 3]>::try_from(positional) {
        Ok([wasm, witness, output]) => Ok(Command::Export(ExportOptions {
            wasm,
            witness,
            output,
            sanity_check,
        })),
        Err(positional) => Err(format!(
            "Expected <file.wasm> <witness.json> <output.wtns>, got {} path(s)",
            positional.len()
        )),
    }
}

fn print_usage() {
    eprintln!(
        "Usage:
  wtns-export [export] <file.wasm> <witness.json> <output.wtns> [--sanity-check]
  wtns-export inspect <file.wtns>

Commands:
  export               Pack a JSON witness vector into a wtns file (default)
  inspect              Print the header of a wtns file as JSON

Options:
  --sanity-check       Run the circuit's sanity checks during init

Set RUST_LOG=info (or debug) to see progress and circuit log output."
    );
}
