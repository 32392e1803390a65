//! cslq - inspect patterns and encode/decode values from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::PathBuf;

use cslq::pattern::Lexer;
use cslq::{Compiler, Config, Decode, Decoder, Encode, Encoder, Value};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "cslq")]
#[command(author = "Sina Rabbani")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Compact binary serialization patterns", long_about = None)]
struct Cli {
    /// Configuration file path (TOML with a [limits] table)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tokens of a pattern
    Tokens {
        pattern: String,
    },

    /// Compile a pattern and print its canonical form and Op tree
    Compile {
        pattern: String,
    },

    /// Encode a JSON array of values and print the bytes as hex
    Encode {
        pattern: String,

        /// JSON array, one element per value-consuming op
        values: String,
    },

    /// Decode hex bytes and print the values as JSON
    Decode {
        pattern: String,

        /// Hex-encoded input
        hex: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = if let Some(path) = &cli.config {
        info!("Loading configuration from {:?}", path);
        Config::load(path).with_context(|| format!("Failed to load config {:?}", path))?
    } else {
        Config::default()
    };
    debug!("limits: {:?}", config.limits);
    let compiler = Compiler::new(config.limits);

    match cli.command {
        Commands::Tokens { pattern } => print_tokens(&pattern)?,
        Commands::Compile { pattern } => print_format(&compiler, &pattern)?,
        Commands::Encode { pattern, values } => encode_json(&compiler, &pattern, &values)?,
        Commands::Decode { pattern, hex } => decode_hex(&compiler, &pattern, &hex)?,
    }

    Ok(())
}

fn print_tokens(pattern: &str) -> Result<()> {
    let mut lexer = Lexer::new(pattern);
    while let Some(lexeme) = lexer.next_token()? {
        println!("{:>4}  {}", lexeme.offset, lexeme.token);
    }
    Ok(())
}

fn print_format(compiler: &Compiler, pattern: &str) -> Result<()> {
    let format = compiler.compile(pattern)?;

    println!("Pattern: {}", format);
    println!("Arity:   {}", format.arity());
    println!("{:#?}", format.ops());
    Ok(())
}

fn encode_json(compiler: &Compiler, pattern: &str, json: &str) -> Result<()> {
    let values: Vec<Value> = serde_json::from_str(json).context("Values must be a JSON array")?;
    let refs: Vec<&dyn Encode> = values.iter().map(|v| v as &dyn Encode).collect();

    let mut buf = Vec::new();
    Encoder::with_compiler(&mut buf, compiler)
        .encode(pattern, &refs)
        .context("Encoding failed")?;

    println!("{}", hex::encode(&buf));
    Ok(())
}

fn decode_hex(compiler: &Compiler, pattern: &str, input: &str) -> Result<()> {
    let bytes = hex::decode(input.trim()).context("Input is not valid hex")?;
    let format = compiler.get_or_compile(pattern)?;

    let mut values = vec![Value::Null; format.arity()];
    let mut slots: Vec<&mut dyn Decode> = values.iter_mut().map(|v| v as &mut dyn Decode).collect();

    let mut source = &bytes[..];
    Decoder::with_compiler(&mut source, compiler)
        .decode_format(&format, &mut slots)
        .context("Decoding failed")?;
    if !source.is_empty() {
        info!("{} trailing bytes not consumed", source.len());
    }

    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}
