use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use factoryhex::{HexImage, LineEnding, dump, tokens};
use log::{LevelFilter, debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(version, about = "Intel HEX factory image assembler")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Combine a bootloader, an application and manufacturing tokens into one HEX file
    Create(CreateArgs),
    /// Show the records and flashed address ranges of a HEX file
    Info {
        /// Input HEX file
        input: PathBuf,
    },
    /// Print a hex dump of everything a HEX file flashes
    Dump {
        /// Input HEX file
        input: PathBuf,
    },
}

#[derive(clap::Args)]
struct CreateArgs {
    /// Bootloader HEX file
    #[arg(long)]
    bootloader: PathBuf,

    /// Application HEX file
    #[arg(long)]
    application: PathBuf,

    /// Manufacturing tokens JSON file
    #[arg(long)]
    tokens: PathBuf,

    /// Output HEX file
    #[arg(long)]
    output: PathBuf,

    /// Key of the token mapping inside the tokens file
    #[arg(long, default_value = "znet")]
    family: String,

    /// Raw binary payload flashed at the given address, e.g. `nvm3.bin@0x0807A000`
    #[arg(long = "raw", value_name = "PATH@ADDR", value_parser = parse_raw_payload)]
    raw: Vec<RawPayload>,

    /// Maximum number of data bytes per record
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u8).range(1..))]
    record_size: u8,

    /// Line terminator of the output file
    #[arg(long, value_enum, default_value_t = LineEndingArg::Crlf)]
    line_ending: LineEndingArg,
}

#[derive(Clone, Debug)]
struct RawPayload {
    path: PathBuf,
    address: u32,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LineEndingArg {
    Crlf,
    Lf,
}

impl From<LineEndingArg> for LineEnding {
    fn from(arg: LineEndingArg) -> Self {
        match arg {
            LineEndingArg::Crlf => Self::CrLf,
            LineEndingArg::Lf => Self::Lf,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    init_logger(cli.verbose);

    // Dispatch and immediately handle results
    if let Err(e) = run_dispatch(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_logger(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    } else if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.filter_level(LevelFilter::Info);
    }

    builder.init();
}

fn run_dispatch(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Create(args) => run_create(&args),
        Command::Info { input } => run_info(&input),
        Command::Dump { input } => run_dump(&input),
    }
}

fn run_create(args: &CreateArgs) -> anyhow::Result<()> {
    let bootloader = load_hex(&args.bootloader)?;
    let application = load_hex(&args.application)?;
    let token_values = load_tokens(&args.tokens, &args.family)?;

    let mut image = HexImage::new();
    image.set_record_size(args.record_size)?;
    image.set_line_ending(args.line_ending.into());

    image
        .merge_image(&bootloader)
        .with_context(|| format!("Failed to merge bootloader {}", args.bootloader.display()))?;
    image
        .merge_image(&application)
        .with_context(|| format!("Failed to merge application {}", args.application.display()))?;

    for payload in &args.raw {
        let data = fs::read(&payload.path)
            .with_context(|| format!("Failed to read {}", payload.path.display()))?;
        debug!(
            "Raw payload {} -> 0x{:08X}",
            payload.path.display(),
            payload.address
        );
        image
            .flash_data(payload.address, &data)
            .with_context(|| format!("Failed to flash {}", payload.path.display()))?;
    }

    tokens::flash_tokens(&mut image, token_values)
        .with_context(|| format!("Failed to flash tokens from {}", args.tokens.display()))?;

    image.finalize();
    let extents = image
        .validate()
        .context("Assembled image is not valid")?;

    // Ensure the parent directory exists
    if let Some(parent) = args.output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&args.output, image.to_text())
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        "Wrote {} records to {}",
        image.records().len(),
        args.output.display()
    );
    print!("{}", dump::summary(&extents));
    Ok(())
}

fn run_info(path: &Path) -> anyhow::Result<()> {
    let image = load_hex(path)?;
    let extents = image
        .validate()
        .with_context(|| format!("{} is not a valid image", path.display()))?;
    let size: usize = extents.iter().map(factoryhex::Extent::len).sum();

    println!("File Path:   {}", path.display());
    println!("Records:     {}", format_with_commas(image.records().len()));
    println!("Data Size:   {} bytes", format_with_commas(size));
    println!("Extents:");
    for line in dump::summary(&extents).lines() {
        println!("  {line}");
    }
    Ok(())
}

fn run_dump(path: &Path) -> anyhow::Result<()> {
    let image = load_hex(path)?;
    let extents = image
        .validate()
        .with_context(|| format!("{} is not a valid image", path.display()))?;

    print!("{}", dump::hexdump(&extents));
    Ok(())
}

// =============================== HELPER FUNCTIONS ===============================

/// Read and parse a HEX file. Inputs may use any record size; output is re-chunked anyway.
fn load_hex(path: &Path) -> anyhow::Result<HexImage> {
    let raw_bytes =
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut image = HexImage::new();
    image.set_record_size(u8::MAX)?;
    image
        .parse(&raw_bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(image)
}

/// Read the token mapping nested under `family` from a JSON document.
fn load_tokens(path: &Path, family: &str) -> anyhow::Result<Vec<(String, String)>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let Some(values) = document.get(family).and_then(serde_json::Value::as_object) else {
        bail!("{} has no \"{family}\" token mapping", path.display());
    };

    let mut pairs = values
        .iter()
        .map(|(name, value)| {
            let value = value
                .as_str()
                .with_context(|| format!("Value of token {name} must be a string"))?;
            Ok::<_, anyhow::Error>((name.clone(), value.to_string()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    // Flash in a stable order regardless of how the document is laid out
    pairs.sort();
    Ok(pairs)
}

/// Parse `<path>@<addr>` where the address is hex (with optional 0x prefix)
fn parse_raw_payload(s: &str) -> Result<RawPayload, String> {
    let (path, addr) = s
        .rsplit_once('@')
        .ok_or_else(|| format!("Expected <path>@<addr>, got: {s}"))?;

    let address = parse_hex_str(addr)
        .ok()
        .and_then(|addr| u32::try_from(addr).ok())
        .ok_or_else(|| format!("Invalid address: {addr}"))?;

    Ok(RawPayload {
        path: PathBuf::from(path),
        address,
    })
}

/// Parse a string as a hex number (with optional 0x prefix)
fn parse_hex_str(s: &str) -> Result<usize, std::num::ParseIntError> {
    let s = s.trim();

    // Handle explicit 0x prefix
    if let Some(hex_str) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return usize::from_str_radix(hex_str, 16);
    }

    // Parse as hex without prefix
    usize::from_str_radix(s, 16)
}

fn format_with_commas(n: usize) -> String {
    let s = n.to_string();
    s.as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
}
