//! BiosArc CLI - legacy BIOS image module extractor.
//!
//! Detects AMI, Award and Phoenix flash images and pulls their embedded
//! modules out, expanding LH5 and LZSS payloads along the way.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

use biosarc_core::BiosImage;
use biosarc_image::{detect, extract_image, Extraction};

#[derive(Parser)]
#[command(name = "biosarc")]
#[command(author, version, about = "Legacy BIOS image module extractor")]
#[command(long_about = "
BiosArc takes apart legacy PC BIOS flash images: AMIBIOS ('94 and '95
directory layouts), Award (embedded LHA members) and Phoenix (BCP module
chains and FFV volume directories).

Examples:
  biosarc detect bios.rom
  biosarc info bios.rom
  biosarc list bios.rom --json
  biosarc extract bios.rom -o modules/
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (per-module logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the firmware family of an image
    Detect {
        /// Image file to probe
        image: PathBuf,
    },

    /// Show image information and a module summary
    #[command(alias = "i")]
    Info {
        /// Image file to inspect
        image: PathBuf,
    },

    /// List the modules of an image
    #[command(alias = "l")]
    List {
        /// Image file to list
        image: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Extract all modules into a directory
    #[command(alias = "x")]
    Extract {
        /// Image file to extract
        image: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

/// One module row in `list --json` output.
#[derive(Serialize)]
struct ModuleListing<'a> {
    name: &'a str,
    kind: Option<&'a str>,
    offset: usize,
    packed_len: usize,
    expanded_len: usize,
    codec: String,
}

/// Failure row in `list --json` output.
#[derive(Serialize)]
struct FailureListing<'a> {
    name: &'a str,
    offset: usize,
    error: String,
}

#[derive(Serialize)]
struct ImageListing<'a> {
    family: String,
    version: Option<&'a str>,
    date: Option<&'a str>,
    modules: Vec<ModuleListing<'a>>,
    failures: Vec<FailureListing<'a>>,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "info" } else { "warn" },
    ))
    .format_timestamp(None)
    .init();

    let result = match cli.command {
        Commands::Detect { image } => cmd_detect(&image),
        Commands::Info { image } => cmd_info(&image),
        Commands::List { image, json } => cmd_list(&image, json),
        Commands::Extract { image, output } => cmd_extract(&image, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_detect(image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let image = BiosImage::open(image)?;
    let detection = detect(&image)?;
    println!(
        "{} (marker at 0x{:05x}, directory at 0x{:05x})",
        detection.family, detection.marker, detection.anchor
    );
    Ok(())
}

fn cmd_info(image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = BiosImage::open(image)?;
    println!("File:     {} ({} KiB)", image.display(), data.len() >> 10);

    let extraction = extract_image(&data)?;
    println!("Family:   {}", extraction.family);
    if let Some(version) = &extraction.version {
        println!("Version:  {}", version.trim());
    }
    if let Some(date) = &extraction.date {
        println!("Date:     {}", date.trim());
    }
    let expanded: usize = extraction.modules.iter().map(|m| m.data.len()).sum();
    println!(
        "Modules:  {} ({} bytes expanded)",
        extraction.modules.len(),
        expanded
    );
    if !extraction.failures.is_empty() {
        println!("Failures: {}", extraction.failures.len());
    }
    Ok(())
}

fn cmd_list(image: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let data = BiosImage::open(image)?;
    let extraction = extract_image(&data)?;

    if json {
        let listing = ImageListing {
            family: extraction.family.to_string(),
            version: extraction.version.as_deref(),
            date: extraction.date.as_deref(),
            modules: extraction
                .modules
                .iter()
                .map(|m| ModuleListing {
                    name: &m.name,
                    kind: m.kind,
                    offset: m.offset,
                    packed_len: m.packed_len,
                    expanded_len: m.data.len(),
                    codec: m.codec.to_string(),
                })
                .collect(),
            failures: extraction
                .failures
                .iter()
                .map(|f| FailureListing {
                    name: &f.name,
                    offset: f.offset,
                    error: f.error.to_string(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    print_listing(&extraction);
    Ok(())
}

fn print_listing(extraction: &Extraction) {
    println!(
        "{} image, {} modules",
        extraction.family,
        extraction.modules.len()
    );
    for module in &extraction.modules {
        print!(
            "0x{:05x} ({:7} bytes) -> {:<24} ({:7} bytes, {})",
            module.offset,
            module.packed_len,
            module.name,
            module.data.len(),
            module.codec
        );
        match module.kind {
            Some(kind) => println!("  \"{}\"", kind),
            None => println!(),
        }
    }
    for failure in &extraction.failures {
        println!("0x{:05x} {:<24} FAILED: {}", failure.offset, failure.name, failure.error);
    }
}

fn cmd_extract(image: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = BiosImage::open(image)?;
    let extraction = extract_image(&data)?;

    fs::create_dir_all(output)?;
    for module in &extraction.modules {
        let path = output.join(&module.name);
        fs::write(&path, &module.data)?;
        println!(
            "0x{:05x} ({:7} bytes) -> {}",
            module.offset,
            module.data.len(),
            path.display()
        );
    }
    for failure in &extraction.failures {
        eprintln!(
            "0x{:05x} {}: {}",
            failure.offset, failure.name, failure.error
        );
    }
    println!(
        "{} modules written to {}",
        extraction.modules.len(),
        output.display()
    );
    Ok(())
}
