//! # Etiqueta CLI
//!
//! Command-line interface for label printing.
//!
//! ## Usage
//!
//! ```bash
//! # List printer identifiers of the built-in profile
//! etiqueta profiles
//!
//! # Print a price label over TCP
//! etiqueta print --endpoint 192.168.1.50:9100 --price '$4.99' \
//!     --description 'Apple 1kg' --barcode 0123456789
//!
//! # Print a food info label on a PR3 over an RFCOMM channel
//! etiqueta print --endpoint /dev/rfcomm0 --printer PR3 --template food-info \
//!     --description 'Contains nuts' --barcode-type CODE39 --barcode 12345
//!
//! # Show the commands and bytes a label would produce
//! etiqueta render --price '$4.99' --barcode 0123456789
//! ```
//!
//! Set `RUST_LOG=debug` to see every flush.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use etiqueta::{
    CommandProfile, EtiquetaError, LabelPrinter, PrinterSession, SessionConfig,
    ir::GraphicSource,
    label::{self, LabelRecord, LabelStock, TemplateKind},
    protocol::Symbology,
    transport::{DefaultConnector, Endpoint, MemoryConnector},
};

/// Etiqueta - label printer utility
#[derive(Parser, Debug)]
#[command(name = "etiqueta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command profile: JSON file path or inline JSON (defaults to the built-in profile)
    #[arg(long, global = true, value_name = "SOURCE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a label
    Print {
        /// Printer endpoint: host:port, tcp://host, /dev/rfcomm0
        #[arg(long)]
        endpoint: Endpoint,

        /// Printer identifier in the command profile
        #[arg(long, default_value = "PR2")]
        printer: String,

        /// Session configuration file (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(flatten)]
        label: LabelArgs,
    },

    /// Show the commands and bytes of a label without printing
    Render {
        /// Printer identifier in the command profile
        #[arg(long, default_value = "PR2")]
        printer: String,

        #[command(flatten)]
        label: LabelArgs,
    },

    /// List printer identifiers
    Profiles,
}

#[derive(Args, Debug)]
struct LabelArgs {
    /// Label record JSON file; other label flags override its fields
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,

    /// standard-price, food-info or other
    #[arg(long)]
    template: Option<TemplateKind>,

    #[arg(long)]
    price: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// CODE39 or CODE128
    #[arg(long, default_value = "CODE128")]
    barcode_type: Symbology,

    /// Barcode payload
    #[arg(long)]
    barcode: Option<String>,

    /// continuous or 50x30
    #[arg(long)]
    stock: Option<LabelStock>,

    /// Barcode height in dots (defaults to the profile's)
    #[arg(long)]
    barcode_height: Option<u16>,

    /// Barcode left offset in dots (defaults to the profile's)
    #[arg(long)]
    barcode_x_offset: Option<u16>,

    /// Logo image (PNG, BMP, JPEG)
    #[arg(long, value_name = "FILE")]
    logo: Option<PathBuf>,
}

impl LabelArgs {
    fn into_record(self) -> Result<LabelRecord, EtiquetaError> {
        let mut record = match &self.record {
            Some(path) => LabelRecord::from_json(&std::fs::read_to_string(path)?)?,
            None => LabelRecord::default(),
        };

        if let Some(template) = self.template {
            record.template = template;
        }
        if let Some(price) = self.price {
            record = record.price(price);
        }
        if let Some(description) = self.description {
            record = record.description(description);
        }
        if let Some(value) = self.barcode {
            record = record.barcode(self.barcode_type, value);
        }
        if let Some(stock) = self.stock {
            record = record.stock(stock);
        }
        if let Some(height) = self.barcode_height {
            record = record.barcode_height(height);
        }
        if let Some(offset) = self.barcode_x_offset {
            record = record.barcode_x_offset(offset);
        }
        if let Some(logo) = self.logo {
            record = record.logo(GraphicSource::Path(logo));
        }
        Ok(record)
    }
}

fn main() {
    etiqueta::init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), EtiquetaError> {
    let cli = Cli::parse();
    let profiles = match &cli.profile {
        Some(source) => CommandProfile::load(source)?,
        None => CommandProfile::builtin()?,
    };

    match cli.command {
        Commands::Profiles => {
            println!("Printers in {}:", profiles.source());
            for id in profiles.printer_ids() {
                println!("  {}", id);
            }
        }

        Commands::Print {
            endpoint,
            printer,
            config,
            label,
        } => {
            let config = match config {
                Some(path) => SessionConfig::load(path)?,
                None => SessionConfig::default(),
            };
            let record = label.into_record()?;

            let connector = Arc::new(DefaultConnector::new(config.clone()));
            let service = LabelPrinter::new(profiles, connector).with_config(config);
            service.bus().subscribe_fn(|event| println!("  {}", event));

            println!("Printing {} label on {} ({})...", record.template, endpoint, printer);
            let report = service.submit_label(record, &printer, &endpoint)?.wait()?;
            println!("Job {} {}, {} bytes sent", report.id, report.outcome, report.bytes_written);
        }

        Commands::Render { printer, label } => {
            let record = label.into_record()?;
            let profile = profiles.resolve(&printer)?;
            let commands = label::render(&record, &profile)?;

            println!("{} label for {}:", record.template, printer);
            for cmd in &commands {
                println!("  {}", cmd);
            }

            let connector = Arc::new(MemoryConnector::new());
            let sink = connector.printer("dry-run");
            let mut session = PrinterSession::new(profile, connector);
            session.connect(&Endpoint::parse("memory:dry-run")?)?;
            session.print_commands(&commands)?;
            session.disconnect()?;

            println!("\n{} bytes:", sink.bytes().len());
            for line in sink.bytes().chunks(16) {
                let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
                println!("  {}", hex.join(" "));
            }
        }
    }

    Ok(())
}
