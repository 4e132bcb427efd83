//! `stamper`: fills `.docx` templates from JSON data.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;
use stamper_core::wml::{build_comment_forest, CommentWrapper};
use stamper_core::{StampError, Stamper, StamperSettings, WordDocument};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

#[derive(Parser)]
#[command(name = "stamper", version = VERSION)]
#[command(about = "Fills .docx templates from JSON data", long_about = None)]
struct Cli {
    /// Log every directive and sub-pass
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stamp a template with a JSON context
    Stamp {
        #[arg(short, long)]
        template: PathBuf,

        /// JSON file holding the data context
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with stamper settings (camelCase keys)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Keep unresolved expressions instead of failing
        #[arg(long)]
        lenient: bool,
    },
    /// Print the comment tree of a template
    Comments {
        #[arg(short, long)]
        template: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Stamp {
            template,
            data,
            output,
            settings,
            lenient,
        } => run_stamp(&template, &data, &output, settings.as_deref(), lenient),
        Commands::Comments { template } => run_comments(&template),
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run_stamp(
    template: &Path,
    data: &Path,
    output: &Path,
    settings: Option<&Path>,
    lenient: bool,
) -> Result<(), StampError> {
    let mut options = match settings {
        Some(path) => serde_json::from_slice(&fs::read(path)?)?,
        None => StamperSettings::default(),
    };
    if lenient {
        options.fail_on_unresolved_expression = false;
    }
    let context: Value = serde_json::from_slice(&fs::read(data)?)?;

    let document = WordDocument::from_bytes(&fs::read(template)?)?;
    let stamped = Stamper::new(options).stamp(&document, &context)?;
    fs::write(output, stamped.to_bytes()?)?;
    info!(output = %output.display(), "wrote stamped document");
    Ok(())
}

fn run_comments(template: &Path) -> Result<(), StampError> {
    let document = WordDocument::from_bytes(&fs::read(template)?)?;
    let Some(root) = document.main().root() else {
        return Ok(());
    };
    let forest = build_comment_forest(document.main(), root, document.comments());
    for wrapper in &forest.roots {
        print_wrapper(wrapper, 0);
    }
    for rejected in &forest.rejected {
        println!("skipped: {rejected}");
    }
    if forest.malformed > 0 {
        println!("({} malformed comment(s) skipped)", forest.malformed);
    }
    Ok(())
}

fn print_wrapper(wrapper: &CommentWrapper, depth: usize) {
    println!("{:indent$}[{}] {}", "", wrapper.id, wrapper.text.trim(), indent = depth * 2);
    for child in &wrapper.children {
        print_wrapper(child, depth + 1);
    }
}
