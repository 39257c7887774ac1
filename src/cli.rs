//! get per-strain amino acid matrices from core-genome SNPs
//! Alejandro Gonzales-Irribarren, 2025
//!
//! This tool resolves nucleotide-level variant calls of a core-genome
//! comparison to their codon in every strain of a collection, using the
//! pan-genome presence/absence table for ortholog correspondence and the
//! strains' translated proteomes for the amino acid observed at each site.

use clap::{ArgAction, Parser};
use log::Level;

use std::{fmt, path::PathBuf};

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
pub struct Args {
    /// Directory with one annotation subdirectory per strain
    #[arg(short = 'a', long)]
    pub annotations: PathBuf,

    /// Path to the core variant table (TSV: gene, nucleotide position)
    #[arg(short = 'v', long)]
    pub variants: PathBuf,

    /// Path to the pan-genome gene presence/absence table (CSV)
    #[arg(short = 'p', long)]
    pub pan: PathBuf,

    /// Output directory for per-gene extracts and the consolidated matrix
    #[arg(short = 'o', long)]
    pub outdir: PathBuf,

    /// Additional directory names to skip when collecting strains
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,

    /// Name of an externally supplied reference genome, if one was used
    #[arg(short = 'r', long)]
    pub reference: Option<String>,

    /// Disable substring fallback when locating protein records
    #[arg(short = 'E', long = "exact-only", default_value = "false", action = ArgAction::SetTrue)]
    pub exact_only: bool,

    /// Logging verbosity level
    #[arg(short = 'L', long, default_value = "info")]
    pub level: Level,

    /// Gzip-compress output files
    #[arg(short = 'Z', long, default_value = "false", action = ArgAction::SetTrue)]
    pub compress: bool,
}

/// Formats the Args struct as a comma-separated string of key=value pairs.
///
/// # Arguments
///
/// - `f`: The formatter to write to
///
/// # Example
///
/// ```rust,ignore
/// use xmut::Args;
/// let args = Args::parse();
/// println!("{}", args);
/// ```
impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "annotations={}, variants={}, pan={}, outdir={}, exclude={:?}, reference={:?}, exact_only={}, level={}, compress={}",
            self.annotations.display(),
            self.variants.display(),
            self.pan.display(),
            self.outdir.display(),
            self.exclude,
            self.reference,
            self.exact_only,
            self.level,
            self.compress,
        )
    }
}
