//! get per-strain amino acid matrices from core-genome SNPs
//! Alejandro Gonzales-Irribarren, 2025
//!
//! This tool resolves nucleotide-level variant calls of a core-genome
//! comparison to their codon in every strain of a collection, using the
//! pan-genome presence/absence table for ortholog correspondence and the
//! strains' translated proteomes for the amino acid observed at each site.
//! It writes one multi-sequence extract per mutated gene for external
//! alignment, plus a consolidated per-site, per-strain amino acid matrix.
//!
//! # Usage
//!
//! ```bash
//! Usage: xmut [OPTIONS] --annotations <ANNOTATIONS> --variants <VARIANTS> --pan <PAN> --outdir <OUTDIR>
//!
//! Options:
//!   -a, --annotations <ANNOTATIONS>  Directory with one annotation subdirectory per strain
//!   -v, --variants <VARIANTS>        Path to the core variant table (TSV: gene, nucleotide position)
//!   -p, --pan <PAN>                  Path to the pan-genome gene presence/absence table (CSV)
//!   -o, --outdir <OUTDIR>            Output directory for per-gene extracts and the consolidated matrix
//!   -x, --exclude <EXCLUDE>          Additional directory names to skip when collecting strains
//!   -r, --reference <REFERENCE>      Name of an externally supplied reference genome, if one was used
//!   -E, --exact-only                 Disable substring fallback when locating protein records
//!   -L, --level <LEVEL>              Logging verbosity level [default: info]
//!   -Z, --compress                   Gzip-compress output files
//!   -h, --help                       Print help
//!   -V, --version                    Print version
//! ```

pub mod cli;
pub mod consts;
pub mod core;

pub use cli::Args;
pub use crate::core::{
    OrthologTable, PositionError, Proteome, VariantSite, VariantTable, codon_index,
    collect_strains, read_variant_table, xmut,
};
