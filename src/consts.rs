//! get per-strain amino acid matrices from core-genome SNPs
//! Alejandro Gonzales-Irribarren, 2025
//!
//! This tool resolves nucleotide-level variant calls of a core-genome
//! comparison to their codon in every strain of a collection, using the
//! pan-genome presence/absence table for ortholog correspondence and the
//! strains' translated proteomes for the amino acid observed at each site.

/// Prefix shared by every artifact this tool writes.
pub const OUTPUT_PREFIX: &str = "SNPs_AA_";

/// File name of the consolidated per-site amino acid matrix.
pub const MATRIX_FILE: &str = "SNPs_AA_allgenes.txt";

/// File name suffixes recognized as protein annotation files inside a
/// strain's directory.
pub const PROTEIN_SUFFIXES: [&str; 2] = [".faa", ".faa.gz"];

/// Directory names that hold pipeline outputs rather than per-strain
/// annotations; never part of the strain collection.
pub const NON_STRAIN_DIRS: [&str; 2] = ["pangenome", "core_variants"];

/// Zero-based column holding the gene name in the presence/absence table.
/// Strain columns are located by header name, not by offset.
pub const GENE_NAME_COLUMN: usize = 0;
