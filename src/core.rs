use crate::{
    cli::Args,
    consts::{GENE_NAME_COLUMN, MATRIX_FILE, NON_STRAIN_DIRS, OUTPUT_PREFIX, PROTEIN_SUFFIXES},
};

use csv::ReaderBuilder;
use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
use log::{info, warn};
use rayon::prelude::*;

use std::{
    collections::HashMap,
    fs::{File, create_dir_all, read_dir},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Main processing function that orchestrates mutation translation.
pub fn xmut(args: Args) {
    let Args {
        annotations,
        variants,
        pan,
        outdir,
        exclude,
        reference,
        exact_only,
        compress,
        ..
    } = args;

    let strains = collect_strains(&annotations, &exclude);
    if strains.is_empty() {
        panic!(
            "ERROR: no strain annotation directories found in {}",
            annotations.display()
        );
    }

    if let Some(reference) = &reference {
        warn!(
            "Reference genome {} is not part of the strain collection: positions were called against it, but it will not appear as a matrix column",
            reference
        );
    }

    let table = read_variant_table(&variants);
    let orthologs = OrthologTable::from_csv(&pan, &strains);

    for gene in unique_genes(&table.sites) {
        if !orthologs.contains(gene) {
            warn!("Gene {} is absent from the presence/absence table", gene);
        }
    }

    let proteomes = load_proteomes(&annotations, &strains);
    create_dir_all(&outdir).unwrap_or_else(|e| panic!("{}", e));

    write_gene_extracts(
        &table.sites,
        &strains,
        &proteomes,
        &outdir,
        exact_only,
        compress,
    );
    write_matrix(
        &table, &strains, &proteomes, &orthologs, &outdir, exact_only, compress,
    );

    info!("Wrote outputs to {}", outdir.display());
}

/// One row of the core variant table: a mutated gene and the 1-based
/// nucleotide offset of the call within its coding sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSite {
    pub gene: String,
    pub nt_position: usize,
}

/// Parsed core variant table: the original header line plus one site per row.
pub struct VariantTable {
    pub header: String,
    pub sites: Vec<VariantSite>,
}

/// Reads the tab-delimited core variant table row by row.
///
/// Only the first two columns (gene name, nucleotide position) are used;
/// later columns belong to the producing tool and are ignored.
pub fn read_variant_table(path: &Path) -> VariantTable {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("ERROR: cannot read variant table {}: {}", path.display(), e));

    let mut lines = text.lines();
    let header = lines
        .next()
        .unwrap_or_else(|| panic!("ERROR: variant table {} is empty", path.display()))
        .to_string();

    let mut sites = Vec::new();
    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let row = idx + 2;
        let mut fields = line.split('\t');
        let gene = fields
            .next()
            .map(str::trim)
            .filter(|gene| !gene.is_empty())
            .unwrap_or_else(|| {
                panic!(
                    "ERROR: missing gene name at row {} of {}",
                    row,
                    path.display()
                )
            });
        let raw = fields.next().unwrap_or_else(|| {
            panic!(
                "ERROR: missing nucleotide position for gene {} at row {} of {}",
                gene,
                row,
                path.display()
            )
        });
        let nt_position = raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|position| *position >= 1)
            .unwrap_or_else(|| {
                panic!(
                    "ERROR: malformed nucleotide position '{}' for gene {} at row {} of {}",
                    raw,
                    gene,
                    row,
                    path.display()
                )
            });

        sites.push(VariantSite {
            gene: gene.to_string(),
            nt_position,
        });
    }

    info!("Read {} variant sites from {}", sites.len(), path.display());

    VariantTable { header, sites }
}

/// Error type for codon index computation failures.
#[derive(Debug, PartialEq, Eq)]
pub enum PositionError {
    NonPositive { nt_position: usize },
}

impl std::fmt::Display for PositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionError::NonPositive { nt_position } => write!(
                f,
                "ERROR: nucleotide position {} is not a 1-based offset",
                nt_position
            ),
        }
    }
}

/// Maps a 1-based nucleotide offset within a coding sequence to its 1-based
/// codon index: bases 1-3 fall in codon 1, bases 4-6 in codon 2, and so on.
pub fn codon_index(nt_position: usize) -> Result<usize, PositionError> {
    if nt_position < 1 {
        return Err(PositionError::NonPositive { nt_position });
    }

    Ok(nt_position.div_ceil(3))
}

/// Collects the ordered strain collection from the annotation directory
/// listing: one subdirectory per strain, alphabetical, skipping pipeline
/// output directories and caller-supplied exclusions.
pub fn collect_strains(annotations: &Path, exclude: &[String]) -> Vec<String> {
    let entries = read_dir(annotations).unwrap_or_else(|e| {
        panic!(
            "ERROR: cannot read annotation directory {}: {}",
            annotations.display(),
            e
        )
    });

    let mut strains = Vec::new();
    for entry in entries {
        let entry = entry.unwrap_or_else(|e| {
            panic!(
                "ERROR: cannot read annotation directory {}: {}",
                annotations.display(),
                e
            )
        });

        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.')
            || NON_STRAIN_DIRS.contains(&name.as_str())
            || exclude.iter().any(|excluded| *excluded == name)
        {
            continue;
        }

        strains.push(name);
    }

    strains.sort();
    info!(
        "Collected {} strains from {}",
        strains.len(),
        annotations.display()
    );

    strains
}

/// A single protein record from a strain's annotation file.
pub struct ProteinRecord {
    pub header: String,
    pub sequence: String,
}

/// All protein records of one strain, in file order, with an exact locus-id
/// index built once per file.
pub struct Proteome {
    records: Vec<ProteinRecord>,
    index: HashMap<String, usize>,
}

impl Proteome {
    /// Reads a protein FASTA file (optionally gzipped) into an indexed
    /// record store. Sequence lines are concatenated with internal
    /// whitespace stripped; the locus id is the first token of the header.
    pub fn from_fa(path: &Path) -> Self {
        let file = File::open(path).unwrap_or_else(|e| {
            panic!("ERROR: cannot open protein FASTA {}: {}", path.display(), e)
        });
        let reader: Box<dyn BufRead> = if path.to_string_lossy().ends_with(".gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let mut records: Vec<ProteinRecord> = Vec::new();
        for line in reader.lines() {
            let line = line.unwrap_or_else(|e| {
                panic!("ERROR: cannot read protein FASTA {}: {}", path.display(), e)
            });
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('>') {
                records.push(ProteinRecord {
                    header: header.to_string(),
                    sequence: String::new(),
                });
            } else {
                match records.last_mut() {
                    Some(record) => record
                        .sequence
                        .push_str(&line.split_whitespace().collect::<String>()),
                    None => panic!(
                        "ERROR: sequence line before first header in {}",
                        path.display()
                    ),
                }
            }
        }

        let mut index = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            if let Some(locus) = record.header.split_whitespace().next() {
                index.entry(locus.to_string()).or_insert(position);
            }
        }

        info!(
            "Read {} protein records from {}",
            records.len(),
            path.display()
        );

        Self { records, index }
    }

    /// Returns the sequence for an identifier. An exact locus-id hit always
    /// wins; with substring fallback enabled, a miss falls back to the first
    /// record in file order whose header or body contains the identifier.
    pub fn extract(&self, identifier: &str, exact_only: bool) -> Option<&str> {
        if let Some(&position) = self.index.get(identifier) {
            return Some(&self.records[position].sequence);
        }

        if exact_only {
            return None;
        }

        self.records
            .iter()
            .find(|record| {
                record.header.contains(identifier) || record.sequence.contains(identifier)
            })
            .map(|record| record.sequence.as_str())
    }
}

/// Locates the protein annotation file inside a strain's directory.
fn find_protein_file(dir: &Path) -> PathBuf {
    let entries = read_dir(dir).unwrap_or_else(|e| {
        panic!(
            "ERROR: cannot read strain directory {}: {}",
            dir.display(),
            e
        )
    });

    let mut candidates: Vec<PathBuf> = entries
        .map(|entry| {
            entry
                .unwrap_or_else(|e| {
                    panic!(
                        "ERROR: cannot read strain directory {}: {}",
                        dir.display(),
                        e
                    )
                })
                .path()
        })
        .filter(|path| {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            PROTEIN_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        })
        .collect();

    candidates.sort();
    candidates.into_iter().next().unwrap_or_else(|| {
        panic!(
            "ERROR: no protein annotation ({}) found in {}",
            PROTEIN_SUFFIXES.join("/"),
            dir.display()
        )
    })
}

/// Loads every strain's proteome, one strain per rayon task.
fn load_proteomes(annotations: &Path, strains: &[String]) -> HashMap<String, Proteome> {
    strains
        .par_iter()
        .map(|strain| {
            let path = find_protein_file(&annotations.join(strain));
            (strain.clone(), Proteome::from_fa(&path))
        })
        .collect()
}

/// Per-gene ortholog locus ids, one optional cell per strain in strain
/// collection order.
pub struct OrthologTable {
    rows: HashMap<String, Vec<Option<String>>>,
}

impl OrthologTable {
    /// Parses the comma-separated, quoted presence/absence table. Strain
    /// columns are located by the table's own header row; a strain missing
    /// from the header aborts the run.
    pub fn from_csv(path: &Path, strains: &[String]) -> Self {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .unwrap_or_else(|e| {
                panic!(
                    "ERROR: cannot open presence/absence table {}: {}",
                    path.display(),
                    e
                )
            });

        let headers = reader
            .headers()
            .unwrap_or_else(|e| {
                panic!(
                    "ERROR: cannot read presence/absence header of {}: {}",
                    path.display(),
                    e
                )
            })
            .clone();

        let columns: Vec<usize> = strains
            .iter()
            .map(|strain| {
                headers
                    .iter()
                    .position(|header| header == strain)
                    .unwrap_or_else(|| {
                        panic!(
                            "ERROR: strain {} is missing from the presence/absence header of {}",
                            strain,
                            path.display()
                        )
                    })
            })
            .collect();

        if !columns.windows(2).all(|pair| pair[0] < pair[1]) {
            warn!(
                "Presence/absence columns of {} are not in strain collection order; correspondence follows header names",
                path.display()
            );
        }

        let mut rows: HashMap<String, Vec<Option<String>>> = HashMap::new();
        for record in reader.records() {
            let record = record.unwrap_or_else(|e| {
                panic!(
                    "ERROR: cannot parse presence/absence table {}: {}",
                    path.display(),
                    e
                )
            });

            let gene = record.get(GENE_NAME_COLUMN).unwrap_or_default();
            if gene.is_empty() {
                continue;
            }

            let cells = columns
                .iter()
                .map(|&column| {
                    record
                        .get(column)
                        .map(str::trim)
                        .filter(|cell| !cell.is_empty())
                        .map(str::to_string)
                })
                .collect();

            rows.entry(gene.to_string()).or_insert(cells);
        }

        info!("Read {} ortholog rows from {}", rows.len(), path.display());

        Self { rows }
    }

    /// Resolves the locus id of a gene's ortholog in one strain. `None`
    /// covers both an empty cell and a gene with no row at all.
    pub fn resolve(&self, gene: &str, strain_index: usize) -> Option<&str> {
        self.rows.get(gene)?.get(strain_index)?.as_deref()
    }

    /// Whether the table has a row for this gene.
    pub fn contains(&self, gene: &str) -> bool {
        self.rows.contains_key(gene)
    }
}

/// Distinct mutated genes in first-appearance order.
fn unique_genes(sites: &[VariantSite]) -> Vec<&str> {
    let mut genes: Vec<&str> = Vec::new();
    for site in sites {
        if !genes.contains(&site.gene.as_str()) {
            genes.push(site.gene.as_str());
        }
    }

    genes
}

/// Writes one multi-record extract per mutated gene, one record per strain
/// that carries the gene under its own name token. Files are truncated
/// before writing, so a re-run fully replaces each artifact.
fn write_gene_extracts(
    sites: &[VariantSite],
    strains: &[String],
    proteomes: &HashMap<String, Proteome>,
    outdir: &Path,
    exact_only: bool,
    compress: bool,
) {
    let genes = unique_genes(sites);

    genes.par_iter().for_each(|gene| {
        let path = with_gzip_extension(
            outdir.join(format!("{}{}.txt", OUTPUT_PREFIX, gene)),
            compress,
        );
        let mut writer = make_writer(&path, compress);

        for strain in strains {
            if let Some(sequence) = proteomes[strain].extract(gene, exact_only) {
                writeln!(writer, ">{}_{}", strain, gene)
                    .unwrap_or_else(|e| panic!("ERROR: cannot write {}: {}", path.display(), e));
                writeln!(writer, "{}", sequence)
                    .unwrap_or_else(|e| panic!("ERROR: cannot write {}: {}", path.display(), e));
            }
        }

        writer
            .flush()
            .unwrap_or_else(|e| panic!("ERROR: cannot flush {}: {}", path.display(), e));
    });

    info!("Wrote {} per-gene extracts", genes.len());
}

/// Builds and writes the consolidated per-site amino acid matrix.
///
/// The first output line reproduces the variant table's own header; each row
/// is `gene`, codon index, then one amino-acid-or-empty field per strain.
/// The codon index is applied to the translated sequence as a zero-based
/// offset; a sequence too short for the offset yields an empty field.
fn write_matrix(
    table: &VariantTable,
    strains: &[String],
    proteomes: &HashMap<String, Proteome>,
    orthologs: &OrthologTable,
    outdir: &Path,
    exact_only: bool,
    compress: bool,
) {
    let rows: Vec<String> = table
        .sites
        .par_iter()
        .map(|site| {
            let aa_position =
                codon_index(site.nt_position).unwrap_or_else(|e| panic!("{}", e));

            let mut fields = vec![site.gene.clone(), aa_position.to_string()];
            for (strain_index, strain) in strains.iter().enumerate() {
                let amino_acid = orthologs
                    .resolve(&site.gene, strain_index)
                    .and_then(|locus| proteomes[strain].extract(locus, exact_only))
                    .and_then(|sequence| sequence.as_bytes().get(aa_position).copied())
                    .map(|aa| (aa as char).to_string())
                    .unwrap_or_default();
                fields.push(amino_acid);
            }

            fields.join("\t")
        })
        .collect();

    let path = with_gzip_extension(outdir.join(MATRIX_FILE), compress);
    let mut writer = make_writer(&path, compress);

    writeln!(writer, "{}", table.header)
        .unwrap_or_else(|e| panic!("ERROR: cannot write {}: {}", path.display(), e));
    for row in &rows {
        writeln!(writer, "{}", row)
            .unwrap_or_else(|e| panic!("ERROR: cannot write {}: {}", path.display(), e));
    }

    writer
        .flush()
        .unwrap_or_else(|e| panic!("ERROR: cannot flush {}: {}", path.display(), e));

    info!("Wrote {} matrix rows to {}", rows.len(), path.display());
}

fn make_writer(path: &Path, compress: bool) -> Box<dyn Write> {
    let file = File::create(path)
        .unwrap_or_else(|e| panic!("ERROR: cannot create {}: {}", path.display(), e));

    if compress {
        Box::new(GzEncoder::new(
            BufWriter::new(file),
            Compression::default(),
        ))
    } else {
        Box::new(BufWriter::new(file))
    }
}

fn with_gzip_extension(mut path: PathBuf, compress: bool) -> PathBuf {
    if compress && path.extension().and_then(|ext| ext.to_str()) != Some("gz") {
        path.as_mut_os_string().push(".gz");
    }

    path
}
