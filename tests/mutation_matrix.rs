use flate2::{Compression, write::GzEncoder};
use std::{
    fs::{File, create_dir_all},
    io::{BufWriter, Write},
    path::Path,
};
use tempfile::TempDir;
use xmut::{Args, codon_index, xmut};

const S1_PROTEINS: &str = ">locus_S1_7 geneA putative kinase\nMKTAYIAK\n";
const S2_PROTEINS: &str = ">locus_S2_1 hypothetical protein\nMSSQTPLR\n";
const VARIANT_TABLE: &str = "Gene\tPosition\ngeneA\t4\n";
const PAN_TABLE: &str =
    "\"Gene\",\"Annotation\",\"S1\",\"S2\"\n\"geneA\",\"putative kinase\",\"locus_S1_7\",\"\"\n";

fn write_bytes(path: &Path, content: &[u8]) {
    std::fs::write(path, content)
        .unwrap_or_else(|e| panic!("failed to write {}: {}", path.display(), e));
}

fn write_gzip(path: &Path, content: &[u8]) {
    let file = File::create(path)
        .unwrap_or_else(|e| panic!("failed to create gzip file {}: {}", path.display(), e));
    let mut writer = GzEncoder::new(BufWriter::new(file), Compression::default());

    writer
        .write_all(content)
        .unwrap_or_else(|e| panic!("failed to write gzip content {}: {}", path.display(), e));
    writer
        .finish()
        .unwrap_or_else(|e| panic!("failed to finish gzip file {}: {}", path.display(), e));
}

fn write_strain(root: &Path, strain: &str, proteins: &str) {
    let dir = root.join("annotations").join(strain);
    create_dir_all(&dir).unwrap_or_else(|e| panic!("failed to create {}: {}", dir.display(), e));
    write_bytes(&dir.join(format!("{strain}.faa")), proteins.as_bytes());
}

fn write_tables(root: &Path, variants: &str, pan: &str) {
    write_bytes(&root.join("variants.tsv"), variants.as_bytes());
    write_bytes(&root.join("pan.csv"), pan.as_bytes());

    // an output directory of the surrounding pipeline, never a strain
    let pangenome = root.join("annotations").join("pangenome");
    create_dir_all(&pangenome)
        .unwrap_or_else(|e| panic!("failed to create {}: {}", pangenome.display(), e));
    write_bytes(&pangenome.join("summary.txt"), b"clusters\n");
}

fn make_args(root: &Path) -> Args {
    Args {
        annotations: root.join("annotations"),
        variants: root.join("variants.tsv"),
        pan: root.join("pan.csv"),
        outdir: root.join("out"),
        exclude: Vec::new(),
        reference: None,
        exact_only: false,
        level: log::Level::Info,
        compress: false,
    }
}

fn read_output(root: &Path, name: &str) -> String {
    let path = root.join("out").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

#[test]
fn test_codon_index_boundaries() {
    assert_eq!(codon_index(1), Ok(1));
    assert_eq!(codon_index(3), Ok(1));
    assert_eq!(codon_index(4), Ok(2));
    assert_eq!(codon_index(6), Ok(2));
    assert_eq!(codon_index(7), Ok(3));
}

#[test]
fn test_codon_index_ceiling_law() {
    for k in 1..=30 {
        assert_eq!(codon_index(3 * k), Ok(k));
        assert_eq!(codon_index(3 * k + 1), Ok(k + 1));
        assert_eq!(codon_index(3 * k + 2), Ok(k + 1));
    }
}

#[test]
fn test_codon_index_rejects_zero() {
    assert!(codon_index(0).is_err());
}

#[test]
fn test_matrix_end_to_end() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(root, "S1", S1_PROTEINS);
    write_strain(root, "S2", S2_PROTEINS);
    write_tables(root, VARIANT_TABLE, PAN_TABLE);

    xmut(make_args(root));

    assert_eq!(
        read_output(root, "SNPs_AA_allgenes.txt"),
        "Gene\tPosition\ngeneA\t2\tT\t\n"
    );
}

#[test]
fn test_per_gene_extract_skips_strains_without_gene() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(root, "S1", S1_PROTEINS);
    write_strain(root, "S2", S2_PROTEINS);
    write_tables(root, VARIANT_TABLE, PAN_TABLE);

    xmut(make_args(root));

    assert_eq!(
        read_output(root, "SNPs_AA_geneA.txt"),
        ">S1_geneA\nMKTAYIAK\n"
    );
}

#[test]
fn test_per_gene_extract_both_strains() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(root, "S1", S1_PROTEINS);
    write_strain(root, "S2", ">locus_S2_9 geneA putative kinase\nMKTAYLAK\n");
    write_tables(root, VARIANT_TABLE, PAN_TABLE);

    xmut(make_args(root));

    assert_eq!(
        read_output(root, "SNPs_AA_geneA.txt"),
        ">S1_geneA\nMKTAYIAK\n>S2_geneA\nMKTAYLAK\n"
    );
}

#[test]
fn test_absent_orthologs_yield_empty_fields() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(root, "S1", S1_PROTEINS);
    write_strain(root, "S2", S2_PROTEINS);
    write_tables(
        root,
        "Gene\tPosition\ngeneA\t1\ngeneA\t7\ngeneB\t2\n",
        PAN_TABLE,
    );

    xmut(make_args(root));

    let matrix = read_output(root, "SNPs_AA_allgenes.txt");
    let lines: Vec<&str> = matrix.lines().collect();

    assert_eq!(lines.len(), 4, "header plus one row per variant site");
    for row in &lines[1..] {
        assert_eq!(row.split('\t').count(), 4, "gene, codon, one field per strain");
    }
    assert_eq!(lines[1], "geneA\t1\tK\t");
    assert_eq!(lines[2], "geneA\t3\tA\t");
    assert_eq!(lines[3], "geneB\t1\t\t");

    // geneB is in no proteome either: its extract exists but holds no records
    assert_eq!(read_output(root, "SNPs_AA_geneB.txt"), "");
}

#[test]
fn test_exact_match_beats_earlier_substring_candidate() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(
        root,
        "S1",
        ">geneA_locus_2 decoy paralog\nMDDDDDDD\n>geneA real copy\nMRRRRRRR\n",
    );
    write_tables(
        root,
        VARIANT_TABLE,
        "\"Gene\",\"Annotation\",\"S1\"\n\"geneA\",\"kinase\",\"geneA\"\n",
    );

    xmut(make_args(root));

    assert_eq!(
        read_output(root, "SNPs_AA_geneA.txt"),
        ">S1_geneA\nMRRRRRRR\n"
    );
    assert_eq!(
        read_output(root, "SNPs_AA_allgenes.txt"),
        "Gene\tPosition\ngeneA\t2\tR\n"
    );
}

#[test]
fn test_rerun_is_byte_identical() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(root, "S1", S1_PROTEINS);
    write_strain(root, "S2", S2_PROTEINS);
    write_tables(root, VARIANT_TABLE, PAN_TABLE);

    xmut(make_args(root));
    let first_matrix = read_output(root, "SNPs_AA_allgenes.txt");
    let first_extract = read_output(root, "SNPs_AA_geneA.txt");

    xmut(make_args(root));
    assert_eq!(read_output(root, "SNPs_AA_allgenes.txt"), first_matrix);
    assert_eq!(read_output(root, "SNPs_AA_geneA.txt"), first_extract);
}

#[test]
fn test_gzipped_proteome_input() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    let s1_dir = root.join("annotations").join("S1");
    create_dir_all(&s1_dir)
        .unwrap_or_else(|e| panic!("failed to create {}: {}", s1_dir.display(), e));
    write_gzip(&s1_dir.join("S1.faa.gz"), S1_PROTEINS.as_bytes());
    write_strain(root, "S2", S2_PROTEINS);
    write_tables(root, VARIANT_TABLE, PAN_TABLE);

    xmut(make_args(root));

    assert_eq!(
        read_output(root, "SNPs_AA_allgenes.txt"),
        "Gene\tPosition\ngeneA\t2\tT\t\n"
    );
}

#[test]
#[should_panic(expected = "malformed nucleotide position")]
fn test_malformed_position_aborts() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(root, "S1", S1_PROTEINS);
    write_strain(root, "S2", S2_PROTEINS);
    write_tables(root, "Gene\tPosition\ngeneA\t0\n", PAN_TABLE);

    xmut(make_args(root));
}

#[test]
#[should_panic(expected = "missing from the presence/absence header")]
fn test_missing_strain_column_aborts() {
    let temp = TempDir::new().expect("failed to create temporary directory");
    let root = temp.path();

    write_strain(root, "S1", S1_PROTEINS);
    write_strain(root, "S2", S2_PROTEINS);
    write_tables(
        root,
        VARIANT_TABLE,
        "\"Gene\",\"Annotation\",\"S1\"\n\"geneA\",\"kinase\",\"locus_S1_7\"\n",
    );

    xmut(make_args(root));
}
