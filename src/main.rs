fn main() {
    println!("co1curate-rs - CO1 Barcode Curation Pipeline");
    println!();
    println!("🧬 Pipeline stages, in order:");
    println!("  classify_contigs   - Pick the best assembled contig per specimen");
    println!("  extract_fragments  - Split dereplicated clusters and merge the fragment pair");
    println!("  trim_reads         - Trim merged reads of their degenerate primers");
    println!("  evaluate_barcodes  - Validate consensus barcodes and aggregate the curated set");
    println!();
    println!("📖 For help with each tool:");
    println!("  cargo run --bin classify_contigs -- --help");
    println!("  cargo run --bin extract_fragments -- --help");
    println!("  cargo run --bin trim_reads -- --help");
    println!("  cargo run --bin evaluate_barcodes -- --help");
    println!();
    println!("🚀 Quick start example:");
    println!("  cargo run --bin trim_reads -- --input merged.fq --primers primers.fasta --output trimmed.fq");
    println!();
    println!("💡 Each stage reads the previous stage's output files; specimens are independent.");
}
