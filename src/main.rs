use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use rnamap_bitvector::bitvector::config::{
    parse_position_list, DEFAULT_MIN_MAPQ, DEFAULT_MIN_QUALITY, DEFAULT_WINDOW_SIZE,
};
use rnamap_bitvector::bitvector::{
    BatchDriver, BitVectorConfig, BitVectorSummary, StricterConstraints,
};
use rnamap_bitvector::io::bitvec::{
    BincodeHeader, BincodeReader, BincodeWriter, BitVectorSink, RunMeta, TextWriter,
};
use rnamap_bitvector::io::fasta::ReferenceSet;
use rnamap_bitvector::io::sam::SamReader;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "rnamap-bitvector", author, version, about = "Generate mutational-profiling bit vectors from aligned reads", arg_required_else_help = true)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert SAM alignments into per-read bit vectors
    Generate(GenerateArgs),
    /// Print per-reference totals of a bincode bit-vector file
    Summarize {
        /// Bit-vector file written with `--format bincode`
        input: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Bincode,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Reference FASTA file
    #[arg(short = 'f', long = "fasta")]
    fasta: PathBuf,
    /// Aligned reads (SAM text)
    #[arg(short = 's', long = "sam")]
    sam: PathBuf,
    /// Output path (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Minimum base quality for a mismatch to count as a mutation
    #[arg(long = "qscore-cutoff", default_value_t = DEFAULT_MIN_QUALITY)]
    qscore_cutoff: u8,
    /// Positions masked on each side of a deletion or low-quality mismatch
    #[arg(long = "window", default_value_t = DEFAULT_WINDOW_SIZE)]
    window: usize,
    /// Positions excluded at each end of a read
    #[arg(long = "end-exclusion", default_value_t = 0)]
    end_exclusion: usize,
    /// Minimum mapping quality
    #[arg(long = "map-score-cutoff", default_value_t = DEFAULT_MIN_MAPQ)]
    map_score_cutoff: u8,
    #[arg(long = "min-mapped-length")]
    min_mapped_length: Option<usize>,
    #[arg(long = "max-mapped-length")]
    max_mapped_length: Option<usize>,
    /// Always-excluded positions, 1-based inclusive ranges (e.g. `1-20,45`)
    #[arg(long)]
    exclude: Option<String>,
    /// Always-included positions, 1-based inclusive ranges
    #[arg(long)]
    include: Option<String>,
    /// Enable the stricter constraint set below
    #[arg(long)]
    stricter: bool,
    #[arg(long = "forbid-insertions")]
    forbid_insertions: bool,
    #[arg(long = "mutation-count-cutoff", default_value_t = 5)]
    mutation_count_cutoff: usize,
    #[arg(long = "min-mut-distance")]
    min_mut_distance: Option<usize>,
    #[arg(long = "percent-length-cutoff", default_value_t = 0.1)]
    percent_length_cutoff: f64,
    #[arg(long = "surrounding-matches", default_value_t = 0)]
    surrounding_matches: usize,
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,
    /// Reads processed per parallel batch
    #[arg(long = "chunk-size", default_value_t = 10_000)]
    chunk_size: usize,
}

impl GenerateArgs {
    fn to_config(&self) -> Result<BitVectorConfig> {
        let exclude = self.exclude.as_deref().map(parse_position_list).transpose()?.unwrap_or_default();
        let include = self.include.as_deref().map(parse_position_list).transpose()?.unwrap_or_default();
        let stricter = self.stricter.then(|| StricterConstraints {
            forbid_insertions: self.forbid_insertions,
            max_mutations: Some(self.mutation_count_cutoff),
            min_mutation_distance: self.min_mut_distance,
            min_coverage_fraction: Some(self.percent_length_cutoff),
            surrounding_matches: self.surrounding_matches,
        });
        let config = BitVectorConfig::builder()
            .min_quality(self.qscore_cutoff)
            .window_size(self.window)
            .end_exclusion(self.end_exclusion)
            .min_mapq(self.map_score_cutoff)
            .min_mapped_length(self.min_mapped_length)
            .max_mapped_length(self.max_mapped_length)
            .exclude(exclude)
            .include(include)
            .stricter(stricter)
            .build()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => run_generate(&args),
        Commands::Summarize { input } => run_summarize(&input),
    }
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    if args.chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }
    if args.forbid_insertions && !args.stricter {
        tracing::warn!("--forbid-insertions has no effect without --stricter");
    }
    let config = args.to_config().context("invalid configuration")?;
    let references = ReferenceSet::load(&args.fasta)?;
    tracing::info!(references = references.len(), fasta = %args.fasta.display(), "reference loaded");

    let driver = BatchDriver::new(&references, &config, args.threads)?;

    let sam = std::fs::File::open(&args.sam)
        .with_context(|| format!("cannot open SAM '{}'", args.sam.display()))?;
    let mut reader = SamReader::new(std::io::BufReader::new(sam))
        .with_context(|| format!("cannot read SAM '{}'", args.sam.display()))?;
    tracing::debug!(
        sam_references = reader.header().reference_sequences().len(),
        "SAM header read"
    );

    let out: Box<dyn Write> = if let Some(p) = &args.out {
        let fh = std::fs::File::create(p)
            .with_context(|| format!("cannot create output '{}'", p.display()))?;
        Box::new(std::io::BufWriter::new(fh))
    } else {
        Box::new(std::io::BufWriter::new(std::io::stdout()))
    };
    let meta = RunMeta::capture();
    let mut sink: Box<dyn BitVectorSink> = match args.format {
        OutputFormat::Text => Box::new(TextWriter::new(out, &references, &meta)?),
        OutputFormat::Bincode => {
            let header = BincodeHeader::new(meta, &references, &config);
            Box::new(BincodeWriter::new(out, &header)?)
        }
    };

    let stats = driver.stream(&mut reader, sink.as_mut(), args.chunk_size)?;

    tracing::info!(
        reads = stats.reads,
        accepted = stats.accepted,
        rejected = stats.total_rejected(),
        skipped_unmapped = stats.skipped,
        threads = driver.threads(),
        "bit vector generation complete"
    );
    for (kind, n) in &stats.rejected {
        tracing::info!(reason = %kind, count = n, "rejected reads");
    }
    for (name, n) in &stats.per_reference {
        tracing::info!(reference = %name, reads = n, "accepted reads");
    }
    Ok(())
}

fn run_summarize(input: &Path) -> Result<()> {
    let fh = std::fs::File::open(input)
        .with_context(|| format!("cannot open '{}'", input.display()))?;
    let stdout = std::io::stdout();
    summarize(std::io::BufReader::new(fh), stdout.lock())
}

/// 逐条累计每个参考的 read 数与符号计数
fn summarize<R: BufRead, W: Write>(input: R, mut out: W) -> Result<()> {
    let mut reader = BincodeReader::new(input)?;
    let mut reads = 0u64;
    let mut totals: BTreeMap<String, (u64, BitVectorSummary)> = BTreeMap::new();
    while let Some(r) = reader.next_result()? {
        reads += 1;
        let e = totals.entry(r.reference().to_string()).or_default();
        e.0 += 1;
        e.1.merge(r.summary());
    }

    let header = reader.header();
    writeln!(out, "generated: {} ({} {})", header.meta.timestamp, header.meta.program, header.meta.version)?;
    writeln!(out, "reads: {}", reads)?;
    writeln!(out, "reference\tlength\treads\tmatches\tmutations\tdeletions\tambiguous")?;
    for (name, len) in &header.references {
        let (n, s) = totals.get(name).copied().unwrap_or_default();
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            name, len, n, s.matches, s.mutations, s.deletions, s.ambiguous
        )?;
    }
    out.flush()?;
    Ok(())
}
