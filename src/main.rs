//! irismatch CLI entry point

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use irismatch::config::DATA_ROOT_ENV;
use irismatch::queries::{self, Question};
use irismatch::report::ReportConfig;
use irismatch::{Config, DataRoot, IrisDump, ShardSource};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const MISSING_META_HINT: &str = "Please download the OpenCitations Meta dump.";
const MISSING_INDEX_HINT: &str = "Please download the OpenCitations Index dump.";

#[derive(Parser)]
#[command(name = "irismatch")]
#[command(version, about = "Reconcile IRIS records with OpenCitations Meta and Index", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the created datasets
    #[arg(long, global = true, env = DATA_ROOT_ENV)]
    data_root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create one or more datasets
    Create(CreateArgs),

    /// Answer the research questions from the created datasets
    Answer {
        /// Research question to answer (1-5); all of them when omitted
        #[arg(long = "rq", value_parser = clap::value_parser!(u8).range(1..=5))]
        question: Option<u8>,

        /// Width of banners and rules
        #[arg(long, default_value_t = 80)]
        width: usize,
    },
}

#[derive(Args)]
struct CreateArgs {
    /// IRIS dump folder or zip archive
    #[arg(long)]
    iris: Option<PathBuf>,

    /// OpenCitations Meta dump (zip, tar, tar.gz or folder of CSV files)
    #[arg(long)]
    meta: Option<PathBuf>,

    /// OpenCitations Index dump (zip or folder of zip/CSV files)
    #[arg(long)]
    index: Option<PathBuf>,

    /// Records with external identifiers that are in Meta
    #[arg(long, requires_all = ["iris", "meta"])]
    iris_in_meta: bool,

    /// Records with external identifiers that are not in Meta
    #[arg(long, requires = "iris")]
    iris_not_in_meta: bool,

    /// Records without external identifiers
    #[arg(long, requires = "iris")]
    iris_no_id: bool,

    /// Index citations involving the records in Meta
    #[arg(long, requires = "index")]
    iris_in_index: bool,
}

impl CreateArgs {
    fn any(&self) -> bool {
        self.iris_in_meta || self.iris_not_in_meta || self.iris_no_id || self.iris_in_index
    }
}

fn main() {
    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(root) = cli.data_root {
        config.data_root = root;
    }
    let data = DataRoot::new(&config.data_root);

    match cli.command {
        Commands::Create(args) => create(&args, &data, &config),
        Commands::Answer { question, width } => answer(question, width, &data),
    }
}

fn create(args: &CreateArgs, data: &DataRoot, config: &Config) -> anyhow::Result<()> {
    if !args.any() {
        bail!("Please pass a dataset specific argument to create a dataset. Use the -h flag for help.");
    }

    let iris = args.iris.as_deref().map(IrisDump::open).transpose()?;

    if args.iris_in_meta {
        let meta = open_dump(args.meta.as_deref(), MISSING_META_HINT)?;
        let summary = data
            .create_iris_in_meta(required(&iris)?, &meta, config)
            .context("Failed to create Iris In Meta")?;
        info!(
            "{} matched records from {} candidates in {} shards",
            summary.matched, summary.candidates, summary.shards
        );
    }

    if args.iris_not_in_meta {
        let written = data
            .create_iris_not_in_meta(required(&iris)?, config)
            .context("Failed to create Iris Not In Meta")?;
        info!("{} records are not in Meta", written);
    }

    if args.iris_no_id {
        let written = data
            .create_iris_no_id(required(&iris)?)
            .context("Failed to create Iris No ID")?;
        info!("{} records have no identifier", written);
    }

    if args.iris_in_index {
        let index = open_dump(args.index.as_deref(), MISSING_INDEX_HINT)?;
        let summary = data
            .create_index_in_iris(&index)
            .context("Failed to create Index In Iris")?;
        info!(
            "{} of {} citations involve matched records",
            summary.kept, summary.scanned
        );
    }

    Ok(())
}

fn required(iris: &Option<IrisDump>) -> anyhow::Result<&IrisDump> {
    iris.as_ref()
        .context("Please provide the IRIS dump with the --iris argument.")
}

fn open_dump(path: Option<&Path>, hint: &str) -> anyhow::Result<ShardSource> {
    let path = path.context("Missing dump path")?;
    Ok(ShardSource::open(path, hint)?)
}

fn answer(question: Option<u8>, width: usize, data: &DataRoot) -> anyhow::Result<()> {
    let report = ReportConfig::new(width);
    let questions: Vec<Question> = match question {
        Some(number) => Question::from_number(number).into_iter().collect(),
        None => Question::ALL.to_vec(),
    };

    for question in questions {
        let answer = queries::answer(question, data);
        // missing datasets are reported in place of the answer
        if matches!(&answer, Err(err) if !queries::is_missing_prerequisite(err)) {
            return answer
                .map(|_| ())
                .with_context(|| format!("Failed to answer {question}"));
        }
        println!();
        println!("{}", report.rule());
        print!("{}", report.section(question, &answer));
    }
    Ok(())
}
