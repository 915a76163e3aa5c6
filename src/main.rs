use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use legislator_merge::pipeline::{self, RunSummary, Stage};
use legislator_merge::{LinkError, PipelineConfig, VERSION};

#[derive(Parser)]
#[command(name = "legislator-merge")]
#[command(version = VERSION)]
#[command(about = "Build the legislator identity registry and merge the NPL and LY crawls")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (defaults to the standard data layout)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Directory relative paths are resolved against
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Record the run in this SQLite database
    #[arg(long, global = true)]
    audit_db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the identity registry and write its snapshot
    Registry,

    /// Link the sources onto the registry snapshot and write the merged dataset
    Merge,

    /// Registry + merge in one pass; nothing is written if coverage fails
    Run,

    /// Project one term of the merged dataset to codes
    Project {
        /// Term number
        #[arg(long, short)]
        term: u32,

        /// Also write an id,name roster
        #[arg(long)]
        csv: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legislator_merge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprintln!("\n❌ {:#}", e);
        if let Some(link_error) = e.downcast_ref::<LinkError>() {
            for gap in link_error.gaps() {
                eprintln!("   • {}", gap);
            }
        }
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Registry => run_stage(&config, Stage::Registry),
        Commands::Merge => run_stage(&config, Stage::Merge),
        Commands::Run => run_stage(&config, Stage::Full),
        Commands::Project { term, csv } => run_project(&config, term, csv),
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(db) = &cli.audit_db {
        config.audit_db = Some(db.clone());
    }
    if let Some(root) = &cli.root {
        config = config.with_root(root);
    }
    Ok(config)
}

fn run_stage(config: &PipelineConfig, stage: Stage) -> Result<()> {
    println!("🪪 Legislator merge: {}", stage.as_str());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summary = pipeline::run(config, stage)?;
    print_summary(&summary);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match stage {
        Stage::Registry => println!("💾 Registry snapshot: {:?}", config.registry_snapshot),
        Stage::Merge => println!("💾 Merged dataset: {:?}", config.merged_output),
        Stage::Full => {
            println!("💾 Registry snapshot: {:?}", config.registry_snapshot);
            println!("💾 Merged dataset: {:?}", config.merged_output);
        }
    }
    if let Some(db) = &config.audit_db {
        println!("📜 Run {} logged to {:?}", summary.run_id, db);
    }
    println!("✅ Done");

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n✓ {} identities", summary.identities);
    if summary.legislators > 0 {
        println!("✓ {} legislators, {} merged terms", summary.legislators, summary.terms);
    }

    let counts = summary.counts_by_kind();
    if counts.is_empty() {
        println!("✓ No diagnostics");
        return;
    }

    println!("\n📣 Diagnostics:");
    for (kind, count) in counts {
        println!("   {:<28} {}", kind.as_str(), count);
    }
}

fn run_project(config: &PipelineConfig, term: u32, csv: bool) -> Result<()> {
    println!("🗳️  Projecting term {}", term);

    let rows = pipeline::project(config, term, csv)?;

    println!("✓ {} legislators → {:?}", rows, config.projection_json(term));
    if csv {
        println!("✓ Roster → {:?}", config.projection_csv(term));
    }

    Ok(())
}
