use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use imgcull::config::{Config, Mode, QuarantineAction, VerificationConfig};
use imgcull::core::audit::Decision;
use imgcull::core::quarantine::{self, RestoreSelection};
use imgcull::engine::{self, RunOutcome};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "imgcull",
    version,
    about = "Find, verify and quarantine duplicate images"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every run mode.
#[derive(Args, Debug)]
struct RunArgs {
    /// TOML config file (default: `<config dir>/imgcull/config.toml` if present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Directory to quarantine duplicates into (default: `<dir>/duplicates_backup`)
    #[arg(long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,
    /// Where to write the report
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
    /// Only look at the top level of each directory
    #[arg(long)]
    flat: bool,
    /// Copy duplicates instead of moving them
    #[arg(long)]
    copy: bool,
    /// Only show what would be moved
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drop near-identical consecutive frames from a sequence
    Sequential {
        /// Directory of frames
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Max Hamming distance to the last kept frame (default 7)
        #[arg(long, value_name = "N")]
        threshold: Option<u32>,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Cluster duplicates across a whole directory
    Full {
        /// Directory to deduplicate
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Max Hamming distance within a cluster (default 3)
        #[arg(long, value_name = "N")]
        threshold: Option<u32>,
        /// Remove perceptual matches without a similarity check
        #[arg(long)]
        no_verify: bool,
        /// Minimum structural similarity to remove a perceptual match (default 0.95)
        #[arg(long, value_name = "T")]
        ssim: Option<f64>,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Report overlap between a reference and an evaluation set; moves nothing
    Cross {
        /// Reference corpus
        #[arg(long, value_name = "DIR")]
        train: PathBuf,
        /// Evaluation corpus
        #[arg(long, value_name = "DIR")]
        eval: PathBuf,
        /// Max Hamming distance for a perceptual overlap (default 8)
        #[arg(long, value_name = "N")]
        threshold: Option<u32>,
        /// Score every perceptual overlap with structural similarity
        #[arg(long)]
        verify: bool,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Compare two images side by side
    Compare {
        #[arg(value_name = "FILE")]
        a: PathBuf,
        #[arg(value_name = "FILE")]
        b: PathBuf,
    },

    /// Work with quarantine history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List all quarantine history records
    List {
        /// Quarantine directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },

    /// Move quarantined files back to where they came from
    Restore {
        /// Quarantine directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Restore a specific record index (default: latest)
        #[arg(long, conflicts_with = "all")]
        record: Option<usize>,
        /// Restore all records
        #[arg(long, conflicts_with = "record")]
        all: bool,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sequential {
            path,
            threshold,
            run,
        } => {
            let mut config = load_config(&run, Mode::Sequential, vec![path])?;
            if let Some(t) = threshold {
                config.thresholds.sequential = t;
            }
            execute(&config)?;
        }

        Commands::Full {
            path,
            threshold,
            no_verify,
            ssim,
            run,
        } => {
            let mut config = load_config(&run, Mode::FullCorpus, vec![path])?;
            if let Some(t) = threshold {
                config.thresholds.full_corpus = t;
            }
            if no_verify {
                config.verification.enabled = false;
            }
            if let Some(t) = ssim {
                config.verification.threshold = t;
            }
            execute(&config)?;
        }

        Commands::Cross {
            train,
            eval,
            threshold,
            verify,
            run,
        } => {
            let mut config = load_config(&run, Mode::CrossCorpus, vec![train, eval])?;
            if let Some(t) = threshold {
                config.thresholds.cross_corpus = t;
            }
            config.verification.enabled = verify;
            execute(&config)?;
        }

        Commands::Compare { a, b } => compare(&a, &b)?,

        Commands::History { command } => match command {
            HistoryCmd::List { path } => list_history(&path)?,
            HistoryCmd::Restore {
                path,
                record,
                all,
                yes,
            } => {
                let selection = match (all, record) {
                    (true, _) => RestoreSelection::All,
                    (false, Some(i)) => RestoreSelection::Index(i),
                    (false, None) => RestoreSelection::Latest,
                };
                restore_history(&path, selection, yes)?;
            }
        },
    }

    Ok(())
}

/// Config file first, then command-line overrides.
fn load_config(args: &RunArgs, mode: Mode, roots: Vec<PathBuf>) -> Result<Config> {
    let file = args
        .config
        .clone()
        .or_else(|| Config::default_location().filter(|p| p.is_file()));
    let mut config = match file {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    config.mode = mode;
    config.roots = roots;
    if let Some(dir) = &args.backup_dir {
        config.backup_dir = Some(dir.clone());
    }
    if let Some(report) = &args.report {
        config.report_path = Some(report.clone());
    }
    if args.flat {
        config.scan.recursive = false;
    }
    if args.copy {
        config.action = QuarantineAction::Copy;
    }
    if args.dry_run {
        config.dry_run = true;
    }
    Ok(config)
}

fn execute(config: &Config) -> Result<()> {
    let roots: Vec<String> = config
        .roots
        .iter()
        .map(|r| r.display().to_string())
        .collect();
    println!("▶ {} run over: {}", config.mode.label(), roots.join(", "));

    let outcome = engine::run(config)
        .with_context(|| format!("{} run failed", config.mode.label()))?;
    print_outcome(config, &outcome);
    Ok(())
}

fn print_outcome(config: &Config, outcome: &RunOutcome) {
    let counts = outcome.log.counts();

    if let Some(overlap) = &outcome.overlap {
        println!(
            "\n🔎 Overlap: {} by filename, {} exact, {} perceptual",
            overlap.filename.len(),
            overlap.exact.len(),
            overlap.perceptual.len()
        );
        for warning in &overlap.warnings {
            println!("⚠️  {}", warning);
        }
    } else if outcome.clusters.is_empty() {
        println!("No duplicates found.");
    } else {
        for (i, cluster) in outcome.clusters.iter().enumerate() {
            println!("\n✨ Group {}:", i + 1);
            println!("   🏆 Keeping → {}", cluster.representative.display());
            for member in &cluster.members {
                let entry = outcome.log.entry(&member.path);
                match (member.decision, entry.and_then(|e| e.destination.as_ref())) {
                    (Decision::Remove, Some(dest)) if config.dry_run => println!(
                        "   📦 [dry-run] {} → {}",
                        member.path.display(),
                        dest.display()
                    ),
                    (Decision::Remove, Some(dest)) => println!(
                        "   📦 {} {} → {}",
                        capitalize(config.action.label()),
                        member.path.display(),
                        dest.display()
                    ),
                    _ => println!(
                        "   🔍 Review {} ({})",
                        member.path.display(),
                        member.confidence
                    ),
                }
            }
        }
    }

    println!(
        "\n📊 {} scanned: {} kept, {} removed, {} to review, {} skipped",
        counts.total, counts.kept, counts.removed, counts.review, counts.skipped
    );

    match &outcome.report_path {
        Some(path) => println!("✅ Wrote report to {}", path.display()),
        None => {
            if !config.dry_run || config.report_path.is_some() {
                eprintln!("⚠️  Could not write the report; printing it instead");
            }
            println!("\n{}", outcome.report);
        }
    }
    if config.dry_run {
        println!("\n⚠️  Dry-run only; no files were changed.");
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn compare(a: &Path, b: &Path) -> Result<()> {
    let result = engine::compare_pair(a, b, &VerificationConfig::default())
        .with_context(|| format!("Failed to compare {} and {}", a.display(), b.display()))?;

    for record in [&result.a, &result.b] {
        println!("▶ {}", record.path.display());
        println!("     size:   {} bytes", record.size);
        println!("     digest: {}", record.digest);
        println!("     phash:  {}", record.phash);
    }
    println!("\n   identical bytes:      {}", if result.exact { "yes" } else { "no" });
    println!("   hamming distance:     {}/64", result.distance);
    println!("   structural similarity: {:.4}", result.similarity);
    Ok(())
}

fn list_history(path: &Path) -> Result<()> {
    let records = quarantine::read_history(path)
        .with_context(|| format!("Could not read history in {}", path.display()))?;

    println!("🗂️  Quarantine History:");
    let mut restorable = 0;
    for (_, record) in records {
        let index = if record.action == QuarantineAction::Move.label() {
            restorable += 1;
            format!("[{}]", restorable - 1)
        } else {
            "[-]".to_string()
        };
        println!(
            "{} {}  mode: {}  action: {}  files: {}",
            index,
            record.timestamp,
            record.mode,
            record.action,
            record.moves.len()
        );
        for mv in &record.moves {
            println!("     {} → {}", mv.source.display(), mv.destination.display());
        }
    }
    Ok(())
}

fn restore_history(path: &Path, selection: RestoreSelection, yes: bool) -> Result<()> {
    if !yes {
        let what = match selection {
            RestoreSelection::All => "all history records".to_string(),
            RestoreSelection::Latest => "the latest history record".to_string(),
            RestoreSelection::Index(i) => format!("history record {}", i),
        };
        let confirmed = Confirm::new()
            .with_prompt(format!("Restore {} from {}?", what, path.display()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let summary = quarantine::restore(path, selection)
        .with_context(|| format!("Failed to restore from {}", path.display()))?;
    for mv in &summary.restored {
        println!(
            "🔄 Restored {} → {}",
            mv.destination.display(),
            mv.source.display()
        );
    }
    for (mv, reason) in &summary.skipped {
        eprintln!("⚠️  Skipping {}: {}", mv.destination.display(), reason);
    }
    println!(
        "🧹 Updated history, removed {} record(s)",
        summary.records_removed
    );
    Ok(())
}
