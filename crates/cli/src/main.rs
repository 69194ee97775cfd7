use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::cluster::{self, Overrides};
use cli::resolve;
use medoid_core::config;
use medoid_core::config::AppConfig;
use medoid_core::fingerprint;
use medoid_core::manifest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Cluster {
            manifest,
            output,
            json,
            force,
            mode,
            tag_aware,
            window_gap,
            embedding_threshold,
            max_embedding_clusters,
            min_tag_cluster_size,
        } => {
            Overrides {
                mode,
                tag_aware,
                window_gap_minutes: window_gap,
                embedding_threshold,
                max_embedding_clusters,
                min_tag_cluster_size,
            }
            .apply(&mut cfg)?;
            run_cluster(cfg, manifest, output, json, force).await
        }
        Commands::Resolve { manifest, json } => run_resolve(cfg, manifest, json),
        Commands::Fingerprint { manifest } => {
            let m = manifest::load_manifest(&manifest)?;
            println!(
                "{}",
                fingerprint::run_fingerprint(&m.assets, &cfg.cluster, &cfg.dates)?
            );
            Ok(())
        }
        Commands::Runs { json } => run_list(cfg, json).await,
        Commands::Config => {
            cfg.validate()?;
            print!("{}", cfg.to_toml()?);
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "medoids")]
#[command(about = "Groups photo assets into shoots and picks one representative per group", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster a manifest and write the medoid report
    Cluster {
        /// Asset manifest (JSON)
        #[arg(long)]
        manifest: PathBuf,
        /// CSV output path; stdout if omitted
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print a JSON summary instead of CSV to stdout
        #[arg(long)]
        json: bool,
        /// Ignore any stored report with the same fingerprint
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Clustering mode: simple|hybrid
        #[arg(long)]
        mode: Option<String>,
        /// Group by dominant tag before anything else (simple mode)
        #[arg(long, default_value_t = false)]
        tag_aware: bool,
        /// Gap in minutes that starts a new time window
        #[arg(long)]
        window_gap: Option<i64>,
        /// Cosine threshold for embedding clusters (0 < t <= 1)
        #[arg(long)]
        embedding_threshold: Option<f32>,
        /// Maximum embedding clusters per window (0 = unlimited)
        #[arg(long)]
        max_embedding_clusters: Option<usize>,
        /// Minimum assets sharing a tag to form a tag cluster
        #[arg(long)]
        min_tag_cluster_size: Option<usize>,
    },
    /// Show resolved capture times and trust scores
    Resolve {
        /// Asset manifest (JSON)
        #[arg(long)]
        manifest: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the run fingerprint for a manifest under the current config
    Fingerprint {
        /// Asset manifest (JSON)
        #[arg(long)]
        manifest: PathBuf,
    },
    /// List runs recorded in the ledger
    Runs {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

async fn run_cluster(
    cfg: AppConfig,
    manifest: PathBuf,
    output: Option<PathBuf>,
    json: bool,
    force: bool,
) -> Result<()> {
    let outcome = cluster::run_cluster(&cfg, &manifest, force).await?;
    if output.is_some() || !json {
        cluster::write_report(&outcome.report, output.as_deref())?;
    }
    if json {
        let summary_json = serde_json::json!({
            "status": "ok",
            "fingerprint": outcome.fingerprint,
            "reused": outcome.reused,
            "summary": outcome.summary,
            "rows": outcome.report.rows,
        });
        println!("{}", serde_json::to_string_pretty(&summary_json)?);
    } else if let Some(path) = &output {
        eprintln!(
            "cluster: {} rows written to {}{}",
            outcome.report.rows.len(),
            path.display(),
            if outcome.reused { " (reused)" } else { "" }
        );
    }
    Ok(())
}

fn run_resolve(cfg: AppConfig, manifest: PathBuf, json: bool) -> Result<()> {
    let views = resolve::resolve_manifest(&cfg, &manifest)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    for v in views {
        println!(
            "{}\t{}\t{:.2}\t{}\t{}{}",
            v.id,
            v.resolved_datetime.as_deref().unwrap_or("-"),
            v.trust_score,
            v.path,
            v.signals_used.join("+"),
            if v.discarded.is_empty() {
                String::new()
            } else {
                format!(" (discarded: {})", v.discarded.join(","))
            }
        );
    }
    Ok(())
}

async fn run_list(cfg: AppConfig, json: bool) -> Result<()> {
    let pool = storage::connect(&cfg.database.path).await?;
    storage::migrate(&pool).await?;
    let listed = storage::runs::list_runs(&pool).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }
    for run in listed {
        let when = chrono::DateTime::from_timestamp(run.created_at, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| run.created_at.to_string());
        println!(
            "{}  {}  {:>6} assets  {:>4} windows  {:>4} clusters  {}",
            &run.fingerprint[..run.fingerprint.len().min(16)],
            when,
            run.asset_count,
            run.window_count,
            run.cluster_count,
            run.mode
        );
    }
    Ok(())
}
