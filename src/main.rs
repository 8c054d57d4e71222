use arch_mapper::progress::TracingProgress;
use arch_mapper::remote::RepositoryRef;
use arch_mapper::{Analyzer, Config, Reporter};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "arch-mapper")]
#[command(about = "Map a repository's components, dependencies and layers into architecture diagrams")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a local directory or a hosted repository
    Analyze {
        /// Local directory to analyze
        #[arg(short, long, conflicts_with = "repo")]
        path: Option<PathBuf>,

        /// Remote repository as owner/name[@branch]
        #[arg(short, long)]
        repo: Option<RepositoryRef>,

        /// Bearer token for the remote API
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for reports and diagrams
        #[arg(short, long, default_value = "./architecture-output")]
        output: PathBuf,

        /// Write only architecture.json
        #[arg(long)]
        json_only: bool,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the config file (defaults to ~/.arch-mapper.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

struct AnalyzeArgs {
    path: Option<PathBuf>,
    repo: Option<RepositoryRef>,
    token: Option<String>,
    config: Option<PathBuf>,
    output: PathBuf,
    json_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Analyze {
            path,
            repo,
            token,
            config,
            output,
            json_only,
        } => {
            analyze(AnalyzeArgs {
                path,
                repo,
                token,
                config,
                output,
                json_only,
            })
            .await?;
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
    }

    Ok(())
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    println!("🚀 Starting Architecture Analysis");
    println!("=================================");

    let start_time = Instant::now();

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => Config::load()?,
    };
    if args.token.is_some() {
        config.remote.token = args.token;
    }

    let analyzer = Analyzer::new(config)?;
    let analysis = match args.repo {
        Some(repo) => {
            println!("🌐 Repository: {}", repo);
            analyzer.analyze_remote(repo, &TracingProgress).await?
        }
        None => {
            let target = args.path.unwrap_or_else(|| analyzer.config().target_directory.clone());
            println!("🎯 Target directory: {}", target.display());
            analyzer.analyze_directory(&target, &TracingProgress)?
        }
    };
    println!("📤 Output directory: {}", args.output.display());

    let duration = start_time.elapsed();

    println!();
    analysis.stats.print_summary();
    println!();
    analysis.dependencies.print_summary();
    if !analysis.skipped_files.is_empty() {
        println!("\n⚠️  {} files could not be analyzed", analysis.skipped_files.len());
    }

    let reporter = Reporter::new(analyzer.config().layout.clone());
    let exported_files = if args.json_only {
        println!("\n📊 Writing architecture snapshot...");
        vec![reporter.export_json(&analysis.data, &args.output)?]
    } else {
        println!("\n📊 Generating reports and diagrams...");
        let report = reporter.generate_report(&analysis, duration.as_millis());
        reporter.export_report(&report, &args.output)?
    };

    println!(
        "\n✅ Mapped {} components and {} relationships in {:.2}s",
        analysis.data.components.len(),
        analysis.data.relationships.len(),
        duration.as_secs_f64()
    );
    println!("📁 Files written:");
    for file in exported_files {
        println!("   - {}", file.display());
    }

    Ok(())
}

fn generate_config(output_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = output_path.unwrap_or_else(|| {
        Config::default_config_path().unwrap_or_else(|_| PathBuf::from("arch-mapper.toml"))
    });

    println!("📝 Generating configuration file: {}", config_path.display());

    std::fs::write(&config_path, Config::create_documented_config())?;

    println!("✅ Configuration file created successfully!");
    println!("💡 Edit the file to customize your analysis settings.");
    println!();
    println!("🔧 Key configuration areas:");
    println!("  • Ignored directories, files and analyzed extensions");
    println!("  • Remote API endpoints, token and download concurrency");
    println!("  • Extraction worker pool");
    println!("  • Block and force-directed layout parameters");

    Ok(())
}
