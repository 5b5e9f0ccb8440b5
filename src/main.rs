//! CLI entry point for mdpress

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mdpress")]
#[command(version)]
#[command(about = "A static blog generator for Markdown posts", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    cwd: Option<PathBuf>,

    /// Configuration file (defaults to site.yml in the base directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the static site
    #[command(alias = "b")]
    Build {
        /// Directory holding the post files
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory to write the site to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render every post from scratch and skip the cache
        #[arg(long)]
        no_cache: bool,

        /// Number of worker threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// List site information
    List {
        /// Type of content to list (post, tag, featured)
        #[arg(default_value = "post")]
        r#type: String,

        /// Directory holding the post files
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Remove the output directory and the render cache
    Clean {
        /// Directory the site was written to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "mdpress=debug,info"
    } else {
        "mdpress=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };

    let mut site = mdpress::Site::load(&base_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Build {
            input,
            output,
            no_cache,
            jobs,
        } => {
            if let Some(input) = input {
                site.set_input_dir(&input);
            }
            if let Some(output) = output {
                site.set_output_dir(&output);
            }
            if no_cache {
                site.config.cache.enable = false;
            }

            if let Some(jobs) = jobs.or(site.config.jobs) {
                anyhow::ensure!(jobs > 0, "--jobs must be at least 1");
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .context("failed to start worker threads")?;
            }

            tracing::info!("Building site from {:?}", site.input_dir);
            let report = site.build()?;

            for skipped in &report.skipped {
                println!("Skipped {}", skipped);
            }
            println!(
                "Built {} posts ({} skipped) into {}",
                report.post_count,
                report.skipped_count(),
                site.output_dir.display()
            );
        }

        Commands::List { r#type, input } => {
            if let Some(input) = input {
                site.set_input_dir(&input);
            }
            site.list(&r#type)?;
        }

        Commands::Clean { output } => {
            if let Some(output) = output {
                site.set_output_dir(&output);
            }
            tracing::info!("Cleaning {:?}...", site.output_dir);
            site.clean()?;
            println!("Cleaned successfully!");
        }
    }

    Ok(())
}
