//! flatrepo - publish summaries and the summary index of a flatpak-style repository

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flatrepo::ops::{update_repo, UpdateOptions};
use flatrepo::sign::{GpgSigner, Signer};
use flatrepo::summary::SummaryIndex;
use flatrepo::{list_ref_commits, Repo};

#[derive(Parser)]
#[command(name = "flatrepo")]
#[command(about = "generate summaries, the summary index and summary deltas")]
#[command(version)]
struct Cli {
    /// repository path
    #[arg(short, long, default_value = ".", env = "FLATREPO_REPO")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new repository
    Init {
        /// path to create repository at
        #[arg(default_value = ".")]
        path: PathBuf,

        /// collection id bound to the repository refs
        #[arg(long)]
        collection_id: Option<String>,

        /// repository title shown to users
        #[arg(long)]
        title: Option<String>,
    },

    /// regenerate the summary and summary index
    Update {
        /// only write the compat summary
        #[arg(long)]
        no_summary_index: bool,

        /// gpg key ids to sign with
        #[arg(long = "gpg-sign", value_name = "KEYID")]
        gpg_sign: Vec<String>,

        /// gpg home directory
        #[arg(long)]
        gpg_homedir: Option<PathBuf>,

        /// number of older summaries to keep deltas from (0 disables deltas)
        #[arg(long)]
        history_length: Option<u32>,
    },

    /// list refs and the commits they point at
    Refs,

    /// show the published summary index
    ShowIndex,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> flatrepo::Result<()> {
    match cli.command {
        Commands::Init {
            path,
            collection_id,
            title,
        } => {
            let mut config = flatrepo::Config::default();
            config.core.collection_id = collection_id;
            config.flatpak.title = title;
            Repo::init_with_config(&path, config)?;
            println!("initialized repository at {}", path.display());
        }

        Commands::Update {
            no_summary_index,
            gpg_sign,
            gpg_homedir,
            history_length,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let options = UpdateOptions {
                disable_index: no_summary_index,
                history_length,
            };

            let signer = (!gpg_sign.is_empty()).then(|| GpgSigner::new(gpg_sign, gpg_homedir));
            let report = update_repo(
                &repo,
                &options,
                signer.as_ref().map(|s| s as &dyn Signer),
            )?;

            println!("summary: {} refs", report.refs);
            for (name, digest) in &report.summaries {
                println!("  {} {}", digest, name);
            }
            if let Some(digest) = report.index_digest {
                println!("index: {}", digest);
            }
            println!(
                "removed {} summaries, {} deltas, {} signatures ({} bytes)",
                report.gc.summaries_removed,
                report.gc.deltas_removed,
                report.gc.signatures_removed,
                report.gc.bytes_freed
            );
        }

        Commands::Refs => {
            let repo = Repo::open(&cli.repo)?;
            for (name, hash) in list_ref_commits(&repo)? {
                println!("{} {}", hash, name);
            }
        }

        Commands::ShowIndex => {
            let repo = Repo::open(&cli.repo)?;
            let Some((index, digest)) = SummaryIndex::load(&repo)? else {
                println!("no summary index");
                return Ok(());
            };

            println!("index {}", digest);
            for (key, value) in &index.metadata {
                println!("  {} = {:?}", key, value);
            }
            for (name, entry) in index.subsummaries() {
                println!("{} {}", entry.digest, name);
                for old in &entry.history {
                    println!("  <- {}", old);
                }
            }
        }
    }

    Ok(())
}
