//! stgcache CLI
//!
//! Inspect and edit container files from the command line.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stgcache::path::{self, ComplexPath};
use stgcache::storage::{ContainerRegistry, ContainerStorage, EntryKind, OpenMode};
use stgcache::{Result, StorageConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// stgcache CLI
#[derive(Parser, Debug)]
#[command(name = "stgcache-cli")]
#[command(about = "Inspect and edit compound-file containers")]
#[command(version)]
struct Args {
    /// Maximum entry-name length for newly created containers
    #[arg(short = 'b', long, default_value = "31")]
    name_budget: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the entries of a storage
    Ls {
        /// Container file
        container: PathBuf,

        /// Storage inside the container (root if omitted)
        #[arg(default_value = "")]
        dir: String,
    },

    /// Print a stream, addressed as `container>embedded/path`
    Cat {
        /// Complex path of the stream
        path: String,
    },

    /// Copy a file into a container (created if missing)
    Put {
        /// Container file
        container: PathBuf,

        /// Stream path inside the container
        embedded: String,

        /// Source file
        source: PathBuf,
    },

    /// Create a storage, including missing parents
    Mkdir {
        /// Container file
        container: PathBuf,

        /// Storage path inside the container
        embedded: String,
    },

    /// Delete a stream, or a storage with --dir
    Rm {
        /// Container file
        container: PathBuf,

        /// Entry path inside the container
        embedded: String,

        /// Delete a storage and everything below it
        #[arg(long)]
        dir: bool,
    },

    /// Show the encoded form of a name
    Encode {
        /// Name to encode
        name: String,

        /// Character budget
        #[arg(short, long, default_value = "31")]
        budget: usize,
    },

    /// Split a complex path into its physical and embedded parts
    Split {
        /// Complex path
        path: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stgcache=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = StorageConfig::builder().name_budget(args.name_budget).build()?;
    let registry = ContainerRegistry::new(config);

    match args.command {
        Commands::Ls { container, dir } => {
            let storage = ContainerStorage::create_or_open(&registry, &container, OpenMode::read())?;
            let handle = storage.open_dir_path(&dir)?;
            for entry in handle.entries()? {
                let marker = match entry.kind {
                    EntryKind::Storage => "d",
                    EntryKind::Stream => "-",
                };
                if entry.name == entry.original_name {
                    println!("{} {:>10} {}", marker, entry.size, entry.name);
                } else {
                    println!("{} {:>10} {} ({})", marker, entry.size, entry.original_name, entry.name);
                }
            }
            storage.close()
        }

        Commands::Cat { path } => {
            let path = ComplexPath::parse(&path)?;
            let bytes = stgcache::source::read_bytes(&registry, &path)?;
            io::stdout().write_all(&bytes)?;
            Ok(())
        }

        Commands::Put {
            container,
            embedded,
            source,
        } => {
            let data = fs::read(&source)?;
            let storage = ContainerStorage::create_or_open(&registry, &container, OpenMode::open_or_create())?;
            let mut writer = storage.create_stream_path(&embedded)?;
            writer.write_all(&data)?;
            writer.finish()?;
            tracing::info!(bytes = data.len(), stream = %embedded, "stored");
            storage.close()
        }

        Commands::Mkdir { container, embedded } => {
            let storage = ContainerStorage::create_or_open(&registry, &container, OpenMode::open_or_create())?;
            storage.create_dir_path(&embedded)?;
            storage.close()
        }

        Commands::Rm {
            container,
            embedded,
            dir,
        } => {
            let storage = ContainerStorage::create_or_open(&registry, &container, OpenMode::read_write())?;
            if dir {
                let (parent, name) = match embedded.rsplit_once(['/', '\\']) {
                    Some((parent, name)) => (parent, name),
                    None => ("", embedded.as_str()),
                };
                storage.open_dir_path(parent)?.delete_dir(name)?;
            } else {
                storage.delete_stream_path(&embedded)?;
            }
            storage.close()
        }

        Commands::Encode { name, budget } => {
            println!("{}", path::encode(&name, budget));
            Ok(())
        }

        Commands::Split { path } => {
            let path = ComplexPath::parse(&path)?;
            println!("physical: {}", path.physical());
            if let Some(embedded) = path.embedded() {
                println!("embedded: {}", embedded);
            }
            println!("pretty:   {}", path.format_pretty());
            Ok(())
        }
    }
}
