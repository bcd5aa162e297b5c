use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod album;
mod commands;
mod config;
mod error;
mod identity;
mod state;
mod sync;

use commands::{artifacts, backup, files, Project};
use error::Result;
use state::filter::{OrderBy, RecordFilter};

/// Personal file archive: registry, thumbnails and albums
#[derive(Parser, Debug)]
#[command(name = "wuliu", version, about)]
struct Cli {
    /// Project root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// More log output (-v info, -vv debug); RUST_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create folders, project.json and the registry in the project root
    Init {
        /// Shared by a project and its backups
        #[arg(long, default_value = config::DEFAULT_PROJECT_NAME)]
        name: String,
        /// Create a backup project
        #[arg(long)]
        backup: bool,
    },
    /// Write an edit file template listing the files in input/
    NewConfig { path: PathBuf },
    /// Register the new files in input/
    Add {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Apply the changes instead of previewing them
        #[arg(long)]
        danger: bool,
    },
    /// Apply an edit file to registered files
    Edit {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        danger: bool,
    },
    /// Rename a registered file
    Rename {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
    },
    /// Replace registered files with same-named files from input/
    Overwrite {
        #[arg(long)]
        danger: bool,
    },
    /// Move files to recyclebin/ and drop their records
    Delete {
        #[arg(long, num_args = 1.., conflicts_with = "names")]
        ids: Vec<String>,
        #[arg(long, num_args = 1..)]
        names: Vec<String>,
        #[arg(long)]
        danger: bool,
    },
    /// List records matching a filter
    List(ListArgs),
    /// Re-hash managed files, least recently checked first
    Verify {
        /// Stop after checking this many megabytes
        #[arg(long)]
        limit_mb: Option<u64>,
    },
    /// Files without records and records without files
    Orphans,
    /// Bring thumbnails in line with the image records
    Thumbs {
        /// Also delete thumbnails the snapshot does not know
        #[arg(long)]
        sweep: bool,
    },
    /// Copy a file and/or its record into output/
    Export {
        id: String,
        /// Only the file
        #[arg(long)]
        file: bool,
        /// Only the record, as JSON
        #[arg(long)]
        meta: bool,
    },
    /// Record count, total size and bookkeeping times
    Info,
    /// List backup projects, or back up into one of them
    Backup(BackupArgs),
    #[command(subcommand)]
    Album(AlbumCommand),
}

#[derive(Args, Debug)]
struct BackupArgs {
    /// Register a backup project (created with `init --backup`)
    #[arg(long, conflicts_with = "n")]
    register: Option<PathBuf>,
    /// Backup project number, as listed without arguments
    #[arg(short = 'n')]
    n: Option<usize>,
    /// Copy changes instead of previewing them
    #[arg(long, requires = "n")]
    danger: bool,
    /// Repair damaged files from the other project instead of backing up
    #[arg(long, requires = "n", conflicts_with = "danger")]
    fix: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, default_value = "")]
    label: String,
    #[arg(long, default_value = "")]
    notes: String,
    #[arg(long = "keyword")]
    keywords: Vec<String>,
    #[arg(long = "collection")]
    collections: Vec<String>,
    #[arg(long = "album")]
    albums: Vec<String>,
    /// Require every given field to match
    #[arg(long)]
    intersect: bool,
    #[arg(long, value_enum, default_value_t = OrderBy::Utime)]
    orderby: OrderBy,
    #[arg(long)]
    ascending: bool,
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

impl ListArgs {
    fn filter(&self) -> RecordFilter {
        RecordFilter {
            label: self.label.clone(),
            notes: self.notes.clone(),
            keywords: self.keywords.clone(),
            collections: self.collections.clone(),
            albums: self.albums.clone(),
            union: !self.intersect,
        }
    }
}

/// Album maintenance
#[derive(Subcommand, Debug)]
enum AlbumCommand {
    /// Write an album info template
    New { info: PathBuf },
    /// Copy album members and rewrite the album index
    Sync {
        info: PathBuf,
        #[arg(long)]
        sweep: bool,
    },
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(root: &Path, command: Command) -> Result<()> {
    match command {
        Command::Init { name, backup } => files::init(root, &name, backup),
        Command::NewConfig { path } => files::new_config(&Project::open(root)?, &path),
        Command::Add { config, danger } => {
            files::add(&mut Project::open(root)?, config.as_deref(), danger).map(drop)
        }
        Command::Edit { config, danger } => {
            files::edit(&mut Project::open(root)?, &config, danger).map(drop)
        }
        Command::Rename { id, name } => {
            files::rename(&mut Project::open(root)?, &id, &name).map(drop)
        }
        Command::Overwrite { danger } => {
            files::overwrite(&mut Project::open(root)?, danger).map(drop)
        }
        Command::Delete { ids, names, danger } => {
            files::delete(&mut Project::open(root)?, &ids, &names, danger).map(drop)
        }
        Command::List(args) => {
            let project = Project::open(root)?;
            files::list(&project, &args.filter(), args.orderby, args.ascending, args.limit);
            Ok(())
        }
        Command::Verify { limit_mb } => {
            let limit = limit_mb.map(|mb| mb.saturating_mul(1024 * 1024));
            files::verify(&mut Project::open(root)?, limit).map(drop)
        }
        Command::Orphans => files::orphans(&mut Project::open(root)?).map(drop),
        Command::Thumbs { sweep } => artifacts::thumbs(&Project::open(root)?, sweep).map(drop),
        Command::Export { id, file, meta } => {
            files::export(&Project::open(root)?, &id, file, meta).map(drop)
        }
        Command::Info => files::info(&Project::open(root)?).map(drop),
        Command::Backup(args) => run_backup(root, &args),
        Command::Album(AlbumCommand::New { info }) => artifacts::album_new(&info),
        Command::Album(AlbumCommand::Sync { info, sweep }) => {
            artifacts::album_sync(&Project::open(root)?, &info, sweep).map(drop)
        }
    }
}

fn run_backup(root: &Path, args: &BackupArgs) -> Result<()> {
    let mut project = Project::open(root)?;
    if let Some(dir) = &args.register {
        return backup::register(&mut project, dir).map(drop);
    }
    let Some(n) = args.n else {
        backup::list_backups(&project);
        return Ok(());
    };
    let mut target = backup::select(&project, n)?;
    if args.fix {
        backup::fix(&mut project, &mut target).map(drop)
    } else {
        backup::backup(&mut project, &mut target, args.danger).map(drop)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli.root, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_defaults_to_union() {
        let cli = Cli::parse_from(["wuliu", "list", "--keyword", "sea", "--album", "trip"]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        let filter = args.filter();
        assert!(filter.union);
        assert_eq!(filter.keywords, vec!["sea".to_string()]);
    }

    #[test]
    fn test_backup_flags_need_a_target() {
        assert!(Cli::try_parse_from(["wuliu", "backup", "--danger"]).is_err());
        assert!(Cli::try_parse_from(["wuliu", "backup", "-n", "1", "--danger", "--fix"]).is_err());
        let cli = Cli::parse_from(["wuliu", "backup", "-n", "2", "--fix"]);
        let Command::Backup(args) = cli.command else {
            panic!("expected backup");
        };
        assert_eq!(args.n, Some(2));
        assert!(args.fix);
    }

    #[test]
    fn test_delete_ids_and_names_conflict() {
        assert!(Cli::try_parse_from(["wuliu", "delete", "--ids", "A", "--names", "a.txt"]).is_err());
    }
}
