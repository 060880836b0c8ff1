use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cmd::commands;
use cmd::common::{self, CliContext, StoreOptions};

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(name = "kvfs")]
#[command(about = "POSIX-style filesystem kept in a key-value store")]
struct Cli {
    /// SQLite store file (defaults to $KVFS_DB, then ~/.kvfs.db)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Use an in-memory store; state is discarded at exit
    #[arg(long, global = true)]
    memory: bool,

    /// Volume to operate on (defaults to $KVFS_VOLUME, then "main")
    #[arg(long, global = true, value_name = "NAME")]
    volume: Option<String>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Skip search-index maintenance for this invocation
    #[arg(long, global = true)]
    no_index: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the volume root directory
    Init,
    /// List a directory
    Ls {
        path: Option<String>,
        /// Long listing format
        #[arg(short, long)]
        long: bool,
        /// Show hidden entries
        #[arg(short, long)]
        all: bool,
    },
    /// Create directories
    Mkdir {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,
    },
    /// Remove empty directories
    Rmdir {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Create files or update their timestamps
    Touch {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print file contents
    Cat {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Replace a file's contents with the given text
    Write {
        path: String,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Append text to a file
    Append {
        path: String,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Remove files or directories
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Remove directories and their contents
        #[arg(short, long)]
        recursive: bool,
        /// Ignore failures and keep going
        #[arg(short, long)]
        force: bool,
    },
    /// Copy a file or a directory tree
    Cp {
        src: String,
        dst: String,
        /// Copy directories recursively
        #[arg(short, long)]
        recursive: bool,
    },
    /// Move or rename an entry
    Mv { src: String, dst: String },
    /// Create a symbolic link
    Ln {
        target: String,
        link: String,
        /// Make a symbolic link (the only supported kind)
        #[arg(short, long)]
        symbolic: bool,
    },
    /// Follow a symlink chain and print the final path
    Readlink { path: String },
    /// Change mode bits (octal, e.g. 0644)
    Chmod {
        mode: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Change owner (uid, uid:gid or :gid)
    Chown {
        owner: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Show entry metadata
    Stat {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Walk a subtree and list matching entries
    Find {
        path: Option<String>,
        /// Glob pattern matched against entry names
        #[arg(long, value_name = "PATTERN")]
        name: Option<String>,
        /// Entry kind: f, d or l
        #[arg(long = "type", value_name = "KIND")]
        kind: Option<String>,
    },
    /// Draw a subtree with box-drawing characters
    Tree {
        path: Option<String>,
        /// Depth limit, 0 for unlimited
        #[arg(short = 'L', long, default_value_t = 0)]
        level: usize,
    },
    /// Search file contents with a regular expression
    Grep {
        pattern: String,
        path: String,
        /// Search directories recursively
        #[arg(short, long)]
        recursive: bool,
        /// Case insensitive matching
        #[arg(short, long)]
        ignore_case: bool,
        /// Show line numbers
        #[arg(short = 'n', long)]
        line_number: bool,
    },
    /// Rank indexed files by search terms
    Search {
        query: String,
        path: Option<String>,
        /// Maximum number of hits
        #[arg(long, default_value_t = textindex::DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// Rank indexed files by embedding similarity
    Vsearch {
        query: String,
        path: Option<String>,
        /// Keep only files whose indexed text contains these terms
        #[arg(long, value_name = "TERMS")]
        filter: Option<String>,
        /// Number of results to return
        #[arg(long, default_value_t = textindex::DEFAULT_SEARCH_LIMIT)]
        top: usize,
    },
    /// Rebuild the search index from file contents
    Reindex {
        path: Option<String>,
        /// Drop the existing index first
        #[arg(long)]
        drop: bool,
    },
    /// Manage the volume's search index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Manage volumes
    Vol {
        #[command(subcommand)]
        action: Option<VolAction>,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Report whether the index exists and how many documents it holds
    Status,
    /// Create an empty index for the volume
    Create,
    /// Delete the index and every indexed record
    Drop,
}

#[derive(Subcommand)]
enum VolAction {
    /// List volumes in the store
    List,
    /// Create and initialize a volume
    Create { name: String },
    /// Show the active volume
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let ctx = common::open_context(StoreOptions {
        db: cli.db,
        memory: cli.memory,
        volume: cli.volume,
        json: cli.json,
        no_index: cli.no_index,
    })
    .await?;
    let result = run(&ctx, cli.command).await;
    ctx.shutdown().await;
    result
}

async fn run(ctx: &CliContext, command: Commands) -> Result<()> {
    match command {
        Commands::Init => commands::init_command(ctx).await,
        Commands::Ls { path, long, all } => commands::ls_command(ctx, path, long, all).await,
        Commands::Mkdir { paths, parents } => commands::mkdir_command(ctx, &paths, parents).await,
        Commands::Rmdir { paths } => commands::rmdir_command(ctx, &paths).await,
        Commands::Touch { paths } => commands::touch_command(ctx, &paths).await,
        Commands::Cat { paths } => commands::cat_command(ctx, &paths).await,
        Commands::Write { path, text } => commands::write_command(ctx, &path, &text).await,
        Commands::Append { path, text } => commands::append_command(ctx, &path, &text).await,
        Commands::Rm {
            paths,
            recursive,
            force,
        } => commands::rm_command(ctx, &paths, recursive, force).await,
        Commands::Cp {
            src,
            dst,
            recursive,
        } => commands::cp_command(ctx, &src, &dst, recursive).await,
        Commands::Mv { src, dst } => commands::mv_command(ctx, &src, &dst).await,
        Commands::Ln {
            target,
            link,
            symbolic,
        } => commands::ln_command(ctx, &target, &link, symbolic).await,
        Commands::Readlink { path } => commands::readlink_command(ctx, &path).await,
        Commands::Chmod { mode, paths } => commands::chmod_command(ctx, &mode, &paths).await,
        Commands::Chown { owner, paths } => commands::chown_command(ctx, &owner, &paths).await,
        Commands::Stat { paths } => commands::stat_command(ctx, &paths).await,
        Commands::Find { path, name, kind } => commands::find_command(ctx, path, name, kind).await,
        Commands::Tree { path, level } => commands::tree_command(ctx, path, level).await,
        Commands::Grep {
            pattern,
            path,
            recursive,
            ignore_case,
            line_number,
        } => commands::grep_command(ctx, &pattern, &path, recursive, ignore_case, line_number).await,
        Commands::Search { query, path, limit } => {
            commands::search_command(ctx, &query, path, limit).await
        }
        Commands::Vsearch {
            query,
            path,
            filter,
            top,
        } => commands::vsearch_command(ctx, &query, path, filter.as_deref(), top).await,
        Commands::Reindex { path, drop } => commands::reindex_command(ctx, path, drop).await,
        Commands::Index { action } => match action {
            IndexAction::Status => commands::index_status(ctx).await,
            IndexAction::Create => commands::index_create(ctx).await,
            IndexAction::Drop => commands::index_drop(ctx).await,
        },
        Commands::Vol { action } => match action {
            None | Some(VolAction::List) => commands::vol_list(ctx).await,
            Some(VolAction::Create { name }) => commands::vol_create(ctx, &name).await,
            Some(VolAction::Info) => commands::vol_info(ctx).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_options() -> StoreOptions {
        StoreOptions {
            memory: true,
            no_index: true,
            ..StoreOptions::default()
        }
    }

    #[test]
    fn parses_subcommand_with_flags() {
        let cli = Cli::try_parse_from(["kvfs", "--memory", "ls", "/docs", "-l", "-a"]).unwrap();
        assert!(cli.memory);
        match cli.command {
            Commands::Ls { path, long, all } => {
                assert_eq!(path.as_deref(), Some("/docs"));
                assert!(long);
                assert!(all);
            }
            _ => panic!("parsed the wrong command"),
        }
    }

    #[test]
    fn global_flags_bind_after_the_subcommand() {
        let cli = Cli::try_parse_from(["kvfs", "stat", "/", "--json", "--volume", "alt"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.volume.as_deref(), Some("alt"));
    }

    #[test]
    fn rejects_missing_operands() {
        assert!(Cli::try_parse_from(["kvfs", "mkdir"]).is_err());
        assert!(Cli::try_parse_from(["kvfs", "cp", "/only-one"]).is_err());
        assert!(Cli::try_parse_from(["kvfs", "chmod", "0644"]).is_err());
    }

    #[test]
    fn find_type_filter_parses() {
        let cli = Cli::try_parse_from(["kvfs", "find", "/", "--type", "f"]).unwrap();
        match cli.command {
            Commands::Find { kind, .. } => assert_eq!(kind.as_deref(), Some("f")),
            _ => panic!("parsed the wrong command"),
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let ctx = common::open_context(memory_options()).await.unwrap();
        commands::mkdir_command(&ctx, &["/docs".to_string()], false)
            .await
            .unwrap();
        commands::write_command(
            &ctx,
            "/docs/hello.txt",
            &["hello".to_string(), "world".to_string()],
        )
        .await
        .unwrap();
        let content = ctx.engine.read_file("/docs/hello.txt").await.unwrap();
        assert_eq!(content, b"hello world");

        commands::append_command(&ctx, "/docs/hello.txt", &["again".to_string()])
            .await
            .unwrap();
        let content = ctx.engine.read_file("/docs/hello.txt").await.unwrap();
        assert_eq!(content, b"hello worldagain");
    }

    #[tokio::test]
    async fn sqlite_store_persists_across_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("kv.db");
        let opts = || StoreOptions {
            db: Some(db.clone()),
            no_index: true,
            ..StoreOptions::default()
        };

        let ctx = common::open_context(opts()).await.unwrap();
        commands::write_command(&ctx, "/persist.txt", &["kept".to_string()])
            .await
            .unwrap();
        drop(ctx);

        let ctx = common::open_context(opts()).await.unwrap();
        let content = ctx.engine.read_file("/persist.txt").await.unwrap();
        assert_eq!(content, b"kept");
    }

    #[tokio::test]
    async fn rm_force_ignores_missing_paths() {
        let ctx = common::open_context(memory_options()).await.unwrap();
        commands::rm_command(&ctx, &["/missing".to_string()], false, true)
            .await
            .unwrap();
        let err = commands::rm_command(&ctx, &["/missing".to_string()], false, false).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn ln_requires_symbolic() {
        let ctx = common::open_context(memory_options()).await.unwrap();
        let err = commands::ln_command(&ctx, "/target", "/link", false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ln: hard links not supported; use ln -s");
    }
}
