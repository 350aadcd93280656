use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::config::{self, TetherConfig};
use crate::error::{Result, TetherError};
use crate::index::RemoteIndex;
use crate::remote::RemoteLocator;
use crate::resolve::prompt::{FirstCandidatePicker, RepositoryPicker, TerminalPicker};
use crate::resolve::{Resolver, WorkspaceView};
use crate::util::output;

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Resolve remote repositories to local working copies", long_about = None)]
pub struct Cli {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a remote (and optional revision) to a local checkout path
    Resolve(ResolveArgs),
    /// Crawl for repositories and rebuild the remote index
    Rebuild(RebuildArgs),
    /// Look up the indexed local path for a remote
    Lookup(LookupArgs),
    /// List every indexed remote
    Ls,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub url: String,
    #[arg(short, long)]
    pub revision: Option<String>,
    /// Never prompt; ambiguities resolve to the first candidate
    #[arg(long)]
    pub no_input: bool,
    /// Treat these directories as open workspace roots when disambiguating
    #[arg(long = "workspace-root")]
    pub workspace_roots: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RebuildArgs {
    pub root: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    pub url: String,
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli) {
        output::error(&err.to_string());
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = config::load(cli.config)?;
    match cli.command {
        Commands::Resolve(args) => handle_resolve(args, config),
        Commands::Rebuild(args) => handle_rebuild(args, config),
        Commands::Lookup(args) => handle_lookup(args, config),
        Commands::Ls => handle_ls(config),
    }
}

fn handle_resolve(args: ResolveArgs, config: TetherConfig) -> Result<()> {
    let locator = parse_locator(&args.url, args.revision.as_deref())?;
    let index = Arc::new(RemoteIndex::load(config.index_store_path()?));
    let picker: Box<dyn RepositoryPicker> = if args.no_input {
        Box::new(FirstCandidatePicker)
    } else {
        Box::new(TerminalPicker)
    };
    let workspace = WorkspaceView {
        open_repositories: Vec::new(),
        workspace_roots: args.workspace_roots,
    };

    let resolver = Resolver::new(config, vec![index], workspace, picker);
    let path = resolver.resolve(&locator)?;
    println!("{}", path.display());
    Ok(())
}

fn handle_rebuild(args: RebuildArgs, config: TetherConfig) -> Result<()> {
    let roots = match args.root {
        Some(root) => vec![root],
        None => config.crawl_roots()?,
    };
    for root in &roots {
        output::info(&format!("crawling {}", root.display()));
    }

    let index = Arc::new(RemoteIndex::load(config.index_store_path()?));
    index
        .rebuild(roots)
        .join()
        .map_err(|_| TetherError::Other(anyhow::anyhow!("index rebuild worker panicked")))?;
    output::info(&format!("{} remotes indexed", index.entries().len()));
    Ok(())
}

fn handle_lookup(args: LookupArgs, config: TetherConfig) -> Result<()> {
    let locator = parse_locator(&args.url, None)?;
    let index = RemoteIndex::load(config.index_store_path()?);
    match index.resolve_remote(&locator.canonical) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(TetherError::Other(anyhow::anyhow!(
            "no local repository indexed for {}",
            locator.canonical
        ))),
    }
}

fn handle_ls(config: TetherConfig) -> Result<()> {
    let index = RemoteIndex::load(config.index_store_path()?);
    for (canonical, path) in index.entries() {
        println!("{canonical} {}", path.display());
    }
    Ok(())
}

fn parse_locator(url: &str, revision: Option<&str>) -> Result<RemoteLocator> {
    RemoteLocator::parse(url, revision)
        .ok_or_else(|| TetherError::Other(anyhow::anyhow!("unrecognized remote url: {url}")))
}
