// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotlink::{
    config::Settings,
    context::Context,
    fs::{Filesystem, RealFs},
    manager::{Manager, RootManager, SymlinkManager},
    path::{absolutize, default_config_root, home_dir},
    report::TracingReporter,
    store::TomlStore,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf, process::exit, sync::Arc};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dotlink [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Directory housing settings and record files.
    #[arg(long, global = true, value_name = "path")]
    pub config_root: Option<PathBuf>,

    /// Canonical location of dotfiles.
    #[arg(long, global = true, value_name = "path")]
    pub dotfiles: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let env = Environment::load(self.config_root, self.dotfiles)?;
        match self.command {
            Command::Add(opts) => run_add(env, opts),
            Command::Remove(opts) => run_remove(env, opts),
            Command::Dump(opts) => run_dump(env, opts),
            Command::Ensure => run_ensure(env),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Symlink target into place and track it.
    #[command(override_usage = "dotlink add [options] <target> [<link>]")]
    Add(AddOptions),

    /// Remove tracked symlink, leaving its target alone.
    #[command(override_usage = "dotlink remove [options] <link>")]
    Remove(RemoveOptions),

    /// Survey existing symlinks.
    #[command(override_usage = "dotlink dump [options]")]
    Dump(DumpOptions),

    /// Converge every tracked symlink.
    #[command(override_usage = "dotlink ensure [options]")]
    Ensure,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Real file to link to. Pass an empty string to derive it from link.
    #[arg(required = true, value_name = "target")]
    pub target: String,

    /// Where symlink should live. Derived from target when omitted.
    #[arg(value_name = "link")]
    pub link: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Tracked symlink to remove.
    #[arg(required = true, value_name = "link")]
    pub link: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DumpOptions {
    /// Directory to search for symlinks, repeatable.
    #[arg(short, long = "directory", value_name = "path")]
    pub directories: Vec<String>,

    /// Number of directory levels to search.
    #[arg(long, value_name = "depth")]
    pub depth: Option<usize>,

    /// Save survey as record file instead of printing it.
    #[arg(short, long)]
    pub save: bool,
}

/// Everything a command needs, assembled once.
struct Environment {
    fs: Arc<dyn Filesystem>,
    context: Context,
    settings: Settings,
}

impl Environment {
    fn load(config_root: Option<PathBuf>, dotfiles: Option<PathBuf>) -> Result<Self> {
        let fs: Arc<dyn Filesystem> = Arc::new(RealFs::new());
        let working_dir = env::current_dir()?;
        let home = home_dir()?;
        let config_root = match config_root {
            Some(path) => absolutize(&working_dir, path),
            None => default_config_root()?,
        };

        let settings_file = config_root.join("config.toml");
        let settings = match fs.read_to_string(&settings_file) {
            Ok(data) => data.parse::<Settings>()?,
            Err(err) if err.is_not_found() => {
                debug!("no settings at {:?}, use defaults", settings_file.display());
                Settings::default().expanded()?
            }
            Err(err) => return Err(err.into()),
        };

        let dotfiles = absolutize(&working_dir, dotfiles.unwrap_or(settings.dotfiles.clone()));
        let context = Context::new(home, dotfiles, config_root, working_dir);
        debug!("{context:?}");

        Ok(Self {
            fs,
            context,
            settings,
        })
    }

    fn symlink_manager(&self) -> SymlinkManager {
        SymlinkManager::with_fs(
            self.fs.clone(),
            self.context.clone(),
            Arc::new(TracingReporter),
        )
        .with_dump_settings(self.settings.dump.clone())
    }

    fn root_manager(&self) -> RootManager {
        RootManager::new(
            self.context.clone(),
            TomlStore::new(self.fs.clone()),
            Arc::new(TracingReporter),
        )
        .with_manager(self.symlink_manager())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_add(env: Environment, opts: AddOptions) -> Result<()> {
    let link = opts.link.unwrap_or_default();
    let record = env.symlink_manager().add(&opts.target, &link)?;
    println!("{record}");

    Ok(())
}

fn run_remove(env: Environment, opts: RemoveOptions) -> Result<()> {
    env.symlink_manager().remove(&opts.link)?;

    Ok(())
}

fn run_dump(mut env: Environment, opts: DumpOptions) -> Result<()> {
    if !opts.directories.is_empty() {
        env.settings.dump.directories = opts.directories;
    }

    if let Some(depth) = opts.depth {
        env.settings.dump.depth = depth;
    }

    if opts.save {
        env.root_manager().dump()?;
    } else {
        print!("{}", Manager::dump(&env.symlink_manager())?);
    }

    Ok(())
}

fn run_ensure(env: Environment) -> Result<()> {
    env.root_manager().ensure()?;

    Ok(())
}
