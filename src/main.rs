//! Command line entry point: parses the verb, sets up logging and fans out
//! to the lifecycle commands. The hidden `__child_init` verb is the re-exec
//! target the bootstrap parent spawns into the new namespaces; it is not
//! part of the public surface.

use std::path::PathBuf;
use std::process::exit;

use anyhow::Result;
use clap::{Parser, Subcommand};

use skiff::commands::{Create, Delete, List, Start};
use skiff::logger;
use skiff::process;
use skiff::state::StateStore;

/// Default state location, relative to the caller's working directory so an
/// unprivileged user needs no special paths.
const DEFAULT_ROOT: &str = "./run/skiff";

#[derive(Parser, Debug)]
#[command(name = "skiff", version, about = "A rootless OCI container runtime")]
struct Opts {
    /// Root directory to store container state
    #[arg(short, long, default_value = DEFAULT_ROOT)]
    root: PathBuf,
    /// Write log output to this file instead of stderr
    #[arg(short, long)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    subcmd: SubCommand,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Create a container record from an OCI bundle
    Create(Create),
    /// Start a created container and wait for it to exit
    Start(Start),
    /// Terminate a container and remove its record
    Delete(Delete),
    /// List containers
    #[command(alias = "ls")]
    List(List),
    #[command(name = "__child_init", hide = true)]
    ChildInit(ChildInit),
}

#[derive(Parser, Debug)]
struct ChildInit {
    container_id: String,
}

fn main() {
    let opts = Opts::parse();

    if let Err(e) = logger::init(opts.log.clone()) {
        eprintln!("skiff: log init failed: {}", e);
    }

    match run(&opts) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("skiff: {:#}", e);
            exit(1);
        }
    }
}

fn run(opts: &Opts) -> Result<i32> {
    match &opts.subcmd {
        SubCommand::Create(create) => {
            create.exec(&opts.root)?;
            Ok(0)
        }
        // start's exit code is the container's own exit code, so callers
        // observe the entrypoint's status directly.
        SubCommand::Start(start) => Ok(start.exec(&opts.root)?),
        SubCommand::Delete(delete) => {
            delete.exec(&opts.root)?;
            Ok(0)
        }
        SubCommand::List(list) => {
            list.exec(&opts.root)?;
            Ok(0)
        }
        SubCommand::ChildInit(child) => {
            let store = StateStore::new(&opts.root);
            // Only reachable on failure; a successful init replaces this
            // process image with the container entrypoint.
            match process::child_init(&store, &child.container_id) {
                Ok(()) => Ok(0),
                Err(e) => {
                    eprintln!("skiff: {}", e);
                    Ok(e.child_exit_code())
                }
            }
        }
    }
}
