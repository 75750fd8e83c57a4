//! netweaved — mesh VPN daemon startup.
//!
//! This binary wires the startup sequence around the sandbox: load
//! configuration, resolve runtime paths, open everything the process will
//! ever need by name (pid file, control socket), then enter the sandbox
//! and stay there until a termination signal. Entering the sandbox is
//! fatal-on-failure: the daemon never runs unconfined after opting in.

mod config;
mod paths;

use std::fs;
use std::io;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use nw_sandbox::Sandbox;
use paths::RuntimePaths;

fn print_help() {
    println!("netweaved — mesh VPN daemon");
    println!();
    println!("Usage:");
    println!("  netweaved [options]");
    println!();
    println!("Options:");
    println!("  --config <file>   Read configuration from <file>");
    println!("  --debug, -d       Verbose diagnostics");
    println!("  --version         Print version");
    println!("  --help            Print this help");
}

fn init_logging(log_file: Option<&Path>, debug: bool) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    match log_file {
        Some(path) => {
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

fn write_pid_file(path: &Path) -> io::Result<()> {
    fs::write(path, format!("{}\n", std::process::id()))
}

fn bind_control_socket(path: &Path) -> io::Result<UnixListener> {
    // A stale socket from a previous run would make bind fail.
    if path.exists() {
        fs::remove_file(path)?;
    }
    UnixListener::bind(path)
}

fn cleanup(paths: &RuntimePaths) {
    // Covered by the REMOVE_FILE grants on the runtime directory.
    let _ = fs::remove_file(&paths.pid_file);
    let _ = fs::remove_file(&paths.control_socket);
}

fn run(config: &Config, runtime: &RuntimePaths) -> io::Result<()> {
    write_pid_file(&runtime.pid_file)?;
    let _control = bind_control_socket(&runtime.control_socket)?;

    // Every file and socket the daemon opens by name is now open; nothing
    // after this point may need a fresh privilege.
    let params = paths::sandbox_params(config, runtime);
    let mut sandbox = Sandbox::new();
    sandbox.set_level(config.sandbox.level);
    if let Err(e) = sandbox.enter(&params) {
        return Err(io::Error::other(e));
    }

    info!(level = ?sandbox.level(), "netweaved running");

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "terminating");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("netweaved {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let debug = args.iter().any(|a| a == "--debug" || a == "-d");
    let config_file = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match &config_file {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("netweaved: cannot read {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let runtime = paths::resolve(&config);

    if let Err(e) = init_logging(runtime.log_file.as_deref(), debug) {
        eprintln!("netweaved: cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    let result = run(&config, &runtime);
    cleanup(&runtime);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}
