//! hintd - power hint scheduling daemon
//!
//! Loads a node/action table from a JSON configuration document and serves
//! hint requests over a Unix domain socket. With `--verify` the daemon
//! instead writes every configured value to every node once to confirm write
//! permission, then exits.
//!
//! # Privilege
//! Runs as root for /sys access in production; unprivileged runs are allowed
//! (with a warning) so test configurations can point at ordinary files.

mod server;
mod verify;

use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use hint_core::HintManager;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global shutdown flag for clean termination
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn print_help() {
    eprintln!("hintd {} - power hint scheduling daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    hintd [OPTIONS] <CONFIG>");
    eprintln!();
    eprintln!("ARGS:");
    eprintln!("    <CONFIG>            Path to the node/action JSON document");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -s, --socket PATH   Socket path (default: auto-detected under /run)");
    eprintln!("        --verify        Write every configured value once and exit");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    HINTD_LOG           Log level (trace, debug, info, warn, error)");
}

fn default_socket_path() -> &'static str {
    if Path::new("/run").exists() {
        "/run/hintd.sock"
    } else {
        "/var/run/hintd.sock"
    }
}

fn init_logging() {
    let log_level = std::env::var("HINTD_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(tracing_subscriber::EnvFilter::new(&log_level))
        .init();
}

fn cleanup(socket_path: &str) {
    if Path::new(socket_path).exists() {
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!("Failed to remove socket: {}", e);
        }
    }
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let mut socket_path = default_socket_path().to_string();
    let mut verify_mode = false;
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-v" | "--version" => {
                println!("hintd {}", VERSION);
                return;
            }
            "--verify" => {
                verify_mode = true;
            }
            "-s" | "--socket" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --socket requires a path argument");
                    process::exit(1);
                }
                socket_path = args[i].clone();
            }
            arg if config_path.is_none() && !arg.starts_with('-') => {
                config_path = Some(arg.to_string());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    let config_path = match config_path {
        Some(path) => path,
        None => {
            print_help();
            process::exit(1);
        }
    };

    info!("hintd {} starting", VERSION);

    // SAFETY: geteuid just returns the process's effective user ID.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        warn!(
            "Not running as root (euid={}) - sysfs nodes are usually root-writable only",
            euid
        );
    }

    if verify_mode {
        match verify::run(Path::new(&config_path)) {
            Ok(true) => {
                info!("All nodes verified writable");
                return;
            }
            Ok(false) => {
                error!("One or more nodes failed verification");
                process::exit(1);
            }
            Err(e) => {
                error!("Verification aborted: {:#}", e);
                process::exit(1);
            }
        }
    }

    let manager = match HintManager::from_file(&config_path) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!("Failed to load configuration {}: {}", config_path, e);
            process::exit(1);
        }
    };
    info!("Configuration loaded, hints: {}", manager.hints().join(" "));

    if let Err(e) = ctrlc::set_handler(|| {
        info!("Received SIGINT/SIGTERM - initiating shutdown");
        SHUTDOWN.store(true, Ordering::SeqCst);
    }) {
        warn!(
            "Failed to set signal handler: {}. Shutdown via signals may not work cleanly.",
            e
        );
    }

    let result = server::run(&socket_path, manager, &SHUTDOWN);
    cleanup(&socket_path);

    if let Err(e) = result {
        error!("Server error: {:#}", e);
        process::exit(1);
    }
    info!("hintd terminated gracefully");
}
