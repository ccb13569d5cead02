//! Unix domain socket control surface.
//!
//! Line-oriented protocol, one handler thread per connection:
//!
//! ```text
//! hint <TYPE>        activate a hint with its configured timeouts
//! hint <TYPE> <ms>   activate a hint with every timeout overridden
//! end <TYPE>         cancel a hint
//! list               known hint types
//! dump               node state table
//! ```
//!
//! Commands are answered with `ok`, `err <reason>`, or the requested body.

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use hint_core::HintManager;

/// Accept-loop poll interval while waiting for connections or shutdown.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Bind the socket and serve until `shutdown` is set.
pub fn run(socket_path: &str, manager: Arc<HintManager>, shutdown: &AtomicBool) -> Result<()> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)
            .with_context(|| format!("removing stale socket {}", socket_path))?;
    }
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("binding {}", socket_path))?;
    listener
        .set_nonblocking(true)
        .context("setting listener non-blocking")?;
    info!("Listening on {}", socket_path);

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested - closing listener");
            return Ok(());
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                let manager = Arc::clone(&manager);
                let spawned = thread::Builder::new()
                    .name("hintd-client".to_owned())
                    .spawn(move || {
                        if let Err(e) = handle_client(stream, &manager) {
                            debug!("Client connection ended: {}", e);
                        }
                    });
                if let Err(e) = spawned {
                    warn!("Failed to spawn client thread: {}", e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                warn!("Accept failed: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn handle_client(stream: UnixStream, manager: &HintManager) -> Result<()> {
    let reader = BufReader::new(stream.try_clone().context("cloning client stream")?);
    let mut writer = stream;
    for line in reader.lines() {
        let line = line?;
        if let Some(reply) = dispatch(line.trim(), manager, &mut writer)? {
            writeln!(writer, "{}", reply)?;
        }
    }
    Ok(())
}

/// Execute one command line.
///
/// `dump` writes its body directly into `writer` and returns `None`; every
/// other command returns a single reply line.
fn dispatch<W: Write>(
    line: &str,
    manager: &HintManager,
    writer: &mut W,
) -> Result<Option<String>> {
    let mut parts = line.split_whitespace();
    let reply = match parts.next() {
        None => Some("err empty command".to_owned()),
        Some("hint") => match (parts.next(), parts.next()) {
            (Some(hint), None) => Some(ok_or_err(manager.do_hint(hint))),
            (Some(hint), Some(ms)) => match ms.parse::<u64>() {
                Ok(ms) => Some(ok_or_err(
                    manager.do_hint_for(hint, Duration::from_millis(ms)),
                )),
                Err(_) => Some("err invalid timeout".to_owned()),
            },
            (None, _) => Some("err usage: hint <TYPE> [ms]".to_owned()),
        },
        Some("end") => match parts.next() {
            Some(hint) => Some(ok_or_err(manager.end_hint(hint))),
            None => Some("err usage: end <TYPE>".to_owned()),
        },
        Some("list") => Some(manager.hints().join(" ")),
        Some("dump") => {
            manager.dump(writer)?;
            None
        }
        Some(other) => Some(format!("err unknown command '{}'", other)),
    };
    Ok(reply)
}

fn ok_or_err(success: bool) -> String {
    if success {
        "ok".to_owned()
    } else {
        "err rejected".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_manager(dir: &Path) -> HintManager {
        let node_path = dir.join("freq");
        fs::write(&node_path, "").unwrap();
        let json = format!(
            r#"{{
                "Nodes": [
                    {{ "Name": "freq", "Path": "{path}", "Values": ["fast", "slow"], "ResetOnInit": true }}
                ],
                "Actions": [
                    {{ "PowerHint": "LAUNCH", "Node": "freq", "Value": "fast", "Duration": 0 }}
                ]
            }}"#,
            path = node_path.display()
        );
        HintManager::from_json(&json).unwrap()
    }

    fn dispatch_line(line: &str, manager: &HintManager) -> (Option<String>, String) {
        let mut body = Vec::new();
        let reply = dispatch(line, manager, &mut body).unwrap();
        (reply, String::from_utf8(body).unwrap())
    }

    #[test]
    fn test_dispatch_hint_commands() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        assert_eq!(dispatch_line("hint LAUNCH", &manager).0.unwrap(), "ok");
        assert_eq!(dispatch_line("hint LAUNCH 250", &manager).0.unwrap(), "ok");
        assert_eq!(dispatch_line("end LAUNCH", &manager).0.unwrap(), "ok");
        assert_eq!(
            dispatch_line("hint UNKNOWN", &manager).0.unwrap(),
            "err rejected"
        );
        assert_eq!(
            dispatch_line("hint LAUNCH soon", &manager).0.unwrap(),
            "err invalid timeout"
        );
        assert_eq!(dispatch_line("list", &manager).0.unwrap(), "LAUNCH");
        assert!(dispatch_line("reboot", &manager)
            .0
            .unwrap()
            .starts_with("err unknown command"));
        assert_eq!(
            dispatch_line("", &manager).0.unwrap(),
            "err empty command"
        );
    }

    #[test]
    fn test_dispatch_dump_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        let (reply, body) = dispatch_line("dump", &manager);
        assert!(reply.is_none());
        assert!(body.contains("Begin hintd nodes"));
        assert!(body.contains("freq\t"));
    }

    #[test]
    fn test_socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(test_manager(dir.path()));
        let socket_path = dir.path().join("hintd.sock");
        let socket_str = socket_path.to_str().unwrap().to_owned();
        let shutdown = AtomicBool::new(false);

        thread::scope(|scope| {
            let server = scope.spawn(|| run(&socket_str, Arc::clone(&manager), &shutdown));

            // Wait for the listener to come up.
            let mut stream = None;
            for _ in 0..100 {
                match UnixStream::connect(&socket_path) {
                    Ok(connected) => {
                        stream = Some(connected);
                        break;
                    }
                    Err(_) => thread::sleep(Duration::from_millis(10)),
                }
            }
            let mut stream = stream.expect("server never came up");

            writeln!(stream, "hint LAUNCH").unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut reply = String::new();
            reader.read_line(&mut reply).unwrap();
            assert_eq!(reply.trim(), "ok");

            writeln!(stream, "list").unwrap();
            reply.clear();
            reader.read_line(&mut reply).unwrap();
            assert_eq!(reply.trim(), "LAUNCH");

            shutdown.store(true, Ordering::SeqCst);
            server.join().unwrap().unwrap();
        });
    }

    #[test]
    fn test_run_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(test_manager(dir.path()));
        let socket_path = dir.path().join("hintd.sock");
        fs::write(&socket_path, "stale").unwrap();
        let socket_str = socket_path.to_str().unwrap().to_owned();

        let shutdown = AtomicBool::new(true);
        // Shutdown pre-set: run binds, notices the flag, and returns.
        run(&socket_str, manager, &shutdown).unwrap();
    }
}
