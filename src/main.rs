/// `main.rs` - Demo host process
///
/// Boots the script host with an in-process emulated host, posts a frame
/// tick every 16 ms and evaluates each stdin line.
use std::{path::PathBuf, process, sync::Arc, time::Duration};

use script_bridge::{EmulatedHost, HostConfig, HostState, ScriptHost};
use tokio::io::{AsyncBufReadExt, BufReader};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => HostConfig::load(&path).unwrap_or_else(|e| {
            log::error!("{e}");
            process::exit(1);
        }),
        None => HostConfig::default(),
    }
    .with_env_overrides();

    log::info!(
        "Booting '{}' from {}",
        config.entry_module,
        config.sys_dir.display()
    );

    let host = ScriptHost::new(config, Arc::new(EmulatedHost::new()));
    if let Err(e) = host.init() {
        log::error!("{e}");
        process::exit(1);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    match runtime {
        Ok(rt) => rt.block_on(pump(&host)),
        Err(e) => log::error!("Failed to build Tokio runtime: {e}"),
    }

    host.shutdown();
}

/// Feed frames and stdin lines to the host until EOF, Ctrl-C, or the script
/// thread stops on its own.
async fn pump(host: &ScriptHost) {
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = frames.tick() => {
                if host.state() == HostState::Stopped {
                    log::warn!("Script thread exited");
                    break;
                }
                host.post_frame();
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => host.evaluate(&line),
                Ok(None) => break,
                Err(e) => {
                    log::error!("stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }
}
