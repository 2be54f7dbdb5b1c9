use cncpendant::console::{self, Console};
use cncpendant::pendant;
use cncpendant::{init_logging, Config, Session, BUILD_DATE, BUILD_TARGET, VERSION};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!(
        "CNC Pendant {} ({}, built {})",
        VERSION,
        BUILD_TARGET,
        BUILD_DATE
    );

    let path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&path)?;

    let session = Arc::new(Session::new(config.job_config()));
    console::mirror_traffic(&session);
    let stop = Arc::new(AtomicBool::new(false));

    let bring_up = {
        let config = config.clone();
        let session = session.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            pendant::bring_up(&config, &session, &stop)
                .inspect_err(|e| tracing::error!("Device bring-up failed: {:#}", e))
        })
    };

    tokio::spawn(pendant::run_job_loop(
        session.clone(),
        config.tick_interval(),
        stop.clone(),
    ));
    if let Some(period) = config.status_poll_interval() {
        tokio::spawn(pendant::run_status_poll(session.clone(), period, stop.clone()));
    }

    let console = Console::new(session.clone(), config.device.max_command_len);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(reply) = console.handle_line(&line) {
                        println!("{}", reply);
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down");
    stop.store(true, Ordering::Release);
    if let Some(engine) = bring_up.await?? {
        if engine.join().is_err() {
            tracing::error!("Device engine thread panicked");
        }
    }
    Ok(())
}
