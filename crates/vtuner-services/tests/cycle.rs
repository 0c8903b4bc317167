//! Full cycles with the production components.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vtuner_core::{Cycle, Driver, ExitStatus, Store, Supervisor, Verdict};
use vtuner_services::{Health, TunerComponents};
use vtuner_services::http::STARTUP_RUNS;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn write_config(dir: &Path, port: u16) -> std::path::PathBuf {
    let path = dir.join("vtuner.toml");
    let config = format!(
        r#"
[http]
address = "127.0.0.1"
port = {port}

[epg]
method = "blocks"
update_frequency = "1h"

[database]
path = '{db}'

[supervisor]
poll_interval = "20ms"
readiness_initial_delay = "10ms"
shutdown_timeout = "2s"
"#,
        db = dir.join("store.json").display()
    );
    std::fs::write(&path, config).unwrap();
    path
}

/// Waits until the server answers and has run its startup tasks.
async fn wait_for_health(base: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(resp) = reqwest::get(format!("{base}/api/health")).await {
                if let Ok(health) = resp.json::<Health>().await {
                    if health.startup_runs > 0 {
                        return;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("server never became healthy");
}

async fn request_restart(base: &str) {
    wait_for_health(base).await;
    reqwest::Client::new()
        .post(format!("{base}/api/restart"))
        .send()
        .await
        .unwrap();
}

#[tokio::test]
async fn http_restart_yields_restart_verdict_and_persists_store() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let config = write_config(dir.path(), port);
    let db = dir.path().join("store.json");
    let base = format!("http://127.0.0.1:{port}");

    let mut sup = Supervisor::new(TunerComponents::new(None), &config, CancellationToken::new());

    let (verdict, ()) = tokio::join!(sup.run_cycle(), request_restart(&base));
    assert_eq!(verdict.unwrap(), Verdict::Restart);

    let store = Store::open(Some(db.as_path())).unwrap();
    assert_eq!(store.get::<u64>(STARTUP_RUNS).unwrap(), Some(1));
    assert_eq!(
        store.get::<u64>("epg.blocks.refresh_count").unwrap(),
        Some(1)
    );

    // the next cycle binds the same port again and reloads the flushed store
    let (verdict, ()) = tokio::join!(sup.run_cycle(), request_restart(&base));
    assert_eq!(verdict.unwrap(), Verdict::Restart);

    let store = Store::open(Some(db.as_path())).unwrap();
    assert_eq!(store.get::<u64>(STARTUP_RUNS).unwrap(), Some(2));
    assert_eq!(sup.cycles(), 2);
}

#[tokio::test]
async fn interrupt_while_serving_exits_no_restart() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let config = write_config(dir.path(), port);
    let base = format!("http://127.0.0.1:{port}");

    let interrupt = CancellationToken::new();
    let sup = Supervisor::new(TunerComponents::new(None), &config, interrupt.clone());
    let mut driver = Driver::new(sup, interrupt.clone());

    let operator = async {
        wait_for_health(&base).await;
        interrupt.cancel();
    };
    let (status, ()) = tokio::join!(driver.run(), operator);
    assert_eq!(status, ExitStatus::NoRestart);
    assert_eq!(driver.restarts(), 0);

    // teardown released the port
    std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
}

#[tokio::test]
async fn missing_config_exits_no_restart() {
    let dir = tempfile::tempdir().unwrap();
    let interrupt = CancellationToken::new();
    let sup = Supervisor::new(
        TunerComponents::default(),
        dir.path().join("nope.toml"),
        interrupt.clone(),
    );
    let status = Driver::new(sup, interrupt).run().await;
    assert_eq!(status, ExitStatus::NoRestart);
    assert_eq!(status.code(), 2);
}
