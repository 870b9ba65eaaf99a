use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::Context as _;
use rtbench_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

fn write_config(dir: &Path, base_url: &str, threshold: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join("bench.yaml");
    let yaml = format!(
        r#"
targets:
  - name: swoole
    url: {base_url}
workloads:
  - path: /api/static
    category: basic
    weight: 3
  - path: /api/slow
    category: cpu
scenarios:
  - name: smoke
    vus: 2
    iterations: 6
    gracefulStop: 2s
thresholds:
  http_reqs: "{threshold}"
"#
    );
    std::fs::write(&path, yaml).context("write config")?;
    Ok(path)
}

async fn run_binary(args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_rtbench");
    tokio::task::spawn_blocking(move || Command::new(exe).args(&args).output())
        .await
        .context("spawn_blocking join")?
        .context("run rtbench binary")
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_rtbench"))
        .arg("run")
        .arg("./does-not-matter.yaml")
        .arg("--duration")
        .arg("10x")
        .output()
        .context("run rtbench binary")?;

    ensure_code(&out, 30)
}

#[test]
fn missing_config_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_rtbench"))
        .arg("run")
        .arg("./no-such-config.yaml")
        .output()
        .context("run rtbench binary")?;

    ensure_code(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("failed to read config"),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[tokio::test]
async fn thresholds_failed_exit_11() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let config = write_config(dir.path(), server.base_url(), "count>1000000")?;

    let out = run_binary(vec![
        "run".to_string(),
        config.display().to_string(),
        "--output".to_string(),
        "json".to_string(),
    ])
    .await?;

    server.shutdown().await;
    ensure_code(&out, 11)
}

#[tokio::test]
async fn passing_run_exit_0_and_writes_report() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let config = write_config(dir.path(), server.base_url(), "count==6")?;
    let report = dir.path().join("out/report.json");

    let out = run_binary(vec![
        "run".to_string(),
        config.display().to_string(),
        "--output".to_string(),
        "json".to_string(),
        "--seed".to_string(),
        "42".to_string(),
        "--report-out".to_string(),
        report.display().to_string(),
    ])
    .await?;

    let served = server.stats().requests_total();
    server.shutdown().await;
    ensure_code(&out, 0)?;
    anyhow::ensure!(served == 6, "server saw {served} requests");

    let stdout = String::from_utf8_lossy(&out.stdout);
    let summary = stdout
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v["kind"] == "summary")
        .context("no summary line on stdout")?;
    anyhow::ensure!(summary["scenario"] == "smoke", "summary: {summary}");
    anyhow::ensure!(
        summary["report"]["totals"]["requests"] == 6,
        "summary: {summary}"
    );

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report).context("read report")?)
            .context("parse report")?;
    anyhow::ensure!(
        written["scenarios"][0]["report"]["targets"][0]["target"] == "swoole",
        "report: {written}"
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_target_fails_preflight_exit_30() -> anyhow::Result<()> {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").context("bind")?;
        listener.local_addr().context("local addr")?
    };
    let dir = tempfile::tempdir().context("tempdir")?;
    let config = write_config(dir.path(), &format!("http://{addr}"), "count>0")?;

    let out = run_binary(vec!["run".to_string(), config.display().to_string()]).await?;

    ensure_code(&out, 30)?;
    anyhow::ensure!(
        String::from_utf8_lossy(&out.stderr).contains("preflight failed for swoole"),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[tokio::test]
async fn check_sends_no_load_exit_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir().context("tempdir")?;
    let config = write_config(dir.path(), server.base_url(), "count>0")?;

    let out = run_binary(vec!["check".to_string(), config.display().to_string()]).await?;

    let (requests, probes) = (
        server.stats().requests_total(),
        server.stats().health_checks(),
    );
    server.shutdown().await;
    ensure_code(&out, 0)?;
    anyhow::ensure!(requests == 0, "check sent {requests} load requests");
    anyhow::ensure!(probes == 1, "expected one health probe, got {probes}");
    Ok(())
}

#[test]
fn init_exit_0() -> anyhow::Result<()> {
    let dir = tempfile::tempdir().context("tempdir")?;
    let out = Command::new(env!("CARGO_BIN_EXE_rtbench"))
        .arg("init")
        .arg(dir.path())
        .output()
        .context("run rtbench binary")?;

    ensure_code(&out, 0)?;
    anyhow::ensure!(dir.path().join("rtbench.yaml").exists(), "config not written");

    let again = Command::new(env!("CARGO_BIN_EXE_rtbench"))
        .arg("init")
        .arg(dir.path())
        .output()
        .context("run rtbench binary")?;
    ensure_code(&again, 40)
}
