//! Worker pool behavior against scripted stand-in children
//!
//! Each test launches `/bin/sh` scripts that speak the worker protocol on
//! stdio, so dispatch, clean-error handling, crash recovery, recycling, and
//! shutdown cancellation are all observable without the real engine.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use docflow_worker::parser::{DocumentParser, ParserError, ParserPool, WorkerLauncher};

const READY: &str = r#"echo '{"type":"ready","worker_id":0}'"#;

fn launcher(script: &str) -> WorkerLauncher {
    WorkerLauncher::custom(
        "/bin/sh",
        vec!["-c".to_string(), script.to_string(), "worker".to_string()],
    )
}

fn scratch_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join("input.src"), dir.join("output.json"))
}

/// Worker that answers every parse with success
fn success_script() -> String {
    format!(
        r#"{READY}
while IFS= read -r line; do
  case "$line" in
    *shutdown*) exit 0 ;;
    *) echo '{{"type":"log","level":"info","message":"parsing"}}'
       echo '{{"type":"result","status":"success"}}' ;;
  esac
done"#
    )
}

/// Worker that fails the first parse cleanly, then succeeds
fn error_once_script(marker: &Path) -> String {
    format!(
        r#"{READY}
while IFS= read -r line; do
  case "$line" in
    *shutdown*) exit 0 ;;
    *) if [ ! -f "{marker}" ]; then
         touch "{marker}"
         echo '{{"type":"result","status":"error","error":"corrupt document"}}'
       else
         echo '{{"type":"result","status":"success"}}'
       fi ;;
  esac
done"#,
        marker = marker.display()
    )
}

/// Worker that dies mid-parse on its first life, then behaves
fn crash_once_script(marker: &Path) -> String {
    format!(
        r#"{READY}
while IFS= read -r line; do
  case "$line" in
    *shutdown*) exit 0 ;;
    *) if [ ! -f "{marker}" ]; then
         touch "{marker}"
         exit 1
       else
         echo '{{"type":"result","status":"success"}}'
       fi ;;
  esac
done"#,
        marker = marker.display()
    )
}

/// Worker that records each spawn, then answers successes
fn counting_script(spawn_log: &Path) -> String {
    format!(
        r#"echo spawned >> "{log}"
{READY}
while IFS= read -r line; do
  case "$line" in
    *shutdown*) exit 0 ;;
    *) echo '{{"type":"result","status":"success"}}' ;;
  esac
done"#,
        log = spawn_log.display()
    )
}

/// Worker that sleeps through each parse before succeeding
fn slow_script() -> String {
    format!(
        r#"{READY}
while IFS= read -r line; do
  case "$line" in
    *shutdown*) exit 0 ;;
    *) sleep 1
       echo '{{"type":"result","status":"success"}}' ;;
  esac
done"#
    )
}

#[tokio::test]
async fn parse_succeeds_and_worker_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = scratch_paths(dir.path());

    let pool = ParserPool::start(launcher(&success_script()), 1, 20)
        .await
        .unwrap();

    for _ in 0..3 {
        pool.parse(&input, &output).await.unwrap();
    }

    pool.shutdown().await;
}

#[tokio::test]
async fn clean_error_does_not_recycle_worker() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = scratch_paths(dir.path());
    let marker = dir.path().join("errored");

    let pool = ParserPool::start(launcher(&error_once_script(&marker)), 1, 20)
        .await
        .unwrap();

    let err = pool.parse(&input, &output).await.unwrap_err();
    assert!(matches!(err, ParserError::Task(_)));
    assert!(err.to_string().contains("corrupt document"));

    // Same process serves the next call: the marker file persists, so a
    // recycled (fresh) worker would error again while a reused one succeeds
    pool.parse(&input, &output).await.unwrap();

    pool.shutdown().await;
}

#[tokio::test]
async fn crashed_worker_is_replaced_before_next_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = scratch_paths(dir.path());
    let marker = dir.path().join("crashed");

    let pool = ParserPool::start(launcher(&crash_once_script(&marker)), 1, 20)
        .await
        .unwrap();

    let err = pool.parse(&input, &output).await.unwrap_err();
    assert!(matches!(err, ParserError::Worker(_)), "got: {:?}", err);

    // The replacement spawned during release handles the next call
    tokio::time::timeout(Duration::from_secs(15), pool.parse(&input, &output))
        .await
        .expect("pool had no live worker to dispatch to")
        .unwrap();

    pool.shutdown().await;
}

#[tokio::test]
async fn worker_recycled_after_restart_quota() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = scratch_paths(dir.path());
    let spawn_log = dir.path().join("spawns");

    let pool = ParserPool::start(launcher(&counting_script(&spawn_log)), 1, 2)
        .await
        .unwrap();

    // Quota 2: tasks 1-2 run on the first process, its release recycles it,
    // task 3 lands on the replacement
    for _ in 0..3 {
        pool.parse(&input, &output).await.unwrap();
    }

    // Give the log write a moment; the third parse already proved the
    // replacement is live
    let spawns = std::fs::read_to_string(&spawn_log).unwrap();
    assert_eq!(spawns.lines().count(), 2, "spawn log: {:?}", spawns);

    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_cancels_queued_parse() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = scratch_paths(dir.path());

    let pool = ParserPool::start(launcher(&slow_script()), 1, 20)
        .await
        .unwrap();

    // Occupy the only worker
    let busy = {
        let pool = pool.clone();
        let (input, output) = (input.clone(), output.clone());
        tokio::spawn(async move { pool.parse(&input, &output).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Queue a second call behind it, then shut the pool down
    let queued = {
        let pool = pool.clone();
        let (input, output) = (input.clone(), output.clone());
        tokio::spawn(async move { pool.parse(&input, &output).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    pool.shutdown().await;

    let queued_result = tokio::time::timeout(Duration::from_secs(5), queued)
        .await
        .expect("queued call did not resolve")
        .unwrap();
    assert!(matches!(queued_result, Err(ParserError::Cancelled)));

    // The in-flight parse is allowed to finish
    let busy_result = tokio::time::timeout(Duration::from_secs(5), busy)
        .await
        .expect("busy call did not resolve")
        .unwrap();
    assert!(busy_result.is_ok());
}

#[tokio::test]
async fn parse_after_shutdown_is_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let (input, output) = scratch_paths(dir.path());

    let pool = ParserPool::start(launcher(&success_script()), 1, 20)
        .await
        .unwrap();
    pool.shutdown().await;

    let err = pool.parse(&input, &output).await.unwrap_err();
    assert!(matches!(err, ParserError::Cancelled));
}
