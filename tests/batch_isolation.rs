mod common;

use common::{Panicker, Recorder, names, new_calls, textual_pdf};
use smart_pdf_md::batch::BatchRunner;
use smart_pdf_md::config::{Config, Mode};
use smart_pdf_md::engine::Registry;
use smart_pdf_md::error::ErrorKind;
use smart_pdf_md::router::Router;
use std::path::PathBuf;

fn three_docs(dir: &std::path::Path) -> Vec<PathBuf> {
    ["a.pdf", "b-bad.pdf", "c.pdf"]
        .iter()
        .map(|n| {
            let p = dir.join(n);
            textual_pdf(&p, 1);
            p
        })
        .collect()
}

#[test]
fn failing_document_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let files = three_docs(dir.path());
    let mut cfg = Config::default();
    cfg.run.mode = Mode::Fast;

    let calls = new_calls();
    let mut fast = Recorder::new("fast", &calls);
    fast.fail_on_name = Some("bad".into());
    let mut reg = Registry::new();
    reg.register("fast", &[], Box::new(fast));

    let summary = BatchRunner::new(Router::new(&cfg, &reg)).run(&files, 5);
    assert_eq!(names(&calls).len(), 3);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.exit_code, summary.documents[1].exit_code);
    assert_eq!(summary.exit_code, 1);
    assert!(summary.documents[0].ok() && summary.documents[2].ok());
}

#[test]
fn first_non_zero_code_wins() {
    let dir = tempfile::tempdir().unwrap();
    let files = three_docs(dir.path());
    let mut cfg = Config::default();
    cfg.engine.forced = Some("nope".into());

    let reg = Registry::new();
    let summary = BatchRunner::new(Router::new(&cfg, &reg)).run(&files, 5);
    assert_eq!(summary.failures, 3);
    assert_eq!(summary.exit_code, 9);
}

#[test]
fn panicking_engine_is_unhandled_and_the_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let files = three_docs(dir.path());
    let mut cfg = Config::default();
    cfg.run.mode = Mode::Fast;

    let mut reg = Registry::new();
    reg.register("fast", &[], Box::new(Panicker));

    let summary = BatchRunner::new(Router::new(&cfg, &reg)).run(&files, 5);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.exit_code, 9);
    assert!(summary.documents.iter().all(|d| d.exit_code == 9));
    assert!(
        summary
            .documents
            .iter()
            .all(|d| d.error_kind == Some(ErrorKind::Unhandled))
    );
    assert_eq!(summary.documents[0].engine, "fast");
    assert!(
        summary.documents[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.contains("engine blew up"))
    );
}

#[test]
fn report_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let files = three_docs(dir.path());
    let mut cfg = Config::default();
    cfg.run.mode = Mode::Fast;

    let calls = new_calls();
    let mut reg = Registry::new();
    reg.register("fast", &[], Box::new(Recorder::new("fast", &calls)));

    let mut summary = BatchRunner::new(Router::new(&cfg, &reg)).run(&files, 5);
    summary.attach_hashes();
    let path = dir.path().join("reports").join("run.json");
    summary.write(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["total"], 3);
    assert_eq!(parsed["documents"][0]["engine"], "fast");
    assert_eq!(
        parsed["documents"][0]["sha256"].as_str().map(str::len),
        Some(64)
    );
}
