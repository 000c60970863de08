//! E2E tests for the import → search → recommend workflow.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PAPERS: &str = r#"[
  {
    "id": "gl-01",
    "title": "Semi-supervised classification with graph convolutional networks",
    "abstract": "Convolutional networks that operate directly on graph-structured data.",
    "publication_date": "2017-02-22",
    "journal": "ICLR",
    "citation_count": 21000,
    "authors": ["Thomas Kipf", "Max Welling"],
    "keywords": ["graph convolution"],
    "topics": ["graph learning"]
  },
  {
    "id": "gl-02",
    "title": "Graph attention networks",
    "abstract": "Masked self-attention over graph neighborhoods for node classification.",
    "citation_count": 12000,
    "authors": ["Petar Velickovic"],
    "keywords": ["attention"],
    "topics": ["graph learning"]
  },
  {
    "id": "ir-01",
    "title": "The probabilistic relevance framework: BM25 and beyond",
    "abstract": "Term weighting for document retrieval under the probabilistic relevance model.",
    "citation_count": 5000,
    "authors": ["Stephen Robertson"],
    "keywords": ["bm25", "ranking"],
    "topics": ["information retrieval"]
  }
]"#;

fn scholar_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("scholar"));
    cmd.current_dir(dir);
    cmd.env("SCHOLAR_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env_remove("FORMAT");
    cmd
}

fn json_of(dir: &Path, args: &[&str]) -> Value {
    let output = scholar_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn init_with_corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    scholar_cmd(dir.path()).arg("init").assert().success();
    fs::write(dir.path().join("papers.json"), PAPERS).unwrap();

    let imported = json_of(dir.path(), &["import", "papers.json"]);
    assert_eq!(imported["inserted"], 3);
    assert_eq!(imported["embeddings"]["embedded"], 3);
    dir
}

fn hit_ids(response: &Value) -> Vec<String> {
    response["hits"]
        .as_array()
        .expect("hits array")
        .iter()
        .map(|h| h["paper_id"].as_str().expect("paper_id").to_string())
        .collect()
}

#[test]
fn init_creates_project_layout() {
    let dir = TempDir::new().unwrap();
    scholar_cmd(dir.path())
        .args(["init", "--format", "pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    assert!(dir.path().join(".scholar/config.toml").is_file());
    assert!(dir.path().join(".scholar/scholar.db").is_file());

    scholar_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn commands_before_init_report_not_initialized() {
    let dir = TempDir::new().unwrap();
    let output = scholar_cmd(dir.path())
        .args(["search", "graphs", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error on stderr");
    assert_eq!(err["error"]["error_code"], "E1001");
}

#[test]
fn hybrid_search_returns_relevant_papers_first() {
    let dir = init_with_corpus();
    let response = json_of(dir.path(), &["search", "graph attention", "-n", "2"]);

    assert_eq!(response["mode"], "hybrid");
    assert_eq!(response["degraded"], false);
    let ids = hit_ids(&response);
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.starts_with("gl-")), "got {ids:?}");
    assert_eq!(response["hits"][0]["rank"], 1);
}

#[test]
fn reimport_updates_existing_papers() {
    let dir = init_with_corpus();

    let again = json_of(dir.path(), &["import", "papers.json"]);
    assert_eq!(again["inserted"], 0);
    assert_eq!(again["updated"], 3);
    assert_eq!(again["embeddings"]["embedded"], 0);
    assert_eq!(again["embeddings"]["skipped"], 3);

    let revised = PAPERS.replace("Graph attention networks", "Sparse mixture of experts");
    fs::write(dir.path().join("revised.json"), revised).unwrap();
    let changed = json_of(dir.path(), &["import", "revised.json"]);
    assert_eq!(changed["updated"], 3);
    assert_eq!(changed["embeddings"]["embedded"], 1);

    let hits = hit_ids(&json_of(
        dir.path(),
        &["search", "mixture experts", "--mode", "keyword"],
    ));
    assert_eq!(hits, vec!["gl-02"]);

    let detail = json_of(dir.path(), &["show", "gl-02"]);
    assert_eq!(detail["title"], "Sparse mixture of experts");
}

#[test]
fn keyword_search_with_rrf_override() {
    let dir = init_with_corpus();
    let response = json_of(
        dir.path(),
        &["search", "bm25", "--mode", "keyword", "--fusion", "rrf"],
    );
    assert_eq!(hit_ids(&response), vec!["ir-01"]);
    assert_eq!(response["strategy"], "rrf");
}

#[test]
fn zero_limit_is_invalid_argument() {
    let dir = init_with_corpus();
    let output = scholar_cmd(dir.path())
        .args(["search", "graph", "-n", "0", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["error_code"], "E2003");
}

#[test]
fn show_unknown_paper_reports_not_found() {
    let dir = init_with_corpus();
    scholar_cmd(dir.path())
        .args(["show", "nope", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2001]"));
}

#[test]
fn show_includes_authors_and_topics() {
    let dir = init_with_corpus();
    let detail = json_of(dir.path(), &["show", "gl-01"]);
    assert_eq!(detail["paper_id"], "gl-01");
    assert_eq!(detail["authors"][0], "Thomas Kipf");
    assert_eq!(detail["topics"][0], "graph learning");
}

#[test]
fn similar_papers_exclude_the_source() {
    let dir = init_with_corpus();
    let response = json_of(dir.path(), &["similar", "gl-01", "-n", "5"]);
    let results = response["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["paper_id"] != "gl-01"));
}

#[test]
fn user_activity_drives_recommendations_and_trending() {
    let dir = init_with_corpus();

    let user = json_of(
        dir.path(),
        &[
            "user",
            "add",
            "ada",
            "--email",
            "ada@example.org",
            "--interest",
            "graph learning",
        ],
    );
    assert_eq!(user["username"], "ada");
    assert_eq!(user["interests"][0], "graph learning");

    json_of(dir.path(), &["view", "ada", "gl-01", "--duration", "90"]);
    let saved = json_of(dir.path(), &["save", "ada", "gl-01"]);
    assert_eq!(saved["collection_name"], "Default");

    let recs = json_of(dir.path(), &["recommend", "ada"]);
    assert_eq!(recs["fallback"], false);
    let items = recs["items"].as_array().unwrap();
    assert!(!items.is_empty());
    assert!(items.iter().all(|r| r["paper_id"] != "gl-01"));
    assert_eq!(items[0]["paper_id"], "gl-02");

    let trending = json_of(dir.path(), &["trending", "-n", "1"]);
    assert_eq!(trending["papers"][0]["paper_id"], "gl-01");
    assert_eq!(trending["papers"][0]["engagement"], 4);
}

#[test]
fn new_user_without_signal_falls_back_to_trending() {
    let dir = init_with_corpus();
    json_of(
        dir.path(),
        &["user", "add", "bob", "--email", "bob@example.org"],
    );
    let recs = json_of(dir.path(), &["recommend", "bob", "-n", "2"]);
    assert_eq!(recs["fallback"], true);
    assert_eq!(recs["items"].as_array().unwrap().len(), 2);
    assert_eq!(recs["items"][0]["reason"], "trending");
}

#[test]
fn logged_search_can_receive_feedback() {
    let dir = init_with_corpus();
    json_of(
        dir.path(),
        &["user", "add", "ada", "--email", "ada@example.org"],
    );
    let response = json_of(dir.path(), &["search", "graph", "--user", "ada"]);
    let search_id = response["search_id"].as_i64().expect("search logged");

    let feedback = json_of(
        dir.path(),
        &[
            "feedback",
            "ada",
            "--search-id",
            &search_id.to_string(),
            "--rating",
            "4",
        ],
    );
    assert_eq!(feedback["feedback_type"], "relevance");

    let profile = json_of(dir.path(), &["user", "show", "ada"]);
    assert_eq!(profile["recent_searches"][0]["query"], "graph");
}

#[test]
fn reindex_full_recomputes_embeddings() {
    let dir = init_with_corpus();
    let out = json_of(dir.path(), &["reindex", "--full"]);
    assert_eq!(out["papers"], 3);
    assert_eq!(out["fts_rows"], 3);
    assert_eq!(out["cleared"], 3);
    assert_eq!(out["embeddings"]["embedded"], 3);
}

#[test]
fn completions_emit_a_script() {
    let dir = TempDir::new().unwrap();
    scholar_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scholar"));
}
