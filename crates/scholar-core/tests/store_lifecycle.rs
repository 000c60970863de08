//! On-disk store behaviour: persistence, atomic imports, FTS sync.

use scholar_core::db::fts::{fts_in_sync, fts_row_count, search_text};
use scholar_core::db::papers::{count_papers, delete_paper, import_papers, require_paper};
use scholar_core::db::{open_store, try_open_store};
use scholar_core::error::{ErrorCode, StoreError};
use scholar_core::model::NewPaper;
use tempfile::TempDir;

fn paper(id: &str, title: &str, doi: Option<&str>) -> NewPaper {
    NewPaper {
        id: Some(id.to_string()),
        title: title.to_string(),
        doi: doi.map(str::to_string),
        topics: vec!["information retrieval".to_string()],
        ..NewPaper::default()
    }
}

#[test]
fn missing_store_is_not_created_by_try_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".scholar/scholar.db");
    assert!(try_open_store(&path).unwrap().is_none());
    assert!(!path.exists());
}

#[test]
fn papers_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".scholar/scholar.db");

    {
        let mut conn = open_store(&path).unwrap();
        let stats = import_papers(
            &mut conn,
            &[
                paper("p1", "Learning to rank with gradient boosting", None),
                paper("p2", "Dense passage retrieval", Some("10.1/dpr")),
            ],
        )
        .unwrap();
        assert_eq!(stats.inserted, 2);
    }

    let conn = try_open_store(&path).unwrap().expect("store exists");
    assert_eq!(count_papers(&conn).unwrap(), 2);
    assert_eq!(require_paper(&conn, "p2").unwrap().doi.as_deref(), Some("10.1/dpr"));

    let hits = search_text(&conn, "passage retrieval", 10).unwrap();
    assert_eq!(hits[0].paper_id, "p2");
}

#[test]
fn invalid_record_rolls_back_the_whole_import() {
    let dir = TempDir::new().unwrap();
    let mut conn = open_store(&dir.path().join("scholar.db")).unwrap();

    let err = import_papers(
        &mut conn,
        &[paper("p1", "Fine", None), paper("p2", "   ", None)],
    )
    .unwrap_err();

    match err.downcast_ref::<StoreError>() {
        Some(StoreError::InvalidImportRecord { index, .. }) => assert_eq!(*index, 1),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(count_papers(&conn).unwrap(), 0);
}

#[test]
fn reimport_updates_and_rejects_stolen_doi() {
    let dir = TempDir::new().unwrap();
    let mut conn = open_store(&dir.path().join("scholar.db")).unwrap();
    import_papers(&mut conn, &[paper("p1", "Original", Some("10.1/x"))]).unwrap();

    let stats = import_papers(&mut conn, &[paper("p1", "Revised", Some("10.1/x"))]).unwrap();
    assert_eq!((stats.inserted, stats.updated), (0, 1));
    assert_eq!(require_paper(&conn, "p1").unwrap().title, "Revised");

    let err = import_papers(&mut conn, &[paper("p2", "Copycat", Some("10.1/x"))]).unwrap_err();
    let store_err = err.downcast_ref::<StoreError>().expect("typed error");
    assert_eq!(store_err.code(), ErrorCode::DuplicateDoi);
    assert_eq!(count_papers(&conn).unwrap(), 1);
}

#[test]
fn deleting_a_paper_keeps_fts_in_sync() {
    let dir = TempDir::new().unwrap();
    let mut conn = open_store(&dir.path().join("scholar.db")).unwrap();
    import_papers(
        &mut conn,
        &[paper("p1", "Query expansion", None), paper("p2", "Query likelihood", None)],
    )
    .unwrap();
    assert_eq!(fts_row_count(&conn).unwrap(), 2);

    assert!(delete_paper(&conn, "p1").unwrap());
    assert!(!delete_paper(&conn, "p1").unwrap());

    assert_eq!(fts_row_count(&conn).unwrap(), 1);
    assert!(fts_in_sync(&conn).unwrap());
    let ids: Vec<_> = search_text(&conn, "query", 10)
        .unwrap()
        .into_iter()
        .map(|h| h.paper_id)
        .collect();
    assert_eq!(ids, vec!["p2"]);
}
