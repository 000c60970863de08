//! User repository and interaction tracking (views, saves, searches,
//! feedback).

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::now_us;
use super::papers::{ensure_topic, paper_exists};
use crate::error::StoreError;
use crate::model::{
    FeedbackKind, NewUser, PaperView, SavedPaper, SearchHistoryEntry, Topic, User, UserFeedback,
};

/// Collection used when a save does not name one.
pub const DEFAULT_COLLECTION: &str = "Default";

/// Feedback submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub user_id: i64,
    pub paper_id: Option<String>,
    pub search_id: Option<i64>,
    pub rating: f64,
    pub kind: FeedbackKind,
    pub text: Option<String>,
}

/// Create a user and attach their interest topics.
///
/// # Errors
///
/// Returns an error if validation fails, the username or email is taken, or
/// a statement fails.
pub fn create_user(conn: &Connection, user: &NewUser) -> Result<User> {
    user.validate()?;
    let now = now_us();

    conn.execute(
        "INSERT INTO users (username, email, full_name, institution, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.username.trim(),
            user.email.trim(),
            user.full_name,
            user.institution,
            now
        ],
    )
    .with_context(|| format!("create user {}", user.username))?;
    let user_id = conn.last_insert_rowid();

    for topic in &user.interests {
        add_interest(conn, user_id, topic)?;
    }

    debug!(user_id, username = %user.username, "created user");
    require_user(conn, user_id)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT user_id, username, email, full_name, institution, created_at_us
         FROM users WHERE user_id = ?1",
        [user_id],
        user_from_row,
    )
    .optional()
    .with_context(|| format!("load user {user_id}"))
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT user_id, username, email, full_name, institution, created_at_us
         FROM users WHERE username = ?1",
        [username],
        user_from_row,
    )
    .optional()
    .with_context(|| format!("load user {username}"))
}

/// # Errors
///
/// Returns [`StoreError::UserNotFound`] if no such user exists.
pub fn require_user(conn: &Connection, user_id: i64) -> Result<User> {
    get_user(conn, user_id)?.ok_or_else(|| StoreError::UserNotFound(user_id.to_string()).into())
}

/// Resolve a numeric user ID or a username.
///
/// # Errors
///
/// Returns [`StoreError::UserNotFound`] if neither lookup matches.
pub fn resolve_user(conn: &Connection, key: &str) -> Result<User> {
    let key = key.trim();
    if let Ok(user_id) = key.parse::<i64>()
        && let Some(user) = get_user(conn, user_id)?
    {
        return Ok(user);
    }
    get_user_by_username(conn, key)?.ok_or_else(|| StoreError::UserNotFound(key.to_string()).into())
}

/// # Errors
///
/// Returns an error if the user is unknown or a statement fails.
pub fn add_interest(conn: &Connection, user_id: i64, topic: &str) -> Result<()> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Ok(());
    }
    let topic_id = ensure_topic(conn, topic)?;
    conn.execute(
        "INSERT OR IGNORE INTO user_interests (user_id, topic_id) VALUES (?1, ?2)",
        params![user_id, topic_id],
    )
    .with_context(|| format!("add interest '{topic}' for user {user_id}"))?;
    Ok(())
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn interests_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Topic>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.topic_id, t.name
             FROM user_interests ui
             INNER JOIN topics t ON t.topic_id = ui.topic_id
             WHERE ui.user_id = ?1
             ORDER BY t.name",
        )
        .context("prepare interests query")?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(Topic {
            topic_id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load interests for user {user_id}"))
}

/// # Errors
///
/// Returns an error if the user or paper is unknown, or the insert fails.
pub fn record_view(
    conn: &Connection,
    user_id: i64,
    paper_id: &str,
    view_duration_secs: Option<i64>,
) -> Result<PaperView> {
    require_user(conn, user_id)?;
    require_paper_id(conn, paper_id)?;
    if let Some(secs) = view_duration_secs
        && secs < 0
    {
        bail!("view duration must be >= 0 (got {secs})");
    }

    let now = now_us();
    conn.execute(
        "INSERT INTO paper_views (user_id, paper_id, view_duration_secs, created_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, paper_id, view_duration_secs, now],
    )
    .context("record paper view")?;

    Ok(PaperView {
        user_id,
        paper_id: paper_id.to_string(),
        view_duration_secs,
        created_at_us: now,
    })
}

/// Save a paper into a collection; saving again updates the notes.
///
/// # Errors
///
/// Returns an error if the user or paper is unknown, or the write fails.
pub fn save_paper(
    conn: &Connection,
    user_id: i64,
    paper_id: &str,
    collection: Option<&str>,
    notes: Option<&str>,
) -> Result<SavedPaper> {
    require_user(conn, user_id)?;
    require_paper_id(conn, paper_id)?;

    let collection = collection
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COLLECTION);
    let now = now_us();

    conn.execute(
        "INSERT INTO saved_papers (user_id, paper_id, collection_name, notes, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, paper_id, collection_name) DO UPDATE SET
            notes = COALESCE(excluded.notes, saved_papers.notes)",
        params![user_id, paper_id, collection, notes, now],
    )
    .context("save paper")?;

    conn.query_row(
        "SELECT user_id, paper_id, collection_name, notes, created_at_us
         FROM saved_papers
         WHERE user_id = ?1 AND paper_id = ?2 AND collection_name = ?3",
        params![user_id, paper_id, collection],
        saved_from_row,
    )
    .context("reload saved paper")
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn saved_papers_for_user(conn: &Connection, user_id: i64) -> Result<Vec<SavedPaper>> {
    let mut stmt = conn
        .prepare(
            "SELECT user_id, paper_id, collection_name, notes, created_at_us
             FROM saved_papers WHERE user_id = ?1
             ORDER BY collection_name, created_at_us DESC, paper_id",
        )
        .context("prepare saved papers query")?;
    let rows = stmt.query_map([user_id], saved_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load saved papers for user {user_id}"))
}

/// Append a search-history row and return its ID.
///
/// # Errors
///
/// Returns an error if the user is unknown or the insert fails.
pub fn record_search(
    conn: &Connection,
    user_id: i64,
    query: &str,
    search_type: &str,
    result_count: usize,
) -> Result<i64> {
    require_user(conn, user_id)?;
    conn.execute(
        "INSERT INTO search_history (user_id, query, search_type, result_count, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            query,
            search_type,
            i64::try_from(result_count).unwrap_or(i64::MAX),
            now_us()
        ],
    )
    .context("record search history")?;
    Ok(conn.last_insert_rowid())
}

/// Most recent searches first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn search_history_for_user(
    conn: &Connection,
    user_id: i64,
    limit: usize,
) -> Result<Vec<SearchHistoryEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT search_id, user_id, query, search_type, result_count, created_at_us
             FROM search_history WHERE user_id = ?1
             ORDER BY created_at_us DESC, search_id DESC
             LIMIT ?2",
        )
        .context("prepare search history query")?;
    let rows = stmt.query_map(
        params![user_id, i64::try_from(limit).unwrap_or(i64::MAX)],
        |row| {
            Ok(SearchHistoryEntry {
                search_id: row.get(0)?,
                user_id: row.get(1)?,
                query: row.get(2)?,
                search_type: row.get(3)?,
                result_count: row.get(4)?,
                created_at_us: row.get(5)?,
            })
        },
    )?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("load search history for user {user_id}"))
}

/// # Errors
///
/// Returns an error if the rating is outside `1..=5`, the referenced user or
/// paper is unknown, or the insert fails.
pub fn record_feedback(conn: &Connection, feedback: &NewFeedback) -> Result<UserFeedback> {
    if !(1.0..=5.0).contains(&feedback.rating) {
        bail!("rating must be between 1 and 5 (got {})", feedback.rating);
    }
    require_user(conn, feedback.user_id)?;
    if let Some(paper_id) = &feedback.paper_id {
        require_paper_id(conn, paper_id)?;
    }

    let now = now_us();
    conn.execute(
        "INSERT INTO user_feedback (
            user_id, paper_id, search_id, rating, feedback_type, feedback_text, created_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            feedback.user_id,
            feedback.paper_id,
            feedback.search_id,
            feedback.rating,
            feedback.kind.as_str(),
            feedback.text,
            now
        ],
    )
    .context("record feedback")?;

    Ok(UserFeedback {
        feedback_id: conn.last_insert_rowid(),
        user_id: feedback.user_id,
        paper_id: feedback.paper_id.clone(),
        search_id: feedback.search_id,
        rating: feedback.rating,
        feedback_type: feedback.kind,
        feedback_text: feedback.text.clone(),
        created_at_us: now,
    })
}

/// Papers the user viewed, saved, or rated at least `min_rating`, sorted by
/// ID.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn positive_paper_ids(conn: &Connection, user_id: i64, min_rating: f64) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT paper_id FROM paper_views WHERE user_id = ?1
             UNION
             SELECT paper_id FROM saved_papers WHERE user_id = ?1
             UNION
             SELECT paper_id FROM user_feedback
              WHERE user_id = ?1 AND paper_id IS NOT NULL AND rating >= ?2",
        )
        .context("prepare positive signal query")?;
    let rows = stmt.query_map(params![user_id, min_rating], |row| row.get::<_, String>(0))?;
    let ids = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("load positive signals for user {user_id}"))?;
    Ok(ids.into_iter().collect())
}

/// Every paper the user has touched in any way, including low ratings.
/// Recommendations never repeat these.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn engaged_paper_ids(conn: &Connection, user_id: i64) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT paper_id FROM paper_views WHERE user_id = ?1
             UNION
             SELECT paper_id FROM saved_papers WHERE user_id = ?1
             UNION
             SELECT paper_id FROM user_feedback WHERE user_id = ?1 AND paper_id IS NOT NULL",
        )
        .context("prepare engagement query")?;
    let rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("load engaged papers for user {user_id}"))
}

fn require_paper_id(conn: &Connection, paper_id: &str) -> Result<()> {
    if paper_exists(conn, paper_id)? {
        Ok(())
    } else {
        Err(StoreError::PaperNotFound(paper_id.to_string()).into())
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        institution: row.get(4)?,
        created_at_us: row.get(5)?,
    })
}

fn saved_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedPaper> {
    Ok(SavedPaper {
        user_id: row.get(0)?,
        paper_id: row.get(1)?,
        collection_name: row.get(2)?,
        notes: row.get(3)?,
        created_at_us: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, papers::upsert_paper};
    use crate::model::NewPaper;

    fn setup() -> (Connection, User) {
        let conn = open_in_memory().expect("store");
        for id in ["p-1", "p-2", "p-3"] {
            upsert_paper(
                &conn,
                &NewPaper {
                    id: Some(id.into()),
                    title: format!("Paper {id}"),
                    ..NewPaper::default()
                },
            )
            .expect("paper");
        }
        let user = create_user(
            &conn,
            &NewUser {
                username: "ada".into(),
                email: "ada@example.org".into(),
                interests: vec!["Graph Theory".into(), "graph theory".into(), "NLP".into()],
                ..NewUser::default()
            },
        )
        .expect("user");
        (conn, user)
    }

    #[test]
    fn create_user_dedups_interests() {
        let (conn, user) = setup();
        let interests = interests_for_user(&conn, user.user_id).expect("interests");
        let names: Vec<&str> = interests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Graph Theory", "NLP"]);
    }

    #[test]
    fn duplicate_username_fails() {
        let (conn, _) = setup();
        let err = create_user(
            &conn,
            &NewUser {
                username: "ada".into(),
                email: "other@example.org".into(),
                ..NewUser::default()
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn resolve_user_by_id_or_name() {
        let (conn, user) = setup();
        assert_eq!(
            resolve_user(&conn, &user.user_id.to_string())
                .expect("by id")
                .username,
            "ada"
        );
        assert_eq!(resolve_user(&conn, "ada").expect("by name"), user);
        let err = resolve_user(&conn, "bob").expect_err("unknown");
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::UserNotFound("bob".into()))
        );
    }

    #[test]
    fn interactions_require_known_paper() {
        let (conn, user) = setup();
        let err = record_view(&conn, user.user_id, "ghost", None).expect_err("unknown paper");
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::PaperNotFound(_))
        ));
    }

    #[test]
    fn save_twice_updates_notes() {
        let (conn, user) = setup();
        save_paper(&conn, user.user_id, "p-1", None, Some("first")).expect("save");
        let saved = save_paper(&conn, user.user_id, "p-1", Some(" "), Some("second")).expect("save");
        assert_eq!(saved.collection_name, DEFAULT_COLLECTION);
        assert_eq!(saved.notes.as_deref(), Some("second"));
        assert_eq!(saved_papers_for_user(&conn, user.user_id).expect("list").len(), 1);
    }

    #[test]
    fn feedback_rating_is_bounded() {
        let (conn, user) = setup();
        let mut feedback = NewFeedback {
            user_id: user.user_id,
            paper_id: Some("p-1".into()),
            search_id: None,
            rating: 6.0,
            kind: FeedbackKind::Relevance,
            text: None,
        };
        assert!(record_feedback(&conn, &feedback).is_err());
        feedback.rating = 4.5;
        let stored = record_feedback(&conn, &feedback).expect("feedback");
        assert!(stored.feedback_id > 0);
    }

    #[test]
    fn positive_and_engaged_sets() {
        let (conn, user) = setup();
        record_view(&conn, user.user_id, "p-1", Some(30)).expect("view");
        record_feedback(
            &conn,
            &NewFeedback {
                user_id: user.user_id,
                paper_id: Some("p-2".into()),
                search_id: None,
                rating: 1.0,
                kind: FeedbackKind::Quality,
                text: Some("off topic".into()),
            },
        )
        .expect("feedback");

        let positive = positive_paper_ids(&conn, user.user_id, 3.0).expect("positive");
        assert_eq!(positive, vec!["p-1".to_string()]);

        let engaged = engaged_paper_ids(&conn, user.user_id).expect("engaged");
        assert!(engaged.contains("p-1"));
        assert!(engaged.contains("p-2"));
        assert!(!engaged.contains("p-3"));
    }

    #[test]
    fn search_history_is_newest_first() {
        let (conn, user) = setup();
        let first = record_search(&conn, user.user_id, "graphs", "keyword", 3).expect("search");
        let second = record_search(&conn, user.user_id, "nlp", "hybrid", 5).expect("search");
        let history = search_history_for_user(&conn, user.user_id, 10).expect("history");
        assert_eq!(history[0].search_id, second);
        assert_eq!(history[1].search_id, first);
    }
}
