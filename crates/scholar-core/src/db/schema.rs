//! Canonical SQLite schema for the paper corpus.
//!
//! - `papers` holds one row per paper plus denormalized `search_*` columns
//!   that feed the FTS5 index through triggers
//! - `authors`/`topics` are deduplicated by name and linked through
//!   `paper_authors`/`paper_topics`
//! - `users`, `user_interests` and the interaction tables (`paper_views`,
//!   `saved_papers`, `search_history`, `user_feedback`) carry explicit
//!   foreign keys and are only ever traversed through query functions
//! - `store_meta` records the schema version

/// Migration v1: core normalized tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS papers (
    paper_id TEXT PRIMARY KEY CHECK (length(trim(paper_id)) > 0),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    abstract TEXT,
    doi TEXT UNIQUE,
    url TEXT,
    pdf_url TEXT,
    publication_date TEXT,
    journal TEXT,
    volume TEXT,
    issue TEXT,
    pages TEXT,
    publisher TEXT,
    citation_count INTEGER NOT NULL DEFAULT 0 CHECK (citation_count >= 0),
    search_keywords TEXT NOT NULL DEFAULT '',
    search_authors TEXT NOT NULL DEFAULT '',
    search_topics TEXT NOT NULL DEFAULT '',
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS paper_keywords (
    paper_id TEXT NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
    keyword TEXT NOT NULL CHECK (length(trim(keyword)) > 0),
    position INTEGER NOT NULL,
    PRIMARY KEY (paper_id, keyword)
);

CREATE TABLE IF NOT EXISTS authors (
    author_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0)
);

CREATE TABLE IF NOT EXISTS paper_authors (
    paper_id TEXT NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
    author_id INTEGER NOT NULL REFERENCES authors(author_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (paper_id, author_id)
);

CREATE TABLE IF NOT EXISTS topics (
    topic_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE CHECK (length(trim(name)) > 0)
);

CREATE TABLE IF NOT EXISTS paper_topics (
    paper_id TEXT NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
    topic_id INTEGER NOT NULL REFERENCES topics(topic_id) ON DELETE CASCADE,
    PRIMARY KEY (paper_id, topic_id)
);

CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE CHECK (length(trim(username)) > 0),
    email TEXT NOT NULL UNIQUE,
    full_name TEXT,
    institution TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_interests (
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    topic_id INTEGER NOT NULL REFERENCES topics(topic_id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, topic_id)
);

CREATE TABLE IF NOT EXISTS paper_views (
    view_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    paper_id TEXT NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
    view_duration_secs INTEGER CHECK (view_duration_secs IS NULL OR view_duration_secs >= 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS saved_papers (
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    paper_id TEXT NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
    collection_name TEXT NOT NULL DEFAULT 'Default',
    notes TEXT,
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (user_id, paper_id, collection_name)
);

CREATE TABLE IF NOT EXISTS search_history (
    search_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    query TEXT NOT NULL,
    search_type TEXT NOT NULL CHECK (search_type IN ('keyword', 'vector', 'hybrid')),
    result_count INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_feedback (
    feedback_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    paper_id TEXT REFERENCES papers(paper_id) ON DELETE CASCADE,
    search_id INTEGER REFERENCES search_history(search_id) ON DELETE SET NULL,
    rating REAL NOT NULL CHECK (rating >= 1.0 AND rating <= 5.0),
    feedback_type TEXT NOT NULL CHECK (feedback_type IN ('relevance', 'quality', 'recommendation')),
    feedback_text TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_reindex_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, last_reindex_at_us)
VALUES (1, 1, 0);
";

/// Migration v2: read-path indexes and the FTS5 table/triggers.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_papers_citations
    ON papers(citation_count DESC, paper_id);

CREATE INDEX IF NOT EXISTS idx_papers_publication_date
    ON papers(publication_date DESC);

CREATE INDEX IF NOT EXISTS idx_paper_authors_author
    ON paper_authors(author_id, paper_id);

CREATE INDEX IF NOT EXISTS idx_paper_topics_topic
    ON paper_topics(topic_id, paper_id);

CREATE INDEX IF NOT EXISTS idx_paper_views_paper_created
    ON paper_views(paper_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_paper_views_user
    ON paper_views(user_id, paper_id);

CREATE INDEX IF NOT EXISTS idx_saved_papers_paper_created
    ON saved_papers(paper_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_search_history_user_created
    ON search_history(user_id, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_user_feedback_user_rating
    ON user_feedback(user_id, rating);

CREATE VIRTUAL TABLE IF NOT EXISTS papers_fts USING fts5(
    title,
    abstract,
    keywords,
    authors,
    topics,
    paper_id UNINDEXED,
    tokenize='porter unicode61',
    prefix='2 3'
);

CREATE TRIGGER IF NOT EXISTS papers_ai
AFTER INSERT ON papers
BEGIN
    INSERT INTO papers_fts(rowid, title, abstract, keywords, authors, topics, paper_id)
    VALUES (
        new.rowid,
        new.title,
        COALESCE(new.abstract, ''),
        new.search_keywords,
        new.search_authors,
        new.search_topics,
        new.paper_id
    );
END;

CREATE TRIGGER IF NOT EXISTS papers_au
AFTER UPDATE ON papers
BEGIN
    DELETE FROM papers_fts WHERE rowid = old.rowid;

    INSERT INTO papers_fts(rowid, title, abstract, keywords, authors, topics, paper_id)
    VALUES (
        new.rowid,
        new.title,
        COALESCE(new.abstract, ''),
        new.search_keywords,
        new.search_authors,
        new.search_topics,
        new.paper_id
    );
END;

CREATE TRIGGER IF NOT EXISTS papers_ad
AFTER DELETE ON papers
BEGIN
    DELETE FROM papers_fts WHERE rowid = old.rowid;
END;

DELETE FROM papers_fts;
INSERT INTO papers_fts(rowid, title, abstract, keywords, authors, topics, paper_id)
SELECT
    rowid,
    title,
    COALESCE(abstract, ''),
    search_keywords,
    search_authors,
    search_topics,
    paper_id
FROM papers;
";

/// Indexes expected by the trending, recommendation and history query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_papers_citations",
    "idx_papers_publication_date",
    "idx_paper_authors_author",
    "idx_paper_topics_topic",
    "idx_paper_views_paper_created",
    "idx_paper_views_user",
    "idx_saved_papers_paper_created",
    "idx_search_history_user_created",
    "idx_user_feedback_user_rating",
];
