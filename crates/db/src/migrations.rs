/// Inline SQL migrations for the adscope database schema.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained.
///
/// Timestamps are stored as RFC 3339 TEXT in UTC. Rows imported from the
/// previous system may be offset-naive or `Z`-suffixed; readers normalize.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: users table
    r#"
CREATE TABLE IF NOT EXISTS users (
    user_id              TEXT PRIMARY KEY,
    name                 TEXT NOT NULL,
    email                TEXT NOT NULL UNIQUE,
    password_hash        TEXT NOT NULL,
    onboarding_completed INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL
);
"#,
    // Migration 2: competitors table (soft delete via is_active)
    r#"
CREATE TABLE IF NOT EXISTS competitors (
    id                      TEXT PRIMARY KEY,
    user_id                 TEXT NOT NULL REFERENCES users(user_id),
    name                    TEXT NOT NULL,
    domain                  TEXT NOT NULL,
    platform                TEXT NOT NULL DEFAULT 'all',
    industry                TEXT,
    estimated_monthly_spend REAL,
    is_active               INTEGER NOT NULL DEFAULT 1,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_competitors_user ON competitors(user_id, is_active);"#,
    // Migration 3: fetch_jobs table — the job subsystem's single source of truth.
    // created_at is admission time; started_at is stamped by the executor when
    // it claims the job, and is the clock origin for progress and reaping.
    r#"
CREATE TABLE IF NOT EXISTS fetch_jobs (
    job_id            TEXT PRIMARY KEY,
    user_id           TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending'
                      CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    platform          TEXT NOT NULL DEFAULT 'all',
    total_competitors INTEGER NOT NULL DEFAULT 0 CHECK (total_competitors >= 0),
    ads_fetched       INTEGER NOT NULL DEFAULT 0 CHECK (ads_fetched >= 0),
    started_at        TEXT,
    ended_at          TEXT,
    duration_seconds  INTEGER CHECK (duration_seconds IS NULL OR duration_seconds >= 0),
    logs              TEXT,
    error_message     TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_fetch_jobs_user_status ON fetch_jobs(user_id, status);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_fetch_jobs_created ON fetch_jobs(created_at DESC);"#,
    // Migration 4: daily_metrics table — written by the external fetch
    // capability, read by the analytics endpoints.
    r#"
CREATE TABLE IF NOT EXISTS daily_metrics (
    id                TEXT PRIMARY KEY,
    competitor_id     TEXT NOT NULL REFERENCES competitors(id),
    competitor_name   TEXT,
    platform          TEXT NOT NULL,
    creative          TEXT,
    date              TEXT NOT NULL,
    daily_spend       REAL NOT NULL DEFAULT 0,
    daily_impressions INTEGER NOT NULL DEFAULT 0,
    daily_ctr         REAL NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_daily_metrics_competitor ON daily_metrics(competitor_id, created_at DESC);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_daily_metrics_date ON daily_metrics(date DESC);"#,
];
