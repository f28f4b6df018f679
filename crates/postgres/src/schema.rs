//! Session table DDL.

pub const SESSIONS_TABLE: &str = "sessions";

pub fn create_sessions_table() -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    tenant_id     TEXT NOT NULL,
    session_id    TEXT NOT NULL,
    start_time    TIMESTAMPTZ NOT NULL,
    end_time      TIMESTAMPTZ,
    duration_ms   BIGINT,
    page_views    BIGINT NOT NULL DEFAULT 0,
    clicks        BIGINT NOT NULL DEFAULT 0,
    scrolls       BIGINT NOT NULL DEFAULT 0,
    forms         BIGINT NOT NULL DEFAULT 0,
    routes        BIGINT NOT NULL DEFAULT 0,
    first_page    TEXT,
    last_page     TEXT,
    last_event    TEXT NOT NULL,
    last_activity TIMESTAMPTZ NOT NULL,
    is_bounce     BOOLEAN NOT NULL DEFAULT TRUE,
    ip            TEXT,
    user_agent    TEXT,
    browser       TEXT NOT NULL,
    os            TEXT NOT NULL,
    device        TEXT NOT NULL,
    country       TEXT NOT NULL,
    region        TEXT,
    city          TEXT,
    PRIMARY KEY (tenant_id, session_id)
)
"#,
        table = SESSIONS_TABLE
    )
}

pub fn create_start_time_index() -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {table}_start_time_idx ON {table} (start_time)",
        table = SESSIONS_TABLE
    )
}

/// All DDL statements in execution order.
pub fn all_statements() -> Vec<String> {
    vec![create_sessions_table(), create_start_time_index()]
}
