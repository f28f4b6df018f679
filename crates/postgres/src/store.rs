//! Session rollups as a single-statement upsert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{
    BounceEffect, Error, EventType, Result, Session, SessionCounter, SessionKey, SessionStore,
    SessionUpdate, StoreErrorCode, UserSnapshot,
};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use telemetry::health;
use tracing::{debug, warn};

/// Find-or-create-and-update in one statement. The row lock taken by
/// `ON CONFLICT` serializes concurrent updates to the same session, and every
/// right-hand side in `DO UPDATE` reads the pre-update row.
const UPSERT_SESSION: &str = r#"
INSERT INTO sessions (
    tenant_id, session_id, start_time, end_time, duration_ms,
    page_views, clicks, scrolls, forms, routes,
    first_page, last_page, last_event, last_activity, is_bounce,
    ip, user_agent, browser, os, device, country, region, city
)
VALUES (
    $1, $2, $3,
    CASE WHEN $4 THEN $3 END,
    CASE WHEN $4 THEN 0::BIGINT END,
    $5, $6, $7, $8, $9,
    $10, $10, $11, $3, $12,
    $14, $15, $16, $17, $18, $19, $20, $21
)
ON CONFLICT (tenant_id, session_id) DO UPDATE SET
    page_views = sessions.page_views + EXCLUDED.page_views,
    clicks = sessions.clicks + EXCLUDED.clicks,
    scrolls = sessions.scrolls + EXCLUDED.scrolls,
    forms = sessions.forms + EXCLUDED.forms,
    routes = sessions.routes + EXCLUDED.routes,
    last_page = COALESCE(EXCLUDED.last_page, sessions.last_page),
    last_event = EXCLUDED.last_event,
    last_activity = EXCLUDED.last_activity,
    is_bounce = CASE $13::TEXT
        WHEN 'clear' THEN FALSE
        WHEN 'repeat_pageview' THEN sessions.is_bounce AND sessions.page_views = 0
        ELSE sessions.is_bounce
    END,
    end_time = CASE WHEN $4 THEN EXCLUDED.last_activity ELSE sessions.end_time END,
    duration_ms = CASE WHEN $4
        THEN GREATEST(0, (EXTRACT(EPOCH FROM (EXCLUDED.last_activity - sessions.start_time)) * 1000)::BIGINT)
        ELSE sessions.duration_ms
    END
"#;

const SELECT_SESSION: &str = r#"
SELECT tenant_id, session_id, start_time, end_time, duration_ms,
       page_views, clicks, scrolls, forms, routes,
       first_page, last_page, last_event, last_activity, is_bounce,
       ip, user_agent, browser, os, device, country, region, city
FROM sessions
WHERE tenant_id = $1 AND session_id = $2
"#;

const PURGE_SESSIONS: &str = "DELETE FROM sessions WHERE start_time < $1";

fn bounce_tag(effect: BounceEffect) -> &'static str {
    match effect {
        BounceEffect::Keep => "keep",
        BounceEffect::Clear => "clear",
        BounceEffect::ClearIfRepeatPageview => "repeat_pageview",
    }
}

fn increment(update: &SessionUpdate, counter: SessionCounter) -> i64 {
    i64::from(update.counter == Some(counter))
}

fn write_error(e: sqlx::Error) -> Error {
    Error::storage(StoreErrorCode::SessionWrite, e.to_string())
}

#[derive(Debug, FromRow)]
struct SessionRow {
    tenant_id: String,
    session_id: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    duration_ms: Option<i64>,
    page_views: i64,
    clicks: i64,
    scrolls: i64,
    forms: i64,
    routes: i64,
    first_page: Option<String>,
    last_page: Option<String>,
    last_event: String,
    last_activity: DateTime<Utc>,
    is_bounce: bool,
    ip: Option<String>,
    user_agent: Option<String>,
    browser: String,
    os: String,
    device: String,
    country: String,
    region: Option<String>,
    city: Option<String>,
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        let last_event = EventType::parse(&row.last_event).unwrap_or_else(|| {
            warn!(last_event = %row.last_event, "Unrecognized stored event type");
            EventType::Custom
        });

        Session {
            tenant_id: row.tenant_id,
            session_id: row.session_id,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_ms: row.duration_ms,
            page_views: count(row.page_views),
            clicks: count(row.clicks),
            scrolls: count(row.scrolls),
            forms: count(row.forms),
            routes: count(row.routes),
            first_page: row.first_page,
            last_page: row.last_page,
            last_event,
            last_activity: row.last_activity,
            is_bounce: row.is_bounce,
            user: UserSnapshot {
                ip: row.ip,
                user_agent: row.user_agent,
                browser: row.browser,
                os: row.os,
                device: row.device,
                country: row.country,
                city: row.city,
                region: row.region,
            },
        }
    }
}

/// Session store over the PostgreSQL `sessions` table.
#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn observe<T>(&self, result: &std::result::Result<T, sqlx::Error>) {
        match result {
            Ok(_) => health().postgres.set_healthy(),
            Err(e) => health().postgres.set_unhealthy(e.to_string()),
        }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn apply(&self, update: &SessionUpdate) -> Result<()> {
        let user = &update.user;
        let result = sqlx::query(UPSERT_SESSION)
            .bind(&update.tenant_id)
            .bind(&update.session_id)
            .bind(update.timestamp)
            .bind(update.ends_session)
            .bind(increment(update, SessionCounter::PageViews))
            .bind(increment(update, SessionCounter::Clicks))
            .bind(increment(update, SessionCounter::Scrolls))
            .bind(increment(update, SessionCounter::Forms))
            .bind(increment(update, SessionCounter::Routes))
            .bind(update.page_url.as_deref())
            .bind(update.event_type.as_str())
            .bind(update.initial_bounce())
            .bind(bounce_tag(update.bounce))
            .bind(user.ip.as_deref())
            .bind(user.user_agent.as_deref())
            .bind(&user.browser)
            .bind(&user.os)
            .bind(&user.device)
            .bind(&user.country)
            .bind(user.region.as_deref())
            .bind(user.city.as_deref())
            .execute(&self.pool)
            .await;

        self.observe(&result);
        result.map_err(write_error)?;

        debug!(
            tenant_id = %update.tenant_id,
            session_id = %update.session_id,
            event_type = %update.event_type,
            "Session upserted"
        );
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(SELECT_SESSION)
            .bind(&key.tenant_id)
            .bind(&key.session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::internal(format!("Session query error: {}", e)))?;

        Ok(row.map(Session::from))
    }

    async fn purge_started_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(PURGE_SESSIONS)
            .bind(cutoff)
            .execute(&self.pool)
            .await;

        self.observe(&result);
        let done = result.map_err(write_error)?;
        Ok(done.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounce_tags_match_upsert_cases() {
        assert!(UPSERT_SESSION.contains(bounce_tag(BounceEffect::Clear)));
        assert!(UPSERT_SESSION.contains(bounce_tag(BounceEffect::ClearIfRepeatPageview)));
        assert_eq!(bounce_tag(BounceEffect::Keep), "keep");
    }

    #[test]
    fn test_negative_counts_read_as_zero() {
        assert_eq!(count(-3), 0);
        assert_eq!(count(7), 7);
    }
}
