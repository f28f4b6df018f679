//! Session rollups and the per-event fold that maintains them.
//!
//! Stores apply a [`SessionUpdate`] as one atomic find-or-create-and-update.
//! The in-memory store calls [`SessionUpdate::fold`] under its lock; the
//! PostgreSQL store expresses the same rules as a single upsert statement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{Event, EventType, UserSnapshot};

/// Primary key of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub tenant_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(tenant_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// One visit, aggregated from its events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub tenant_id: String,
    pub session_id: String,
    /// Timestamp of the first aggregated event. Never changes afterwards.
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub page_views: u64,
    pub clicks: u64,
    pub scrolls: u64,
    pub forms: u64,
    pub routes: u64,
    pub first_page: Option<String>,
    pub last_page: Option<String>,
    pub last_event: EventType,
    pub last_activity: DateTime<Utc>,
    /// Starts true, may become false, never back.
    pub is_bounce: bool,
    /// Snapshot from the first event.
    pub user: UserSnapshot,
}

impl Session {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.tenant_id, &self.session_id)
    }

    pub fn counter(&self, counter: SessionCounter) -> u64 {
        match counter {
            SessionCounter::PageViews => self.page_views,
            SessionCounter::Clicks => self.clicks,
            SessionCounter::Scrolls => self.scrolls,
            SessionCounter::Forms => self.forms,
            SessionCounter::Routes => self.routes,
        }
    }

    fn counter_mut(&mut self, counter: SessionCounter) -> &mut u64 {
        match counter {
            SessionCounter::PageViews => &mut self.page_views,
            SessionCounter::Clicks => &mut self.clicks,
            SessionCounter::Scrolls => &mut self.scrolls,
            SessionCounter::Forms => &mut self.forms,
            SessionCounter::Routes => &mut self.routes,
        }
    }
}

/// Session counters, one per countable event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionCounter {
    PageViews,
    Clicks,
    Scrolls,
    Forms,
    Routes,
}

impl SessionCounter {
    pub fn for_event(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::Pageview => Some(Self::PageViews),
            EventType::Click => Some(Self::Clicks),
            EventType::Scroll => Some(Self::Scrolls),
            EventType::Form => Some(Self::Forms),
            EventType::Route => Some(Self::Routes),
            EventType::Unload | EventType::Custom => None,
        }
    }

    /// Column name in the session table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::PageViews => "page_views",
            Self::Clicks => "clicks",
            Self::Scrolls => "scrolls",
            Self::Forms => "forms",
            Self::Routes => "routes",
        }
    }
}

/// How an event affects `is_bounce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceEffect {
    Keep,
    Clear,
    /// Cleared only if the session already counted a pageview.
    ClearIfRepeatPageview,
}

impl BounceEffect {
    pub fn for_event(event_type: EventType) -> Self {
        match event_type {
            EventType::Pageview => Self::ClearIfRepeatPageview,
            EventType::Click | EventType::Form => Self::Clear,
            _ => Self::Keep,
        }
    }
}

/// The change one event makes to its session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub tenant_id: String,
    pub session_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub counter: Option<SessionCounter>,
    pub page_url: Option<String>,
    pub bounce: BounceEffect,
    /// Unload events close the session.
    pub ends_session: bool,
    pub user: UserSnapshot,
}

impl SessionUpdate {
    pub fn from_event(event: &Event) -> Self {
        let event_type = event.event_type();
        Self {
            tenant_id: event.tenant_id.clone(),
            session_id: event.session_id.clone(),
            event_type,
            timestamp: event.timestamp,
            counter: SessionCounter::for_event(event_type),
            page_url: event.data.page_url().map(String::from),
            bounce: BounceEffect::for_event(event_type),
            ends_session: event_type == EventType::Unload,
            user: event.user.clone(),
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.tenant_id, &self.session_id)
    }

    /// `is_bounce` for a session created by this event.
    pub fn initial_bounce(&self) -> bool {
        self.bounce != BounceEffect::Clear
    }

    /// Find-or-create-and-update in one step.
    pub fn fold(&self, existing: Option<Session>) -> Session {
        let mut session = existing.unwrap_or_else(|| self.create());
        self.apply_to(&mut session);
        session
    }

    /// The empty session this event would create, before its own effects.
    fn create(&self) -> Session {
        Session {
            tenant_id: self.tenant_id.clone(),
            session_id: self.session_id.clone(),
            start_time: self.timestamp,
            end_time: None,
            duration_ms: None,
            page_views: 0,
            clicks: 0,
            scrolls: 0,
            forms: 0,
            routes: 0,
            first_page: self.page_url.clone(),
            last_page: None,
            last_event: self.event_type,
            last_activity: self.timestamp,
            is_bounce: true,
            user: self.user.clone(),
        }
    }

    /// Applies this event to an existing session. Never decrements.
    pub fn apply_to(&self, session: &mut Session) {
        let prior_page_views = session.page_views;

        session.last_activity = self.timestamp;
        session.last_event = self.event_type;

        if let Some(counter) = self.counter {
            *session.counter_mut(counter) += 1;
        }
        if let Some(url) = &self.page_url {
            session.last_page = Some(url.clone());
        }

        match self.bounce {
            BounceEffect::Keep => {}
            BounceEffect::Clear => session.is_bounce = false,
            BounceEffect::ClearIfRepeatPageview => {
                session.is_bounce = session.is_bounce && prior_page_views == 0;
            }
        }

        if self.ends_session {
            session.end_time = Some(self.timestamp);
            session.duration_ms = Some(duration_ms(session.start_time, self.timestamp));
        }
    }
}

/// `max(0, end - start)` in milliseconds; clock skew yields zero.
pub fn duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}
