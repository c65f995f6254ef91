//! Transient, dismissible user notifications.

use chrono::{DateTime, Duration, Utc};

/// A message shown to the user until it expires or is closed
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notice {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Queue of notices with a fixed auto-dismiss delay
#[derive(Clone, Debug)]
pub struct Notices {
    ttl: Duration,
    items: Vec<Notice>,
}

impl Notices {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            items: Vec::new(),
        }
    }

    /// Show a new notice. Notices already past their delay are dropped first,
    /// so the queue only ever holds what is still on screen.
    pub fn raise(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> &Notice {
        let notice = Notice {
            title: title.into(),
            message: message.into(),
            raised_at: now,
            expires_at: now + self.ttl,
        };
        tracing::info!("{}: {}", notice.title, notice.message);
        self.expire(now);
        self.items.push(notice);
        &self.items[self.items.len() - 1]
    }

    /// Close the `index`th notice of [`Notices::active`] at `now`
    pub fn dismiss(&mut self, index: usize, now: DateTime<Utc>) -> Option<Notice> {
        self.expire(now);
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Drop every notice whose delay has run out
    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.items.retain(|n| !n.is_expired(now));
    }

    /// Notices still on screen at `now`
    pub fn active(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Notice> {
        self.items.iter().filter(move |n| !n.is_expired(now))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new(Duration::seconds(5))
    }
}
