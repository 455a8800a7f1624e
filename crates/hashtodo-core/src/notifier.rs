use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub const DEFAULT_NOTICE_SECONDS: i64 = 3;

/// Identifies one raised notice. A timer callback holding an older token
/// cannot clear a newer notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeState {
    Idle,
    Showing {
        message: String,
        token: NoticeToken,
        expires_at: DateTime<Utc>,
    },
}

/// Single-slot status message that clears itself after a fixed delay.
#[derive(Debug, Clone)]
pub struct Notifier {
    duration: Duration,
    state: NoticeState,
    generation: u64,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_NOTICE_SECONDS))
    }
}

impl Notifier {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: NoticeState::Idle,
            generation: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn state(&self) -> &NoticeState {
        &self.state
    }

    /// Shows `message`, replacing any live notice and restarting the timer.
    #[tracing::instrument(skip(self, message, now))]
    pub fn notify(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> NoticeToken {
        self.generation = self.generation.wrapping_add(1);
        let token = NoticeToken(self.generation);
        let message = message.into();
        let expires_at = now + self.duration;

        debug!(%message, %expires_at, "raising notice");
        self.state = NoticeState::Showing {
            message,
            token,
            expires_at,
        };
        token
    }

    /// The live message at `now`, or `None` once it has expired.
    pub fn message_at(&self, now: DateTime<Utc>) -> Option<&str> {
        match &self.state {
            NoticeState::Showing {
                message,
                expires_at,
                ..
            } if now < *expires_at => Some(message.as_str()),
            _ => None,
        }
    }

    /// Drops the notice if its deadline has passed. Returns `true` when this
    /// call performed the transition back to idle.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let expired = matches!(
            &self.state,
            NoticeState::Showing { expires_at, .. } if now >= *expires_at
        );
        if expired {
            debug!("notice expired");
            self.state = NoticeState::Idle;
        }
        expired
    }

    /// Timer callback for the notice identified by `token`. A token from a
    /// superseded notice is ignored.
    pub fn expire(&mut self, token: NoticeToken) -> bool {
        let live = matches!(
            &self.state,
            NoticeState::Showing { token: current, .. } if *current == token
        );
        if live {
            self.state = NoticeState::Idle;
        } else {
            debug!(?token, "ignoring stale notice timer");
        }
        live
    }

    pub fn is_showing(&self) -> bool {
        matches!(self.state, NoticeState::Showing { .. })
    }
}
