use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

/// Zero point of one recording session.
#[derive(Debug, Clone)]
pub struct SessionClock {
    session_id: String,
    started_at: DateTime<Utc>,
    anchor: Instant,
}

impl SessionClock {
    /// New session with a fresh id, anchored now.
    pub fn start() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: String) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            anchor: Instant::now(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Milliseconds since the session started.
    pub fn elapsed_ms(&self) -> u64 {
        self.relative_ms(Instant::now())
    }

    /// `instant - start` in ms, saturating at zero for instants before the
    /// session began.
    pub fn relative_ms(&self, instant: Instant) -> u64 {
        instant.saturating_duration_since(self.anchor).as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{self, Duration};

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_relative_to_session_start() {
        let before = Instant::now();
        time::advance(Duration::from_millis(5)).await;
        let clock = SessionClock::start();
        assert_eq!(clock.elapsed_ms(), 0);

        time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.elapsed_ms(), 250);
        assert_eq!(clock.relative_ms(before), 0);
    }

    #[test]
    fn each_session_gets_a_new_id() {
        assert_ne!(SessionClock::start().session_id(), SessionClock::start().session_id());
    }
}
