use std::time::{Duration, Instant};

/// Result of one supervisor poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No outage in progress.
    Connected,
    /// Outage in progress, nothing to do this frame.
    Waiting { remaining: Duration },
    /// Time for another connect attempt.
    Reconnect { remaining: Duration },
    /// The outage outlived its budget. Reported once.
    Expired,
}

/// Measures outages and escalates them.
///
/// The outage clock starts when the connection drops and is checked on a
/// fixed interval. While time remains the supervisor asks for reconnect
/// attempts with exponential backoff; once the budget is spent it reports
/// [`Verdict::Expired`] and stays silent until [`DisconnectionSupervisor::reset`].
#[derive(Debug, Clone)]
pub struct DisconnectionSupervisor {
    timeout: Duration,
    check_interval: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
    outage_started: Option<Instant>,
    next_check: Option<Instant>,
    next_attempt: Option<Instant>,
    backoff: Duration,
    expired: bool,
}

impl DisconnectionSupervisor {
    pub fn new(
        timeout: Duration,
        check_interval: Duration,
        initial_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            timeout,
            check_interval,
            initial_backoff,
            max_backoff,
            outage_started: None,
            next_check: None,
            next_attempt: None,
            backoff: initial_backoff,
            expired: false,
        }
    }

    /// Starts the outage clock. Repeated losses during one outage keep the first timestamp.
    pub fn connection_lost(&mut self, now: Instant) {
        if self.expired || self.outage_started.is_some() {
            return;
        }

        log::warn!("Connection lost, allowing {:?} to recover", self.timeout);
        self.outage_started = Some(now);
        self.next_check = Some(now + self.check_interval);
        self.backoff = self.initial_backoff;
        self.next_attempt = Some(now + self.backoff);
    }

    pub fn connection_restored(&mut self, now: Instant) {
        if let Some(started) = self.outage_started.take() {
            log::info!(
                "Connection restored after {:?}",
                now.saturating_duration_since(started)
            );
        }
        self.next_check = None;
        self.next_attempt = None;
        self.backoff = self.initial_backoff;
    }

    pub fn poll(&mut self, now: Instant) -> Verdict {
        let Some(started) = self.outage_started else {
            return Verdict::Connected;
        };
        let remaining = self.remaining_from(started, now);

        let Some(next_check) = self.next_check else {
            return Verdict::Waiting { remaining };
        };
        if now < next_check {
            return Verdict::Waiting { remaining };
        }
        self.next_check = Some(next_check + self.check_interval);

        if now.saturating_duration_since(started) >= self.timeout {
            log::error!("No connection for {:?}, giving up", self.timeout);
            self.expired = true;
            self.stop();
            return Verdict::Expired;
        }

        match self.next_attempt {
            Some(at) if now >= at => {
                self.backoff = (self.backoff * 2).min(self.max_backoff);
                self.next_attempt = Some(now + self.backoff);
                Verdict::Reconnect { remaining }
            }
            _ => Verdict::Waiting { remaining },
        }
    }

    /// Halts all checks without forgetting whether the budget expired.
    pub fn stop(&mut self) {
        self.outage_started = None;
        self.next_check = None;
        self.next_attempt = None;
    }

    /// Clears an expiry so a manual retry gets a fresh budget.
    pub fn reset(&mut self) {
        self.stop();
        self.expired = false;
        self.backoff = self.initial_backoff;
    }

    pub fn is_running(&self) -> bool {
        self.next_check.is_some()
    }

    pub fn in_outage(&self) -> bool {
        self.outage_started.is_some()
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.outage_started
            .map(|started| self.remaining_from(started, now))
    }

    fn remaining_from(&self, started: Instant, now: Instant) -> Duration {
        self.timeout
            .saturating_sub(now.saturating_duration_since(started))
    }
}
