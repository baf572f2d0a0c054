pub const ERROR_FAIL_LIMIT: u32 = 5;
pub const COOLDOWN: std::time::Duration = std::time::Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollStatus {
    Active,
    Suspended { until: std::time::Instant },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Suspended,
    Resumed,
}

/// Counts failed requests and suspends all polling for a cooldown once the
/// limit is reached. Time is passed in so the owner decides what "now" is.
#[derive(Debug)]
pub struct PollController {
    error_count: u32,
    status: PollStatus,
    limit: u32,
    cooldown: std::time::Duration,
}

impl PollController {
    pub fn new() -> PollController {
        return PollController::with_policy(ERROR_FAIL_LIMIT, COOLDOWN);
    }

    pub fn with_policy(limit: u32, cooldown: std::time::Duration) -> PollController {
        return PollController{
            error_count: 0,
            status: PollStatus::Active,
            limit: limit,
            cooldown: cooldown,
        };
    }

    pub fn error_count(&self) -> u32 {
        return self.error_count;
    }

    pub fn status(&self) -> PollStatus {
        return self.status;
    }

    pub fn is_suspended(&self) -> bool {
        return self.status != PollStatus::Active;
    }

    pub fn resume_deadline(&self) -> Option<std::time::Instant> {
        match self.status {
            PollStatus::Active => return None,
            PollStatus::Suspended { until } => return Some(until),
        }
    }

    pub fn record_failure(&mut self, now: std::time::Instant) -> Option<Transition> {
        if self.is_suspended() {
            // Stragglers from before the suspension don't extend it.
            return None;
        }
        self.error_count += 1;
        if self.error_count >= self.limit {
            self.status = PollStatus::Suspended { until: now + self.cooldown };
            return Some(Transition::Suspended);
        }
        return None;
    }

    /// Ends the suspension once its cooldown has run out.
    pub fn check_resume(&mut self, now: std::time::Instant) -> Option<Transition> {
        match self.status {
            PollStatus::Suspended { until } if now >= until => {
                self.error_count = 0;
                self.status = PollStatus::Active;
                return Some(Transition::Resumed);
            },
            _ => return None,
        }
    }
}
