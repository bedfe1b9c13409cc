use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// Single liveness deadline for an open connection.
///
/// There is at most one pending deadline. Resetting moves it, cancelling drops it.
#[derive(Debug)]
pub struct HeartbeatTimer {
    period: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl HeartbeatTimer {
    pub fn new(period: Duration) -> Self {
        HeartbeatTimer { period, deadline: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn arm(&mut self) {
        self.deadline = Some(Box::pin(sleep(self.period)));
    }

    /// Push the deadline one period out. No effect while disarmed.
    pub fn reset(&mut self) {
        if let Some(deadline) = self.deadline.as_mut() {
            deadline.as_mut().reset(Instant::now() + self.period);
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once when the deadline passes, disarming the timer. Never resolves while disarmed.
    pub async fn expired(&mut self) {
        match self.deadline.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.deadline = None;
            }
            None => pending::<()>().await,
        }
    }
}
