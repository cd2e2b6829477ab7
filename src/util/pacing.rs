use std::time::Duration;

/// Fixed pause between remote mutations, to stay under the platform's rate limits.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    delay: Duration,
}

impl Pacing {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
