use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Randomized inter-request delay drawn uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Draw one delay, scaled by `factor`.
    pub fn draw(&self, factor: f64) -> Duration {
        let base = if self.min == self.max {
            self.min
        } else {
            let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
            Duration::from_secs_f64(secs)
        };
        base.mul_f64(factor.max(0.0))
    }

    pub async fn pause(&self, factor: f64) {
        let delay = self.draw(factor);
        if delay.is_zero() {
            return;
        }
        debug!("Sleeping {:.2}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_within_bounds() {
        let pacer = Pacer::new(Duration::from_millis(1500), Duration::from_millis(3000));
        for _ in 0..100 {
            let delay = pacer.draw(1.0);
            assert!(delay >= Duration::from_millis(1500));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn factor_scales_delay() {
        let pacer = Pacer::new(Duration::from_secs(2), Duration::from_secs(2));
        assert_eq!(pacer.draw(0.5), Duration::from_secs(1));
    }

    #[test]
    fn swapped_bounds_are_reordered() {
        let pacer = Pacer::new(Duration::from_secs(3), Duration::from_secs(1));
        let delay = pacer.draw(1.0);
        assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
    }
}
