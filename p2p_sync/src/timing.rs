use std::{
    fmt::{self, Display},
    time::Duration,
};

/// Time spent in each synchronization phase during one step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepTiming {
    pub recv_param: Option<Duration>,
    pub send_param: Option<Duration>,
    pub add_grad: Option<Duration>,
    pub send_grad: Option<Duration>,
}

impl Display for StepTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phases = [
            ("recv_param", self.recv_param),
            ("send_param", self.send_param),
            ("add_grad", self.add_grad),
            ("send_grad", self.send_grad),
        ];

        for (name, elapsed) in phases {
            if let Some(elapsed) = elapsed {
                write!(f, " {name}: {:.3}", elapsed.as_secs_f64() * 1e3)?;
            }
        }

        Ok(())
    }
}

/// Totals across every step of a worker.
#[derive(Debug, Default, Clone)]
pub struct SyncMetrics {
    pub steps: u64,
    pub recv_param: Duration,
    pub send_param: Duration,
    pub add_grad: Duration,
    pub send_grad: Duration,
}

impl SyncMetrics {
    #[inline]
    pub fn record(&mut self, timing: &StepTiming) {
        self.steps += 1;
        self.recv_param += timing.recv_param.unwrap_or_default();
        self.send_param += timing.send_param.unwrap_or_default();
        self.add_grad += timing.add_grad.unwrap_or_default();
        self.send_grad += timing.send_grad.unwrap_or_default();
    }

    /// Returns the total time spent synchronizing.
    pub fn total(&self) -> Duration {
        self.recv_param + self.send_param + self.add_grad + self.send_grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_skips_missing_phases() {
        let timing = StepTiming {
            recv_param: Some(Duration::from_micros(1500)),
            send_grad: Some(Duration::from_millis(2)),
            ..Default::default()
        };

        assert_eq!(timing.to_string(), " recv_param: 1.500 send_grad: 2.000");
        assert_eq!(StepTiming::default().to_string(), "");
    }

    #[test]
    fn metrics_accumulate() {
        let timing = StepTiming {
            add_grad: Some(Duration::from_millis(3)),
            ..Default::default()
        };

        let mut metrics = SyncMetrics::default();
        metrics.record(&timing);
        metrics.record(&timing);

        assert_eq!(metrics.steps, 2);
        assert_eq!(metrics.total(), Duration::from_millis(6));
    }
}
