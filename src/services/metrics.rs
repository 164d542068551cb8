use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

use crate::models::GenerationStep;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsService;

impl MetricsService {
    pub fn new() -> Self {
        Self
    }

    pub fn record_generation_started(&self) {
        counter!("generations_started_total").increment(1);
        gauge!("generations_in_flight").increment(1.0);
    }

    pub fn record_generation_ready(&self, duration: Duration, archive_bytes: u64) {
        counter!("generations_completed_total", "status" => "ready").increment(1);
        histogram!("generation_duration_seconds").record(duration.as_secs_f64());
        counter!("archive_bytes_total").increment(archive_bytes);
        gauge!("generations_in_flight").decrement(1.0);
    }

    pub fn record_generation_failed(&self, kind: &'static str) {
        counter!("generations_completed_total", "status" => "failed").increment(1);
        counter!("generation_failures_total", "kind" => kind).increment(1);
        gauge!("generations_in_flight").decrement(1.0);
    }

    pub fn record_step_duration(&self, step: GenerationStep, duration: Duration) {
        histogram!("generation_step_duration_seconds", "step" => step.as_str())
            .record(duration.as_secs_f64());
    }

    pub fn record_quota_denied(&self) {
        counter!("quota_denials_total").increment(1);
    }

    pub fn record_download(&self, bytes: u64) {
        counter!("downloads_total").increment(1);
        counter!("download_bytes_total").increment(bytes);
    }

    pub fn record_request_duration(&self, duration: Duration, endpoint: &str, status: u16) {
        histogram!(
            "request_duration_seconds",
            "endpoint" => endpoint.to_string(),
            "status" => status.to_string()
        )
        .record(duration.as_secs_f64());
    }

    pub fn record_error(&self, error_type: &'static str) {
        counter!("errors_total", "type" => error_type).increment(1);
    }
}

/// Records the elapsed time of one pipeline step when dropped.
pub struct StepTimer {
    start: Instant,
    step: GenerationStep,
    metrics: MetricsService,
}

impl StepTimer {
    pub fn new(metrics: MetricsService, step: GenerationStep) -> Self {
        Self {
            start: Instant::now(),
            step,
            metrics,
        }
    }
}

impl Drop for StepTimer {
    fn drop(&mut self) {
        self.metrics
            .record_step_duration(self.step, self.start.elapsed());
    }
}
