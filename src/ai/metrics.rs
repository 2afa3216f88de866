//! Classification Metrics Collection
//!
//! Run-wide counters for classification calls: tokens, latency, estimated
//! cost and per-kind (category / material) call counts. Counters are
//! atomics so a collector can be shared behind an `Arc`.
//!
//! ```ignore
//! let metrics = MetricsCollector::new(run_id);
//! metrics.record_call(ClassificationKind::Category, &usage, cost, elapsed_ms);
//! println!("{}", metrics.summary().display());
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use crate::ai::classifier::ClassificationKind;
use crate::ai::cost::InferenceFootprint;
use crate::ai::provider::TokenUsage;

// =============================================================================
// Metrics Collector
// =============================================================================

pub struct MetricsCollector {
    run_id: String,
    start_time: Instant,
    category_calls: AtomicU32,
    material_calls: AtomicU32,
    failed_calls: AtomicU32,
    timed_out_calls: AtomicU32,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
    /// Estimated cost in microdollars for atomic ops
    total_cost_micros: AtomicU64,
}

/// Snapshot of a [`MetricsCollector`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub run_id: String,
    pub total_duration_ms: u64,
    pub category_calls: u32,
    pub material_calls: u32,
    pub failed_calls: u32,
    pub timed_out_calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
    pub total_cost_usd: f64,
    pub footprint: InferenceFootprint,
}

impl MetricsCollector {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time: Instant::now(),
            category_calls: AtomicU32::new(0),
            material_calls: AtomicU32::new(0),
            failed_calls: AtomicU32::new(0),
            timed_out_calls: AtomicU32::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            total_cost_micros: AtomicU64::new(0),
        }
    }

    /// Record one successful classification call
    pub fn record_call(
        &self,
        kind: ClassificationKind,
        usage: &TokenUsage,
        cost_usd: f64,
        latency_ms: u64,
    ) {
        match kind {
            ClassificationKind::Category => self.category_calls.fetch_add(1, Ordering::Relaxed),
            ClassificationKind::Material => self.material_calls.fetch_add(1, Ordering::Relaxed),
        };
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens as u64, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens as u64, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        let cost_micros = (cost_usd * 1_000_000.0).round() as u64;
        self.total_cost_micros
            .fetch_add(cost_micros, Ordering::Relaxed);
    }

    /// Record a call that failed after all retries
    pub fn record_failure(&self, timed_out: bool) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timed_out_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let category_calls = self.category_calls.load(Ordering::Relaxed);
        let material_calls = self.material_calls.load(Ordering::Relaxed);
        let prompt_tokens = self.prompt_tokens.load(Ordering::Relaxed);
        let completion_tokens = self.completion_tokens.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let calls = category_calls + material_calls;

        let avg_latency = if calls > 0 {
            total_latency as f64 / calls as f64
        } else {
            0.0
        };

        MetricsSummary {
            run_id: self.run_id.clone(),
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            category_calls,
            material_calls,
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            timed_out_calls: self.timed_out_calls.load(Ordering::Relaxed),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            avg_latency_ms: avg_latency,
            total_cost_usd: self.total_cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            footprint: InferenceFootprint::for_tokens(prompt_tokens + completion_tokens),
        }
    }
}

impl MetricsSummary {
    pub fn display(&self) -> String {
        format!(
            "Run: {}\n\
             Duration: {:.1}s\n\
             Classification Calls: {} (category: {}, material: {})\n\
             Failed Calls: {} (timed out: {})\n\
             Tokens: {} (prompt: {}, completion: {})\n\
             Avg Latency: {:.0}ms\n\
             Estimated Cost: ${:.4}\n\
             Inference Footprint: {:.6} kg CO2-eq",
            self.run_id,
            self.total_duration_ms as f64 / 1000.0,
            self.category_calls + self.material_calls,
            self.category_calls,
            self.material_calls,
            self.failed_calls,
            self.timed_out_calls,
            self.total_tokens,
            self.prompt_tokens,
            self.completion_tokens,
            self.avg_latency_ms,
            self.total_cost_usd,
            self.footprint.emissions_kg_co2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_call() {
        let metrics = MetricsCollector::new("run-1");
        metrics.record_call(
            ClassificationKind::Category,
            &TokenUsage::new(100, 50),
            0.0125,
            500,
        );
        metrics.record_call(
            ClassificationKind::Material,
            &TokenUsage::new(200, 20),
            0.0,
            300,
        );

        let summary = metrics.summary();
        assert_eq!(summary.category_calls, 1);
        assert_eq!(summary.material_calls, 1);
        assert_eq!(summary.total_tokens, 370);
        assert!((summary.avg_latency_ms - 400.0).abs() < f64::EPSILON);
        assert!((summary.total_cost_usd - 0.0125).abs() < 1e-6);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(MetricsCollector::new("concurrent"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_call(
                            ClassificationKind::Material,
                            &TokenUsage::new(10, 5),
                            0.001,
                            50,
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = metrics.summary();
        assert_eq!(summary.material_calls, 800);
        assert_eq!(summary.prompt_tokens, 8000);
        assert!((summary.total_cost_usd - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_failures_and_display() {
        let metrics = MetricsCollector::new("display");
        metrics.record_failure(true);
        metrics.record_failure(false);
        let summary = metrics.summary();
        assert_eq!(summary.failed_calls, 2);
        assert_eq!(summary.timed_out_calls, 1);
        let text = summary.display();
        assert!(text.contains("display"));
        assert!(text.contains("timed out: 1"));
    }
}
