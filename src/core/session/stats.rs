//! Token usage and latency statistics reported to the host as `llm_stat`.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use super::host::{DATA_LLM_STAT, DataRecord};
use crate::core::realtime::{TokenDetails, Usage};

/// Samples kept per latency window.
pub const LATENCY_WINDOW: usize = 1024;

/// Usage totals across all responses of the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub input_token_details: TokenDetails,
    pub output_token_details: TokenDetails,
}

impl UsageTotals {
    fn add(&mut self, usage: &Usage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.total_tokens += usage.total_tokens;
        if let Some(details) = &usage.input_token_details {
            add_details(&mut self.input_token_details, details);
        }
        if let Some(details) = &usage.output_token_details {
            add_details(&mut self.output_token_details, details);
        }
    }
}

fn add_details(total: &mut TokenDetails, details: &TokenDetails) {
    total.cached_tokens += details.cached_tokens;
    total.text_tokens += details.text_tokens;
    total.audio_tokens += details.audio_tokens;
}

/// p95/p99 of every latency window, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub connection_latency_95: f64,
    pub completion_latency_95: f64,
    pub first_token_latency_95: f64,
    pub connection_latency_99: f64,
    pub completion_latency_99: f64,
    pub first_token_latency_99: f64,
}

#[derive(Debug, Default)]
struct LatencyWindow {
    samples: VecDeque<u64>,
}

impl LatencyWindow {
    fn record(&mut self, latency: Duration) {
        if self.samples.len() == LATENCY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(latency.as_millis() as u64);
    }

    fn percentile(&self, p: f64) -> Option<f64> {
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        percentile(&sorted, p)
    }

    fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Percentile of sorted samples with linear interpolation between ranks.
pub fn percentile(sorted: &[u64], p: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0] as f64),
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            Some(sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * weight)
        }
    }
}

/// Aggregated session statistics.
#[derive(Debug, Default)]
pub struct SessionStats {
    usage: UsageTotals,
    connect: LatencyWindow,
    first_token: LatencyWindow,
    completion: LatencyWindow,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_usage(&mut self, usage: &Usage) {
        self.usage.add(usage);
    }

    pub fn usage(&self) -> &UsageTotals {
        &self.usage
    }

    pub fn record_connect(&mut self, latency: Duration) {
        self.connect.record(latency);
    }

    pub fn record_first_token(&mut self, latency: Duration) {
        self.first_token.record(latency);
    }

    pub fn record_completion(&mut self, latency: Duration) {
        self.completion.record(latency);
    }

    /// Latency percentiles once every window has at least one sample.
    pub fn latency(&self) -> Option<LatencySummary> {
        if self.connect.is_empty() || self.first_token.is_empty() || self.completion.is_empty() {
            return None;
        }
        Some(LatencySummary {
            connection_latency_95: self.connect.percentile(95.0)?,
            completion_latency_95: self.completion.percentile(95.0)?,
            first_token_latency_95: self.first_token.percentile(95.0)?,
            connection_latency_99: self.connect.percentile(99.0)?,
            completion_latency_99: self.completion.percentile(99.0)?,
            first_token_latency_99: self.first_token.percentile(99.0)?,
        })
    }

    /// `llm_stat` record with usage totals and, when available, latency.
    pub fn to_record(&self) -> DataRecord {
        let record = DataRecord::new(DATA_LLM_STAT).with_property("usage", json!(self.usage));
        match self.latency() {
            Some(latency) => record.with_property("latency", json!(latency)),
            None => record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64, audio_out: u64) -> Usage {
        Usage {
            total_tokens: input + output,
            input_tokens: input,
            output_tokens: output,
            input_token_details: None,
            output_token_details: Some(TokenDetails {
                audio_tokens: audio_out,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_usage_accumulates() {
        let mut stats = SessionStats::new();
        stats.add_usage(&usage(10, 20, 15));
        stats.add_usage(&usage(5, 5, 3));

        let totals = stats.usage();
        assert_eq!(totals.input_tokens, 15);
        assert_eq!(totals.output_tokens, 25);
        assert_eq!(totals.total_tokens, 40);
        assert_eq!(totals.output_token_details.audio_tokens, 18);
        assert_eq!(totals.input_token_details.cached_tokens, 0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let samples: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&samples, 50.0), Some(50.5));
        assert!((percentile(&samples, 95.0).unwrap() - 95.05).abs() < 1e-9);
        assert_eq!(percentile(&[7], 99.0), Some(7.0));
        assert_eq!(percentile(&[], 99.0), None);
        assert_eq!(percentile(&[10, 20], 100.0), Some(20.0));
    }

    #[test]
    fn test_latency_requires_every_window() {
        let mut stats = SessionStats::new();
        stats.record_connect(Duration::from_millis(120));
        stats.record_completion(Duration::from_millis(900));
        assert!(stats.latency().is_none());
        assert!(stats.to_record().properties.get("latency").is_none());

        stats.record_first_token(Duration::from_millis(300));
        let latency = stats.latency().unwrap();
        assert_eq!(latency.connection_latency_95, 120.0);
        assert_eq!(latency.first_token_latency_99, 300.0);

        let record = stats.to_record();
        assert_eq!(record.name, DATA_LLM_STAT);
        assert_eq!(record.properties["latency"]["completion_latency_95"], 900.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = SessionStats::new();
        for i in 0..(LATENCY_WINDOW as u64 + 10) {
            stats.record_connect(Duration::from_millis(i));
        }
        assert_eq!(stats.connect.samples.len(), LATENCY_WINDOW);
        assert_eq!(stats.connect.samples.front(), Some(&10));
    }
}
