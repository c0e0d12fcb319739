//! Context history -> fixed-size feature vector.
//!
//! Open-vocabulary fields (titles, apps, processes, files) are hashed into
//! fixed bucket spaces, so unseen names never grow the vector. Encoding is a
//! pure function of the history window: equal windows give bit-identical vectors.

pub mod vector;

pub use vector::FeatureVector;

use std::f32::consts::TAU;

use crate::context::app::strip_dirty_marker;
use crate::context::ContextSnapshot;
use crate::kernel::config::EncoderConfig;
use crate::kernel::error::EncodingError;
use crate::kernel::time::{local_hour_weekday, MS_PER_SEC};

/// Elapsed gaps are log-scaled against one hour and saturate there.
const ELAPSED_SCALE_SECS: f32 = 3_600.0;

/// Trailing scalar features: hour sin/cos, weekday sin/cos, elapsed, fill ratio, app switch.
const SCALAR_FEATURES: usize = 7;

#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    config: EncoderConfig,
}

/// Offsets of each block inside the vector.
#[derive(Debug, Clone, Copy)]
struct Layout {
    title: usize,
    app: usize,
    process: usize,
    files: usize,
    history: usize,
    scalars: usize,
    dim: usize,
}

impl FeatureEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn history_window(&self) -> usize {
        self.config.history_window
    }

    pub fn dim(&self) -> usize {
        self.layout().dim
    }

    fn layout(&self) -> Layout {
        let c = &self.config;
        let title = 0;
        let app = title + c.title_buckets;
        let process = app + c.app_buckets;
        let files = process + c.process_buckets;
        let history = files + c.file_buckets;
        let scalars = history + c.app_buckets;
        Layout {
            title,
            app,
            process,
            files,
            history,
            scalars,
            dim: scalars + SCALAR_FEATURES,
        }
    }

    /// Encodes the last snapshot of `history` (oldest first) against up to K before it.
    pub fn encode(&self, history: &[ContextSnapshot]) -> Result<FeatureVector, EncodingError> {
        let current = history.last().ok_or(EncodingError::EmptyHistory)?;
        let start = history.len().saturating_sub(self.config.history_window + 1);
        let window = &history[start..];
        validate(window)?;

        let layout = self.layout();
        let c = &self.config;
        let mut values = vec![0.0f32; layout.dim];

        // Current title, bag of words.
        let words: Vec<String> = strip_dirty_marker(&current.window_title)
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        if !words.is_empty() {
            let weight = 1.0 / words.len() as f32;
            for word in &words {
                values[layout.title + bucket("title", word, c.title_buckets)] += weight;
            }
        }

        let app = current.normalized_app();
        if !app.is_empty() {
            values[layout.app + bucket("app", &app, c.app_buckets)] = 1.0;
        }

        let process = current.process_name.trim().to_lowercase();
        if !process.is_empty() {
            values[layout.process + bucket("process", &process, c.process_buckets)] = 1.0;
        }

        for (i, file) in current.recent_files.iter().enumerate() {
            let kind = file
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            values[layout.files + bucket("file", &kind, c.file_buckets)] += 1.0 / (1.0 + i as f32);
        }

        // Prior apps, most recent first, weights decay^i. Missing slots stay 0.
        let prior = &window[..window.len() - 1];
        let mut total_weight = 0.0f32;
        let mut weight = 1.0f32;
        for snapshot in prior.iter().rev() {
            let prior_app = snapshot.normalized_app();
            if !prior_app.is_empty() {
                values[layout.history + bucket("app", &prior_app, c.app_buckets)] += weight;
            }
            total_weight += weight;
            weight *= c.recency_decay;
        }
        if total_weight > 0.0 {
            for v in &mut values[layout.history..layout.scalars] {
                *v /= total_weight;
            }
        }

        let (hour, weekday) = local_hour_weekday(current.timestamp_ms, c.utc_offset_minutes);
        let hour_angle = TAU * hour / 24.0;
        let day_angle = TAU * weekday as f32 / 7.0;
        let elapsed_secs = current.elapsed_ms as f32 / MS_PER_SEC as f32;
        let elapsed = ((1.0 + elapsed_secs).ln() / (1.0 + ELAPSED_SCALE_SECS).ln()).min(1.0);
        let fill = prior.len() as f32 / c.history_window as f32;
        let switched = prior
            .last()
            .map(|prev| prev.normalized_app() != app)
            .unwrap_or(false);

        let s = layout.scalars;
        values[s] = hour_angle.sin();
        values[s + 1] = hour_angle.cos();
        values[s + 2] = day_angle.sin();
        values[s + 3] = day_angle.cos();
        values[s + 4] = elapsed;
        values[s + 5] = fill;
        values[s + 6] = if switched { 1.0 } else { 0.0 };

        Ok(FeatureVector::new(values))
    }
}

fn validate(window: &[ContextSnapshot]) -> Result<(), EncodingError> {
    let mut previous: Option<i64> = None;
    for snapshot in window {
        if snapshot.timestamp_ms < 0 {
            return Err(EncodingError::NegativeTimestamp(snapshot.timestamp_ms));
        }
        if snapshot.elapsed_ms < 0 {
            return Err(EncodingError::NegativeElapsed(snapshot.elapsed_ms));
        }
        if let Some(earlier) = previous {
            if snapshot.timestamp_ms < earlier {
                return Err(EncodingError::OutOfOrder {
                    earlier,
                    later: snapshot.timestamp_ms,
                });
            }
        }
        previous = Some(snapshot.timestamp_ms);
    }
    Ok(())
}

/// Namespaced BLAKE3 bucket index in `0..buckets`.
fn bucket(namespace: &str, token: &str, buckets: usize) -> usize {
    let mut hasher = blake3::Hasher::new();
    hasher.update(namespace.as_bytes());
    hasher.update(&[0]);
    hasher.update(token.as_bytes());
    let hash = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(head) % buckets as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> FeatureEncoder {
        FeatureEncoder::new(EncoderConfig::default())
    }

    #[test]
    fn dimension_matches_layout() {
        let c = EncoderConfig::default();
        let expected = c.title_buckets + 2 * c.app_buckets + c.process_buckets + c.file_buckets + 7;
        assert_eq!(encoder().dim(), expected);
    }

    #[test]
    fn bucket_is_in_range_and_stable() {
        for token in ["code", "firefox", "", "日本語"] {
            let b = bucket("app", token, 13);
            assert!(b < 13);
            assert_eq!(b, bucket("app", token, 13));
        }
    }

    #[test]
    fn first_snapshot_has_zero_fill_and_no_switch() {
        let snap = ContextSnapshot::builder(1_000).class("Code").build();
        let v = encoder().encode(&[snap]).unwrap();
        let s = encoder().dim() - SCALAR_FEATURES;
        assert_eq!(v.as_slice()[s + 5], 0.0);
        assert_eq!(v.as_slice()[s + 6], 0.0);
    }
}
