//! Text report for a finished experiment.
//!
//! The distributions are drawn as cumulative text histograms, one per layer
//! plus one for the L2 lifetime left whenever an L3 guard fell.

use crate::experiment::Experiment;
use std::collections::BTreeMap;
use std::fmt::Write;
use vanguard_core::LayerId;

/// Width of the longest bar.
const BAR_WIDTH: usize = 40;

/// Roughly how many buckets `Histogram::auto` aims for.
const TARGET_BUCKETS: u64 = 20;

/// Values in hours grouped into fixed-width buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bucket_hours: u64,

    /// Bucket start (hours) -> sample count
    counts: BTreeMap<u64, usize>,

    total: usize,
}

impl Histogram {
    /// Buckets `values` into bins of `bucket_hours` (at least one hour).
    pub fn from_hours(values: &[u64], bucket_hours: u64) -> Self {
        let bucket_hours = bucket_hours.max(1);
        let mut counts = BTreeMap::new();
        for value in values {
            *counts.entry(value / bucket_hours * bucket_hours).or_insert(0) += 1;
        }
        Self {
            bucket_hours,
            counts,
            total: values.len(),
        }
    }

    /// Picks a bucket width that spreads `values` over about twenty buckets.
    pub fn auto(values: &[u64]) -> Self {
        let max = values.iter().copied().max().unwrap_or(0);
        Self::from_hours(values, max.div_ceil(TARGET_BUCKETS))
    }

    pub fn bucket_hours(&self) -> u64 {
        self.bucket_hours
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Non-empty buckets as `(start_hour, count)`, in ascending order.
    pub fn buckets(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.counts.iter().map(|(start, count)| (*start, *count))
    }

    /// Fraction of samples at or below the end of each bucket.
    pub fn cumulative(&self) -> Vec<(u64, f64)> {
        let mut seen = 0;
        self.buckets()
            .map(|(start, count)| {
                seen += count;
                (start, seen as f64 / self.total as f64)
            })
            .collect()
    }

    /// Renders the histogram under `title`.
    pub fn render(&self, title: &str) -> String {
        let mut out = format!("{} ({} samples)\n", title, self.total);
        if self.is_empty() {
            out.push_str("  (no samples)\n");
            return out;
        }

        let peak = self.counts.values().copied().max().unwrap_or(1);
        for ((start, count), (_, fraction)) in self.buckets().zip(self.cumulative()) {
            let bar = "#".repeat((count * BAR_WIDTH).div_ceil(peak));
            let _ = writeln!(
                out,
                "  {:>6} - {:<6} h | {:<width$} | {:>5} {:>6.1}%",
                start,
                start + self.bucket_hours,
                bar,
                count,
                fraction * 100.0,
                width = BAR_WIDTH
            );
        }
        out
    }
}

/// Full text report: parameters, averages and the distributions.
pub fn render_report(experiment: &Experiment) -> String {
    let summary = &experiment.summary;

    let mut out = String::from("Parameters:\n");
    out.push_str(&experiment.config.describe());

    let _ = writeln!(
        out,
        "Runs: {} ({} won, {} unfinished) in {:.2}s",
        summary.runs,
        summary.won,
        summary.unfinished,
        experiment.elapsed.as_secs_f64()
    );
    let _ = writeln!(out, "Average guard rotations: {:.2}", summary.avg_guard_rotations);
    let _ = writeln!(out, "Average hours to G1: {:.2}", summary.avg_hours_to_g1);
    let _ = writeln!(out, "Average hours to G2: {:.2}", summary.avg_hours_to_g2);
    let _ = writeln!(out, "Average hours to G3: {:.2}", summary.avg_hours_to_g3);

    for layer in [LayerId::L1, LayerId::L2, LayerId::L3] {
        out.push('\n');
        let hours = experiment.hours_to_layer(layer);
        out.push_str(&Histogram::auto(&hours).render(&format!("Hours to {}", layer)));
    }

    out.push('\n');
    out.push_str(
        &Histogram::auto(&summary.g2_time_left_hours).render("L2 hours left at L3 compromise"),
    );
    out
}
