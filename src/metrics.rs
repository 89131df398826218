// filemesh - Peer-to-peer file sharing network with a central directory
// Copyright (C) 2026  filemesh contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Accumulates search durations and transfer byte counts/durations/
//! throughputs. Writes are concurrent (each worker records independently)
//! and atomic per scalar append; readers take a brief shared snapshot to
//! compute summary statistics.

use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub search_times: Summary,
    pub download_speeds: Summary,
    pub throughput_bytes_per_sec: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Download {
    bytes: f64,
    duration: f64,
}

#[derive(Default)]
pub struct MetricsCollector {
    search_times: Mutex<Vec<f64>>,
    download_speeds: Mutex<Vec<f64>>,
    downloads: Mutex<Vec<Download>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search_time(&self, seconds: f64) {
        self.search_times
            .lock()
            .expect("metrics lock poisoned")
            .push(seconds);
    }

    pub fn record_download_speed(&self, bytes_per_sec: f64) {
        self.download_speeds
            .lock()
            .expect("metrics lock poisoned")
            .push(bytes_per_sec);
    }

    pub fn record_download(&self, bytes: f64, duration: f64) {
        self.downloads
            .lock()
            .expect("metrics lock poisoned")
            .push(Download { bytes, duration });
    }

    pub fn statistics(&self) -> Statistics {
        let search_times = self.search_times.lock().expect("metrics lock poisoned");
        let download_speeds = self.download_speeds.lock().expect("metrics lock poisoned");
        let downloads = self.downloads.lock().expect("metrics lock poisoned");

        let total_bytes: f64 = downloads.iter().map(|d| d.bytes).sum();
        let total_duration: f64 = downloads.iter().map(|d| d.duration).sum();
        let throughput = if total_duration > 0.0 {
            Some(total_bytes / total_duration)
        } else {
            None
        };

        Statistics {
            search_times: summarize(&search_times),
            download_speeds: summarize(&download_speeds),
            throughput_bytes_per_sec: throughput,
        }
    }
}

fn summarize(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let stdev = if values.len() > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    Summary {
        mean: Some(mean),
        stdev: Some(stdev),
        min: Some(min),
        max: Some(max),
    }
}
