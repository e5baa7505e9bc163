//! Convergence reports for an encode/decode run.
//!
//! A report records how close each decoding pass gets to the original
//! image, along with sizes and timings, and can be written as JSON or as a
//! CSV table with one row per pass.

use std::path::Path;
use std::time::Duration;

use imgref::ImgRef;
use serde::{Deserialize, Serialize};

use crate::decoder::{Reconstruction, StopReason};
use crate::error::Result;
use crate::format::CompressedImage;
use crate::metrics::{MetricConfig, MetricResult, calculate_metrics};
use crate::params::FractalParams;

/// Quality of one image in the decoding sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationStats {
    /// Pass number; 0 is the seed.
    pub iteration: usize,
    /// Mean squared change from the previous pass (none for the seed).
    pub delta: Option<f64>,
    /// Metrics against the original image.
    pub metrics: MetricResult,
}

/// Report for a single image compressed and reconstructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Image name or identifier.
    pub name: String,

    /// Image width in pixels.
    pub width: usize,

    /// Image height in pixels.
    pub height: usize,

    /// Block geometry.
    pub params: FractalParams,

    /// Size of the 8-bit grey image in bytes.
    pub uncompressed_size: usize,

    /// Size of the binary transform stream in bytes.
    pub compressed_size: usize,

    /// Encoding time.
    #[serde(with = "duration_millis")]
    pub encode_time: Duration,

    /// Decoding time.
    #[serde(with = "duration_millis")]
    pub decode_time: Duration,

    /// Stats for the seed and every pass.
    pub iterations: Vec<IterationStats>,

    /// Why decoding stopped.
    pub stop: StopReason,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ConvergenceReport {
    /// Build a report from a reconstruction that kept its sequence.
    ///
    /// If the sequence was not kept only the final image is measured.
    pub fn evaluate(
        name: &str,
        original: ImgRef<'_, f64>,
        compressed: &CompressedImage,
        reconstruction: &Reconstruction,
        encode_time: Duration,
        decode_time: Duration,
        config: &MetricConfig,
    ) -> Result<Self> {
        let mut iterations = Vec::with_capacity(reconstruction.sequence.len().max(1));
        if reconstruction.sequence.is_empty() {
            iterations.push(IterationStats {
                iteration: reconstruction.iterations(),
                delta: reconstruction.deltas.last().copied(),
                metrics: calculate_metrics(original, reconstruction.image.as_ref(), config)?,
            });
        } else {
            for (iteration, image) in reconstruction.sequence.iter().enumerate() {
                iterations.push(IterationStats {
                    iteration,
                    delta: iteration.checked_sub(1).and_then(|i| reconstruction.deltas.get(i).copied()),
                    metrics: calculate_metrics(original, image.as_ref(), config)?,
                });
            }
        }

        let (width, height) = (original.width(), original.height());
        Ok(Self {
            name: name.to_string(),
            width,
            height,
            params: compressed.params,
            uncompressed_size: width * height,
            compressed_size: compressed.compressed_size(),
            encode_time,
            decode_time,
            iterations,
            stop: reconstruction.stop,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Uncompressed size over compressed size.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            0.0
        } else {
            self.uncompressed_size as f64 / self.compressed_size as f64
        }
    }

    /// Stats for the last image in the sequence.
    #[must_use]
    pub fn final_stats(&self) -> Option<&IterationStats> {
        self.iterations.last()
    }

    /// Write `<name>.json` and `<name>.csv` into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let json_path = dir.join(format!("{}.json", self.name));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(json_path, json)?;

        let csv_path = dir.join(format!("{}.csv", self.name));
        self.write_csv(&csv_path)?;

        Ok(())
    }

    /// Write one CSV row per pass.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        wtr.write_record(["image", "iteration", "delta", "mse", "rmse", "psnr", "dssim"])?;

        for stats in &self.iterations {
            wtr.write_record([
                &self.name,
                &stats.iteration.to_string(),
                &stats.delta.map_or(String::new(), |d| format!("{:.6}", d)),
                &format!("{:.6}", stats.metrics.mse),
                &format!("{:.4}", stats.metrics.rmse()),
                &stats.metrics.psnr.map_or(String::new(), |p| format!("{:.2}", p)),
                &stats.metrics.dssim.map_or(String::new(), |d| format!("{:.6}", d)),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

// Custom serialization for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
