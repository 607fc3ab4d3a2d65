//! Resolution planner: pick a rendering DPI and JPEG quality for a document.
//!
//! The plan is derived once per document from its first page and a memory
//! hint, then applied uniformly to every page of that document.
//!
//! ```text
//! memory hint ──▶ pixel budget ──┐
//!                                ├──▶ dpi cap ──▶ clamp(130, 200) ──▶ dpi
//! page area (in²) ───────────────┘
//! memory hint ──────────────────────────────────────────────────────▶ quality
//! ```

use crate::config::BudgetPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Preferred rendering resolution when memory allows it.
pub const DPI_TARGET: u32 = 200;

/// Lowest resolution produced under [`BudgetPolicy::FloorWins`].
pub const DPI_FLOOR: u32 = 130;

/// Memory hint used when the environment reports nothing usable.
pub const DEFAULT_MEMORY_GB: f64 = 4.0;

const POINTS_PER_INCH: f64 = 72.0;

/// Rendering resolution and compression quality for one document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Dots per inch used to rasterise every page.
    pub dpi: u32,
    /// Lossy compression quality in `(0, 1]`.
    pub quality: f32,
}

impl RenderPlan {
    /// Quality on the 1–100 scale JPEG encoders expect.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Human-readable label, e.g. `~200 DPI, JPEG 88%`.
    pub fn describe(&self) -> String {
        format!("~{} DPI, JPEG {}%", self.dpi, self.jpeg_quality())
    }
}

impl fmt::Display for RenderPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Compute a plan with the default [`BudgetPolicy`].
///
/// Zero, negative or non-finite page dimensions are treated as 1 pt.
pub fn plan(width_pt: f32, height_pt: f32, memory_gb: f64) -> RenderPlan {
    plan_with_policy(width_pt, height_pt, memory_gb, BudgetPolicy::default())
}

/// Compute a plan, resolving the floor-vs-budget conflict per `policy`.
pub fn plan_with_policy(
    width_pt: f32,
    height_pt: f32,
    memory_gb: f64,
    policy: BudgetPolicy,
) -> RenderPlan {
    let memory_gb = sanitize_memory(memory_gb);
    let budget = pixel_budget(memory_gb) as f64;

    let width_in = positive_or_one(width_pt) / POINTS_PER_INCH;
    let height_in = positive_or_one(height_pt) / POINTS_PER_INCH;
    let area_factor = (width_in * height_in).max(1.0);
    let dpi_cap = (budget / area_factor).sqrt().floor() as u32;

    let dpi = match policy {
        BudgetPolicy::FloorWins => DPI_TARGET.min(dpi_cap).max(DPI_FLOOR),
        BudgetPolicy::StrictBudget => DPI_TARGET.min(dpi_cap).max(1),
    };
    if dpi > dpi_cap {
        debug!(dpi, dpi_cap, budget, "DPI floor exceeds pixel budget");
    }

    RenderPlan {
        dpi,
        quality: quality_for(memory_gb),
    }
}

/// Pixel ceiling for a single page raster, tiered by memory.
pub fn pixel_budget(memory_gb: f64) -> u64 {
    if memory_gb >= 8.0 {
        16_000_000
    } else if memory_gb >= 6.0 {
        12_000_000
    } else if memory_gb >= 4.0 {
        9_000_000
    } else {
        6_000_000
    }
}

fn quality_for(memory_gb: f64) -> f32 {
    if memory_gb < 4.0 {
        0.86
    } else if memory_gb < 6.0 {
        0.88
    } else {
        0.90
    }
}

fn positive_or_one(v: f32) -> f64 {
    if v.is_finite() && v > 0.0 {
        v as f64
    } else {
        1.0
    }
}

fn sanitize_memory(memory_gb: f64) -> f64 {
    if memory_gb.is_finite() && memory_gb > 0.0 {
        memory_gb
    } else {
        DEFAULT_MEMORY_GB
    }
}

// ── Memory hint ──────────────────────────────────────────────────────────

/// Best-effort probe of total system memory in GiB.
///
/// Returns `None` where the platform offers no cheap way to ask.
pub fn detect_memory_gb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo_total_gb(&meminfo)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Resolve the memory hint: explicit override, then probe, then 4.
pub fn resolve_memory_gb(override_gb: Option<f64>) -> f64 {
    override_gb
        .filter(|m| m.is_finite() && *m > 0.0)
        .or_else(detect_memory_gb)
        .unwrap_or(DEFAULT_MEMORY_GB)
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_total_gb(meminfo: &str) -> Option<f64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib / (1024.0 * 1024.0))
}
