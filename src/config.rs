//! Configuration types for PDF flattening.
//!
//! All conversion behaviour is controlled through [`FlattenConfig`], built
//! via its [`FlattenConfigBuilder`]. The config is cheap to clone (shared
//! parts sit behind `Arc`) so it can be moved into blocking worker tasks.

use crate::error::FlattenError;
use crate::pipeline::source::PdfBackend;
use crate::planner::RenderPlan;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default suffix appended to output file stems.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_flattened";

/// Default file name of the combined archive.
pub const DEFAULT_ARCHIVE_NAME: &str = "flattened.zip";

/// Configuration for a flattening run.
///
/// Built via [`FlattenConfig::builder()`] or using
/// [`FlattenConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_flatten::FlattenConfig;
///
/// let config = FlattenConfig::builder()
///     .memory_gb(8.0)
///     .output_suffix("_clean")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct FlattenConfig {
    /// Memory hint in GB fed to the planner. `None` probes the host and
    /// falls back to 4.
    pub memory_gb: Option<f64>,

    /// Fixed plan applied to every document, bypassing the planner.
    pub fixed_plan: Option<RenderPlan>,

    /// What to do when the pixel budget asks for less than the DPI floor.
    pub budget_policy: BudgetPolicy,

    /// Appended to each output file stem. Default: `_flattened`.
    pub output_suffix: String,

    /// File name reported for the combined archive. Default: `flattened.zip`.
    pub archive_name: String,

    /// PDF user password, tried on every input.
    pub password: Option<String>,

    /// Maximum documents whose metadata is read at the same time. Default: 4.
    ///
    /// Only the read-only pre-scan is concurrent; conversion itself always
    /// handles one document at a time.
    pub metadata_concurrency: usize,

    /// Explicit pdfium library path. `None` searches the usual locations.
    pub pdfium_library_path: Option<PathBuf>,

    /// Pre-constructed decode/render backend. Takes precedence over pdfium.
    pub backend: Option<Arc<dyn PdfBackend>>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,

    /// Polled before each document and between pages.
    pub cancel: CancelFlag,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            memory_gb: None,
            fixed_plan: None,
            budget_policy: BudgetPolicy::default(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            password: None,
            metadata_concurrency: 4,
            pdfium_library_path: None,
            backend: None,
            progress_callback: None,
            cancel: CancelFlag::default(),
        }
    }
}

impl fmt::Debug for FlattenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlattenConfig")
            .field("memory_gb", &self.memory_gb)
            .field("fixed_plan", &self.fixed_plan)
            .field("budget_policy", &self.budget_policy)
            .field("output_suffix", &self.output_suffix)
            .field("archive_name", &self.archive_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("metadata_concurrency", &self.metadata_concurrency)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl FlattenConfig {
    /// Create a new builder for `FlattenConfig`.
    pub fn builder() -> FlattenConfigBuilder {
        FlattenConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`FlattenConfig`].
#[derive(Debug)]
pub struct FlattenConfigBuilder {
    config: FlattenConfig,
}

impl FlattenConfigBuilder {
    pub fn memory_gb(mut self, gb: f64) -> Self {
        self.config.memory_gb = Some(gb);
        self
    }

    /// Use the same DPI and quality for every document.
    pub fn fixed_plan(mut self, dpi: u32, quality: f32) -> Self {
        self.config.fixed_plan = Some(RenderPlan { dpi, quality });
        self
    }

    pub fn budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.config.budget_policy = policy;
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    pub fn archive_name(mut self, name: impl Into<String>) -> Self {
        self.config.archive_name = name.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn metadata_concurrency(mut self, n: usize) -> Self {
        self.config.metadata_concurrency = n.max(1);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.config.cancel = flag;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FlattenConfig, FlattenError> {
        let c = &self.config;
        if let Some(m) = c.memory_gb {
            if !m.is_finite() || m <= 0.0 {
                return Err(FlattenError::InvalidConfig(format!(
                    "memory hint must be a positive number of GB, got {m}"
                )));
            }
        }
        if let Some(plan) = c.fixed_plan {
            if plan.dpi == 0 || plan.dpi > 1200 {
                return Err(FlattenError::InvalidConfig(format!(
                    "DPI must be 1–1200, got {}",
                    plan.dpi
                )));
            }
            if !(plan.quality > 0.0 && plan.quality <= 1.0) {
                return Err(FlattenError::InvalidConfig(format!(
                    "quality must be in (0, 1], got {}",
                    plan.quality
                )));
            }
        }
        if c.output_suffix.contains(['/', '\\']) {
            return Err(FlattenError::InvalidConfig(format!(
                "output suffix must not contain path separators: {:?}",
                c.output_suffix
            )));
        }
        if c.archive_name.trim().is_empty() {
            return Err(FlattenError::InvalidConfig(
                "archive name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Resolution of the conflict between the DPI floor and the pixel budget.
///
/// Very large pages on low-memory hosts can produce a budget-derived DPI
/// cap below the 130 DPI floor. One of the two has to give:
///
/// | Policy | Result when cap < 130 |
/// |--------|-----------------------|
/// | `FloorWins` | 130 DPI, raster may exceed the pixel budget (default) |
/// | `StrictBudget` | the cap, never below 1 DPI |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BudgetPolicy {
    /// Readability first: never go below the floor. (default)
    #[default]
    FloorWins,
    /// Memory first: the pixel budget is a hard ceiling.
    StrictBudget,
}

/// Cooperative cancellation shared between the caller and the pipeline.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running batch to stop at the next page boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
