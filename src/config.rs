//! Configuration types for a batch run.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The source directory and target height that
//! a one-off script would hard-code live here, next to the collaborators
//! (codec, background remover, progress callback) each stage calls into.

use crate::codec::{ImageCodec, StandardCodec};
use crate::error::BgStripError;
use crate::output::Stage;
use crate::pipeline::strip::BackgroundRemover;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Height the resize stage scales every image to unless told otherwise.
pub const DEFAULT_TARGET_HEIGHT: u32 = 700;

/// Configuration for a batch run.
///
/// Built via [`PipelineConfig::builder()`].
///
/// # Example
/// ```rust
/// use bgstrip::{OutputLayout, PipelineConfig};
///
/// let config = PipelineConfig::builder("./img")
///     .target_height(512)
///     .layout(OutputLayout::Flat)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_height, 512);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Root directory holding the original images.
    pub source_dir: PathBuf,

    /// Output height in pixels for the resize stage. Default: 700.
    pub target_height: u32,

    /// Where each stage writes its output. Default: [`OutputLayout::Nested`].
    pub layout: OutputLayout,

    /// Which stages run. Default: all three.
    pub stages: StageSelection,

    /// Resampling filter for the resize stage. Default: [`ResizeFilter::CatmullRom`].
    pub resize_filter: ResizeFilter,

    /// Background remover for the strip stage.
    ///
    /// Required when the strip stage is selected; [`crate::run_pipeline`]
    /// fails with [`BgStripError::RemoverUnavailable`] otherwise.
    pub remover: Option<Arc<dyn BackgroundRemover>>,

    /// Image decoder/encoder. Default: [`StandardCodec`].
    pub codec: Arc<dyn ImageCodec>,

    /// Optional progress callback for per-file events.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("source_dir", &self.source_dir)
            .field("target_height", &self.target_height)
            .field("layout", &self.layout)
            .field("stages", &self.stages)
            .field("resize_filter", &self.resize_filter)
            .field("remover", &self.remover.as_ref().map(|r| r.name().to_string()))
            .field("codec", &"<dyn ImageCodec>")
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder rooted at `source_dir`.
    pub fn builder(source_dir: impl Into<PathBuf>) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self {
                source_dir: source_dir.into(),
                target_height: DEFAULT_TARGET_HEIGHT,
                layout: OutputLayout::default(),
                stages: StageSelection::default(),
                resize_filter: ResizeFilter::default(),
                remover: None,
                codec: Arc::new(StandardCodec),
                progress_callback: None,
            },
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.config, f)
    }
}

impl PipelineConfigBuilder {
    pub fn target_height(mut self, px: u32) -> Self {
        self.config.target_height = px;
        self
    }

    pub fn layout(mut self, layout: OutputLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn stages(mut self, stages: StageSelection) -> Self {
        self.config.stages = stages;
        self
    }

    pub fn resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.config.resize_filter = filter;
        self
    }

    pub fn remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.config.remover = Some(remover);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.config.codec = codec;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, BgStripError> {
        let c = &self.config;
        if c.target_height == 0 {
            return Err(BgStripError::InvalidConfig(
                "Target height must be ≥ 1".into(),
            ));
        }
        if c.stages.is_empty() {
            return Err(BgStripError::InvalidConfig(
                "At least one stage must be selected".into(),
            ));
        }
        if c.source_dir.as_os_str().is_empty() {
            return Err(BgStripError::InvalidConfig(
                "Source directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Placement of each stage's output directory.
///
/// `Nested` reproduces the historical layout where each stage writes under
/// the directory it read from, so the final images end up three levels deep.
/// `Flat` writes every stage's output directly under the root.
///
/// | Layout | normalize | strip | resize |
/// |--------|-----------|-------|--------|
/// | Nested | `root/converted` | `root/converted/no_background` | `root/converted/no_background/resized` |
/// | Flat   | `root/converted` | `root/no_background` | `root/resized` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputLayout {
    /// Each stage writes inside its input directory. (default)
    #[default]
    Nested,
    /// Each stage writes a sibling directory under the root.
    Flat,
}

/// Input/output directories for one stage of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: Stage,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl OutputLayout {
    /// Resolve the directories each selected stage reads and writes.
    ///
    /// The first selected stage reads `root`; each later one reads the
    /// previous selected stage's output.
    pub fn plan(self, root: &Path, stages: StageSelection) -> Vec<StagePlan> {
        let mut input = root.to_path_buf();
        let mut plans = Vec::new();
        for stage in stages.iter() {
            let output_dir = match self {
                OutputLayout::Nested => input.join(stage.output_dir_name()),
                OutputLayout::Flat => root.join(stage.output_dir_name()),
            };
            plans.push(StagePlan {
                stage,
                input_dir: input.clone(),
                output_dir: output_dir.clone(),
            });
            input = output_dir;
        }
        plans
    }
}

/// Which stages a pipeline run executes. Order is always normalize → strip → resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSelection {
    pub normalize: bool,
    pub strip: bool,
    pub resize: bool,
}

impl Default for StageSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl StageSelection {
    pub fn all() -> Self {
        Self {
            normalize: true,
            strip: true,
            resize: true,
        }
    }

    pub fn none() -> Self {
        Self {
            normalize: false,
            strip: false,
            resize: false,
        }
    }

    pub fn only(stage: Stage) -> Self {
        Self::none().with(stage)
    }

    pub fn with(mut self, stage: Stage) -> Self {
        match stage {
            Stage::Normalize => self.normalize = true,
            Stage::Strip => self.strip = true,
            Stage::Resize => self.resize = true,
        }
        self
    }

    pub fn contains(&self, stage: Stage) -> bool {
        match stage {
            Stage::Normalize => self.normalize,
            Stage::Strip => self.strip,
            Stage::Resize => self.resize,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.normalize || self.strip || self.resize)
    }

    /// Selected stages in pipeline order.
    pub fn iter(self) -> impl Iterator<Item = Stage> {
        Stage::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl FromIterator<Stage> for StageSelection {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

/// Resampling filter used by the resize stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear.
    Triangle,
    /// Bicubic. (default)
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for image::imageops::FilterType {
    fn from(f: ResizeFilter) -> Self {
        use image::imageops::FilterType;
        match f {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}
