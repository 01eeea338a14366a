//! Pipeline Coordinator
//!
//! Wires intake, normalization, segmentation, recognition and acceptance
//! into one extraction run per uploaded image. Regions are independent once
//! segmented and may be spread over a small worker pool.

use crossbeam_channel::unbounded;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use crate::analysis::{AcceptanceDecision, AcceptanceFilter, Classification, DiscardReason};
use crate::capture::{decode_upload, ImageKind};
use crate::config::AppConfig;
use crate::error::{PipelineError, Stage};
use crate::storage;
use crate::vision::{
    BoundingBox, Normalizer, Profile, Recognizer, RegionImage, RegionSegmenter, TesseractCli,
    TextEngine,
};

/// A region the engine could not read
#[derive(Debug, Clone, Serialize)]
pub struct RegionWarning {
    pub region_index: usize,
    pub bounds: BoundingBox,
    /// Profile that was running when the engine failed
    pub profile: Profile,
    pub reason: String,
}

/// Result of one extraction run
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    /// Id of the run, also attached to its log span
    pub invocation: String,
    /// Rotation applied to the page, in degrees
    pub skew_degrees: f32,
    /// One decision per readable region, in region order
    pub decisions: Vec<AcceptanceDecision>,
    /// Regions skipped after an engine failure, in region order
    pub warnings: Vec<RegionWarning>,
}

impl Extraction {
    /// Accepted `(label, text)` pairs in region order
    pub fn accepted(&self) -> Vec<(Classification, String)> {
        self.decisions
            .iter()
            .filter(|d| d.is_accepted())
            .map(|d| (d.label(), d.result.text.clone()))
            .collect()
    }

    /// Rejected regions with the reason they were dropped
    pub fn discarded(&self) -> Vec<(usize, &DiscardReason)> {
        self.decisions
            .iter()
            .filter_map(|d| d.discard_reason().map(|r| (d.region_index, r)))
            .collect()
    }

    /// No region was accepted
    pub fn is_empty(&self) -> bool {
        !self.decisions.iter().any(|d| d.is_accepted())
    }
}

type RegionOutcome = Result<AcceptanceDecision, RegionWarning>;

/// Extraction pipeline built from one immutable configuration
pub struct ExtractionPipeline {
    config: AppConfig,
    normalizer: Normalizer,
    segmenter: RegionSegmenter,
    recognizer: Recognizer,
    filter: AcceptanceFilter,
    debug_dir: Option<PathBuf>,
}

impl ExtractionPipeline {
    /// Create a pipeline around `engine`. The configuration is validated first.
    pub fn new(config: AppConfig, engine: Arc<dyn TextEngine>) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(config.normalizer.clone()),
            segmenter: RegionSegmenter::new(config.segmenter.clone()),
            recognizer: Recognizer::new(engine, &config.recognizer),
            filter: AcceptanceFilter::new(&config.acceptance),
            debug_dir: None,
            config,
        })
    }

    /// Create a pipeline backed by the Tesseract executable
    pub fn with_tesseract(config: AppConfig) -> Result<Self, PipelineError> {
        let engine = Arc::new(TesseractCli::from_settings(&config.recognizer));
        Self::new(config, engine)
    }

    /// Dump the normalized page and region crops into `dir` on every run
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run one extraction on an uploaded image
    pub fn extract(&self, bytes: &[u8], extension: &str) -> Result<Extraction, PipelineError> {
        self.extract_with_cancel(bytes, extension, &CancellationToken::new())
    }

    /// Run one extraction, stopping at the next stage boundary once `cancel`
    /// fires. A cancelled run returns no partial results.
    pub fn extract_with_cancel(
        &self,
        bytes: &[u8],
        extension: &str,
        cancel: &CancellationToken,
    ) -> Result<Extraction, PipelineError> {
        let invocation = Uuid::new_v4().to_string();
        let span = info_span!("extract", invocation = %invocation);
        let _guard = span.enter();
        let start = Instant::now();

        let kind = ImageKind::from_extension(extension)?;

        check_cancelled(cancel, Stage::Decode)?;
        let image = decode_upload(bytes, kind, self.config.performance.decode_timeout())?;
        info!("Decoded {}x{} {:?} upload", image.width(), image.height(), kind);

        check_cancelled(cancel, Stage::Normalize)?;
        let page = self.normalizer.normalize(&image)?;
        drop(image);
        info!(
            "Normalized page {}x{} (skew {:.2} deg)",
            page.image.width(),
            page.image.height(),
            page.skew_degrees
        );

        check_cancelled(cancel, Stage::Segment)?;
        let regions = self.segmenter.segment(&page.image);
        info!("Segmented {} regions", regions.len());

        if let Some(dir) = &self.debug_dir {
            match storage::save_debug_images(dir, &invocation, &page.image, &regions) {
                Ok(files) => debug!("Wrote {} debug images to {:?}", files.len(), dir),
                Err(e) => warn!("Failed to write debug images: {:#}", e),
            }
        }

        check_cancelled(cancel, Stage::Recognize)?;
        let outcomes = self.process_regions(regions, cancel, &span);
        check_cancelled(cancel, Stage::Recognize)?;

        let mut decisions = Vec::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(decision) => decisions.push(decision),
                Err(warning) => warnings.push(warning),
            }
        }

        let extraction = Extraction {
            invocation,
            skew_degrees: page.skew_degrees,
            decisions,
            warnings,
        };
        info!(
            "Accepted {} of {} regions ({} failed) in {:?}",
            extraction.accepted().len(),
            extraction.decisions.len() + extraction.warnings.len(),
            extraction.warnings.len(),
            start.elapsed()
        );
        Ok(extraction)
    }

    /// Recognize and judge every region, in region order
    fn process_regions(
        &self,
        regions: Vec<RegionImage>,
        cancel: &CancellationToken,
        span: &Span,
    ) -> Vec<RegionOutcome> {
        let workers = self.config.performance.workers.min(regions.len());
        if workers <= 1 {
            let mut outcomes = Vec::with_capacity(regions.len());
            for region in &regions {
                if cancel.is_cancelled() {
                    break;
                }
                outcomes.push(self.process_region(region));
            }
            return outcomes;
        }

        let (job_tx, job_rx) = unbounded::<RegionImage>();
        let (result_tx, result_rx) = unbounded::<RegionOutcome>();
        for region in regions {
            let _ = job_tx.send(region);
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    let _guard = span.enter();
                    for region in job_rx.iter() {
                        if cancel.is_cancelled() {
                            break;
                        }
                        if result_tx.send(self.process_region(&region)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut outcomes: Vec<RegionOutcome> = result_rx.iter().collect();
        outcomes.sort_by_key(|outcome| match outcome {
            Ok(decision) => decision.region_index,
            Err(warning) => warning.region_index,
        });
        outcomes
    }

    fn process_region(&self, region: &RegionImage) -> RegionOutcome {
        let warning = |profile: Profile, reason: String| {
            warn!(
                "Region {} skipped, {:?} recognition failed: {}",
                region.index, profile, reason
            );
            RegionWarning {
                region_index: region.index,
                bounds: region.bounds,
                profile,
                reason,
            }
        };

        let sparse = self
            .recognizer
            .recognize(region, Profile::Sparse)
            .map_err(|e| warning(Profile::Sparse, e.to_string()))?;
        self.filter
            .decide(region, sparse, || self.recognizer.recognize(region, Profile::Block))
            .map_err(|e| warning(Profile::Block, e.to_string()))
    }
}

fn check_cancelled(cancel: &CancellationToken, stage: Stage) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        info!("Extraction cancelled before {}", stage);
        return Err(PipelineError::Cancelled { stage });
    }
    Ok(())
}
