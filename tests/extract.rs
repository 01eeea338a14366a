//! End-to-end extraction with a scripted recognition engine

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use recipe_scan::analysis::{Classification, DiscardReason};
use recipe_scan::config::{AppConfig, ProfileConfig};
use recipe_scan::error::{EngineError, PipelineError, Stage};
use recipe_scan::vision::{Profile, RecognitionResult, TextEngine};
use recipe_scan::ExtractionPipeline;

/// Regions taller than this are the ingredient list on the test card
const TALL_REGION: u32 = 45;

const BLOCK_PSM: u8 = 6;

/// What the scripted engine does for a given call
#[derive(Clone, Copy)]
enum Script {
    Read,
    LowConfidence,
    FailShortRegions,
    FailBlockProfile,
}

/// Answers like Tesseract would for the synthetic recipe card
struct ScriptedEngine {
    script: Script,
    calls: AtomicUsize,
    cancel_on_call: Option<CancellationToken>,
}

impl ScriptedEngine {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            cancel_on_call: None,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextEngine for ScriptedEngine {
    fn recognize_text(
        &self,
        image: &GrayImage,
        profile: &ProfileConfig,
    ) -> Result<RecognitionResult, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }

        let tall = image.height() > TALL_REGION;
        let block = profile.psm == BLOCK_PSM;
        match self.script {
            Script::FailShortRegions if !tall => {
                return Err(EngineError::Output("corrupt region".to_string()))
            }
            Script::FailBlockProfile if block => {
                return Err(EngineError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "Error during processing.".to_string(),
                })
            }
            _ => {}
        }

        let low = matches!(self.script, Script::LowConfidence);
        let result = match (tall, block) {
            (true, _) => RecognitionResult::new(
                "1 ½ cup flour\n¼ tsp salt",
                if low {
                    vec![12.0, 30.0, 25.0, 18.0, 40.0, 22.0]
                } else {
                    vec![91.0, 88.0, 95.0, 72.0, 90.0, 93.0]
                },
            ),
            (false, false) => RecognitionResult::new("Preheat oven to 350°.", vec![41.0, 35.0, 60.0, 38.0]),
            (false, true) => RecognitionResult::new(
                "Preheat oven to 350°. Mix until smooth.",
                if low {
                    vec![20.0, 15.0, 33.0, 10.0, 28.0, 19.0, 25.0]
                } else {
                    vec![89.0, 92.0, 85.0, 90.0, 87.0, 94.0, 91.0]
                },
            ),
        };
        Ok(result)
    }
}

/// A recipe card photographed on a dark table: a tall ingredient block and a
/// short step paragraph
fn recipe_card() -> GrayImage {
    let mut photo = GrayImage::from_pixel(520, 420, Luma([30]));
    draw_filled_rect_mut(&mut photo, Rect::at(60, 60).of_size(400, 300), Luma([225]));
    draw_filled_rect_mut(&mut photo, Rect::at(100, 100).of_size(300, 60), Luma([30]));
    draw_filled_rect_mut(&mut photo, Rect::at(100, 230).of_size(280, 24), Luma([30]));
    photo
}

fn encode(image: GrayImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

fn card_png() -> Vec<u8> {
    encode(recipe_card(), ImageFormat::Png)
}

fn pipeline(engine: Arc<ScriptedEngine>) -> ExtractionPipeline {
    ExtractionPipeline::new(AppConfig::default(), engine).unwrap()
}

#[test]
fn test_recipe_card_end_to_end() {
    let engine = ScriptedEngine::new(Script::Read);
    let extraction = pipeline(engine.clone()).extract(&card_png(), "png").unwrap();

    let accepted = extraction.accepted();
    assert!(accepted
        .iter()
        .any(|(label, text)| *label == Classification::Ingredients && text.contains('½')));
    assert!(accepted
        .iter()
        .any(|(label, text)| *label == Classification::Instructions && text.contains("Preheat")));
    assert!(extraction.warnings.is_empty());
    assert!(!extraction.is_empty());

    // Instructions are judged on the block profile's reading
    let steps = extraction
        .decisions
        .iter()
        .find(|d| d.label() == Classification::Instructions)
        .unwrap();
    assert_eq!(steps.profile, Profile::Block);
    assert!(steps.result.text.contains("Mix until smooth"));

    // Two regions: two sparse reads plus one block re-read
    assert_eq!(engine.calls(), 3);
}

#[test]
fn test_blank_white_image() {
    let engine = ScriptedEngine::new(Script::Read);
    let blank = encode(GrayImage::from_pixel(300, 200, Luma([255])), ImageFormat::Png);

    let err = pipeline(engine.clone()).extract(&blank, "png").unwrap_err();

    assert!(matches!(err, PipelineError::NoDominantRegionFound { .. }));
    assert_eq!(engine.calls(), 0);
}

#[test]
fn test_gif_is_rejected_before_processing() {
    let engine = ScriptedEngine::new(Script::Read);
    let err = pipeline(engine.clone()).extract(&card_png(), "gif").unwrap_err();

    assert!(matches!(err, PipelineError::UnsupportedFileType { ref extension } if extension == "gif"));
    assert_eq!(err.stage(), "intake");
    assert_eq!(engine.calls(), 0);
}

#[test]
fn test_corrupt_upload_fails_decode() {
    let engine = ScriptedEngine::new(Script::Read);
    let err = pipeline(engine).extract(b"\x89PNG truncated", "png").unwrap_err();
    assert!(matches!(err, PipelineError::Decode { .. }));
}

#[test]
fn test_jpeg_upload() {
    let engine = ScriptedEngine::new(Script::Read);
    let jpeg = encode(recipe_card(), ImageFormat::Jpeg);
    let extraction = pipeline(engine).extract(&jpeg, "JPG").unwrap();
    assert!(!extraction.decisions.is_empty());
}

#[test]
fn test_failed_region_becomes_warning() {
    let engine = ScriptedEngine::new(Script::FailShortRegions);
    let extraction = pipeline(engine).extract(&card_png(), "png").unwrap();

    assert_eq!(extraction.warnings.len(), 1);
    assert_eq!(extraction.warnings[0].profile, Profile::Sparse);
    assert!(extraction.warnings[0].reason.contains("corrupt region"));
    assert_eq!(
        extraction.accepted(),
        vec![(Classification::Ingredients, "1 ½ cup flour\n¼ tsp salt".to_string())]
    );
}

#[test]
fn test_block_failure_is_reported_with_profile() {
    let engine = ScriptedEngine::new(Script::FailBlockProfile);
    let extraction = pipeline(engine).extract(&card_png(), "png").unwrap();

    assert_eq!(extraction.warnings.len(), 1);
    assert_eq!(extraction.warnings[0].profile, Profile::Block);
    assert_eq!(extraction.accepted().len(), 1);
}

#[test]
fn test_low_confidence_yields_empty_result() {
    let engine = ScriptedEngine::new(Script::LowConfidence);
    let extraction = pipeline(engine).extract(&card_png(), "png").unwrap();

    assert!(extraction.is_empty());
    assert_eq!(extraction.decisions.len(), 2);
    for (_, reason) in extraction.discarded() {
        assert!(matches!(reason, DiscardReason::LowConfidence { .. }));
    }
}

#[test]
fn test_cancel_before_start() {
    let engine = ScriptedEngine::new(Script::Read);
    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline(engine.clone())
        .extract_with_cancel(&card_png(), "png", &token)
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Decode }));
    assert_eq!(engine.calls(), 0);
}

#[test]
fn test_cancel_during_recognition_discards_results() {
    let token = CancellationToken::new();
    let engine = Arc::new(ScriptedEngine {
        script: Script::Read,
        calls: AtomicUsize::new(0),
        cancel_on_call: Some(token.clone()),
    });

    let err = pipeline(engine.clone())
        .extract_with_cancel(&card_png(), "png", &token)
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Recognize }));
    // The second region is never started
    assert!(engine.calls() < 3);
}

#[test]
fn test_worker_pool_keeps_region_order() {
    let sequential = pipeline(ScriptedEngine::new(Script::Read))
        .extract(&card_png(), "png")
        .unwrap();

    let mut config = AppConfig::default();
    config.performance.workers = 3;
    let parallel = ExtractionPipeline::new(config, ScriptedEngine::new(Script::Read))
        .unwrap()
        .extract(&card_png(), "png")
        .unwrap();

    assert_eq!(parallel.accepted(), sequential.accepted());
    let indices: Vec<usize> = parallel.decisions.iter().map(|d| d.region_index).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted);
}

#[test]
fn test_debug_dir_receives_crops() {
    let dir = tempfile::tempdir().unwrap();
    let extraction = pipeline(ScriptedEngine::new(Script::Read))
        .with_debug_dir(dir.path())
        .extract(&card_png(), "png")
        .unwrap();

    let page = dir.path().join(format!("{}-page.png", extraction.invocation));
    assert!(page.exists());
    let crops = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .map(|e| e.file_name().to_string_lossy().contains("-region-"))
                .unwrap_or(false)
        })
        .count();
    assert_eq!(crops, 2);
}

#[test]
fn test_extraction_serializes_to_json() {
    let extraction = pipeline(ScriptedEngine::new(Script::Read))
        .extract(&card_png(), "png")
        .unwrap();
    let json = serde_json::to_value(&extraction).unwrap();

    assert_eq!(json["decisions"].as_array().map(Vec::len), Some(2));
    assert!(json["invocation"].is_string());
}
