//! Tesseract command-line backend
//!
//! Writes the region to a scratch PNG, runs the `tesseract` executable with
//! TSV output and reads word-level rows back. All scratch files live in a
//! temporary directory removed when the call returns, whatever the outcome.

use image::GrayImage;
use std::fs::File;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::{ProfileConfig, RecognizerSettings};
use crate::error::EngineError;

use super::ocr::{RecognitionResult, TextEngine};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TSV row level for a single word
const WORD_LEVEL: i32 = 5;

/// Tesseract executable wrapper
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    tessdata_dir: Option<String>,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn from_settings(settings: &RecognizerSettings) -> Self {
        Self {
            program: settings.tesseract_path.clone(),
            tessdata_dir: settings.tessdata_dir.clone(),
            language: settings.language.clone(),
            timeout: settings.timeout(),
        }
    }

    /// Check the executable runs; returns its version line
    pub fn probe(&self) -> Result<String, EngineError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Older releases print the version on stderr
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn run(&self, image: &GrayImage, profile: &ProfileConfig) -> Result<String, EngineError> {
        let workdir: TempDir = tempfile::Builder::new().prefix("recipe-scan-").tempdir()?;
        let input = workdir.path().join("region.png");
        image.save(&input)?;
        let output_base = workdir.path().join("region");
        let stderr_path = workdir.path().join("stderr.log");

        let mut command = Command::new(&self.program);
        command
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(profile.psm.to_string())
            .arg("--oem")
            .arg(profile.oem.to_string());
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(&stderr_path)?));

        let mut child = command.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let status = wait_with_deadline(&mut child, self.timeout)?;

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(EngineError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let tsv_path = output_base.with_extension("tsv");
        std::fs::read_to_string(&tsv_path)
            .map_err(|e| EngineError::Output(format!("failed to read {:?}: {}", tsv_path, e)))
    }
}

impl TextEngine for TesseractCli {
    fn recognize_text(
        &self,
        image: &GrayImage,
        profile: &ProfileConfig,
    ) -> Result<RecognitionResult, EngineError> {
        let tsv = self.run(image, profile)?;
        let result = parse_tsv(&tsv);
        debug!(
            "Tesseract psm {} recognized {} tokens",
            profile.psm,
            result.token_count()
        );
        Ok(result)
    }
}

/// Wait for the child, killing it once `timeout` has elapsed
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, EngineError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            warn!("Tesseract exceeded {:?}, killing pid {}", timeout, child.id());
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Timeout(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Parse Tesseract TSV output.
///
/// Fields: level, page_num, block_num, par_num, line_num, word_num, left, top,
/// width, height, conf, text. Only word rows with a non-negative confidence and
/// non-empty text count as tokens. Words on the same block/paragraph/line are
/// joined by spaces, lines by newlines.
pub fn parse_tsv(tsv: &str) -> RecognitionResult {
    let mut lines: Vec<String> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut confidences = Vec::new();

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].trim().parse().unwrap_or(-1);
        if level != WORD_LEVEL {
            continue;
        }
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }

        let key = (
            fields[2].trim().parse().unwrap_or(-1),
            fields[3].trim().parse().unwrap_or(-1),
            fields[4].trim().parse().unwrap_or(-1),
        );
        if current_key == Some(key) {
            if let Some(line) = lines.last_mut() {
                line.push(' ');
                line.push_str(text);
            }
        } else {
            current_key = Some(key);
            lines.push(text.to_string());
        }
        confidences.push(conf.min(100.0));
    }

    RecognitionResult::new(lines.join("\n"), confidences)
}
