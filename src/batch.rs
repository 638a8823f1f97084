//! Directory driver.
//!
//! Collects image files under a directory, then runs the engine over them
//! on a rayon pool. Each file writes to its own relative location under the
//! output directory, so workers never contend for a path.
//!
//! ## Executor choice
//!
//! | Condition | Executor | Pool |
//! |---|---|---|
//! | more than `isolation_file_count` files, or average above `isolation_avg_mb` | [`ExecutorKind::Isolated`] | capped at the file count, one job per file |
//! | otherwise | [`ExecutorKind::Shared`] | rayon splits freely |
//!
//! Both pools are sized by [`effective_threads`].

use crate::codec::{Codec, supported_input_extensions};
use crate::config::{EngineConfig, ProcessingConfig, effective_threads};
use crate::engine::CompressionEngine;
use crate::types::{BatchResult, CompressOptions, CompressionResult, ExecutorKind};
use crate::validation::ConfigBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &["output", ".venv", "node_modules", ".git", "__pycache__"];

const MB: f64 = 1024.0 * 1024.0;

pub struct BatchProcessor<'a> {
    config: &'a EngineConfig,
    codec: &'a dyn Codec,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(config: &'a EngineConfig, codec: &'a dyn Codec) -> Self {
        Self { config, codec }
    }

    /// Compress every image under `input_dir` to one format (or the
    /// strategy's pick when `format` is `None`).
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        format: Option<&str>,
        options: &CompressOptions,
        recursive: bool,
    ) -> BatchResult {
        let builder = ConfigBuilder::new(self.config, self.codec);
        // Fail once up front instead of once per file.
        if let Err(e) = builder.build(input_dir, None, output_dir, format, options) {
            return BatchResult::failed(input_dir, e.to_string());
        }
        let (output_dir, files) = match self.prepare(input_dir, output_dir, recursive) {
            Ok(prepared) => prepared,
            Err(failed) => return failed,
        };
        if files.is_empty() {
            return empty(input_dir, output_dir);
        }

        let executor = choose_executor(&files, &self.config.processing);
        let results = match self.run(input_dir, &output_dir, &files, format, options, executor) {
            Ok(results) => results,
            Err(e) => return BatchResult::failed(input_dir, e),
        };
        finish(input_dir, output_dir, executor, results)
    }

    /// Compress every image under `input_dir` once per format and merge the
    /// results into one batch.
    pub fn process_directory_multi(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        formats: &[String],
        options: &CompressOptions,
        recursive: bool,
    ) -> BatchResult {
        let builder = ConfigBuilder::new(self.config, self.codec);
        let formats = match builder.validate_and_normalize_formats(formats) {
            Ok(formats) => formats,
            Err(e) => return BatchResult::failed(input_dir, e.to_string()),
        };
        if let Err(e) = builder.build(input_dir, None, output_dir, None, options) {
            return BatchResult::failed(input_dir, e.to_string());
        }
        // Collect once: later runs must not pick up earlier runs' outputs.
        let (output_dir, files) = match self.prepare(input_dir, output_dir, recursive) {
            Ok(prepared) => prepared,
            Err(failed) => return failed,
        };
        if files.is_empty() {
            return empty(input_dir, output_dir);
        }

        let executor = choose_executor(&files, &self.config.processing);
        let mut merged = Vec::with_capacity(files.len() * formats.len());
        let mut failed_formats = Vec::new();
        for format in formats {
            match self.run(input_dir, &output_dir, &files, Some(format.name()), options, executor) {
                Ok(results) => {
                    if !results.iter().any(|r| r.success) {
                        failed_formats.push(format);
                    }
                    merged.extend(results);
                }
                Err(e) => {
                    warn!(format = format.name(), "Format run failed: {e}");
                    failed_formats.push(format);
                }
            }
        }

        let mut batch = finish(input_dir, output_dir, executor, merged);
        if !failed_formats.is_empty() {
            batch.success = false;
            batch.error = Some("some formats failed".to_string());
        }
        batch
    }

    /// Resolve and create the output directory, then collect inputs.
    fn prepare(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        recursive: bool,
    ) -> Result<(PathBuf, Vec<PathBuf>), BatchResult> {
        if !input_dir.is_dir() {
            return Err(BatchResult::failed(
                input_dir,
                format!("{} is not a directory", input_dir.display()),
            ));
        }
        let output_dir = match output_dir {
            Some(dir) => {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    return Err(BatchResult::failed(
                        input_dir,
                        format!("cannot create {}: {e}", dir.display()),
                    ));
                }
                dir.to_path_buf()
            }
            None => input_dir.to_path_buf(),
        };
        let files = collect_images(input_dir, Some(&output_dir), recursive);
        info!(dir = %input_dir.display(), count = files.len(), "Collected images");
        Ok((output_dir, files))
    }

    fn run(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        files: &[PathBuf],
        format: Option<&str>,
        options: &CompressOptions,
        executor: ExecutorKind,
    ) -> Result<Vec<CompressionResult>, String> {
        let threads = match executor {
            ExecutorKind::Isolated => effective_threads(&self.config.processing).min(files.len()),
            ExecutorKind::Shared => effective_threads(&self.config.processing),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map_err(|e| format!("cannot start worker pool: {e}"))?;
        info!(
            executor = executor.name(),
            threads,
            format = format.unwrap_or("auto"),
            files = files.len(),
            "Processing directory"
        );

        let builder = ConfigBuilder::new(self.config, self.codec);
        let engine = CompressionEngine::new(self.config, self.codec);
        let process_one = |path: &PathBuf| {
            let relative = path
                .parent()
                .and_then(|p| p.strip_prefix(input_dir).ok())
                .unwrap_or(Path::new(""));
            let file_output_dir = output_dir.join(relative);
            match builder.build(path, None, Some(&file_output_dir), format, options) {
                Ok(request) => engine.process(&request),
                Err(e) => {
                    e.log(path);
                    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                    CompressionResult::failed(path, &file_output_dir, size, e.to_string())
                }
            }
        };

        Ok(pool.install(|| match executor {
            ExecutorKind::Isolated => files.par_iter().with_max_len(1).map(process_one).collect(),
            ExecutorKind::Shared => files.par_iter().map(process_one).collect(),
        }))
    }
}

fn empty(input_dir: &Path, output_dir: PathBuf) -> BatchResult {
    warn!(dir = %input_dir.display(), "No image files found");
    BatchResult {
        success: true,
        error: Some("no image files found".to_string()),
        input_dir: input_dir.to_path_buf(),
        output_dir: Some(output_dir),
        executor: None,
        results: Vec::new(),
    }
}

fn finish(
    input_dir: &Path,
    output_dir: PathBuf,
    executor: ExecutorKind,
    results: Vec<CompressionResult>,
) -> BatchResult {
    let success = results.iter().any(|r| r.success);
    let batch = BatchResult {
        success,
        error: (!success).then(|| "all files failed".to_string()),
        input_dir: input_dir.to_path_buf(),
        output_dir: Some(output_dir),
        executor: Some(executor),
        results,
    };
    info!("{}", batch.summary());
    batch
}

/// Image files under `input_dir`, sorted.
///
/// Only the top level is read unless `recursive`. Tooling directories and
/// an output directory nested inside the input are never descended into.
pub fn collect_images(input_dir: &Path, output_dir: Option<&Path>, recursive: bool) -> Vec<PathBuf> {
    let nested_output = output_dir.filter(|out| *out != input_dir && out.starts_with(input_dir));
    let extensions = supported_input_extensions();

    let mut walker = WalkDir::new(input_dir).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }
    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if nested_output.is_some_and(|out| entry.path().starts_with(out)) {
                return false;
            }
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_dir() && EXCLUDED_DIRS.iter().any(|d| *d == name))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .is_some_and(|e| extensions.iter().any(|x| *x == e))
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub fn choose_executor(files: &[PathBuf], processing: &ProcessingConfig) -> ExecutorKind {
    if files.len() > processing.isolation_file_count {
        return ExecutorKind::Isolated;
    }
    let total: u64 = files
        .iter()
        .filter_map(|f| std::fs::metadata(f).ok())
        .map(|m| m.len())
        .sum();
    let average_mb = if files.is_empty() {
        0.0
    } else {
        total as f64 / files.len() as f64 / MB
    };
    if average_mb > processing.isolation_avg_mb {
        ExecutorKind::Isolated
    } else {
        ExecutorKind::Shared
    }
}
