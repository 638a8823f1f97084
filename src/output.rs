//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entry leads with what happened to a file (its name and where it
//! went), with the numbers shown as indented context lines underneath. A
//! run reads as an inventory of inputs rather than a log.
//!
//! # Output Format
//!
//! ## Single file
//!
//! ```text
//! photo.png → photo_compress_80.webp
//!     WEBP q80, 1600x1200 → 800x600
//!     2.0 MiB → 310.4 KiB (84.8% saved)
//! ```
//!
//! ## Multi-format
//!
//! ```text
//! photo.png (2 formats)
//!     001 WEBP → output/photo_compress_80.webp
//!         2.0 MiB → 310.4 KiB (84.8% saved)
//!     002 JPEG → output/photo_compress_80.jpg
//!         2.0 MiB → 402.0 KiB (80.4% saved)
//!     Best: WEBP
//! ```
//!
//! ## Directory
//!
//! ```text
//! photos/ → photos/compressed (shared executor)
//!     001 a.png → a_compress.webp
//!         120.0 KiB → 30.0 KiB (75.0% saved)
//!     002 icon.png (skipped)
//!         already compact, re-encoding would likely grow it
//! processed 2/2 files (100.0% success), saved 90.0 KiB
//! ```
//!
//! # Architecture
//!
//! Each result kind has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::compressor::ImageInfoReport;
use crate::types::{
    BatchResult, CompressionOutcome, CompressionResponse, CompressionResult, MultiFormatResult,
};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `"WEBP q80"`, or just the format name without a quality.
fn format_label(result: &CompressionResult) -> String {
    match result.quality_used {
        Some(q) => format!("{} q{}", result.format_used, q),
        None => result.format_used.clone(),
    }
}

fn dimensions_label(result: &CompressionResult) -> Option<String> {
    let (ow, oh) = result.original_dimensions?;
    match result.final_dimensions {
        Some((fw, fh)) if result.was_resized => Some(format!("{ow}x{oh} → {fw}x{fh}")),
        _ => Some(format!("{ow}x{oh}")),
    }
}

/// Context lines for one result, at `depth`.
fn result_details(result: &CompressionResult, depth: usize) -> Vec<String> {
    let pad = indent(depth);
    if !result.success {
        return vec![format!(
            "{pad}Error: {}",
            result.error.as_deref().unwrap_or("unknown error")
        )];
    }
    if result.is_skipped() {
        let reason = result
            .error
            .as_deref()
            .map(|e| e.trim_start_matches("skipped: "))
            .unwrap_or("left untouched");
        return vec![format!("{pad}{reason}")];
    }
    let mut lines = Vec::new();
    match dimensions_label(result) {
        Some(dims) => lines.push(format!("{pad}{}, {dims}", format_label(result))),
        None => lines.push(format!("{pad}{}", format_label(result))),
    }
    lines.push(format!("{pad}{}", result.summary()));
    lines
}

/// Header for one result: `"in → out"`, or the input with a status marker.
fn result_header(result: &CompressionResult) -> String {
    let input = file_name(&result.input_path);
    if !result.success {
        format!("{input} (failed)")
    } else if result.is_skipped() {
        format!("{input} (skipped)")
    } else {
        format!("{input} → {}", file_name(&result.output_path))
    }
}

// ============================================================================
// Compression results
// ============================================================================

pub fn format_single_result(result: &CompressionResult) -> Vec<String> {
    let mut lines = vec![result_header(result)];
    lines.extend(result_details(result, 1));
    lines
}

pub fn format_multi_format_result(result: &MultiFormatResult) -> Vec<String> {
    let input = file_name(&result.input_path);
    if result.results.is_empty() {
        return vec![
            format!("{input} (failed)"),
            format!(
                "    Error: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ),
        ];
    }

    let mut lines = vec![format!("{input} ({} formats)", result.results.len())];
    for (i, r) in result.results.iter().enumerate() {
        let status = if r.success {
            format!("→ {}", r.output_path.display())
        } else {
            "(failed)".to_string()
        };
        lines.push(format!("    {} {} {status}", format_index(i + 1), r.format_used));
        if r.success {
            lines.push(format!("        {}", r.summary()));
        } else {
            lines.extend(result_details(r, 2));
        }
    }
    if let Some(best) = result.best_result() {
        lines.push(format!("    Best: {}", best.format_used));
    }
    lines
}

pub fn format_batch_result(batch: &BatchResult) -> Vec<String> {
    let input = format!("{}/", batch.input_dir.display());
    let mut header = match &batch.output_dir {
        Some(out) if *out != batch.input_dir => format!("{input} → {}", out.display()),
        _ => input,
    };
    if let Some(executor) = batch.executor {
        header.push_str(&format!(" ({} executor)", executor.name()));
    }
    let mut lines = vec![header];

    for (i, r) in batch.results.iter().enumerate() {
        lines.push(format!("    {} {}", format_index(i + 1), result_header(r)));
        lines.extend(result_details(r, 2));
    }

    match (&batch.error, batch.results.is_empty()) {
        (Some(error), true) => lines.push(format!("    {error}")),
        _ => lines.push(batch.summary()),
    }
    lines
}

/// Dispatch on the outcome kind, then append the response-level error when
/// it adds something.
pub fn format_response(response: &CompressionResponse) -> Vec<String> {
    let mut lines = match &response.result {
        CompressionOutcome::Single(r) => format_single_result(r),
        CompressionOutcome::MultiFormat(m) => format_multi_format_result(m),
        CompressionOutcome::Batch(b) => format_batch_result(b),
    };
    if let Some(error) = &response.error
        && !response.success
        && !lines.iter().any(|l| l.contains(error.as_str()))
    {
        lines.push(format!("Error: {error}"));
    }
    lines
}

pub fn print_response(response: &CompressionResponse) {
    for line in format_response(response) {
        println!("{}", line);
    }
}

// ============================================================================
// Image info
// ============================================================================

pub fn format_image_info(report: &ImageInfoReport) -> Vec<String> {
    let mut lines = vec![file_name(&report.path)];
    lines.push(format!(
        "    {}, {}, {}x{} ({}), {}",
        report.format.name(),
        report.color_mode,
        report.width,
        report.height,
        serde_label(&report.orientation),
        report.human_size
    ));
    if report.is_animated {
        lines.push(format!("    Frames: {}", report.frame_count));
    }
    if report.has_transparency {
        lines.push("    Transparency: yes".to_string());
    }
    lines.push(format!("    Type: {}", report.image_type.name()));
    if let (Some(level), Some(metrics)) = (report.overall_complexity, report.complexity) {
        let hard = if report.hard_to_compress == Some(true) {
            ", hard to compress"
        } else {
            ""
        };
        lines.push(format!(
            "    Complexity: {} (difficulty {:.2}{hard})",
            level.name(),
            metrics.compression_difficulty
        ));
    }
    if let Some(b) = report.brightness {
        lines.push(format!(
            "    Brightness: mean {:.2}, dark {:.1}%, mid {:.1}%, bright {:.1}%",
            b.mean_brightness,
            b.dark_ratio * 100.0,
            b.mid_ratio * 100.0,
            b.bright_ratio * 100.0
        ));
    }
    if let Some(exif) = &report.exif {
        let camera = [exif.camera_make.as_deref(), exif.camera_model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !camera.is_empty() {
            lines.push(format!("    Camera: {camera}"));
        }
        if let Some(taken) = exif.datetime_original {
            lines.push(format!("    Taken: {taken}"));
        }
    }
    if let Some(icc) = &report.icc {
        lines.push(format!("    ICC: {} ({})", icc.description, icc.color_space));
    }
    let decision = &report.decision;
    let target = match (decision.recommended_format, decision.recommended_quality) {
        (Some(f), Some(q)) => format!(" → {} q{q}", f.name()),
        (Some(f), None) => format!(" → {}", f.name()),
        _ => String::new(),
    };
    lines.push(format!(
        "    Decision: {}{target} ({})",
        decision.strategy_type.name(),
        decision.reason
    ));
    lines
}

pub fn print_image_info(report: &ImageInfoReport) {
    for line in format_image_info(report) {
        println!("{}", line);
    }
}

/// Lower-case serde name of a unit enum.
fn serde_label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
