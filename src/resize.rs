//! Pure dimension math for the optional resize step.
//!
//! No I/O and no pixels here; the engine asks the codec to do the actual
//! resampling with whatever size this returns.

use crate::types::ResizeConfig;

/// Target dimensions for `current` under `bounds`, or `None` when the image
/// already fits.
///
/// A missing bound means "keep the current size on that axis". With
/// `maintain_aspect_ratio` both axes scale by the tighter ratio and are
/// truncated; each stays at least 1 pixel.
///
/// ```
/// # use pixsqueeze::resize::fit_within;
/// # use pixsqueeze::types::ResizeConfig;
/// let bounds = ResizeConfig::new(Some(800), None).unwrap();
/// assert_eq!(fit_within((1600, 1200), &bounds), Some((800, 600)));
/// assert_eq!(fit_within((640, 480), &bounds), None);
/// ```
pub fn fit_within(current: (u32, u32), bounds: &ResizeConfig) -> Option<(u32, u32)> {
    let (w, h) = current;
    if w == 0 || h == 0 {
        return None;
    }
    let max_w = bounds.max_width.unwrap_or(w);
    let max_h = bounds.max_height.unwrap_or(h);
    if w <= max_w && h <= max_h {
        return None;
    }

    let (mut new_w, mut new_h) = if bounds.maintain_aspect_ratio {
        let ratio = (f64::from(max_w) / f64::from(w)).min(f64::from(max_h) / f64::from(h));
        (
            ((f64::from(w) * ratio) as u32).max(1),
            ((f64::from(h) * ratio) as u32).max(1),
        )
    } else {
        (w.min(max_w), h.min(max_h))
    };

    if !bounds.upscale_allowed {
        new_w = new_w.min(w);
        new_h = new_h.min(h);
    }
    Some((new_w, new_h))
}
