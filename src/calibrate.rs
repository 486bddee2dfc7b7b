//! Target calibration: positioning the proxy handle over the live target.
//!
//! The proxy element the gesture engine manipulates lives in the overlay,
//! so its offset must reproduce the live element's rendered position across
//! nested offset parents, scroll, and fixed-position layout. Fixed targets
//! are the asymmetric case: selecting one pins the mask's own layout, and
//! the scroll correction must only be applied when the mask is *not* pinned
//! — otherwise it would be double-counted.

#[cfg(test)]
#[path = "calibrate_test.rs"]
mod calibrate_test;

use crate::dom::{ContentDoc, TargetMode};
use crate::error::StageError;
use crate::geom::Rect;
use crate::mask::MaskLayer;

/// A calibrated proxy box: the id the proxy element should carry and the
/// overlay offset that visually aligns it with the live target.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedBox {
    pub id: String,
    pub rect: Rect,
}

/// Compute the proxy box for `target_id`, prefixing the proxy id with
/// `id_prefix`.
///
/// The element's document position is resolved by accumulating the
/// offset-parent chain. Absolute and flow targets scroll together with the
/// mask, so their document position is already the overlay position. Fixed
/// targets are anchored to the viewport instead: when the mask is in its
/// normal scrollable layout the current scroll offset is added so the proxy
/// tracks the viewport-anchored element, and when the mask layout is pinned
/// (fixed mode) no correction applies.
///
/// # Errors
///
/// Returns [`StageError::NotFound`] when the target is not in the document.
pub fn update(
    doc: &ContentDoc,
    mask: &MaskLayer,
    target_id: &str,
    id_prefix: &str,
) -> Result<CalibratedBox, StageError> {
    let mode = doc
        .target_mode(target_id)
        .ok_or_else(|| StageError::NotFound(target_id.to_owned()))?;
    let abs = doc
        .absolute_rect(target_id)
        .ok_or_else(|| StageError::NotFound(target_id.to_owned()))?;

    let rect = match mode {
        TargetMode::Fixed if !mask.is_fixed_layout() => {
            let scroll = mask.scroll();
            abs.translated(scroll.x, scroll.y)
        }
        TargetMode::Fixed | TargetMode::Absolute | TargetMode::Sortable => abs,
    };

    Ok(CalibratedBox { id: format!("{id_prefix}{target_id}"), rect })
}
