//! Zoom classification and fetch-range planning
//!
//! Containment checks run strictly before directional checks: a zoom-in that
//! still lands inside the tolerance-padded cache must never reach the
//! provider.

use serde::{Deserialize, Serialize};

use crate::range::TimeRange;

/// Possible types of zoom operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionZoomType {
    ZoomOut,
    ZoomIn,
    PanRight,
    PanLeft,
    Unknown,
}

/// What a display-range change requires from the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquisitionDecision {
    /// The padded display still sits inside the cache; nothing to fetch.
    CacheHit,
    /// A fetch over `range` is needed.
    Fetch {
        zoom: AcquisitionZoomType,
        range: TimeRange,
    },
}

/// Classify the operation from the old and new display ranges alone.
pub fn zoom_type(range: &TimeRange, old_range: &TimeRange) -> AcquisitionZoomType {
    if range.start() <= old_range.start() && old_range.end() <= range.end() {
        AcquisitionZoomType::ZoomOut
    } else if range.start() > old_range.start() && range.end() > old_range.end() {
        AcquisitionZoomType::PanRight
    } else if range.start() < old_range.start() && range.end() < old_range.end() {
        AcquisitionZoomType::PanLeft
    } else if range.start() > old_range.start() && range.end() < old_range.end() {
        AcquisitionZoomType::ZoomIn
    } else {
        AcquisitionZoomType::Unknown
    }
}

/// Decide whether `new_display` needs a fetch given the current cache, and
/// over what range.
///
/// The operation kind comes from the old/new display pair; the fetch extent
/// is computed against the cache. Pans extend the new display on the moving
/// edge only, so a pan always fetches strictly less than a full padded
/// refetch. A one-sided zoom-out whose cache still covers the anchored edge
/// fetches just the missing span (padded), keeping the merged cache
/// contiguous.
pub fn plan_acquisition(
    old_display: &TimeRange,
    new_display: &TimeRange,
    cached: Option<&TimeRange>,
    tolerance: f64,
) -> AcquisitionDecision {
    let padded = new_display.padded(tolerance);

    let Some(cached) = cached else {
        return AcquisitionDecision::Fetch {
            zoom: zoom_type(new_display, old_display),
            range: padded,
        };
    };

    if cached.contains(&padded) {
        return AcquisitionDecision::CacheHit;
    }
    if cached.contains(new_display) {
        // display fits but the tolerance margin has worn thin: refill it
        return AcquisitionDecision::Fetch {
            zoom: AcquisitionZoomType::ZoomIn,
            range: padded,
        };
    }

    let zoom = zoom_type(new_display, old_display);
    let margin = tolerance * new_display.width();
    let range = match zoom {
        AcquisitionZoomType::PanRight => new_display.extended_right(margin),
        AcquisitionZoomType::PanLeft => new_display.extended_left(margin),
        AcquisitionZoomType::ZoomOut => zoom_out_range(cached, new_display, padded, tolerance),
        AcquisitionZoomType::ZoomIn | AcquisitionZoomType::Unknown => padded,
    };
    AcquisitionDecision::Fetch { zoom, range }
}

/// Fetch range for a zoom-out. When the cache still covers one edge of the
/// new display, only the missing span (padded) is fetched; the union with
/// the cache then stays contiguous. A zoom-out past both cache edges falls
/// back to the full padded refetch.
fn zoom_out_range(
    cached: &TimeRange,
    new_display: &TimeRange,
    padded: TimeRange,
    tolerance: f64,
) -> TimeRange {
    let covers_leading = cached.start() <= new_display.start() && cached.end() > new_display.start();
    let covers_trailing = cached.end() >= new_display.end() && cached.start() < new_display.end();
    match (covers_leading, covers_trailing) {
        (true, false) => TimeRange::between(cached.end(), new_display.end()).padded(tolerance),
        (false, true) => TimeRange::between(new_display.start(), cached.start()).padded(tolerance),
        _ => padded,
    }
}
