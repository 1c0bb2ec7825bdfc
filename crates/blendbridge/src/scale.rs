//! Automatic scaling of freshly imported nodes.
//!
//! Imported scenes arrive in arbitrary units; this pass clamps them into the
//! printable range. All nodes of one file are scaled by the same averaged
//! factor so their relative proportions survive.

use crate::host::BoundingBox;

/// Smallest printable feature size, in millimeters.
pub const MIN_FEATURE_SIZE: f64 = 5.0;

/// Share of the build volume height a node may occupy.
pub const HEIGHT_SHARE: f64 = 0.99;

/// Share of each footprint side the printable area spans.
pub const FOOTPRINT_SHARE: f64 = 0.7;

/// Which clamp fired (the last one, when several did).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleAdvisory {
    TooSmall,
    TooHigh,
    TooBroad,
}

/// The factor applied to every node plus the advisory to surface, if any.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleOutcome {
    pub factor: f64,
    pub advisory: Option<ScaleAdvisory>,
}

impl ScaleOutcome {
    pub fn is_noop(&self) -> bool {
        self.factor == 1.0
    }
}

/// Footprint divisor for a node count.
///
/// The host places imported objects on a fixed grid it does not let us
/// reposition, so the per-object footprint budget shrinks in grid tiers:
/// 1, 3x3, 5x5, 7x7, 9x9. Above 81 objects no footprint clamp applies.
pub fn footprint_divisor(count: usize) -> Option<u32> {
    match count {
        0 => None,
        1 => Some(1),
        2..=9 => Some(3),
        10..=25 => Some(5),
        26..=49 => Some(7),
        50..=81 => Some(9),
        _ => None,
    }
}

/// Computes the common scale factor for the nodes of one file.
///
/// Per node, three clamps run in sequence on the running factor: minimum
/// feature size, maximum height, maximum footprint. The footprint condition
/// tests the smaller footprint side but corrects by the larger one, so an
/// elongated object ends up strictly inside its cell rather than on its
/// boundary. The per-node factors are then averaged.
pub fn normalize(boxes: &[BoundingBox], volume: BoundingBox) -> ScaleOutcome {
    if boxes.is_empty() {
        return ScaleOutcome {
            factor: 1.0,
            advisory: None,
        };
    }

    let printable_height = HEIGHT_SHARE * volume.height;
    let print_area = (FOOTPRINT_SHARE * volume.width).min(FOOTPRINT_SHARE * volume.depth);
    let divisor = footprint_divisor(boxes.len());

    let mut advisory = None;
    let mut factors = Vec::with_capacity(boxes.len());
    for bbox in boxes {
        let area = bbox.footprint_min();
        let mut factor = 1.0_f64;

        // Degenerate (flat or empty) boxes cannot be fixed by scaling.
        let smallest = bbox.height.min(area);
        if smallest < MIN_FEATURE_SIZE && smallest != 0.0 {
            factor *= MIN_FEATURE_SIZE / (factor * smallest);
            advisory = Some(ScaleAdvisory::TooSmall);
        }

        if factor * bbox.height > printable_height {
            factor *= printable_height / (factor * bbox.height);
            advisory = Some(ScaleAdvisory::TooHigh);
        }

        if let Some(divisor) = divisor {
            let cell = print_area / f64::from(divisor);
            if factor * area > cell {
                factor *= cell / (factor * bbox.footprint_max());
                advisory = Some(ScaleAdvisory::TooBroad);
            }
        }

        factors.push(factor);
    }

    let factor = factors.iter().sum::<f64>() / factors.len() as f64;
    ScaleOutcome { factor, advisory }
}
