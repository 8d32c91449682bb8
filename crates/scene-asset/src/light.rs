use std::f32::consts::FRAC_PI_4;

use crate::index::DependencyKey;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot {
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    },
}

impl LightKind {
    pub fn spot(inner_cone_angle: Option<f32>, outer_cone_angle: Option<f32>) -> Self {
        LightKind::Spot {
            inner_cone_angle: inner_cone_angle.unwrap_or(0.0),
            outer_cone_angle: outer_cone_angle.unwrap_or(FRAC_PI_4),
        }
    }
}

/// A punctual light from KHR_lights_punctual.
#[derive(Debug, Clone)]
pub struct LightAsset {
    pub id: DependencyKey,
    pub name: String,
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    /// `None` means unlimited range.
    pub range: Option<f32>,
    pub decay: f32,
}

impl LightAsset {
    /// Spot cone angle and the fraction of it that is attenuated.
    pub fn spot_angle_penumbra(&self) -> Option<(f32, f32)> {
        match self.kind {
            LightKind::Spot {
                inner_cone_angle,
                outer_cone_angle,
            } => {
                let penumbra = if outer_cone_angle > 0.0 {
                    1.0 - inner_cone_angle / outer_cone_angle
                } else {
                    0.0
                };
                Some((outer_cone_angle, penumbra))
            }
            _ => None,
        }
    }
}
