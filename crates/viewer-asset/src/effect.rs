//! Data derived from the descriptor without any I/O: ambient effects,
//! effect parameter ids and the model layout.

use std::collections::BTreeMap;

use glam::{Mat4, Vec2, Vec3};

use crate::descriptor::ModelDescriptor;

pub const PARAM_ANGLE_X: &str = "ParamAngleX";
pub const PARAM_ANGLE_Y: &str = "ParamAngleY";
pub const PARAM_ANGLE_Z: &str = "ParamAngleZ";
pub const PARAM_BODY_ANGLE_X: &str = "ParamBodyAngleX";
pub const PARAM_BREATH: &str = "ParamBreath";

#[derive(Debug, Clone, PartialEq)]
pub struct BreathParameter {
    pub parameter_id: String,
    pub offset: f32,
    pub peak: f32,
    pub cycle: f32,
    pub weight: f32,
}

impl BreathParameter {
    fn new(parameter_id: &str, offset: f32, peak: f32, cycle: f32, weight: f32) -> Self {
        Self {
            parameter_id: parameter_id.to_owned(),
            offset,
            peak,
            cycle,
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EyeBlink {
    pub parameter_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientEffects {
    pub eye_blink: Option<EyeBlink>,
    pub breath: Vec<BreathParameter>,
}

impl AmbientEffects {
    pub fn from_descriptor(descriptor: &ModelDescriptor) -> Self {
        let eye_blink = if descriptor.eye_blink_ids().is_empty() {
            None
        } else {
            Some(EyeBlink {
                parameter_ids: descriptor.eye_blink_ids().to_vec(),
            })
        };

        Self {
            eye_blink,
            breath: vec![
                BreathParameter::new(PARAM_ANGLE_X, 0.0, 15.0, 6.5345, 0.5),
                BreathParameter::new(PARAM_ANGLE_Y, 0.0, 8.0, 3.5345, 0.5),
                BreathParameter::new(PARAM_ANGLE_Z, 0.0, 10.0, 5.5345, 0.5),
                BreathParameter::new(PARAM_BODY_ANGLE_X, 0.0, 4.0, 15.5345, 0.5),
                BreathParameter::new(PARAM_BREATH, 0.0, 0.5, 3.2345, 0.5),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterIds {
    pub eye_blink: Vec<String>,
    pub lip_sync: Vec<String>,
}

impl ParameterIds {
    pub fn from_descriptor(descriptor: &ModelDescriptor) -> Self {
        Self {
            eye_blink: descriptor.eye_blink_ids().to_vec(),
            lip_sync: descriptor.lip_sync_ids().to_vec(),
        }
    }
}

/// Placement of the model in logical view space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelLayout {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub center_x: Option<f32>,
    pub center_y: Option<f32>,
    pub top: Option<f32>,
    pub bottom: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
}

const DEFAULT_VIEW_HEIGHT: f32 = 2.0;

impl ModelLayout {
    /// Keys match case- and underscore-insensitively, so `CenterX` and
    /// `center_x` are the same key. Unknown keys are ignored.
    pub fn from_map(map: &BTreeMap<String, f32>) -> Self {
        let mut layout = Self::default();
        for (key, value) in map {
            let normalized: String = key
                .chars()
                .filter(|c| *c != '_')
                .map(|c| c.to_ascii_lowercase())
                .collect();
            let slot = match normalized.as_str() {
                "width" => &mut layout.width,
                "height" => &mut layout.height,
                "x" => &mut layout.x,
                "y" => &mut layout.y,
                "centerx" => &mut layout.center_x,
                "centery" => &mut layout.center_y,
                "top" => &mut layout.top,
                "bottom" => &mut layout.bottom,
                "left" => &mut layout.left,
                "right" => &mut layout.right,
                _ => continue,
            };
            *slot = Some(*value);
        }
        layout
    }

    /// Model matrix for a model whose canvas measures `canvas` units.
    ///
    /// Scale is uniform and comes from `width` or `height` (height wins when
    /// both are set, default height 2.0); positions are applied afterwards
    /// against the scaled size.
    pub fn model_matrix(&self, canvas: Vec2) -> Mat4 {
        let scale_for = |target: f32, extent: f32| {
            if extent > 0.0 {
                target / extent
            } else {
                1.0
            }
        };

        let mut scale = scale_for(DEFAULT_VIEW_HEIGHT, canvas.y);
        if let Some(width) = self.width {
            scale = scale_for(width, canvas.x);
        }
        if let Some(height) = self.height {
            scale = scale_for(height, canvas.y);
        }

        let size = canvas * scale;
        let mut translation = Vec2::ZERO;
        if let Some(x) = self.x {
            translation.x = x;
        }
        if let Some(y) = self.y {
            translation.y = y;
        }
        if let Some(center_x) = self.center_x {
            translation.x = center_x - size.x / 2.0;
        }
        if let Some(center_y) = self.center_y {
            translation.y = center_y - size.y / 2.0;
        }
        if let Some(top) = self.top {
            translation.y = top;
        }
        if let Some(bottom) = self.bottom {
            translation.y = bottom - size.y;
        }
        if let Some(left) = self.left {
            translation.x = left;
        }
        if let Some(right) = self.right {
            translation.x = right - size.x;
        }

        Mat4::from_translation(translation.extend(0.0)) * Mat4::from_scale(Vec3::new(scale, scale, 1.0))
    }
}
