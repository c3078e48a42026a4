//! Fresnel parameters.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::resources::uniform_buffer::UniformBuffer;

/// Angle-dependent blend between `left_color` (grazing) and `right_color`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FresnelParameters {
    pub is_enabled: bool,
    pub left_color: Vec3,
    pub right_color: Vec3,
    pub bias: f32,
    pub power: f32,
}

impl Default for FresnelParameters {
    fn default() -> Self {
        Self {
            is_enabled: true,
            left_color: Vec3::ONE,
            right_color: Vec3::ZERO,
            bias: 0.0,
            power: 1.0,
        }
    }
}

impl FresnelParameters {
    /// `Some(self)` while enabled.
    #[must_use]
    pub fn active(params: Option<Self>) -> Option<Self> {
        params.filter(|p| p.is_enabled)
    }

    /// Writes `(left, power)` and `(right, bias)` into two vec4 entries.
    pub fn bind_colors(&self, ubo: &mut UniformBuffer, left: &str, right: &str) {
        ubo.update_vec4(left, self.left_color.extend(self.power));
        ubo.update_vec4(right, self.right_color.extend(self.bias));
    }

    /// Luminance-only variant used by opacity: `(left, right, bias, power)`.
    pub fn bind_parts(&self, ubo: &mut UniformBuffer, name: &str) {
        ubo.update_vec4(
            name,
            Vec4::new(
                luminance(self.left_color),
                luminance(self.right_color),
                self.bias,
                self.power,
            ),
        );
    }
}

#[inline]
fn luminance(color: Vec3) -> f32 {
    color.dot(Vec3::new(0.3, 0.59, 0.11))
}
