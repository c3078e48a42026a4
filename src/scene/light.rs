use glam::Vec3;
use uuid::Uuid;

use crate::resources::texture::TextureRef;

/// Shadow map filtering technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowFilter {
    None,
    Esm,
    CloseEsm,
    Poisson,
    #[default]
    Pcf,
    Pcss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowQuality {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct ShadowConfig {
    pub bias: f32,
    pub normal_bias: f32,
    pub map_size: u32,
    pub filter: ShadowFilter,
    pub quality: ShadowQuality,
    pub darkness: f32,
    /// Shadow generation found at least one caster this frame.
    pub has_casters: bool,
    /// Rendered shadow map, once the generator produced one.
    pub map: Option<TextureRef>,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            bias: 0.005,
            normal_bias: 0.02,
            map_size: 1024,
            filter: ShadowFilter::Pcf,
            quality: ShadowQuality::Medium,
            darkness: 0.0,
            has_casters: true,
            map: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub direction: Vec3,
}

#[derive(Debug, Clone)]
pub struct PointLight {
    pub range: f32,
}

#[derive(Debug, Clone)]
pub struct SpotLight {
    pub direction: Vec3,
    pub range: f32,
    pub inner_cone: f32,
    pub outer_cone: f32,
}

#[derive(Debug, Clone)]
pub struct HemisphericLight {
    pub direction: Vec3,
    pub ground_color: Vec3,
}

#[derive(Debug, Clone)]
pub enum LightKind {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
    Hemispheric(HemisphericLight),
}

/// Attenuation model over distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightFalloff {
    /// Left to the material's lighting model.
    #[default]
    Default,
    Physical,
    Gltf,
    Standard,
}

/// How a light interacts with baked lightmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightmapMode {
    /// Contributes fully on top of the lightmap.
    #[default]
    Default,
    /// Contributes specular only; diffuse is baked.
    Specular,
    /// Only casts shadows; fully baked otherwise.
    ShadowsOnly,
}

#[derive(Debug, Clone)]
pub struct Light {
    pub uuid: Uuid,
    pub name: String,
    pub enabled: bool,
    pub position: Vec3,
    pub color: Vec3,
    pub specular: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
    pub falloff: LightFalloff,

    pub cast_shadows: bool,
    pub shadow: Option<ShadowConfig>,

    pub lightmap_mode: LightmapMode,
    /// When non-empty, only these meshes are lit.
    pub included_only_meshes: Vec<Uuid>,
    pub excluded_meshes: Vec<Uuid>,
}

impl Light {
    fn with_kind(kind: LightKind, color: Vec3, intensity: f32) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: String::new(),
            enabled: true,
            position: Vec3::ZERO,
            color,
            specular: Vec3::ONE,
            intensity,
            kind,
            falloff: LightFalloff::Default,
            cast_shadows: false,
            shadow: None,
            lightmap_mode: LightmapMode::Default,
            included_only_meshes: Vec::new(),
            excluded_meshes: Vec::new(),
        }
    }

    #[must_use]
    pub fn new_directional(color: Vec3, intensity: f32) -> Self {
        Self::with_kind(
            LightKind::Directional(DirectionalLight {
                direction: Vec3::NEG_Y,
            }),
            color,
            intensity,
        )
    }

    #[must_use]
    pub fn new_point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self::with_kind(LightKind::Point(PointLight { range }), color, intensity)
    }

    #[must_use]
    pub fn new_spot(
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_cone: f32,
        outer_cone: f32,
    ) -> Self {
        Self::with_kind(
            LightKind::Spot(SpotLight {
                direction: Vec3::NEG_Y,
                range,
                inner_cone,
                outer_cone,
            }),
            color,
            intensity,
        )
    }

    #[must_use]
    pub fn new_hemispheric(color: Vec3, ground_color: Vec3, intensity: f32) -> Self {
        Self::with_kind(
            LightKind::Hemispheric(HemisphericLight {
                direction: Vec3::Y,
                ground_color,
            }),
            color,
            intensity,
        )
    }

    /// Enables shadow casting with the given configuration.
    #[must_use]
    pub fn with_shadows(mut self, shadow: ShadowConfig) -> Self {
        self.cast_shadows = true;
        self.shadow = Some(shadow);
        self
    }

    /// Shadow configuration, when this light currently produces shadows.
    #[must_use]
    pub fn active_shadow(&self) -> Option<&ShadowConfig> {
        if !self.cast_shadows {
            return None;
        }
        self.shadow.as_ref().filter(|s| s.has_casters)
    }

    /// Whether this light illuminates the mesh `mesh`.
    #[must_use]
    pub fn affects(&self, mesh: Uuid) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.included_only_meshes.is_empty() && !self.included_only_meshes.contains(&mesh) {
            return false;
        }
        !self.excluded_meshes.contains(&mesh)
    }

    /// Define prefix of this light type, e.g. `POINTLIGHT`.
    #[must_use]
    pub fn type_define(&self) -> &'static str {
        match self.kind {
            LightKind::Directional(_) => "DIRLIGHT",
            LightKind::Point(_) => "POINTLIGHT",
            LightKind::Spot(_) => "SPOTLIGHT",
            LightKind::Hemispheric(_) => "HEMILIGHT",
        }
    }

    #[must_use]
    pub fn is_point(&self) -> bool {
        matches!(self.kind, LightKind::Point(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_and_exclude_lists() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut light = Light::new_point(Vec3::ONE, 1.0, 10.0);
        assert!(light.affects(a));

        light.excluded_meshes.push(a);
        assert!(!light.affects(a));
        assert!(light.affects(b));

        light.included_only_meshes.push(a);
        assert!(!light.affects(b));
    }

    #[test]
    fn test_shadow_requires_casters() {
        let mut light = Light::new_directional(Vec3::ONE, 1.0).with_shadows(ShadowConfig::default());
        assert!(light.active_shadow().is_some());

        if let Some(shadow) = light.shadow.as_mut() {
            shadow.has_casters = false;
        }
        assert!(light.active_shadow().is_none());
    }
}
