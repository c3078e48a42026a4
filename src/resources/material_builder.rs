use std::sync::Arc;

use crate::errors::{MythError, Result};
use crate::renderer::pipeline::ShaderLibrary;
use crate::resources::capabilities::RenderCapabilities;
use crate::resources::material::{Material, MaterialProfile, MaterialSettings, TransparencyMode};

/// Builder for [`Material`]s of any profile.
///
/// Construction is the only place a material can fail: it needs the shared
/// capability configuration and a shader family the library knows about.
pub struct MaterialBuilder<P: MaterialProfile> {
    profile: P,
    name: Option<String>,
    settings: MaterialSettings,
    capabilities: Option<Arc<RenderCapabilities>>,
}

impl<P: MaterialProfile> MaterialBuilder<P> {
    pub fn new(profile: P) -> Self {
        Self {
            profile,
            name: None,
            settings: MaterialSettings::default(),
            capabilities: None,
        }
    }

    // --- Profile ---
    pub fn profile(mut self, f: impl FnOnce(&mut P)) -> Self { f(&mut self.profile); self }

    // --- Common Setters ---
    pub fn name(mut self, name: &str) -> Self { self.name = Some(name.to_string()); self }
    pub fn settings(mut self, settings: MaterialSettings) -> Self { self.settings = settings; self }
    pub fn alpha(mut self, alpha: f32) -> Self { self.settings.alpha = alpha; self }
    pub fn transparency_mode(mut self, mode: TransparencyMode) -> Self { self.settings.transparency_mode = Some(mode); self }
    pub fn alpha_cut_off(mut self, cut_off: f32) -> Self { self.settings.alpha_cut_off = cut_off; self }
    pub fn force_alpha_test(mut self, enabled: bool) -> Self { self.settings.force_alpha_test = enabled; self }
    pub fn point_size(mut self, size: f32) -> Self { self.settings.point_size = size; self }
    pub fn points_cloud(mut self, enabled: bool) -> Self { self.settings.points_cloud = enabled; self }
    pub fn fog_enabled(mut self, enabled: bool) -> Self { self.settings.fog_enabled = enabled; self }
    pub fn disable_lighting(mut self, disabled: bool) -> Self { self.settings.disable_lighting = disabled; self }
    pub fn max_simultaneous_lights(mut self, max: u32) -> Self { self.settings.max_simultaneous_lights = max; self }
    pub fn allow_shader_hot_swapping(mut self, allow: bool) -> Self { self.settings.allow_shader_hot_swapping = allow; self }
    pub fn use_logarithmic_depth(mut self, enabled: bool) -> Self { self.settings.use_logarithmic_depth = enabled; self }
    pub fn back_face_culling(mut self, enabled: bool) -> Self { self.settings.back_face_culling = enabled; self }
    pub fn capabilities(mut self, capabilities: Arc<RenderCapabilities>) -> Self { self.capabilities = Some(capabilities); self }

    /// Builds the material, checking its collaborators up front.
    pub fn build(self, shaders: &ShaderLibrary) -> Result<Material<P>> {
        let name = self
            .name
            .unwrap_or_else(|| self.profile.shader_name().to_string());

        let Some(capabilities) = self.capabilities else {
            return Err(MythError::MissingCapabilities(name));
        };

        let shader = self.profile.shader_name();
        if !shaders.contains(shader) {
            return Err(MythError::UnknownShader(shader.to_string()));
        }

        log::debug!("Material `{name}` built for shader family `{shader}`");
        Ok(Material::from_parts(name, self.profile, self.settings, capabilities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::pipeline::ShaderSource;
    use crate::resources::material::StandardProfile;

    #[test]
    fn test_build_requires_capabilities() {
        let mut shaders = ShaderLibrary::new().unwrap();
        shaders
            .register("default", ShaderSource::new("void main() {}", "void main() {}"))
            .unwrap();

        let err = MaterialBuilder::new(StandardProfile::default())
            .name("floor")
            .build(&shaders)
            .unwrap_err();
        assert!(matches!(err, MythError::MissingCapabilities(name) if name == "floor"));
    }

    #[test]
    fn test_build_rejects_unknown_shader() {
        let shaders = ShaderLibrary::new().unwrap();
        let err = MaterialBuilder::new(StandardProfile::default())
            .capabilities(Arc::new(RenderCapabilities::default()))
            .build(&shaders)
            .unwrap_err();
        assert!(matches!(err, MythError::UnknownShader(shader) if shader == "default"));
    }

    #[test]
    fn test_build_applies_settings() {
        let mut shaders = ShaderLibrary::new().unwrap();
        shaders
            .register("default", ShaderSource::new("void main() {}", "void main() {}"))
            .unwrap();

        let material = MaterialBuilder::new(StandardProfile::default())
            .capabilities(Arc::new(RenderCapabilities::default()))
            .alpha(0.5)
            .max_simultaneous_lights(2)
            .build(&shaders)
            .unwrap();
        assert_eq!(material.name, "default");
        assert!((material.settings().alpha - 0.5).abs() < f32::EPSILON);
        assert_eq!(material.settings().max_simultaneous_lights, 2);
    }
}
