//! Image Processing Configuration
//!
//! Scene-wide color pipeline settings applied at the end of material shaders
//! (or by a post-process when `apply_by_post_process` is set):
//! - **Tone mapping**: standard or ACES curve
//! - **Exposure / contrast**
//! - **Vignette**: edge darkening with multiply or opaque blending
//! - **Color curves**: neutral-range hue / density / saturation / exposure
//! - **Color grading**: 2D or 3D lookup texture
//!
//! The configuration lives on the [`Scene`](crate::scene::Scene) behind a
//! version-tracked guard; materials re-derive the image-processing defines
//! whenever its version moves.

use glam::{Vec2, Vec4};

use crate::resources::capabilities::{CapabilityFlags, RenderCapabilities};
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::{UniformBuffer, UniformValue};

/// Tone mapping curve.
///
/// - [`Standard`](ToneMappingMode::Standard): Hable-style filmic curve
/// - [`Aces`](ToneMappingMode::Aces): ACES reference rendering transform fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToneMappingMode {
    #[default]
    Standard,
    Aces,
}

impl ToneMappingMode {
    /// Returns a human-readable name for the mode.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Aces => "ACES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VignetteBlendMode {
    #[default]
    Multiply,
    Opaque,
}

/// Neutral-range color curve adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCurves {
    pub global_hue: f32,
    pub global_density: f32,
    pub global_saturation: f32,
    pub global_exposure: f32,
}

impl Default for ColorCurves {
    fn default() -> Self {
        Self {
            global_hue: 30.0,
            global_density: 0.0,
            global_saturation: 0.0,
            global_exposure: 0.0,
        }
    }
}

/// Define keys owned by the image-processing concern, in declaration order.
pub const IMAGE_PROCESSING_DEFINES: &[&str] = &[
    "IMAGEPROCESSING",
    "VIGNETTE",
    "VIGNETTEBLENDMODEMULTIPLY",
    "VIGNETTEBLENDMODEOPAQUE",
    "TONEMAPPING",
    "TONEMAPPING_ACES",
    "CONTRAST",
    "EXPOSURE",
    "COLORCURVES",
    "COLORGRADING",
    "COLORGRADING3D",
    "SAMPLER3DGREENDEPTH",
    "SAMPLER3DBGRMAP",
    "DITHER",
    "IMAGEPROCESSINGPOSTPROCESS",
    "SKIPFINALCOLORCLAMP",
];

/// Image processing configuration.
///
/// # Usage
///
/// ```rust,ignore
/// let mut config = scene.image_processing_mut();
/// config.set_exposure(1.5);
/// config.tone_mapping = Some(ToneMappingMode::Aces);
/// // dropping the guard invalidates IMAGE_PROCESSING defines of every submesh
/// ```
#[derive(Debug, Clone)]
pub struct ImageProcessingConfiguration {
    pub enabled: bool,
    pub apply_by_post_process: bool,

    /// `None` disables tone mapping.
    pub tone_mapping: Option<ToneMappingMode>,
    exposure: f32,
    contrast: f32,

    pub vignette_enabled: bool,
    pub vignette_blend_mode: VignetteBlendMode,
    pub vignette_weight: f32,
    pub vignette_stretch: f32,
    pub vignette_center: Vec2,
    pub vignette_color: Vec4,

    pub color_curves: Option<ColorCurves>,

    pub color_grading_enabled: bool,
    pub color_grading_texture: Option<TextureRef>,
    pub color_grading_with_green_depth: bool,
    pub color_grading_bgr: bool,
    pub color_grading_level: f32,

    pub dithering_enabled: bool,
    pub dithering_intensity: f32,
    pub skip_final_color_clamp: bool,
}

impl Default for ImageProcessingConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            apply_by_post_process: false,
            tone_mapping: None,
            exposure: 1.0,
            contrast: 1.0,
            vignette_enabled: false,
            vignette_blend_mode: VignetteBlendMode::Multiply,
            vignette_weight: 1.5,
            vignette_stretch: 0.0,
            vignette_center: Vec2::ZERO,
            vignette_color: Vec4::new(0.0, 0.0, 0.0, 0.0),
            color_curves: None,
            color_grading_enabled: false,
            color_grading_texture: None,
            color_grading_with_green_depth: true,
            color_grading_bgr: true,
            color_grading_level: 1.0,
            dithering_enabled: false,
            dithering_intensity: 1.0 / 255.0,
            skip_final_color_clamp: false,
        }
    }
}

impl ImageProcessingConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    pub fn set_contrast(&mut self, contrast: f32) {
        self.contrast = contrast;
    }

    #[inline]
    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    #[inline]
    #[must_use]
    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    /// Color grading is requested and allowed by the capability switch.
    #[must_use]
    pub fn uses_color_grading(&self, capabilities: &RenderCapabilities) -> bool {
        self.color_grading_enabled
            && self.color_grading_texture.is_some()
            && capabilities.is_enabled(CapabilityFlags::COLOR_GRADING_TEXTURE)
    }

    /// Registers every image-processing define key.
    pub fn register_defines(builder: &mut DefineSetBuilder) {
        builder.flags(IMAGE_PROCESSING_DEFINES, DirtyFlags::IMAGE_PROCESSING);
    }

    /// The color grading texture, when used, must be resident.
    #[must_use]
    pub fn is_ready(&self, capabilities: &RenderCapabilities) -> bool {
        if !self.uses_color_grading(capabilities) {
            return true;
        }
        self.color_grading_texture
            .as_ref()
            .is_none_or(|tex| tex.is_ready())
    }

    /// Writes the image-processing defines.
    ///
    /// When the pipeline runs in a post-process (or is disabled) every
    /// in-shader stage is switched off.
    pub fn prepare_defines(
        &self,
        defines: &mut DefineSet,
        capabilities: &RenderCapabilities,
        for_post_process: bool,
    ) {
        if for_post_process != self.apply_by_post_process || !self.enabled {
            for name in IMAGE_PROCESSING_DEFINES {
                defines.set_if_registered(name, false);
            }
            defines.set_if_registered("SKIPFINALCOLORCLAMP", self.skip_final_color_clamp);
            defines.set_if_registered(
                "IMAGEPROCESSINGPOSTPROCESS",
                self.apply_by_post_process && self.enabled,
            );
            return;
        }

        let vignette = self.vignette_enabled;
        let tone_mapping = self.tone_mapping.is_some();
        let contrast = self.contrast != 1.0;
        let exposure = self.exposure != 1.0;
        let curves = self.color_curves.is_some();
        let grading = self.uses_color_grading(capabilities);
        let grading_3d = grading
            && self
                .color_grading_texture
                .as_ref()
                .is_some_and(|tex| tex.is_3d);

        defines.set_if_registered("VIGNETTE", vignette);
        defines.set_if_registered(
            "VIGNETTEBLENDMODEMULTIPLY",
            self.vignette_blend_mode == VignetteBlendMode::Multiply,
        );
        defines.set_if_registered(
            "VIGNETTEBLENDMODEOPAQUE",
            self.vignette_blend_mode == VignetteBlendMode::Opaque,
        );
        defines.set_if_registered("TONEMAPPING", tone_mapping);
        defines.set_if_registered(
            "TONEMAPPING_ACES",
            self.tone_mapping == Some(ToneMappingMode::Aces),
        );
        defines.set_if_registered("CONTRAST", contrast);
        defines.set_if_registered("EXPOSURE", exposure);
        defines.set_if_registered("COLORCURVES", curves);
        defines.set_if_registered("COLORGRADING", grading);
        defines.set_if_registered("COLORGRADING3D", grading_3d);
        defines.set_if_registered("SAMPLER3DGREENDEPTH", self.color_grading_with_green_depth);
        defines.set_if_registered("SAMPLER3DBGRMAP", self.color_grading_bgr);
        defines.set_if_registered("IMAGEPROCESSINGPOSTPROCESS", self.apply_by_post_process);
        defines.set_if_registered("SKIPFINALCOLORCLAMP", self.skip_final_color_clamp);
        defines.set_if_registered("DITHER", self.dithering_enabled);
        defines.set_if_registered(
            "IMAGEPROCESSING",
            vignette || tone_mapping || contrast || exposure || curves || grading,
        );
    }

    /// Uniform and sampler names used by the image-processing stage.
    pub fn collect_interface(uniforms: &mut Vec<&'static str>, samplers: &mut Vec<&'static str>) {
        uniforms.extend_from_slice(&[
            "exposureLinear",
            "contrast",
            "vignetteSettings1",
            "vignetteSettings2",
            "vCameraColorCurveNeutral",
            "colorTransformSettings",
            "ditherIntensity",
        ]);
        samplers.push("txColorTransform");
    }

    /// Sends the image-processing values for the bound program.
    pub fn bind(&self, defines: &DefineSet, ubo: &mut UniformBuffer) {
        if !defines.is_set("IMAGEPROCESSING") && !defines.is_set("DITHER") {
            return;
        }

        ubo.set_uniform("exposureLinear", UniformValue::Float(self.exposure));
        ubo.set_uniform("contrast", UniformValue::Float(self.contrast));

        if self.vignette_enabled {
            let scale = 1.0 + self.vignette_stretch;
            ubo.set_uniform(
                "vignetteSettings1",
                UniformValue::Vec4(Vec4::new(
                    scale,
                    scale,
                    -self.vignette_center.x,
                    -self.vignette_center.y,
                )),
            );
            let color = self.vignette_color;
            let premultiplied = color.truncate() * color.w;
            ubo.set_uniform(
                "vignetteSettings2",
                UniformValue::Vec4(premultiplied.extend(self.vignette_weight)),
            );
        }

        if let Some(curves) = self.color_curves {
            ubo.set_uniform(
                "vCameraColorCurveNeutral",
                UniformValue::Vec4(Vec4::new(
                    curves.global_hue,
                    curves.global_density,
                    curves.global_saturation,
                    curves.global_exposure,
                )),
            );
        }

        if defines.is_set("COLORGRADING") {
            ubo.set_texture("txColorTransform", self.color_grading_texture.as_ref());
            ubo.set_uniform(
                "colorTransformSettings",
                UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, self.color_grading_level)),
            );
        }

        if self.dithering_enabled {
            ubo.set_uniform("ditherIntensity", UniformValue::Float(self.dithering_intensity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::texture::Texture;

    fn defines() -> DefineSet {
        let mut b = DefineSet::builder();
        ImageProcessingConfiguration::register_defines(&mut b);
        b.build()
    }

    #[test]
    fn test_exposure_enables_image_processing() {
        let caps = RenderCapabilities::default();
        let mut defines = defines();
        let mut config = ImageProcessingConfiguration::new();

        config.prepare_defines(&mut defines, &caps, false);
        assert!(!defines.is_set("IMAGEPROCESSING"));

        config.set_exposure(1.5);
        config.prepare_defines(&mut defines, &caps, false);
        assert!(defines.is_set("EXPOSURE"));
        assert!(defines.is_set("IMAGEPROCESSING"));
    }

    #[test]
    fn test_post_process_disables_in_shader_stage() {
        let caps = RenderCapabilities::default();
        let mut defines = defines();
        let mut config = ImageProcessingConfiguration::new();
        config.tone_mapping = Some(ToneMappingMode::Aces);
        config.apply_by_post_process = true;

        config.prepare_defines(&mut defines, &caps, false);
        assert!(!defines.is_set("TONEMAPPING"));
        assert!(defines.is_set("IMAGEPROCESSINGPOSTPROCESS"));
    }

    #[test]
    fn test_color_grading_gated_by_capability() {
        let caps = RenderCapabilities::default();
        let mut defines = defines();
        let mut lut = Texture::pending("lut");
        lut.is_3d = true;
        let mut config = ImageProcessingConfiguration::new();
        config.color_grading_enabled = true;
        config.color_grading_texture = Some(lut.into_ref());

        assert!(!config.is_ready(&caps));
        config.prepare_defines(&mut defines, &caps, false);
        assert!(defines.is_set("COLORGRADING3D"));

        caps.set(CapabilityFlags::COLOR_GRADING_TEXTURE, false);
        assert!(config.is_ready(&caps));
        config.prepare_defines(&mut defines, &caps, false);
        assert!(!defines.is_set("COLORGRADING"));
        assert!(!defines.is_set("COLORGRADING3D"));
    }
}
