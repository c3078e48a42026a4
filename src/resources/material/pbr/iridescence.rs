use glam::Vec4;

use super::PbrFeature;
use crate::impl_profile_api;
use crate::renderer::pipeline::FallbackChain;
use crate::resources::capabilities::CapabilityFlags;
use crate::resources::material::profile::{BindContext, PrepareContext, SlotDesc, fallback_if_set};
use crate::resources::material::standard::uv_slot;
use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::TextureRef;
use crate::resources::uniform_buffer::UniformBuffer;

static IRIDESCENCE_SLOT: SlotDesc = uv_slot(
    "IRIDESCENCE_TEXTURE",
    "IRIDESCENCE_TEXTUREDIRECTUV",
    CapabilityFlags::IRIDESCENCE_TEXTURE,
    "iridescenceSampler",
    "vIridescenceInfos",
    "iridescenceMatrix",
);
static IRIDESCENCE_THICKNESS_SLOT: SlotDesc = uv_slot(
    "IRIDESCENCE_THICKNESS_TEXTURE",
    "IRIDESCENCE_THICKNESS_TEXTUREDIRECTUV",
    CapabilityFlags::IRIDESCENCE_TEXTURE,
    "iridescenceThicknessSampler",
    "vIridescenceThicknessInfos",
    "iridescenceThicknessMatrix",
);

/// Thin-film interference.
#[derive(Debug, Clone)]
pub struct IridescenceFeature {
    is_enabled: bool,
    intensity: f32,
    index_of_refraction: f32,
    minimum_thickness: f32,
    maximum_thickness: f32,

    texture: Option<TextureRef>,
    thickness_texture: Option<TextureRef>,

    dirty: DirtyFlags,
}

impl Default for IridescenceFeature {
    fn default() -> Self {
        Self {
            is_enabled: false,
            intensity: 1.0,
            index_of_refraction: 1.3,
            minimum_thickness: 100.0,
            maximum_thickness: 400.0,
            texture: None,
            thickness_texture: None,
            dirty: DirtyFlags::empty(),
        }
    }
}

impl_profile_api!(
    IridescenceFeature,
    textures: [
        (texture,           IRIDESCENCE_SLOT,           "Intensity in red."),
        (thickness_texture, IRIDESCENCE_THICKNESS_SLOT, "Film thickness in green."),
    ],
    params: [
        (is_enabled,          bool, DirtyFlags::TEXTURES, "Enables the film."),
        (intensity,           f32,  DirtyFlags::empty(),  "Film intensity."),
        (index_of_refraction, f32,  DirtyFlags::empty(),  "Film index of refraction."),
        (minimum_thickness,   f32,  DirtyFlags::empty(),  "Thickness in nm at 0."),
        (maximum_thickness,   f32,  DirtyFlags::empty(),  "Thickness in nm at 1."),
    ]
);

impl PbrFeature for IridescenceFeature {
    fn register_defines(&self, builder: &mut DefineSetBuilder) {
        builder.flag("IRIDESCENCE", DirtyFlags::TEXTURES);
    }

    fn visit_slots(&self, visitor: &mut dyn FnMut(&'static SlotDesc, Option<&TextureRef>)) {
        if self.is_enabled {
            self.visit_slot_table(visitor);
        } else {
            self.visit_slot_table(&mut |desc, _| visitor(desc, None));
        }
    }

    fn prepare_defines(&self, defines: &mut DefineSet, _ctx: &PrepareContext<'_>) {
        defines.set("IRIDESCENCE", self.is_enabled);
    }

    fn build_uniform_layout(&self, ubo: &mut UniformBuffer) {
        ubo.add_uniform("vIridescenceParams", 4);
    }

    fn bind(&self, ubo: &mut UniformBuffer, ctx: &BindContext<'_>) {
        if ctx.defines.is_set("IRIDESCENCE") {
            ubo.update_vec4(
                "vIridescenceParams",
                Vec4::new(
                    self.intensity,
                    self.index_of_refraction,
                    self.minimum_thickness,
                    self.maximum_thickness,
                ),
            );
        }
    }

    fn add_fallbacks(&self, defines: &DefineSet, chain: &mut FallbackChain) {
        fallback_if_set(defines, chain, 1, "IRIDESCENCE");
    }

    fn take_dirty(&mut self) -> DirtyFlags {
        self.take_dirty_flags()
    }
}
