//! Define Preparation
//!
//! Each submodule owns one subset of a submesh's defines: it registers the
//! keys it writes and recomputes them from scene, mesh and material state.
//! Passes only run while their concern is dirty, except the frame-bound,
//! multiview and OIT passes which run on every check and mark the set
//! unprocessed when anything changed.

pub mod attributes;
pub mod frame_bound;
pub mod lights;
pub mod misc;
pub mod multiview;
pub mod oit;
pub mod prepass;
pub mod reflection;
pub mod textures;

use crate::resources::image_processing::ImageProcessingConfiguration;
use crate::resources::shader_defines::DefineSetBuilder;

/// Registers every define shared by all profiles, in serialization order.
pub fn register_common_defines(builder: &mut DefineSetBuilder, max_lights: u32) {
    lights::register_defines(builder, max_lights);
    misc::register_defines(builder);
    frame_bound::register_defines(builder);
    attributes::register_defines(builder);
    multiview::register_defines(builder);
    prepass::register_defines(builder);
    oit::register_defines(builder);
    ImageProcessingConfiguration::register_defines(builder);
}
