//! Reflection-mode dispatch.
//!
//! | Coordinates mode                 | Define enabled                                  |
//! |----------------------------------|-------------------------------------------------|
//! | `Explicit`                       | `REFLECTIONMAP_EXPLICIT`                        |
//! | `Planar`                         | `REFLECTIONMAP_PLANAR`                          |
//! | `Projection`                     | `REFLECTIONMAP_PROJECTION`                      |
//! | `Skybox`                         | `REFLECTIONMAP_SKYBOX`                          |
//! | `Spherical`                      | `REFLECTIONMAP_SPHERICAL`                       |
//! | `Equirectangular`                | `REFLECTIONMAP_EQUIRECTANGULAR`                 |
//! | `FixedEquirectangular`           | `REFLECTIONMAP_EQUIRECTANGULAR_FIXED`           |
//! | `FixedEquirectangularMirrored`   | `REFLECTIONMAP_MIRROREDEQUIRECTANGULAR_FIXED`   |
//! | `Cubic`, `InverseCubic`, legacy  | `REFLECTIONMAP_CUBIC`                           |

use crate::resources::shader_defines::{DefineSet, DefineSetBuilder, DirtyFlags};
use crate::resources::texture::{CoordinatesMode, Texture};

pub const REFLECTION_MODE_DEFINES: [&str; 9] = [
    "REFLECTIONMAP_CUBIC",
    "REFLECTIONMAP_EXPLICIT",
    "REFLECTIONMAP_PLANAR",
    "REFLECTIONMAP_PROJECTION",
    "REFLECTIONMAP_SKYBOX",
    "REFLECTIONMAP_SPHERICAL",
    "REFLECTIONMAP_EQUIRECTANGULAR",
    "REFLECTIONMAP_EQUIRECTANGULAR_FIXED",
    "REFLECTIONMAP_MIRROREDEQUIRECTANGULAR_FIXED",
];

const REFLECTION_TRAIT_DEFINES: [&str; 8] = [
    "INVERTCUBICMAP",
    "REFLECTIONMAP_3D",
    "REFLECTIONMAP_OPPOSITEZ",
    "USE_LOCAL_REFLECTIONMAP_CUBIC",
    "LODINREFLECTIONALPHA",
    "GAMMAREFLECTION",
    "RGBDREFLECTION",
    "LINEARSPECULARREFLECTION",
];

pub fn register_defines(builder: &mut DefineSetBuilder) {
    builder.flags(&REFLECTION_MODE_DEFINES, DirtyFlags::TEXTURES);
    builder.flags(&REFLECTION_TRAIT_DEFINES, DirtyFlags::TEXTURES);
}

#[must_use]
pub fn reflection_mode_define(mode: CoordinatesMode) -> &'static str {
    match mode {
        CoordinatesMode::Explicit => "REFLECTIONMAP_EXPLICIT",
        CoordinatesMode::Planar => "REFLECTIONMAP_PLANAR",
        CoordinatesMode::Projection => "REFLECTIONMAP_PROJECTION",
        CoordinatesMode::Skybox => "REFLECTIONMAP_SKYBOX",
        CoordinatesMode::Spherical => "REFLECTIONMAP_SPHERICAL",
        CoordinatesMode::Equirectangular => "REFLECTIONMAP_EQUIRECTANGULAR",
        CoordinatesMode::FixedEquirectangular => "REFLECTIONMAP_EQUIRECTANGULAR_FIXED",
        CoordinatesMode::FixedEquirectangularMirrored => {
            "REFLECTIONMAP_MIRROREDEQUIRECTANGULAR_FIXED"
        }
        CoordinatesMode::Cubic | CoordinatesMode::InverseCubic | CoordinatesMode::Legacy(_) => {
            "REFLECTIONMAP_CUBIC"
        }
    }
}

/// Enables exactly one reflection-mode define.
pub fn apply_reflection_mode(defines: &mut DefineSet, mode: CoordinatesMode) {
    let active = reflection_mode_define(mode);
    for name in REFLECTION_MODE_DEFINES {
        defines.set_if_registered(name, name == active);
    }
    defines.set_if_registered("INVERTCUBICMAP", mode == CoordinatesMode::InverseCubic);
}

/// Every reflection define derived from `texture`; all cleared when `None`.
pub fn prepare_reflection_defines(defines: &mut DefineSet, texture: Option<&Texture>, right_handed: bool) {
    let Some(tex) = texture else {
        for name in REFLECTION_MODE_DEFINES.iter().chain(&REFLECTION_TRAIT_DEFINES) {
            defines.set_if_registered(name, false);
        }
        return;
    };

    apply_reflection_mode(defines, tex.coordinates_mode);
    let opposite_z = if tex.is_cube && right_handed {
        !tex.invert_z
    } else {
        tex.invert_z
    };
    defines.set_if_registered("REFLECTIONMAP_3D", tex.is_cube);
    defines.set_if_registered("REFLECTIONMAP_OPPOSITEZ", opposite_z);
    defines.set_if_registered("USE_LOCAL_REFLECTIONMAP_CUBIC", tex.bounding_box_size.is_some());
    defines.set_if_registered("LODINREFLECTIONALPHA", tex.lod_generation_in_alpha);
    defines.set_if_registered("GAMMAREFLECTION", tex.gamma_space);
    defines.set_if_registered("RGBDREFLECTION", tex.is_rgbd);
    defines.set_if_registered("LINEARSPECULARREFLECTION", tex.linear_specular_lod);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defines() -> DefineSet {
        let mut b = DefineSet::builder();
        register_defines(&mut b);
        b.build()
    }

    fn enabled_modes(defines: &DefineSet) -> Vec<&'static str> {
        REFLECTION_MODE_DEFINES
            .into_iter()
            .filter(|name| defines.is_set(name))
            .collect()
    }

    #[test]
    fn test_exactly_one_mode_per_coordinates_mode() {
        let mut defines = defines();
        for mode in CoordinatesMode::ALL {
            apply_reflection_mode(&mut defines, mode);
            assert_eq!(enabled_modes(&defines), vec![reflection_mode_define(mode)]);
        }
    }

    #[test]
    fn test_inverse_cubic_sets_invert_flag() {
        let mut defines = defines();
        apply_reflection_mode(&mut defines, CoordinatesMode::InverseCubic);
        assert_eq!(enabled_modes(&defines), vec!["REFLECTIONMAP_CUBIC"]);
        assert!(defines.is_set("INVERTCUBICMAP"));

        apply_reflection_mode(&mut defines, CoordinatesMode::Cubic);
        assert!(!defines.is_set("INVERTCUBICMAP"));
    }

    #[test]
    fn test_legacy_mode_maps_to_cubic() {
        let mut defines = defines();
        apply_reflection_mode(&mut defines, CoordinatesMode::from_raw(42));
        assert_eq!(enabled_modes(&defines), vec!["REFLECTIONMAP_CUBIC"]);
    }

    #[test]
    fn test_right_handed_flips_opposite_z() {
        let mut defines = defines();
        let tex = Texture::new_cube("env");
        prepare_reflection_defines(&mut defines, Some(&tex), true);
        assert!(defines.is_set("REFLECTIONMAP_3D"));
        assert!(defines.is_set("REFLECTIONMAP_OPPOSITEZ"));

        prepare_reflection_defines(&mut defines, Some(&tex), false);
        assert!(!defines.is_set("REFLECTIONMAP_OPPOSITEZ"));

        prepare_reflection_defines(&mut defines, None, false);
        assert!(enabled_modes(&defines).is_empty());
    }
}
