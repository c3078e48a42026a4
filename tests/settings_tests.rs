//! Renderer Settings Tests
//!
//! Tests for:
//! - RendererSettings JSON loading with defaults
//! - Capability settings applied at renderer creation
//! - Legacy refraction-intensity alias
//! - Define determinism across renderers

mod common;

use anyhow::Result;

use myth_shading::resources::CapabilitySettings;
use myth_shading::{
    CapabilityFlags, Mesh, RenderCapabilities, RendererSettings, Scene, StandardProfile, Texture,
};

use common::{check, material, renderer, renderer_with};

#[test]
fn partial_json_keeps_defaults() -> Result<()> {
    let settings = RendererSettings::from_json(r#"{ "max_hot_swap_frames": 5 }"#)?;
    assert_eq!(settings.max_hot_swap_frames, 5);
    assert!(settings.use_uniform_buffers);
    assert!(!settings.check_ready_on_every_call);
    assert!(!settings.capabilities.legacy_refraction_intensity_alias);

    let reparsed = RendererSettings::from_json(&settings.to_json()?)?;
    assert_eq!(reparsed, settings);
    Ok(())
}

#[test]
fn malformed_json_is_an_error() {
    assert!(RendererSettings::from_json("{ not json").is_err());
}

#[test]
fn initial_capabilities_come_from_settings() {
    let mut enabled = CapabilityFlags::all();
    enabled.remove(CapabilityFlags::DIFFUSE_TEXTURE);
    let mut renderer = renderer_with(RendererSettings {
        capabilities: CapabilitySettings {
            enabled,
            ..CapabilitySettings::default()
        },
        ..RendererSettings::default()
    });
    assert!(!renderer.capabilities().is_enabled(CapabilityFlags::DIFFUSE_TEXTURE));

    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(!mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("DIFFUSE"));
}

#[test]
fn refraction_intensity_alias_follows_thickness() {
    let mut enabled = CapabilityFlags::all();
    enabled.remove(CapabilityFlags::THICKNESS_TEXTURE);

    let plain = RenderCapabilities::new(&CapabilitySettings {
        enabled,
        legacy_refraction_intensity_alias: false,
    });
    assert!(plain.is_enabled(CapabilityFlags::REFRACTION_INTENSITY_TEXTURE));

    let aliased = RenderCapabilities::new(&CapabilitySettings {
        enabled,
        legacy_refraction_intensity_alias: true,
    });
    assert!(!aliased.is_enabled(CapabilityFlags::REFRACTION_INTENSITY_TEXTURE));
}

#[test]
fn identical_inputs_serialize_identically_across_renderers() {
    let serialize = || {
        let mut renderer = renderer();
        let scene = Scene::new();
        let mesh = Mesh::new("box");
        let mut mat = material(&renderer, StandardProfile::default());
        mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));
        assert!(check(&mut renderer, &scene, &mut mat, &mesh));
        mat.sub_mesh_defines(&mesh, 0).unwrap().serialize()
    };
    let first = serialize();
    assert!(first.contains("#define DIFFUSE\n"));
    assert_eq!(first, serialize());
}
