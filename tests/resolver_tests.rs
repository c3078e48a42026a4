//! Readiness Resolution Tests
//!
//! Tests for:
//! - is_ready_for_sub_mesh: define passes, effect requests, render-id shortcut
//! - Frozen materials and the dirty-concern rules
//! - Texture readiness gating
//! - Capability broadcasts across materials
//! - Effect sharing between identical permutations
//! - Light define truncation

mod common;

use std::sync::Arc;

use glam::Vec3;

use myth_shading::resources::material::TransparencyMode;
use myth_shading::scene::Light;
use myth_shading::{CapabilityFlags, DirtyFlags, Mesh, Scene, StandardProfile, Texture};

use common::{check, check_until_ready, material, renderer};

// ============================================================================
// First resolution
// ============================================================================

#[test]
fn first_check_compiles_one_program() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(renderer.effects().len(), 1);
    assert_eq!(renderer.backend().stats().programs_compiled, 1);
    assert_eq!(mat.sub_mesh_count(), 1);

    let defines = mat.sub_mesh_defines(&mesh, 0).unwrap();
    assert!(!defines.is_dirty());
    assert!(!defines.is_set("DIFFUSE"));
}

#[test]
fn same_frame_check_takes_the_shortcut() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(mat.stats().define_passes, 1);

    // A new frame re-runs preparation, but clean defines request nothing.
    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(mat.stats().define_passes, 2);
    assert_eq!(mat.stats().effect_requests, 1);
}

#[test]
fn frozen_material_skips_define_work() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    mat.freeze();

    for _ in 0..3 {
        scene.advance_frame();
        assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    }
    assert_eq!(mat.stats().define_passes, 1);

    mat.unfreeze();
    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(mat.stats().define_passes, 2);
}

// ============================================================================
// Dirty concerns
// ============================================================================

#[test]
fn uniform_only_edit_leaves_defines_clean() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    mat.profile_mut().set_specular_power(12.0);
    assert!(!mat.sub_mesh_defines(&mesh, 0).unwrap().is_dirty());

    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));
    let defines = mat.sub_mesh_defines(&mesh, 0).unwrap();
    assert!(defines.is_concern_dirty(DirtyFlags::TEXTURES));
    assert!(!defines.is_concern_dirty(DirtyFlags::LIGHTS));
}

#[test]
fn culling_switch_recomputes_two_sided_lighting() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mesh = Mesh::new("leaf");
    let mut mat = material(&renderer, StandardProfile::default());
    mat.profile_mut().set_two_sided_lighting(true);

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(!mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("TWOSIDEDLIGHTING"));

    mat.set_back_face_culling(false);
    assert!(mat.sub_mesh_defines(&mesh, 0).unwrap().is_concern_dirty(DirtyFlags::TEXTURES));

    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("TWOSIDEDLIGHTING"));

    // Setting the same value again leaves the defines clean.
    mat.set_back_face_culling(false);
    assert!(!mat.sub_mesh_defines(&mesh, 0).unwrap().is_dirty());
}

#[test]
fn texture_edit_switches_effect() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    let plain = mat.current_effect(&mesh, 0).unwrap();

    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    let textured = mat.current_effect(&mesh, 0).unwrap();
    assert_ne!(plain, textured);
    assert!(mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("DIFFUSE"));
    assert_eq!(renderer.effects().len(), 2);

    let source = renderer.backend().compiled_sources().last().unwrap();
    assert!(source.samplers.iter().any(|s| s == "diffuseSampler"));
    assert!(source.vertex.contains("uniform sampler2D diffuseSampler;"));
}

#[test]
fn alpha_cut_off_is_written_as_float_literal() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("leaves");
    let mut mat = renderer
        .material_builder(StandardProfile::default())
        .transparency_mode(TransparencyMode::AlphaTest)
        .alpha_cut_off(1.0)
        .build(renderer.shaders())
        .unwrap();

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    let defines = mat.sub_mesh_defines(&mesh, 0).unwrap();
    assert!(defines.is_set("ALPHATEST"));
    assert_eq!(defines.string("ALPHATESTVALUE"), Some("1."));

    let source = renderer.backend().compiled_sources().last().unwrap();
    assert!(source.defines.contains("#define ALPHATESTVALUE 1.\n"));
    assert!(source.fragment.contains("const float cutoff = 1.;"));
}

// ============================================================================
// Texture readiness
// ============================================================================

#[test]
fn blocking_texture_holds_the_submesh_back() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let texture = Texture::pending("streamed").into_ref();

    let mut mat = material(&renderer, StandardProfile::default());
    mat.profile_mut().set_diffuse_texture(Some(Arc::clone(&texture)));

    assert!(!check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(renderer.effects().is_empty());

    scene.advance_frame();
    assert!(!check(&mut renderer, &scene, &mut mat, &mesh));

    texture.mark_ready();
    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("DIFFUSE"));
}

// ============================================================================
// Sharing and broadcasts
// ============================================================================

#[test]
fn identical_permutations_share_one_effect() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let first_mesh = Mesh::new("a");
    let second_mesh = Mesh::new("b");
    let mut first = material(&renderer, StandardProfile::default());
    let mut second = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut first, &first_mesh));
    assert!(check(&mut renderer, &scene, &mut second, &second_mesh));

    assert_eq!(
        first.current_effect(&first_mesh, 0),
        second.current_effect(&second_mesh, 0)
    );
    assert_eq!(
        first.sub_mesh_defines(&first_mesh, 0).unwrap().serialize(),
        second.sub_mesh_defines(&second_mesh, 0).unwrap().serialize()
    );
    assert_eq!(renderer.backend().stats().programs_compiled, 1);
}

#[test]
fn capability_switch_reaches_every_material() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let meshes = [Mesh::new("a"), Mesh::new("b")];
    let mut materials = [
        material(&renderer, StandardProfile::default()),
        material(&renderer, StandardProfile::default()),
    ];

    for (mat, mesh) in materials.iter_mut().zip(&meshes) {
        mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));
        assert!(check(&mut renderer, &scene, mat, mesh));
        assert!(mat.sub_mesh_defines(mesh, 0).unwrap().is_set("DIFFUSE"));
    }
    assert_eq!(renderer.capabilities().subscriber_count(), 2);

    renderer.capabilities().set(CapabilityFlags::DIFFUSE_TEXTURE, false);

    for (mat, mesh) in materials.iter_mut().zip(&meshes) {
        assert!(mat.sub_mesh_defines(mesh, 0).unwrap().is_concern_dirty(DirtyFlags::TEXTURES));
        // Same render id: dirt alone defeats the shortcut.
        assert!(check(&mut renderer, &scene, mat, mesh));
        assert!(!mat.sub_mesh_defines(mesh, 0).unwrap().is_set("DIFFUSE"));
        assert!(!mat.sub_mesh_defines(mesh, 0).unwrap().is_dirty());
    }

    // Flipping back to the original value does not clean the sets again.
    renderer.capabilities().set(CapabilityFlags::DIFFUSE_TEXTURE, true);
    renderer.capabilities().set(CapabilityFlags::DIFFUSE_TEXTURE, false);
    for (mat, mesh) in materials.iter().zip(&meshes) {
        let defines = mat.sub_mesh_defines(mesh, 0).unwrap();
        assert!(defines.is_dirty());
        assert!(defines.is_concern_dirty(DirtyFlags::TEXTURES));
    }
}

#[test]
fn dropped_materials_leave_the_broadcast_list() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    {
        let mut mat = material(&renderer, StandardProfile::default());
        assert!(check(&mut renderer, &scene, &mut mat, &mesh));
        assert_eq!(renderer.capabilities().subscriber_count(), 1);
    }
    assert_eq!(renderer.capabilities().subscriber_count(), 0);
}

// ============================================================================
// Lights
// ============================================================================

#[test]
fn lights_are_truncated_to_the_material_limit() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    for _ in 0..6 {
        scene.add_light(Light::new_point(Vec3::ONE, 1.0, 10.0));
    }
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check_until_ready(&mut renderer, &mut scene, &mut mat, &mesh, 2));
    let defines = mat.sub_mesh_defines(&mesh, 0).unwrap();
    for index in 0..4 {
        assert!(defines.is_set(&format!("LIGHT{index}")), "LIGHT{index}");
        assert!(defines.is_set(&format!("POINTLIGHT{index}")), "POINTLIGHT{index}");
    }
    assert!(!defines.contains("LIGHT4"));

    mat.set_max_simultaneous_lights(2);
    assert_eq!(mat.sub_mesh_count(), 0);
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    let defines = mat.sub_mesh_defines(&mesh, 0).unwrap();
    assert!(defines.is_set("LIGHT1"));
    assert!(!defines.contains("LIGHT2"));
}

#[test]
fn removing_lights_clears_their_defines() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    scene.add_light(Light::new_directional(Vec3::ONE, 1.0));
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("LIGHT0"));

    scene.lights_mut().clear();
    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(!mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("LIGHT0"));
}
