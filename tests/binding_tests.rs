//! Uniform Binding Tests
//!
//! Tests for:
//! - bind_for_sub_mesh: material and per-frame tiers, frozen shortcuts
//! - Camera moves and program switches on frozen materials
//! - Block layout alignment
//! - Loose-uniform mode when blocks are unavailable
//! - Sampler and clip plane binding

mod common;

use std::sync::Arc;

use glam::{Affine3A, Mat4, Vec3, Vec4};

use myth_shading::resources::UniformValue;
use myth_shading::{Mesh, RendererSettings, Scene, StandardProfile, Texture};

use common::{bind, check, material, renderer, renderer_with};

// ============================================================================
// Tiers
// ============================================================================

#[test]
fn bind_before_resolution_does_nothing() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    bind(&mut renderer, &scene, &mut mat, &mesh);
    assert_eq!(mat.stats().material_binds, 0);
    assert_eq!(renderer.backend().stats().block_uploads, 0);
}

#[test]
fn first_bind_writes_every_tier() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let texture = Texture::new("albedo").into_ref();
    let mut mat = material(&renderer, StandardProfile::default());
    mat.profile_mut().set_diffuse_texture(Some(Arc::clone(&texture)));

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    bind(&mut renderer, &scene, &mut mat, &mesh);

    assert_eq!(mat.stats().material_binds, 1);
    assert_eq!(mat.stats().frame_binds, 1);

    let effect = mat.current_effect(&mesh, 0).unwrap();
    let program = renderer.effects().program(effect).unwrap();
    let backend = renderer.backend();
    assert_eq!(backend.uniform(program, "world"), Some(&UniformValue::Mat4(Mat4::IDENTITY)));
    assert_eq!(backend.bound_texture(program, "diffuseSampler"), Some(Some(texture.uuid)));
    assert_eq!(backend.stats().block_uploads, 1);
    assert_eq!(backend.stats().block_binds, 1);

    let block = backend.block_contents(mat.uniform_buffer().id()).unwrap();
    assert_eq!(block.len(), mat.uniform_buffer().byte_len());
}

#[test]
fn unfrozen_material_rebinds_every_call() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    bind(&mut renderer, &scene, &mut mat, &mesh);
    bind(&mut renderer, &scene, &mut mat, &mesh);
    assert_eq!(mat.stats().material_binds, 2);
    assert_eq!(mat.stats().frame_binds, 2);
    // Unchanged values are not uploaded again.
    assert_eq!(renderer.backend().stats().block_uploads, 1);
}

#[test]
fn frozen_material_skips_both_tiers_while_nothing_moves() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    bind(&mut renderer, &scene, &mut mat, &mesh);
    mat.freeze();
    bind(&mut renderer, &scene, &mut mat, &mesh);
    bind(&mut renderer, &scene, &mut mat, &mesh);
    assert_eq!(mat.stats().material_binds, 1);
    assert_eq!(mat.stats().frame_binds, 1);

    // A value edit reaches the frozen block on the next bind.
    mat.profile_mut().set_diffuse_color(Vec3::new(1.0, 0.0, 0.0));
    bind(&mut renderer, &scene, &mut mat, &mesh);
    assert_eq!(mat.stats().material_binds, 2);
    assert_eq!(mat.uniform_buffer().read("vDiffuseColor"), Some(&[1.0, 0.0, 0.0, 1.0][..]));
    assert_eq!(renderer.backend().stats().block_uploads, 2);
}

#[test]
fn camera_move_reaches_frozen_material() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    bind(&mut renderer, &scene, &mut mat, &mesh);
    mat.freeze();

    scene
        .camera
        .update_view_projection(&Affine3A::from_translation(Vec3::new(0.0, 0.0, 10.0)));
    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    bind(&mut renderer, &scene, &mut mat, &mesh);

    assert_eq!(mat.stats().material_binds, 1);
    assert_eq!(mat.stats().frame_binds, 2);

    let effect = mat.current_effect(&mesh, 0).unwrap();
    let program = renderer.effects().program(effect).unwrap();
    let backend = renderer.backend();
    assert_eq!(
        backend.uniform(program, "view"),
        Some(&UniformValue::Mat4(scene.camera.view_matrix()))
    );
    assert_eq!(
        backend.uniform(program, "viewProjection"),
        Some(&UniformValue::Mat4(scene.camera.view_projection_matrix()))
    );
    assert_eq!(
        backend.uniform(program, "vEyePosition"),
        Some(&UniformValue::Vec4(Vec4::new(0.0, 0.0, 10.0, 1.0)))
    );

    // Nothing moved since: both tiers stay skipped.
    bind(&mut renderer, &scene, &mut mat, &mesh);
    assert_eq!(mat.stats().frame_binds, 2);
}

#[test]
fn program_switch_rebinds_frozen_material() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let plain = Mesh::new("plain");
    let mut stretched = Mesh::new("stretched");
    stretched.state_mut().non_uniform_scaling = true;
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &plain));
    assert!(check(&mut renderer, &scene, &mut mat, &stretched));
    assert_ne!(mat.current_effect(&plain, 0), mat.current_effect(&stretched, 0));
    mat.freeze();

    bind(&mut renderer, &scene, &mut mat, &plain);
    bind(&mut renderer, &scene, &mut mat, &stretched);
    bind(&mut renderer, &scene, &mut mat, &plain);
    assert_eq!(mat.stats().material_binds, 3);
    assert_eq!(mat.stats().frame_binds, 3);

    // Same program twice in a row keeps the frozen shortcut.
    bind(&mut renderer, &scene, &mut mat, &plain);
    assert_eq!(mat.stats().material_binds, 3);
}

#[test]
fn settings_edit_forces_rebind_of_frozen_material() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    bind(&mut renderer, &scene, &mut mat, &mesh);
    mat.freeze();

    mat.set_point_size(4.0);
    bind(&mut renderer, &scene, &mut mat, &mesh);
    assert_eq!(mat.stats().material_binds, 2);
    assert_eq!(mat.uniform_buffer().read("pointSize"), Some(&[4.0][..]));
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn block_layout_is_std140_aligned() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    let ubo = mat.uniform_buffer();
    assert!(ubo.use_ubo());
    assert_eq!(ubo.byte_len() % 16, 0);
    for name in ubo.uniform_names() {
        let size = ubo.read(name).unwrap().len();
        let offset = ubo.offset_of(name).unwrap();
        let alignment = if size <= 2 { size } else { 4 };
        assert_eq!(offset % alignment, 0, "`{name}` ({size} floats) at {offset}");
    }
    assert!(ubo.contains("vDiffuseInfos"));
    assert!(ubo.contains("diffuseMatrix"));
}

#[test]
fn loose_uniforms_without_block_support() {
    let mut renderer = renderer_with(RendererSettings {
        use_uniform_buffers: false,
        ..RendererSettings::default()
    });
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(!mat.uniform_buffer().use_ubo());

    mat.freeze();
    bind(&mut renderer, &scene, &mut mat, &mesh);
    bind(&mut renderer, &scene, &mut mat, &mesh);
    // Without a block the frozen shortcut never applies.
    assert_eq!(mat.stats().material_binds, 2);

    let effect = mat.current_effect(&mesh, 0).unwrap();
    let program = renderer.effects().program(effect).unwrap();
    let backend = renderer.backend();
    assert_eq!(backend.stats().block_uploads, 0);
    assert_eq!(backend.uniform(program, "pointSize"), Some(&UniformValue::Float(1.0)));

    let source = backend.compiled_sources().last().unwrap();
    assert!(source.uniform_blocks.is_empty());
    assert!(source.uniforms.iter().any(|u| u == "vDiffuseColor"));
}

#[test]
fn clip_planes_reach_the_program() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let plane = Vec4::new(0.0, 1.0, 0.0, -2.0);
    scene.environment_mut().clip_planes[0] = Some(plane);
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("CLIPPLANE"));
    bind(&mut renderer, &scene, &mut mat, &mesh);

    let effect = mat.current_effect(&mesh, 0).unwrap();
    let program = renderer.effects().program(effect).unwrap();
    assert_eq!(
        renderer.backend().uniform(program, "vClipPlane"),
        Some(&UniformValue::Vec4(plane))
    );
}
