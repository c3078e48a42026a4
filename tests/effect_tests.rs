//! Effect Compilation Tests
//!
//! Tests for:
//! - Fallback reduction when the backend rejects a permutation
//! - Error reporting (once per failed effect) and keeping the previous effect
//! - Hot swapping while a replacement compiles, and its frame cap
//! - Deferred shader sources
//! - Effect cache resets

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use myth_shading::resources::material::TransparencyMode;
use myth_shading::{
    EffectStatus, HeadlessBackend, Mesh, Renderer, RendererSettings, Scene, ShaderSource,
    StandardProfile, Texture,
};

use common::{check, material, renderer, renderer_with};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// ============================================================================
// Fallbacks
// ============================================================================

#[test]
fn rejected_define_is_dropped_through_fallbacks() {
    let mut renderer = renderer();
    renderer.backend_mut().reject_define("POINTSIZE");
    let scene = Scene::new();
    let mesh = Mesh::new("particles");
    let mut mat = renderer
        .material_builder(StandardProfile::default())
        .points_cloud(true)
        .build(renderer.shaders())
        .unwrap();

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    let sources = renderer.backend().compiled_sources();
    assert_eq!(sources.len(), 2);
    assert!(sources[0].defines.contains("#define POINTSIZE\n"));
    assert!(!sources[1].defines.contains("POINTSIZE"));
    assert_eq!(renderer.backend().stats().programs_failed, 1);

    // The material still asks for the full permutation.
    assert!(mat.sub_mesh_defines(&mesh, 0).unwrap().is_set("POINTSIZE"));
}

#[test]
fn unrecoverable_failure_is_reported_once() {
    let mut renderer = renderer();
    renderer.backend_mut().reject_define("ALPHATEST");
    let mut scene = Scene::new();
    let mesh = Mesh::new("leaves");
    let mut mat = renderer
        .material_builder(StandardProfile::default())
        .transparency_mode(TransparencyMode::AlphaTest)
        .build(renderer.shaders())
        .unwrap();

    let errors = counter();
    let seen = Arc::clone(&errors);
    mat.set_on_error(move |_, diagnostic| {
        assert!(diagnostic.contains("ALPHATEST"));
        seen.fetch_add(1, Ordering::Relaxed);
    });

    for _ in 0..3 {
        assert!(!check(&mut renderer, &scene, &mut mat, &mesh));
        scene.advance_frame();
    }
    assert_eq!(errors.load(Ordering::Relaxed), 1);

    let effect = mat.current_effect(&mesh, 0).unwrap();
    assert!(renderer.effects().status(effect).unwrap().is_failed());
}

#[test]
fn failed_replacement_keeps_previous_effect() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("leaves");
    let mut mat = material(&renderer, StandardProfile::default());

    let errors = counter();
    let seen = Arc::clone(&errors);
    mat.set_on_error(move |_, _| {
        seen.fetch_add(1, Ordering::Relaxed);
    });

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    let working = mat.current_effect(&mesh, 0).unwrap();

    renderer.backend_mut().reject_define("ALPHATEST");
    mat.set_transparency_mode(Some(TransparencyMode::AlphaTest));

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(mat.current_effect(&mesh, 0), Some(working));
    assert_eq!(errors.load(Ordering::Relaxed), 1);
}

#[test]
fn compiled_hook_fires_once_per_effect() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    let compiled = counter();
    let seen = Arc::clone(&compiled);
    mat.set_on_compiled(move |_| {
        seen.fetch_add(1, Ordering::Relaxed);
    });

    for _ in 0..3 {
        assert!(check(&mut renderer, &scene, &mut mat, &mesh));
        scene.advance_frame();
    }
    assert_eq!(compiled.load(Ordering::Relaxed), 1);

    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(compiled.load(Ordering::Relaxed), 2);
}

// ============================================================================
// Hot swapping
// ============================================================================

#[test]
fn previous_effect_draws_while_replacement_compiles() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    let old = mat.current_effect(&mesh, 0).unwrap();

    renderer.backend_mut().set_latency(3);
    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));

    let mut swapped = false;
    for _ in 0..6 {
        scene.advance_frame();
        assert!(check(&mut renderer, &scene, &mut mat, &mesh));
        let wrapper = mat.draw_wrapper(&mesh, 0).unwrap();
        if wrapper.effect() != Some(old) {
            assert!(wrapper.pending_effect().is_none());
            swapped = true;
            break;
        }
        assert!(wrapper.pending_effect().is_some());
    }
    assert!(swapped);
}

#[test]
fn hot_swap_without_permission_reports_not_ready() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = renderer
        .material_builder(StandardProfile::default())
        .allow_shader_hot_swapping(false)
        .build(renderer.shaders())
        .unwrap();

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    let old = mat.current_effect(&mesh, 0).unwrap();

    renderer.backend_mut().set_latency(3);
    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));

    assert!(!check(&mut renderer, &scene, &mut mat, &mesh));
    assert_ne!(mat.current_effect(&mesh, 0), Some(old));
}

#[test]
fn hot_swap_gives_up_after_frame_cap() {
    let mut renderer = renderer_with(RendererSettings {
        max_hot_swap_frames: 1,
        ..RendererSettings::default()
    });
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    let old = mat.current_effect(&mesh, 0).unwrap();

    renderer.backend_mut().set_latency(10);
    mat.profile_mut().set_diffuse_texture(Some(Texture::new("albedo").into_ref()));

    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(mat.current_effect(&mesh, 0), Some(old));

    scene.advance_frame();
    assert!(!check(&mut renderer, &scene, &mut mat, &mesh));
    assert_ne!(mat.current_effect(&mesh, 0), Some(old));
}

// ============================================================================
// Sources and cache lifetime
// ============================================================================

#[test]
fn deferred_source_resolves_once_sent() {
    common::init_logger();
    let mut renderer = Renderer::new(HeadlessBackend::new(), RendererSettings::default()).unwrap();
    let sender = renderer.shaders_mut().register_deferred("default");
    let mut scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());

    assert!(!check(&mut renderer, &scene, &mut mat, &mesh));
    let effect = mat.current_effect(&mesh, 0).unwrap();
    assert_eq!(renderer.effects().status(effect), Some(EffectStatus::AwaitingSource));
    assert_eq!(renderer.backend().stats().programs_compiled, 0);

    sender
        .send(ShaderSource::new("void main() {}", "void main() {}"))
        .unwrap();
    scene.advance_frame();
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert!(renderer.shaders().is_loaded("default"));
}

#[test]
fn abandoned_source_fails_the_effect() {
    common::init_logger();
    let mut renderer = Renderer::new(HeadlessBackend::new(), RendererSettings::default()).unwrap();
    let sender = renderer.shaders_mut().register_deferred("default");
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    drop(sender);

    assert!(!check(&mut renderer, &scene, &mut mat, &mesh));
    let effect = mat.current_effect(&mesh, 0).unwrap();
    assert!(renderer.effects().status(effect).unwrap().is_failed());
}

#[test]
fn cleared_cache_is_repopulated() {
    let mut renderer = renderer();
    let scene = Scene::new();
    let mesh = Mesh::new("box");
    let mut mat = material(&renderer, StandardProfile::default());
    assert!(check(&mut renderer, &scene, &mut mat, &mesh));

    renderer.effects_mut().clear();
    assert!(renderer.effects().is_empty());

    assert!(check(&mut renderer, &scene, &mut mat, &mesh));
    assert_eq!(renderer.effects().len(), 1);
    assert_eq!(renderer.backend().stats().programs_compiled, 2);
}
