//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use glam::Mat4;

use myth_shading::resources::material::MaterialProfile;
use myth_shading::{
    HeadlessBackend, Material, Mesh, Renderer, RendererSettings, Scene, ShaderSource,
};

/// Families every fixture renderer knows about.
pub const SHADER_FAMILIES: [&str; 3] = ["default", "background", "pbr"];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn probe_source(family: &str) -> ShaderSource {
    ShaderSource::new(
        format!("// {family}.vert\n{{$ if DIFFUSE is defined $}}uniform sampler2D diffuseSampler;{{$ endif $}}\nvoid main() {{}}\n"),
        format!("// {family}.frag\n{{$ if ALPHATEST is defined $}}const float cutoff = {{{{ ALPHATESTVALUE }}}};{{$ endif $}}\nvoid main() {{}}\n"),
    )
}

pub fn renderer_with(settings: RendererSettings) -> Renderer<HeadlessBackend> {
    init_logger();
    let mut renderer = Renderer::new(HeadlessBackend::new(), settings).unwrap();
    for family in SHADER_FAMILIES {
        renderer.register_shader(family, probe_source(family)).unwrap();
    }
    renderer
}

pub fn renderer() -> Renderer<HeadlessBackend> {
    renderer_with(RendererSettings::default())
}

pub fn material<P: MaterialProfile>(renderer: &Renderer<HeadlessBackend>, profile: P) -> Material<P> {
    renderer
        .material_builder(profile)
        .build(renderer.shaders())
        .unwrap()
}

/// One readiness check of submesh 0.
pub fn check<P: MaterialProfile>(
    renderer: &mut Renderer<HeadlessBackend>,
    scene: &Scene,
    material: &mut Material<P>,
    mesh: &Mesh,
) -> bool {
    let mut ctx = renderer.context(scene);
    material.is_ready_for_sub_mesh(&mut ctx, mesh, 0, false)
}

/// Binds submesh 0 with an identity world matrix.
pub fn bind<P: MaterialProfile>(
    renderer: &mut Renderer<HeadlessBackend>,
    scene: &Scene,
    material: &mut Material<P>,
    mesh: &Mesh,
) {
    let mut ctx = renderer.context(scene);
    material.bind_for_sub_mesh(&mut ctx, mesh, 0, &Mat4::IDENTITY);
}

/// Checks once per frame until ready, up to `frames` frames.
pub fn check_until_ready<P: MaterialProfile>(
    renderer: &mut Renderer<HeadlessBackend>,
    scene: &mut Scene,
    material: &mut Material<P>,
    mesh: &Mesh,
    frames: u32,
) -> bool {
    for _ in 0..frames {
        if check(renderer, scene, material, mesh) {
            return true;
        }
        scene.advance_frame();
    }
    false
}
