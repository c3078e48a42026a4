//! Uniform / Sampler Registry
//!
//! Per-material storage of named uniform slots backed by one CPU-side block.
//!
//! - The layout is declared with an additive [`UniformBuffer::add_uniform`]
//!   sequence and frozen on the first [`UniformBuffer::update`]; later
//!   declarations are rejected because they would shift GPU-side offsets.
//! - `update_*` writers only touch the block when the value really changes,
//!   clearing the `is_sync` flag.
//! - Effect-scope values (world / view matrices, light data) and samplers are
//!   cached per bound program and only re-sent when they change or the program
//!   switches.
//!
//! # Packing
//!
//! | Slot size (floats) | Alignment |
//! |--------------------|-----------|
//! | 1                  | 1         |
//! | 2                  | 2         |
//! | 3, 4, 16, arrays   | 4         |
//!
//! The block length is rounded up to a whole vec4 row when it is created.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::renderer::backend::{ProgramHandle, ShaderBackend};
use crate::resources::texture::TextureRef;
use crate::utils::interner::{self, Symbol};

static NEXT_UNIFORM_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a uniform block on the backend side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformBlockId(pub u64);

/// A typed uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    FloatArray(Vec<f32>),
    Mat4Array(Vec<Mat4>),
}

impl UniformValue {
    fn from_floats(values: &[f32]) -> Self {
        match values.len() {
            1 => Self::Float(values[0]),
            2 => Self::Vec2(Vec2::from_slice(values)),
            3 => Self::Vec3(Vec3::from_slice(values)),
            4 => Self::Vec4(Vec4::from_slice(values)),
            16 => Self::Mat4(Mat4::from_cols_slice(values)),
            _ => Self::FloatArray(values.to_vec()),
        }
    }
}

/// Traffic counters, mainly useful in tests and profiling overlays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformStats {
    /// Whole-block uploads.
    pub block_uploads: u64,
    /// Block slot writes that changed a value.
    pub value_writes: u64,
    /// Individual uniforms pushed to a program.
    pub uniform_sends: u64,
    /// Sampler bindings pushed to a program.
    pub texture_binds: u64,
}

#[derive(Debug, Clone)]
struct UniformEntry {
    name: Symbol,
    offset: usize,
    size: usize,
    dirty: bool,
}

/// Named-slot uniform storage with sync tracking.
#[derive(Debug)]
pub struct UniformBuffer {
    id: UniformBlockId,
    label: Cow<'static, str>,

    // ---- Block layout & data ----
    entries: Vec<UniformEntry>,
    index: FxHashMap<Symbol, usize>,
    data: Vec<f32>,
    created: bool,
    use_ubo: bool,
    is_sync: bool,

    // ---- Effect-scope state ----
    program: Option<ProgramHandle>,
    pending_uniforms: FxHashMap<Symbol, UniformValue>,
    sent_uniforms: FxHashMap<Symbol, UniformValue>,
    pending_textures: FxHashMap<Symbol, Option<TextureRef>>,
    sent_textures: FxHashMap<Symbol, Option<Uuid>>,

    stats: UniformStats,
}

impl UniformBuffer {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            id: UniformBlockId(NEXT_UNIFORM_BLOCK_ID.fetch_add(1, Ordering::Relaxed)),
            label: Cow::Borrowed(label),
            entries: Vec::new(),
            index: FxHashMap::default(),
            data: Vec::new(),
            created: false,
            use_ubo: true,
            is_sync: false,
            program: None,
            pending_uniforms: FxHashMap::default(),
            sent_uniforms: FxHashMap::default(),
            pending_textures: FxHashMap::default(),
            sent_textures: FxHashMap::default(),
            stats: UniformStats::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UniformBlockId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    // ─── Layout ──────────────────────────────────────────────────────────────

    /// Appends a slot of `size` floats.
    ///
    /// Re-declaring an existing name is ignored. Declaring after the layout
    /// was frozen is a programming error and is logged.
    pub fn add_uniform(&mut self, name: &str, size: usize) {
        if self.created {
            log::error!(
                "Uniform `{name}` declared after block `{}` was created; ignored",
                self.label
            );
            return;
        }
        let sym = interner::intern(name);
        if self.index.contains_key(&sym) {
            return;
        }

        let alignment = if size <= 2 { size.max(1) } else { 4 };
        let misalignment = self.data.len() % alignment;
        if misalignment != 0 {
            let padding = alignment - misalignment;
            self.data.resize(self.data.len() + padding, 0.0);
        }

        self.index.insert(sym, self.entries.len());
        self.entries.push(UniformEntry {
            name: sym,
            offset: self.data.len(),
            size,
            dirty: true,
        });
        self.data.resize(self.data.len() + size, 0.0);
    }

    /// Freezes the layout.
    pub fn create(&mut self) {
        if self.created {
            return;
        }
        let misalignment = self.data.len() % 4;
        if misalignment != 0 {
            self.data.resize(self.data.len() + 4 - misalignment, 0.0);
        }
        self.created = true;
        self.is_sync = false;
    }

    #[inline]
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.created
    }

    #[inline]
    #[must_use]
    pub fn use_ubo(&self) -> bool {
        self.use_ubo
    }

    /// Chooses between block uploads and per-uniform pushes. Only honoured
    /// before the layout is created.
    pub fn set_use_ubo(&mut self, use_ubo: bool) {
        if self.created {
            return;
        }
        self.use_ubo = use_ubo;
    }

    /// `true` when the backend copy matches the CPU block.
    #[inline]
    #[must_use]
    pub fn is_sync(&self) -> bool {
        self.is_sync
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        interner::get(name).is_some_and(|sym| self.index.contains_key(&sym))
    }

    /// Offset of a slot, in floats.
    #[must_use]
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let sym = interner::get(name)?;
        self.index.get(&sym).map(|&idx| self.entries[idx].offset)
    }

    /// Current block size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Declared slot names in layout order.
    pub fn uniform_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| interner::resolve(e.name))
    }

    /// Raw contents of a slot.
    #[must_use]
    pub fn read(&self, name: &str) -> Option<&[f32]> {
        let sym = interner::get(name)?;
        let entry = &self.entries[*self.index.get(&sym)?];
        Some(&self.data[entry.offset..entry.offset + entry.size])
    }

    // ─── Block writers ───────────────────────────────────────────────────────

    fn write(&mut self, name: &str, values: &[f32]) {
        let Some(&idx) = interner::get(name).and_then(|sym| self.index.get(&sym)) else {
            log::trace!("Uniform `{name}` is not part of block `{}`", self.label);
            return;
        };
        let entry = &mut self.entries[idx];
        let count = values.len().min(entry.size);
        let slot = &mut self.data[entry.offset..entry.offset + count];
        if slot != &values[..count] {
            slot.copy_from_slice(&values[..count]);
            entry.dirty = true;
            self.is_sync = false;
            self.stats.value_writes += 1;
        }
    }

    pub fn update_float(&mut self, name: &str, x: f32) {
        self.write(name, &[x]);
    }

    pub fn update_float2(&mut self, name: &str, x: f32, y: f32) {
        self.write(name, &[x, y]);
    }

    pub fn update_float3(&mut self, name: &str, x: f32, y: f32, z: f32) {
        self.write(name, &[x, y, z]);
    }

    pub fn update_float4(&mut self, name: &str, x: f32, y: f32, z: f32, w: f32) {
        self.write(name, &[x, y, z, w]);
    }

    pub fn update_vec3(&mut self, name: &str, v: Vec3) {
        self.write(name, &v.to_array());
    }

    pub fn update_vec4(&mut self, name: &str, v: Vec4) {
        self.write(name, &v.to_array());
    }

    pub fn update_color3(&mut self, name: &str, color: Vec3) {
        self.write(name, &color.to_array());
    }

    pub fn update_color4(&mut self, name: &str, color: Vec3, alpha: f32) {
        self.write(name, &[color.x, color.y, color.z, alpha]);
    }

    pub fn update_matrix(&mut self, name: &str, matrix: &Mat4) {
        self.write(name, &matrix.to_cols_array());
    }

    pub fn update_floats(&mut self, name: &str, values: &[f32]) {
        self.write(name, values);
    }

    // ─── Effect-scope values ─────────────────────────────────────────────────

    /// Queues a loose uniform on the bound program.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let sym = interner::intern(name);
        if self.sent_uniforms.get(&sym) == Some(&value) {
            self.pending_uniforms.remove(&sym);
            return;
        }
        self.pending_uniforms.insert(sym, value);
    }

    /// Queues a sampler binding on the bound program.
    pub fn set_texture(&mut self, name: &str, texture: Option<&TextureRef>) {
        let sym = interner::intern(name);
        let uuid = texture.map(|t| t.uuid);
        if self.sent_textures.get(&sym) == Some(&uuid) {
            self.pending_textures.remove(&sym);
            return;
        }
        self.pending_textures.insert(sym, texture.cloned());
    }

    /// Attaches the block to `program`. Switching programs invalidates every
    /// effect-scope cache and returns `true`.
    pub fn bind_to_effect(&mut self, program: ProgramHandle, backend: &mut dyn ShaderBackend) -> bool {
        if self.program == Some(program) {
            return false;
        }
        self.program = Some(program);
        self.sent_uniforms.clear();
        self.sent_textures.clear();

        if self.use_ubo {
            backend.bind_uniform_block(program, self.id, &self.label);
        } else {
            for entry in &mut self.entries {
                entry.dirty = true;
            }
            self.is_sync = false;
        }
        true
    }

    #[must_use]
    pub fn bound_program(&self) -> Option<ProgramHandle> {
        self.program
    }

    // ─── Flush ───────────────────────────────────────────────────────────────

    /// Pushes every pending change to the backend.
    pub fn update(&mut self, backend: &mut dyn ShaderBackend) {
        if !self.created {
            self.create();
        }

        if !self.is_sync {
            if self.use_ubo {
                backend.upload_uniform_block(self.id, bytemuck::cast_slice(&self.data));
                self.stats.block_uploads += 1;
                for entry in &mut self.entries {
                    entry.dirty = false;
                }
                self.is_sync = true;
            } else if let Some(program) = self.program {
                for entry in &mut self.entries {
                    if !entry.dirty {
                        continue;
                    }
                    let value =
                        UniformValue::from_floats(&self.data[entry.offset..entry.offset + entry.size]);
                    backend.set_uniform(program, interner::resolve(entry.name), &value);
                    self.stats.uniform_sends += 1;
                    entry.dirty = false;
                }
                self.is_sync = true;
            }
        }

        let Some(program) = self.program else {
            return;
        };

        for (sym, value) in self.pending_uniforms.drain() {
            backend.set_uniform(program, interner::resolve(sym), &value);
            self.stats.uniform_sends += 1;
            self.sent_uniforms.insert(sym, value);
        }

        for (sym, texture) in self.pending_textures.drain() {
            backend.set_texture(program, interner::resolve(sym), texture.as_deref());
            self.stats.texture_binds += 1;
            self.sent_textures.insert(sym, texture.map(|t| t.uuid));
        }
    }

    #[must_use]
    pub fn stats(&self) -> UniformStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_alignment() {
        let mut ubo = UniformBuffer::new("Material");
        ubo.add_uniform("a", 1);
        ubo.add_uniform("b", 3);
        ubo.add_uniform("c", 2);
        ubo.add_uniform("d", 16);
        ubo.add_uniform("e", 1);

        assert_eq!(ubo.offset_of("a"), Some(0));
        assert_eq!(ubo.offset_of("b"), Some(4));
        assert_eq!(ubo.offset_of("c"), Some(8));
        assert_eq!(ubo.offset_of("d"), Some(12));
        assert_eq!(ubo.offset_of("e"), Some(28));

        ubo.create();
        assert_eq!(ubo.byte_len(), 32 * 4);
    }

    #[test]
    fn test_layout_frozen_after_create() {
        let mut ubo = UniformBuffer::new("Material");
        ubo.add_uniform("alpha", 1);
        ubo.create();
        ubo.add_uniform("late", 4);
        assert!(!ubo.contains("late"));
    }

    #[test]
    fn test_unchanged_write_keeps_sync() {
        let mut ubo = UniformBuffer::new("Material");
        ubo.add_uniform("vDiffuseColor", 4);
        ubo.create();
        ubo.update_float4("vDiffuseColor", 1.0, 0.5, 0.25, 1.0);
        assert!(!ubo.is_sync());

        ubo.is_sync = true;
        ubo.update_float4("vDiffuseColor", 1.0, 0.5, 0.25, 1.0);
        assert!(ubo.is_sync());
        assert_eq!(ubo.stats().value_writes, 1);
        assert_eq!(ubo.read("vDiffuseColor"), Some(&[1.0, 0.5, 0.25, 1.0][..]));
    }
}
