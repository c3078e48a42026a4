//! Mesh state consumed by define preparation.
//!
//! The material core never touches vertex data; it only needs to know which
//! attribute streams exist and how skinning, morphing and instancing are set up.
//! All of that lives in [`MeshState`], reachable for writing only through a
//! version-bumping guard so submeshes notice attribute changes.

use bitflags::bitflags;
use glam::Mat4;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::resources::version_tracker::{ChangeTracker, MutGuard};

bitflags! {
    /// Vertex streams present on a mesh.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct VertexAttributes: u32 {
        const POSITION              = 1 << 0;
        const NORMAL                = 1 << 1;
        const TANGENT               = 1 << 2;
        const UV1                   = 1 << 3;
        const UV2                   = 1 << 4;
        const UV3                   = 1 << 5;
        const UV4                   = 1 << 6;
        const UV5                   = 1 << 7;
        const UV6                   = 1 << 8;
        const COLOR                 = 1 << 9;
        const MATRICES_INDICES      = 1 << 10;
        const MATRICES_WEIGHTS      = 1 << 11;
        const MATRICES_INDICES_EXTRA = 1 << 12;
        const MATRICES_WEIGHTS_EXTRA = 1 << 13;
        const INSTANCE_COLOR        = 1 << 14;
    }
}

impl VertexAttributes {
    /// UV channel flag for a 1-based channel number.
    #[must_use]
    pub fn uv(channel: u32) -> Self {
        match channel {
            1 => Self::UV1,
            2 => Self::UV2,
            3 => Self::UV3,
            4 => Self::UV4,
            5 => Self::UV5,
            6 => Self::UV6,
            _ => Self::empty(),
        }
    }
}

/// Skeleton bound to a skinned mesh.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub bone_matrices: Vec<Mat4>,
    /// Bone matrices are read from a texture instead of a uniform array.
    pub use_texture_for_matrices: bool,
}

impl Skeleton {
    #[must_use]
    pub fn new(bone_count: usize) -> Self {
        Self {
            bone_matrices: vec![Mat4::IDENTITY; bone_count],
            use_texture_for_matrices: false,
        }
    }

    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bone_matrices.len()
    }
}

/// Morph target setup of a mesh.
#[derive(Debug, Clone, Default)]
pub struct MorphTargets {
    pub influences: SmallVec<[f32; 8]>,
    pub supports_normals: bool,
    pub supports_tangents: bool,
    pub supports_uvs: bool,
    pub use_texture_for_targets: bool,
}

impl MorphTargets {
    /// Number of active influencers.
    #[must_use]
    pub fn num_influencers(&self) -> u32 {
        self.influences.len() as u32
    }
}

/// Define-relevant state of a mesh.
#[derive(Debug, Clone)]
pub struct MeshState {
    pub attributes: VertexAttributes,
    pub visibility: f32,
    pub receive_shadows: bool,
    pub apply_fog: bool,
    pub use_vertex_colors: bool,
    pub has_vertex_alpha: bool,
    pub non_uniform_scaling: bool,

    pub skeleton: Option<Skeleton>,
    pub num_bone_influencers: u32,
    pub compute_bones_using_shaders: bool,

    pub morph_targets: Option<MorphTargets>,

    pub has_instances: bool,
    pub thin_instance_count: u32,
}

impl Default for MeshState {
    fn default() -> Self {
        Self {
            attributes: VertexAttributes::POSITION | VertexAttributes::NORMAL | VertexAttributes::UV1,
            visibility: 1.0,
            receive_shadows: false,
            apply_fog: true,
            use_vertex_colors: true,
            has_vertex_alpha: false,
            non_uniform_scaling: false,
            skeleton: None,
            num_bone_influencers: 4,
            compute_bones_using_shaders: true,
            morph_targets: None,
            has_instances: false,
            thin_instance_count: 0,
        }
    }
}

impl MeshState {
    #[inline]
    #[must_use]
    pub fn has(&self, attributes: VertexAttributes) -> bool {
        self.attributes.contains(attributes)
    }

    /// Skinning runs in the vertex shader.
    #[must_use]
    pub fn uses_gpu_bones(&self) -> bool {
        self.skeleton.is_some()
            && self.compute_bones_using_shaders
            && self.num_bone_influencers > 0
            && self.has(VertexAttributes::MATRICES_INDICES | VertexAttributes::MATRICES_WEIGHTS)
    }

    #[must_use]
    pub fn has_thin_instances(&self) -> bool {
        self.thin_instance_count > 0
    }
}

/// Identifies one submesh: a (mesh, material) rendering unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubMeshKey {
    pub mesh: Uuid,
    pub index: u32,
}

impl SubMeshKey {
    #[must_use]
    pub fn new(mesh: Uuid, index: u32) -> Self {
        Self { mesh, index }
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub uuid: Uuid,
    pub name: String,
    state: MeshState,
    tracker: ChangeTracker,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new("Mesh")
    }
}

impl Mesh {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::with_state(name, MeshState::default())
    }

    #[must_use]
    pub fn with_state(name: &str, state: MeshState) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            state,
            tracker: ChangeTracker::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &MeshState {
        &self.state
    }

    /// Mutable access; submeshes re-derive attribute, light and misc defines afterwards.
    pub fn state_mut(&mut self) -> MutGuard<'_, MeshState> {
        MutGuard::new(&mut self.state, &mut self.tracker)
    }

    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    #[must_use]
    pub fn sub_mesh(&self, index: u32) -> SubMeshKey {
        SubMeshKey::new(self.uuid, index)
    }
}
