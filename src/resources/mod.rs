//! 核心资源定义模块
//!
//! 材质宏定义与效果编译流水线所需的数据结构，不依赖于具体的 GPU 后端：
//! - ShaderDefines: 宏定义集合与脏标记
//! - Capabilities: 全局纹理/特性开关
//! - UniformBuffer: 材质 uniform 块布局
//! - Material: 通用材质核心 + Standard / Background / PBR profile
//! - Texture / Mesh: 准备阶段读取的纹理与网格状态

pub mod capabilities;
pub mod image_processing;
pub mod material;
pub mod material_builder;
pub mod mesh;
pub mod shader_defines;
pub mod texture;
pub mod uniform_buffer;
pub mod version_tracker;

// 重新导出常用类型
pub use capabilities::{CapabilityFlags, CapabilitySettings, RenderCapabilities};
pub use image_processing::ImageProcessingConfiguration;
pub use material::{
    BackgroundMaterial, BackgroundProfile, FresnelParameters, Material, MaterialProfile,
    MaterialSettings, PbrMaterial, PbrProfile, StandardMaterial, StandardProfile,
    TransparencyMode,
};
pub use material_builder::MaterialBuilder;
pub use mesh::{Mesh, MeshState, MorphTargets, Skeleton, VertexAttributes};
pub use shader_defines::{DefineSet, DefineSetBuilder, DefineValue, DirtyFlags};
pub use texture::{CoordinatesMode, Texture, TextureRef};
pub use uniform_buffer::{UniformBuffer, UniformValue};
pub use version_tracker::{ChangeTracker, MutGuard};
