//! 场景上下文模块
//!
//! 材质准备宏定义与绑定 uniform 时读取的场景状态：
//! - Scene: 场景容器（灯光、环境、图像处理、帧编号）
//! - Camera: 相机组件
//! - Light: 光源组件（阴影、光照贴图模式、包含/排除列表）
//! - Environment: 雾、裁剪平面、环境贴图、预通道与 OIT

pub mod camera;
pub mod environment;
pub mod light;
pub mod scene;

// 重新导出常用类型
pub use camera::{Camera, ProjectionType};
pub use environment::{Environment, Fog, FogMode, PrepassConfig, PrepassTextureKind};
pub use light::{
    Light, LightFalloff, LightKind, LightmapMode, ShadowConfig, ShadowFilter, ShadowQuality,
};
pub use scene::Scene;
