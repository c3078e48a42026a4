//! Environment - 纯数据结构
//!
//! 雾、裁剪平面、环境贴图、预通道 (prepass) 与 OIT 配置。
//! 通过 [`Scene::environment_mut`](crate::scene::Scene::environment_mut) 修改，
//! 守卫释放时递增版本号。

use glam::{Vec3, Vec4};

use crate::resources::texture::TextureRef;

/// 雾模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FogMode {
    #[default]
    None,
    Exp,
    Exp2,
    Linear,
}

impl FogMode {
    /// 着色器中使用的模式编号
    #[must_use]
    pub fn shader_value(self) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Exp => 1.0,
            Self::Exp2 => 2.0,
            Self::Linear => 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fog {
    pub mode: FogMode,
    pub start: f32,
    pub end: f32,
    pub density: f32,
    pub color: Vec3,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            mode: FogMode::None,
            start: 0.0,
            end: 1000.0,
            density: 0.1,
            color: Vec3::splat(0.2),
        }
    }
}

impl Fog {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.mode != FogMode::None
    }
}

/// 预通道输出附件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrepassTextureKind {
    Irradiance,
    Albedo,
    Depth,
    Normal,
    Position,
    Velocity,
    Reflectivity,
}

impl PrepassTextureKind {
    pub const ALL: [PrepassTextureKind; 7] = [
        Self::Irradiance,
        Self::Albedo,
        Self::Depth,
        Self::Normal,
        Self::Position,
        Self::Velocity,
        Self::Reflectivity,
    ];

    /// 宏名称中的类型部分，例如 `PREPASS_DEPTH`
    #[must_use]
    pub fn define_suffix(self) -> &'static str {
        match self {
            Self::Irradiance => "IRRADIANCE",
            Self::Albedo => "ALBEDO",
            Self::Depth => "DEPTH",
            Self::Normal => "NORMAL",
            Self::Position => "POSITION",
            Self::Velocity => "VELOCITY",
            Self::Reflectivity => "REFLECTIVITY",
        }
    }
}

/// 预通道渲染器状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepassConfig {
    pub enabled: bool,
    /// 附件按顺序排在主颜色输出之后
    pub attachments: Vec<PrepassTextureKind>,
}

impl PrepassConfig {
    /// 附件的 MRT 索引；索引 0 为主颜色输出
    #[must_use]
    pub fn index_of(&self, kind: PrepassTextureKind) -> Option<usize> {
        self.attachments
            .iter()
            .position(|&k| k == kind)
            .map(|pos| pos + 1)
    }

    /// 包含主颜色输出在内的渲染目标数量
    #[must_use]
    pub fn mrt_count(&self) -> usize {
        self.attachments.len() + 1
    }
}

/// 场景级环境状态
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub fog: Fog,
    /// 至多六个用户裁剪平面
    pub clip_planes: [Option<Vec4>; 6],
    /// 环境光颜色
    pub ambient_color: Vec3,
    /// 场景默认反射贴图
    pub environment_texture: Option<TextureRef>,
    /// PBR 环境 BRDF 查找表
    pub environment_brdf_texture: Option<TextureRef>,
    /// 强制以点云模式渲染
    pub force_points_cloud: bool,
    pub prepass: Option<PrepassConfig>,
    pub order_independent_transparency: bool,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用中的预通道配置
    #[must_use]
    pub fn active_prepass(&self) -> Option<&PrepassConfig> {
        self.prepass.as_ref().filter(|p| p.enabled)
    }

    #[must_use]
    pub fn has_clip_planes(&self) -> bool {
        self.clip_planes.iter().any(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepass_indices_follow_color_output() {
        let prepass = PrepassConfig {
            enabled: true,
            attachments: vec![PrepassTextureKind::Depth, PrepassTextureKind::Normal],
        };
        assert_eq!(prepass.index_of(PrepassTextureKind::Depth), Some(1));
        assert_eq!(prepass.index_of(PrepassTextureKind::Normal), Some(2));
        assert_eq!(prepass.index_of(PrepassTextureKind::Velocity), None);
        assert_eq!(prepass.mrt_count(), 3);
    }
}
