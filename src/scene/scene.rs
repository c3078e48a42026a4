use std::sync::atomic::{AtomicU32, Ordering};

use crate::resources::image_processing::ImageProcessingConfiguration;
use crate::resources::version_tracker::{ChangeTracker, MutGuard};
use crate::scene::camera::Camera;
use crate::scene::environment::Environment;
use crate::scene::light::Light;

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// 场景上下文
///
/// Scene 是材质准备宏定义时读取的纯数据层。
/// 灯光、环境与图像处理配置只能通过守卫修改，守卫释放时递增对应的版本号，
/// 子网格据此判断哪些宏关注点需要重新计算。
/// 相机与逐帧开关（颜色写入、反向深度）在每次就绪检查时直接读取。
pub struct Scene {
    pub id: u32,

    /// 活动相机
    pub camera: Camera,

    /// 关闭颜色写入即为深度预通道
    pub color_write: bool,
    pub use_reverse_depth_buffer: bool,

    // ==== 版本追踪的状态 ====
    lights: Vec<Light>,
    lights_enabled: bool,
    shadows_enabled: bool,
    lights_tracker: ChangeTracker,

    environment: Environment,
    right_handed: bool,
    environment_tracker: ChangeTracker,

    image_processing: ImageProcessingConfiguration,
    image_processing_tracker: ChangeTracker,

    render_id: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            camera: Camera::default(),
            color_write: true,
            use_reverse_depth_buffer: false,

            lights: Vec::new(),
            lights_enabled: true,
            shadows_enabled: true,
            lights_tracker: ChangeTracker::new(),

            environment: Environment::new(),
            right_handed: false,
            environment_tracker: ChangeTracker::new(),

            image_processing: ImageProcessingConfiguration::new(),
            image_processing_tracker: ChangeTracker::new(),

            render_id: 1,
        }
    }

    // ==== 帧 ====

    /// 当前帧编号；同一帧内的重复就绪检查可直接复用结果
    #[inline]
    #[must_use]
    pub fn render_id(&self) -> u64 {
        self.render_id
    }

    pub fn advance_frame(&mut self) {
        self.render_id += 1;
    }

    // ==== 灯光 ====

    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> MutGuard<'_, Vec<Light>> {
        MutGuard::new(&mut self.lights, &mut self.lights_tracker)
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights_mut().push(light);
    }

    #[must_use]
    pub fn lights_enabled(&self) -> bool {
        self.lights_enabled
    }

    pub fn set_lights_enabled(&mut self, enabled: bool) {
        if self.lights_enabled != enabled {
            self.lights_enabled = enabled;
            self.lights_tracker.changed();
        }
    }

    #[must_use]
    pub fn shadows_enabled(&self) -> bool {
        self.shadows_enabled
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) {
        if self.shadows_enabled != enabled {
            self.shadows_enabled = enabled;
            self.lights_tracker.changed();
        }
    }

    #[must_use]
    pub fn lights_tracker(&self) -> &ChangeTracker {
        &self.lights_tracker
    }

    // ==== 环境 ====

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> MutGuard<'_, Environment> {
        MutGuard::new(&mut self.environment, &mut self.environment_tracker)
    }

    #[must_use]
    pub fn right_handed(&self) -> bool {
        self.right_handed
    }

    pub fn set_right_handed(&mut self, right_handed: bool) {
        if self.right_handed != right_handed {
            self.right_handed = right_handed;
            self.environment_tracker.changed();
        }
    }

    #[must_use]
    pub fn environment_tracker(&self) -> &ChangeTracker {
        &self.environment_tracker
    }

    // ==== 图像处理 ====

    #[must_use]
    pub fn image_processing(&self) -> &ImageProcessingConfiguration {
        &self.image_processing
    }

    pub fn image_processing_mut(&mut self) -> MutGuard<'_, ImageProcessingConfiguration> {
        MutGuard::new(&mut self.image_processing, &mut self.image_processing_tracker)
    }

    #[must_use]
    pub fn image_processing_tracker(&self) -> &ChangeTracker {
        &self.image_processing_tracker
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn test_guards_bump_their_own_tracker() {
        let mut scene = Scene::new();
        scene.add_light(Light::new_point(Vec3::ONE, 1.0, 10.0));
        assert_eq!(scene.lights_tracker().version(), 1);
        assert_eq!(scene.environment_tracker().version(), 0);

        scene.environment_mut().force_points_cloud = true;
        assert_eq!(scene.environment_tracker().version(), 1);
        assert_eq!(scene.image_processing_tracker().version(), 0);
    }

    #[test]
    fn test_unchanged_switch_keeps_version() {
        let mut scene = Scene::new();
        scene.set_lights_enabled(true);
        assert_eq!(scene.lights_tracker().version(), 0);
        scene.set_shadows_enabled(false);
        assert_eq!(scene.lights_tracker().version(), 1);
    }
}
