//! 效果管线模块
//!
//! 管理着色器排列 (permutation) 的创建与编译：
//! - EffectCache: 效果缓存（按着色器族 + 宏哈希去重）
//! - fallbacks: 编译失败时的降级链
//! - shader_library: 着色器模板库（支持异步导入）
//! - shader_gen: 着色器代码生成

pub mod cache;
pub mod effect_id;
pub mod fallbacks;
pub mod shader_gen;
pub mod shader_library;

pub use cache::{EffectCache, EffectRequest, EffectStatus};
pub use effect_id::EffectId;
pub use fallbacks::{FallbackChain, handle_fallbacks_for_shadows};
pub use shader_gen::{GeneratedSource, ShaderGenerator};
pub use shader_library::{ShaderLibrary, ShaderSource, SourceState};
