//! 全局字符串驻留器 (String Interner)
//!
//! 将宏名称与 uniform 名称转换为整数 Symbol，
//! 使 DefineSet 与 UniformBuffer 的查找只需比较整数。

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

/// 全局字符串驻留器实例
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Symbol 类型别名
///
/// Symbol 是一个紧凑的整数标识符，可以高效地进行比较和哈希操作。
pub type Symbol = Spur;

/// 驻留一个字符串，返回其 Symbol
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// 尝试获取已存在字符串的 Symbol
///
/// 不会分配新内存；从未驻留过的字符串返回 None。
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// 将 Symbol 解析回字符串
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// 驻留带索引后缀的名称，例如 `("LIGHT", 2)` -> `LIGHT2`
#[inline]
pub fn intern_indexed(base: &str, index: u32) -> Symbol {
    intern(&format!("{base}{index}"))
}

/// 预驻留通用宏名称
///
/// 在渲染器初始化时调用，避免首帧在热路径上驻留。
pub fn preload_common_defines() {
    let common = [
        // 顶点属性
        "NORMAL",
        "TANGENT",
        "UV1",
        "UV2",
        "VERTEXCOLOR",
        "VERTEXALPHA",
        "NUM_BONE_INFLUENCERS",
        "BonesPerMesh",
        // 杂项
        "ALPHATEST",
        "ALPHATESTVALUE",
        "FOG",
        "POINTSIZE",
        "LOGARITHMICDEPTH",
        // 光照
        "SPECULARTERM",
        "SHADOWS",
        "SHADOWFLOAT",
        // 帧相关
        "INSTANCES",
        "THIN_INSTANCES",
        "CLIPPLANE",
    ];

    for name in common {
        intern(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_resolve() {
        let s1 = intern("DIFFUSE");
        let s2 = intern("DIFFUSE");
        let s3 = intern("AMBIENT");

        assert_eq!(s1, s2);
        assert_ne!(s1, s3);

        assert_eq!(resolve(s1), "DIFFUSE");
        assert_eq!(resolve(s3), "AMBIENT");
    }

    #[test]
    fn test_get() {
        let _ = intern("existing_define");

        assert!(get("existing_define").is_some());
        assert!(get("never_interned_define").is_none());
    }

    #[test]
    fn test_intern_indexed() {
        assert_eq!(resolve(intern_indexed("LIGHT", 3)), "LIGHT3");
        assert_eq!(intern_indexed("SHADOW", 0), intern("SHADOW0"));
    }
}
