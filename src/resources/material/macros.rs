// src/resources/material/macros.rs

/// [宏] Profile API 生成器
///
/// 为材质 profile（或其子特性）生成纹理槽与参数的 Getter / Setter，
/// 以及按声明顺序遍历槽表的 `visit_slot_table`。
///
/// Setter 只在值真正变化时写入，并把该字段影响的 concern 记入
/// `self.dirty`；材质在 `ProfileGuard` 释放时通过 `take_dirty` 取走。
/// 纹理槽统一标记 `TEXTURES`，纯 uniform 参数传 `DirtyFlags::empty()`。
#[macro_export]
macro_rules! impl_profile_api {
    (
        $struct_name:ident,
        // Textures: (字段名, 槽描述 static, 文档)
        textures: [ $(($t_field:ident, $slot:expr, $t_doc:expr)),* $(,)? ],
        // Params: (字段名, 类型, concern, 文档)
        params: [ $(($p_field:ident, $p_type:ty, $concern:expr, $p_doc:expr)),* $(,)? ]
    ) => {
        impl $struct_name {
            // --- Texture slots ---
            $(
                #[doc = $t_doc]
                #[must_use]
                pub fn $t_field(&self) -> Option<&$crate::resources::texture::TextureRef> {
                    self.$t_field.as_ref()
                }

                paste::paste! {
                    #[doc = $t_doc]
                    pub fn [<set_ $t_field>](&mut self, texture: Option<$crate::resources::texture::TextureRef>) {
                        let same = match (&self.$t_field, &texture) {
                            (Some(current), Some(new)) => std::sync::Arc::ptr_eq(current, new),
                            (None, None) => true,
                            _ => false,
                        };
                        if !same {
                            self.$t_field = texture;
                            self.dirty |= $crate::resources::shader_defines::DirtyFlags::TEXTURES;
                        }
                    }
                }
            )*

            // --- Parameters ---
            $(
                #[doc = $p_doc]
                #[must_use]
                pub fn $p_field(&self) -> $p_type {
                    self.$p_field
                }

                paste::paste! {
                    #[doc = $p_doc]
                    pub fn [<set_ $p_field>](&mut self, value: $p_type) {
                        if self.$p_field != value {
                            self.$p_field = value;
                            self.dirty |= $concern;
                        }
                    }
                }
            )*

            /// Visits every slot in declaration order with its current texture.
            #[allow(dead_code)]
            pub(crate) fn visit_slot_table(
                &self,
                visitor: &mut dyn FnMut(
                    &'static $crate::resources::material::SlotDesc,
                    Option<&$crate::resources::texture::TextureRef>,
                ),
            ) {
                $(
                    visitor(&$slot, self.$t_field.as_ref());
                )*
            }

            /// Concerns touched since the last call.
            #[allow(dead_code)]
            pub(crate) fn take_dirty_flags(&mut self) -> $crate::resources::shader_defines::DirtyFlags {
                std::mem::take(&mut self.dirty)
            }
        }
    };
}
