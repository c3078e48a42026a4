//! Effect Fallback Chain
//!
//! Ordered degradation steps tried when a program fails to compile. Each step
//! removes defines from the permutation and the program is requested again.
//!
//! - CPU skinning, when registered, is always tried first: bone defines are
//!   stripped and the effect is flagged so bones are skinned on the CPU.
//! - Define groups follow in ascending rank order; every define sharing a
//!   rank is removed in the same step.
//! - Steps that would not change the permutation are skipped.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::resources::shader_defines::DefineSet;
use crate::utils::interner::{self, Symbol};

/// Defines removed by the CPU-skinning step.
const GPU_SKINNING_DEFINES: &[&str] = &["NUM_BONE_INFLUENCERS", "BonesPerMesh", "BONETEXTURE"];

#[derive(Debug, Clone, Default)]
pub struct FallbackChain {
    groups: BTreeMap<u32, SmallVec<[Symbol; 4]>>,
    cpu_skinning_rank: Option<u32>,
    bones_forced_to_cpu: bool,
}

impl FallbackChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes `define` at step `rank`; equal ranks are stripped together.
    pub fn add_fallback(&mut self, rank: u32, define: &str) {
        let group = self.groups.entry(rank).or_default();
        let sym = interner::intern(define);
        if !group.contains(&sym) {
            group.push(sym);
        }
    }

    /// Allows degrading GPU skinning to CPU skinning.
    pub fn add_cpu_skinning_fallback(&mut self, rank: u32) {
        self.cpu_skinning_rank = Some(self.cpu_skinning_rank.map_or(rank, |r| r.min(rank)));
    }

    #[must_use]
    pub fn has_more_fallbacks(&self) -> bool {
        self.cpu_skinning_rank.is_some() || !self.groups.is_empty()
    }

    /// Set once the CPU-skinning step produced the current permutation.
    #[must_use]
    pub fn bones_forced_to_cpu(&self) -> bool {
        self.bones_forced_to_cpu
    }

    /// Applies the next step that changes `defines`.
    ///
    /// Returns `None` once every step is consumed.
    pub fn reduce(&mut self, defines: &str) -> Option<String> {
        if self.cpu_skinning_rank.take().is_some() {
            let stripped =
                strip_defines(defines, |name| GPU_SKINNING_DEFINES.iter().any(|d| *d == name));
            if stripped != defines {
                log::debug!("Fallback: skinning moved to the CPU");
                self.bones_forced_to_cpu = true;
                return Some(stripped);
            }
        }

        while let Some((rank, group)) = self.groups.pop_first() {
            let stripped = strip_defines(defines, |name| {
                interner::get(name).is_some_and(|sym| group.contains(&sym))
            });
            if stripped != defines {
                log::debug!(
                    "Fallback rank {rank}: removed {:?}",
                    group.iter().map(|s| interner::resolve(*s)).collect::<Vec<_>>()
                );
                return Some(stripped);
            }
        }
        None
    }
}

fn strip_defines(defines: &str, remove: impl Fn(&str) -> bool) -> String {
    let mut out = String::with_capacity(defines.len());
    for line in defines.lines() {
        let name = line
            .strip_prefix("#define ")
            .and_then(|rest| rest.split_whitespace().next());
        if name.is_some_and(&remove) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Adds light and shadow fallbacks for up to `max_lights` active lights.
///
/// Light `i > 0` is dropped at `rank + i`; active shadow variants are dropped
/// at `rank`. Returns the next free rank.
pub fn handle_fallbacks_for_shadows(
    defines: &DefineSet,
    chain: &mut FallbackChain,
    max_lights: u32,
    rank: u32,
) -> u32 {
    const SHADOW_VARIANTS: &[&str] = &[
        "SHADOW",
        "SHADOWPCF",
        "SHADOWPCSS",
        "SHADOWPOISSON",
        "SHADOWESM",
        "SHADOWCLOSEESM",
    ];

    let mut last_rank = rank;
    for index in 0..max_lights {
        let light = format!("LIGHT{index}");
        if !defines.is_set(&light) {
            break;
        }
        if index > 0 {
            last_rank = rank + index;
            chain.add_fallback(last_rank, &light);
        }
        for variant in SHADOW_VARIANTS {
            let name = format!("{variant}{index}");
            if defines.is_set(&name) {
                chain.add_fallback(rank, &name);
            }
        }
    }
    last_rank + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::shader_defines::DirtyFlags;

    #[test]
    fn test_ranks_consumed_in_order() {
        let mut chain = FallbackChain::new();
        chain.add_fallback(1, "FOG");
        chain.add_fallback(0, "BUMP");
        chain.add_fallback(0, "PARALLAX");

        let defines = "#define BUMP\n#define PARALLAX\n#define FOG\n";
        let first = chain.reduce(defines).unwrap();
        assert_eq!(first, "#define FOG\n");
        let second = chain.reduce(&first).unwrap();
        assert_eq!(second, "");
        assert!(chain.reduce(&second).is_none());
    }

    #[test]
    fn test_noop_groups_are_skipped() {
        let mut chain = FallbackChain::new();
        chain.add_fallback(0, "REFLECTION");
        chain.add_fallback(1, "FOG");

        let reduced = chain.reduce("#define FOG\n#define DIFFUSE\n").unwrap();
        assert_eq!(reduced, "#define DIFFUSE\n");
        assert!(!chain.has_more_fallbacks());
    }

    #[test]
    fn test_prefix_names_survive() {
        let mut chain = FallbackChain::new();
        chain.add_fallback(0, "LIGHT1");
        let reduced = chain.reduce("#define LIGHT1\n#define LIGHT10\n").unwrap();
        assert_eq!(reduced, "#define LIGHT10\n");
    }

    #[test]
    fn test_cpu_skinning_goes_first() {
        let mut chain = FallbackChain::new();
        chain.add_fallback(0, "FOG");
        chain.add_cpu_skinning_fallback(3);

        let reduced = chain
            .reduce("#define NUM_BONE_INFLUENCERS 4\n#define BonesPerMesh 32\n#define FOG\n")
            .unwrap();
        assert_eq!(reduced, "#define FOG\n");
        assert!(chain.bones_forced_to_cpu());
    }

    #[test]
    fn test_shadow_fallbacks() {
        let mut b = DefineSet::builder();
        b.flags(&["LIGHT0", "LIGHT1", "SHADOW0", "SHADOWPCF0"], DirtyFlags::LIGHTS);
        let mut defines = b.build();
        for name in ["LIGHT0", "LIGHT1", "SHADOW0", "SHADOWPCF0"] {
            defines.set(name, true);
        }

        let mut chain = FallbackChain::new();
        let next = handle_fallbacks_for_shadows(&defines, &mut chain, 4, 2);
        assert_eq!(next, 4);

        let reduced = chain
            .reduce("#define LIGHT0\n#define LIGHT1\n#define SHADOW0\n#define SHADOWPCF0\n")
            .unwrap();
        assert_eq!(reduced, "#define LIGHT0\n#define LIGHT1\n");
        assert_eq!(chain.reduce(&reduced).unwrap(), "#define LIGHT0\n");
    }
}
