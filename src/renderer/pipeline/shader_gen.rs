//! Shader Code Generator
//!
//! Renders a shader family's templates with the permutation's defines as
//! template context, then prepends the define header.

use std::collections::BTreeMap;

use minijinja::{Environment, value::Value};
use serde::Serialize;

use crate::errors::Result;
use crate::renderer::backend::ShaderLanguage;

/// Rendered program stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    pub vertex: String,
    pub fragment: String,
}

#[derive(Serialize)]
struct ShaderContext<'a> {
    #[serde(flatten)]
    defines: BTreeMap<&'a str, Value>,
    shader_name: &'a str,
}

pub struct ShaderGenerator;

impl ShaderGenerator {
    /// Parses a `#define` header into template variables.
    ///
    /// Flags become `true`, integer values become numbers and anything else
    /// is kept as a string.
    #[must_use]
    pub fn parse_defines(defines: &str) -> BTreeMap<&str, Value> {
        defines
            .lines()
            .filter_map(|line| line.strip_prefix("#define "))
            .filter_map(|rest| {
                let mut parts = rest.splitn(2, ' ');
                let name = parts.next().filter(|n| !n.is_empty())?;
                let value = match parts.next().map(str::trim) {
                    None | Some("") => Value::from(true),
                    Some(v) => v
                        .parse::<i64>()
                        .map_or_else(|_| Value::from(v.to_string()), Value::from),
                };
                Some((name, value))
            })
            .collect()
    }

    pub fn generate(
        env: &Environment<'static>,
        name: &str,
        defines: &str,
        language: ShaderLanguage,
    ) -> Result<GeneratedSource> {
        let ctx = ShaderContext {
            defines: Self::parse_defines(defines),
            shader_name: name,
        };

        let vertex = env.get_template(&format!("{name}.vert"))?.render(&ctx)?;
        let fragment = env.get_template(&format!("{name}.frag"))?.render(&ctx)?;

        let header = Self::header(defines, language);
        Ok(GeneratedSource {
            vertex: format!("{header}{vertex}"),
            fragment: format!("{header}{fragment}"),
        })
    }

    fn header(defines: &str, language: ShaderLanguage) -> String {
        match language {
            ShaderLanguage::Glsl => defines.to_string(),
            // WGSL has no preprocessor; keep the permutation visible for debugging.
            ShaderLanguage::Wgsl => defines.lines().map(|line| format!("// {line}\n")).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::pipeline::shader_library::{ShaderLibrary, ShaderSource};

    #[test]
    fn test_parse_defines() {
        let parsed = ShaderGenerator::parse_defines("#define DIFFUSE\n#define NUM_BONE_INFLUENCERS 4\n#define ALPHATESTVALUE 0.5\n");
        assert_eq!(parsed.get("DIFFUSE"), Some(&Value::from(true)));
        assert_eq!(parsed.get("NUM_BONE_INFLUENCERS"), Some(&Value::from(4)));
        assert_eq!(parsed.get("ALPHATESTVALUE"), Some(&Value::from("0.5")));
    }

    #[test]
    fn test_templates_see_defines() {
        let mut library = ShaderLibrary::new().unwrap();
        library
            .register(
                "probe",
                ShaderSource::new(
                    "{$ if DIFFUSE is defined $}diffuse{$ else $}plain{$ endif $}",
                    "bones={{ NUM_BONE_INFLUENCERS | default(0) }}",
                ),
            )
            .unwrap();

        let out = library
            .generate("probe", "#define DIFFUSE\n#define NUM_BONE_INFLUENCERS 2\n", ShaderLanguage::Glsl)
            .unwrap();
        assert!(out.vertex.starts_with("#define DIFFUSE\n"));
        assert!(out.vertex.ends_with("diffuse"));
        assert!(out.fragment.ends_with("bones=2"));
    }
}
