//! Shader sources
//!
//! Effect fragment shaders are written against a shared prelude that holds
//! the full-screen vertex stage, the group 0 bindings and sampling helpers.
//! `compose_effect_shader` glues the two into one WGSL module.

/// Full-screen vertex stage, bindings and helpers shared by every pass
pub const FULLSCREEN_QUAD_SHADER: &str = include_str!("fullscreen_quad.wgsl");

/// Fragment stage of the unmodified copy used for blits
pub const COPY_SHADER: &str = include_str!("copy.wgsl");

/// Vertex entry point of composed modules
pub const VERTEX_ENTRY: &str = "vs_main";

/// Fragment entry point of composed modules
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Build a complete WGSL module from an effect fragment source
pub fn compose_effect_shader(fragment: &str) -> String {
    format!("{}\n{}", FULLSCREEN_QUAD_SHADER, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectRegistry;

    #[test]
    fn test_prelude_declares_bindings() {
        assert!(FULLSCREEN_QUAD_SHADER.contains("fn vs_main"));
        for binding in ["@binding(0)", "@binding(1)", "@binding(2)"] {
            assert!(FULLSCREEN_QUAD_SHADER.contains(binding), "missing {}", binding);
        }
    }

    #[test]
    fn test_builtin_fragments_compose() {
        let registry = EffectRegistry::with_builtin();
        for effect_type in registry.effect_types() {
            let definition = registry.get(effect_type).unwrap();
            let fragment = definition.wgsl_source().unwrap();
            assert!(!fragment.contains("fn vs_main"), "{} redefines the vertex stage", effect_type);

            let module = compose_effect_shader(fragment);
            assert!(module.contains("fn vs_main"));
            assert!(module.contains("fn fs_main"), "{} has no fragment entry", effect_type);
        }
    }

    #[test]
    fn test_copy_shader_composes() {
        let module = compose_effect_shader(COPY_SHADER);
        assert!(module.contains(FRAGMENT_ENTRY));
        assert!(module.contains(VERTEX_ENTRY));
    }
}
