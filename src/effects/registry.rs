//! Effect registry for managing available effect passes
//!
//! The registry holds all registered effect definitions and creates
//! backend programs for them by type.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::EffectError;
use super::traits::{EffectDefinition, ProgramId, RenderBackend};
use super::types::EffectUniform;

/// Registry of available effects
///
/// Effects are registered at startup and can be queried by type or category.
pub struct EffectRegistry {
    /// Effect definitions by type identifier
    effects: HashMap<String, Arc<dyn EffectDefinition>>,
    /// Effect types grouped by category
    categories: HashMap<String, Vec<String>>,
    /// Ordered list of categories
    category_order: Vec<String>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
            categories: HashMap::new(),
            category_order: Vec::new(),
        }
    }

    /// Create a registry with the built-in effects registered
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        super::builtin::register_builtin_effects(&mut registry);
        registry
    }

    /// Register an effect definition
    ///
    /// Registering a type twice replaces the earlier definition.
    pub fn register(&mut self, definition: impl EffectDefinition + 'static) {
        let effect_type = definition.effect_type().to_string();
        let category = definition.category().to_string();

        if let Some(previous) = self.effects.get(&effect_type) {
            tracing::debug!(effect_type = %effect_type, "Replacing registered effect");
            let previous_category = previous.category();
            if previous_category != category {
                self.remove_from_category(previous_category, &effect_type);
            }
        }

        let listed = self
            .categories
            .get(&category)
            .is_some_and(|types| types.contains(&effect_type));
        if !listed {
            if !self.categories.contains_key(&category) {
                self.category_order.push(category.clone());
            }
            self.categories.entry(category).or_default().push(effect_type.clone());
        }

        self.effects.insert(effect_type, Arc::new(definition));
    }

    /// Drop an effect type from a category, removing the category once empty
    fn remove_from_category(&mut self, category: &str, effect_type: &str) {
        let Some(types) = self.categories.get_mut(category) else {
            return;
        };
        types.retain(|t| t != effect_type);
        if types.is_empty() {
            self.categories.remove(category);
            self.category_order.retain(|c| c != category);
        }
    }

    /// Get an effect definition by type
    pub fn get(&self, effect_type: &str) -> Option<Arc<dyn EffectDefinition>> {
        self.effects.get(effect_type).cloned()
    }

    /// Check if an effect type is registered
    pub fn contains(&self, effect_type: &str) -> bool {
        self.effects.contains_key(effect_type)
    }

    /// Get all registered effect types
    pub fn effect_types(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Get all category names in registration order
    pub fn categories(&self) -> &[String] {
        &self.category_order
    }

    /// Get all effect types in a category
    pub fn effects_in_category(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(|v| v.as_slice())
    }

    /// Get the uniforms an effect type is bound with
    pub fn uniforms(&self, effect_type: &str) -> Option<&'static [EffectUniform]> {
        self.effects.get(effect_type).map(|def| def.uniforms())
    }

    /// Get the display name for an effect type
    pub fn display_name(&self, effect_type: &str) -> Option<&'static str> {
        self.effects.get(effect_type).map(|def| def.display_name())
    }

    /// Create a backend program for an effect type
    pub fn create_program<B: RenderBackend + ?Sized>(
        &self,
        effect_type: &str,
        backend: &mut B,
    ) -> Result<ProgramId, EffectError> {
        let definition = self
            .effects
            .get(effect_type)
            .ok_or_else(|| EffectError::UnknownEffect(effect_type.to_string()))?;
        backend.create_program(definition.as_ref())
    }

    /// Get all effects matching a filter
    pub fn search(&self, query: &str) -> Vec<Arc<dyn EffectDefinition>> {
        let query_lower = query.to_lowercase();
        self.effects
            .values()
            .filter(|def| {
                def.display_name().to_lowercase().contains(&query_lower)
                    || def.effect_type().to_lowercase().contains(&query_lower)
                    || def.category().to_lowercase().contains(&query_lower)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::traits::CpuKernel;

    // Mock effect for testing
    struct MockEffect {
        effect_type: &'static str,
        display_name: &'static str,
        category: &'static str,
    }

    impl EffectDefinition for MockEffect {
        fn effect_type(&self) -> &'static str {
            self.effect_type
        }

        fn display_name(&self) -> &'static str {
            self.display_name
        }

        fn category(&self) -> &'static str {
            self.category
        }

        fn uniforms(&self) -> &'static [EffectUniform] {
            &[EffectUniform::Radius]
        }

        fn wgsl_source(&self) -> Option<&'static str> {
            None
        }

        fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>> {
            None
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = EffectRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_register() {
        let mut registry = EffectRegistry::new();

        registry.register(MockEffect {
            effect_type: "test_effect",
            display_name: "Test Effect",
            category: "Test",
        });

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("test_effect"));
        assert_eq!(registry.uniforms("test_effect"), Some(&[EffectUniform::Radius][..]));
    }

    #[test]
    fn test_registry_replace_keeps_single_category_entry() {
        let mut registry = EffectRegistry::new();
        for _ in 0..2 {
            registry.register(MockEffect {
                effect_type: "grain",
                display_name: "Grain",
                category: "Stylize",
            });
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.effects_in_category("Stylize").unwrap().len(), 1);
    }

    #[test]
    fn test_registry_replace_moves_category() {
        let mut registry = EffectRegistry::new();
        registry.register(MockEffect {
            effect_type: "grain",
            display_name: "Grain",
            category: "Stylize",
        });
        registry.register(MockEffect {
            effect_type: "emboss",
            display_name: "Emboss",
            category: "Stylize",
        });
        registry.register(MockEffect {
            effect_type: "grain",
            display_name: "Grain",
            category: "Noise",
        });

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.effects_in_category("Stylize").unwrap(), &["emboss".to_string()]);
        assert_eq!(registry.effects_in_category("Noise").unwrap(), &["grain".to_string()]);
        assert_eq!(registry.categories(), &["Stylize".to_string(), "Noise".to_string()]);

        // Moving the last member drops the old category
        registry.register(MockEffect {
            effect_type: "emboss",
            display_name: "Emboss",
            category: "Noise",
        });
        assert!(registry.effects_in_category("Stylize").is_none());
        assert_eq!(registry.categories(), &["Noise".to_string()]);
        assert_eq!(registry.effects_in_category("Noise").unwrap().len(), 2);
    }

    #[test]
    fn test_registry_categories() {
        let mut registry = EffectRegistry::new();

        registry.register(MockEffect {
            effect_type: "impasto",
            display_name: "Impasto",
            category: "Stylize",
        });
        registry.register(MockEffect {
            effect_type: "emboss",
            display_name: "Emboss",
            category: "Stylize",
        });
        registry.register(MockEffect {
            effect_type: "blur",
            display_name: "Blur",
            category: "Blur",
        });

        assert_eq!(registry.categories(), &["Stylize".to_string(), "Blur".to_string()]);
        assert_eq!(registry.effects_in_category("Stylize").unwrap().len(), 2);
        assert_eq!(registry.effects_in_category("Blur").unwrap().len(), 1);
    }

    #[test]
    fn test_registry_search() {
        let mut registry = EffectRegistry::new();

        registry.register(MockEffect {
            effect_type: "vignette",
            display_name: "Vignette",
            category: "Lens",
        });
        registry.register(MockEffect {
            effect_type: "chromatic",
            display_name: "Chromatic Aberration",
            category: "Lens",
        });

        assert_eq!(registry.search("lens").len(), 2);
        assert_eq!(registry.search("VIGN").len(), 1);
    }

    #[test]
    fn test_builtin_registry() {
        let registry = EffectRegistry::with_builtin();
        for effect_type in ["impasto", "surface_normal", "blur", "vignette", "painterly"] {
            assert!(registry.contains(effect_type), "{} not registered", effect_type);
        }
        assert_eq!(registry.uniforms("painterly").map(|u| u.len()), Some(5));
    }
}
