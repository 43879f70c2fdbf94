//! Hook registry.
//!
//! Maps each [`TemplateType`] to the ordered list of hooks that must load
//! before a popup of that template renders. Order is registration order and
//! is the order results are reported in.

use std::collections::HashMap;
use std::sync::Arc;

use popgate_core::TemplateType;
use tracing::debug;

use crate::handler::PreDisplayHook;
use crate::types::HookInfo;

/// Template type → resource hooks.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<TemplateType, Vec<Arc<dyn PreDisplayHook>>>,
}

impl HookRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for `template_type`.
    ///
    /// A hook with the same name already registered for the template is
    /// replaced in place, keeping its position.
    pub fn register(&mut self, template_type: TemplateType, hook: Arc<dyn PreDisplayHook>) {
        let hooks = self.hooks.entry(template_type).or_default();
        debug!(name = %hook.name(), template_type = %template_type, "registering hook");
        match hooks.iter_mut().find(|existing| existing.name() == hook.name()) {
            Some(existing) => *existing = hook,
            None => hooks.push(hook),
        }
    }

    /// Register `hook` under every template in `template_types`.
    pub fn register_for(&mut self, template_types: &[TemplateType], hook: &Arc<dyn PreDisplayHook>) {
        for template_type in template_types {
            self.register(*template_type, Arc::clone(hook));
        }
    }

    /// Remove the hook named `name` from every template.
    ///
    /// Returns `true` if anything was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let mut found = false;
        for hooks in self.hooks.values_mut() {
            let before = hooks.len();
            hooks.retain(|hook| hook.name() != name);
            found |= hooks.len() < before;
        }
        self.hooks.retain(|_, hooks| !hooks.is_empty());
        if found {
            debug!(name = %name, "unregistered hook");
        }
        found
    }

    /// Hooks for `template_type`, in registration order.
    #[must_use]
    pub fn get_hooks(&self, template_type: TemplateType) -> Vec<Arc<dyn PreDisplayHook>> {
        self.hooks.get(&template_type).cloned().unwrap_or_default()
    }

    /// A registered hook by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn PreDisplayHook>> {
        self.hooks
            .values()
            .flatten()
            .find(|hook| hook.name() == name)
            .map(Arc::clone)
    }

    /// One entry per distinct hook name, sorted by name.
    #[must_use]
    pub fn list_all(&self) -> Vec<HookInfo> {
        let mut infos: Vec<HookInfo> = Vec::new();
        for (template_type, hooks) in &self.hooks {
            for hook in hooks {
                if let Some(info) = infos.iter_mut().find(|info| info.name == hook.name()) {
                    info.template_types.push(*template_type);
                    continue;
                }
                infos.push(HookInfo {
                    name: hook.name().to_string(),
                    template_types: vec![*template_type],
                    run_in_preview: hook.run_in_preview(),
                    timeout_ms: hook.timeout_ms(),
                    description: hook.description().map(ToString::to_string),
                });
            }
        }
        for info in &mut infos {
            info.template_types.sort_by_key(ToString::to_string);
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Total registrations across all templates.
    #[must_use]
    pub fn count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Remove every hook.
    pub fn clear(&mut self) {
        self.hooks.clear();
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_count", &self.count())
            .finish()
    }
}
