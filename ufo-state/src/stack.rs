//! LIFO effect stack
//!
//! Each entry records the exact device query that reproduces what was
//! showing while that layer was on top, so unwinding the stack is a matter of
//! re-sending patterns in reverse push order. Synthetic layers (ad hoc
//! multi-field configuration) unwind exactly like catalog effects.
//!
//! The stack itself is a plain data structure; [`StateManager`] owns it
//! behind the same lock as the shadow state.
//!
//! [`StateManager`]: crate::StateManager

use serde::Serialize;

/// Name of the layer pushed by multi-field lighting configuration
pub const CONFIG_EFFECT_NAME: &str = "__config__";

/// Name of the pseudo-entry returned when popping past the last layer
pub const BASE_STATE_NAME: &str = "__base_state__";

/// Flags describing how a layer behaves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectContext {
    /// Never expires on its own
    pub perpetual: bool,
    /// Milliseconds until the layer should expire, `0` for none
    pub duration_ms: u64,
    /// Not backed by a catalog effect
    pub synthetic: bool,
    /// The base-state fallback rather than a pushed layer
    pub is_base: bool,
}

impl EffectContext {
    pub fn perpetual() -> Self {
        Self {
            perpetual: true,
            ..Default::default()
        }
    }

    pub fn timed(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            ..Default::default()
        }
    }

    /// Mark the layer as synthetic
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Whether the caller should schedule an expiry for this layer
    pub fn is_timed(&self) -> bool {
        !self.perpetual && self.duration_ms > 0
    }
}

/// One layer of display history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectEntry {
    pub name: String,
    /// Device query that reproduces this layer
    pub pattern: String,
    pub context: EffectContext,
    /// Identity assigned at push time, `0` for the base-state entry
    pub generation: u64,
}

impl EffectEntry {
    fn base_state(pattern: &str) -> Self {
        Self {
            name: BASE_STATE_NAME.to_string(),
            pattern: pattern.to_string(),
            context: EffectContext {
                synthetic: true,
                is_base: true,
                ..Default::default()
            },
            generation: 0,
        }
    }

    pub fn is_base(&self) -> bool {
        self.context.is_base
    }
}

/// Outcome of a generation-guarded expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// The expiring layer is no longer on top; nothing changed
    Stale,
    /// The layer was removed; re-send this entry's pattern
    Restore(EffectEntry),
    /// The layer was removed and nothing is left to restore
    Clear,
}

/// Result of removing the top layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popped {
    pub removed: EffectEntry,
    /// What should now be displayed, `None` to clear the device
    pub restore: Option<EffectEntry>,
}

/// Effect layers plus the optional base-state fallback
#[derive(Debug, Clone, Default)]
pub struct EffectStack {
    entries: Vec<EffectEntry>,
    base_state: String,
    last_generation: u64,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer and return its generation
    pub fn push(&mut self, name: String, pattern: String, context: EffectContext) -> u64 {
        self.last_generation += 1;
        let generation = self.last_generation;
        self.entries.push(EffectEntry {
            name,
            pattern,
            context,
            generation,
        });
        generation
    }

    /// Remove the top layer and return what should now be displayed
    ///
    /// Returns the new top when one remains, a base-state entry when the last
    /// layer was removed and a base state is configured, and `None`
    /// otherwise. Popping an empty stack is a no-op returning `None`.
    pub fn pop(&mut self) -> Option<EffectEntry> {
        self.pop_layer().and_then(|popped| popped.restore)
    }

    /// Like [`pop`](Self::pop), but also hand back the removed layer
    ///
    /// `None` only when the stack was already empty.
    pub fn pop_layer(&mut self) -> Option<Popped> {
        let removed = self.entries.pop()?;

        let restore = match self.entries.last() {
            Some(top) => Some(top.clone()),
            None if !self.base_state.is_empty() => Some(EffectEntry::base_state(&self.base_state)),
            None => None,
        };
        Some(Popped { removed, restore })
    }

    /// Pop only if the top layer carries `generation`
    pub fn expire(&mut self, generation: u64) -> Expiry {
        match self.entries.last() {
            Some(top) if top.generation == generation => match self.pop() {
                Some(entry) => Expiry::Restore(entry),
                None => Expiry::Clear,
            },
            _ => Expiry::Stale,
        }
    }

    pub fn peek(&self) -> Option<&EffectEntry> {
        self.entries.last()
    }

    /// Name of the top layer, empty when the stack is empty
    pub fn current_name(&self) -> &str {
        self.peek().map(|e| e.name.as_str()).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectEntry> {
        self.entries.iter()
    }

    /// Set the fallback pattern; an empty string disables it
    pub fn set_base_state(&mut self, pattern: String) {
        self.base_state = pattern;
    }

    pub fn base_state(&self) -> &str {
        &self.base_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(stack: &mut EffectStack, name: &str, pattern: &str, context: EffectContext) -> u64 {
        stack.push(name.to_string(), pattern.to_string(), context)
    }

    #[test]
    fn test_push_n_pop_n_minus_one() {
        let mut stack = EffectStack::new();
        for i in 0..5 {
            push(&mut stack, &format!("e{}", i), &format!("p{}", i), EffectContext::perpetual());
        }
        for _ in 0..4 {
            assert!(stack.pop().is_some());
        }

        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.peek().map(|e| e.name.as_str()), Some("e0"));
    }

    #[test]
    fn test_pop_last_without_base_state() {
        let mut stack = EffectStack::new();
        push(&mut stack, "X", "patternX", EffectContext::perpetual());

        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
        assert_eq!(stack.current_name(), "");
    }

    #[test]
    fn test_pop_last_with_base_state() {
        let mut stack = EffectStack::new();
        stack.set_base_state("dim=100&logo=on".to_string());
        push(&mut stack, "X", "patternX", EffectContext::perpetual());

        let entry = stack.pop().unwrap();
        assert_eq!(entry.name, BASE_STATE_NAME);
        assert_eq!(entry.pattern, "dim=100&logo=on");
        assert!(entry.context.synthetic);
        assert!(entry.is_base());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_pop_empty_is_noop() {
        let mut stack = EffectStack::new();
        stack.set_base_state("logo=on".to_string());
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_pop_layer_reports_removed() {
        let mut stack = EffectStack::new();
        assert_eq!(stack.pop_layer(), None);

        push(&mut stack, "X", "patternX", EffectContext::perpetual());
        push(&mut stack, "A", "patternA", EffectContext::timed(1000));

        let popped = stack.pop_layer().unwrap();
        assert_eq!(popped.removed.name, "A");
        assert_eq!(popped.restore.map(|e| e.name), Some("X".to_string()));

        let popped = stack.pop_layer().unwrap();
        assert_eq!(popped.removed.name, "X");
        assert_eq!(popped.restore, None);
    }

    #[test]
    fn test_generations_increase() {
        let mut stack = EffectStack::new();
        let a = push(&mut stack, "a", "", EffectContext::default());
        let b = push(&mut stack, "b", "", EffectContext::default());
        stack.pop();
        let c = push(&mut stack, "c", "", EffectContext::default());
        assert!(a < b && b < c);
    }

    #[test]
    fn test_expire_only_matching_top() {
        let mut stack = EffectStack::new();
        push(&mut stack, "base", "p0", EffectContext::perpetual());
        let timed = push(&mut stack, "alert", "p1", EffectContext::timed(5000));

        // a manual stop removed the timed layer and something new went on top
        stack.pop();
        let newer = push(&mut stack, "other", "p2", EffectContext::perpetual());

        assert_eq!(stack.expire(timed), Expiry::Stale);
        assert_eq!(stack.depth(), 2);

        match stack.expire(newer) {
            Expiry::Restore(entry) => assert_eq!(entry.name, "base"),
            other => panic!("unexpected expiry {:?}", other),
        }
    }

    #[test]
    fn test_expire_last_layer() {
        let mut stack = EffectStack::new();
        let gen = push(&mut stack, "alert", "p1", EffectContext::timed(100));
        assert_eq!(stack.expire(gen), Expiry::Clear);

        let gen = push(&mut stack, "alert", "p1", EffectContext::timed(100));
        stack.set_base_state("logo=on".to_string());
        assert!(matches!(stack.expire(gen), Expiry::Restore(e) if e.is_base()));
        assert_eq!(stack.expire(gen), Expiry::Stale);
    }

    #[test]
    fn test_context_timing() {
        assert!(EffectContext::timed(5000).is_timed());
        assert!(!EffectContext::timed(0).is_timed());
        assert!(!EffectContext::perpetual().is_timed());
        assert!(EffectContext::perpetual().synthetic().synthetic);
    }
}
