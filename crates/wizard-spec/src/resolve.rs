use std::collections::BTreeSet;

use serde_json::Value;

use crate::definition::WizardDefinition;
use crate::options::{OptionCache, OptionItem};
use crate::spec::{FieldId, FieldKind};
use crate::store::FieldStore;

/// Fields touched by one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Fields whose value was reset to the default or emptied, in reset order.
    pub cleared: Vec<FieldId>,
    /// Fields whose option sets must be recomputed.
    pub stale: Vec<FieldId>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty() && self.stale.is_empty()
    }

    fn absorb(&mut self, other: Resolution) {
        for id in other.cleared {
            if !self.cleared.contains(&id) {
                self.cleared.push(id);
            }
        }
        for id in other.stale {
            if !self.stale.contains(&id) {
                self.stale.push(id);
            }
        }
    }
}

/// Applies a definition's dependency rules to a store.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Runs the cascade for a changed field in one topological pass. Each
    /// reachable field is handled once; a clear target propagates to its own
    /// dependents even when it was already empty, a merely stale one does not
    /// until its options are refreshed.
    pub fn resolve(
        definition: &WizardDefinition,
        store: &mut FieldStore,
        changed: &str,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        let mut pending: BTreeSet<(usize, FieldId)> = BTreeSet::new();
        let mut clear: BTreeSet<FieldId> = BTreeSet::new();
        let mut recompute: BTreeSet<FieldId> = BTreeSet::new();
        let mut handled: BTreeSet<FieldId> = BTreeSet::new();

        enqueue(definition, changed, &mut pending, &mut clear, &mut recompute);
        while let Some((_, id)) = pending.pop_first() {
            if !handled.insert(id.clone()) {
                continue;
            }
            if recompute.contains(&id) {
                resolution.stale.push(id.clone());
            }
            if clear.contains(&id) {
                let default = definition
                    .field(&id)
                    .and_then(|field| field.default_value.as_ref());
                if store.reset(&id, default).is_change() {
                    resolution.cleared.push(id.clone());
                }
                enqueue(definition, &id, &mut pending, &mut clear, &mut recompute);
            }
        }
        resolution
    }

    /// Recomputes stale option sets for `fields` in topological order. A value
    /// that is no longer offered is dropped (pruned, for multi-selects) and the
    /// drop cascades like an edit.
    pub fn refresh<'a, I>(
        definition: &WizardDefinition,
        store: &mut FieldStore,
        cache: &mut OptionCache,
        fields: I,
    ) -> Resolution
    where
        I: IntoIterator<Item = &'a str>,
    {
        let requested: BTreeSet<FieldId> = fields.into_iter().map(str::to_string).collect();
        let mut queue: BTreeSet<(usize, FieldId)> = requested
            .iter()
            .map(|id| (definition.rank(id), id.clone()))
            .collect();
        let mut resolution = Resolution::default();

        while let Some((_, id)) = queue.pop_first() {
            if !cache.is_stale(&id) {
                continue;
            }
            let Some(field) = definition.field(&id) else {
                continue;
            };
            let Some(items) = definition.compute_options(&id, store) else {
                continue;
            };
            let retained = store
                .get(&id)
                .and_then(|value| retain_offered(field.kind, value, &items));
            cache.store(&id, items);

            if let Some(next) = retained {
                let change = store.set(id.clone(), next);
                if change.is_change() {
                    resolution.cleared.push(id.clone());
                    let cascade = Self::resolve(definition, store, &id);
                    for stale in &cascade.stale {
                        cache.mark_stale(stale.clone());
                        if requested.contains(stale) {
                            queue.insert((definition.rank(stale), stale.clone()));
                        }
                    }
                    resolution.absorb(cascade);
                }
            }
        }
        resolution
    }
}

fn enqueue(
    definition: &WizardDefinition,
    trigger: &str,
    pending: &mut BTreeSet<(usize, FieldId)>,
    clear: &mut BTreeSet<FieldId>,
    recompute: &mut BTreeSet<FieldId>,
) {
    if let Some(rule) = definition.rule_for(trigger) {
        for id in &rule.clear {
            clear.insert(id.clone());
            pending.insert((definition.rank(id), id.clone()));
        }
        for id in &rule.recompute {
            recompute.insert(id.clone());
            pending.insert((definition.rank(id), id.clone()));
        }
    }
}

// Replacement value when the current one references options that are gone.
fn retain_offered(kind: FieldKind, value: &Value, items: &[OptionItem]) -> Option<Value> {
    let offered = |id: &str| items.iter().any(|item| item.id == id);
    match (kind, value) {
        (FieldKind::MultiSelect, Value::Array(selected)) => {
            let kept: Vec<Value> = selected
                .iter()
                .filter(|entry| entry.as_str().is_some_and(offered))
                .cloned()
                .collect();
            (kept.len() != selected.len()).then(|| {
                if kept.is_empty() {
                    Value::Null
                } else {
                    Value::Array(kept)
                }
            })
        }
        (FieldKind::Select, Value::String(selected)) if !offered(selected.as_str()) => {
            Some(Value::Null)
        }
        _ => None,
    }
}
