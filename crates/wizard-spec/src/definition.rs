use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;
use thiserror::Error;

use crate::options::{FnProvider, OptionItem, OptionProvider, Upstream};
use crate::spec::{
    DependencyRule, FieldId, FieldRule, FieldSpec, StepRule, StepSpec, WizardSpec,
};
use crate::store::FieldStore;

/// Registered whole-step check; returns an error message when the step fails.
pub trait StepCheck: Send + Sync {
    fn check(&self, store: &FieldStore) -> Option<String>;
}

struct FnCheck<F>(F);

impl<F> StepCheck for FnCheck<F>
where
    F: Fn(&FieldStore) -> Option<String> + Send + Sync,
{
    fn check(&self, store: &FieldStore) -> Option<String> {
        (self.0)(store)
    }
}

/// Errors raised while building a definition. None of them can occur once
/// `build` has succeeded.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("wizard '{0}' has no steps")]
    EmptyWizard(String),
    #[error("step '{0}' is declared more than once")]
    DuplicateStep(String),
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("'{referenced_by}' references unknown field '{field}'")]
    UnknownField { field: String, referenced_by: String },
    #[error("field '{field}' uses unregistered option provider '{provider}'")]
    UnknownProvider { field: String, provider: String },
    #[error("step '{step}' uses unregistered check '{check}'")]
    UnknownCheck { step: String, check: String },
    #[error("field '{field}' has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<FieldId> },
}

/// Validated, immutable wizard definition.
pub struct WizardDefinition {
    spec: WizardSpec,
    field_index: BTreeMap<FieldId, (usize, usize)>,
    rules: BTreeMap<FieldId, DependencyRule>,
    rank: BTreeMap<FieldId, usize>,
    providers: BTreeMap<String, Arc<dyn OptionProvider>>,
    checks: BTreeMap<String, Arc<dyn StepCheck>>,
    patterns: BTreeMap<String, Regex>,
}

impl fmt::Debug for WizardDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardDefinition")
            .field("id", &self.spec.id)
            .field("version", &self.spec.version)
            .field("steps", &self.spec.steps.len())
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl WizardDefinition {
    pub fn builder(spec: WizardSpec) -> WizardDefinitionBuilder {
        WizardDefinitionBuilder {
            spec,
            providers: BTreeMap::new(),
            checks: BTreeMap::new(),
        }
    }

    pub fn spec(&self) -> &WizardSpec {
        &self.spec
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn version(&self) -> &str {
        &self.spec.version
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.spec.steps
    }

    pub fn step_count(&self) -> usize {
        self.spec.steps.len()
    }

    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        self.spec.steps.get(index)
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.spec.steps.iter().position(|step| step.id == step_id)
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        let (step, field) = self.field_index.get(id)?;
        self.spec.steps.get(*step)?.fields.get(*field)
    }

    /// Index of the step that owns the field.
    pub fn step_of_field(&self, id: &str) -> Option<usize> {
        self.field_index.get(id).map(|(step, _)| *step)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.spec.steps.iter().flat_map(|step| step.fields.iter())
    }

    /// Merged cascade for a trigger field.
    pub fn rule_for(&self, trigger: &str) -> Option<&DependencyRule> {
        self.rules.get(trigger)
    }

    /// Position of the field in the dependency graph's topological order.
    pub fn rank(&self, id: &str) -> usize {
        self.rank.get(id).copied().unwrap_or(usize::MAX)
    }

    pub fn provider(&self, id: &str) -> Option<&dyn OptionProvider> {
        self.providers.get(id).map(Arc::as_ref)
    }

    pub fn check(&self, id: &str) -> Option<&dyn StepCheck> {
        self.checks.get(id).map(Arc::as_ref)
    }

    /// Anchored regex compiled for a `pattern` rule.
    pub fn pattern(&self, source: &str) -> Option<&Regex> {
        self.patterns.get(source)
    }

    /// Computes the option set of a provider-backed field from the store.
    pub fn compute_options(&self, id: &str, store: &FieldStore) -> Option<Vec<OptionItem>> {
        let field = self.field(id)?;
        let provider = self.provider(field.options.as_deref()?)?;
        Some(provider.options(&Upstream::for_field(field, store)))
    }

    /// Store seeded with every declared default.
    pub fn default_store(&self) -> FieldStore {
        let mut store = FieldStore::new();
        for field in self.fields() {
            if let Some(default) = &field.default_value {
                store.set(field.id.clone(), default.clone());
            }
        }
        store
    }
}

pub struct WizardDefinitionBuilder {
    spec: WizardSpec,
    providers: BTreeMap<String, Arc<dyn OptionProvider>>,
    checks: BTreeMap<String, Arc<dyn StepCheck>>,
}

impl WizardDefinitionBuilder {
    pub fn option_provider(
        mut self,
        id: impl Into<String>,
        provider: impl OptionProvider + 'static,
    ) -> Self {
        self.providers.insert(id.into(), Arc::new(provider));
        self
    }

    pub fn option_fn<F>(self, id: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&Upstream) -> Vec<OptionItem> + Send + Sync + 'static,
    {
        self.option_provider(id, FnProvider(provider))
    }

    pub fn shared_provider(mut self, id: impl Into<String>, provider: Arc<dyn OptionProvider>) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    pub fn check(mut self, id: impl Into<String>, check: impl StepCheck + 'static) -> Self {
        self.checks.insert(id.into(), Arc::new(check));
        self
    }

    pub fn check_fn<F>(self, id: impl Into<String>, check: F) -> Self
    where
        F: Fn(&FieldStore) -> Option<String> + Send + Sync + 'static,
    {
        self.check(id, FnCheck(check))
    }

    pub fn build(self) -> Result<WizardDefinition, DefinitionError> {
        let spec = self.spec;
        if spec.steps.is_empty() {
            return Err(DefinitionError::EmptyWizard(spec.id.clone()));
        }

        let field_index = index_fields(&spec)?;
        let known = |field: &str, referenced_by: &str| {
            if field_index.contains_key(field) {
                Ok(())
            } else {
                Err(DefinitionError::UnknownField {
                    field: field.to_string(),
                    referenced_by: referenced_by.to_string(),
                })
            }
        };

        let mut patterns = BTreeMap::new();
        for step in &spec.steps {
            for field in &step.fields {
                for upstream in &field.depends_on {
                    known(upstream, &field.id)?;
                }
                for rule in &field.rules {
                    if let Some(other) = rule.referenced_field() {
                        known(other, &field.id)?;
                    }
                }
                if let Some(provider) = &field.options
                    && !self.providers.contains_key(provider)
                {
                    return Err(DefinitionError::UnknownProvider {
                        field: field.id.clone(),
                        provider: provider.clone(),
                    });
                }
                compile_patterns(field, &mut patterns)?;
            }
            for rule in &step.rules {
                known(rule.field(), &step.id)?;
                if let StepRule::Custom { check, .. } = rule
                    && !self.checks.contains_key(check)
                {
                    return Err(DefinitionError::UnknownCheck {
                        step: step.id.clone(),
                        check: check.clone(),
                    });
                }
            }
        }

        let rules = merge_rules(&spec)?;
        for rule in rules.values() {
            known(&rule.trigger, "dependencies")?;
            for target in rule.targets() {
                known(target, &rule.trigger)?;
            }
        }
        let rank = topological_rank(&field_index, &rules)?;

        Ok(WizardDefinition {
            spec,
            field_index,
            rules,
            rank,
            providers: self.providers,
            checks: self.checks,
            patterns,
        })
    }
}

fn index_fields(spec: &WizardSpec) -> Result<BTreeMap<FieldId, (usize, usize)>, DefinitionError> {
    let mut steps = BTreeSet::new();
    let mut index = BTreeMap::new();
    for (step_idx, step) in spec.steps.iter().enumerate() {
        if !steps.insert(step.id.as_str()) {
            return Err(DefinitionError::DuplicateStep(step.id.clone()));
        }
        for (field_idx, field) in step.fields.iter().enumerate() {
            if index
                .insert(field.id.clone(), (step_idx, field_idx))
                .is_some()
            {
                return Err(DefinitionError::DuplicateField(field.id.clone()));
            }
        }
    }
    Ok(index)
}

fn compile_patterns(
    field: &FieldSpec,
    patterns: &mut BTreeMap<String, Regex>,
) -> Result<(), DefinitionError> {
    for rule in &field.rules {
        if let FieldRule::Pattern { regex, .. } = rule
            && !patterns.contains_key(regex)
        {
            let compiled = Regex::new(&format!("^(?:{regex})$")).map_err(|source| {
                DefinitionError::InvalidPattern {
                    field: field.id.clone(),
                    pattern: regex.clone(),
                    source,
                }
            })?;
            patterns.insert(regex.clone(), compiled);
        }
    }
    if let Some(list) = &field.list {
        for nested in &list.fields {
            compile_patterns(nested, patterns)?;
        }
    }
    Ok(())
}

// Implicit cascades from `depends_on` merged with the explicit table.
fn merge_rules(spec: &WizardSpec) -> Result<BTreeMap<FieldId, DependencyRule>, DefinitionError> {
    let mut rules: BTreeMap<FieldId, DependencyRule> = BTreeMap::new();
    for field in spec.steps.iter().flat_map(|step| step.fields.iter()) {
        for upstream in &field.depends_on {
            if upstream == &field.id {
                return Err(DefinitionError::DependencyCycle {
                    path: vec![field.id.clone(), field.id.clone()],
                });
            }
            let mut implied = DependencyRule::new(upstream.clone());
            implied.clear.push(field.id.clone());
            if field.has_option_source() {
                implied.recompute.push(field.id.clone());
            }
            rules
                .entry(upstream.clone())
                .or_insert_with(|| DependencyRule::new(upstream.clone()))
                .merge(&implied);
        }
    }
    for explicit in &spec.dependencies {
        rules
            .entry(explicit.trigger.clone())
            .or_insert_with(|| DependencyRule::new(explicit.trigger.clone()))
            .merge(explicit);
    }
    Ok(rules)
}

fn topological_rank(
    field_index: &BTreeMap<FieldId, (usize, usize)>,
    rules: &BTreeMap<FieldId, DependencyRule>,
) -> Result<BTreeMap<FieldId, usize>, DefinitionError> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for id in field_index.keys() {
        graph.add_node(id.as_str());
    }
    for rule in rules.values() {
        for target in rule.targets() {
            if target == &rule.trigger {
                return Err(DefinitionError::DependencyCycle {
                    path: vec![target.clone(), target.clone()],
                });
            }
            graph.add_edge(rule.trigger.as_str(), target.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order
            .into_iter()
            .enumerate()
            .map(|(rank, id)| (id.to_string(), rank))
            .collect()),
        Err(cycle) => Err(DefinitionError::DependencyCycle {
            path: cycle_path(&graph, cycle.node_id()),
        }),
    }
}

// Shortest cycle through `start`, reported as `start -> ... -> start`.
fn cycle_path(graph: &DiGraphMap<&str, ()>, start: &str) -> Vec<FieldId> {
    let mut parents: BTreeMap<&str, &str> = BTreeMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if next == start {
                let mut chain = Vec::new();
                let mut cursor = node;
                while cursor != start {
                    chain.push(cursor.to_string());
                    cursor = parents[cursor];
                }
                chain.reverse();
                let mut path = vec![start.to_string()];
                path.extend(chain);
                path.push(start.to_string());
                return path;
            }
            if !parents.contains_key(next) {
                parents.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    vec![start.to_string()]
}
