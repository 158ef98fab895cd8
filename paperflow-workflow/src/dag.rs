//! Workflow DAG: construction, structural validation (Kahn's algorithm),
//! topological sort, and parallelizable execution layers.

use std::collections::{HashMap, VecDeque};

use paperflow_core::errors::WorkflowError;

use crate::step::{StepCondition, StepFn};

/// A single node in the workflow DAG.
pub struct WorkflowStep {
    pub id: String,
    pub run: StepFn,
    pub depends_on: Vec<String>,
    pub max_retries: u32,
    /// Base for exponential retry backoff (seconds).
    pub retry_backoff_base: f64,
    /// Optional predicate; the step is skipped when it returns false.
    pub condition: Option<StepCondition>,
    /// Tag for rate limiting (e.g. "extractor").
    pub resource_tag: Option<String>,
    pub timeout_seconds: Option<f64>,
}

/// Per-step options supplied at `add_step` time.
pub struct StepOptions {
    pub depends_on: Vec<String>,
    pub max_retries: u32,
    pub retry_backoff_base: f64,
    pub condition: Option<StepCondition>,
    pub resource_tag: Option<String>,
    pub timeout_seconds: Option<f64>,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            depends_on: vec![],
            max_retries: 3,
            retry_backoff_base: 1.0,
            condition: None,
            resource_tag: None,
            timeout_seconds: None,
        }
    }
}

/// Directed acyclic graph of processing steps.
///
/// Insertion order is preserved so validation errors and layer membership
/// are deterministic.
#[derive(Default)]
pub struct WorkflowDag {
    steps: HashMap<String, WorkflowStep>,
    /// dep → dependents.
    adjacency: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

impl WorkflowDag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.get(id)
    }

    /// Step ids in insertion order.
    pub fn step_ids(&self) -> &[String] {
        &self.order
    }

    /// Add a step. Duplicate ids are rejected; dependencies may reference
    /// steps added later (validation happens at execution time).
    pub fn add_step(
        &mut self,
        id: &str,
        run: StepFn,
        opts: StepOptions,
    ) -> Result<&mut Self, WorkflowError> {
        if self.steps.contains_key(id) {
            return Err(WorkflowError::DuplicateStep { id: id.to_string() });
        }

        for dep in &opts.depends_on {
            self.adjacency
                .entry(dep.clone())
                .or_default()
                .push(id.to_string());
        }
        self.adjacency.entry(id.to_string()).or_default();

        self.steps.insert(
            id.to_string(),
            WorkflowStep {
                id: id.to_string(),
                run,
                depends_on: opts.depends_on,
                max_retries: opts.max_retries,
                retry_backoff_base: opts.retry_backoff_base,
                condition: opts.condition,
                resource_tag: opts.resource_tag,
                timeout_seconds: opts.timeout_seconds,
            },
        );
        self.order.push(id.to_string());
        Ok(self)
    }

    /// Validate the DAG structure. Returns an ordered list of error messages
    /// (empty = valid): empty graph, unknown dependencies, cycles.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.steps.is_empty() {
            errors.push("DAG has no steps".to_string());
            return errors;
        }

        for id in &self.order {
            let step = &self.steps[id];
            for dep in &step.depends_on {
                if !self.steps.contains_key(dep) {
                    errors.push(format!(
                        "Step '{id}' depends on '{dep}' which does not exist"
                    ));
                }
            }
        }
        if !errors.is_empty() {
            return errors;
        }

        // Cycle detection via Kahn's algorithm: peel zero-in-degree nodes;
        // anything left unvisited sits on a cycle.
        let mut in_degree = self.in_degrees();
        let mut queue: VecDeque<&String> = self
            .order
            .iter()
            .filter(|id| in_degree[*id] == 0)
            .collect();

        let mut visited = 0usize;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            if let Some(children) = self.adjacency.get(node) {
                for child in children {
                    let deg = in_degree.get_mut(child).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        if visited != self.steps.len() {
            errors.push(format!(
                "DAG contains a cycle (visited {visited}/{} nodes)",
                self.steps.len()
            ));
        }

        errors
    }

    /// Step ids in topological order. Fails on any structural error.
    pub fn topological_sort(&self) -> Result<Vec<String>, WorkflowError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(WorkflowError::InvalidDag {
                reasons: errors.join("; "),
            });
        }

        let mut in_degree = self.in_degrees();
        let mut queue: VecDeque<String> = self
            .order
            .iter()
            .filter(|id| in_degree[*id] == 0)
            .cloned()
            .collect();

        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(node) = queue.pop_front() {
            if let Some(children) = self.adjacency.get(&node) {
                for child in children {
                    let deg = in_degree.get_mut(child).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(child.clone());
                    }
                }
            }
            order.push(node);
        }

        Ok(order)
    }

    /// Steps grouped into parallelizable layers: layer 0 holds the
    /// zero-in-degree nodes, layer k+1 the nodes released by layer k.
    pub fn execution_layers(&self) -> Result<Vec<Vec<String>>, WorkflowError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(WorkflowError::InvalidDag {
                reasons: errors.join("; "),
            });
        }

        let mut in_degree = self.in_degrees();
        let mut current: Vec<String> = self
            .order
            .iter()
            .filter(|id| in_degree[*id] == 0)
            .cloned()
            .collect();

        let mut layers = Vec::new();
        while !current.is_empty() {
            let mut next = Vec::new();
            for node in &current {
                if let Some(children) = self.adjacency.get(node) {
                    for child in children {
                        let deg = in_degree.get_mut(child).unwrap();
                        *deg -= 1;
                        if *deg == 0 {
                            next.push(child.clone());
                        }
                    }
                }
            }
            layers.push(std::mem::replace(&mut current, next));
        }

        Ok(layers)
    }

    fn in_degrees(&self) -> HashMap<String, usize> {
        let mut in_degree: HashMap<String, usize> =
            self.order.iter().map(|id| (id.clone(), 0)).collect();
        for step in self.steps.values() {
            for dep in &step.depends_on {
                if self.steps.contains_key(dep) {
                    *in_degree.get_mut(&step.id).unwrap() += 1;
                }
            }
        }
        in_degree
    }
}

impl std::fmt::Debug for WorkflowDag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDag").field("steps", &self.order).finish()
    }
}
