//! Message-operator registry and dependency classification for telar.
//!
//! This crate provides the statically-declared metadata layer between the
//! model front end and the scheduling core. Each message-computation
//! operator carries an [`OperatorDescriptor`] enumerating its arguments and
//! their [`ArgRole`]s; binding a statement to an operator turns those roles
//! into classified [`KindSet`]s on the statement graph. The scheduler never
//! inspects operators at runtime; everything it needs is declared here,
//! checked at compile time.
//!
//! # Features
//!
//! - **Operator Discovery**: List all built-in message operators with metadata
//! - **Role System**: Per-argument freshness/requirement/trigger declarations
//! - **Edge Classification**: Derive dependency kind sets from argument roles
//! - **Statement Binding**: Populate a [`StatementGraph`] from operator bindings
//!
//! # Example
//!
//! ```rust
//! use telar_registry::{OperatorRegistry, StatementBinding, bind_statements};
//! use telar_core::{GroupLayout, StatementGraph, StatementId, schedule};
//!
//! let registry = OperatorRegistry::new();
//! let mut graph = StatementGraph::new(2);
//!
//! // Statement 1 computes a marginal from statement 0's message.
//! let bindings = [StatementBinding::new(StatementId::new(1), "marginal")
//!     .with_source(0, StatementId::new(0))];
//! bind_statements(&registry, &bindings, &mut graph).unwrap();
//!
//! let order = schedule(&graph, &GroupLayout::new(2)).unwrap();
//! assert_eq!(order.steps(), &[StatementId::new(0), StatementId::new(1)]);
//! ```

use thiserror::Error;

use telar_core::{EdgeKind, GraphError, KindSet, StatementGraph, StatementId};

/// The role of one operator argument, as declared by the operator author.
///
/// Roles translate one-to-one into [`EdgeKind`]s on the dependency edge from
/// the argument's producing statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgRole {
    /// Plain data dependency: any previously computed value is acceptable.
    Input,
    /// The most recent value is required at call time.
    Fresh,
    /// The argument must have been computed at least once, ever.
    Required,
    /// Re-computation of the argument re-triggers this statement.
    Trigger,
    /// A uniform argument makes the output uniform; the statement can be
    /// skipped while the argument carries no information.
    SkipIfUniform,
    /// The argument may be missing on the statement's first, initializing
    /// execution.
    NoInit,
}

impl ArgRole {
    /// The edge kind this role contributes.
    pub const fn kind(self) -> EdgeKind {
        match self {
            ArgRole::Input => EdgeKind::Dependency,
            ArgRole::Fresh => EdgeKind::Fresh,
            ArgRole::Required => EdgeKind::Requirement,
            ArgRole::Trigger => EdgeKind::Trigger,
            ArgRole::SkipIfUniform => EdgeKind::SkipIfUniform,
            ArgRole::NoInit => EdgeKind::NoInit,
        }
    }
}

/// Derives the dependency kind set for an argument from its declared roles.
///
/// The scheduling core normalizes the result (ordering roles imply the base
/// `Dependency` obligation).
pub fn kinds_for(roles: &[ArgRole]) -> KindSet {
    roles
        .iter()
        .fold(KindSet::EMPTY, |set, role| set.with(role.kind()))
}

/// Family of message operator, for organization and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorFamily {
    /// Factor-to-variable message products.
    Product,
    /// Variable marginals and posteriors.
    Marginal,
    /// Damping, gating, and other update control.
    Control,
    /// Plate replication and accumulation.
    Plate,
    /// Model-evidence bookkeeping.
    Evidence,
}

impl OperatorFamily {
    /// Returns a human-readable name for the family.
    pub const fn name(&self) -> &'static str {
        match self {
            OperatorFamily::Product => "Product",
            OperatorFamily::Marginal => "Marginal",
            OperatorFamily::Control => "Control",
            OperatorFamily::Plate => "Plate",
            OperatorFamily::Evidence => "Evidence",
        }
    }

    /// Returns a description of the family.
    pub const fn description(&self) -> &'static str {
        match self {
            OperatorFamily::Product => "Products of incoming factor messages",
            OperatorFamily::Marginal => "Variable marginals and posterior accumulation",
            OperatorFamily::Control => "Damped updates, gates, and update control",
            OperatorFamily::Plate => "Replication and accumulation over plates",
            OperatorFamily::Evidence => "Evidence contributions and scale factors",
        }
    }
}

/// One declared argument of a message operator.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    /// Argument name, as written in the operator signature.
    pub name: &'static str,
    /// Declared roles; the edge kind set is their union.
    pub roles: &'static [ArgRole],
}

/// Describes a message operator in the registry.
#[derive(Debug, Clone, Copy)]
pub struct OperatorDescriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description of the computation.
    pub description: &'static str,
    /// Family for organization.
    pub family: OperatorFamily,
    /// Declared arguments, in signature order.
    pub args: &'static [ArgSpec],
}

impl OperatorDescriptor {
    /// Number of declared arguments.
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

use ArgRole::{Fresh, Input, NoInit, Required, SkipIfUniform, Trigger};

/// Built-in message operators of the compiler.
const BUILTIN_OPERATORS: &[OperatorDescriptor] = &[
    OperatorDescriptor {
        id: "product",
        name: "Message Product",
        description: "Multiplies two incoming messages into one outgoing message",
        family: OperatorFamily::Product,
        args: &[
            ArgSpec {
                name: "left",
                roles: &[Fresh, Required],
            },
            ArgSpec {
                name: "right",
                roles: &[Fresh, Required],
            },
        ],
    },
    OperatorDescriptor {
        id: "marginal",
        name: "Marginal",
        description: "Combines incoming messages into a variable marginal",
        family: OperatorFamily::Marginal,
        args: &[ArgSpec {
            name: "messages",
            roles: &[Fresh],
        }],
    },
    OperatorDescriptor {
        id: "damped_update",
        name: "Damped Update",
        description: "Blends a new message with the previous iteration's value",
        family: OperatorFamily::Control,
        args: &[
            ArgSpec {
                name: "update",
                roles: &[Fresh],
            },
            ArgSpec {
                name: "previous",
                roles: &[Input, NoInit],
            },
        ],
    },
    OperatorDescriptor {
        id: "replicate",
        name: "Replicate",
        description: "Broadcasts a definition message across a plate",
        family: OperatorFamily::Plate,
        args: &[ArgSpec {
            name: "definition",
            roles: &[Fresh, Trigger],
        }],
    },
    OperatorDescriptor {
        id: "accumulate",
        name: "Accumulate",
        description: "Folds per-element messages of a plate into one message",
        family: OperatorFamily::Plate,
        args: &[
            ArgSpec {
                name: "elements",
                roles: &[Fresh, Required],
            },
            ArgSpec {
                name: "previous_total",
                roles: &[Input, NoInit],
            },
        ],
    },
    OperatorDescriptor {
        id: "evidence_scale",
        name: "Evidence Scale",
        description: "Accumulates a likelihood contribution into the model evidence",
        family: OperatorFamily::Evidence,
        args: &[ArgSpec {
            name: "likelihood",
            roles: &[Required, SkipIfUniform],
        }],
    },
];

/// Registry of all available message operators.
///
/// The registry provides lookup by id and family for the front end, which
/// resolves each model statement to an operator before binding its argument
/// sources.
pub struct OperatorRegistry {
    entries: Vec<OperatorDescriptor>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorRegistry {
    /// Create a new registry with all built-in operators registered.
    pub fn new() -> Self {
        Self {
            entries: BUILTIN_OPERATORS.to_vec(),
        }
    }

    /// Register an additional operator.
    pub fn register(&mut self, descriptor: OperatorDescriptor) {
        self.entries.push(descriptor);
    }

    /// Look up an operator by id.
    pub fn get(&self, id: &str) -> Option<&OperatorDescriptor> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// All registered operators, in registration order.
    pub fn all_operators(&self) -> &[OperatorDescriptor] {
        &self.entries
    }

    /// Operators belonging to one family.
    pub fn operators_in_family(&self, family: OperatorFamily) -> Vec<&OperatorDescriptor> {
        self.entries
            .iter()
            .filter(|entry| entry.family == family)
            .collect()
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no operator is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors raised while binding statements to operators.
#[derive(Debug, Error)]
pub enum BindError {
    /// The named operator is not registered.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// A source was bound to an argument index past the operator's arity.
    #[error("operator '{operator}' has {arity} arguments, no argument {index}")]
    ArgumentOutOfRange {
        /// The operator being bound.
        operator: &'static str,
        /// The offending argument index.
        index: usize,
        /// The operator's declared arity.
        arity: usize,
    },

    /// The resulting edge was rejected by the graph.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// One statement's operator and argument sources, as produced by the front
/// end.
#[derive(Debug, Clone)]
pub struct StatementBinding {
    /// The statement computed by this binding.
    pub target: StatementId,
    /// Id of the operator it invokes.
    pub operator: &'static str,
    /// `(argument index, producing statement)` pairs.
    pub sources: Vec<(usize, StatementId)>,
}

impl StatementBinding {
    /// Binds `target` to the operator with the given id.
    pub fn new(target: StatementId, operator: &'static str) -> Self {
        Self {
            target,
            operator,
            sources: Vec::new(),
        }
    }

    /// Declares the statement producing argument `index`.
    #[must_use]
    pub fn with_source(mut self, index: usize, source: StatementId) -> Self {
        self.sources.push((index, source));
        self
    }
}

/// Classifies every binding's argument sources into typed edges on `graph`.
///
/// # Errors
///
/// Returns [`BindError`] for unknown operators, out-of-range argument
/// indices, or edges the graph rejects.
pub fn bind_statements(
    registry: &OperatorRegistry,
    bindings: &[StatementBinding],
    graph: &mut StatementGraph,
) -> Result<(), BindError> {
    for binding in bindings {
        let descriptor = registry
            .get(binding.operator)
            .ok_or_else(|| BindError::UnknownOperator(binding.operator.to_string()))?;
        for &(index, source) in &binding.sources {
            let spec = descriptor.args.get(index).ok_or(BindError::ArgumentOutOfRange {
                operator: descriptor.id,
                index,
                arity: descriptor.arity(),
            })?;
            graph.add_edge(source, binding.target, kinds_for(spec.roles))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use telar_core::{GroupLayout, schedule};

    fn s(i: u32) -> StatementId {
        StatementId::new(i)
    }

    #[test]
    fn test_registry_creation() {
        let registry = OperatorRegistry::new();
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_get_operator() {
        let registry = OperatorRegistry::new();

        let product = registry.get("product");
        assert!(product.is_some());
        assert_eq!(product.unwrap().name, "Message Product");

        let nonexistent = registry.get("nonexistent");
        assert!(nonexistent.is_none());
    }

    #[test]
    fn test_operators_by_family() {
        let registry = OperatorRegistry::new();

        let plate = registry.operators_in_family(OperatorFamily::Plate);
        assert_eq!(plate.len(), 2); // Replicate and Accumulate

        let control = registry.operators_in_family(OperatorFamily::Control);
        assert_eq!(control.len(), 1); // Damped Update
    }

    #[test]
    fn test_family_names() {
        assert_eq!(OperatorFamily::Product.name(), "Product");
        assert_eq!(OperatorFamily::Plate.name(), "Plate");
    }

    #[test]
    fn test_role_classification() {
        let kinds = kinds_for(&[Fresh, Required]);
        assert!(kinds.contains(EdgeKind::Fresh));
        assert!(kinds.contains(EdgeKind::Requirement));

        let hint = kinds_for(&[Trigger]);
        assert!(hint.is_hint_only());
    }

    #[test]
    fn test_bind_builds_classified_edges() {
        let registry = OperatorRegistry::new();
        let mut graph = StatementGraph::new(3);

        // 2 = damped_update(update: 1, previous: 2's own prior value via 0).
        let bindings = [StatementBinding::new(s(2), "damped_update")
            .with_source(0, s(1))
            .with_source(1, s(0))];
        bind_statements(&registry, &bindings, &mut graph).unwrap();

        let update = graph.kinds_between(s(1), s(2));
        assert!(update.contains(EdgeKind::Fresh));
        assert!(update.contains(EdgeKind::Dependency));

        let previous = graph.kinds_between(s(0), s(2));
        assert!(previous.contains(EdgeKind::NoInit));
        assert!(previous.contains(EdgeKind::Dependency));
    }

    #[test]
    fn test_bound_graph_schedules() {
        let registry = OperatorRegistry::new();
        let mut graph = StatementGraph::new(3);

        let bindings = [
            StatementBinding::new(s(1), "marginal").with_source(0, s(0)),
            StatementBinding::new(s(2), "product")
                .with_source(0, s(0))
                .with_source(1, s(1)),
        ];
        bind_statements(&registry, &bindings, &mut graph).unwrap();

        let order = schedule(&graph, &GroupLayout::new(3)).unwrap();
        assert_eq!(order.steps(), &[s(0), s(1), s(2)]);
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let registry = OperatorRegistry::new();
        let mut graph = StatementGraph::new(2);
        let bindings = [StatementBinding::new(s(1), "convolve")];
        let err = bind_statements(&registry, &bindings, &mut graph).unwrap_err();
        assert!(matches!(err, BindError::UnknownOperator(_)));
    }

    #[test]
    fn test_argument_index_is_checked() {
        let registry = OperatorRegistry::new();
        let mut graph = StatementGraph::new(2);
        let bindings = [StatementBinding::new(s(1), "marginal").with_source(3, s(0))];
        let err = bind_statements(&registry, &bindings, &mut graph).unwrap_err();
        assert!(matches!(err, BindError::ArgumentOutOfRange { .. }));
    }
}
