//! Breadth-first graph expansion with conflict resolution.
//!
//! One coordinating task owns every conflict decision: expansion runs as a
//! single logical pass over the arena, and the recipe index is the only
//! suspension point. A resolution either completes or fails as a whole;
//! partial graphs are never returned.
//!
//! Conflict rules, applied per package name within one context:
//! 1. an override requirement carrying an explicit version wins, closest to
//!    the root first;
//! 2. otherwise the highest version satisfying every accumulated range wins;
//!    if that moves an already-expanded node, resolution restarts with the
//!    chosen version as a learned pin;
//! 3. otherwise the resolution fails, naming both requiring paths.

use std::collections::{BTreeSet, HashMap, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use mortar_core::error::{MortarError, MortarResult};
use mortar_core::types::{
    OptionsView, Profile, Reference, RequirementSpec, SettingsView, Version, VersionExpr,
};
use mortar_index::{Recipe, RecipeIndex};

use crate::graph::{find_path_in, Graph, GraphNode, NodeId, NodeState, HOST_CONTEXT, ROOT};
use crate::lock::Lockfile;
use crate::package_id;
use crate::solve::RangeSolver;

/// The root project's declared requirements
#[derive(Debug, Clone)]
pub struct RootManifest {
    pub name: String,
    pub version: Version,
    pub requirements: Vec<RequirementSpec>,
}

impl RootManifest {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            requirements: Vec::new(),
        }
    }

    /// Add a root requirement (declaration order is preserved)
    pub fn require(mut self, spec: RequirementSpec) -> Self {
        self.requirements.push(spec);
        self
    }
}

/// Expands root requirements into a resolved [`Graph`]
pub struct GraphBuilder<'a, I> {
    index: &'a I,
    profile: Profile,
}

impl<'a, I: RecipeIndex> GraphBuilder<'a, I> {
    pub fn new(index: &'a I, profile: Profile) -> Self {
        Self { index, profile }
    }

    /// Resolve a manifest into a complete graph with package ids
    pub async fn resolve(&self, manifest: &RootManifest) -> MortarResult<Graph> {
        self.resolve_inner(manifest, None).await
    }

    /// Resolve pinned to a previous snapshot, bypassing the range solver
    /// for already-locked names
    pub async fn resolve_locked(
        &self,
        manifest: &RootManifest,
        lock: &Lockfile,
    ) -> MortarResult<Graph> {
        self.resolve_inner(manifest, Some(lock)).await
    }

    async fn resolve_inner(
        &self,
        manifest: &RootManifest,
        lock: Option<&Lockfile>,
    ) -> MortarResult<Graph> {
        let locked = match lock {
            Some(lock) => lock.pinned_versions()?,
            None => HashMap::new(),
        };
        let mut learned: HashMap<(String, String), Version> = HashMap::new();
        let mut restarts = 0usize;

        loop {
            let expansion = Expansion::new(self.index, &self.profile, &locked, &learned);
            match expansion.run(manifest).await {
                Ok(mut graph) => {
                    package_id::compute_ids(&mut graph)?;
                    info!(
                        nodes = graph.len(),
                        restarts,
                        "dependency graph resolved"
                    );
                    return Ok(graph);
                },
                Err(Interrupt::Repin {
                    context,
                    name,
                    version,
                }) => {
                    debug!(%name, %version, "restarting resolution with learned pin");
                    restarts += 1;
                    // Each restart pins one more (context, name) pair and a
                    // pinned name never conflicts again, so a second pin for
                    // the same pair means expansion is not converging.
                    if learned.insert((context.clone(), name.clone()), version).is_some() {
                        return Err(MortarError::CorruptGraph {
                            message: format!(
                                "resolution re-pinned {name} twice in context {context}"
                            ),
                        });
                    }
                },
                Err(Interrupt::Fatal(err)) => return Err(err),
            }
        }
    }
}

/// Abort reasons of one expansion pass
enum Interrupt {
    /// A conflict moved the version of an already-expanded node; restart
    /// with the name pinned
    Repin {
        context: String,
        name: String,
        version: Version,
    },
    Fatal(MortarError),
}

impl From<MortarError> for Interrupt {
    fn from(err: MortarError) -> Self {
        Interrupt::Fatal(err)
    }
}

/// One accumulated demand on a package name
#[derive(Debug, Clone)]
struct Constraint {
    expr: VersionExpr,
    requirer: NodeId,
}

/// Winning override for a package name
#[derive(Debug, Clone)]
struct OverridePin {
    version: Version,
    depth: usize,
}

/// Everything known about one package name within one context
#[derive(Debug, Clone)]
struct NameEntry {
    node: NodeId,
    constraints: Vec<Constraint>,
    override_pin: Option<OverridePin>,
}

/// One conflict scope: the host context, or a build-require sub-graph
struct Context {
    key: String,
    /// Package names on the requirement path into this build context,
    /// regular edges included, for bootstrap cycle detection
    chain: Vec<String>,
    names: HashMap<String, NameEntry>,
}

/// State of one expansion pass
struct Expansion<'a, I> {
    index: &'a I,
    profile: &'a Profile,
    locked: &'a HashMap<(String, String), Version>,
    learned: &'a HashMap<(String, String), Version>,
    nodes: Vec<GraphNode>,
    contexts: Vec<Context>,
    /// Context arena index by key
    context_ids: HashMap<String, usize>,
    /// Recipes of nodes not yet expanded
    recipes: HashMap<NodeId, Recipe>,
    /// Option assignments flowing through each node's subtree
    flows: HashMap<NodeId, IndexMap<String, String>>,
    /// Build context per consumer node
    build_contexts: HashMap<NodeId, usize>,
    queue: VecDeque<NodeId>,
}

impl<'a, I: RecipeIndex> Expansion<'a, I> {
    fn new(
        index: &'a I,
        profile: &'a Profile,
        locked: &'a HashMap<(String, String), Version>,
        learned: &'a HashMap<(String, String), Version>,
    ) -> Self {
        Self {
            index,
            profile,
            locked,
            learned,
            nodes: Vec::new(),
            contexts: Vec::new(),
            context_ids: HashMap::new(),
            recipes: HashMap::new(),
            flows: HashMap::new(),
            build_contexts: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    async fn run(mut self, manifest: &RootManifest) -> Result<Graph, Interrupt> {
        self.contexts.push(Context {
            key: HOST_CONTEXT.to_string(),
            chain: Vec::new(),
            names: HashMap::new(),
        });
        self.context_ids.insert(HOST_CONTEXT.to_string(), 0);

        let root = GraphNode {
            id: ROOT,
            reference: Reference::new(&manifest.name, manifest.version.clone()),
            settings: self.profile.root_settings(),
            options: OptionsView::new(),
            package_id: None,
            dependencies: Vec::new(),
            dependents: BTreeSet::new(),
            state: NodeState::Pending,
            context: HOST_CONTEXT.to_string(),
            depth: 0,
            via: None,
            build_level: None,
        };
        self.nodes.push(root);
        self.contexts[0].names.insert(
            manifest.name.clone(),
            NameEntry {
                node: ROOT,
                constraints: Vec::new(),
                override_pin: None,
            },
        );
        self.queue.push_back(ROOT);

        while let Some(node_id) = self.queue.pop_front() {
            if self.nodes[node_id.0].state != NodeState::Pending {
                continue;
            }
            self.nodes[node_id.0].state = NodeState::Expanding;
            debug!(node = %self.nodes[node_id.0].reference, "expanding");

            let requirements = if node_id == ROOT {
                manifest.requirements.clone()
            } else {
                self.recipes
                    .get(&node_id)
                    .map(|r| r.requirements.clone())
                    .unwrap_or_default()
            };
            for spec in requirements {
                self.add_requirement(node_id, spec).await?;
            }

            self.nodes[node_id.0].state = NodeState::Resolved;
        }

        Ok(Graph::from_nodes(self.nodes))
    }

    async fn add_requirement(
        &mut self,
        consumer: NodeId,
        spec: RequirementSpec,
    ) -> Result<(), Interrupt> {
        let ctx_id = if spec.is_build_require {
            self.build_context_for(consumer, &spec)?
        } else {
            self.context_ids[self.nodes[consumer.0].context.as_str()]
        };

        let existing = self.contexts[ctx_id]
            .names
            .get(&spec.name)
            .map(|entry| entry.node);

        match existing {
            None => {
                let version = match self.policy_pin(ctx_id, &spec.name) {
                    Some(v) => v,
                    None => match &spec.expr {
                        VersionExpr::Pin(v) => v.clone(),
                        VersionExpr::Range(range) => {
                            let solver = self.solver_for(&spec.name).await?;
                            solver.require_best(&spec.name, range)?
                        },
                    },
                };
                let node_id = self.create_node(&spec, version, consumer, ctx_id).await?;
                let entry = NameEntry {
                    node: node_id,
                    constraints: vec![Constraint {
                        expr: spec.expr.clone(),
                        requirer: consumer,
                    }],
                    override_pin: self.override_from(&spec, consumer),
                };
                self.contexts[ctx_id].names.insert(spec.name.clone(), entry);
                self.connect(consumer, spec, node_id)
            },
            Some(existing_id) => {
                self.record_constraint(ctx_id, &spec, consumer);
                let entry = self.contexts[ctx_id].names[&spec.name].clone();
                let desired = self.desired_version(ctx_id, &spec.name, &entry).await?;

                let current = self.nodes[existing_id.0].reference.version.clone();
                if desired != current {
                    if existing_id == ROOT {
                        return Err(self
                            .version_conflict(&spec.name, ROOT, &current, consumer, &desired)
                            .into());
                    }
                    match self.nodes[existing_id.0].state {
                        NodeState::Pending => {
                            self.repin_node(existing_id, desired).await?;
                        },
                        NodeState::Expanding | NodeState::Resolved => {
                            return Err(Interrupt::Repin {
                                context: self.contexts[ctx_id].key.clone(),
                                name: spec.name.clone(),
                                version: desired,
                            });
                        },
                    }
                }

                // Reusing a shared node: a disagreeing option assignment on
                // this edge cannot be honored anymore.
                for (key, value) in &spec.options {
                    let node = &self.nodes[existing_id.0];
                    if node.options.get(key).is_some_and(|v| v != value.as_str()) {
                        warn!(
                            package = %node.reference,
                            option = %key,
                            wanted = %value,
                            kept = node.options.get(key).unwrap_or(""),
                            "conflicting option assignment ignored; first resolution wins"
                        );
                    }
                }

                self.connect(consumer, spec, existing_id)
            },
        }
    }

    /// Learned and locked pins bypass the range solver entirely
    ///
    /// Both maps are keyed per context, so a name locked at one version in
    /// the host context can stay at another in a build context.
    fn policy_pin(&self, ctx_id: usize, name: &str) -> Option<Version> {
        let key = (self.contexts[ctx_id].key.clone(), name.to_string());
        if let Some(version) = self.locked.get(&key) {
            return Some(version.clone());
        }
        self.learned.get(&key).cloned()
    }

    fn override_from(&self, spec: &RequirementSpec, consumer: NodeId) -> Option<OverridePin> {
        if !spec.override_allowed {
            return None;
        }
        spec.expr.as_pin().map(|version| OverridePin {
            version: version.clone(),
            depth: self.nodes[consumer.0].depth,
        })
    }

    fn record_constraint(&mut self, ctx_id: usize, spec: &RequirementSpec, consumer: NodeId) {
        let incoming = self.override_from(spec, consumer);
        let entry = self
            .contexts[ctx_id]
            .names
            .get_mut(&spec.name)
            .expect("entry exists for recorded name");
        entry.constraints.push(Constraint {
            expr: spec.expr.clone(),
            requirer: consumer,
        });

        if let Some(incoming) = incoming {
            match &entry.override_pin {
                None => entry.override_pin = Some(incoming),
                Some(current) => {
                    if incoming.depth < current.depth {
                        if incoming.version != current.version {
                            warn!(
                                name = %spec.name,
                                kept = %incoming.version,
                                dropped = %current.version,
                                "deeper override superseded by one closer to the root"
                            );
                        }
                        entry.override_pin = Some(incoming);
                    } else if incoming.version != current.version {
                        warn!(
                            name = %spec.name,
                            kept = %current.version,
                            dropped = %incoming.version,
                            "override ignored; an equally close or closer one already won"
                        );
                    }
                },
            }
        }
    }

    /// The version this name must resolve to under all accumulated demands
    async fn desired_version(
        &self,
        ctx_id: usize,
        name: &str,
        entry: &NameEntry,
    ) -> Result<Version, Interrupt> {
        if let Some(version) = self.policy_pin(ctx_id, name) {
            return Ok(version);
        }
        if let Some(over) = &entry.override_pin {
            return Ok(over.version.clone());
        }

        let pins: Vec<&Constraint> = entry
            .constraints
            .iter()
            .filter(|c| c.expr.as_pin().is_some())
            .collect();
        if let Some(first) = pins.first() {
            let version = first.expr.as_pin().expect("filtered to pins").clone();
            for other in &pins[1..] {
                let other_version = other.expr.as_pin().expect("filtered to pins");
                if *other_version != version {
                    return Err(self
                        .version_conflict(name, first.requirer, &version, other.requirer, other_version)
                        .into());
                }
            }
            for constraint in &entry.constraints {
                if !constraint.expr.matches(&version) {
                    return Err(MortarError::VersionConflict {
                        name: name.to_string(),
                        first_version: version.to_string(),
                        first_path: self.path_string(first.requirer),
                        second_version: constraint.expr.to_string(),
                        second_path: self.path_string(constraint.requirer),
                    }
                    .into());
                }
            }
            return Ok(version);
        }

        // Ranges only: highest mutually satisfying candidate.
        let ranges: Vec<_> = entry
            .constraints
            .iter()
            .filter_map(|c| match &c.expr {
                VersionExpr::Range(r) => Some(r),
                VersionExpr::Pin(_) => None,
            })
            .collect();
        let solver = self.solver_for(name).await?;
        match solver.select_all_of(&ranges) {
            Some(version) => Ok(version),
            None => {
                let first = entry.constraints.first().expect("non-empty constraints");
                let last = entry.constraints.last().expect("non-empty constraints");
                Err(MortarError::VersionConflict {
                    name: name.to_string(),
                    first_version: first.expr.to_string(),
                    first_path: self.path_string(first.requirer),
                    second_version: last.expr.to_string(),
                    second_path: self.path_string(last.requirer),
                }
                .into())
            },
        }
    }

    fn version_conflict(
        &self,
        name: &str,
        first_requirer: NodeId,
        first_version: &Version,
        second_requirer: NodeId,
        second_version: &Version,
    ) -> MortarError {
        MortarError::VersionConflict {
            name: name.to_string(),
            first_version: first_version.to_string(),
            first_path: self.path_string(first_requirer),
            second_version: second_version.to_string(),
            second_path: self.path_string(second_requirer),
        }
    }

    async fn create_node(
        &mut self,
        spec: &RequirementSpec,
        version: Version,
        consumer: NodeId,
        ctx_id: usize,
    ) -> Result<NodeId, Interrupt> {
        let reference = spec.target(version);
        let recipe = self.index.recipe(&reference).await?;
        let node_id = NodeId(self.nodes.len());

        let (settings, options, flow) = self.node_config(spec, &recipe, consumer)?;

        self.nodes.push(GraphNode {
            id: node_id,
            reference,
            settings,
            options,
            package_id: None,
            dependencies: Vec::new(),
            dependents: BTreeSet::new(),
            state: NodeState::Pending,
            context: self.contexts[ctx_id].key.clone(),
            depth: self.nodes[consumer.0].depth + 1,
            via: Some(consumer),
            build_level: None,
        });
        self.recipes.insert(node_id, recipe);
        self.flows.insert(node_id, flow);
        self.queue.push_back(node_id);
        Ok(node_id)
    }

    /// Derive a node's settings, options and option flow from its recipe,
    /// the requiring edge and the profile.
    fn node_config(
        &self,
        spec: &RequirementSpec,
        recipe: &Recipe,
        consumer: NodeId,
    ) -> Result<(SettingsView, OptionsView, IndexMap<String, String>), Interrupt> {
        let name = &recipe.reference.name;

        let mut settings = self
            .profile
            .settings_for(&recipe.settings_schema, spec.propagate_settings.as_deref());
        settings.ignore_for_id(recipe.id_ignored_settings.iter().cloned());

        let mut options = OptionsView::new();
        for (key, decl) in &recipe.options_schema {
            options.set(key, &decl.default, decl.affects_id);
        }

        // Option flow: assignments marked to propagate keep flowing through
        // the whole subtree; unmarked edges pass the inherited flow along.
        let mut flow = self.flows.get(&consumer).cloned().unwrap_or_default();
        if spec.propagate_options {
            for (key, value) in &spec.options {
                flow.insert(key.clone(), value.clone());
            }
        }
        // Flowed assignments apply only where the schema declares the option.
        for (key, value) in &flow {
            if let Some(decl) = recipe.options_schema.get(key) {
                recipe
                    .validate_option(key, value)
                    .map_err(|reason| MortarError::InvalidOption {
                        package: name.clone(),
                        option: key.clone(),
                        reason,
                    })?;
                options.set(key, value, decl.affects_id);
            }
        }
        // Direct edge assignments must be declared by the recipe.
        for (key, value) in &spec.options {
            let decl = recipe.options_schema.get(key).ok_or_else(|| {
                MortarError::InvalidOption {
                    package: name.clone(),
                    option: key.clone(),
                    reason: "option is not declared by the recipe".to_string(),
                }
            })?;
            recipe
                .validate_option(key, value)
                .map_err(|reason| MortarError::InvalidOption {
                    package: name.clone(),
                    option: key.clone(),
                    reason,
                })?;
            options.set(key, value, decl.affects_id);
        }
        // Profile per-package assignments have the final say.
        for (key, value) in self.profile.options_for(name) {
            let decl = recipe.options_schema.get(key).ok_or_else(|| {
                MortarError::InvalidOption {
                    package: name.clone(),
                    option: key.to_string(),
                    reason: "option is not declared by the recipe".to_string(),
                }
            })?;
            recipe
                .validate_option(key, value)
                .map_err(|reason| MortarError::InvalidOption {
                    package: name.clone(),
                    option: key.to_string(),
                    reason,
                })?;
            options.set(key, value, decl.affects_id);
        }

        Ok((settings, options, flow))
    }

    /// Re-pin a not-yet-expanded node to a new version, refetching its
    /// recipe and re-deriving its configuration.
    async fn repin_node(&mut self, node_id: NodeId, version: Version) -> Result<(), Interrupt> {
        debug_assert_eq!(self.nodes[node_id.0].state, NodeState::Pending);

        // Re-derive from the first requiring edge; later edges re-applied
        // their assignments when they connected.
        let (creator, creating_spec) = self
            .edges_to(node_id)
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                let via = self.nodes[node_id.0].via.expect("non-root node has a requirer");
                (via, RequirementSpec::new(
                    self.nodes[node_id.0].reference.name.clone(),
                    VersionExpr::Pin(version.clone()),
                ))
            });

        let reference = Reference {
            name: self.nodes[node_id.0].reference.name.clone(),
            version,
            user: self.nodes[node_id.0].reference.user.clone(),
            channel: self.nodes[node_id.0].reference.channel.clone(),
        };
        debug!(node = %reference, "re-pinning unexpanded node");

        let recipe = self.index.recipe(&reference).await?;
        let (settings, options, flow) = self.node_config(&creating_spec, &recipe, creator)?;

        let node = &mut self.nodes[node_id.0];
        node.reference = reference;
        node.settings = settings;
        node.options = options;
        self.recipes.insert(node_id, recipe);
        self.flows.insert(node_id, flow);
        Ok(())
    }

    /// Incoming edges of a node, in consumer order
    fn edges_to(&self, target: NodeId) -> Vec<(NodeId, RequirementSpec)> {
        let mut edges = Vec::new();
        for node in &self.nodes {
            for (spec, dep) in &node.dependencies {
                if *dep == target {
                    edges.push((node.id, spec.clone()));
                }
            }
        }
        edges
    }

    /// Add an edge, rejecting anything that would close a cycle
    fn connect(
        &mut self,
        consumer: NodeId,
        spec: RequirementSpec,
        target: NodeId,
    ) -> Result<(), Interrupt> {
        if target == consumer || find_path_in(&self.nodes, target, consumer).is_some() {
            let mut cycle =
                find_path_in(&self.nodes, target, consumer).unwrap_or_else(|| vec![target]);
            cycle.push(target);
            let rendered = cycle
                .iter()
                .map(|id| self.nodes[id.0].reference.to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(MortarError::CyclicDependency { cycle: rendered }.into());
        }
        self.nodes[consumer.0].dependencies.push((spec, target));
        self.nodes[target.0].dependents.insert(consumer);
        Ok(())
    }

    /// Build-requires resolve in a separate context per consumer node
    fn build_context_for(
        &mut self,
        consumer: NodeId,
        spec: &RequirementSpec,
    ) -> Result<usize, Interrupt> {
        let ctx_id = match self.build_contexts.get(&consumer) {
            Some(id) => *id,
            None => {
                let consumer_key = self.nodes[consumer.0].context.clone();
                let consumer_name = self.nodes[consumer.0].reference.name.clone();
                // The chain carries every name on the consumer's requirement
                // path, regular edges included, so a tool whose own
                // dependencies lead back through an upstream consumer still
                // trips the check below.
                let chain = self.path_names(consumer);
                let key = format!("{consumer_key}/{consumer_name}");
                let ctx_id = self.contexts.len();
                self.context_ids.insert(key.clone(), ctx_id);
                self.contexts.push(Context {
                    key,
                    chain,
                    names: HashMap::new(),
                });
                self.build_contexts.insert(consumer, ctx_id);
                ctx_id
            },
        };

        // A tool that (transitively) needs itself built first can never be
        // bootstrapped; report the requirement chain as the cycle.
        if self.contexts[ctx_id].chain.contains(&spec.name) {
            let mut cycle: Vec<String> = self.contexts[ctx_id].chain.clone();
            cycle.push(spec.name.clone());
            return Err(MortarError::CyclicDependency {
                cycle: cycle.join(" -> "),
            }
            .into());
        }
        Ok(ctx_id)
    }

    /// Package names on the requirement path from the root to a node,
    /// following first requirers
    fn path_names(&self, id: NodeId) -> Vec<String> {
        let mut names = vec![self.nodes[id.0].reference.name.clone()];
        let mut current = id;
        while let Some(via) = self.nodes[current.0].via {
            names.push(self.nodes[via.0].reference.name.clone());
            current = via;
        }
        names.reverse();
        names
    }

    async fn solver_for(&self, name: &str) -> Result<RangeSolver, Interrupt> {
        Ok(RangeSolver::new(self.index.versions(name).await?))
    }

    /// Requirement path from the root for error attribution
    fn path_string(&self, id: NodeId) -> String {
        let mut path = vec![id];
        let mut current = id;
        while let Some(via) = self.nodes[current.0].via {
            path.push(via);
            current = via;
        }
        path.reverse();
        path.iter()
            .map(|n| self.nodes[n.0].reference.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
