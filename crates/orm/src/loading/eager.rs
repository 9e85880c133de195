//! Eager loader - executes a load plan level by level
//!
//! Every relationship at one depth is fetched with one batched query per
//! chunk of keys, sibling relationships concurrently when
//! `parallel_siblings` is set. A level is fully wired into the graph before
//! the next level starts, since the next level's sources are the instances
//! the previous one produced.

use std::collections::{HashMap, HashSet};

use futures::future::try_join_all;
use indexmap::IndexMap;

use super::identity::IdentityMap;
use super::planner::{LoadPlan, PlanNode};
use crate::error::ModelResult;
use crate::graph::{Graph, InstanceId};
use crate::primary_key::RecordKey;
use crate::registry::Registry;
use crate::relationships::{resolver_for, FetchedRows, ResolvedEdge, Resolver};
use crate::schema::Cardinality;

/// Counters for one `load` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Depth levels that had at least one source instance
    pub levels: usize,
    /// Relationship fetches that issued queries
    pub fetches: usize,
    /// Instances wired as relationship targets, counted per relationship
    pub wired: usize,
}

struct Request<'p> {
    node: &'p PlanNode,
    sources: Vec<(InstanceId, Option<RecordKey>)>,
    keys: Vec<RecordKey>,
}

/// Runs load plans against one registry
pub struct EagerLoader<'r> {
    registry: &'r Registry,
}

impl<'r> EagerLoader<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Load `plan` for `roots`, wiring every result into `graph`
    pub async fn load(
        &self,
        graph: &mut Graph,
        identity: &mut IdentityMap,
        roots: &[InstanceId],
        plan: &LoadPlan,
    ) -> ModelResult<LoadStats> {
        let mut stats = LoadStats::default();
        let mut level: Vec<(Vec<InstanceId>, &IndexMap<String, PlanNode>)> =
            vec![(roots.to_vec(), &plan.roots)];

        while !level.is_empty() {
            let mut requests = Vec::new();
            for (sources, nodes) in &level {
                if sources.is_empty() {
                    continue;
                }
                for node in nodes.values() {
                    requests.push(request(graph, node, sources));
                }
            }
            if requests.is_empty() {
                break;
            }

            stats.levels += 1;
            stats.fetches += requests.iter().filter(|r| !r.keys.is_empty()).count();
            tracing::debug!(
                level = stats.levels,
                relations = requests.len(),
                "loading relationship level"
            );

            let results = self.fetch_all(&requests).await?;

            let mut next = Vec::new();
            for (request, fetched) in requests.into_iter().zip(results) {
                let Request { node, sources, .. } = request;
                let targets = wire(graph, identity, &node.edge, &sources, fetched)?;
                stats.wired += targets.len();
                if !node.children.is_empty() {
                    next.push((targets, &node.children));
                }
            }
            level = next;
        }

        tracing::debug!(
            levels = stats.levels,
            fetches = stats.fetches,
            instances = graph.len(),
            identity_hits = identity.hits(),
            "eager loading finished"
        );
        Ok(stats)
    }

    async fn fetch_all(&self, requests: &[Request<'_>]) -> ModelResult<Vec<FetchedRows>> {
        let executor = self.registry.executor().as_ref();
        let config = self.registry.config();
        let resolvers: Vec<Box<dyn Resolver>> = requests
            .iter()
            .map(|request| resolver_for(&request.node.edge, config))
            .collect();

        if config.parallel_siblings {
            let fetches = resolvers
                .iter()
                .zip(requests)
                .map(|(resolver, request)| resolver.fetch(executor, &request.keys));
            return try_join_all(fetches).await;
        }

        let mut results = Vec::with_capacity(requests.len());
        for (resolver, request) in resolvers.iter().zip(requests) {
            results.push(resolver.fetch(executor, &request.keys).await?);
        }
        Ok(results)
    }
}

fn request<'p>(graph: &Graph, node: &'p PlanNode, sources: &[InstanceId]) -> Request<'p> {
    let column = node.edge.strategy.source_column();
    let sources: Vec<(InstanceId, Option<RecordKey>)> = sources
        .iter()
        .map(|id| (*id, graph.column_key(*id, column)))
        .collect();

    let mut seen = HashSet::new();
    let keys = sources
        .iter()
        .filter_map(|(_, key)| key.clone())
        .filter(|key| seen.insert(key.clone()))
        .collect();

    Request { node, sources, keys }
}

/// Wire fetched rows into the graph for one edge and a set of sources
///
/// Every source's slot is reset first, so sources without matches end up
/// with an empty loaded slot. Returns the distinct target instances that
/// were wired, in fetch order.
pub(crate) fn wire(
    graph: &mut Graph,
    identity: &mut IdentityMap,
    edge: &ResolvedEdge,
    sources: &[(InstanceId, Option<RecordKey>)],
    fetched: FetchedRows,
) -> ModelResult<Vec<InstanceId>> {
    let mut owners: HashMap<&RecordKey, Vec<InstanceId>> = HashMap::new();
    for (id, key) in sources {
        graph.reset_slot(*id, &edge.name, edge.cardinality);
        if let Some(key) = key {
            owners.entry(key).or_default().push(*id);
        }
    }

    let mut targets = Vec::with_capacity(fetched.rows.len());
    for row in fetched.rows {
        let (id, _) = identity.get_or_create(graph, &edge.target, row)?;
        targets.push(id);
    }

    let mut assigned = HashSet::new();
    // Single inverse slots keep the first source, like forward single slots
    let mut inverse_assigned = HashSet::new();
    let mut seen = HashSet::new();
    let mut wired = Vec::new();
    for (key, index) in &fetched.links {
        let (Some(&target), Some(matched)) = (targets.get(*index), owners.get(key)) else {
            continue;
        };

        for &source in matched {
            match edge.cardinality {
                Cardinality::One => {
                    if !assigned.insert(source) {
                        continue;
                    }
                    graph.set_one(source, &edge.name, target);
                }
                Cardinality::Many => graph.push_many(source, &edge.name, target),
            }

            if let Some(inverse) = &edge.inverse {
                match inverse.cardinality {
                    Cardinality::One => {
                        if inverse_assigned.insert(target) {
                            graph.set_one(target, &inverse.name, source);
                        }
                    }
                    Cardinality::Many => graph.push_many(target, &inverse.name, source),
                }
            }
        }

        if seen.insert(target) {
            wired.push(target);
        }
    }

    tracing::trace!(
        relation = %edge.name,
        sources = sources.len(),
        targets = wired.len(),
        "wired relationship"
    );
    Ok(wired)
}
