//! Pricing engine - Keeps product prices equal to the cost of their formulas.
//!
//! A product's price is `Σ price(ingredient) * quantity` over its formula edges,
//! with a missing ingredient price read as 0. The engine restores that invariant
//! eagerly: every formula replacement or direct price change is followed by a
//! propagation pass that walks the "ingredient is used by product" graph and
//! rewrites every dependent product's stored price.
//!
//! Propagation runs in two phases:
//!
//! 1. Breadth-first discovery from the seeds, with a FIFO queue and a visited
//!    set, collects every reachable node once together with its dependents.
//! 2. The discovered nodes are repriced in dependency order (a node waits for
//!    its discovered ingredients), ties broken by discovery order. When no
//!    node is ready, the remaining ones wait on a cycle. The engine then forces
//!    the earliest discovered member of a cycle whose outside ingredients are
//!    all priced, and reports it in [`PropagationReport::cyclic`]. Products
//!    merely downstream of a cycle are never forced.
//!
//! Each node is repriced at most once per call. On a DAG the result satisfies
//! the price invariant even when a product is reachable through paths of
//! different lengths. On a cycle the result is a single pass, not a fixed point.

use crate::{
    core::store::{FormulaEdge, FormulaStore, MaterialStore, SeaOrmStore},
    errors::{Error, Result},
};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Engine over the production `SeaORM` store.
pub type SqlPricingEngine = PricingEngine<SeaOrmStore>;

/// Outcome of one propagation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationReport {
    /// Every node reached from the seeds, in processing order
    pub visited: Vec<i64>,
    /// Nodes whose price was rewritten, with the new price, in processing order
    pub repriced: Vec<(i64, f64)>,
    /// Nodes processed before all of their ingredients were, because of a cycle
    pub cyclic: Vec<i64>,
}

impl PropagationReport {
    /// New price of `material_id` if this pass rewrote it.
    #[must_use]
    pub fn price_of(&self, material_id: i64) -> Option<f64> {
        self.repriced
            .iter()
            .find(|(id, _)| *id == material_id)
            .map(|(_, price)| *price)
    }

    /// Whether the pass ran into a dependency cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Computes product prices and propagates price changes through formulas.
///
/// The engine owns no persistent state. All mutating entry points take an
/// internal writer lock, so concurrent callers are serialized.
pub struct PricingEngine<S> {
    store: S,
    writer: Mutex<()>,
}

impl<S> PricingEngine<S>
where
    S: MaterialStore + FormulaStore,
{
    /// Creates an engine over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    /// The injected store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Cost of one unit of `product_id` from its current formula and the
    /// currently stored ingredient prices. Performs no writes.
    ///
    /// A product without formula costs exactly 0.
    ///
    /// # Errors
    /// Returns `MaterialNotFound` for an unknown id, or a store error.
    pub async fn compute_product_price(&self, product_id: i64) -> Result<f64> {
        self.ensure_exists(product_id).await?;
        let edges = self.store.get_edges(product_id).await?;
        self.price_of_edges(&edges).await
    }

    /// Replaces the formula of `product_id`, reprices it and propagates the
    /// change to every product using it.
    ///
    /// Validation happens before anything is written. The edge replacement is
    /// transactional; if it fails the store is left as it was.
    ///
    /// # Errors
    /// Returns `MaterialNotFound` for an unknown product or ingredient,
    /// `InvalidQuantity` for a non-finite quantity, or a store error.
    #[instrument(skip(self, edges), fields(edges = edges.len()))]
    pub async fn replace_formula(
        &self,
        product_id: i64,
        edges: Vec<FormulaEdge>,
    ) -> Result<PropagationReport> {
        self.ensure_exists(product_id).await?;
        for edge in &edges {
            if !edge.quantity.is_finite() {
                return Err(Error::InvalidQuantity {
                    quantity: edge.quantity,
                });
            }
            self.ensure_exists(edge.ingredient_id).await?;
        }
        if edges.iter().any(|edge| edge.ingredient_id == product_id) {
            warn!(product_id, "Formula lists the product as its own ingredient");
        }

        let _guard = self.writer.lock().await;

        self.store.replace_edges(product_id, &edges).await?;
        let price = self.price_of_edges(&edges).await?;
        self.store.set_price(product_id, price).await?;
        debug!(product_id, price, "Formula replaced");

        self.run_propagation(vec![product_id]).await
    }

    /// Removes every edge of `product_id`; its price becomes 0.
    ///
    /// # Errors
    /// Same as [`Self::replace_formula`].
    pub async fn clear_formula(&self, product_id: i64) -> Result<PropagationReport> {
        self.replace_formula(product_id, Vec::new()).await
    }

    /// Stores a new price for `material_id` and propagates it.
    ///
    /// A raw material's price is authoritative. A material that has a formula
    /// is re-derived from it during propagation.
    ///
    /// # Errors
    /// Returns `InvalidPrice` for a negative or non-finite price,
    /// `MaterialNotFound` for an unknown id, or a store error.
    #[instrument(skip(self))]
    pub async fn update_material_price(
        &self,
        material_id: i64,
        new_price: f64,
    ) -> Result<PropagationReport> {
        validate_price(new_price)?;
        self.ensure_exists(material_id).await?;

        let _guard = self.writer.lock().await;

        self.store.set_price(material_id, new_price).await?;
        self.run_propagation(vec![material_id]).await
    }

    /// Reprices every product that depends, directly or transitively, on one
    /// of `seeds`, plus the seeds themselves when they have a formula.
    ///
    /// Not transactional across nodes: a store failure aborts the pass and
    /// keeps the prices already written. Re-running converges on a DAG.
    ///
    /// # Errors
    /// Returns the first store error encountered.
    pub async fn propagate<I>(&self, seeds: I) -> Result<PropagationReport>
    where
        I: IntoIterator<Item = i64> + Send,
    {
        let seeds: Vec<i64> = seeds.into_iter().collect();
        let _guard = self.writer.lock().await;
        self.run_propagation(seeds).await
    }

    /// Propagates from every material in the store.
    ///
    /// Used after the database may have been edited behind the engine's back.
    ///
    /// # Errors
    /// Returns the first store error encountered.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<PropagationReport> {
        let material_ids = self.store.material_ids().await?;
        let report = self.propagate(material_ids).await?;
        info!(
            visited = report.visited.len(),
            repriced = report.repriced.len(),
            "Price reconciliation finished"
        );
        Ok(report)
    }

    /// Caller must hold the writer lock.
    async fn run_propagation(&self, seeds: Vec<i64>) -> Result<PropagationReport> {
        let graph = self.discover(seeds).await?;
        let mut report = PropagationReport::default();

        let rank: HashMap<i64, usize> = graph
            .order
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();

        // Discovered ingredients each node still waits for
        let mut pending: HashMap<i64, usize> = HashMap::new();
        for dependents in graph.dependents.values() {
            for dependent in dependents {
                *pending.entry(*dependent).or_default() += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = graph
            .order
            .iter()
            .enumerate()
            .filter(|(_, id)| !pending.contains_key(id))
            .map(|(index, _)| Reverse(index))
            .collect();
        let mut done: HashSet<i64> = HashSet::new();

        let components = Components::find(&graph);
        // Unpriced edges entering each component from outside it
        let mut inbound: HashMap<usize, usize> = HashMap::new();
        for (node, dependents) in &graph.dependents {
            for dependent in dependents {
                if !components.same(*node, *dependent) {
                    *inbound.entry(components.of[dependent]).or_default() += 1;
                }
            }
        }

        while done.len() < graph.order.len() {
            let index = if let Some(Reverse(index)) = ready.pop() {
                index
            } else {
                // Only cycle members whose component has nothing left upstream
                let Some(index) = graph.order.iter().position(|id| {
                    !done.contains(id)
                        && components.on_cycle(*id)
                        && inbound
                            .get(&components.of[id])
                            .is_none_or(|count| *count == 0)
                }) else {
                    break;
                };
                let forced = graph.order[index];
                warn!(material_id = forced, "Dependency cycle, pricing in a single pass");
                report.cyclic.push(forced);
                index
            };

            let pid = graph.order[index];
            if !done.insert(pid) {
                continue;
            }
            report.visited.push(pid);

            let edges = self.store.get_edges(pid).await?;
            if !edges.is_empty() {
                let price = self.price_of_edges(&edges).await?;
                self.store.set_price(pid, price).await?;
                debug!(material_id = pid, price, "Repriced");
                report.repriced.push((pid, price));
            }

            for dependent in graph.dependents.get(&pid).into_iter().flatten() {
                if !components.same(pid, *dependent) {
                    if let Some(count) = inbound.get_mut(&components.of[dependent]) {
                        *count -= 1;
                    }
                }
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 && !done.contains(dependent) {
                        ready.push(Reverse(rank[dependent]));
                    }
                }
            }
        }

        Ok(report)
    }

    /// Breadth-first walk over reverse edges from `seeds`.
    async fn discover(&self, seeds: Vec<i64>) -> Result<Discovery> {
        let mut queue: VecDeque<i64> = seeds.into();
        let mut visited: HashSet<i64> = HashSet::new();
        let mut discovery = Discovery::default();

        while let Some(pid) = queue.pop_front() {
            if !visited.insert(pid) {
                continue;
            }
            discovery.order.push(pid);

            let dependents = self.store.get_products_using(pid).await?;
            for dependent in &dependents {
                if !visited.contains(dependent) {
                    queue.push_back(*dependent);
                }
            }
            discovery.dependents.insert(pid, dependents);
        }

        Ok(discovery)
    }

    async fn price_of_edges(&self, edges: &[FormulaEdge]) -> Result<f64> {
        let mut total = 0.0;
        for edge in edges {
            let price = self
                .store
                .get_price(edge.ingredient_id)
                .await?
                .unwrap_or(0.0);
            total += price * edge.quantity;
        }
        Ok(total)
    }

    async fn ensure_exists(&self, material_id: i64) -> Result<()> {
        if self.store.exists(material_id).await? {
            Ok(())
        } else {
            Err(Error::MaterialNotFound { id: material_id })
        }
    }
}

/// Nodes reached by [`PricingEngine::discover`].
#[derive(Debug, Default)]
struct Discovery {
    /// Discovery order; a node's index is its rank
    order: Vec<i64>,
    /// Distinct products using each discovered node
    dependents: HashMap<i64, Vec<i64>>,
}

/// Strongly connected components of a [`Discovery`], found with Tarjan's
/// algorithm over the dependents lists.
#[derive(Debug, Default)]
struct Components {
    /// Component index of each discovered node
    of: HashMap<i64, usize>,
    /// Number of nodes in each component
    sizes: Vec<usize>,
    /// Nodes listed among their own dependents
    self_loops: HashSet<i64>,
}

impl Components {
    fn find(graph: &Discovery) -> Self {
        let mut search = Tarjan {
            dependents: &graph.dependents,
            index: HashMap::new(),
            low: HashMap::new(),
            stack: Vec::new(),
            on_stack: HashSet::new(),
            components: Self::default(),
        };
        for node in &graph.order {
            if !search.index.contains_key(node) {
                search.visit(*node);
            }
        }

        let mut components = search.components;
        components.self_loops = graph
            .dependents
            .iter()
            .filter(|(node, dependents)| dependents.contains(*node))
            .map(|(node, _)| *node)
            .collect();
        components
    }

    fn same(&self, a: i64, b: i64) -> bool {
        self.of.get(&a) == self.of.get(&b)
    }

    fn on_cycle(&self, node: i64) -> bool {
        self.self_loops.contains(&node)
            || self.of.get(&node).is_some_and(|c| self.sizes[*c] > 1)
    }
}

struct Tarjan<'a> {
    dependents: &'a HashMap<i64, Vec<i64>>,
    index: HashMap<i64, usize>,
    low: HashMap<i64, usize>,
    stack: Vec<i64>,
    on_stack: HashSet<i64>,
    components: Components,
}

impl Tarjan<'_> {
    fn visit(&mut self, node: i64) {
        let index = self.index.len();
        self.index.insert(node, index);
        self.low.insert(node, index);
        self.stack.push(node);
        self.on_stack.insert(node);

        let dependents = self.dependents;
        for next in dependents.get(&node).into_iter().flatten() {
            let reached = if let Some(next_index) = self.index.get(next) {
                self.on_stack.contains(next).then_some(*next_index)
            } else {
                self.visit(*next);
                Some(self.low[next])
            };
            if let Some(reached) = reached {
                let low = self.low.entry(node).or_insert(reached);
                *low = (*low).min(reached);
            }
        }

        if self.low[&node] == index {
            let component = self.components.sizes.len();
            let mut size = 0;
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(&member);
                self.components.of.insert(member, component);
                size += 1;
                if member == node {
                    break;
                }
            }
            self.components.sizes.push(size);
        }
    }
}

/// Rejects negative and non-finite prices.
pub(crate) fn validate_price(price: f64) -> Result<()> {
    if price < 0.0 || !price.is_finite() {
        return Err(Error::InvalidPrice { price });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_compute_price_without_formula_is_zero() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, Some(12.0));
        let engine = PricingEngine::new(store);

        assert_eq!(engine.compute_product_price(1).await?, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_compute_price_treats_missing_price_as_zero() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, None);
        store.add_material(2, Some(3.0));
        store.add_material(3, None);
        store.set_formula(3, &[(1, 5.0), (2, 2.0)]);
        let engine = PricingEngine::new(store);

        assert_eq!(engine.compute_product_price(3).await?, 6.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_compute_price_unknown_product() -> Result<()> {
        let engine = PricingEngine::new(MemoryStore::new());

        let err = engine.compute_product_price(99).await.unwrap_err();
        assert!(matches!(err, Error::MaterialNotFound { id: 99 }));
        assert_eq!(err.kind(), ErrorKind::Validation);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_price_validation() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        let engine = PricingEngine::new(store);

        let err = engine.update_material_price(1, -2.0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPrice { price: -2.0 }));

        let err = engine.update_material_price(1, f64::NAN).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPrice { price: _ }));

        let err = engine.update_material_price(5, 1.0).await.unwrap_err();
        assert!(matches!(err, Error::MaterialNotFound { id: 5 }));

        // Nothing was written
        assert_eq!(engine.store().price(1), Some(1.0));
        assert!(engine.store().set_price_calls().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_formula_validation() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        store.add_material(2, None);
        let engine = PricingEngine::new(store);

        let err = engine
            .replace_formula(2, vec![FormulaEdge::new(1, f64::INFINITY)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuantity { quantity: _ }));

        let err = engine
            .replace_formula(2, vec![FormulaEdge::new(7, 1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MaterialNotFound { id: 7 }));

        let err = engine
            .replace_formula(8, vec![FormulaEdge::new(1, 1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MaterialNotFound { id: 8 }));

        assert!(engine.store().edges(2).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_chain_reprices_in_dependency_order() -> Result<()> {
        // A (raw) -> B (1×A) -> C (1×B)
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        store.add_material(2, None);
        store.add_material(3, None);
        store.set_formula(2, &[(1, 1.0)]);
        store.set_formula(3, &[(2, 1.0)]);
        let engine = PricingEngine::new(store);

        engine.update_material_price(1, 5.0).await?;
        let report = engine.propagate([1]).await?;

        assert_eq!(engine.store().price(2), Some(5.0));
        assert_eq!(engine.store().price(3), Some(5.0));
        assert_eq!(report.visited, vec![1, 2, 3]);
        assert_eq!(report.repriced, vec![(2, 5.0), (3, 5.0)]);

        Ok(())
    }

    #[tokio::test]
    async fn test_propagate_is_idempotent() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, Some(2.0));
        store.add_material(2, Some(3.0));
        store.add_material(3, None);
        store.add_material(4, None);
        store.set_formula(3, &[(1, 2.0), (2, 1.0)]);
        store.set_formula(4, &[(3, 3.0)]);
        let engine = PricingEngine::new(store);

        engine.propagate([1, 2]).await?;
        let first = engine.store().prices();
        engine.propagate([1, 2]).await?;
        assert_eq!(engine.store().prices(), first);
        assert_eq!(engine.store().price(4), Some(21.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_propagate_terminates_on_cycle() -> Result<()> {
        // A uses B, B uses A
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        store.add_material(2, Some(1.0));
        store.set_formula(1, &[(2, 1.0)]);
        store.set_formula(2, &[(1, 1.0)]);
        let engine = PricingEngine::new(store);

        let report = engine.propagate([1]).await?;

        assert_eq!(report.visited.len(), 2);
        assert!(report.has_cycle());
        assert_eq!(report.cyclic[0], 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_product_downstream_of_cycle_is_not_forced() -> Result<()> {
        // A raw; B and C form a cycle; D uses A and C but is not on the cycle
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        for id in 2..=4 {
            store.add_material(id, None);
        }
        store.set_formula(2, &[(1, 1.0), (4, 1.0)]);
        store.set_formula(3, &[(1, 1.0), (4, 1.0)]);
        store.set_formula(4, &[(3, 1.0)]);
        let engine = PricingEngine::new(store);

        let report = engine.update_material_price(1, 10.0).await?;

        assert_eq!(report.cyclic, vec![3]);
        assert_eq!(engine.store().price(3), Some(10.0));
        assert_eq!(engine.store().price(4), engine.store().price(3));
        // D priced after C, so it sees C's new price
        assert_eq!(engine.store().price(2), Some(20.0));
        assert_eq!(report.visited, vec![1, 3, 4, 2]);

        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_all_reads_ids_from_store() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, Some(2.0));
        store.add_material(2, Some(99.0));
        store.add_material(3, None);
        store.set_formula(2, &[(1, 3.0)]);
        let engine = PricingEngine::new(store);

        let report = engine.reconcile_all().await?;

        assert_eq!(engine.store().price(2), Some(6.0));
        assert_eq!(report.visited.len(), 3);
        assert!(report.visited.contains(&3));

        Ok(())
    }

    #[tokio::test]
    async fn test_self_ingredient_terminates() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, Some(2.0));
        store.add_material(2, None);
        let engine = PricingEngine::new(store);

        let report = engine
            .replace_formula(2, vec![FormulaEdge::new(1, 1.0), FormulaEdge::new(2, 1.0)])
            .await?;

        assert_eq!(report.cyclic, vec![2]);
        assert_eq!(report.visited, vec![2]);

        Ok(())
    }

    #[tokio::test]
    async fn test_uneven_paths_respect_invariant() -> Result<()> {
        // A -> B -> C -> D and A -> D directly
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        for id in 2..=4 {
            store.add_material(id, None);
        }
        store.set_formula(2, &[(1, 1.0)]);
        store.set_formula(3, &[(2, 2.0)]);
        store.set_formula(4, &[(1, 1.0), (3, 1.0)]);
        let engine = PricingEngine::new(store);
        engine.propagate([1]).await?;

        let report = engine.update_material_price(1, 10.0).await?;

        assert_eq!(engine.store().price(2), Some(10.0));
        assert_eq!(engine.store().price(3), Some(20.0));
        assert_eq!(engine.store().price(4), Some(30.0));
        assert_eq!(
            report.repriced.iter().filter(|(id, _)| *id == 4).count(),
            1
        );
        assert!(!report.has_cycle());

        Ok(())
    }

    #[tokio::test]
    async fn test_diamond_reprices_shared_product_once() -> Result<()> {
        // A -> B, A -> C, B + C -> D
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        for id in 2..=4 {
            store.add_material(id, None);
        }
        store.set_formula(2, &[(1, 2.0)]);
        store.set_formula(3, &[(1, 3.0)]);
        store.set_formula(4, &[(2, 1.0), (3, 1.0)]);
        let engine = PricingEngine::new(store);

        let report = engine.update_material_price(1, 2.0).await?;

        assert_eq!(engine.store().price(4), Some(10.0));
        assert_eq!(report.visited, vec![1, 2, 3, 4]);
        assert_eq!(
            engine
                .store()
                .set_price_calls()
                .iter()
                .filter(|id| **id == 4)
                .count(),
            1
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_store_unchanged() -> Result<()> {
        let store = MemoryStore::new();
        store.add_material(1, Some(2.0));
        store.add_material(2, Some(3.0));
        store.add_material(3, None);
        store.set_formula(3, &[(1, 1.0)]);
        let engine = PricingEngine::new(store);
        engine.propagate([1]).await?;

        engine.store().fail_replace_edges();
        let err = engine
            .replace_formula(3, vec![FormulaEdge::new(2, 4.0)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreFailure);
        assert_eq!(engine.store().edges(3), vec![FormulaEdge::new(1, 1.0)]);
        assert_eq!(engine.store().price(3), Some(2.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_aborts_and_keeps_earlier_updates() -> Result<()> {
        // A -> B -> C -> D; writing C fails
        let store = MemoryStore::new();
        store.add_material(1, Some(1.0));
        for id in 2..=4 {
            store.add_material(id, Some(1.0));
        }
        store.set_formula(2, &[(1, 1.0)]);
        store.set_formula(3, &[(2, 1.0)]);
        store.set_formula(4, &[(3, 1.0)]);
        let engine = PricingEngine::new(store);

        engine.store().set_price_directly(1, 7.0);
        engine.store().fail_set_price_on(3);
        let err = engine.propagate([1]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);

        assert_eq!(engine.store().price(2), Some(7.0));
        assert_eq!(engine.store().price(3), Some(1.0));
        assert_eq!(engine.store().price(4), Some(1.0));

        // Retrying after the fault clears converges
        engine.store().clear_failures();
        engine.propagate([1]).await?;
        assert_eq!(engine.store().price(4), Some(7.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_seed_is_harmless() -> Result<()> {
        let engine = PricingEngine::new(MemoryStore::new());

        let report = engine.propagate([404]).await?;
        assert_eq!(report.visited, vec![404]);
        assert!(report.repriced.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_cake_scenarios_end_to_end() -> Result<()> {
        let (db, engine) = setup_engine().await?;
        let flour = create_test_material(&db, "Flour", 2.0).await?;
        let sugar = create_test_material(&db, "Sugar", 3.0).await?;
        let cake = create_test_material(&db, "Cake", 0.0).await?;
        let cake_box = create_test_material(&db, "CakeBox", 0.0).await?;

        // Cake = 2×Flour + 1×Sugar
        engine
            .replace_formula(
                cake.id,
                vec![FormulaEdge::new(flour.id, 2.0), FormulaEdge::new(sugar.id, 1.0)],
            )
            .await?;
        assert_eq!(engine.compute_product_price(cake.id).await?, 7.0);
        assert_eq!(engine.store().get_price(cake.id).await?, Some(7.0));

        // Flour goes up
        engine.update_material_price(flour.id, 4.0).await?;
        assert_eq!(engine.store().get_price(cake.id).await?, Some(11.0));

        // CakeBox = 3×Cake, then a further Flour change reaches it by reverse lookup only
        engine
            .replace_formula(cake_box.id, vec![FormulaEdge::new(cake.id, 3.0)])
            .await?;
        assert_eq!(engine.store().get_price(cake_box.id).await?, Some(33.0));
        engine.update_material_price(flour.id, 5.0).await?;
        assert_eq!(engine.store().get_price(cake.id).await?, Some(13.0));
        assert_eq!(engine.store().get_price(cake_box.id).await?, Some(39.0));
        engine.update_material_price(flour.id, 4.0).await?;
        assert_eq!(engine.store().get_price(cake_box.id).await?, Some(33.0));

        // Sugar removed from Cake
        engine
            .replace_formula(cake.id, vec![FormulaEdge::new(flour.id, 2.0)])
            .await?;
        assert_eq!(engine.compute_product_price(cake.id).await?, 8.0);
        assert_eq!(engine.store().get_price(cake.id).await?, Some(8.0));
        assert_eq!(engine.store().get_price(cake_box.id).await?, Some(24.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_writers_leave_consistent_prices() -> Result<()> {
        let (db, engine, cake) = setup_with_cake().await?;
        let flour = crate::core::material::get_material_by_name(&db, "Flour")
            .await?
            .unwrap();

        let (first, second, replaced) = tokio::join!(
            engine.update_material_price(flour.id, 3.0),
            engine.update_material_price(flour.id, 5.0),
            engine.replace_formula(cake.id, vec![FormulaEdge::new(flour.id, 2.0)]),
        );
        first?;
        second?;
        replaced?;

        let flour_price = engine.store().get_price(flour.id).await?.unwrap();
        assert!(flour_price == 3.0 || flour_price == 5.0);
        assert_eq!(engine.store().get_edges(cake.id).await?.len(), 1);
        assert_eq!(
            engine.store().get_price(cake.id).await?,
            Some(2.0 * flour_price)
        );
        assert_eq!(
            engine.compute_product_price(cake.id).await?,
            2.0 * flour_price
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_price_change_reaches_nested_product() -> Result<()> {
        let (db, engine) = setup_engine().await?;
        let flour = create_test_material(&db, "Flour", 2.0).await?;
        let sugar = create_test_material(&db, "Sugar", 3.0).await?;
        let cake = create_test_material(&db, "Cake", 0.0).await?;
        let cake_box = create_test_material(&db, "CakeBox", 0.0).await?;

        engine
            .replace_formula(
                cake.id,
                vec![FormulaEdge::new(flour.id, 2.0), FormulaEdge::new(sugar.id, 1.0)],
            )
            .await?;
        engine
            .replace_formula(cake_box.id, vec![FormulaEdge::new(cake.id, 3.0)])
            .await?;
        assert_eq!(engine.store().get_price(cake_box.id).await?, Some(21.0));

        let report = engine.update_material_price(flour.id, 4.0).await?;

        assert_eq!(report.price_of(cake.id), Some(11.0));
        assert_eq!(report.price_of(cake_box.id), Some(33.0));
        assert_eq!(engine.store().get_price(cake_box.id).await?, Some(33.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_clear_formula_zeroes_price() -> Result<()> {
        let (db, engine) = setup_engine().await?;
        let flour = create_test_material(&db, "Flour", 2.0).await?;
        let cake = create_test_material(&db, "Cake", 0.0).await?;
        let cake_box = create_test_material(&db, "CakeBox", 0.0).await?;
        engine
            .replace_formula(cake.id, vec![FormulaEdge::new(flour.id, 2.0)])
            .await?;
        engine
            .replace_formula(cake_box.id, vec![FormulaEdge::new(cake.id, 3.0)])
            .await?;

        engine.clear_formula(cake.id).await?;

        assert!(engine.store().get_edges(cake.id).await?.is_empty());
        assert_eq!(engine.store().get_price(cake.id).await?, Some(0.0));
        assert_eq!(engine.store().get_price(cake_box.id).await?, Some(0.0));

        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_all_repairs_stale_prices() -> Result<()> {
        let (db, engine) = setup_engine().await?;
        let flour = create_test_material(&db, "Flour", 2.0).await?;
        let cake = create_test_material(&db, "Cake", 0.0).await?;
        engine
            .replace_formula(cake.id, vec![FormulaEdge::new(flour.id, 2.0)])
            .await?;

        // Simulate an edit that bypassed the engine
        engine.store().set_price(flour.id, 5.0).await?;
        assert_eq!(engine.store().get_price(cake.id).await?, Some(4.0));

        let report = engine.reconcile_all().await?;
        assert_eq!(report.price_of(cake.id), Some(10.0));
        assert_eq!(engine.store().get_price(cake.id).await?, Some(10.0));

        Ok(())
    }
}
