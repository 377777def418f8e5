//! Constraint optimization engine.
//!
//! Chooses which reorder recommendations to act on. The problem is a 0/1
//! knapsack over expected profit with a budget, an item-count ceiling, and
//! optional per-category and high-risk exposure limits. Candidate sets are
//! catalog-sized, so an exact branch-and-bound is used, seeded by a greedy
//! pass and interrupted by a time budget (anytime contract).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bookwise_catalog::Category;
use bookwise_core::{AnalyticsError, AnalyticsResult};

use crate::obsolescence::RiskLevel;
use crate::stock::OptimalStockRecommendation;

const PROFIT_EPSILON: f64 = 1e-9;
const DEADLINE_CHECK_EVERY: u64 = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConstraints {
    /// Total spend ceiling.
    pub max_budget: f64,
    /// Cardinality ceiling on selected books.
    pub max_items: usize,
    /// At most this many books from any single category.
    pub max_per_category: Option<usize>,
    /// Spend on HIGH-risk books may not exceed this share of `max_budget`.
    pub max_high_risk_budget_share: Option<f64>,
    /// Overrides the optimizer's default time budget.
    #[serde(default, with = "duration_millis_opt")]
    pub time_budget: Option<Duration>,
}

impl OptimizationConstraints {
    pub fn new(max_budget: f64, max_items: usize) -> Self {
        Self {
            max_budget,
            max_items,
            max_per_category: None,
            max_high_risk_budget_share: None,
            time_budget: None,
        }
    }

    pub fn with_max_per_category(mut self, max: usize) -> Self {
        self.max_per_category = Some(max);
        self
    }

    pub fn with_max_high_risk_budget_share(mut self, share: f64) -> Self {
        self.max_high_risk_budget_share = Some(share);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Reject self-contradictory constraints before any search.
    pub fn validate(&self) -> AnalyticsResult<()> {
        if !self.max_budget.is_finite() || self.max_budget < 0.0 {
            return Err(AnalyticsError::invalid_constraint(format!(
                "max_budget must be a finite non-negative amount, got {}",
                self.max_budget
            )));
        }
        if let Some(share) = self.max_high_risk_budget_share {
            if !(0.0..=1.0).contains(&share) {
                return Err(AnalyticsError::invalid_constraint(format!(
                    "max_high_risk_budget_share must be within [0, 1], got {share}"
                )));
            }
        }
        Ok(())
    }

    fn high_risk_cap(&self) -> Option<f64> {
        self.max_high_risk_budget_share.map(|s| s * self.max_budget)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(with = "duration_millis")]
    pub default_time_budget: Duration,
    /// Hard cap on explored nodes, independent of wall time.
    pub node_limit: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_time_budget: Duration::from_millis(500),
            node_limit: 5_000_000,
        }
    }
}

impl OptimizerConfig {
    pub fn with_default_time_budget(mut self, budget: Duration) -> Self {
        self.default_time_budget = budget;
        self
    }

    pub fn with_node_limit(mut self, limit: u64) -> Self {
        self.node_limit = limit;
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.node_limit == 0 {
            return Err(AnalyticsError::validation("node_limit must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Ranked by profit density, most urgent first on ties.
    pub selected_books: Vec<OptimalStockRecommendation>,
    pub total_cost: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    /// `total_profit / upper bound` when the bound is positive, raw profit otherwise.
    pub optimization_score: f64,
    /// Non-empty only when nothing could be selected.
    pub constraint_violations: Vec<String>,
    pub proven_optimal: bool,
    pub timed_out: bool,
    pub nodes_explored: u64,
}

impl OptimizationResult {
    fn empty(violations: Vec<String>) -> Self {
        Self {
            selected_books: Vec::new(),
            total_cost: 0.0,
            total_revenue: 0.0,
            total_profit: 0.0,
            optimization_score: 0.0,
            constraint_violations: violations,
            proven_optimal: true,
            timed_out: false,
            nodes_explored: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected_books.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Item {
    candidate: usize,
    cost: f64,
    profit: f64,
    category: Category,
    high_risk: bool,
    urgency: u8,
}

impl Item {
    fn density(&self) -> f64 {
        if self.cost <= 0.0 {
            f64::INFINITY
        } else {
            self.profit / self.cost
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Selection {
    picks: Vec<usize>,
    cost: f64,
    profit: f64,
    high_risk_cost: f64,
}

struct Search<'a> {
    items: &'a [Item],
    /// Item positions sorted by profit, descending.
    by_profit: Vec<usize>,
    constraints: &'a OptimizationConstraints,
    high_risk_cap: Option<f64>,
    deadline: Instant,
    node_limit: u64,
    nodes: u64,
    interrupted: bool,
    timed_out: bool,
    per_category: HashMap<Category, usize>,
    current: Selection,
    best: Selection,
}

impl<'a> Search<'a> {
    fn new(
        items: &'a [Item],
        constraints: &'a OptimizationConstraints,
        deadline: Instant,
        node_limit: u64,
    ) -> Self {
        let mut by_profit: Vec<usize> = (0..items.len()).collect();
        by_profit.sort_by(|a, b| items[*b].profit.total_cmp(&items[*a].profit));
        Self {
            items,
            by_profit,
            constraints,
            high_risk_cap: constraints.high_risk_cap(),
            deadline,
            node_limit,
            nodes: 0,
            interrupted: false,
            timed_out: false,
            per_category: HashMap::new(),
            current: Selection::default(),
            best: Selection::default(),
        }
    }

    fn fits(&self, item: &Item) -> bool {
        if self.current.picks.len() >= self.constraints.max_items {
            return false;
        }
        if self.current.cost + item.cost > self.constraints.max_budget {
            return false;
        }
        if let Some(cap) = self.constraints.max_per_category {
            if self.per_category.get(&item.category).copied().unwrap_or(0) >= cap {
                return false;
            }
        }
        if item.high_risk {
            if let Some(cap) = self.high_risk_cap {
                if self.current.high_risk_cost + item.cost > cap {
                    return false;
                }
            }
        }
        true
    }

    fn push(&mut self, pos: usize) {
        let item = &self.items[pos];
        self.current.picks.push(pos);
        self.current.cost += item.cost;
        self.current.profit += item.profit;
        if item.high_risk {
            self.current.high_risk_cost += item.cost;
        }
        *self.per_category.entry(item.category).or_insert(0) += 1;
    }

    fn pop(&mut self) {
        let Some(pos) = self.current.picks.pop() else {
            return;
        };
        let item = &self.items[pos];
        self.current.cost -= item.cost;
        self.current.profit -= item.profit;
        if item.high_risk {
            self.current.high_risk_cost -= item.cost;
        }
        if let Some(count) = self.per_category.get_mut(&item.category) {
            *count = count.saturating_sub(1);
        }
    }

    /// Take every item that fits, in ranking order.
    fn seed_greedy(&mut self) {
        for pos in 0..self.items.len() {
            if self.fits(&self.items[pos]) {
                self.push(pos);
            }
        }
        self.best = self.current.clone();
        self.current = Selection::default();
        self.per_category.clear();
    }

    /// Upper bound on additional profit from items at `from..`.
    ///
    /// Minimum of two relaxations: the fractional knapsack on budget alone,
    /// and the `remaining_items` largest profits that individually fit.
    fn bound(&self, from: usize, budget_left: f64, remaining_items: usize) -> f64 {
        let mut fractional = 0.0;
        let mut left = budget_left;
        for item in &self.items[from..] {
            if item.cost <= left {
                fractional += item.profit;
                left -= item.cost;
            } else {
                if item.cost > 0.0 && left > 0.0 {
                    fractional += item.profit * left / item.cost;
                }
                break;
            }
        }

        let top_k: f64 = self
            .by_profit
            .iter()
            .filter(|pos| **pos >= from && self.items[**pos].cost <= budget_left)
            .take(remaining_items)
            .map(|pos| self.items[*pos].profit)
            .sum();

        fractional.min(top_k)
    }

    fn should_stop(&mut self) -> bool {
        if self.interrupted {
            return true;
        }
        if self.nodes >= self.node_limit {
            self.interrupted = true;
        } else if (self.nodes - 1) % DEADLINE_CHECK_EVERY == 0 && Instant::now() >= self.deadline {
            self.interrupted = true;
            self.timed_out = true;
        }
        self.interrupted
    }

    fn explore(&mut self, pos: usize) {
        self.nodes += 1;
        if self.should_stop() {
            return;
        }
        if self.current.profit > self.best.profit + PROFIT_EPSILON {
            self.best = self.current.clone();
        }
        let remaining_items = self
            .constraints
            .max_items
            .saturating_sub(self.current.picks.len());
        if pos >= self.items.len() || remaining_items == 0 {
            return;
        }
        let budget_left = self.constraints.max_budget - self.current.cost;
        let optimistic = self.current.profit + self.bound(pos, budget_left, remaining_items);
        if optimistic <= self.best.profit + PROFIT_EPSILON {
            return;
        }

        if self.fits(&self.items[pos]) {
            self.push(pos);
            self.explore(pos + 1);
            self.pop();
        }
        self.explore(pos + 1);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintOptimizer {
    config: OptimizerConfig,
}

impl ConstraintOptimizer {
    pub fn new(config: OptimizerConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Select the most profitable feasible subset of `candidates`.
    ///
    /// Contradictory constraints fail with `InvalidConstraint`. When nothing
    /// can be selected the result is empty and `constraint_violations` says
    /// why. Every returned selection satisfies all constraints, including
    /// one cut short by the time budget.
    pub fn optimize(
        &self,
        candidates: &[OptimalStockRecommendation],
        constraints: &OptimizationConstraints,
    ) -> AnalyticsResult<OptimizationResult> {
        constraints.validate()?;

        let items = rank_items(candidates);
        if let Some(violations) = infeasibility(candidates, &items, constraints) {
            debug!(
                candidates = candidates.len(),
                reasons = violations.len(),
                "optimization infeasible"
            );
            return Ok(OptimizationResult::empty(violations));
        }

        let budget = constraints
            .time_budget
            .unwrap_or(self.config.default_time_budget);
        let started = Instant::now();
        let mut search = Search::new(&items, constraints, started + budget, self.config.node_limit);
        let upper_bound = search.bound(0, constraints.max_budget, constraints.max_items);

        search.seed_greedy();
        search.explore(0);

        let mut picks = search.best.picks.clone();
        picks.sort_unstable();
        let selected: Vec<OptimalStockRecommendation> = picks
            .iter()
            .map(|pos| candidates[items[*pos].candidate].clone())
            .collect();

        if selected.is_empty() {
            return Ok(OptimizationResult::empty(vec![
                "no combination of candidates satisfies all constraints".to_string(),
            ]));
        }

        let total_cost: f64 = selected.iter().map(|r| r.estimated_cost).sum();
        let total_revenue: f64 = selected.iter().map(|r| r.estimated_revenue).sum();
        let total_profit = total_revenue - total_cost;
        let optimization_score = if upper_bound > PROFIT_EPSILON {
            (total_profit / upper_bound).clamp(0.0, 1.0)
        } else {
            total_profit
        };

        if search.timed_out {
            warn!(
                budget_ms = budget.as_millis() as u64,
                nodes = search.nodes,
                selected = selected.len(),
                "optimizer time budget exhausted; returning best selection so far"
            );
        }
        debug!(
            candidates = candidates.len(),
            selected = selected.len(),
            total_profit,
            nodes = search.nodes,
            elapsed_us = started.elapsed().as_micros() as u64,
            "optimization finished"
        );

        Ok(OptimizationResult {
            selected_books: selected,
            total_cost,
            total_revenue,
            total_profit,
            optimization_score,
            constraint_violations: Vec::new(),
            proven_optimal: !search.interrupted,
            timed_out: search.timed_out,
            nodes_explored: search.nodes,
        })
    }
}

/// Candidates worth buying (finite, positive profit), ranked by profit
/// density then stock-status urgency.
fn rank_items(candidates: &[OptimalStockRecommendation]) -> Vec<Item> {
    let mut items: Vec<Item> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, rec)| {
            let cost = rec.estimated_cost;
            let profit = rec.expected_profit();
            let usable = cost.is_finite() && cost >= 0.0 && profit.is_finite() && profit > 0.0;
            usable.then(|| Item {
                candidate: i,
                cost,
                profit,
                category: rec.category,
                high_risk: rec.risk_level == Some(RiskLevel::High),
                urgency: rec.stock_status.urgency(),
            })
        })
        .collect();

    items.sort_by(|a, b| {
        b.density()
            .total_cmp(&a.density())
            .then_with(|| b.urgency.cmp(&a.urgency))
            .then_with(|| b.profit.total_cmp(&a.profit))
            .then_with(|| a.candidate.cmp(&b.candidate))
    });
    items
}

/// Reasons no selection is possible, or `None` when a search is worthwhile.
fn infeasibility(
    candidates: &[OptimalStockRecommendation],
    items: &[Item],
    constraints: &OptimizationConstraints,
) -> Option<Vec<String>> {
    let mut reasons = Vec::new();

    if constraints.max_items == 0 {
        reasons.push("max_items is 0; no book can be selected".to_string());
    }
    if constraints.max_per_category == Some(0) {
        reasons.push("max_per_category is 0; no book can be selected".to_string());
    }
    if candidates.is_empty() {
        reasons.push("no candidates were supplied".to_string());
    } else if items.is_empty() {
        reasons.push(format!(
            "none of the {} candidates has a positive expected profit",
            candidates.len()
        ));
    } else {
        let cheapest = items
            .iter()
            .map(|i| i.cost)
            .fold(f64::INFINITY, f64::min);
        if cheapest > constraints.max_budget {
            reasons.push(format!(
                "every candidate exceeds the budget of {:.2} on its own (cheapest costs {:.2})",
                constraints.max_budget, cheapest
            ));
        }
        if let Some(cap) = constraints.high_risk_cap() {
            let all_high_risk = items.iter().all(|i| i.high_risk);
            let affordable = items.iter().any(|i| i.cost <= cap);
            if all_high_risk && !affordable {
                reasons.push(format!(
                    "all candidates are high risk and none fits the high-risk spend cap of {cap:.2}"
                ));
            }
        }
    }

    if reasons.is_empty() { None } else { Some(reasons) }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod duration_millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
