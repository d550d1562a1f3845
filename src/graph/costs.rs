use super::network::Link;
use std::collections::BTreeMap;

/// Trip-local cost override layer.
///
/// The network's base costs never change. A reconstruction run owns one of these and
/// hands it to every shortest path query, so concurrent trips cannot see each other's
/// discounts and dropping the run drops its discounts.
#[derive(Debug, Clone, Default)]
pub struct CostOverrides {
    factors: BTreeMap<usize, f64>,
}

impl CostOverrides {
    pub fn new() -> Self {
        CostOverrides::default()
    }

    /// Multiplies the base cost of every link in `links` by `factor`. A later override
    /// on the same link replaces the earlier one rather than compounding.
    pub fn apply_cost_override<I>(&mut self, links: I, factor: f64)
    where
        I: IntoIterator<Item = usize>,
    {
        for link in links {
            self.factors.insert(link, factor);
        }
    }

    pub fn reset_costs(&mut self) {
        self.factors.clear();
    }

    pub fn factor(&self, link_index: usize) -> f64 {
        self.factors.get(&link_index).copied().unwrap_or(1.0)
    }

    pub fn effective_cost(&self, link_index: usize, link: &Link) -> f64 {
        link.get_base_cost() * self.factor(link_index)
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
