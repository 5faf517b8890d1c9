use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::model::{Attributes, ProductRecord};

/// One axis observed across a group's members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAxis {
    pub key: String,
    /// Distinct values (case-insensitive), first-seen spelling kept.
    pub values: Vec<String>,
}

/// Products sharing an effective display name.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateGroup {
    pub name: String,
    /// Positions in the product list, in input order.
    pub members: Vec<usize>,
    pub prices: Vec<Decimal>,
    pub axes: Vec<GroupAxis>,
}

impl TemplateGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            prices: Vec::new(),
            axes: Vec::new(),
        }
    }

    pub fn has_axis(&self, key: &str) -> bool {
        self.axes.iter().any(|a| a.key == key)
    }

    pub fn average_price(&self) -> Decimal {
        average_price(&self.prices)
    }

    pub fn add_value(&mut self, key: &str, value: &str) {
        let axis = match self.axes.iter().position(|a| a.key == key) {
            Some(i) => &mut self.axes[i],
            None => {
                self.axes.push(GroupAxis { key: key.to_string(), values: Vec::new() });
                let last = self.axes.len() - 1;
                &mut self.axes[last]
            }
        };
        let lower = value.to_lowercase();
        if !axis.values.iter().any(|v| v.to_lowercase() == lower) {
            axis.values.push(value.to_string());
        }
    }
}

/// Mean price to the cent. Zero when there are no prices.
pub fn average_price(prices: &[Decimal]) -> Decimal {
    if prices.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = prices.iter().copied().sum();
    (total / Decimal::from(prices.len())).round_dp(2)
}

/// Group products by effective display name in first-seen order.
/// Products without any name stay ungrouped.
pub fn group_products(products: &[ProductRecord], attributes: &[Attributes]) -> Vec<TemplateGroup> {
    let mut groups: Vec<TemplateGroup> = Vec::new();
    let mut by_name: BTreeMap<String, usize> = BTreeMap::new();

    for (position, (product, attrs)) in products.iter().zip(attributes).enumerate() {
        let name = product.effective_name();
        if name.is_empty() {
            continue;
        }
        let slot = *by_name.entry(name.to_string()).or_insert_with(|| {
            groups.push(TemplateGroup::new(name));
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.members.push(position);
        if !product.price.is_zero() {
            group.prices.push(product.price);
        }
        for (key, value) in attrs.iter() {
            if key != "brand" {
                group.add_value(key, value);
            }
        }
    }
    groups
}
