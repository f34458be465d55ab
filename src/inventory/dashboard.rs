//! Summary figures shown above the product list.

use serde::Serialize;

use super::Inventory;

const TOP_PRODUCTS: usize = 5;
const MAX_LABEL_CHARS: usize = 15;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub total_units: u64,
    pub low_stock_count: usize,
    pub product_count: usize,
    pub threshold: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub barcode: String,
    pub label: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub stats: InventoryStats,
    pub top_products: Vec<TopProduct>,
}

pub fn summarize(inventory: &Inventory, threshold: u32) -> DashboardSummary {
    DashboardSummary {
        stats: stats(inventory, threshold),
        top_products: top_products(inventory),
    }
}

pub fn stats(inventory: &Inventory, threshold: u32) -> InventoryStats {
    InventoryStats {
        total_units: inventory.iter().map(|p| u64::from(p.quantity)).sum(),
        low_stock_count: inventory.iter().filter(|p| p.is_low_stock(threshold)).count(),
        product_count: inventory.len(),
        threshold,
    }
}

/// The five best-stocked products, largest first, with chart-friendly labels.
pub fn top_products(inventory: &Inventory) -> Vec<TopProduct> {
    let mut products: Vec<_> = inventory.iter().collect();
    products.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| a.barcode.cmp(&b.barcode))
    });

    products
        .into_iter()
        .take(TOP_PRODUCTS)
        .map(|p| TopProduct {
            barcode: p.barcode.clone(),
            label: chart_label(&p.name),
            quantity: p.quantity,
        })
        .collect()
}

fn chart_label(name: &str) -> String {
    if name.chars().count() > MAX_LABEL_CHARS {
        let head: String = name.chars().take(MAX_LABEL_CHARS).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::NewProduct;

    fn inventory_with(items: &[(&str, &str, u32)]) -> Inventory {
        let mut inventory = Inventory::default();
        for (barcode, name, quantity) in items {
            inventory
                .insert_new(
                    NewProduct {
                        barcode: barcode.to_string(),
                        name: name.to_string(),
                        quantity: *quantity,
                    },
                    0,
                )
                .unwrap();
        }
        inventory
    }

    #[test]
    fn low_stock_is_inclusive_of_threshold() {
        let inventory = inventory_with(&[("1", "A", 3), ("2", "B", 4), ("3", "C", 0)]);
        let stats = stats(&inventory, 3);
        assert_eq!(stats.total_units, 7);
        assert_eq!(stats.low_stock_count, 2);
        assert_eq!(stats.product_count, 3);
    }

    #[test]
    fn top_products_are_capped_and_labelled() {
        let inventory = inventory_with(&[
            ("1", "A", 1),
            ("2", "B", 9),
            ("3", "A very long product name", 7),
            ("4", "D", 3),
            ("5", "E", 5),
            ("6", "F", 2),
        ]);

        let top = top_products(&inventory);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].barcode, "2");
        assert_eq!(top[1].label, "A very long pro...");
        assert!(top.iter().all(|p| p.barcode != "1"));
    }
}
