use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::Product;

/// Input for creating a product after an unknown barcode was scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub barcode: String,
    pub name: String,
    pub quantity: u32,
}

/// Barcode → product mapping. Pure in-memory model; persistence lives in
/// [`super::InventoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Product>", into = "Vec<Product>")]
pub struct Inventory {
    products: HashMap<String, Product>,
}

impl From<Vec<Product>> for Inventory {
    fn from(products: Vec<Product>) -> Self {
        // Later records win when a document repeats a barcode.
        Self {
            products: products
                .into_iter()
                .map(|product| (product.barcode.clone(), product))
                .collect(),
        }
    }
}

impl From<Inventory> for Vec<Product> {
    fn from(inventory: Inventory) -> Self {
        inventory.into_products()
    }
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, barcode: &str) -> Option<&Product> {
        self.products.get(barcode)
    }

    pub fn contains(&self, barcode: &str) -> bool {
        self.products.contains_key(barcode)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// Products ordered by barcode, the stable order used for storage.
    pub fn into_products(self) -> Vec<Product> {
        let mut products: Vec<Product> = self.products.into_values().collect();
        products.sort_by(|a, b| a.barcode.cmp(&b.barcode));
        products
    }

    /// Display order: most recently updated first.
    pub fn by_recency(&self) -> Vec<&Product> {
        let mut products: Vec<&Product> = self.products.values().collect();
        products.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.barcode.cmp(&b.barcode))
        });
        products
    }

    pub fn insert_new(&mut self, new: NewProduct, now_ms: i64) -> Result<&Product> {
        let barcode = new.barcode.trim().to_string();
        if barcode.is_empty() {
            bail!("barcode must not be empty");
        }
        if new.name.trim().is_empty() {
            bail!("product name must not be empty");
        }
        if self.products.contains_key(&barcode) {
            bail!("product {barcode} already exists");
        }

        let product = Product::new(barcode.clone(), new.name, new.quantity, now_ms);
        Ok(&*self.products.entry(barcode).or_insert(product))
    }

    pub fn apply_delta(&mut self, barcode: &str, delta: i64, now_ms: i64) -> Result<&Product> {
        let product = self.get_mut(barcode)?;
        product.apply_delta(delta, now_ms);
        Ok(&*product)
    }

    pub fn rename(&mut self, barcode: &str, name: String, now_ms: i64) -> Result<&Product> {
        let product = self.get_mut(barcode)?;
        product.rename(name, now_ms);
        Ok(&*product)
    }

    pub fn remove(&mut self, barcode: &str) -> Option<Product> {
        self.products.remove(barcode)
    }

    fn get_mut(&mut self, barcode: &str) -> Result<&mut Product> {
        self.products
            .get_mut(barcode)
            .ok_or_else(|| anyhow!("unknown product {barcode}"))
    }
}
