use crate::price::{compute_discount, parse_price};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use xxhash_rust::xxh64::xxh64;

pub const DEFAULT_CATEGORY: &str = "Andere";
pub const CATEGORY_SEPARATOR: &str = " | ";

/// Text fields of a single product card, as scraped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawProductRecord {
    pub name: String,
    pub url: String,
    pub image_url: String,
    pub price_current_raw: String,
    pub price_original_raw: String,
    pub category: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub url: String,
    pub image_url: String,
    pub price_current: Decimal,
    pub price_original: Decimal,
    pub discount_pct: u32,
    pub category: String,
}

impl Product {
    fn dedupe_key(&self) -> String {
        if self.url.is_empty() {
            format!("{}-{}", self.name, self.image_url)
        } else {
            self.url.clone()
        }
    }
}

pub fn generate_id(url: &str, name: &str, price: &Decimal) -> String {
    let key = format!("{url}|{name}|{price}");
    format!("xxh64{:x}", xxh64(key.as_bytes(), 0))
}

impl From<RawProductRecord> for Product {
    fn from(raw: RawProductRecord) -> Self {
        let current = parse_price(&raw.price_current_raw);
        // no struck-through price means "not on sale", not "no price"
        let original_raw = if raw.price_original_raw.trim().is_empty() {
            &raw.price_current_raw
        } else {
            &raw.price_original_raw
        };
        let original = parse_price(original_raw);
        let price_current = current.unwrap_or_default();
        let price_original = original.or(current).unwrap_or_default();
        let category = if raw.category.trim().is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            raw.category
        };
        Product {
            id: generate_id(&raw.url, &raw.name, &price_current),
            discount_pct: compute_discount(original, current),
            name: raw.name,
            url: raw.url,
            image_url: raw.image_url,
            price_current,
            price_original,
            category,
        }
    }
}

/// Maps raw records to products. Unparsable prices become zero, records are
/// never dropped.
pub fn normalize(raw: Vec<RawProductRecord>) -> Vec<Product> {
    raw.into_iter().map(Product::from).collect()
}

/// Collapses products sharing a URL (or name + image when the URL is empty).
///
/// The first occurrence is kept as is except for its category, which becomes
/// the union of all distinct labels in order of appearance.
pub fn dedupe(products: Vec<Product>) -> Vec<Product> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(products.len());
    let mut res: Vec<Product> = Vec::with_capacity(products.len());
    for product in products {
        let key = product.dedupe_key();
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut res[i];
                if existing.category != product.category {
                    existing.category = union_labels(&existing.category, &product.category);
                }
            }
            None => {
                index.insert(key, res.len());
                res.push(product);
            }
        }
    }
    res
}

fn union_labels(a: &str, b: &str) -> String {
    a.split('|')
        .chain(b.split('|'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unique()
        .join(CATEGORY_SEPARATOR)
}
