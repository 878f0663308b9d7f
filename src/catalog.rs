use crate::cache::{CategoryCounts, Clock, TtlCache};
use crate::config::Config;
use actix::prelude::*;
use anyhow::Context as AnyhowContext;
use crawler_types::browser::Browser;
use crawler_types::category::Category;
use crawler_types::product::{self, Product};
use itertools::Itertools;
use log_error::LogError;
use mega_gastro::SiteOptions;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const MIN_SEARCH_LEN: usize = 3;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CategoryEntry {
    pub key: String,
    pub name: String,
    pub path: String,
    pub product_count: usize,
}

/// Category discovery and product scraping behind read-through caches.
pub struct Catalog {
    browser: Arc<dyn Browser>,
    site: SiteOptions,
    categories: TtlCache<(), Arc<Vec<Category>>>,
    products: TtlCache<String, Arc<Vec<Product>>>,
    counts: CategoryCounts,
}

/// Categories selected by a comma-separated key filter.
///
/// An empty filter, or one naming no known category, selects every category.
pub fn filter_categories(all: &[Category], filter: Option<&str>) -> Vec<Category> {
    let filter = filter.map(str::trim).unwrap_or_default();
    if filter.is_empty() {
        return all.to_vec();
    }
    let keys: HashSet<&str> = filter
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect();
    let selected: Vec<Category> = all
        .iter()
        .filter(|c| keys.contains(c.key.as_str()))
        .cloned()
        .collect();
    if selected.is_empty() {
        log::warn!("No known category matches filter \"{filter}\", using all categories");
        return all.to_vec();
    }
    selected
}

fn cache_key(categories: &[Category]) -> String {
    categories.iter().map(|c| c.key.as_str()).sorted().join(",")
}

impl Catalog {
    pub fn new(browser: Arc<dyn Browser>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_site(
            browser,
            SiteOptions::mega_gastro(config.base_url.clone(), config.settle.clone()),
            config,
            clock,
        )
    }

    pub fn with_site(
        browser: Arc<dyn Browser>,
        site: SiteOptions,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            browser,
            site,
            categories: TtlCache::new(config.categories_ttl, clock.clone()),
            products: TtlCache::new(config.products_ttl, clock),
            counts: CategoryCounts::default(),
        }
    }

    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, anyhow::Error> {
        self.categories
            .get((), move || async move {
                let mut page = self
                    .browser
                    .new_page()
                    .await
                    .context("Unable to open browser page")?;
                let categories = mega_gastro::discover_categories(&mut *page, &self.site).await;
                Ok(Arc::new(categories))
            })
            .await
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryEntry>, anyhow::Error> {
        let categories = self.categories().await?;
        let mut res = Vec::with_capacity(categories.len());
        for c in categories.iter() {
            res.push(CategoryEntry {
                key: c.key.clone(),
                name: c.name.clone(),
                path: c.path.clone(),
                product_count: self.counts.get(&c.key).await,
            });
        }
        Ok(res)
    }

    pub async fn list_products(
        &self,
        filter: Option<&str>,
    ) -> Result<Arc<Vec<Product>>, anyhow::Error> {
        let categories = self.categories().await?;
        let selected = filter_categories(&categories, filter);
        self.products
            .get(cache_key(&selected), move || self.scrape(selected))
            .await
    }

    async fn scrape(&self, categories: Vec<Category>) -> Result<Arc<Vec<Product>>, anyhow::Error> {
        let mut page = self
            .browser
            .new_page()
            .await
            .context("Unable to open browser page")?;
        let mut raw = vec![];
        let mut counts: HashMap<String, usize> = HashMap::new();
        for c in &categories {
            let Some(url) = self.site.category_url(c).log_error("Skipping category") else {
                continue;
            };
            match mega_gastro::scrape_category(&mut *page, &url, &c.name, &self.site.settle).await
            {
                Ok(items) => {
                    *counts.entry(c.key.clone()).or_default() += items.len();
                    raw.extend(items);
                }
                Err(err) => log::error!("Error scraping category {}: {err:#}", c.path),
            }
        }
        self.counts.replace(counts).await;
        let products = product::dedupe(product::normalize(raw));
        log::info!(
            "Scraped {} products from {} categories",
            products.len(),
            categories.len()
        );
        Ok(Arc::new(products))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Product>, anyhow::Error> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(vec![]);
        }
        let products = self.list_products(None).await?;
        Ok(products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }
}

pub struct CatalogService {
    catalog: Arc<Catalog>,
    warm_up: bool,
}

impl CatalogService {
    pub fn new(catalog: Arc<Catalog>, warm_up: bool) -> Self {
        Self { catalog, warm_up }
    }
}

impl Actor for CatalogService {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        if !self.warm_up {
            return;
        }
        let catalog = self.catalog.clone();
        ctx.spawn(
            async move {
                match catalog.categories().await {
                    Ok(c) => log::info!("Warmed up {} categories", c.len()),
                    Err(err) => log::error!("Unable to warm up categories: {err:#}"),
                }
            }
            .into_actor(self),
        );
    }
}

#[derive(Message)]
#[rtype(result = "Result<Vec<CategoryEntry>, anyhow::Error>")]
pub struct ListCategories;

#[derive(Message)]
#[rtype(result = "Result<Arc<Vec<Product>>, anyhow::Error>")]
pub struct ListProducts(pub Option<String>);

#[derive(Message)]
#[rtype(result = "Result<Vec<Product>, anyhow::Error>")]
pub struct SearchProducts(pub String);

impl Handler<ListCategories> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Vec<CategoryEntry>, anyhow::Error>>;

    fn handle(&mut self, _: ListCategories, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.list_categories().await }.into_actor(self))
    }
}

impl Handler<ListProducts> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Arc<Vec<Product>>, anyhow::Error>>;

    fn handle(&mut self, ListProducts(filter): ListProducts, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.list_products(filter.as_deref()).await }.into_actor(self))
    }
}

impl Handler<SearchProducts> for CatalogService {
    type Result = ResponseActFuture<Self, Result<Vec<Product>, anyhow::Error>>;

    fn handle(&mut self, SearchProducts(q): SearchProducts, _: &mut Self::Context) -> Self::Result {
        let catalog = self.catalog.clone();
        Box::pin(async move { catalog.search(&q).await }.into_actor(self))
    }
}
