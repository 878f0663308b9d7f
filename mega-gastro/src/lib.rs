#![deny(clippy::unwrap_used)]

use anyhow::Context as AnyhowContext;
use crawler_types::browser::Page;
use crawler_types::category::{merge_categories, Category};
use crawler_types::format_raw_html;
use crawler_types::product::RawProductRecord;
use derive_more::Constructor;
use log_error::LogError;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

pub const BASE_URL: &str = "https://www.mega-gastro.at";
pub const ENTRY_PAGES: &[&str] = &["/", "/shop/"];
pub const UNNAMED_PRODUCT: &str = "Unnamed product";

/// Categories shown in the menu regardless of what discovery finds.
pub fn curated_categories() -> Vec<Category> {
    vec![
        Category::new("alle-produkte", "Alle Produkte", "/produkt-kategorie/alle-produkte/"),
        Category::new("verpackung", "Verpackung", "/produkt-kategorie/verpackung/"),
        Category::new("lebensmittel", "Lebensmittel", "/produkt-kategorie/lebensmittel/"),
        Category::new("getraenke", "Getränke", "/produkt-kategorie/getraenke/"),
        Category::new(
            "reinigung-hygiene",
            "Reinigung & Hygiene",
            "/produkt-kategorie/reinigung-hygiene/",
        ),
        Category::new(
            "beauty-kosmetik",
            "Beauty & Kosmetik",
            "/produkt-kategorie/beauty-kosmetik/",
        ),
        Category::new(
            "transporthilfsmaterial",
            "Transporthilfsmaterial",
            "/produkt-kategorie/transporthilfsmaterial/",
        ),
        Category::new(
            "woechentliche-angebote",
            "Wöchentliche Angebote",
            "/produkt-kategorie/woechentliche-angebote/",
        ),
    ]
}

pub fn fallback_categories() -> Vec<Category> {
    vec![
        Category::new("sale", "Wöchentliche Angebote", "/produkt-kategorie/sale/"),
        Category::new(
            "gastro-kuechengeraete",
            "Gastro Küchengeräte",
            "/produkt-kategorie/gastro-kuechengeraete/",
        ),
    ]
}

/// Readiness condition for client-side rendered category pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettleOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Consecutive polls that must report the same non-zero card count.
    pub stable_polls: usize,
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            timeout: Duration::from_secs(5),
            stable_polls: 2,
        }
    }
}

#[derive(Clone, Debug, Constructor)]
pub struct SiteOptions {
    pub base_url: Url,
    pub settle: SettleOptions,
    pub curated: Vec<Category>,
    pub fallback: Vec<Category>,
}

impl SiteOptions {
    pub fn mega_gastro(base_url: Url, settle: SettleOptions) -> Self {
        Self::new(base_url, settle, curated_categories(), fallback_categories())
    }

    pub fn category_url(&self, category: &Category) -> Result<Url, anyhow::Error> {
        self.base_url
            .join(&category.path)
            .context(format!("Invalid category path {}", category.path))
    }
}

pub mod selectors {
    #![allow(clippy::unwrap_used)]
    use once_cell::sync::Lazy;
    use scraper::Selector;

    fn parse_all(selectors: &[&str]) -> Vec<Selector> {
        selectors
            .iter()
            .map(|s| Selector::parse(s).unwrap())
            .collect()
    }

    pub static CATEGORY_LINKS: Lazy<Selector> = Lazy::new(|| {
        Selector::parse(r#"a[href*="produkt-kategorie"], a[href*="Produkt-Kategorie"]"#).unwrap()
    });

    pub mod card {
        use super::*;

        /// Tried in order; the first one matching anything wins for the page.
        pub static STRATEGIES: Lazy<Vec<Selector>> = Lazy::new(|| {
            parse_all(&[
                "ul.products li.product",
                ".product-grid .product",
                ".product-card",
                ".products .product",
            ])
        });
        pub static TITLES: Lazy<Vec<Selector>> = Lazy::new(|| {
            parse_all(&[".woocommerce-loop-product__title", ".title", "h2", "h3"])
        });
        pub static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
        pub static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
        pub static PRICE: Lazy<Selector> = Lazy::new(|| Selector::parse(".price").unwrap());
        pub static PRICE_SALE: Lazy<Selector> = Lazy::new(|| Selector::parse("ins").unwrap());
        pub static PRICE_STRUCK: Lazy<Selector> = Lazy::new(|| Selector::parse("del").unwrap());

        pub const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-lazy-src"];
    }
}

fn text_of(e: ElementRef) -> String {
    format_raw_html(e.text().collect::<String>())
}

/// Product cards of the first extraction strategy that matches anything.
pub fn select_cards(document: &Html) -> Vec<ElementRef<'_>> {
    selectors::card::STRATEGIES
        .iter()
        .map(|s| document.select(s).collect::<Vec<_>>())
        .find(|cards| !cards.is_empty())
        .unwrap_or_default()
}

pub fn count_cards(html: &str) -> usize {
    select_cards(&Html::parse_document(html)).len()
}

fn closest_link(card: ElementRef) -> Option<ElementRef> {
    card.select(&selectors::card::LINK).next().or_else(|| {
        std::iter::once(card)
            .chain(card.ancestors().filter_map(ElementRef::wrap))
            .find(|e| e.value().name() == "a")
    })
}

fn resolve(page_url: &Url, href: &str) -> Option<String> {
    page_url
        .join(href.trim())
        .log_error(&format!("Unable to resolve link {href}"))
        .map(String::from)
}

pub fn parse_card(card: ElementRef, page_url: &Url, category: &str) -> RawProductRecord {
    use selectors::card as sel;

    let name = sel::TITLES
        .iter()
        .filter_map(|s| card.select(s).next())
        .map(text_of)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| UNNAMED_PRODUCT.to_string());
    let url = closest_link(card)
        .and_then(|a| a.attr("href"))
        .filter(|href| !href.trim().is_empty())
        .and_then(|href| resolve(page_url, href))
        .unwrap_or_default();
    let image_url = card
        .select(&sel::IMAGE)
        .next()
        .and_then(|img| {
            sel::IMAGE_ATTRIBUTES
                .iter()
                .filter_map(|attr| img.attr(attr))
                .map(str::trim)
                .find(|src| !src.is_empty() && !src.starts_with("data:"))
        })
        .map(|src| resolve(page_url, src).unwrap_or_else(|| src.to_string()))
        .unwrap_or_default();
    let price_block = card.select(&sel::PRICE).next().unwrap_or(card);
    let price_current_raw = price_block
        .select(&sel::PRICE_SALE)
        .next()
        .map(text_of)
        .unwrap_or_else(|| text_of(price_block));
    let price_original_raw = price_block
        .select(&sel::PRICE_STRUCK)
        .next()
        .map(text_of)
        .unwrap_or_default();
    RawProductRecord {
        name,
        url,
        image_url,
        price_current_raw,
        price_original_raw,
        category: category.to_string(),
    }
}

pub fn parse_category_page(html: &str, page_url: &Url, category: &str) -> Vec<RawProductRecord> {
    let document = Html::parse_document(html);
    select_cards(&document)
        .into_iter()
        .map(|card| parse_card(card, page_url, category))
        .collect()
}

/// Category links on an entry page, deduplicated by normalized path.
pub fn parse_category_links(html: &str, base_url: &Url) -> Vec<Category> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .select(&selectors::CATEGORY_LINKS)
        .filter_map(|a| {
            let href = a.attr("href")?;
            let url = base_url
                .join(href.trim())
                .log_error(&format!("Invalid category link {href}"))?;
            Some(Category::from_link(url.path(), text_of(a).as_str()))
        })
        .filter(|c| seen.insert(c.path.clone()))
        .collect()
}

async fn load(page: &mut dyn Page, url: &Url) -> Result<String, anyhow::Error> {
    page.goto(url.as_str())
        .await
        .context(format!("Unable to open {url}"))?;
    page.content().await
}

/// Discovers categories from the entry pages and merges them with the curated
/// list. A failing entry page is logged and skipped.
pub async fn discover_categories(page: &mut dyn Page, opts: &SiteOptions) -> Vec<Category> {
    let mut discovered: Vec<Category> = vec![];
    let mut seen = HashSet::new();
    for entry in ENTRY_PAGES {
        let url = match opts.base_url.join(entry) {
            Ok(url) => url,
            Err(err) => {
                log::error!("Invalid entry page {entry}: {err}");
                continue;
            }
        };
        let html = match load(page, &url).await {
            Ok(html) => html,
            Err(err) => {
                log::error!("Unable to discover categories from {url}: {err:#}");
                continue;
            }
        };
        let links = parse_category_links(&html, &opts.base_url);
        log::debug!("Found {} category links on {url}", links.len());
        discovered.extend(links.into_iter().filter(|c| seen.insert(c.path.clone())));
    }
    let categories = merge_categories(discovered, &opts.fallback, &opts.curated);
    log::info!("Discovered {} categories", categories.len());
    categories
}

/// Polls the page until the product card count is stable or `timeout` passes.
/// Returns the last observed HTML either way.
pub async fn wait_for_cards(
    page: &mut dyn Page,
    settle: &SettleOptions,
) -> Result<String, anyhow::Error> {
    let started = tokio::time::Instant::now();
    let required = settle.stable_polls.max(1);
    let mut last = None;
    let mut run = 0;
    loop {
        let html = page.content().await?;
        let count = count_cards(&html);
        run = match (count, last) {
            (0, _) => 0,
            (c, Some(l)) if c == l => run + 1,
            _ => 1,
        };
        last = Some(count);
        if run >= required {
            return Ok(html);
        }
        if started.elapsed() >= settle.timeout {
            log::debug!("Page did not settle in {:?}, {count} cards found", settle.timeout);
            return Ok(html);
        }
        tokio::time::sleep(settle.poll_interval).await;
    }
}

pub async fn scrape_category(
    page: &mut dyn Page,
    url: &Url,
    category: &str,
    settle: &SettleOptions,
) -> Result<Vec<RawProductRecord>, anyhow::Error> {
    page.goto(url.as_str())
        .await
        .context(format!("Unable to open category {url}"))?;
    let html = wait_for_cards(page, settle).await?;
    let products = parse_category_page(&html, url, category);
    log::info!("Scraped {} products from {url}", products.len());
    Ok(products)
}
