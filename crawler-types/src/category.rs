use lazy_regex::regex;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_CATEGORY_KEY: &str = "other";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Category {
    pub key: String,
    pub name: String,
    pub path: String,
}

impl Category {
    pub fn new<K: ToString, N: ToString, P: ToString>(key: K, name: N, path: P) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            path: path.to_string(),
        }
    }

    /// Builds a category from a link found on the site, deriving the key from
    /// the path and falling back to a humanized key for an empty link text.
    pub fn from_link<S: AsRef<str>>(path: S, text: S) -> Self {
        let path = normalize_path(path.as_ref());
        let key = key_from_path(&path);
        let text = crate::format_raw_html(text);
        let name = if text.is_empty() {
            humanize_key(&key)
        } else {
            text
        };
        Self { key, name, path }
    }
}

/// `/produkt-kategorie/foo-bar/` -> `foo-bar`, anything else -> `other`
pub fn key_from_path<S: AsRef<str>>(path: S) -> String {
    regex!(r"/produkt-kategorie/([^/]+)/")
        .captures(&path.as_ref().to_lowercase())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_CATEGORY_KEY.to_string())
}

pub fn humanize_key<S: AsRef<str>>(key: S) -> String {
    key.as_ref().replace('-', " ")
}

/// Lower-cased, `/`-terminated site path.
pub fn normalize_path<S: AsRef<str>>(path: S) -> String {
    let mut path = path.as_ref().trim().to_lowercase();
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Merges discovered categories with the curated list.
///
/// The fallback list replaces `discovered` when nothing was found. Entries are
/// keyed by `key`: a later entry with a known key replaces the earlier one in
/// place, curated entries always win. Order is first insertion.
pub fn merge_categories(
    discovered: Vec<Category>,
    fallback: &[Category],
    curated: &[Category],
) -> Vec<Category> {
    let base = if discovered.is_empty() {
        log::warn!("No categories discovered, using fallback list");
        fallback.to_vec()
    } else {
        discovered
    };
    let mut merged: Vec<Category> = Vec::with_capacity(base.len() + curated.len());
    let base = base.into_iter().map(|c| {
        let name = if c.name.chars().count() > 1 {
            c.name
        } else {
            humanize_key(&c.key)
        };
        Category { name, ..c }
    });
    let curated = curated.iter().map(|c| Category {
        path: c.path.to_lowercase(),
        ..c.clone()
    });
    for category in base.chain(curated) {
        match merged.iter_mut().find(|c| c.key == category.key) {
            Some(existing) => *existing = category,
            None => merged.push(category),
        }
    }
    merged
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn derives_key_from_path() {
        assert_eq!("foo-bar", key_from_path("/produkt-kategorie/foo-bar/"));
        assert_eq!("foo-bar", key_from_path("/Produkt-Kategorie/Foo-Bar/"));
        assert_eq!("getraenke", key_from_path("/produkt-kategorie/getraenke/kaffee/"));
        assert_eq!("other", key_from_path("/shop/"));
        assert_eq!("other", key_from_path("/produkt-kategorie/"));
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(
            "/produkt-kategorie/sale/",
            normalize_path("/Produkt-Kategorie/Sale")
        );
        assert_eq!("/shop/", normalize_path("/shop/"));
    }

    #[test]
    fn builds_category_from_link() {
        assert_eq!(
            Category::new("verpackung", "Verpackung", "/produkt-kategorie/verpackung/"),
            Category::from_link("/produkt-kategorie/Verpackung", "\n  Verpackung ")
        );
        assert_eq!(
            Category::new("gastro-kuechengeraete", "gastro kuechengeraete", "/produkt-kategorie/gastro-kuechengeraete/"),
            Category::from_link("/produkt-kategorie/gastro-kuechengeraete/", "")
        );
    }

    #[test]
    fn curated_entries_replace_discovered_ones() {
        let discovered = vec![
            Category::new("verpackung", "Verpack.", "/produkt-kategorie/verpackung/"),
            Category::new("kaffee", "K", "/produkt-kategorie/kaffee/"),
        ];
        let curated = vec![
            Category::new("verpackung", "Verpackung", "/Produkt-Kategorie/Verpackung-Neu/"),
            Category::new("sale", "Wöchentliche Angebote", "/produkt-kategorie/sale/"),
        ];
        assert_eq!(
            vec![
                Category::new("verpackung", "Verpackung", "/produkt-kategorie/verpackung-neu/"),
                Category::new("kaffee", "kaffee", "/produkt-kategorie/kaffee/"),
                Category::new("sale", "Wöchentliche Angebote", "/produkt-kategorie/sale/"),
            ],
            merge_categories(discovered, &[], &curated)
        );
    }

    #[test]
    fn later_discovered_entry_with_same_key_wins_in_place() {
        let discovered = vec![
            Category::new("a", "First", "/x/produkt-kategorie/a/"),
            Category::new("b", "Bee", "/produkt-kategorie/b/"),
            Category::new("a", "Second", "/produkt-kategorie/a/"),
        ];
        assert_eq!(
            vec![
                Category::new("a", "Second", "/produkt-kategorie/a/"),
                Category::new("b", "Bee", "/produkt-kategorie/b/"),
            ],
            merge_categories(discovered, &[], &[])
        );
    }

    #[test]
    fn uses_fallback_when_nothing_discovered() {
        let fallback = vec![Category::new("sale", "Sale", "/produkt-kategorie/sale/")];
        let curated = vec![Category::new("getraenke", "Getränke", "/produkt-kategorie/getraenke/")];
        assert_eq!(
            vec![
                Category::new("sale", "Sale", "/produkt-kategorie/sale/"),
                Category::new("getraenke", "Getränke", "/produkt-kategorie/getraenke/"),
            ],
            merge_categories(vec![], &fallback, &curated)
        );
    }
}
