use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

/// Compiled-in catalog: canonical title → product image.
const DEFAULT_FOOD_OPTIONS: &[(&str, &str)] = &[
    (
        "rice",
        "https://thumbnail.coupangcdn.com/thumbnails/remote/492x492ex/image/vendor_inventory/d094/34fde360b47caa5fc49658cd730ed49e764c46c08a4dedbe00c0a8e10b06.jpg",
    ),
    (
        "kimchi stew with pork",
        "https://thumbnail.coupangcdn.com/thumbnails/remote/492x492ex/image/retail/images/63802549765540-0420b1d6-40b4-4ace-ae0b-f1adb362f3a7.png",
    ),
    (
        "seoul milk",
        "https://thumbnail.coupangcdn.com/thumbnails/remote/492x492ex/image/vendor_inventory/73de/eb09fc89efab772c29e42ef61622b7589f43cc0867597d5000ec61b966eb.jpg",
    ),
];

static BUILTIN: Lazy<Inventory> = Lazy::new(|| Inventory::from_entries(DEFAULT_FOOD_OPTIONS));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub canonical_title: String,
    pub image_url: String,
}

/// Immutable product table plus a lowercase → canonical index built once.
#[derive(Debug, Clone)]
pub struct Inventory {
    items: BTreeMap<String, InventoryItem>,
    by_lowercase: HashMap<String, String>,
}

impl Inventory {
    pub fn builtin() -> &'static Inventory {
        &BUILTIN
    }

    pub fn from_entries(entries: &[(&str, &str)]) -> Self {
        let mut items = BTreeMap::new();
        let mut by_lowercase = HashMap::with_capacity(entries.len());
        for (title, image_url) in entries {
            items.insert(
                title.to_string(),
                InventoryItem {
                    canonical_title: title.to_string(),
                    image_url: image_url.to_string(),
                },
            );
            by_lowercase.insert(title.to_lowercase(), title.to_string());
        }
        Self {
            items,
            by_lowercase,
        }
    }

    /// Case-insensitive match after trimming. `None` is a normal outcome.
    pub fn lookup(&self, raw_title: &str) -> Option<&InventoryItem> {
        let key = raw_title.trim().to_lowercase();
        self.by_lowercase
            .get(&key)
            .and_then(|canonical| self.items.get(canonical))
    }

    /// Canonical titles in sorted order.
    pub fn titles(&self) -> Vec<&str> {
        self.items.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_any_case_permutation_returns_canonical() {
        let inventory = Inventory::builtin();
        for title in inventory.titles() {
            let mixed: String = title
                .chars()
                .enumerate()
                .map(|(idx, ch)| {
                    if idx % 2 == 0 {
                        ch.to_ascii_uppercase()
                    } else {
                        ch
                    }
                })
                .collect();
            for probe in [title.to_uppercase(), title.to_lowercase(), mixed] {
                let item = inventory.lookup(&probe).expect("known title");
                assert_eq!(item.canonical_title, title);
            }
        }
    }

    #[test]
    fn lookup_trims_whitespace() {
        let item = Inventory::builtin().lookup("  Seoul Milk \n").expect("match");
        assert_eq!(item.canonical_title, "seoul milk");
        assert!(item.image_url.starts_with("https://"));
    }

    #[test]
    fn lookup_unknown_title_is_none() {
        assert!(Inventory::builtin().lookup("unknown snack").is_none());
        assert!(Inventory::builtin().lookup("").is_none());
    }

    #[test]
    fn titles_are_sorted() {
        let inventory = Inventory::from_entries(&[("zeta", "z"), ("Alpha", "a"), ("mid", "m")]);
        assert_eq!(inventory.titles(), vec!["Alpha", "mid", "zeta"]);
        assert_eq!(inventory.len(), 3);
        assert_eq!(inventory.lookup("ALPHA").unwrap().image_url, "a");
    }
}
