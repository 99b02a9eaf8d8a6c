//! Sidebar data model.
//!
//! A sidebar is an ordered list of entries. Each entry is either a document
//! identifier or a labelled category holding further entries. Order is the
//! only semantic property: it is the order in which the site builder shows
//! the entries.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::docset::DocSet;
use crate::error::Result;

/// Name of the sidebar shown next to the Infralog documentation pages.
pub const DEFAULT_SIDEBAR: &str = "docsSidebar";

/// Marker serialised as `"type": "category"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CategoryKind {
    #[default]
    Category,
}

/// A labelled group of sidebar entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "type")]
    kind: CategoryKind,
    /// Display label.
    pub label: String,
    /// Child entries, in display order.
    pub items: Vec<SidebarItem>,
}

impl Category {
    /// Create a category with the given label and children.
    #[must_use]
    pub fn new(label: impl Into<String>, items: Vec<SidebarItem>) -> Self {
        Self {
            kind: CategoryKind::Category,
            label: label.into(),
            items,
        }
    }
}

/// One sidebar entry: a document reference or a nested category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SidebarItem {
    /// Reference to a document by identifier (path without extension).
    Doc(String),
    /// A labelled group of entries.
    Category(Category),
}

impl SidebarItem {
    /// Create a document reference.
    #[must_use]
    pub fn doc(id: impl Into<String>) -> Self {
        Self::Doc(id.into())
    }

    /// Create a category entry.
    #[must_use]
    pub fn category(label: impl Into<String>, items: Vec<SidebarItem>) -> Self {
        Self::Category(Category::new(label, items))
    }
}

/// An entry in depth-first display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEntry {
    /// A document link.
    Doc {
        /// Document identifier.
        id: String,
        /// Nesting depth, 0 for top-level entries.
        depth: usize,
    },
    /// A category heading; its children follow at `depth + 1`.
    Category {
        /// Category label.
        label: String,
        /// Nesting depth, 0 for top-level entries.
        depth: usize,
    },
}

/// A problem found while checking a sidebar against the documentation tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SidebarIssue {
    /// A referenced document does not exist.
    #[error("document '{id}' does not exist")]
    MissingDoc {
        /// The dangling identifier.
        id: String,
    },

    /// A document is referenced more than once in the same sidebar.
    #[error("document '{id}' appears more than once")]
    DuplicateDoc {
        /// The repeated identifier.
        id: String,
    },

    /// A category has no children.
    #[error("category '{label}' has no items")]
    EmptyCategory {
        /// Label of the empty category.
        label: String,
    },
}

/// Entries present in only one of two sidebar variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidebarDrift {
    /// Entries of the first variant missing from the second.
    pub removed: Vec<String>,
    /// Entries of the second variant missing from the first.
    pub added: Vec<String>,
    /// Whether entries common to both appear in the same relative order.
    pub order_preserved: bool,
}

impl SidebarDrift {
    /// True when both variants show the same entries in the same order.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.order_preserved
    }
}

/// An ordered sidebar definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sidebar {
    items: Vec<SidebarItem>,
}

impl Sidebar {
    /// Create a sidebar from its top-level entries.
    #[must_use]
    pub fn new(items: Vec<SidebarItem>) -> Self {
        Self { items }
    }

    /// Top-level entries.
    #[must_use]
    pub fn items(&self) -> &[SidebarItem] {
        &self.items
    }

    /// Every entry in depth-first display order.
    #[must_use]
    pub fn navigation_order(&self) -> Vec<NavEntry> {
        let mut entries = Vec::new();
        collect_entries(&self.items, 0, &mut entries);
        entries
    }

    /// Compact one-line rendering of the display order.
    ///
    /// Documents inside categories are shown by their last path segment,
    /// e.g. `index, Backends{s3, local}, metrics`.
    #[must_use]
    pub fn outline(&self) -> String {
        outline_items(&self.items, false)
    }

    /// Document identifiers in display order.
    #[must_use]
    pub fn doc_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        collect_doc_ids(&self.items, &mut ids);
        ids
    }

    /// Check the sidebar against the set of existing documents.
    #[must_use]
    pub fn issues(&self, docs: &DocSet) -> Vec<SidebarIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();

        for id in self.doc_ids() {
            if !docs.contains(id) {
                issues.push(SidebarIssue::MissingDoc { id: id.to_string() });
            }
            if !seen.insert(id) && reported.insert(id) {
                issues.push(SidebarIssue::DuplicateDoc { id: id.to_string() });
            }
        }

        collect_empty_categories(&self.items, &mut issues);
        issues
    }

    /// Compare this sidebar with another variant of it.
    #[must_use]
    pub fn drift(&self, other: &Sidebar) -> SidebarDrift {
        let left = self.entry_keys();
        let right = other.entry_keys();

        let left_set: HashSet<&str> = left.iter().map(String::as_str).collect();
        let right_set: HashSet<&str> = right.iter().map(String::as_str).collect();

        let removed = left
            .iter()
            .filter(|k| !right_set.contains(k.as_str()))
            .cloned()
            .collect();
        let added = right
            .iter()
            .filter(|k| !left_set.contains(k.as_str()))
            .cloned()
            .collect();

        let common_left: Vec<&str> = left
            .iter()
            .map(String::as_str)
            .filter(|k| right_set.contains(k))
            .collect();
        let common_right: Vec<&str> = right
            .iter()
            .map(String::as_str)
            .filter(|k| left_set.contains(k))
            .collect();

        SidebarDrift {
            removed,
            added,
            order_preserved: common_left == common_right,
        }
    }

    /// Identity keys of all entries: document ids and `category:<label>`.
    fn entry_keys(&self) -> Vec<String> {
        self.navigation_order()
            .into_iter()
            .map(|entry| match entry {
                NavEntry::Doc { id, .. } => id,
                NavEntry::Category { label, .. } => format!("category:{label}"),
            })
            .collect()
    }
}

fn collect_entries(items: &[SidebarItem], depth: usize, out: &mut Vec<NavEntry>) {
    for item in items {
        match item {
            SidebarItem::Doc(id) => out.push(NavEntry::Doc {
                id: id.clone(),
                depth,
            }),
            SidebarItem::Category(category) => {
                out.push(NavEntry::Category {
                    label: category.label.clone(),
                    depth,
                });
                collect_entries(&category.items, depth + 1, out);
            }
        }
    }
}

fn collect_doc_ids<'a>(items: &'a [SidebarItem], out: &mut Vec<&'a str>) {
    for item in items {
        match item {
            SidebarItem::Doc(id) => out.push(id),
            SidebarItem::Category(category) => collect_doc_ids(&category.items, out),
        }
    }
}

fn collect_empty_categories(items: &[SidebarItem], out: &mut Vec<SidebarIssue>) {
    for item in items {
        if let SidebarItem::Category(category) = item {
            if category.items.is_empty() {
                out.push(SidebarIssue::EmptyCategory {
                    label: category.label.clone(),
                });
            }
            collect_empty_categories(&category.items, out);
        }
    }
}

fn outline_items(items: &[SidebarItem], nested: bool) -> String {
    items
        .iter()
        .map(|item| match item {
            SidebarItem::Doc(id) if nested => id.rsplit('/').next().unwrap_or(id).to_string(),
            SidebarItem::Doc(id) => id.clone(),
            SidebarItem::Category(category) => {
                format!("{}{{{}}}", category.label, outline_items(&category.items, true))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A named collection of sidebars, keyed by sidebar name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sidebars {
    sidebars: BTreeMap<String, Sidebar>,
}

impl Sidebars {
    /// The sidebars of the Infralog documentation site.
    #[must_use]
    pub fn infralog() -> Self {
        let docs = Sidebar::new(vec![
            SidebarItem::doc("index"),
            SidebarItem::doc("installation"),
            SidebarItem::doc("usage"),
            SidebarItem::doc("configuration"),
            SidebarItem::category(
                "Backends",
                vec![
                    SidebarItem::doc("backends/s3"),
                    SidebarItem::doc("backends/local"),
                ],
            ),
            SidebarItem::category(
                "Targets",
                vec![
                    SidebarItem::doc("targets/webhook"),
                    SidebarItem::doc("targets/slack"),
                    SidebarItem::doc("targets/stdout"),
                ],
            ),
            SidebarItem::doc("persistence"),
            SidebarItem::doc("metrics"),
            SidebarItem::doc("contributing"),
        ]);

        let mut sidebars = Self::default();
        sidebars.insert(DEFAULT_SIDEBAR, docs);
        sidebars
    }

    /// Parse sidebars from the JSON form of the builder's schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the sidebar schema.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialise sidebars to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add or replace a sidebar.
    pub fn insert(&mut self, name: impl Into<String>, sidebar: Sidebar) {
        self.sidebars.insert(name.into(), sidebar);
    }

    /// Look up a sidebar by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Sidebar> {
        self.sidebars.get(name)
    }

    /// Iterate over sidebars in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sidebar)> {
        self.sidebars.iter().map(|(name, sidebar)| (name.as_str(), sidebar))
    }

    /// Check every sidebar, returning issues tagged with the sidebar name.
    #[must_use]
    pub fn validate(&self, docs: &DocSet) -> Vec<(String, SidebarIssue)> {
        self.iter()
            .flat_map(|(name, sidebar)| {
                sidebar
                    .issues(docs)
                    .into_iter()
                    .map(move |issue| (name.to_string(), issue))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn docs_sidebar() -> Sidebar {
        Sidebars::infralog()
            .get(DEFAULT_SIDEBAR)
            .cloned()
            .expect("default sidebar")
    }

    /// The variant that predates the S3/local backend split and stdout target.
    fn earlier_sidebar() -> Sidebar {
        Sidebar::new(vec![
            SidebarItem::doc("index"),
            SidebarItem::doc("installation"),
            SidebarItem::doc("usage"),
            SidebarItem::doc("configuration"),
            SidebarItem::category(
                "Targets",
                vec![
                    SidebarItem::doc("targets/webhook"),
                    SidebarItem::doc("targets/slack"),
                ],
            ),
            SidebarItem::doc("persistence"),
            SidebarItem::doc("metrics"),
            SidebarItem::doc("contributing"),
        ])
    }

    #[test]
    fn test_navigation_outline() {
        assert_eq!(
            docs_sidebar().outline(),
            "index, installation, usage, configuration, Backends{s3, local}, \
             Targets{webhook, slack, stdout}, persistence, metrics, contributing"
        );
    }

    #[test]
    fn test_doc_ids_in_display_order() {
        assert_eq!(
            docs_sidebar().doc_ids(),
            vec![
                "index",
                "installation",
                "usage",
                "configuration",
                "backends/s3",
                "backends/local",
                "targets/webhook",
                "targets/slack",
                "targets/stdout",
                "persistence",
                "metrics",
                "contributing",
            ]
        );
    }

    #[test]
    fn test_navigation_order_depths() {
        let order = docs_sidebar().navigation_order();
        assert_eq!(
            order[4],
            NavEntry::Category {
                label: "Backends".to_string(),
                depth: 0
            }
        );
        assert_eq!(
            order[5],
            NavEntry::Doc {
                id: "backends/s3".to_string(),
                depth: 1
            }
        );
        assert_eq!(order.len(), 14);
    }

    #[test]
    fn test_no_issues_when_all_docs_exist() {
        let sidebar = docs_sidebar();
        let docs = DocSet::from_ids(sidebar.doc_ids());
        assert!(sidebar.issues(&docs).is_empty());
    }

    #[test]
    fn test_missing_doc_reported() {
        let sidebar = docs_sidebar();
        let docs = DocSet::from_ids(
            sidebar
                .doc_ids()
                .into_iter()
                .filter(|id| *id != "metrics"),
        );
        assert_eq!(
            sidebar.issues(&docs),
            vec![SidebarIssue::MissingDoc {
                id: "metrics".to_string()
            }]
        );
    }

    #[test]
    fn test_duplicate_reported_once() {
        let sidebar = Sidebar::new(vec![
            SidebarItem::doc("index"),
            SidebarItem::category("Again", vec![SidebarItem::doc("index")]),
            SidebarItem::doc("index"),
        ]);
        let docs = DocSet::from_ids(["index"]);
        assert_eq!(
            sidebar.issues(&docs),
            vec![SidebarIssue::DuplicateDoc {
                id: "index".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_category_reported() {
        let sidebar = Sidebar::new(vec![SidebarItem::category(
            "Outer",
            vec![SidebarItem::category("Inner", Vec::new())],
        )]);
        let issues = sidebar.issues(&DocSet::default());
        assert_eq!(
            issues,
            vec![SidebarIssue::EmptyCategory {
                label: "Inner".to_string()
            }]
        );
    }

    #[test]
    fn test_drift_between_variants() {
        let drift = earlier_sidebar().drift(&docs_sidebar());
        assert!(drift.removed.is_empty());
        assert_eq!(
            drift.added,
            vec![
                "category:Backends".to_string(),
                "backends/s3".to_string(),
                "backends/local".to_string(),
                "targets/stdout".to_string(),
            ]
        );
        assert!(drift.order_preserved);
        assert!(!drift.is_empty());
    }

    #[test]
    fn test_drift_detects_reordering() {
        let a = Sidebar::new(vec![SidebarItem::doc("a"), SidebarItem::doc("b")]);
        let b = Sidebar::new(vec![SidebarItem::doc("b"), SidebarItem::doc("a")]);
        let drift = a.drift(&b);
        assert!(drift.added.is_empty());
        assert!(drift.removed.is_empty());
        assert!(!drift.order_preserved);
    }

    #[test]
    fn test_drift_identical() {
        assert!(docs_sidebar().drift(&docs_sidebar()).is_empty());
    }

    #[test]
    fn test_category_serializes_with_type_tag() {
        let item = SidebarItem::category("Targets", vec![SidebarItem::doc("targets/slack")]);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "category",
                "label": "Targets",
                "items": ["targets/slack"]
            })
        );
    }

    #[test]
    fn test_from_json_matches_builtin() {
        let json = r#"{
            "docsSidebar": [
                "index", "installation", "usage", "configuration",
                {"type": "category", "label": "Backends", "items": ["backends/s3", "backends/local"]},
                {"type": "category", "label": "Targets",
                 "items": ["targets/webhook", "targets/slack", "targets/stdout"]},
                "persistence", "metrics", "contributing"
            ]
        }"#;
        assert_eq!(Sidebars::from_json(json).unwrap(), Sidebars::infralog());
    }

    #[test]
    fn test_from_json_rejects_unknown_entry_type() {
        let json = r#"{"docsSidebar": [{"type": "link", "label": "x", "items": []}]}"#;
        assert!(Sidebars::from_json(json).is_err());
    }

    #[test]
    fn test_validate_tags_sidebar_name() {
        let mut sidebars = Sidebars::default();
        sidebars.insert("api", Sidebar::new(vec![SidebarItem::doc("missing")]));
        let issues = sidebars.validate(&DocSet::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].0, "api");
    }
}
