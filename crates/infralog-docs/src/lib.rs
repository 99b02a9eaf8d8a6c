//! # Infralog Documentation Sidebar
//!
//! This crate holds the navigation sidebar of the Infralog documentation
//! site as typed data, together with the integrity checks the site builder
//! would otherwise only perform at build time.
//!
//! The Markdown pages live in the `docs/` directory at the workspace root;
//! `docs/sidebars.ts` is the rendered form of [`Sidebars::infralog`].
//!
//! ```
//! use infralog_docs::Sidebars;
//!
//! let sidebars = Sidebars::infralog();
//! let docs = sidebars.get("docsSidebar").unwrap();
//! assert_eq!(docs.doc_ids()[0], "index");
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

mod docset;
mod error;
mod render;
mod sidebar;

pub use docset::DocSet;
pub use error::{DocsError, Result};
pub use sidebar::{
    Category, NavEntry, Sidebar, SidebarDrift, SidebarIssue, SidebarItem, Sidebars,
    DEFAULT_SIDEBAR,
};
