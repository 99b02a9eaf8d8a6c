//! Rendering sidebars as a Docusaurus `sidebars.ts` module.

use crate::sidebar::{SidebarItem, Sidebars};

const HEADER: &str = "import type {SidebarsConfig} from '@docusaurus/plugin-content-docs';\n\n\
                      const sidebars: SidebarsConfig = {\n";
const FOOTER: &str = "};\n\nexport default sidebars;\n";
const INDENT: &str = "  ";

impl Sidebars {
    /// Render as the TypeScript module consumed by the site builder.
    ///
    /// Categories whose children are all documents are written on one
    /// line; nested categories are expanded.
    #[must_use]
    pub fn to_typescript(&self) -> String {
        let mut out = String::from(HEADER);
        for (name, sidebar) in self.iter() {
            line(&mut out, 1, &format!("{}: [", key(name)));
            for item in sidebar.items() {
                write_item(&mut out, item, 2);
            }
            line(&mut out, 1, "],");
        }
        out.push_str(FOOTER);
        out
    }
}

fn line(out: &mut String, level: usize, text: &str) {
    out.push_str(&INDENT.repeat(level));
    out.push_str(text);
    out.push('\n');
}

fn write_item(out: &mut String, item: &SidebarItem, level: usize) {
    match item {
        SidebarItem::Doc(id) => line(out, level, &format!("{},", quote(id))),
        SidebarItem::Category(category) => {
            line(out, level, "{");
            line(out, level + 1, "type: 'category',");
            line(out, level + 1, &format!("label: {},", quote(&category.label)));

            let flat: Option<Vec<String>> = category
                .items
                .iter()
                .map(|child| match child {
                    SidebarItem::Doc(id) => Some(quote(id)),
                    SidebarItem::Category(_) => None,
                })
                .collect();

            match flat {
                Some(ids) => line(out, level + 1, &format!("items: [{}],", ids.join(", "))),
                None => {
                    line(out, level + 1, "items: [");
                    for child in &category.items {
                        write_item(out, child, level + 2);
                    }
                    line(out, level + 1, "],");
                }
            }
            line(out, level, "},");
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Object keys are written bare when they are plain identifiers.
fn key(name: &str) -> String {
    let bare = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if bare {
        name.to_string()
    } else {
        quote(name)
    }
}
