//! Catalog listing reports

use super::Downloader;
use crate::db::ComponentQuery;
use crate::error::Result;
use crate::types::{AvailableComponent, CatalogSummary, ComponentKind};

/// Column at which summary lists wrap
const WRAP_WIDTH: usize = 78;
const INDENT: &str = "  ";

/// What [`Downloader::list`] reported
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listing {
    /// Filters were given; these components matched
    Matches(Vec<AvailableComponent>),
    /// No filters; distinct values in the catalog
    Summary(CatalogSummary),
}

impl Downloader {
    /// Write a listing report to the primary output
    ///
    /// With any filter set, every matching component is printed followed by a
    /// count line. Without filters, the available arches, targets, editions,
    /// versions and components are printed instead.
    pub async fn list(&self, query: &ComponentQuery) -> Result<Listing> {
        self.scoped(async {
            if query.is_unfiltered() {
                let summary = self.db.catalog_summary().await?;
                self.emit(&render_summary(&summary))?;
                return Ok(Listing::Summary(summary));
            }

            let matches = self.db.query_components(query).await?;
            self.emit(&render_matches(&matches))?;
            Ok(Listing::Matches(matches))
        })
        .await
    }
}

/// Report for a filtered listing
pub fn render_matches(matches: &[AvailableComponent]) -> String {
    let mut out = String::new();
    for item in matches {
        out.push_str(&format!(
            "Download: {}\n Version: {}\n  Target: {}\n    Arch: {}\n Edition: {}\n    Info: {}\n\n\n",
            item.key, item.version, item.target, item.arch, item.edition, item.data
        ));
    }

    match matches.len() {
        0 => out.push_str("No items matched the listed filters\n"),
        1 => out.push_str("Only one matching item\n"),
        n => out.push_str(&format!("{n} available downloadable components\n")),
    }
    out.push_str("(Omit filter arguments for a list of available filters)");
    out
}

/// Report for an unfiltered listing
pub fn render_summary(summary: &CatalogSummary) -> String {
    let mut components = summary.components.clone();
    let archive = ComponentKind::Archive.key();
    if components.iter().any(|c| c == archive) {
        components.push(ComponentKind::ArchiveDebug.key().to_string());
        components.sort();
    }

    format!(
        "Architectures:\n{INDENT}{}\nTargets:\n{}\nEditions:\n{INDENT}{}\nVersions:\n{}\nComponents:\n{INDENT}{}\n",
        summary.arches.join(", "),
        wrap_list(&summary.targets),
        summary.editions.join(", "),
        wrap_list(&summary.versions),
        components.join(", "),
    )
}

/// Join `items` with ", " and break into indented lines no wider than [`WRAP_WIDTH`]
fn wrap_list(items: &[String]) -> String {
    let joined = items.join(", ");
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::from(INDENT);

    for word in joined.split(' ') {
        let fits = line.len() == INDENT.len() || line.len() + 1 + word.len() <= WRAP_WIDTH;
        if !fits {
            lines.push(std::mem::replace(&mut line, String::from(INDENT)));
        }
        if line.len() > INDENT.len() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if line.len() > INDENT.len() {
        lines.push(line);
    }
    lines.join("\n")
}
