//! # Project Structure Summary
//!
//! Scans a workspace directory and renders the compact structure summary
//! the analyst uses to answer questions about the existing project. The
//! walk honors `.gitignore`, so build output never inflates the counts.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// Extensions counted as source for the line totals
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "toml", "json", "md",
];

/// Aggregate view of one scanned directory tree
#[derive(Debug, Clone, Default)]
pub struct StructureSummary {
    /// Files per top-level directory; root-level files under `"."`
    pub directories: BTreeMap<String, u32>,
    pub file_count: u32,
    pub source_loc: u64,
}

impl StructureSummary {
    /// Render as the text block injected into agent context
    pub fn render(&self) -> String {
        let mut out = format!(
            "Totals: {} file{}, {} source line{}.\n",
            self.file_count,
            plural(self.file_count as u64),
            self.source_loc,
            plural(self.source_loc)
        );
        for (dir, count) in &self.directories {
            let label = if dir == "." {
                "(root)".to_string()
            } else {
                format!("{}/", dir)
            };
            out.push_str(&format!(
                "{}: {} file{}\n",
                label,
                count,
                plural(*count as u64)
            ));
        }
        out
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Scan `root` and build its structure summary
pub fn summarize(root: &Path) -> Result<StructureSummary> {
    let mut summary = StructureSummary {
        source_loc: count_source_loc(root),
        ..StructureSummary::default()
    };

    let walker = ignore::WalkBuilder::new(root)
        .git_ignore(true)
        .require_git(false)
        .build();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        summary.file_count += 1;

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let top_level = relative
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = if relative.components().count() > 1 {
            top_level
        } else {
            ".".to_string()
        };
        *summary.directories.entry(key).or_insert(0) += 1;
    }

    Ok(summary)
}

/// Quick line count over source files, skipping dot dirs and build output
fn count_source_loc(root: &Path) -> u64 {
    use walkdir::WalkDir;

    let mut total = 0u64;
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && name != "target" && name != "node_modules"
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_source = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
            .unwrap_or(false);
        if is_source {
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                total = total.saturating_add(content.lines().count() as u64);
            }
        }
    }
    total
}
