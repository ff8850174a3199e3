use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::instrument::Instrument;

use super::table::FrameTable;

const COLUMNS: [&str; 10] = [
    "filename",
    "instrume",
    "binning",
    "filter1",
    "filter2",
    "filters",
    "obstype",
    "zero_file",
    "dark_file",
    "flat_file",
];

/// Render the frame table as an HTML table with id `{slug}_reduce`.
pub fn render_html(table: &FrameTable, instrument: Instrument) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<table border=\"1\" class=\"dataframe\" id=\"{}_reduce\">",
        instrument.slug()
    );
    html.push_str("  <thead>\n    <tr style=\"text-align: right;\">\n      <th></th>\n");
    for column in COLUMNS {
        let _ = writeln!(html, "      <th>{column}</th>");
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");

    let path_cell = |p: &Option<PathBuf>| {
        p.as_ref()
            .map_or_else(|| "None".to_string(), |p| p.display().to_string())
    };
    for (i, row) in table.rows.iter().enumerate() {
        let f = &row.frame;
        let cells = [
            f.path.display().to_string(),
            f.instrument.clone(),
            f.binning.to_string(),
            f.filter1.clone(),
            f.filter2.clone(),
            f.filters.clone(),
            f.obstype.to_string(),
            path_cell(&row.zero_file),
            path_cell(&row.dark_file),
            path_cell(&row.flat_file),
        ];
        let _ = writeln!(html, "    <tr>\n      <th>{i}</th>");
        for cell in &cells {
            let _ = writeln!(html, "      <td>{}</td>", escape(cell));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>\n");
    html
}

/// Write `{slug}_reduce.html` into `dir` and return its path.
pub fn write_html(table: &FrameTable, instrument: Instrument, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("{}_reduce.html", instrument.slug()));
    fs::write(&path, render_html(table, instrument))?;
    info!(file = %path.display(), "Saved frame table");
    Ok(path)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
