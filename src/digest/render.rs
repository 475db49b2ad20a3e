//! Markdown and JSON renderings of a `Digest`.

use std::fmt::Write as _;

use super::assemble::{CategoryTable, Digest, SourceSection};
use crate::error::RefineryError;

/// `YYYYMMDD` and `HH` of the digest's generation time, in its own offset.
pub fn time_tags(digest: &Digest) -> (String, String) {
    (
        digest.generated_at.format("%Y%m%d").to_string(),
        digest.generated_at.format("%H").to_string(),
    )
}

pub fn render_markdown(digest: &Digest) -> String {
    let (date_tag, hour_tag) = time_tags(digest);
    let mut md = String::new();
    let _ = writeln!(md, "# Signal Digest ({date_tag} {hour_tag}:00)\n");
    let _ = writeln!(
        md,
        "> Cross-source dedup | quiet sources collapsed | per-author cap\n"
    );

    for section in &digest.sections {
        match section {
            SourceSection::Fresh { source, categories } => {
                if categories.iter().all(|c| c.rows.is_empty()) {
                    continue;
                }
                let _ = writeln!(md, "## Source: {}", source.to_uppercase());
                for table in categories {
                    render_table(&mut md, table);
                }
            }
            SourceSection::Stale {
                source,
                last_seen_at,
                minutes_stale,
            } => {
                let last = last_seen_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                let _ = writeln!(md, "## Source: {} (last update: {last})", source.to_uppercase());
                match minutes_stale {
                    Some(m) => {
                        let _ = writeln!(md, "> *No new data for {} h {} min.*\n", m / 60, m % 60);
                    }
                    None => {
                        let _ = writeln!(md, "> *No data yet.*\n");
                    }
                }
            }
            SourceSection::Unavailable { source, reason } => {
                let _ = writeln!(md, "## Source: {} (check failed)", source.to_uppercase());
                let _ = writeln!(md, "> *Skipped this cycle: {}*\n", escape_cell(reason));
            }
        }
    }

    if !digest.has_content() {
        md.push_str("\n**All sources quiet this cycle. See the hourly archive.**\n");
    }
    md
}

fn render_table(md: &mut String, table: &CategoryTable) {
    if table.rows.is_empty() {
        return;
    }
    let _ = writeln!(md, "### Category: {}", table.category);
    let _ = writeln!(md, "| {} |", table.header_columns.join(" | "));
    let _ = writeln!(
        md,
        "|{}",
        " :--- |".repeat(table.header_columns.len())
    );
    for row in &table.rows {
        let author = if row.is_backfill {
            format!("{} (backfill)", escape_cell(&row.author))
        } else {
            escape_cell(&row.author)
        };
        let _ = writeln!(
            md,
            "| **{}** | {} | {} | [view]({}) |",
            thousands(row.score),
            author,
            escape_cell(&row.excerpt),
            row.link
        );
    }
    md.push('\n');
}

pub fn render_json(digest: &Digest) -> Result<String, RefineryError> {
    Ok(serde_json::to_string_pretty(digest)?)
}

/// Table cells cannot hold raw pipes or newlines.
fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Integer part with `,` separators: 1234567.8 → "1,234,567".
fn thousands(score: f64) -> String {
    let n = if score.is_finite() { score.trunc() as i64 } else { 0 };
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}
