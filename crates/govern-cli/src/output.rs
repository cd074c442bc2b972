use serde::Serialize;

/// Files listed per finding before the rest are summarized.
pub const MAX_LISTED_FILES: usize = 10;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// Lines for a file listing capped at `limit` entries, with the full count
/// kept in the trailer when entries are elided.
pub fn truncated_listing(files: &[String], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = files.iter().take(limit).map(|f| format!("- {f}")).collect();
    if files.len() > limit {
        lines.push(format!(
            "... and {} more ({} total)",
            files.len() - limit,
            files.len()
        ));
    }
    lines
}
