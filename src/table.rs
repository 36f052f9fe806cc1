//! Plain-text tables for console output.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Cells wider than this are cut and end with `...`.
pub const MAX_CELL_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

/// Renders a table, right-aligning columns whose cells are all numeric.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let alignments = (0..headers.len())
        .map(|idx| {
            let numeric = !rows.is_empty()
                && rows.iter().all(|row| {
                    row.get(idx)
                        .map(|cell| cell.is_empty() || is_numeric_cell(cell))
                        .unwrap_or(true)
                });
            if numeric { Alignment::Right } else { Alignment::Left }
        })
        .collect::<Vec<_>>();
    render_aligned(headers, rows, &alignments)
}

pub fn render_aligned(
    headers: &[String],
    rows: &[Vec<String>],
    alignments: &[Alignment],
) -> String {
    let column_count = headers.len();
    let cells = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(column_count)
                .map(|cell| clip_cell(cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut widths = headers
        .iter()
        .map(|h| display_width(h).max(3))
        .collect::<Vec<_>>();
    for row in &cells {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let header_cells = headers.iter().map(|h| Cow::Borrowed(h.as_str())).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths, alignments));
    let rule = widths.iter().map(|w| Cow::Owned("-".repeat(*w))).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in &cells {
        let _ = writeln!(output, "{}", format_row(row, &widths, alignments));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[Cow<'_, str>], widths: &[usize], alignments: &[Alignment]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, width))| {
            let padding = " ".repeat(width.saturating_sub(display_width(value)));
            match alignments.get(idx).copied().unwrap_or(Alignment::Left) {
                Alignment::Left => format!("{value}{padding}"),
                Alignment::Right => format!("{padding}{value}"),
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    let trimmed = line.trim_end().len();
    line.truncate(trimmed);
    line
}

fn is_numeric_cell(cell: &str) -> bool {
    cell.trim_end_matches('%').parse::<f64>().is_ok()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn clip_cell(value: &str) -> Cow<'_, str> {
    let sanitized: Cow<'_, str> = if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    };
    if display_width(&sanitized) > MAX_CELL_WIDTH {
        let mut clipped = sanitized
            .chars()
            .take(MAX_CELL_WIDTH - 3)
            .collect::<String>();
        clipped.push_str("...");
        Cow::Owned(clipped)
    } else {
        sanitized
    }
}
