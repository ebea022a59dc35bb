use std::cmp;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    pub name: &'a str,
    pub align: Align,
}

impl<'a> Column<'a> {
    pub const fn left(name: &'a str) -> Self {
        Self {
            name,
            align: Align::Left,
        }
    }

    pub const fn right(name: &'a str) -> Self {
        Self {
            name,
            align: Align::Right,
        }
    }
}

const INDENT: usize = 2;
const COLUMN_GAP: usize = 2;

pub fn terminal_width() -> usize {
    let from_env = std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(120);
    cmp::max(from_env, 40)
}

pub fn key_value_rows(entries: &[(&str, String)], indent: usize) -> Vec<String> {
    let label_width = entries
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(0);
    let padding = " ".repeat(indent);

    entries
        .iter()
        .map(|(label, value)| format!("{padding}{label:<label_width$}  {value}"))
        .collect()
}

/// Aligned table when every column fits its header in `max_width`,
/// otherwise one labelled block per row.
pub fn render_table_or_blocks(
    columns: &[Column<'_>],
    rows: &[Vec<String>],
    max_width: usize,
    block_label: &str,
) -> Vec<String> {
    if columns.is_empty() {
        return Vec::new();
    }

    let widths = column_widths(columns, rows);
    let header_total = columns.iter().map(|column| column.name.len()).sum::<usize>();
    let gaps = COLUMN_GAP * columns.len().saturating_sub(1);
    if INDENT + header_total + gaps > max_width {
        return render_blocks(columns, rows, block_label);
    }
    let widths = shrink_to_fit(columns, widths, max_width.saturating_sub(INDENT + gaps));

    let header = columns
        .iter()
        .map(|column| column.name.to_string())
        .collect::<Vec<_>>();
    let mut output = vec![format_row(columns, &header, &widths)];
    for row in rows {
        let wrapped = widths
            .iter()
            .enumerate()
            .map(|(index, width)| chunk_cell(row.get(index).map(String::as_str).unwrap_or(""), *width))
            .collect::<Vec<_>>();
        let height = wrapped.iter().map(Vec::len).max().unwrap_or(1);
        for line in 0..height {
            let cells = wrapped
                .iter()
                .map(|chunks| chunks.get(line).cloned().unwrap_or_default())
                .collect::<Vec<_>>();
            output.push(format_row(columns, &cells, &widths));
        }
    }
    output
}

fn column_widths(columns: &[Column<'_>], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths = columns
        .iter()
        .map(|column| column.name.len())
        .collect::<Vec<_>>();
    for row in rows {
        for (slot, value) in widths.iter_mut().zip(row) {
            *slot = cmp::max(*slot, value.chars().count());
        }
    }
    widths
}

/// Narrows the widest column one step at a time, never below its header.
fn shrink_to_fit(columns: &[Column<'_>], mut widths: Vec<usize>, budget: usize) -> Vec<usize> {
    while widths.iter().sum::<usize>() > budget {
        let candidate = widths
            .iter()
            .enumerate()
            .filter(|(index, width)| **width > columns[*index].name.len())
            .max_by_key(|(_, width)| **width)
            .map(|(index, _)| index);
        match candidate {
            Some(index) => widths[index] -= 1,
            None => break,
        }
    }
    widths
}

fn chunk_cell(value: &str, width: usize) -> Vec<String> {
    if width == 0 || value.chars().count() <= width {
        return vec![value.to_string()];
    }
    value
        .chars()
        .collect::<Vec<_>>()
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn format_row(columns: &[Column<'_>], cells: &[String], widths: &[usize]) -> String {
    let pieces = columns
        .iter()
        .zip(widths)
        .zip(cells)
        .map(|((column, width), value)| match column.align {
            Align::Left => format!("{value:<width$}"),
            Align::Right => format!("{value:>width$}"),
        })
        .collect::<Vec<_>>();
    format!("{}{}", " ".repeat(INDENT), pieces.join("  ").trim_end())
}

fn render_blocks(columns: &[Column<'_>], rows: &[Vec<String>], block_label: &str) -> Vec<String> {
    let labels = columns
        .iter()
        .map(|column| format!("{}:", column.name))
        .collect::<Vec<_>>();
    let label_width = labels.iter().map(String::len).max().unwrap_or(0);

    let mut output = Vec::new();
    for (row_index, row) in rows.iter().enumerate() {
        if row_index > 0 {
            output.push(String::new());
        }
        output.push(format!("  {block_label} {}:", row_index + 1));
        for (label, value) in labels.iter().zip(row) {
            output.push(format!("    {label:<label_width$}  {value}"));
        }
    }
    output
}
