use crate::browser::SelectOption;
use crate::settings::{Settings, TableFormat};
use crate::tags::TableRow;

const HEADERS: [&str; 4] = ["Tag", "VR", "Keyword", "Value"];
const ELLIPSIS: &str = "...";

pub fn render_table(rows: &[TableRow], settings: &Settings) -> String {
    let lines = rows
        .iter()
        .map(|row| {
            let [tag, vr, keyword, value] = row.columns();
            [
                tag.to_string(),
                vr.to_string(),
                keyword.to_string(),
                truncate_value(&single_line(value), settings.value_max_chars),
            ]
        })
        .collect::<Vec<_>>();

    match settings.format {
        TableFormat::Tsv => render_tsv(&lines),
        TableFormat::Aligned => render_aligned(&lines),
    }
}

fn render_tsv(lines: &[[String; 4]]) -> String {
    let mut out = HEADERS.join("\t");
    out.push('\n');
    for line in lines {
        out.push_str(&line.join("\t"));
        out.push('\n');
    }
    out
}

fn render_aligned(lines: &[[String; 4]]) -> String {
    let mut widths = HEADERS.map(|header| header.chars().count());
    for line in lines {
        for (width, cell) in widths.iter_mut().zip(line.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_aligned_line(&mut out, &HEADERS.map(str::to_string), &widths);
    let rule = widths.map(|width| "-".repeat(width));
    push_aligned_line(&mut out, &rule, &widths);
    for line in lines {
        push_aligned_line(&mut out, line, &widths);
    }
    out
}

fn push_aligned_line(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let mut line = String::new();
    for (index, (cell, width)) in cells.iter().zip(widths.iter()).enumerate() {
        if index > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        let padding = width.saturating_sub(cell.chars().count());
        line.extend(std::iter::repeat(' ').take(padding));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Text values may carry line breaks (LT/UT); keep one table line per row.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' || ch == '\t' { ' ' } else { ch })
        .collect()
}

fn truncate_value(value: &str, max_chars: usize) -> String {
    if max_chars == 0 || value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated = value.chars().take(keep).collect::<String>();
    truncated.push_str(ELLIPSIS);
    truncated
}

pub fn render_options<V>(heading: &str, options: &[SelectOption<V>], selected: Option<&V>) -> String
where
    V: PartialEq,
{
    let mut out = format!("{heading}:\n");
    for option in options {
        let marker = if selected == Some(&option.value) { '*' } else { ' ' };
        out.push_str(&format!("{marker} {}", option.title));
        if !option.description.is_empty() {
            out.push_str(&format!("  [{}]", option.description));
        }
        out.push('\n');
    }
    out
}
