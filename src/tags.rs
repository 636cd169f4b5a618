//! Tag-tree formatting: turns a keyword-keyed metadata object into ordered,
//! indentation-aware rows and flattens them into table lines.

use crate::dictionary::{TagDictionary, RETIRED_PREFIX};
use crate::metadata::{format_number, MetadataObject, MetadataValue};

const VR_MAP_KEY: &str = "_vrMap";
const PRIVATE_TAG_LABEL: &str = "Private Tag";
const ITEM_TAG: &str = "(FFFE,E000)";
const PLACEHOLDER: &str = " ";

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Leaf(ElementRow),
    Sequence(SequenceRow),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementRow {
    pub tag: String,
    pub tag_indent: String,
    pub depth: usize,
    pub vr: String,
    pub keyword: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRow {
    pub tag: String,
    pub tag_indent: String,
    pub depth: usize,
    pub keyword: String,
    /// One sorted row list per Sequence Item, in Item order.
    pub items: Vec<Vec<Row>>,
}

impl Row {
    pub fn tag(&self) -> &str {
        match self {
            Row::Leaf(row) => &row.tag,
            Row::Sequence(row) => &row.tag,
        }
    }

    pub fn tag_indent(&self) -> &str {
        match self {
            Row::Leaf(row) => &row.tag_indent,
            Row::Sequence(row) => &row.tag_indent,
        }
    }

    pub fn vr(&self) -> &str {
        match self {
            Row::Leaf(row) => &row.vr,
            Row::Sequence(_) => "SQ",
        }
    }

    pub fn keyword(&self) -> &str {
        match self {
            Row::Leaf(row) => &row.keyword,
            Row::Sequence(row) => &row.keyword,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRowKind {
    Element,
    Sequence,
    Item,
}

/// One printable line: tag with indent, VR, keyword, value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub tag: String,
    pub vr: String,
    pub keyword: String,
    pub value: String,
    pub kind: TableRowKind,
}

impl TableRow {
    pub fn columns(&self) -> [&str; 4] {
        [
            self.tag.as_str(),
            self.vr.as_str(),
            self.keyword.as_str(),
            self.value.as_str(),
        ]
    }
}

pub fn tag_indent(depth: usize) -> String {
    if depth == 0 {
        return String::new();
    }
    let mut indent = ">".repeat(depth);
    indent.push(' ');
    indent
}

/// Builds and sorts the top level; Sequence Items are sorted while built.
pub fn format_tags(metadata: &MetadataObject, dictionary: &dyn TagDictionary) -> Vec<Row> {
    let mut rows = build_rows(metadata, dictionary, 0);
    sort_rows(&mut rows);
    rows
}

/// Formats metadata straight to table lines.
pub fn format_table(metadata: &MetadataObject, dictionary: &dyn TagDictionary) -> Vec<TableRow> {
    flatten(&format_tags(metadata, dictionary))
}

pub fn build_rows(
    metadata: &MetadataObject,
    dictionary: &dyn TagDictionary,
    depth: usize,
) -> Vec<Row> {
    let indent = tag_indent(depth);
    let mut rows = Vec::with_capacity(metadata.len());

    for (keyword, value) in metadata.iter() {
        if keyword == VR_MAP_KEY {
            continue;
        }

        let tag_info = dictionary.lookup(keyword);
        let display_keyword = keyword.strip_prefix(RETIRED_PREFIX).unwrap_or(keyword);

        if let Some(info) = tag_info.as_ref().filter(|info| info.is_sequence()) {
            let items = sequence_items(keyword, value)
                .into_iter()
                .map(|item| {
                    let mut item_rows = build_rows(item, dictionary, depth + 1);
                    sort_rows(&mut item_rows);
                    item_rows
                })
                .collect();

            rows.push(Row::Sequence(SequenceRow {
                tag: info.tag.clone(),
                tag_indent: indent.clone(),
                depth,
                keyword: display_keyword.to_string(),
                items,
            }));
            continue;
        }

        let display = format_value(keyword, value);

        let row = match tag_info {
            Some(info) => ElementRow {
                tag: info.tag,
                tag_indent: indent.clone(),
                depth,
                vr: info.vr,
                keyword: display_keyword.to_string(),
                value: display,
            },
            None => ElementRow {
                tag: private_tag(display_keyword),
                tag_indent: indent.clone(),
                depth,
                vr: String::new(),
                keyword: PRIVATE_TAG_LABEL.to_string(),
                value: display,
            },
        };
        rows.push(Row::Leaf(row));
    }

    rows
}

/// Stable ascending sort on the tag string; equal tags keep input order.
pub fn sort_rows(rows: &mut [Row]) {
    rows.sort_by(|a, b| a.tag().cmp(b.tag()));
}

pub fn flatten(rows: &[Row]) -> Vec<TableRow> {
    let mut table = Vec::new();
    flatten_into(rows, &mut table);
    table
}

fn flatten_into(rows: &[Row], table: &mut Vec<TableRow>) {
    for row in rows {
        match row {
            Row::Leaf(element) => table.push(TableRow {
                tag: format!("{}{}", element.tag_indent, element.tag),
                vr: element.vr.clone(),
                keyword: element.keyword.clone(),
                value: element.value.clone(),
                kind: TableRowKind::Element,
            }),
            Row::Sequence(sequence) => {
                table.push(TableRow {
                    tag: format!("{}{}", sequence.tag_indent, sequence.tag),
                    vr: "SQ".to_string(),
                    keyword: sequence.keyword.clone(),
                    value: String::new(),
                    kind: TableRowKind::Sequence,
                });

                let item_indent = tag_indent(sequence.depth + 1);
                for (index, item) in sequence.items.iter().enumerate() {
                    table.push(TableRow {
                        tag: format!("{item_indent}{ITEM_TAG}"),
                        vr: String::new(),
                        keyword: format!("Item #{index}"),
                        value: String::new(),
                        kind: TableRowKind::Item,
                    });
                    flatten_into(item, table);
                }
            }
        }
    }
}

/// Synthetic tag for keywords the dictionary does not know: the first eight
/// characters read as group and element.
fn private_tag(keyword: &str) -> String {
    let group = keyword.chars().take(4).collect::<String>();
    let element = keyword.chars().skip(4).take(4).collect::<String>();
    format!("({group},{element})")
}

fn sequence_items<'a>(keyword: &str, value: &'a MetadataValue) -> Vec<&'a MetadataObject> {
    match value {
        MetadataValue::Null => Vec::new(),
        MetadataValue::Item(item) => vec![item],
        MetadataValue::Items(items) => items.iter().collect(),
        MetadataValue::Multi(values) if values.is_empty() => Vec::new(),
        other => {
            log::warn!("Unrecognised value for sequence {keyword}: {other:?}");
            Vec::new()
        }
    }
}

fn format_value(keyword: &str, value: &MetadataValue) -> String {
    match value {
        MetadataValue::Multi(values) => values
            .iter()
            .map(|value| format_multi_entry(keyword, value))
            .collect::<Vec<_>>()
            .join("\\"),
        other => format_scalar(keyword, other),
    }
}

fn format_multi_entry(keyword: &str, value: &MetadataValue) -> String {
    match value {
        MetadataValue::Null => String::new(),
        other => format_scalar(keyword, other),
    }
}

fn format_scalar(keyword: &str, value: &MetadataValue) -> String {
    match value {
        MetadataValue::Text(text) => text.clone(),
        MetadataValue::Number(number) => format_number(*number),
        MetadataValue::Null => PLACEHOLDER.to_string(),
        MetadataValue::InlineBinary(_) => "Inline Binary".to_string(),
        MetadataValue::BulkDataUri(_) => "Bulk Data URI".to_string(),
        MetadataValue::PersonName { alphabetic, .. } => alphabetic.clone(),
        MetadataValue::Multi(_) => format_value(keyword, value),
        MetadataValue::Item(_) | MetadataValue::Items(_) | MetadataValue::Unrecognized(_) => {
            log::warn!("Unrecognised value for element {keyword}: {value:?}");
            PLACEHOLDER.to_string()
        }
    }
}
