//! DICOM tag browsing: formats keyword-keyed DICOM metadata into an ordered
//! tag table with nested sequence items, plus the loaders and selection model
//! around it.

pub mod browser;
pub mod dicom;
pub mod dictionary;
pub mod json;
pub mod launch;
pub mod metadata;
pub mod render;
pub mod settings;
pub mod tags;

pub use browser::{group_into_display_sets, DisplaySet, SelectOption, TagBrowser};
pub use dictionary::{MapDictionary, StandardTagDictionary, TagDictionary, TagInfo};
pub use metadata::{MetadataObject, MetadataValue};
pub use tags::{
    build_rows, flatten, format_table, format_tags, sort_rows, ElementRow, Row, SequenceRow,
    TableRow, TableRowKind,
};
