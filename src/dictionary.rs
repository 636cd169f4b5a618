use std::collections::HashMap;

use dicom_core::dictionary::{DataDictionary, TagRange};
use dicom_core::Tag;
use dicom_object::StandardDataDictionary;

pub const RETIRED_PREFIX: &str = "RETIRED_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    /// `(GGGG,EEEE)` with uppercase hex digits.
    pub tag: String,
    pub vr: String,
}

impl TagInfo {
    pub fn new(group: u16, element: u16, vr: &str) -> Self {
        Self {
            tag: format_tag(group, element),
            vr: vr.to_string(),
        }
    }

    pub fn is_sequence(&self) -> bool {
        self.vr == "SQ"
    }
}

/// Keyword lookup used by the formatter and the ingestion layers.
pub trait TagDictionary {
    fn lookup(&self, keyword: &str) -> Option<TagInfo>;

    fn keyword_for_tag(&self, group: u16, element: u16) -> Option<String>;
}

pub fn format_tag(group: u16, element: u16) -> String {
    format!("({group:04X},{element:04X})")
}

/// In-memory dictionary, mostly for fixtures and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MapDictionary {
    by_keyword: HashMap<String, (u16, u16, String)>,
    by_tag: HashMap<(u16, u16), String>,
}

impl MapDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keyword: &str, group: u16, element: u16, vr: &str) {
        self.by_keyword
            .insert(keyword.to_string(), (group, element, vr.to_string()));
        self.by_tag.insert((group, element), keyword.to_string());
    }

    pub fn with(mut self, keyword: &str, group: u16, element: u16, vr: &str) -> Self {
        self.insert(keyword, group, element, vr);
        self
    }
}

impl FromIterator<(&'static str, u16, u16, &'static str)> for MapDictionary {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (&'static str, u16, u16, &'static str)>,
    {
        let mut dictionary = MapDictionary::new();
        for (keyword, group, element, vr) in iter {
            dictionary.insert(keyword, group, element, vr);
        }
        dictionary
    }
}

impl TagDictionary for MapDictionary {
    fn lookup(&self, keyword: &str) -> Option<TagInfo> {
        self.by_keyword
            .get(keyword)
            .map(|(group, element, vr)| TagInfo::new(*group, *element, vr))
    }

    fn keyword_for_tag(&self, group: u16, element: u16) -> Option<String> {
        self.by_tag.get(&(group, element)).cloned()
    }
}

/// The DICOM standard data dictionary shipped with `dicom-object`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTagDictionary;

impl TagDictionary for StandardTagDictionary {
    fn lookup(&self, keyword: &str) -> Option<TagInfo> {
        let entry = StandardDataDictionary
            .by_name(keyword)
            .or_else(|| {
                keyword
                    .strip_prefix(RETIRED_PREFIX)
                    .and_then(|name| StandardDataDictionary.by_name(name))
            })?;
        let tag = entry.tag.inner();
        let vr = entry.vr.relaxed();
        Some(TagInfo::new(tag.group(), tag.element(), &vr.to_string()))
    }

    /// Only exact entries name a tag. Range entries (private creators,
    /// group lengths, repeating groups) leave the tag unnamed.
    fn keyword_for_tag(&self, group: u16, element: u16) -> Option<String> {
        let tag = Tag(group, element);
        StandardDataDictionary
            .by_tag(tag)
            .filter(|entry| matches!(entry.tag, TagRange::Single(single) if single == tag))
            .map(|entry| entry.alias.to_string())
    }
}
