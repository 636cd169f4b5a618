use chrono::NaiveDate;

use crate::dictionary::TagDictionary;
use crate::metadata::MetadataObject;
use crate::tags::{flatten, format_tags, Row, TableRow};

/// Instances of one series, ordered by `InstanceNumber`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySet {
    pub display_set_instance_uid: String,
    pub series_date: Option<String>,
    pub series_time: Option<String>,
    pub series_number: Option<String>,
    pub series_description: Option<String>,
    pub modality: Option<String>,
    pub instances: Vec<MetadataObject>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption<V> {
    pub value: V,
    pub title: String,
    pub description: String,
}

impl DisplaySet {
    pub fn from_instances(
        display_set_instance_uid: String,
        mut instances: Vec<MetadataObject>,
    ) -> Self {
        instances.sort_by_key(|instance| instance.first_int("InstanceNumber").unwrap_or(i32::MAX));

        let first = instances.first();
        let read = |keyword: &str| first.and_then(|instance| instance.first_string(keyword));

        Self {
            display_set_instance_uid,
            series_date: read("SeriesDate"),
            series_time: read("SeriesTime"),
            series_number: read("SeriesNumber"),
            series_description: read("SeriesDescription"),
            modality: read("Modality"),
            instances,
        }
    }

    /// Image sets get an instance picker; other series show their first
    /// instance only.
    pub fn is_image_stack(&self) -> bool {
        self.instances
            .iter()
            .any(|instance| instance.get("Rows").is_some() || instance.get("PixelData").is_some())
    }

    pub fn option(&self) -> SelectOption<String> {
        SelectOption {
            value: self.display_set_instance_uid.clone(),
            title: format!(
                "{} ({}): {}",
                self.series_number.as_deref().unwrap_or_default(),
                self.modality.as_deref().unwrap_or_default(),
                self.series_description.as_deref().unwrap_or_default()
            ),
            description: display_date(self.series_date.as_deref()),
        }
    }

    pub fn instance_options(&self) -> Vec<SelectOption<usize>> {
        self.instances
            .iter()
            .enumerate()
            .map(|(index, instance)| SelectOption {
                value: index,
                title: format!(
                    "Instance Number: {}",
                    instance.first_string("InstanceNumber").unwrap_or_default()
                ),
                description: String::new(),
            })
            .collect()
    }
}

/// Groups instances by `SeriesInstanceUID` in order of first appearance.
/// Instances without one each form their own display set.
pub fn group_into_display_sets(instances: Vec<MetadataObject>) -> Vec<DisplaySet> {
    let mut groups: Vec<(String, Vec<MetadataObject>)> = Vec::new();

    for (index, instance) in instances.into_iter().enumerate() {
        let uid = instance
            .first_string("SeriesInstanceUID")
            .unwrap_or_else(|| format!("unassigned-{index}"));
        match groups.iter_mut().find(|(group_uid, _)| *group_uid == uid) {
            Some((_, members)) => members.push(instance),
            None => groups.push((uid, vec![instance])),
        }
    }

    groups
        .into_iter()
        .map(|(uid, members)| DisplaySet::from_instances(uid, members))
        .collect()
}

/// Date part of a series option, e.g. `Tue, Mar 5th 2019`.
pub fn display_date(series_date: Option<&str>) -> String {
    let Some(date) = series_date
        .map(str::trim)
        .and_then(|raw| raw.get(..8))
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y%m%d").ok())
    else {
        return "Invalid date".to_string();
    };

    let day = date.format("%d").to_string();
    let day = day.trim_start_matches('0');
    format!(
        "{}, {} {}{} {}",
        date.format("%a"),
        date.format("%b"),
        day,
        ordinal_suffix(day),
        date.format("%Y")
    )
}

fn ordinal_suffix(day: &str) -> &'static str {
    let Ok(day) = day.parse::<u32>() else {
        return "";
    };
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Active series and instance; rows are rebuilt on every request.
#[derive(Debug, Clone)]
pub struct TagBrowser {
    display_sets: Vec<DisplaySet>,
    active_display_set: usize,
    active_instance: usize,
}

impl TagBrowser {
    pub fn new(display_sets: Vec<DisplaySet>, initial_uid: Option<&str>) -> Option<Self> {
        if display_sets.is_empty() {
            return None;
        }
        let active_display_set = initial_uid
            .and_then(|uid| {
                display_sets
                    .iter()
                    .position(|set| set.display_set_instance_uid == uid)
            })
            .unwrap_or(0);

        Some(Self {
            display_sets,
            active_display_set,
            active_instance: 0,
        })
    }

    pub fn display_sets(&self) -> &[DisplaySet] {
        &self.display_sets
    }

    pub fn active_display_set(&self) -> &DisplaySet {
        &self.display_sets[self.active_display_set]
    }

    pub fn active_instance(&self) -> usize {
        self.active_instance
    }

    /// Switching series resets the instance to the first one.
    pub fn select_display_set(&mut self, uid: &str) -> bool {
        let Some(index) = self
            .display_sets
            .iter()
            .position(|set| set.display_set_instance_uid == uid)
        else {
            log::warn!("No display set with UID {uid}");
            return false;
        };
        self.active_display_set = index;
        self.active_instance = 0;
        true
    }

    pub fn select_instance(&mut self, index: usize) -> bool {
        let display_set = self.active_display_set();
        if !display_set.is_image_stack() || index >= display_set.instances.len() {
            log::warn!(
                "Instance {index} is not selectable in display set {}",
                display_set.display_set_instance_uid
            );
            return false;
        }
        self.active_instance = index;
        true
    }

    pub fn display_set_options(&self) -> Vec<SelectOption<String>> {
        self.display_sets.iter().map(DisplaySet::option).collect()
    }

    pub fn selected_display_set_option(&self) -> SelectOption<String> {
        self.active_display_set().option()
    }

    /// `None` when the active display set is not an image stack.
    pub fn instance_options(&self) -> Option<Vec<SelectOption<usize>>> {
        let display_set = self.active_display_set();
        display_set
            .is_image_stack()
            .then(|| display_set.instance_options())
    }

    pub fn active_metadata(&self) -> Option<&MetadataObject> {
        let display_set = self.active_display_set();
        let index = if display_set.is_image_stack() {
            self.active_instance
        } else {
            0
        };
        display_set.instances.get(index)
    }

    pub fn rows(&self, dictionary: &dyn TagDictionary) -> Vec<Row> {
        self.active_metadata()
            .map(|metadata| format_tags(metadata, dictionary))
            .unwrap_or_default()
    }

    pub fn table_rows(&self, dictionary: &dyn TagDictionary) -> Vec<TableRow> {
        flatten(&self.rows(dictionary))
    }
}
