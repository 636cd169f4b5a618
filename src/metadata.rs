/// Keyword-keyed DICOM metadata for one instance, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataObject {
    entries: Vec<(String, MetadataValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Null,
    Text(String),
    Number(f64),
    Multi(Vec<MetadataValue>),
    Items(Vec<MetadataObject>),
    Item(MetadataObject),
    InlineBinary(String),
    BulkDataUri(String),
    PersonName {
        alphabetic: String,
        ideographic: Option<String>,
        phonetic: Option<String>,
    },
    /// Any other shape; carries a rendering for diagnostics.
    Unrecognized(String),
}

impl MetadataObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value in place if the keyword is already present.
    pub fn insert(&mut self, keyword: impl Into<String>, value: MetadataValue) {
        let keyword = keyword.into();
        match self.entries.iter_mut().find(|(key, _)| *key == keyword) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((keyword, value)),
        }
    }

    pub fn with(mut self, keyword: impl Into<String>, value: MetadataValue) -> Self {
        self.insert(keyword, value);
        self
    }

    pub fn get(&self, keyword: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == keyword)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value of a keyword as display text, trimmed, `None` when blank.
    pub fn first_string(&self, keyword: &str) -> Option<String> {
        let text = match self.get(keyword)? {
            MetadataValue::Text(text) => text.clone(),
            MetadataValue::Number(number) => format_number(*number),
            MetadataValue::PersonName { alphabetic, .. } => alphabetic.clone(),
            MetadataValue::Multi(values) => match values.first()? {
                MetadataValue::Text(text) => text.clone(),
                MetadataValue::Number(number) => format_number(*number),
                _ => return None,
            },
            _ => return None,
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn first_int(&self, keyword: &str) -> Option<i32> {
        self.first_string(keyword)?
            .split('\\')
            .next()
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && value.fract() == 0.0)
            .map(|value| value as i32)
    }
}

impl FromIterator<(String, MetadataValue)> for MetadataObject {
    fn from_iter<T: IntoIterator<Item = (String, MetadataValue)>>(iter: T) -> Self {
        let mut object = MetadataObject::new();
        for (keyword, value) in iter {
            object.insert(keyword, value);
        }
        object
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Number(value as f64)
    }
}

/// Plain decimal form, never exponent notation. Integral values print
/// without a fraction and negative zero prints as `0`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}
