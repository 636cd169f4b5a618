use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::dictionary::TagDictionary;
use crate::metadata::{MetadataObject, MetadataValue};

const INLINE_BINARY: &str = "InlineBinary";
const BULK_DATA_URI: &str = "BulkDataURI";
const ALPHABETIC: &str = "Alphabetic";
const IDEOGRAPHIC: &str = "Ideographic";
const PHONETIC: &str = "Phonetic";

/// Parses a JSON document holding one instance or an array of instances.
/// Both keyword-keyed (naturalized) and tag-keyed (DICOM JSON model)
/// objects are accepted.
pub fn load_json_instances(
    text: &str,
    dictionary: &dyn TagDictionary,
) -> Result<Vec<MetadataObject>> {
    let document: Value = serde_json::from_str(text).context("Metadata is not valid JSON")?;

    let objects = match document {
        Value::Object(object) => vec![object],
        Value::Array(values) => values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Object(object) => Ok(object),
                other => bail!(
                    "Instance {} is a JSON {}, expected an object",
                    index,
                    json_kind(&other)
                ),
            })
            .collect::<Result<Vec<_>>>()?,
        other => bail!(
            "Metadata document is a JSON {}, expected an object or array",
            json_kind(&other)
        ),
    };

    objects
        .into_iter()
        .enumerate()
        .map(|(index, object)| {
            if is_dicom_json_model(&object) {
                naturalize_dicom_json(&object, dictionary)
                    .with_context(|| format!("Could not read DICOM JSON instance {index}"))
            } else {
                Ok(object_from_naturalized(&object))
            }
        })
        .collect()
}

pub fn metadata_from_naturalized(value: &Value) -> Option<MetadataObject> {
    value.as_object().map(object_from_naturalized)
}

fn object_from_naturalized(object: &Map<String, Value>) -> MetadataObject {
    object
        .iter()
        .map(|(keyword, value)| (keyword.clone(), value_from_naturalized(value)))
        .collect()
}

fn value_from_naturalized(value: &Value) -> MetadataValue {
    match value {
        Value::Null => MetadataValue::Null,
        Value::String(text) => MetadataValue::Text(text.clone()),
        Value::Number(number) => number
            .as_f64()
            .map(MetadataValue::Number)
            .unwrap_or_else(|| MetadataValue::Text(number.to_string())),
        Value::Bool(flag) => MetadataValue::Unrecognized(flag.to_string()),
        Value::Array(values) => {
            let is_item_list = !values.is_empty()
                && values.iter().all(|value| {
                    value
                        .as_object()
                        .is_some_and(|object| marker_value(object).is_none())
                });
            if is_item_list {
                MetadataValue::Items(
                    values
                        .iter()
                        .filter_map(Value::as_object)
                        .map(object_from_naturalized)
                        .collect(),
                )
            } else {
                MetadataValue::Multi(values.iter().map(value_from_naturalized).collect())
            }
        }
        Value::Object(object) => marker_value(object)
            .unwrap_or_else(|| MetadataValue::Item(object_from_naturalized(object))),
    }
}

/// `InlineBinary`, `BulkDataURI` and person name objects.
fn marker_value(object: &Map<String, Value>) -> Option<MetadataValue> {
    if let Some(data) = object.get(INLINE_BINARY) {
        return Some(MetadataValue::InlineBinary(json_text(data)));
    }
    if let Some(uri) = object.get(BULK_DATA_URI) {
        return Some(MetadataValue::BulkDataUri(json_text(uri)));
    }
    person_name(object)
}

fn person_name(object: &Map<String, Value>) -> Option<MetadataValue> {
    let alphabetic = object.get(ALPHABETIC)?.as_str()?;
    Some(MetadataValue::PersonName {
        alphabetic: alphabetic.to_string(),
        ideographic: object.get(IDEOGRAPHIC).and_then(Value::as_str).map(str::to_string),
        phonetic: object.get(PHONETIC).and_then(Value::as_str).map(str::to_string),
    })
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Every key is an 8-digit hex tag whose member carries a `vr`.
pub fn is_dicom_json_model(object: &Map<String, Value>) -> bool {
    !object.is_empty()
        && object.iter().all(|(key, value)| {
            parse_tag_key(key).is_some() && value.get("vr").is_some_and(Value::is_string)
        })
}

fn parse_tag_key(key: &str) -> Option<(u16, u16)> {
    if key.len() != 8 || !key.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let group = u16::from_str_radix(&key[..4], 16).ok()?;
    let element = u16::from_str_radix(&key[4..], 16).ok()?;
    Some((group, element))
}

/// Converts a tag-keyed DICOM JSON model object to keyword keys. Unknown
/// tags keep their `GGGGEEEE` key.
pub fn naturalize_dicom_json(
    object: &Map<String, Value>,
    dictionary: &dyn TagDictionary,
) -> Result<MetadataObject> {
    let mut metadata = MetadataObject::new();

    for (key, element) in object {
        let Some((group, element_number)) = parse_tag_key(key) else {
            bail!("Invalid DICOM JSON tag key {key:?}");
        };
        let Some(member) = element.as_object() else {
            bail!("DICOM JSON element {key} is not an object");
        };
        let vr = member.get("vr").and_then(Value::as_str).unwrap_or_default();

        let keyword = dictionary
            .keyword_for_tag(group, element_number)
            .unwrap_or_else(|| key.to_ascii_uppercase());

        let value = dicom_json_value(key, vr, member, dictionary)?;
        metadata.insert(keyword, value);
    }

    Ok(metadata)
}

fn dicom_json_value(
    key: &str,
    vr: &str,
    member: &Map<String, Value>,
    dictionary: &dyn TagDictionary,
) -> Result<MetadataValue> {
    if let Some(data) = member.get(INLINE_BINARY) {
        return Ok(MetadataValue::InlineBinary(json_text(data)));
    }
    if let Some(uri) = member.get(BULK_DATA_URI) {
        return Ok(MetadataValue::BulkDataUri(json_text(uri)));
    }

    let values = match member.get("Value") {
        None | Some(Value::Null) => return Ok(MetadataValue::Null),
        Some(Value::Array(values)) => values,
        Some(other) => bail!(
            "DICOM JSON element {key} has a {} Value, expected an array",
            json_kind(other)
        ),
    };

    if vr == "SQ" {
        let items = values
            .iter()
            .enumerate()
            .map(|(index, item)| match item.as_object() {
                Some(item) => naturalize_dicom_json(item, dictionary)
                    .with_context(|| format!("In item {index} of sequence {key}")),
                None => bail!("Item {index} of sequence {key} is not an object"),
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(MetadataValue::Items(items));
    }

    let mut converted = values
        .iter()
        .map(|value| match value {
            Value::Object(object) if vr == "PN" => {
                person_name(object).unwrap_or(MetadataValue::Text(String::new()))
            }
            other => value_from_naturalized(other),
        })
        .collect::<Vec<_>>();

    if converted.len() == 1 {
        Ok(converted.remove(0))
    } else {
        Ok(MetadataValue::Multi(converted))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::dictionary::{MapDictionary, StandardTagDictionary};
    use crate::tags::format_table;

    fn dictionary() -> MapDictionary {
        [
            ("PatientName", 0x0010, 0x0010, "PN"),
            ("ImageType", 0x0008, 0x0008, "CS"),
            ("Rows", 0x0028, 0x0010, "US"),
            ("ReferencedImageSequence", 0x0008, 0x1140, "SQ"),
            ("ReferencedSOPInstanceUID", 0x0008, 0x1155, "UI"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn naturalized_object_keeps_key_order_and_shapes() {
        let text = r#"{
            "Rows": 512,
            "PatientName": {"Alphabetic": "Doe^John"},
            "ImageType": ["ORIGINAL", "PRIMARY"],
            "PixelData": {"BulkDataURI": "http://x"},
            "ReferencedImageSequence": [{"ReferencedSOPInstanceUID": "1.2.3"}],
            "PatientAge": null,
            "Flag": true
        }"#;

        let instances = load_json_instances(text, &dictionary()).expect("JSON should load");
        assert_eq!(instances.len(), 1);
        let metadata = &instances[0];

        let keys = metadata.iter().map(|(key, _)| key).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                "Rows",
                "PatientName",
                "ImageType",
                "PixelData",
                "ReferencedImageSequence",
                "PatientAge",
                "Flag"
            ]
        );
        assert_eq!(metadata.get("Rows"), Some(&MetadataValue::Number(512.0)));
        assert_eq!(
            metadata.get("ImageType"),
            Some(&MetadataValue::Multi(vec!["ORIGINAL".into(), "PRIMARY".into()]))
        );
        assert_eq!(
            metadata.get("PixelData"),
            Some(&MetadataValue::BulkDataUri("http://x".into()))
        );
        assert!(matches!(
            metadata.get("ReferencedImageSequence"),
            Some(MetadataValue::Items(items)) if items.len() == 1
        ));
        assert_eq!(metadata.get("PatientAge"), Some(&MetadataValue::Null));
        assert_eq!(
            metadata.get("Flag"),
            Some(&MetadataValue::Unrecognized("true".into()))
        );
    }

    #[test]
    fn dicom_json_model_is_naturalized() {
        let text = r#"[{
            "00100010": {"vr": "PN", "Value": [{"Alphabetic": "Doe^Jane"}]},
            "00080008": {"vr": "CS", "Value": ["DERIVED", "SECONDARY"]},
            "00280010": {"vr": "US", "Value": [256]},
            "00091001": {"vr": "LO", "Value": ["vendor"]},
            "7FE00010": {"vr": "OW", "BulkDataURI": "http://server/frames/1"},
            "00081140": {"vr": "SQ", "Value": [
                {"00081155": {"vr": "UI", "Value": ["1.2.3.4"]}}
            ]},
            "00100030": {"vr": "DA"}
        }]"#;

        let instances = load_json_instances(text, &dictionary()).expect("JSON should load");
        let metadata = &instances[0];

        assert_eq!(
            metadata.get("PatientName"),
            Some(&MetadataValue::PersonName {
                alphabetic: "Doe^Jane".into(),
                ideographic: None,
                phonetic: None,
            })
        );
        assert_eq!(
            metadata.get("ImageType"),
            Some(&MetadataValue::Multi(vec!["DERIVED".into(), "SECONDARY".into()]))
        );
        assert_eq!(metadata.get("Rows"), Some(&MetadataValue::Number(256.0)));
        assert_eq!(metadata.get("00091001"), Some(&MetadataValue::from("vendor")));
        assert_eq!(
            metadata.get("7FE00010"),
            Some(&MetadataValue::BulkDataUri("http://server/frames/1".into()))
        );
        assert_eq!(metadata.get("00100030"), Some(&MetadataValue::Null));

        let Some(MetadataValue::Items(items)) = metadata.get("ReferencedImageSequence") else {
            panic!("sequence should naturalize to items");
        };
        assert_eq!(
            items[0].get("ReferencedSOPInstanceUID"),
            Some(&MetadataValue::from("1.2.3.4"))
        );
    }

    #[test]
    fn private_and_range_tags_keep_hex_keys_with_standard_dictionary() {
        let text = r#"{
            "00090010": {"vr": "LO", "Value": ["GEMS_IDEN_01"]},
            "00110010": {"vr": "LO", "Value": ["SIEMENS CSA"]},
            "00091001": {"vr": "LO", "Value": ["vendor"]},
            "00080000": {"vr": "UL", "Value": [42]},
            "60020010": {"vr": "US", "Value": [512]},
            "00100010": {"vr": "PN", "Value": [{"Alphabetic": "Doe^Jane"}]}
        }"#;

        let instances =
            load_json_instances(text, &StandardTagDictionary).expect("JSON should load");
        let metadata = &instances[0];

        let keys = metadata.iter().map(|(key, _)| key).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec!["00090010", "00110010", "00091001", "00080000", "60020010", "PatientName"]
        );
        assert_eq!(metadata.get("00090010"), Some(&MetadataValue::from("GEMS_IDEN_01")));
        assert_eq!(metadata.get("00110010"), Some(&MetadataValue::from("SIEMENS CSA")));

        let table = format_table(metadata, &StandardTagDictionary);
        let columns = table
            .iter()
            .map(|row| (row.tag.as_str(), row.keyword.as_str(), row.value.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            columns,
            vec![
                ("(0008,0000)", "Private Tag", "42"),
                ("(0009,0010)", "Private Tag", "GEMS_IDEN_01"),
                ("(0009,1001)", "Private Tag", "vendor"),
                ("(0010,0010)", "PatientName", "Doe^Jane"),
                ("(0011,0010)", "Private Tag", "SIEMENS CSA"),
                ("(6002,0010)", "Private Tag", "512"),
            ]
        );
    }

    #[test]
    fn detects_dicom_json_model_only_for_tag_keys() {
        let model: Value = serde_json::json!({"00100010": {"vr": "PN"}});
        let natural: Value = serde_json::json!({"PatientName": "Doe"});
        let hex_like_keyword: Value = serde_json::json!({"00100010": "Doe"});

        assert!(is_dicom_json_model(model.as_object().expect("object")));
        assert!(!is_dicom_json_model(natural.as_object().expect("object")));
        assert!(!is_dicom_json_model(hex_like_keyword.as_object().expect("object")));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(load_json_instances("42", &dictionary()).is_err());
        assert!(load_json_instances("[1, 2]", &dictionary()).is_err());
        assert!(load_json_instances("{", &dictionary()).is_err());
    }

    #[test]
    fn empty_array_stays_multi() {
        let value = serde_json::json!({"ReferencedImageSequence": []});
        let metadata = metadata_from_naturalized(&value).expect("object");
        assert_eq!(
            metadata.get("ReferencedImageSequence"),
            Some(&MetadataValue::Multi(Vec::new()))
        );
    }
}
