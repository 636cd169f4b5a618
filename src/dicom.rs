use std::path::Path;
use std::{fs, io::Cursor};

use anyhow::{Context, Result};
use dicom_core::dictionary::DataDictionary;
use dicom_core::value::{PrimitiveValue, Value as DicomValue};
use dicom_core::VR;
use dicom_object::{from_reader, open_file, DefaultDicomObject, InMemDicomObject, ReadError};

use crate::dictionary::TagDictionary;
use crate::metadata::{MetadataObject, MetadataValue};

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";
const META_GROUP: u16 = 0x0002;

pub fn load_instance(path: &Path, dictionary: &dyn TagDictionary) -> Result<MetadataObject> {
    let obj = open_dicom_object(path)?;
    let metadata = metadata_from_object(&obj, dictionary);
    log::debug!("Read {} elements from {}", metadata.len(), path.display());
    Ok(metadata)
}

pub fn open_dicom_object(path: &Path) -> Result<DefaultDicomObject> {
    let err = match open_file(path) {
        Ok(obj) => return Ok(obj),
        Err(err) => err,
    };

    if lacks_meta_group_length(&err) {
        let bytes = fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
        if let Some(repaired) = insert_meta_group_length(&bytes) {
            log::info!(
                "Inserted missing (0002,0000) group length while opening {}",
                path.display()
            );
            return from_reader(Cursor::new(repaired)).with_context(|| {
                format!(
                    "Could not open {} after inserting File Meta Information Group Length",
                    path.display()
                )
            });
        }
    }

    Err(err).with_context(|| format!("Could not open {}", path.display()))
}

fn lacks_meta_group_length(error: &ReadError) -> bool {
    matches!(
        error,
        ReadError::ParseMetaDataSet {
            source: dicom_object::meta::Error::UnexpectedTag { tag, .. }
        } if tag.group() == META_GROUP && tag.element() != 0x0000
    )
}

/// Returns the file with a `(0002,0000) UL` element placed in front of the
/// meta group, or `None` when the file already starts with one or the meta
/// group cannot be measured.
fn insert_meta_group_length(bytes: &[u8]) -> Option<Vec<u8>> {
    let start = meta_group_start(bytes)?;
    let first = bytes.get(start..start + 4)?;
    let group = u16::from_le_bytes([first[0], first[1]]);
    let element = u16::from_le_bytes([first[2], first[3]]);
    if group != META_GROUP || element == 0x0000 {
        return None;
    }

    let group_len = u32::try_from(measure_meta_group(bytes, start)?).ok()?;

    let mut header = Vec::with_capacity(12);
    header.extend_from_slice(&META_GROUP.to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes());
    header.extend_from_slice(b"UL");
    header.extend_from_slice(&4u16.to_le_bytes());
    header.extend_from_slice(&group_len.to_le_bytes());

    Some([&bytes[..start], &header[..], &bytes[start..]].concat())
}

fn meta_group_start(bytes: &[u8]) -> Option<usize> {
    if bytes.get(PREAMBLE_LEN..PREAMBLE_LEN + 4) == Some(&MAGIC[..]) {
        Some(PREAMBLE_LEN + 4)
    } else if bytes.starts_with(MAGIC) {
        Some(MAGIC.len())
    } else {
        None
    }
}

/// Byte length of the explicit VR little endian meta elements from `start`.
fn measure_meta_group(bytes: &[u8], start: usize) -> Option<usize> {
    let mut position = start;
    while let Some(header) = bytes.get(position..position + 8) {
        if u16::from_le_bytes([header[0], header[1]]) != META_GROUP {
            break;
        }

        let (header_len, value_len) = if has_long_length(&header[4..6]) {
            let raw = bytes.get(position + 8..position + 12)?;
            let value_len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            if value_len == u32::MAX {
                return None;
            }
            (12, value_len as usize)
        } else {
            (8, u16::from_le_bytes([header[6], header[7]]) as usize)
        };

        let next = position.checked_add(header_len)?.checked_add(value_len)?;
        if next > bytes.len() {
            return None;
        }
        position = next;
    }

    (position > start).then_some(position - start)
}

fn has_long_length(vr: &[u8]) -> bool {
    matches!(
        vr,
        b"OB" | b"OD" | b"OF" | b"OL" | b"OV" | b"OW" | b"SQ" | b"SV" | b"UC" | b"UR" | b"UT"
            | b"UN" | b"UV"
    )
}

/// File meta information followed by the data set, keyed by keyword.
/// Tags the dictionary does not know are keyed `GGGGEEEE`.
pub fn metadata_from_object(
    obj: &DefaultDicomObject,
    dictionary: &dyn TagDictionary,
) -> MetadataObject {
    let meta = obj.meta();
    let mut metadata = MetadataObject::new();

    let meta_fields = [
        ("MediaStorageSOPClassUID", meta.media_storage_sop_class_uid()),
        ("MediaStorageSOPInstanceUID", meta.media_storage_sop_instance_uid()),
        ("TransferSyntaxUID", meta.transfer_syntax()),
        (
            "ImplementationClassUID",
            meta.implementation_class_uid.as_str(),
        ),
    ];
    for (keyword, value) in meta_fields {
        let value = trim_padding(value);
        if !value.is_empty() {
            metadata.insert(keyword, MetadataValue::Text(value.to_string()));
        }
    }

    append_data_set(&mut metadata, &**obj, dictionary);
    metadata
}

fn data_set_to_metadata<D>(
    data_set: &InMemDicomObject<D>,
    dictionary: &dyn TagDictionary,
) -> MetadataObject
where
    D: DataDictionary + Clone,
{
    let mut metadata = MetadataObject::new();
    append_data_set(&mut metadata, data_set, dictionary);
    metadata
}

fn append_data_set<D>(
    metadata: &mut MetadataObject,
    data_set: &InMemDicomObject<D>,
    dictionary: &dyn TagDictionary,
) where
    D: DataDictionary + Clone,
{
    for element in data_set.iter() {
        let header = element.header();
        let (group, element_number) = (header.tag.group(), header.tag.element());
        let keyword = dictionary
            .keyword_for_tag(group, element_number)
            .unwrap_or_else(|| format!("{group:04X}{element_number:04X}"));

        let value = match element.value() {
            DicomValue::Primitive(primitive) => primitive_to_value(header.vr, primitive),
            DicomValue::Sequence(sequence) => MetadataValue::Items(
                sequence
                    .items()
                    .iter()
                    .map(|item| data_set_to_metadata(item, dictionary))
                    .collect(),
            ),
            DicomValue::PixelSequence(_) => MetadataValue::InlineBinary(String::new()),
        };
        metadata.insert(keyword, value);
    }
}

fn primitive_to_value(vr: VR, primitive: &PrimitiveValue) -> MetadataValue {
    if matches!(primitive, PrimitiveValue::Empty) {
        return MetadataValue::Null;
    }

    match vr {
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN => {
            return MetadataValue::InlineBinary(String::new());
        }
        VR::PN => {
            let mut names = primitive
                .to_multi_str()
                .iter()
                .map(|raw| person_name(raw))
                .collect::<Vec<_>>();
            return match names.len() {
                0 => MetadataValue::Null,
                1 => names.remove(0),
                _ => MetadataValue::Multi(names),
            };
        }
        _ => {}
    }

    let numeric = matches!(
        vr,
        VR::US | VR::SS | VR::UL | VR::SL | VR::UV | VR::SV | VR::FL | VR::FD | VR::IS | VR::DS
    );
    let mut values = primitive
        .to_multi_str()
        .iter()
        .map(|text| {
            let text = text.trim_matches(['\0', ' ']);
            match text.parse::<f64>() {
                Ok(number) if numeric => MetadataValue::Number(number),
                _ => MetadataValue::Text(text.to_string()),
            }
        })
        .collect::<Vec<_>>();

    match values.len() {
        0 => MetadataValue::Null,
        1 => values.remove(0),
        _ => MetadataValue::Multi(values),
    }
}

/// Splits `alphabetic=ideographic=phonetic` component groups.
fn person_name(raw: &str) -> MetadataValue {
    let mut groups = trim_padding(raw).splitn(3, '=');
    let alphabetic = groups.next().unwrap_or_default().to_string();
    let ideographic = groups.next().filter(|g| !g.is_empty()).map(str::to_string);
    let phonetic = groups.next().filter(|g| !g.is_empty()).map(str::to_string);
    MetadataValue::PersonName {
        alphabetic,
        ideographic,
        phonetic,
    }
}

fn trim_padding(value: &str) -> &str {
    value.trim_end_matches(['\0', ' '])
}

#[cfg(test)]
mod tests {
    use dicom_core::{DataElement, Tag};

    use super::*;
    use crate::dictionary::StandardTagDictionary;

    fn meta_bytes(with_group_length: bool) -> Vec<u8> {
        let mut bytes = vec![0u8; PREAMBLE_LEN];
        bytes.extend_from_slice(MAGIC);
        if with_group_length {
            bytes.extend_from_slice(&[
                0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00, 0x1c, 0x00, 0x00, 0x00,
            ]);
        }
        // (0002,0001) OB, long length 2
        bytes.extend_from_slice(&[
            0x02, 0x00, 0x01, 0x00, b'O', b'B', 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
        ]);
        // (0002,0010) UI, length 6
        bytes.extend_from_slice(&[
            0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x06, 0x00, b'1', b'.', b'2', b'.', b'3', 0x00,
        ]);
        // (0008,0060) CS "MG"
        bytes.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'M', b'G']);
        bytes
    }

    #[test]
    fn group_length_is_inserted_after_magic() {
        let bytes = meta_bytes(false);

        let repaired = insert_meta_group_length(&bytes).expect("group length should be added");

        let at = PREAMBLE_LEN + 4;
        assert_eq!(&repaired[at..at + 4], &[0x02, 0x00, 0x00, 0x00]);
        assert_eq!(&repaired[at + 4..at + 6], b"UL");
        assert_eq!(&repaired[at + 8..at + 12], &28u32.to_le_bytes());
        assert_eq!(&repaired[at + 12..], &bytes[at..]);
    }

    #[test]
    fn existing_group_length_is_left_alone() {
        assert!(insert_meta_group_length(&meta_bytes(true)).is_none());
    }

    #[test]
    fn truncated_meta_group_is_not_repaired() {
        let mut bytes = meta_bytes(false);
        bytes.truncate(PREAMBLE_LEN + 4 + 10);
        assert!(insert_meta_group_length(&bytes).is_none());
    }

    #[test]
    fn files_without_magic_are_not_repaired() {
        assert!(insert_meta_group_length(&[0u8; 64]).is_none());
    }

    #[test]
    fn primitive_values_map_to_metadata_shapes() {
        assert_eq!(
            primitive_to_value(VR::US, &PrimitiveValue::from(512u16)),
            MetadataValue::Number(512.0)
        );
        assert_eq!(
            primitive_to_value(
                VR::CS,
                &PrimitiveValue::Strs(["ORIGINAL".to_string(), "PRIMARY ".to_string()].into())
            ),
            MetadataValue::Multi(vec!["ORIGINAL".into(), "PRIMARY".into()])
        );
        assert_eq!(
            primitive_to_value(VR::LO, &PrimitiveValue::from("12345 ")),
            MetadataValue::Text("12345".into())
        );
        assert_eq!(
            primitive_to_value(VR::OB, &PrimitiveValue::from(vec![1u8, 2, 3])),
            MetadataValue::InlineBinary(String::new())
        );
        assert_eq!(primitive_to_value(VR::DA, &PrimitiveValue::Empty), MetadataValue::Null);
    }

    #[test]
    fn person_name_keeps_component_groups() {
        assert_eq!(
            person_name("Yamada^Tarou=山田^太郎=やまだ^たろう"),
            MetadataValue::PersonName {
                alphabetic: "Yamada^Tarou".into(),
                ideographic: Some("山田^太郎".into()),
                phonetic: Some("やまだ^たろう".into()),
            }
        );
        assert_eq!(
            person_name("Doe^John "),
            MetadataValue::PersonName {
                alphabetic: "Doe^John".into(),
                ideographic: None,
                phonetic: None,
            }
        );
    }

    #[test]
    fn multi_valued_person_names_stay_separate() {
        let value = primitive_to_value(
            VR::PN,
            &PrimitiveValue::Strs(
                [
                    "Yamada^Tarou=山田^太郎".to_string(),
                    "Doe^John=ド^ジョン".to_string(),
                ]
                .into(),
            ),
        );

        assert_eq!(
            value,
            MetadataValue::Multi(vec![
                MetadataValue::PersonName {
                    alphabetic: "Yamada^Tarou".into(),
                    ideographic: Some("山田^太郎".into()),
                    phonetic: None,
                },
                MetadataValue::PersonName {
                    alphabetic: "Doe^John".into(),
                    ideographic: Some("ド^ジョン".into()),
                    phonetic: None,
                },
            ])
        );

        let metadata = MetadataObject::new().with("PatientName", value);
        let rows = crate::tags::format_table(&metadata, &StandardTagDictionary);
        assert_eq!(rows[0].value, "Yamada^Tarou\\Doe^John");
    }

    #[test]
    fn private_and_range_tags_keep_hex_keys() {
        let data_set = InMemDicomObject::from_element_iter([
            DataElement::new(Tag(0x0008, 0x0000), VR::UL, PrimitiveValue::from(42u32)),
            DataElement::new(Tag(0x0008, 0x0060), VR::CS, PrimitiveValue::from("MR")),
            DataElement::new(Tag(0x0009, 0x0010), VR::LO, PrimitiveValue::from("GEMS_IDEN_01")),
            DataElement::new(Tag(0x0009, 0x1001), VR::LO, PrimitiveValue::from("private")),
            DataElement::new(Tag(0x0011, 0x0010), VR::LO, PrimitiveValue::from("SIEMENS CSA")),
            DataElement::new(Tag(0x6002, 0x0010), VR::US, PrimitiveValue::from(512u16)),
        ]);

        let metadata = data_set_to_metadata(&data_set, &StandardTagDictionary);

        let keys = metadata.iter().map(|(key, _)| key).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec!["00080000", "Modality", "00090010", "00091001", "00110010", "60020010"]
        );
        assert_eq!(
            metadata.get("00090010"),
            Some(&MetadataValue::Text("GEMS_IDEN_01".into()))
        );
        assert_eq!(
            metadata.get("00110010"),
            Some(&MetadataValue::Text("SIEMENS CSA".into()))
        );

        let tags = crate::tags::format_table(&metadata, &StandardTagDictionary)
            .into_iter()
            .map(|row| row.tag)
            .collect::<Vec<_>>();
        assert_eq!(
            tags,
            vec![
                "(0008,0000)",
                "(0008,0060)",
                "(0009,0010)",
                "(0009,1001)",
                "(0011,0010)",
                "(6002,0010)",
            ]
        );
    }

    #[test]
    fn sample_file_loads_when_available() {
        let path = Path::new("samples/sample0/1.dcm");
        if !path.exists() {
            return;
        }

        let metadata = load_instance(path, &StandardTagDictionary)
            .expect("sample0/1.dcm should load");
        assert!(metadata.get("TransferSyntaxUID").is_some());
        assert!(metadata.get("SOPInstanceUID").is_some());
    }
}
