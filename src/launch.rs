use std::path::PathBuf;

use crate::settings::{Settings, TableFormat};

pub const USAGE: &str = "Usage: dicom-tag-browser [--series UID] [--instance N] [--list] \
[--tsv] [--max-width N] [--save-settings] PATH...";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchRequest {
    pub paths: Vec<PathBuf>,
    pub series_uid: Option<String>,
    pub instance: Option<usize>,
    pub list: bool,
    pub format: Option<TableFormat>,
    pub value_max_chars: Option<usize>,
    pub save_settings: bool,
}

impl LaunchRequest {
    /// Command line options win over the settings file.
    pub fn apply_to(&self, settings: &Settings) -> Settings {
        Settings {
            value_max_chars: self.value_max_chars.unwrap_or(settings.value_max_chars),
            format: self.format.unwrap_or(settings.format),
        }
    }
}

pub fn parse_launch_request_from_args(args: &[String]) -> Result<Option<LaunchRequest>, String> {
    if args.is_empty() {
        return Ok(None);
    }

    let mut request = LaunchRequest::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--series" => {
                let uid = next_value(&mut iter, "--series")?;
                request.series_uid = Some(uid.trim().to_string());
            }
            "--instance" => {
                let raw = next_value(&mut iter, "--instance")?;
                let index = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| "--instance must be a non-negative integer.".to_string())?;
                request.instance = Some(index);
            }
            "--max-width" => {
                let raw = next_value(&mut iter, "--max-width")?;
                let width = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| "--max-width must be a non-negative integer.".to_string())?;
                request.value_max_chars = Some(width);
            }
            "--list" => request.list = true,
            "--tsv" => request.format = Some(TableFormat::Tsv),
            "--aligned" => request.format = Some(TableFormat::Aligned),
            "--save-settings" => request.save_settings = true,
            "--" => {
                request.paths.extend(iter.by_ref().map(PathBuf::from));
            }
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown option {flag}."));
            }
            path => request.paths.push(PathBuf::from(path)),
        }
    }

    if request.paths.is_empty() && !request.save_settings {
        return Err("Missing DICOM or JSON file path(s).".to_string());
    }

    Ok(Some(request))
}

fn next_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a String, String> {
    iter.next()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("Missing value after {flag}."))
}
