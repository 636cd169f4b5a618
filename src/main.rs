use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use dicom_tag_browser::launch::{parse_launch_request_from_args, LaunchRequest, USAGE};
use dicom_tag_browser::render::{render_options, render_table};
use dicom_tag_browser::settings::{load_settings, save_settings, settings_file_path};
use dicom_tag_browser::{
    dicom, group_into_display_sets, json, MetadataObject, StandardTagDictionary, TagBrowser,
    TagDictionary,
};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    let request = match parse_launch_request_from_args(&cli_args) {
        Ok(Some(request)) => request,
        Ok(None) => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
        Err(err) => {
            eprintln!("Argument error: {err}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(&request) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(request: &LaunchRequest) -> Result<()> {
    let settings_path = settings_file_path();
    let stored = settings_path
        .as_deref()
        .map(load_settings)
        .unwrap_or_default();
    let settings = request.apply_to(&stored);

    if request.save_settings {
        let path = settings_path.context("No settings location available (HOME is not set)")?;
        save_settings(&path, &settings)?;
        eprintln!("Saved settings to {}", path.display());
    }

    if request.paths.is_empty() {
        return Ok(());
    }

    let dictionary = StandardTagDictionary;
    let mut instances = Vec::new();
    for path in &request.paths {
        instances.extend(load_path(path, &dictionary)?);
    }

    let display_sets = group_into_display_sets(instances);
    let Some(mut browser) = TagBrowser::new(display_sets, request.series_uid.as_deref()) else {
        bail!("No DICOM instances found in the given paths");
    };

    if let Some(uid) = request.series_uid.as_deref() {
        if browser.active_display_set().display_set_instance_uid != uid {
            bail!("No series with SeriesInstanceUID {uid}");
        }
    }
    if let Some(index) = request.instance {
        if !browser.select_instance(index) {
            bail!(
                "Instance {} is not available in series {}",
                index,
                browser.active_display_set().display_set_instance_uid
            );
        }
    }

    if request.list {
        print_selection(&browser);
    } else {
        print!("{}", render_table(&browser.table_rows(&dictionary), &settings));
    }
    Ok(())
}

fn load_path(path: &Path, dictionary: &dyn TagDictionary) -> Result<Vec<MetadataObject>> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let text =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        json::load_json_instances(&text, dictionary)
            .with_context(|| format!("Could not load metadata from {}", path.display()))
    } else {
        Ok(vec![dicom::load_instance(path, dictionary)?])
    }
}

fn print_selection(browser: &TagBrowser) {
    let selected_series = browser.selected_display_set_option().value;
    print!(
        "{}",
        render_options("Series", &browser.display_set_options(), Some(&selected_series))
    );
    if let Some(instances) = browser.instance_options() {
        print!(
            "{}",
            render_options("Instances", &instances, Some(&browser.active_instance()))
        );
    }
}
