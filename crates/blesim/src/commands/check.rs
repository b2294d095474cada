//! `check`: compile the device configuration offline and list what the
//! peripheral would expose.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use blesim_core::{AttributeEngine, DeviceConfig, Property, StateStore, ValueSource};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct CharacteristicRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Properties")]
    properties: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Codec")]
    codec: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

fn describe_source(source: Option<&ValueSource>) -> String {
    match source {
        Some(ValueSource::State { key, .. }) => format!("state:{key}"),
        Some(ValueSource::Literal { .. }) => "literal".into(),
        None => "-".into(),
    }
}

fn rows(device: &DeviceConfig) -> Result<Vec<CharacteristicRow>, CliError> {
    let store = StateStore::with_values(device.state.clone());
    let attributes = AttributeEngine::default().compile(device, &store)?;

    let mut rows = Vec::new();
    for service in &device.services {
        for characteristic in &service.characteristics {
            let value = attributes
                .find(&service.uuid, &characteristic.uuid)
                .filter(|attr| attr.has_property(Property::Read))
                .and_then(|attr| attr.read(0).ok())
                .map_or_else(|| "-".into(), |bytes| hex(&bytes));

            rows.push(CharacteristicRow {
                service: service.uuid.clone(),
                uuid: characteristic.uuid.clone(),
                name: characteristic.name.clone().unwrap_or_default(),
                properties: characteristic
                    .properties
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                source: describe_source(characteristic.value.as_ref()),
                codec: characteristic
                    .codec
                    .as_ref()
                    .map_or_else(|| "-".into(), |codec| codec.format.clone()),
                value,
            });
        }
    }
    attributes.shutdown();
    Ok(rows)
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let settings = config::load_settings(global)?;
    let controller_config = config::controller_config(&settings)?;
    let rows = rows(&controller_config.device)?;

    let rendered = output::render_list(
        global.output,
        &rows,
        CharacteristicRow::clone,
        |row| format!("{}/{}", row.service, row.uuid),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
