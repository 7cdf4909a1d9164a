use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use udev::Device;

/// udev properties of the inputs we listen to by default.
const MONITORED_PROPERTIES: [&str; 5] = [
    "ID_INPUT_KEYBOARD",
    "ID_INPUT_MOUSE",
    "ID_INPUT_TOUCHPAD",
    "ID_INPUT_JOYSTICK",
    // Lid, tablet mode and dock switches
    "ID_INPUT_SWITCH",
];

/// Wait for a file to show up
pub(crate) fn wait_for_file(path: &Path, timeout: Duration) -> anyhow::Result<()> {
    let last_time = Instant::now() + timeout;
    while Instant::now() < last_time {
        if path.exists() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    anyhow::bail!("Could not find: {path:?}. Maybe --wait is too short (or there is a typo)?")
}

/// Find the one `*kbd_backlight` LED in `leds_dir`.
pub(crate) fn find_kbd_led(leds_dir: &Path) -> anyhow::Result<PathBuf> {
    let mut kbd_led_dir = None;
    for entry in leds_dir
        .read_dir()
        .with_context(|| format!("Failed to list {leds_dir:?}"))?
    {
        let file_name = entry?.file_name().to_string_lossy().into_owned();
        if file_name.ends_with("kbd_backlight") {
            if kbd_led_dir.is_some() {
                anyhow::bail!("Multiple kbd_backlights found. Please specify one explicitly.");
            }
            kbd_led_dir = Some(file_name);
        }
    }
    match kbd_led_dir {
        Some(name) => Ok(leds_dir.join(name)),
        None => anyhow::bail!("No kbd_backlight found. Please specify one explicitly."),
    }
}

fn is_default_input<'a>(devnode: &Path, mut properties: impl Iterator<Item = &'a str>) -> bool {
    let is_event_node = devnode
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("event"));
    is_event_node && properties.any(|prop| MONITORED_PROPERTIES.contains(&prop))
}

pub fn get_devnode_if_default(device: &Device) -> Option<&Path> {
    let devnode = device.devnode()?;
    let properties: Vec<String> = device
        .properties()
        .map(|prop| prop.name().to_string_lossy().into_owned())
        .collect();
    is_default_input(devnode, properties.iter().map(String::as_str)).then_some(devnode)
}

/// Keyboards, mice, switches and the like, as udev knows them.
pub fn get_default_devices() -> anyhow::Result<Vec<PathBuf>> {
    let mut default_devices = vec![];

    let mut enumerator = udev::Enumerator::new().context("Failed to create udev enumerator")?;
    enumerator.match_subsystem("input")?;

    for device in enumerator.scan_devices()? {
        if let Some(devnode) = get_devnode_if_default(&device) {
            default_devices.push(devnode.to_path_buf());
        }
    }

    default_devices.sort();
    default_devices.dedup();
    Ok(default_devices)
}

pub fn normalize_devices(
    mut provided_device_paths: Vec<PathBuf>,
    mut default_device_paths: Vec<PathBuf>,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut unique_canons = HashSet::new();
    for path in &provided_device_paths {
        // Disallow duplicates in provided inputs
        let canon = fs::canonicalize(path).with_context(|| format!("No such input {path:?}"))?;
        if !unique_canons.insert(canon.clone()) {
            anyhow::bail!(
                "Provided input devices have duplicates (provided: {}; its canon: {}).",
                path.to_string_lossy(),
                canon.to_string_lossy()
            );
        }

        // Remove the corresponding duplicate (if any)
        default_device_paths.retain(|p| p != &canon);
    }

    provided_device_paths.append(&mut default_device_paths);
    Ok(provided_device_paths)
}
