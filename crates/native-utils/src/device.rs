use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host's default input.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .context("No default input device available");
    };

    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|d| d.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow::anyhow!("No input device named '{}'", target))
}

/// Same as [`get_or_default_input`] for output devices.
pub fn get_or_default_output(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .context("No default output device available");
    };

    host.output_devices()
        .context("Failed to enumerate output devices")?
        .find(|d| d.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow::anyhow!("No output device named '{}'", target))
}

/// One line per input device: ` * name(2ch, 48000hz) [default]`.
pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut device_names = Vec::new();
    for device in host.input_devices().context("No input devices found")? {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        match device.default_input_config() {
            Ok(cfg) => device_names.push(describe(
                &name,
                cfg.channels(),
                cfg.sample_rate().0,
                default_name.as_deref() == Some(name.as_str()),
            )),
            Err(e) => tracing::debug!("Skipping input device {}: {}", name, e),
        }
    }
    Ok(device_names.join("\n"))
}

/// One line per output device, same format as [`get_available_inputs`].
pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut device_names = Vec::new();
    for device in host.output_devices().context("No output devices found")? {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        match device.default_output_config() {
            Ok(cfg) => device_names.push(describe(
                &name,
                cfg.channels(),
                cfg.sample_rate().0,
                default_name.as_deref() == Some(name.as_str()),
            )),
            Err(e) => tracing::debug!("Skipping output device {}: {}", name, e),
        }
    }
    Ok(device_names.join("\n"))
}

fn describe(name: &str, channels: u16, sample_rate: u32, is_default: bool) -> String {
    let mut d = format!(" * {}({}ch, {}hz)", name, channels, sample_rate);
    if is_default {
        d.push_str(" [default]");
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_marks_default() {
        assert_eq!(describe("Mic", 1, 16000, false), " * Mic(1ch, 16000hz)");
        assert_eq!(describe("Out", 2, 48000, true), " * Out(2ch, 48000hz) [default]");
    }
}
