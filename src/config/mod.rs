//! The on-disk and in-memory configuration document.
//!
//! [`Config`] is the root of the nested structure every other subsystem
//! validates against and reads from. It is loaded from YAML at startup,
//! falling back to an embedded default template when no file exists on
//! disk, and is merged atomically into the running daemon at tick
//! boundaries via [`crate::state::store::ConfigStore`] rather than
//! mutated in place while a measurement is in flight.

pub mod adcs;
pub mod fluids;
pub mod flow_sensors;
pub mod measurements;
pub mod mqtt;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use adcs::AdcConfig;
use flow_sensors::FlowSensorConfig;
use fluids::FluidConfig;
use measurements::MeasurementChannelConfig;
use mqtt::MqttConfig;

const DEFAULT_CONFIG_YAML: &str = include_str!("../../resources/default_config.yaml");

/// The full calorimetry controller configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// How often, in seconds, the worker performs a full acquisition tick.
    pub scan_interval_s: u64,
    /// Directory results snapshots are saved into; `None` disables saving.
    #[serde(default)]
    pub save_dir: Option<String>,
    pub adcs: BTreeMap<String, AdcConfig>,
    pub fluids: BTreeMap<String, FluidConfig>,
    pub flow_sensors: Vec<FlowSensorConfig>,
    pub channels: Vec<MeasurementChannelConfig>,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

/// Whether applying a new configuration can be absorbed by the running
/// worker at its next tick, or requires the daemon to be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    /// Channel calibration values, scan interval, or fluid/flow-sensor
    /// parameters changed: safe to merge in at the next tick boundary.
    NoRestart,
    /// The ADC or channel topology itself changed: drivers must be torn
    /// down and rebuilt, which only happens at daemon startup.
    FullRestart,
}

impl Config {
    /// Load configuration from `path`, or fall back to the embedded
    /// default template (and write it to `path`) if the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let config: Config =
                serde_yml::from_str(&text).context("parsing config YAML")?;
            config.validate().context("validating loaded config")?;
            Ok(config)
        } else {
            warn!(
                "no config file at {}, restoring embedded default",
                path.display()
            );
            let config = Self::default_template()?;
            config.save(path)?;
            Ok(config)
        }
    }

    /// Parse the default template embedded in the binary.
    pub fn default_template() -> Result<Self> {
        serde_yml::from_str(DEFAULT_CONFIG_YAML).context("parsing embedded default config")
    }

    /// Serialize and write this configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_yml::to_string(self).context("serializing config to YAML")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(path, text)
            .with_context(|| format!("writing config file {}", path.display()))?;
        info!("wrote configuration to {}", path.display());
        Ok(())
    }

    /// Deep-validate cross-references and value ranges that a schema alone
    /// cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_s < 1 {
            anyhow::bail!("scan_interval_s must be at least 1");
        }

        for (name, adc) in &self.adcs {
            adc.validate(name).map_err(|e| anyhow::anyhow!(e))?;
        }
        for (name, fluid) in &self.fluids {
            fluid.validate(name).map_err(|e| anyhow::anyhow!(e))?;
        }
        for flow in &self.flow_sensors {
            flow.validate().map_err(|e| anyhow::anyhow!(e))?;
        }
        for channel in &self.channels {
            channel.validate().map_err(|e| anyhow::anyhow!(e))?;
        }

        for channel in &self.channels {
            let adc = self.adcs.get(&channel.adc).ok_or_else(|| {
                anyhow::anyhow!(
                    "channel '{}' references unknown ADC '{}'",
                    channel.name,
                    channel.adc
                )
            })?;
            if channel.temp_ch_up >= adc.temp_chs.len() {
                anyhow::bail!(
                    "channel '{}' references temp_ch_up {} but ADC '{}' only has {} temp channels",
                    channel.name,
                    channel.temp_ch_up,
                    channel.adc,
                    adc.temp_chs.len()
                );
            }
            if channel.temp_ch_dn >= adc.temp_chs.len() {
                anyhow::bail!(
                    "channel '{}' references temp_ch_dn {} but ADC '{}' only has {} temp channels",
                    channel.name,
                    channel.temp_ch_dn,
                    channel.adc,
                    adc.temp_chs.len()
                );
            }
            if !self.fluids.contains_key(&channel.fluid) {
                anyhow::bail!(
                    "channel '{}' references unknown fluid '{}'",
                    channel.name,
                    channel.fluid
                );
            }
            if channel.flow_sensor >= self.flow_sensors.len() {
                anyhow::bail!(
                    "channel '{}' references flow_sensor index {} but only {} flow sensors are configured",
                    channel.name,
                    channel.flow_sensor,
                    self.flow_sensors.len()
                );
            }
            if channel.flow_temp_ch >= self.channels.len() {
                anyhow::bail!(
                    "channel '{}' references flow_temp_ch index {} but only {} channels are configured",
                    channel.name,
                    channel.flow_temp_ch,
                    self.channels.len()
                );
            }
        }

        self.mqtt.validate().map_err(|e| anyhow::anyhow!(e))?;

        Ok(())
    }

    /// Classify the kind of reload required to move from `self` to `new`.
    ///
    /// Adding, removing or renaming an ADC or channel, or rewiring which
    /// ADC/temp channels a measurement channel reads from, requires a full
    /// restart since it changes which driver instances the worker holds and
    /// invalidates its pre-computed mux sequences; everything else
    /// (calibration values, scan interval, fluid and flow sensor
    /// parameters, power gain/offset) can be absorbed at the next tick
    /// boundary.
    pub fn reload_kind(&self, new: &Config) -> ReloadKind {
        fn adc_names(c: &Config) -> HashSet<&str> {
            c.adcs.keys().map(|s| s.as_str()).collect()
        }
        fn channel_names(c: &Config) -> HashSet<&str> {
            c.channels.iter().map(|ch| ch.name.as_str()).collect()
        }
        fn flow_names(c: &Config) -> HashSet<&str> {
            c.flow_sensors.iter().map(|f| f.name()).collect()
        }

        if adc_names(self) != adc_names(new)
            || channel_names(self) != channel_names(new)
            || flow_names(self) != flow_names(new)
        {
            return ReloadKind::FullRestart;
        }

        for (name, adc) in &self.adcs {
            if let Some(new_adc) = new.adcs.get(name) {
                if adc.temp_chs.len() != new_adc.temp_chs.len() {
                    return ReloadKind::FullRestart;
                }
            }
        }

        for (old_ch, new_ch) in self.channels.iter().zip(new.channels.iter()) {
            if old_ch.adc != new_ch.adc
                || old_ch.temp_ch_up != new_ch.temp_ch_up
                || old_ch.temp_ch_dn != new_ch.temp_ch_dn
                || old_ch.flow_sensor != new_ch.flow_sensor
            {
                return ReloadKind::FullRestart;
            }
        }

        ReloadKind::NoRestart
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_template_parses_and_validates() {
        let config = Config::default_template().unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_scan_interval() {
        let mut config = Config::default_template().unwrap();
        config.scan_interval_s = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_dangling_channel_fluid_reference() {
        let mut config = Config::default_template().unwrap();
        config.channels[0].fluid = "nonexistent".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_temp_ch_index() {
        let mut config = Config::default_template().unwrap();
        config.channels[0].temp_ch_up = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn changing_filter_size_is_a_no_restart_reload() {
        let config = Config::default_template().unwrap();
        let mut new_config = config.clone();
        new_config.adcs.get_mut("adc0").unwrap().filter_size = 16;
        assert_eq!(config.reload_kind(&new_config), ReloadKind::NoRestart);
    }

    #[test]
    fn renaming_an_adc_is_a_full_restart_reload() {
        let config = Config::default_template().unwrap();
        let mut new_config = config.clone();
        let adc = new_config.adcs.remove("adc0").unwrap();
        new_config.adcs.insert("adc1".to_string(), adc);
        assert_eq!(config.reload_kind(&new_config), ReloadKind::FullRestart);
    }

    #[test]
    fn load_or_default_writes_template_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config::load_or_default(&path).unwrap();
        assert!(path.exists());
        config.validate().unwrap();
    }
}
