// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TransportConfig;
use crate::{
    aggregator::AggregationPolicy,
    errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound},
    report::ReportWait,
    runner::RunSettings,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use swrite::{SWrite, swrite};
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};
use tracing::warn;

/// Trait for handling configuration warnings.
///
/// This allows for different warning handling strategies, such as logging warnings (the default
/// behavior) or collecting them for testing purposes.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        root: &Utf8Path,
        unknown: &BTreeSet<String>,
    );
}

/// Default implementation of [`ConfigWarnings`] that logs warnings using the tracing crate.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        root: &Utf8Path,
        unknown: &BTreeSet<String>,
    ) {
        let mut unknown_str = String::new();
        match unknown.iter().collect::<Vec<_>>().as_slice() {
            [single] => swrite!(unknown_str, "key `{single}`"),
            keys => {
                unknown_str.push_str("keys:");
                for key in keys {
                    swrite!(unknown_str, "\n  - {key}");
                }
            }
        }

        warn!(
            "in config file {}, ignoring unknown configuration {unknown_str}",
            config_file.strip_prefix(root).unwrap_or(config_file),
        )
    }
}

/// Overall configuration for verdict.
///
/// Most settings are managed through [profiles](VerdictProfile), obtained through the
/// [`profile`](Self::profile) method.
#[derive(Clone, Debug)]
pub struct VerdictConfig {
    root: Utf8PathBuf,
    inner: VerdictConfigImpl,
}

impl VerdictConfig {
    /// The default location of the config within the project root: `.config/verdict.toml`.
    pub const CONFIG_PATH: &'static str = ".config/verdict.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Project-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the verdict config from the given file, or if not specified from
    /// `.config/verdict.toml` in the project root.
    ///
    /// If no config file is specified and the root doesn't have `.config/verdict.toml`, uses the
    /// default config options.
    pub fn from_sources(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(root, config_file, &mut DefaultConfigWarnings)
    }

    /// Loads configuration from the given sources with custom warning handling.
    pub fn from_sources_with_warnings(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let root = root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &root, &unknown);
        }

        Ok(Self {
            root,
            inner: config.into_config_impl(),
        })
    }

    /// Returns the default verdict config.
    #[cfg(test)]
    pub(crate) fn default_config(root: impl Into<Utf8PathBuf>) -> Self {
        use itertools::Itertools;

        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");

        let mut unknown = BTreeSet::new();
        let deserialized: VerdictConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                unknown.insert(path.to_string());
            })
            .expect("default config is always valid");

        // Make sure there aren't any unknown keys in the default config, since it is
        // embedded/shipped with this binary.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.iter().join(", ")
            );
        }

        Self {
            root: root.into(),
            inner: deserialized.into_config_impl(),
        }
    }

    /// Returns the project root this config was loaded for.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the profile with the given name, or an error if a profile was specified but not
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<VerdictProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = if name == Self::DEFAULT_PROFILE {
            None
        } else {
            let profile = self.inner.other_profiles.get(name).ok_or_else(|| {
                ProfileNotFound::new(name, self.inner.all_profiles())
            })?;
            Some(profile)
        };

        Ok(VerdictProfile {
            name: name.to_owned(),
            default_profile: &self.inner.default_profile,
            custom_profile,
        })
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(VerdictConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: VerdictConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already tracks the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// A verdict profile: settings for a run, with unset keys inherited from the default profile.
///
/// Returned by [`VerdictConfig::profile`].
#[derive(Clone, Debug)]
pub struct VerdictProfile<'cfg> {
    name: String,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl<'cfg> VerdictProfile<'cfg> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the maximum wall-clock time for one invocation.
    pub fn timeout(&self) -> Duration {
        self.custom_profile
            .and_then(|profile| profile.timeout)
            .unwrap_or(self.default_profile.timeout)
    }

    /// Returns how long to wait after a termination signal before killing the runner.
    pub fn termination_grace_period(&self) -> Duration {
        self.custom_profile
            .and_then(|profile| profile.termination_grace_period)
            .unwrap_or(self.default_profile.termination_grace_period)
    }

    /// Returns how long to wait for the structured report, and how often to check.
    pub fn report_wait(&self) -> ReportWait {
        ReportWait {
            grace_period: self
                .custom_profile
                .and_then(|profile| profile.report_grace_period)
                .unwrap_or(self.default_profile.report_grace_period),
            poll_interval: self
                .custom_profile
                .and_then(|profile| profile.report_poll_interval)
                .unwrap_or(self.default_profile.report_poll_interval),
        }
    }

    /// Returns the aggregation policy.
    pub fn aggregation_policy(&self) -> AggregationPolicy {
        AggregationPolicy {
            default_pass: self
                .custom_profile
                .and_then(|profile| profile.default_pass)
                .unwrap_or(self.default_profile.default_pass),
        }
    }

    /// Returns the transport configuration.
    pub fn transport(&self) -> &'cfg TransportConfig {
        match self.custom_profile.map(|profile| &profile.transport) {
            Some(transport) if transport.wrapper().is_some() => transport,
            _ => &self.default_profile.transport,
        }
    }

    /// Returns the settings for a run with this profile.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            timeout: self.timeout(),
            termination_grace_period: self.termination_grace_period(),
            report_wait: self.report_wait(),
            policy: self.aggregation_policy(),
        }
    }
}

#[derive(Clone, Debug)]
struct VerdictConfigImpl {
    default_profile: DefaultProfileImpl,
    other_profiles: BTreeMap<String, CustomProfileImpl>,
}

impl VerdictConfigImpl {
    fn all_profiles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(VerdictConfig::DEFAULT_PROFILE)
            .chain(self.other_profiles.keys().map(|name| name.as_str()))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VerdictConfigDeserialize {
    #[serde(rename = "profile")]
    profiles: BTreeMap<String, CustomProfileImpl>,
}

impl VerdictConfigDeserialize {
    fn into_config_impl(mut self) -> VerdictConfigImpl {
        let p = self
            .profiles
            .remove(VerdictConfig::DEFAULT_PROFILE)
            .expect("default profile should exist");
        let default_profile = DefaultProfileImpl::new(p);

        VerdictConfigImpl {
            default_profile,
            other_profiles: self.profiles,
        }
    }
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    timeout: Duration,
    termination_grace_period: Duration,
    report_grace_period: Duration,
    report_poll_interval: Duration,
    default_pass: bool,
    transport: TransportConfig,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Self {
        Self {
            timeout: p.timeout.expect("timeout present in default profile"),
            termination_grace_period: p
                .termination_grace_period
                .expect("termination-grace-period present in default profile"),
            report_grace_period: p
                .report_grace_period
                .expect("report-grace-period present in default profile"),
            report_poll_interval: p
                .report_poll_interval
                .expect("report-poll-interval present in default profile"),
            default_pass: p
                .default_pass
                .expect("default-pass present in default profile"),
            transport: p.transport,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    termination_grace_period: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    report_grace_period: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    report_poll_interval: Option<Duration>,
    #[serde(default)]
    default_pass: Option<bool>,
    #[serde(default)]
    transport: TransportConfig,
}
