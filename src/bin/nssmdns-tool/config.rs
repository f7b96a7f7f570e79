// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements the configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use serde::Deserialize;

use nssmdns::policy::{Policy, DEFAULT_ALLOW_FILE};
use nssmdns::soa::{ResolverSoaProbe, DEFAULT_RESOLV_CONF};

use crate::args::CheckArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let dir = match path.as_ref().parent() {
        Some(p) => p,
        None => return Err(anyhow!("the configuration file path has no parent")),
    };
    let raw_config =
        fs::read_to_string(path.as_ref()).context("failed to read the configuration file")?;
    let mut config: Config =
        toml::from_str(&raw_config).context("failed to parse the configuration file")?;

    // Paths in the configuration file are interpreted relative to the
    // configuration file's directory.
    if let Some(ref mut allow_file) = config.allow_file {
        if allow_file.is_relative() {
            *allow_file = dir.join(&*allow_file);
        }
    }
    if config.resolver.resolv_conf.is_relative() {
        config.resolver.resolv_conf = dir.join(&config.resolver.resolv_conf);
    }
    Ok(config)
}

/// Builds the configuration for the `check` command: the configuration
/// file, if one is given, with command-line options applied on top.
/// Without a configuration file, the system allow-list file is used.
pub fn load_for_check(args: &CheckArgs) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => load_from_path(path)?,
        None => Config {
            allow_file: Some(PathBuf::from(DEFAULT_ALLOW_FILE)),
            resolver: ResolverConfig::default(),
        },
    };

    if args.no_allow_file {
        config.allow_file = None;
    } else if let Some(ref allow_file) = args.allow_file {
        config.allow_file = Some(allow_file.clone());
    }
    if let Some(ref resolv_conf) = args.resolv_conf {
        config.resolver.resolv_conf = resolv_conf.clone();
    }

    log_config_summary(&config);
    Ok(config)
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        return;
    }

    let allow_file = match config.allow_file {
        Some(ref path) => path.display().to_string(),
        None => String::from("none (default policy)"),
    };
    debug!(
        "Configuration loaded:\n\
         Allow-list:  {}\n\
         resolv.conf: {}\n\
         Timeout:     {}\n\
         Attempts:    {}",
        allow_file,
        config.resolver.resolv_conf.display(),
        describe(config.resolver.timeout, "s"),
        describe(config.resolver.attempts, ""),
    );
}

fn describe<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v, unit),
        None => String::from("from resolv.conf"),
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub allow_file: Option<PathBuf>,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Returns the name authorization policy this configuration selects.
    pub fn policy(&self) -> Policy {
        match self.allow_file {
            Some(ref path) => Policy::with_allow_file(path),
            None => Policy::default_only(),
        }
    }

    /// Returns the SOA probe this configuration selects.
    pub fn probe(&self) -> ResolverSoaProbe {
        let mut probe = ResolverSoaProbe::from_path(&self.resolver.resolv_conf);
        if let Some(timeout) = self.resolver.timeout {
            probe.set_timeout(Duration::from_secs(timeout));
        }
        if let Some(attempts) = self.resolver.attempts {
            probe.set_attempts(attempts);
        }
        probe
    }
}

/// Resolver settings for the SOA probe. Unset values come from the
/// resolver configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default = "default_resolv_conf")]
    pub resolv_conf: PathBuf,
    pub timeout: Option<u64>,
    pub attempts: Option<usize>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolv_conf: default_resolv_conf(),
            timeout: None,
            attempts: None,
        }
    }
}

fn default_resolv_conf() -> PathBuf {
    PathBuf::from(DEFAULT_RESOLV_CONF)
}
