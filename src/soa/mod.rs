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

//! The probe for a unicast DNS zone authoritative for `local`.
//!
//! Some networks run a conventional DNS zone named `local`. Where that
//! zone exists, names under `.local` belong to it rather than to mDNS,
//! so the default [policy](crate::policy) asks a [`SoaProbe`] whether
//! the unicast DNS reports an SOA record for `local` before allowing
//! such names.
//!
//! [`ResolverSoaProbe`] answers the question with a stub resolver
//! configured from the system resolver configuration. The probe only
//! ever answers yes or no: every failure is a "no". Note that this
//! means DNS failures make `.local` names eligible for mDNS resolution.

use std::fmt;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::system_conf::parse_resolv_conf;
use hickory_resolver::{ResolveError, TokioResolver};
use log::debug;

/// The location of the system resolver configuration.
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// The longest time to wait for a single reply.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30);

/// The most attempts made per nameserver.
pub const MAX_ATTEMPTS: usize = 5;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// The name whose SOA record is looked up.
const LOCAL_ZONE: &str = "local.";

/// Something that can tell whether unicast DNS has an SOA record for
/// `local`.
pub trait SoaProbe {
    /// Returns `true` if an SOA record for `local` exists. Failure to
    /// find out counts as `false`.
    fn local_soa(&self) -> bool;
}

impl<F: Fn() -> bool> SoaProbe for F {
    fn local_soa(&self) -> bool {
        self()
    }
}

////////////////////////////////////////////////////////////////////////
// RESOLVER-BACKED PROBE                                              //
////////////////////////////////////////////////////////////////////////

/// A [`SoaProbe`] that looks up `local. IN SOA` through the configured
/// unicast nameservers.
///
/// A lookup that returns at least one record means the SOA record
/// exists. Retries, timeouts, and failover between nameservers are
/// left to the resolver. Overridden or configured timeouts are capped
/// at [`MAX_TIMEOUT`] and attempts at [`MAX_ATTEMPTS`].
///
/// Each probe runs its lookup on a private single-threaded runtime, so
/// it must not be called from within an asynchronous task.
#[derive(Clone, Debug)]
pub struct ResolverSoaProbe {
    source: ConfigSource,
    timeout: Option<Duration>,
    attempts: Option<usize>,
}

#[derive(Clone, Debug)]
enum ConfigSource {
    File(PathBuf),
    Fixed(ResolverConfig),
}

impl ResolverSoaProbe {
    /// Creates a probe using the system resolver configuration, which is
    /// read each time the probe runs.
    pub fn system() -> Self {
        Self::from_path(DEFAULT_RESOLV_CONF)
    }

    /// Creates a probe using the resolver configuration file at `path`,
    /// which is read each time the probe runs. A missing file means a
    /// nameserver on the local host, as with the C library resolver.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ConfigSource::File(path.into()),
            timeout: None,
            attempts: None,
        }
    }

    /// Creates a probe with a fixed set of nameservers and default
    /// options.
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            source: ConfigSource::Fixed(config),
            timeout: None,
            attempts: None,
        }
    }

    /// Overrides the configured per-reply timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Overrides the configured number of attempts.
    pub fn set_attempts(&mut self, attempts: usize) {
        self.attempts = Some(attempts);
    }

    /// Runs the probe, reporting failures as errors rather than as
    /// `false`.
    pub fn query(&self) -> Result<bool, Error> {
        let (config, opts) = self.load()?;
        let opts = self.options(opts);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Io)?;
        runtime.block_on(async move {
            let provider = TokioConnectionProvider::default();
            let resolver = TokioResolver::builder_with_config(config, provider)
                .with_options(opts)
                .build();
            let lookup = resolver
                .lookup(LOCAL_ZONE, RecordType::SOA)
                .await
                .map_err(Error::Lookup)?;
            Ok(lookup.iter().next().is_some())
        })
    }

    fn load(&self) -> Result<(ResolverConfig, ResolverOpts), Error> {
        match self.source {
            ConfigSource::File(ref path) => match fs::read(path) {
                Ok(text) => parse_resolv_conf(text).map_err(Error::Config),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("No resolver configuration at {}; using localhost", path.display());
                    Ok((localhost_config(), ResolverOpts::default()))
                }
                Err(e) => Err(Error::Io(e)),
            },
            ConfigSource::Fixed(ref config) => Ok((config.clone(), ResolverOpts::default())),
        }
    }

    /// Applies the overrides to `opts` and keeps the result within
    /// bounds.
    fn options(&self, mut opts: ResolverOpts) -> ResolverOpts {
        if let Some(timeout) = self.timeout {
            opts.timeout = timeout;
        }
        if let Some(attempts) = self.attempts {
            opts.attempts = attempts;
        }
        opts.timeout = opts.timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        opts.attempts = opts.attempts.clamp(1, MAX_ATTEMPTS);
        opts
    }
}

impl SoaProbe for ResolverSoaProbe {
    fn local_soa(&self) -> bool {
        match self.query() {
            Ok(found) => {
                debug!("SOA record for local {}", if found { "found" } else { "not found" });
                found
            }
            Err(e) => {
                debug!("SOA probe failed ({}); assuming there is no SOA record", e);
                false
            }
        }
    }
}

fn localhost_config() -> ResolverConfig {
    let localhost = [IpAddr::V4(Ipv4Addr::LOCALHOST)];
    ResolverConfig::from_parts(
        None,
        Vec::new(),
        NameServerConfigGroup::from_ips_clear(&localhost, 53, true),
    )
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error that keeps a [`ResolverSoaProbe`] from getting an answer.
#[derive(Debug)]
pub enum Error {
    /// The configuration could not be read, or the runtime could not
    /// be started.
    Io(io::Error),

    /// The resolver configuration is invalid.
    Config(ResolveError),

    /// The lookup failed. This includes negative answers.
    Lookup(ResolveError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Config(e) => write!(f, "invalid resolver configuration: {}", e),
            Self::Lookup(e) => write!(f, "lookup failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Config(e) | Self::Lookup(e) => Some(e),
        }
    }
}
