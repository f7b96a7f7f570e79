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

//! The name authorization policy.
//!
//! Before a name is resolved over mDNS, the backend decides whether it
//! may resolve that name at all. There are two policies:
//!
//! 1. **Allow-list.** If an allow-list is present, a name is allowed
//!    when any of its [rules](Rule) matches, and not allowed otherwise.
//!
//! 2. **Default.** Without an allow-list, only names with exactly two
//!    labels whose last label is `local` (like `printer.local` or
//!    `printer.local.`) are eligible, and only if no unicast DNS zone is
//!    authoritative for `local`. In that case the verdict is
//!    [`Verdict::AllowedIfNoLocalSoa`], which [`Verdict::resolve`]
//!    settles by consulting a [`SoaProbe`].
//!
//! A [`Policy`] selects between the two based on whether an allow-list
//! file exists.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::soa::SoaProbe;
use crate::util::{ends_with, label_count};

mod rules;

pub use rules::{Rule, Rules, MAX_RULE_LEN};

/// The conventional location of the allow-list file.
pub const DEFAULT_ALLOW_FILE: &str = "/etc/mdns.allow";

////////////////////////////////////////////////////////////////////////
// VERDICTS                                                           //
////////////////////////////////////////////////////////////////////////

/// The outcome of checking a name against the policy.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verdict {
    NotAllowed,
    Allowed,

    /// The name is allowed unless a unicast DNS server reports an SOA
    /// record for `local`.
    AllowedIfNoLocalSoa,
}

impl Verdict {
    /// Settles the verdict into a yes-or-no decision. The probe is only
    /// consulted for [`Verdict::AllowedIfNoLocalSoa`].
    ///
    /// A probe that fails reports no SOA record, so in that case the
    /// name is allowed.
    pub fn resolve<P: SoaProbe + ?Sized>(self, probe: &P) -> bool {
        match self {
            Self::NotAllowed => false,
            Self::Allowed => true,
            Self::AllowedIfNoLocalSoa => !probe.local_soa(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NotAllowed => f.write_str("not allowed"),
            Self::Allowed => f.write_str("allowed"),
            Self::AllowedIfNoLocalSoa => f.write_str("allowed if no local SOA"),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// VERIFICATION                                                       //
////////////////////////////////////////////////////////////////////////

/// Checks `name` against the allow-list read from `allow_list` if there
/// is one, or against the default policy otherwise.
pub fn verify_name_allowed<R: BufRead>(name: &str, allow_list: Option<R>) -> Verdict {
    match allow_list {
        Some(reader) => verify_with_allow_list(name, reader),
        None => verify_with_default_policy(name),
    }
}

/// Checks `name` against the allow-list read from `reader`. Reading
/// stops at the first matching rule.
///
/// A read error ends the scan as if the allow-list ended there.
pub fn verify_with_allow_list<R: BufRead>(name: &str, reader: R) -> Verdict {
    for rule in Rules::new(reader) {
        match rule {
            Ok(rule) if rule.matches(name) => {
                debug!("{} is allowed by rule {}", name, rule);
                return Verdict::Allowed;
            }
            Ok(_) => (),
            Err(e) => {
                warn!("Failed to read the allow-list: {}", e);
                break;
            }
        }
    }
    debug!("{} matches no allow-list rule", name);
    Verdict::NotAllowed
}

/// Checks `name` against the default policy.
pub fn verify_with_default_policy(name: &str) -> Verdict {
    let verdict =
        if (ends_with(name, ".local") || ends_with(name, ".local.")) && label_count(name) == 2 {
            Verdict::AllowedIfNoLocalSoa
        } else {
            Verdict::NotAllowed
        };
    debug!("{} is {} by the default policy", name, verdict);
    verdict
}

/// Checks `name` and settles the verdict with `probe`.
pub fn is_allowed<R: BufRead, P: SoaProbe + ?Sized>(
    name: &str,
    allow_list: Option<R>,
    probe: &P,
) -> bool {
    verify_name_allowed(name, allow_list).resolve(probe)
}

////////////////////////////////////////////////////////////////////////
// POLICY                                                             //
////////////////////////////////////////////////////////////////////////

/// The policy configuration: where, if anywhere, to look for an
/// allow-list file.
///
/// The file is opened afresh for every check. If it does not exist (or
/// cannot be opened), the default policy applies.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Policy {
    allow_file: Option<PathBuf>,
}

impl Policy {
    /// Creates a policy that never consults an allow-list.
    pub fn default_only() -> Self {
        Self { allow_file: None }
    }

    /// Creates a policy that uses the allow-list file at `path` when it
    /// exists.
    pub fn with_allow_file(path: impl Into<PathBuf>) -> Self {
        Self {
            allow_file: Some(path.into()),
        }
    }

    /// Returns the configured allow-list file path.
    pub fn allow_file(&self) -> Option<&Path> {
        self.allow_file.as_deref()
    }

    /// Checks `name` against this policy.
    pub fn verify(&self, name: &str) -> Verdict {
        verify_name_allowed(name, self.open_allow_file())
    }

    /// Checks `name` against this policy and settles the verdict with
    /// `probe`.
    pub fn is_allowed<P: SoaProbe + ?Sized>(&self, name: &str, probe: &P) -> bool {
        self.verify(name).resolve(probe)
    }

    fn open_allow_file(&self) -> Option<BufReader<File>> {
        let path = self.allow_file.as_ref()?;
        match File::open(path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No allow-list at {}; using the default policy", path.display());
                None
            }
            Err(e) => {
                warn!(
                    "Failed to open the allow-list at {} ({}); using the default policy",
                    path.display(),
                    e,
                );
                None
            }
        }
    }
}
