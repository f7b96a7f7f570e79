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

//! Implements command-line argument parsing.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{Parser, Subcommand};

use nssmdns::hostent::{AddressResult, Family};

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// Inspect the mDNS host-lookup policy and result layout
#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check whether names may be resolved over mDNS
    Check(CheckArgs),

    /// Build a host entry in a fixed-size buffer and print it
    Hostent(HostentArgs),
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Set the configuration file to use
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Set the allow-list file
    #[arg(long, conflicts_with = "no_allow_file", value_name = "FILE")]
    pub allow_file: Option<PathBuf>,

    /// Use the default policy even if an allow-list file exists
    #[arg(long)]
    pub no_allow_file: bool,

    /// Set the resolver configuration file used by the SOA probe
    #[arg(long, value_name = "FILE")]
    pub resolv_conf: Option<PathBuf>,

    /// Do not send the SOA probe; assume there is no SOA record
    #[arg(long)]
    pub no_soa_probe: bool,

    /// The names to check
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct HostentArgs {
    /// Set the size of the result buffer
    #[arg(long, default_value_t = 1024, value_name = "BYTES")]
    pub buffer_size: usize,

    /// Set the address family (defaults to that of the first address)
    #[arg(long, value_name = "inet|inet6")]
    pub family: Option<Family>,

    /// The official name of the host
    #[arg(value_name = "NAME")]
    pub name: String,

    /// The addresses found for the host, in order
    #[arg(required = true, value_name = "ADDRESS[%SCOPE]")]
    pub addresses: Vec<AddressArg>,
}

/// An address provided on the command line. This is parsed with its
/// [`FromStr`] implementation and accepts either a plain IP address or
/// an IPv6 address with a numeric scope ID, as in `fe80::1%2`.
#[derive(Clone, Copy, Debug)]
pub struct AddressArg(pub AddressResult);

impl FromStr for AddressArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((address, scope)) = s.split_once('%') {
            let address = address
                .parse()
                .map_err(|e| anyhow!("invalid IPv6 address: {}", e))?;
            let scope_id = scope
                .parse()
                .map_err(|e| anyhow!("invalid scope ID: {}", e))?;
            Ok(Self(AddressResult::scoped(address, scope_id)))
        } else {
            let address: IpAddr = s.parse().map_err(|e| anyhow!("invalid address: {}", e))?;
            Ok(Self(address.into()))
        }
    }
}
