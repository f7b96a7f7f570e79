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

//! Implements the `check` and `hostent` commands.

use std::cell::Cell;
use std::fmt::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::process;

use anyhow::{anyhow, Context, Result};
use env_logger::Env;
use log::{error, info, warn};

use nssmdns::arena::Arena;
use nssmdns::hostent::{self, Accumulator, HostEntry, MAX_ENTRIES};
use nssmdns::soa::SoaProbe;

use crate::args::{Args, CheckArgs, Command, HostentArgs};
use crate::config;

/// Runs the selected command.
pub fn run(args: Args) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Failed to run:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
}

fn try_running(args: Args) -> Result<()> {
    match args.command {
        Command::Check(check_args) => check(check_args),
        Command::Hostent(hostent_args) => build_hostent(hostent_args),
    }
}

////////////////////////////////////////////////////////////////////////
// CHECK                                                              //
////////////////////////////////////////////////////////////////////////

fn check(args: CheckArgs) -> Result<()> {
    let config = config::load_for_check(&args).context("failed to load the configuration")?;
    let policy = config.policy();
    let probe = config.probe();

    // The probe answer is the same for every name, so ask at most once,
    // and only if some verdict depends on it.
    let local_soa = Cell::new(None);
    let cached_probe = || match local_soa.get() {
        Some(found) => found,
        None => {
            let found = if args.no_soa_probe {
                false
            } else {
                info!("Probing unicast DNS for an SOA record for local.");
                probe.local_soa()
            };
            local_soa.set(Some(found));
            found
        }
    };

    for name in &args.names {
        let verdict = policy.verify(name);
        let allowed = verdict.resolve(&cached_probe);
        println!(
            "{}\t{}\t{}",
            name,
            verdict,
            if allowed { "ALLOW" } else { "DENY" },
        );
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// HOSTENT                                                            //
////////////////////////////////////////////////////////////////////////

fn build_hostent(args: HostentArgs) -> Result<()> {
    let family = match args.family {
        Some(family) => family,
        None => args
            .addresses
            .first()
            .map(|a| a.0.family())
            .ok_or_else(|| anyhow!("no addresses provided"))?,
    };

    let accumulator: Accumulator = args.addresses.iter().map(|a| a.0).collect();
    if args.addresses.len() > MAX_ENTRIES {
        warn!(
            "Only the first {} of {} addresses are kept.",
            MAX_ENTRIES,
            args.addresses.len(),
        );
    }
    let skipped = accumulator.len() - accumulator.iter_family(family).count();
    if skipped > 0 {
        warn!("Skipping {} address(es) not of family {}.", skipped, family);
    }

    let mut buffer = vec![0; args.buffer_size];
    let mut arena = Arena::new(&mut buffer);
    let entry = hostent::build_from_accumulator(&mut arena, &accumulator, &args.name, family)
        .with_context(|| {
            format!(
                "failed to build the host entry in {} bytes (try a larger --buffer-size)",
                args.buffer_size,
            )
        })?;
    for result in accumulator.iter_family(family) {
        println!("found:     {}", result);
    }
    print_entry(&entry);
    println!("used:     {} of {} bytes", arena.used(), arena.capacity());
    Ok(())
}

fn print_entry(entry: &HostEntry) {
    println!("name:      {}", entry.name().to_string_lossy());
    println!("aliases:   {}", entry.aliases().count());
    println!("family:    {}", entry.family());
    println!("length:    {}", entry.address_len());
    for address in entry.addresses() {
        match format_address(address) {
            Some(ip) => println!("address:   {}", ip),
            None => println!("address:   {:02x?}", address),
        }
    }
}

fn format_address(octets: &[u8]) -> Option<IpAddr> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        Some(Ipv4Addr::from(v4).into())
    } else if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        Some(Ipv6Addr::from(v6).into())
    } else {
        None
    }
}
