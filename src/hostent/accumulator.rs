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

//! Implementation of the [`Accumulator`] type.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use arrayvec::ArrayVec;

use super::Family;

/// The maximum number of addresses an [`Accumulator`] holds.
pub const MAX_ENTRIES: usize = 16;

/// One address found by a query.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AddressResult {
    pub address: IpAddr,

    /// The interface scope of a link-local IPv6 address, or zero.
    pub scope_id: u32,
}

impl AddressResult {
    /// Creates a result with no scope.
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            scope_id: 0,
        }
    }

    /// Creates an IPv6 result scoped to the interface `scope_id`.
    pub fn scoped(address: Ipv6Addr, scope_id: u32) -> Self {
        Self {
            address: address.into(),
            scope_id,
        }
    }

    /// Returns the address family of this result.
    pub fn family(&self) -> Family {
        Family::of(&self.address)
    }
}

/// Formats the address, followed by `%` and the scope ID if there is
/// one.
impl fmt::Display for AddressResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.scope_id == 0 {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}%{}", self.address, self.scope_id)
        }
    }
}

impl From<IpAddr> for AddressResult {
    fn from(address: IpAddr) -> Self {
        Self::new(address)
    }
}

/// Collects the addresses found for one in-flight query, in order.
///
/// At most [`MAX_ENTRIES`] addresses are kept. Further appends are
/// silently dropped: a host announcing more addresses than that still
/// resolves, just to the first [`MAX_ENTRIES`] of them.
#[derive(Clone, Debug, Default)]
pub struct Accumulator {
    results: ArrayVec<AddressResult, MAX_ENTRIES>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `result`, unless the accumulator is already full.
    pub fn append(&mut self, result: AddressResult) {
        if self.results.try_push(result).is_err() {
            log::trace!("accumulator full; dropping {}", result.address);
        }
    }

    /// Returns the number of collected addresses.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns whether no addresses have been collected.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns whether further appends will be dropped.
    pub fn is_full(&self) -> bool {
        self.results.is_full()
    }

    /// Returns the collected addresses in insertion order.
    pub fn as_slice(&self) -> &[AddressResult] {
        &self.results
    }

    /// Returns an iterator over the collected addresses in insertion
    /// order.
    pub fn iter(&self) -> std::slice::Iter<AddressResult> {
        self.results.iter()
    }

    /// Returns an iterator over the collected addresses of `family`, in
    /// insertion order.
    pub fn iter_family(&self, family: Family) -> impl Iterator<Item = &AddressResult> {
        self.results.iter().filter(move |r| r.family() == family)
    }

    /// Removes all collected addresses.
    pub fn clear(&mut self) {
        self.results.clear();
    }
}

impl Extend<AddressResult> for Accumulator {
    fn extend<T: IntoIterator<Item = AddressResult>>(&mut self, iter: T) {
        for result in iter {
            self.append(result);
        }
    }
}

impl FromIterator<AddressResult> for Accumulator {
    fn from_iter<T: IntoIterator<Item = AddressResult>>(iter: T) -> Self {
        let mut accumulator = Self::new();
        accumulator.extend(iter);
        accumulator
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn v4(last: u8) -> AddressResult {
        AddressResult::new(Ipv4Addr::new(192, 0, 2, last).into())
    }

    #[test]
    fn append_preserves_order() {
        let mut accumulator = Accumulator::new();
        accumulator.append(v4(3));
        accumulator.append(v4(1));
        accumulator.append(v4(2));
        assert_eq!(accumulator.as_slice(), [v4(3), v4(1), v4(2)]);
    }

    #[test]
    fn append_beyond_capacity_is_dropped() {
        let mut accumulator: Accumulator = (0..MAX_ENTRIES as u8).map(v4).collect();
        assert!(accumulator.is_full());
        accumulator.append(v4(200));
        assert_eq!(accumulator.len(), MAX_ENTRIES);
        assert!(!accumulator.iter().any(|r| *r == v4(200)));
        assert_eq!(accumulator.as_slice().last(), Some(&v4(MAX_ENTRIES as u8 - 1)));
    }

    #[test]
    fn iter_family_filters() {
        let mut accumulator = Accumulator::new();
        accumulator.append(v4(1));
        accumulator.append(AddressResult::scoped(Ipv6Addr::LOCALHOST, 2));
        accumulator.append(v4(2));
        assert_eq!(accumulator.iter_family(Family::Inet).count(), 2);
        let v6: Vec<_> = accumulator.iter_family(Family::Inet6).collect();
        assert_eq!(v6.len(), 1);
        assert_eq!(v6[0].scope_id, 2);
    }

    #[test]
    fn display_includes_scope_id() {
        let scoped = AddressResult::scoped(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1), 3);
        assert_eq!(scoped.to_string(), "fe80::1%3");
        assert_eq!(v4(7).to_string(), "192.0.2.7");
    }

    #[test]
    fn clear_empties() {
        let mut accumulator: Accumulator = [v4(1), v4(2)].into_iter().collect();
        assert!(!accumulator.is_empty());
        accumulator.clear();
        assert!(accumulator.is_empty());
    }
}
