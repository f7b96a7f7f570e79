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

//! Construction of `struct hostent`-shaped lookup results.
//!
//! A host-lookup module reports its results to the resolving process as
//! a `struct hostent`: an official name, a null-terminated list of
//! aliases, the address family and length, and a null-terminated list
//! of pointers to raw addresses. All of the pointed-to data must live in
//! the buffer the process supplied with the request.
//!
//! The builders in this module lay out such a record in an [`Arena`]
//! and return a [`HostEntry`] that borrows from the arena's buffer. The
//! record can be read back through the [`HostEntry`] accessors or turned
//! into a [`libc::hostent`] with [`HostEntry::to_hostent`].
//!
//! If the arena runs out of space at any step, building stops and
//! [`Error::BufferTooSmall`] is returned. Whatever was allocated up to
//! that point is garbage; the caller is expected to retry the whole
//! lookup with a larger buffer.

use std::ffi::CStr;
use std::fmt;
use std::net::IpAddr;
use std::os::raw::{c_char, c_int};
use std::slice;
use std::str::FromStr;

use crate::arena::Arena;
use crate::util::Caseless;

mod accumulator;

pub use accumulator::{Accumulator, AddressResult, MAX_ENTRIES};

////////////////////////////////////////////////////////////////////////
// ADDRESS FAMILIES                                                   //
////////////////////////////////////////////////////////////////////////

/// The address family of a lookup result.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Family {
    Inet,
    Inet6,
}

impl Family {
    /// Returns the length in bytes of an address of this family.
    pub fn address_len(self) -> usize {
        match self {
            Self::Inet => 4,
            Self::Inet6 => 16,
        }
    }

    /// Returns the family of `address`.
    pub fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::Inet,
            IpAddr::V6(_) => Self::Inet6,
        }
    }
}

impl TryFrom<c_int> for Family {
    type Error = IntoFamilyError;

    fn try_from(value: c_int) -> Result<Self, Self::Error> {
        match value {
            libc::AF_INET => Ok(Self::Inet),
            libc::AF_INET6 => Ok(Self::Inet6),
            _ => Err(IntoFamilyError),
        }
    }
}

impl From<Family> for c_int {
    fn from(family: Family) -> Self {
        match family {
            Family::Inet => libc::AF_INET,
            Family::Inet6 => libc::AF_INET6,
        }
    }
}

impl FromStr for Family {
    type Err = IntoFamilyError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = Caseless(text);
        if ["inet", "ipv4", "4"].iter().any(|s| text == Caseless(s)) {
            Ok(Self::Inet)
        } else if ["inet6", "ipv6", "6"].iter().any(|s| text == Caseless(s)) {
            Ok(Self::Inet6)
        } else {
            Err(IntoFamilyError)
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Inet => f.write_str("inet"),
            Self::Inet6 => f.write_str("inet6"),
        }
    }
}

/// An error signaling that a value does not name a supported address
/// family.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IntoFamilyError;

impl fmt::Display for IntoFamilyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("not a supported address family")
    }
}

impl std::error::Error for IntoFamilyError {}

////////////////////////////////////////////////////////////////////////
// HOST ENTRIES                                                       //
////////////////////////////////////////////////////////////////////////

/// A lookup result laid out in an [`Arena`] in the shape of a
/// `struct hostent`.
///
/// The alias list is always present and always empty (just its null
/// terminator). The address list holds one pointer per address followed
/// by a null terminator; addresses appear in the order they were given
/// to the builder.
#[derive(Clone, Copy, Debug)]
pub struct HostEntry<'a> {
    name: &'a CStr,
    aliases: &'a [*mut c_char],
    family: Family,
    address_len: usize,
    addr_list: &'a [*mut c_char],
}

impl<'a> HostEntry<'a> {
    /// Returns the official name.
    pub fn name(&self) -> &'a CStr {
        self.name
    }

    /// Returns an iterator over the aliases. (There never are any, but
    /// the list is walked the way a C consumer would walk it.)
    pub fn aliases(&self) -> impl Iterator<Item = &'a CStr> + 'a {
        let aliases = self.aliases;
        aliases
            .iter()
            .take_while(|p| !p.is_null())
            // SAFETY: non-null alias slots only ever hold pointers to
            // NUL-terminated strings in the arena.
            .map(|&p| unsafe { CStr::from_ptr(p) })
    }

    /// Returns the address family.
    pub fn family(&self) -> Family {
        self.family
    }

    /// Returns the length in bytes of each address.
    pub fn address_len(&self) -> usize {
        self.address_len
    }

    /// Returns an iterator over the raw addresses.
    pub fn addresses(&self) -> Addresses<'a> {
        let addr_list = self.addr_list;
        Addresses {
            slots: addr_list.iter(),
            len: self.address_len,
        }
    }

    /// Returns a [`libc::hostent`] pointing at this record.
    ///
    /// The returned structure borrows the arena's buffer without a
    /// lifetime; the buffer must outlive every use of it, and consumers
    /// must not write through its pointers.
    pub fn to_hostent(&self) -> libc::hostent {
        libc::hostent {
            h_name: self.name.as_ptr().cast_mut(),
            h_aliases: self.aliases.as_ptr().cast_mut(),
            h_addrtype: self.family.into(),
            h_length: c_int::try_from(self.address_len).unwrap_or(c_int::MAX),
            h_addr_list: self.addr_list.as_ptr().cast_mut(),
        }
    }
}

/// An iterator over the addresses of a [`HostEntry`].
#[derive(Clone, Debug)]
pub struct Addresses<'a> {
    slots: slice::Iter<'a, *mut c_char>,
    len: usize,
}

impl<'a> Iterator for Addresses<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let &slot = self.slots.next()?;
        if slot.is_null() {
            None
        } else {
            // SAFETY: non-null address slots only ever hold pointers to
            // arena allocations of exactly len bytes, which live as
            // long as 'a.
            Some(unsafe { slice::from_raw_parts(slot.cast::<u8>(), self.len) })
        }
    }
}

////////////////////////////////////////////////////////////////////////
// BUILDERS                                                           //
////////////////////////////////////////////////////////////////////////

/// Builds a record holding a single address.
///
/// The address length is taken verbatim from `address`; it is not
/// checked against `family`.
pub fn build_single<'a>(
    arena: &mut Arena<'a>,
    name: &str,
    address: &[u8],
    family: Family,
) -> Result<HostEntry<'a>, Error> {
    let aliases = arena.alloc_pointers(1).ok_or(Error::BufferTooSmall)?;
    let name = arena.strdup(name).ok_or(Error::BufferTooSmall)?;

    // One address plus the terminator, which alloc_pointers leaves
    // null.
    let addr_list = arena.alloc_pointers(2).ok_or(Error::BufferTooSmall)?;
    let copy = arena.alloc(address.len()).ok_or(Error::BufferTooSmall)?;
    copy.copy_from_slice(address);
    addr_list[0] = copy.as_mut_ptr().cast();

    Ok(HostEntry {
        name,
        aliases,
        family,
        address_len: address.len(),
        addr_list,
    })
}

/// Builds a record holding the addresses of `family` collected in
/// `accumulator`, in the order they were appended. Addresses of the
/// other family are left out.
pub fn build_from_accumulator<'a>(
    arena: &mut Arena<'a>,
    accumulator: &Accumulator,
    name: &str,
    family: Family,
) -> Result<HostEntry<'a>, Error> {
    let address_len = family.address_len();
    let aliases = arena.alloc_pointers(1).ok_or(Error::BufferTooSmall)?;
    let name = arena.strdup(name).ok_or(Error::BufferTooSmall)?;

    let count = accumulator.iter_family(family).count();
    if count < accumulator.len() {
        log::trace!(
            "leaving {} non-{} address(es) out of the record for {}",
            accumulator.len() - count,
            family,
            name.to_string_lossy(),
        );
    }
    let addr_list = arena
        .alloc_pointers(count + 1)
        .ok_or(Error::BufferTooSmall)?;
    for (slot, result) in addr_list.iter_mut().zip(accumulator.iter_family(family)) {
        let copy = arena.alloc(address_len).ok_or(Error::BufferTooSmall)?;
        match result.address {
            IpAddr::V4(a) => copy.copy_from_slice(&a.octets()),
            IpAddr::V6(a) => copy.copy_from_slice(&a.octets()),
        }
        *slot = copy.as_mut_ptr().cast();
    }

    Ok(HostEntry {
        name,
        aliases,
        family,
        address_len,
        addr_list,
    })
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error that may occur while building a [`HostEntry`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The arena ran out of space. Retrying with a larger buffer may
    /// succeed.
    BufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::BufferTooSmall => f.write_str("the result buffer is too small"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::arena::ALIGNMENT;

    #[repr(C, align(16))]
    struct Aligned<const N: usize>([u8; N]);

    #[test]
    fn single_address_record_has_hostent_shape() {
        let mut storage = Aligned([0xff; 256]);
        let mut arena = Arena::new(&mut storage.0);
        let entry =
            build_single(&mut arena, "foo.local", &[192, 168, 1, 1], Family::Inet).unwrap();

        assert_eq!(entry.name().to_bytes(), b"foo.local");
        assert_eq!(entry.aliases().count(), 0);
        assert_eq!(entry.family(), Family::Inet);
        assert_eq!(entry.address_len(), 4);
        let addresses: Vec<&[u8]> = entry.addresses().collect();
        assert_eq!(addresses, [&[192u8, 168, 1, 1][..]]);
    }

    #[test]
    fn raw_hostent_lists_are_null_terminated() {
        let mut storage = Aligned([0xff; 256]);
        let mut arena = Arena::new(&mut storage.0);
        let entry =
            build_single(&mut arena, "foo.local", &[10, 0, 0, 1], Family::Inet).unwrap();
        let raw = entry.to_hostent();

        assert_eq!(raw.h_addrtype, libc::AF_INET);
        assert_eq!(raw.h_length, 4);
        unsafe {
            assert_eq!(CStr::from_ptr(raw.h_name).to_bytes(), b"foo.local");
            assert!((*raw.h_aliases).is_null());
            let first = *raw.h_addr_list;
            assert_eq!(slice::from_raw_parts(first.cast::<u8>(), 4), [10u8, 0, 0, 1]);
            assert!((*raw.h_addr_list.add(1)).is_null());
        }
    }

    #[test]
    fn accumulated_addresses_keep_insertion_order() {
        let a = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
        let b = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 2);
        let c = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 3);
        let mut accumulator = Accumulator::new();
        for address in [a, b, c] {
            accumulator.append(AddressResult::new(address.into()));
        }

        let mut storage = Aligned([0; 512]);
        let mut arena = Arena::new(&mut storage.0);
        let entry =
            build_from_accumulator(&mut arena, &accumulator, "host.local", Family::Inet6).unwrap();

        assert_eq!(entry.address_len(), 16);
        let addresses: Vec<&[u8]> = entry.addresses().collect();
        assert_eq!(addresses, [&a.octets()[..], &b.octets()[..], &c.octets()[..]]);
        assert_eq!(entry.to_hostent().h_addr_list as usize % ALIGNMENT, 0);
    }

    #[test]
    fn accumulator_records_only_include_requested_family() {
        let mut accumulator = Accumulator::new();
        accumulator.append(AddressResult::new(Ipv4Addr::new(192, 0, 2, 1).into()));
        accumulator.append(AddressResult::new(Ipv6Addr::LOCALHOST.into()));
        accumulator.append(AddressResult::new(Ipv4Addr::new(192, 0, 2, 2).into()));

        let mut storage = Aligned([0; 256]);
        let mut arena = Arena::new(&mut storage.0);
        let entry =
            build_from_accumulator(&mut arena, &accumulator, "h.local", Family::Inet).unwrap();
        let addresses: Vec<&[u8]> = entry.addresses().collect();
        assert_eq!(addresses, [&[192u8, 0, 2, 1][..], &[192u8, 0, 2, 2][..]]);

        let entry =
            build_from_accumulator(&mut arena, &accumulator, "h.local", Family::Inet6).unwrap();
        let addresses: Vec<&[u8]> = entry.addresses().collect();
        assert_eq!(addresses, [&Ipv6Addr::LOCALHOST.octets()[..]]);
    }

    #[test]
    fn empty_accumulator_yields_empty_address_list() {
        let mut storage = Aligned([0; 128]);
        let mut arena = Arena::new(&mut storage.0);
        let entry =
            build_from_accumulator(&mut arena, &Accumulator::new(), "h.local", Family::Inet)
                .unwrap();
        assert_eq!(entry.addresses().count(), 0);
        assert!(unsafe { (*entry.to_hostent().h_addr_list).is_null() });
    }

    #[test]
    fn small_buffers_fail_at_every_step() {
        let mut accumulator = Accumulator::new();
        accumulator.append(AddressResult::new(Ipv4Addr::new(192, 0, 2, 1).into()));
        accumulator.append(AddressResult::new(Ipv4Addr::new(192, 0, 2, 2).into()));

        let build_in = |size: usize| {
            let mut storage = Aligned([0; 256]);
            let mut arena = Arena::new(&mut storage.0[..size]);
            let built = build_from_accumulator(&mut arena, &accumulator, "foo.local", Family::Inet);
            built.map(|_| ())
        };

        // Every buffer smaller than the smallest one that fits must
        // fail cleanly, and every larger one must succeed.
        let first_fit = (0..=256).find(|&size| build_in(size).is_ok()).unwrap();
        assert!(first_fit > 0);
        for size in 0..first_fit {
            assert_eq!(build_in(size), Err(Error::BufferTooSmall));
        }
        for size in first_fit..=256 {
            assert_eq!(build_in(size), Ok(()));
        }
    }

    #[test]
    fn single_record_reports_exhaustion() {
        let mut storage = Aligned([0; 16]);
        let mut arena = Arena::new(&mut storage.0);
        assert_eq!(
            build_single(&mut arena, "foo.local", &[192, 168, 1, 1], Family::Inet).unwrap_err(),
            Error::BufferTooSmall,
        );
    }

    #[test]
    fn family_conversions() {
        assert_eq!(Family::try_from(libc::AF_INET6), Ok(Family::Inet6));
        assert_eq!(c_int::from(Family::Inet), libc::AF_INET);
        assert!(Family::try_from(libc::AF_UNIX).is_err());
        assert_eq!("IPv6".parse::<Family>(), Ok(Family::Inet6));
        assert_eq!("inet".parse::<Family>(), Ok(Family::Inet));
        assert!("ipx".parse::<Family>().is_err());
    }
}
