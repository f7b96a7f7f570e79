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

//! Name-service switch (NSS) status reporting.
//!
//! A host-lookup module reports three things to the resolving process:
//! an [`Status`] return value, an `errno` value, and an `h_errno` value.
//! The combination tells the caller whether the lookup succeeded,
//! whether the name does not exist, or whether it should retry (for
//! example with a larger buffer, signaled by `ERANGE`).
//!
//! The functions here wrap the [`hostent`](crate::hostent) builders in
//! that calling convention: they build a record in the caller's buffer,
//! fill in the caller's `struct hostent`, and set the error outputs on
//! failure.

use std::fmt;
use std::os::raw::c_int;

use crate::arena::Arena;
use crate::hostent::{self, Accumulator, Family, HostEntry};

/// `h_errno`: a non-recoverable error.
pub const NO_RECOVERY: c_int = 3;

////////////////////////////////////////////////////////////////////////
// STATUSES                                                           //
////////////////////////////////////////////////////////////////////////

/// The return value of an NSS lookup function (`enum nss_status`).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    /// The lookup failed temporarily, or the buffer was too small.
    TryAgain,
    /// The service is not available.
    Unavail,
    /// The name does not exist.
    NotFound,
    Success,
    Return,
}

impl TryFrom<c_int> for Status {
    type Error = IntoStatusError;

    fn try_from(value: c_int) -> Result<Self, Self::Error> {
        match value {
            -2 => Ok(Self::TryAgain),
            -1 => Ok(Self::Unavail),
            0 => Ok(Self::NotFound),
            1 => Ok(Self::Success),
            2 => Ok(Self::Return),
            _ => Err(IntoStatusError),
        }
    }
}

impl From<Status> for c_int {
    fn from(status: Status) -> Self {
        match status {
            Status::TryAgain => -2,
            Status::Unavail => -1,
            Status::NotFound => 0,
            Status::Success => 1,
            Status::Return => 2,
        }
    }
}

/// An error signaling that the provided value is not a valid NSS
/// status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IntoStatusError;

impl fmt::Display for IntoStatusError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("not a valid NSS status")
    }
}

impl std::error::Error for IntoStatusError {}

////////////////////////////////////////////////////////////////////////
// HOSTENT OUTPUT                                                     //
////////////////////////////////////////////////////////////////////////

/// Builds a single-address record in `buffer` and stores it in
/// `result`.
///
/// On success, `result` points into `buffer`, which must outlive every
/// use of `result`. If `buffer` is too small, `errnop` is set to
/// `ERANGE`, `h_errnop` to [`NO_RECOVERY`], and [`Status::TryAgain`] is
/// returned; `result` is left untouched.
pub fn hostent_from_address(
    name: &str,
    address: &[u8],
    family: Family,
    result: &mut libc::hostent,
    buffer: &mut [u8],
    errnop: &mut c_int,
    h_errnop: &mut c_int,
) -> Status {
    let mut arena = Arena::new(buffer);
    let built = hostent::build_single(&mut arena, name, address, family);
    store(built, result, errnop, h_errnop)
}

/// Builds a record of the `family` addresses in `accumulator` and
/// stores it in `result`. Error reporting is as for
/// [`hostent_from_address`].
pub fn hostent_from_accumulator(
    accumulator: &Accumulator,
    name: &str,
    family: Family,
    result: &mut libc::hostent,
    buffer: &mut [u8],
    errnop: &mut c_int,
    h_errnop: &mut c_int,
) -> Status {
    let mut arena = Arena::new(buffer);
    let built = hostent::build_from_accumulator(&mut arena, accumulator, name, family);
    store(built, result, errnop, h_errnop)
}

fn store(
    built: Result<HostEntry, hostent::Error>,
    result: &mut libc::hostent,
    errnop: &mut c_int,
    h_errnop: &mut c_int,
) -> Status {
    match built {
        Ok(entry) => {
            *result = entry.to_hostent();
            Status::Success
        }
        Err(hostent::Error::BufferTooSmall) => {
            *errnop = libc::ERANGE;
            *h_errnop = NO_RECOVERY;
            Status::TryAgain
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;
    use std::net::Ipv4Addr;
    use std::ptr;
    use std::slice;

    use super::*;
    use crate::hostent::AddressResult;

    fn empty_hostent() -> libc::hostent {
        libc::hostent {
            h_name: ptr::null_mut(),
            h_aliases: ptr::null_mut(),
            h_addrtype: 0,
            h_length: 0,
            h_addr_list: ptr::null_mut(),
        }
    }

    #[test]
    fn status_values_match_glibc() {
        assert_eq!(c_int::from(Status::TryAgain), -2);
        assert_eq!(c_int::from(Status::Success), 1);
        assert_eq!(Status::try_from(0), Ok(Status::NotFound));
        assert!(Status::try_from(7).is_err());
    }

    #[test]
    fn success_fills_hostent() {
        let mut buffer = [0u8; 256];
        let mut result = empty_hostent();
        let (mut errno, mut h_errno) = (0, 0);
        let status = hostent_from_address(
            "foo.local",
            &[192, 168, 1, 1],
            Family::Inet,
            &mut result,
            &mut buffer,
            &mut errno,
            &mut h_errno,
        );

        assert_eq!(status, Status::Success);
        assert_eq!((errno, h_errno), (0, 0));
        assert_eq!(result.h_addrtype, libc::AF_INET);
        assert_eq!(result.h_length, 4);
        unsafe {
            assert_eq!(CStr::from_ptr(result.h_name).to_bytes(), b"foo.local");
            let address = slice::from_raw_parts((*result.h_addr_list).cast::<u8>(), 4);
            assert_eq!(address, [192u8, 168, 1, 1]);
        }
    }

    #[test]
    fn small_buffer_asks_caller_to_retry() {
        let accumulator: Accumulator = [AddressResult::new(Ipv4Addr::LOCALHOST.into())]
            .into_iter()
            .collect();
        let mut buffer = [0u8; 8];
        let mut result = empty_hostent();
        let (mut errno, mut h_errno) = (0, 0);
        let status = hostent_from_accumulator(
            &accumulator,
            "foo.local",
            Family::Inet,
            &mut result,
            &mut buffer,
            &mut errno,
            &mut h_errno,
        );

        assert_eq!(status, Status::TryAgain);
        assert_ne!(status, Status::NotFound);
        assert_eq!(errno, libc::ERANGE);
        assert_eq!(h_errno, NO_RECOVERY);
        assert!(result.h_name.is_null());
    }
}
