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

//! Result construction and name authorization for an mDNS host-lookup
//! backend.
//!
//! This crate implements the pieces of a name-service module that have
//! to be right regardless of how multicast queries are actually sent:
//!
//! * [`arena`]: a bump allocator over a caller-supplied buffer, used to
//!   lay out lookup results without touching the heap;
//! * [`hostent`]: construction of `struct hostent`-shaped records in an
//!   [`Arena`](arena::Arena), from a single address or from an
//!   [`Accumulator`](hostent::Accumulator) of query results;
//! * [`nss`]: the status codes and `errno`/`h_errno` conventions that a
//!   resolving host process expects from such a module;
//! * [`policy`]: the allow-list and default `.local` policy deciding
//!   which names the backend may resolve at all; and
//! * [`soa`]: the probe for a unicast DNS zone that is authoritative for
//!   `local`, consulted by the default policy.

pub mod arena;
pub mod hostent;
pub mod nss;
pub mod policy;
pub mod soa;
pub mod util;
