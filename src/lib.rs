//! LED controller served over a WiFi access point
//!
//! The HTTP core (request reading, routing, response writing) is hardware
//! independent and builds on the host. The radio, DHCP and socket glue in
//! [`net`] only exists in the `device` build.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod page;
pub mod query;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

#[cfg(feature = "device")]
pub mod net;
