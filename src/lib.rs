//! A pure receive-path TCP protocol engine.
//!
//! This library implements the input side of TCP: given a parsed segment
//! arriving on an established or potential connection, it decides how the
//! connection state mutates and which reply segment, if any, to emit. It is
//! the piece that sits between segment decode and the transmit path:
//!
//! * the connection state machine over passive and active opens, data
//!   transfer and the four-way close;
//! * the segment acceptance rules: flag-combination legality, sequence-window
//!   containment, ACK validation and the RST/challenge-ACK policy of
//!   RFC 5961;
//! * the transition bookkeeping that keeps the per-connection control block
//!   (windows, scaling, RTT samples, timer disposition, MSS) consistent for
//!   the output and timer subsystems downstream.
//!
//! Everything here is a total function from `(state, now, segment)` to
//! `(state, reply)`. Nothing blocks, nothing schedules and nothing panics on
//! adversarial input; timers are opaque handles consumed elsewhere and the
//! reassembly queue is deliberately absent, so out-of-order data is dropped.
//!
//! ## Structure
//!
//! The [`wire`] module provides the octet-level representation: sequence
//! numbers with modular comparison, flag sets, option parsing and checksums.
//! The [`layer::tcp`] module holds the engine itself; its [`Endpoint`] owns
//! the listener set, the connection map and the initial-sequence-number
//! source, and exposes the single entry point [`Endpoint::handle`].
//!
//! [`wire`]: wire/index.html
//! [`layer::tcp`]: layer/tcp/index.html
//! [`Endpoint`]: layer/tcp/struct.Endpoint.html
//! [`Endpoint::handle`]: layer/tcp/struct.Endpoint.html#method.handle
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

extern crate alloc;

#[macro_use] mod macros;
pub mod layer;
pub mod time;
pub mod wire;
