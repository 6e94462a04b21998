//! Streaming chat surface.
//!
//! Clients open a websocket and speak STOMP-style text frames over it. The
//! first frame must be CONNECT carrying a bearer access token in its header
//! block; [`gatekeeper`] verifies it exactly once, before any subscribe or
//! publish frame is processed. Delivery stays deliberately thin: an
//! in-process broadcast hub with one channel per destination.

pub mod frame;
pub mod gatekeeper;
pub mod hub;
pub mod socket;
