//! # Parley
//!
//! `parley` is the backend of a small chat service. Users sign in through a
//! third-party identity provider (Google OAuth2 authorization-code flow) and
//! receive the service's own session credentials: a short-lived access token
//! presented on every call and a long-lived refresh token that rotates on each
//! reissue. The server tracks the single valid refresh token per principal, so
//! a superseded token can never be replayed.
//!
//! The same access token gates the streaming surface: a websocket session is
//! authenticated exactly once, on the CONNECT frame that opens it, before any
//! subscribe or publish frame is processed.

pub mod api;
pub mod auth;
pub mod chat;
pub mod cli;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
