//! Fake Gmail REST endpoint for integration testing
//!
//! An in-process HTTP/1.1 server that answers just the calls the archiver
//! makes:
//!
//! - `GET  /messages?labelIds=INBOX&pageToken=N` -- one page of inbox ids
//! - `POST /messages/{id}/modify` -- archive one message
//! - `POST /token` -- refresh-token grant
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, request parsing and routing
//! - `mailbox` -- inbox state, failure injection and request log

// Each test binary uses a different subset of the helpers
#![allow(dead_code)]

mod server;

pub use mailbox::Mailbox;
pub use server::FakeGmailServer;
