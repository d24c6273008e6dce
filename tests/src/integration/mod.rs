//! Integration tests against the mock daemon.

mod routing;
mod scenarios;
