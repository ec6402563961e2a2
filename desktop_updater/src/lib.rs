//! Self-update orchestration for a Windows desktop application: get out of the
//! way of the files we're about to replace (elevating first if we have to),
//! then hand off to a batch script that copies the new build in and restarts
//! it.
//!
//! Embedders call [`api::check_for_elevated_update`] first thing at startup
//! and [`api::restart_app`] when the user asks to install the update.

pub mod api;
pub mod elevate_handler;
pub mod error;
pub mod helpers;
pub mod messages;
pub mod payload_locator;
pub mod platform;
pub mod process_inspector;
pub mod process_terminator;
pub mod script_emitter;
pub mod tracing;
pub mod update_handler;
#[cfg(windows)]
pub mod win32;

#[cfg(test)]
mod tests;
