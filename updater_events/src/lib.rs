//! TraceLogging provider for the desktop updater. The actual provider
//! definition lives in `events_template.rs`; build.rs patches the provider
//! group GUID into it and we include the result here.
include!(concat!(env!("OUT_DIR"), "/mangled_events.rs"));
