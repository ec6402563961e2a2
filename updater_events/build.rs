use std::{io, path::Path};

// BODGY
//
// * As a part of the build process, we need to replace the fake provider
//   group GUID in our tracing lib with the real one.
// * This build script here will take the value out of the env var
//   UPDATER_TRACING_GUID, and replace the fake GUID in the events_template.rs
//   file with that one.
// * We'll write that file out to %OUT_DIR%/mangled_events.rs, and then include
//   _that mangled file_ in our lib.rs file.
fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/events_template.rs");
    println!("cargo:rerun-if-env-changed=UPDATER_TRACING_GUID");

    let input = std::fs::read_to_string("src/events_template.rs")?;
    let output = match std::env::var("UPDATER_TRACING_GUID") {
        Ok(guid) => {
            println!("UPDATER_TRACING_GUID: {}", guid);

            // Replace the fake guid (ffffffff-ffff-ffff-ffff-ffffffffffff) with this one.
            input.replace("ffffffff-ffff-ffff-ffff-ffffffffffff", &guid)
        }
        Err(_) => input,
    };

    let out_dir = std::env::var("OUT_DIR").map_err(io::Error::other)?;
    let path = Path::new(&out_dir).join("mangled_events.rs");
    std::fs::write(path.as_path(), output)
}
