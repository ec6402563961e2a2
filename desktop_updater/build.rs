use embed_manifest::embed_manifest_file;
use {
    std::{env, io},
    winres::WindowsResource,
};

/// `ProductVersion` is `<crate version>+<build number>`. The updater reads the
/// part after the `+` back at runtime to tell which build it is.
fn product_version() -> String {
    let build_number = env::var("DESKTOP_UPDATER_BUILD_NUMBER").unwrap_or_else(|_| "1".to_owned());
    format!("{}+{}", env::var("CARGO_PKG_VERSION").unwrap(), build_number)
}

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=desktop_updater.manifest");
    println!("cargo:rerun-if-env-changed=DESKTOP_UPDATER_BUILD_NUMBER");

    if env::var_os("CARGO_CFG_WINDOWS").is_some() {
        embed_manifest_file("desktop_updater.manifest").expect("Failed to embed manifest");

        // Let winres generate the VERSIONINFO block, we only override the
        // product version string.
        WindowsResource::new()
            .set("ProductName", "Desktop Updater")
            .set("FileDescription", "Desktop application self-updater")
            .set("ProductVersion", &product_version())
            .compile()?;
    }
    Ok(())
}
