//!
//! @file build.rs
//! @author Gothic Free Aim Developers
//! @brief Embeds the version resource of the free aim plugin.
//! @bug No known bugs.
//!

const RC_AUTHOR: &str = "Gothic Free Aim Developers";
const RC_NAME: &str = "Gothic Free Aim";
const RC_VERSION: &str = "1.2.0.0";
const RC_FILE: &str = "FreeAim.dll";

fn main() {
    // Resources only mean something to the game's loader.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    let mut res = winres::WindowsResource::new();
    res.set("CompanyName", RC_AUTHOR);
    res.set("FileDescription", RC_NAME);
    res.set("FileVersion", RC_VERSION);
    res.set("InternalName", RC_FILE);
    res.set("LegalCopyright", "Copyright (C) 2026 Gothic Free Aim Developers");
    res.set("OriginalFilename", RC_FILE);
    res.set("ProductName", RC_NAME);
    res.set("ProductVersion", RC_VERSION);
    if let Err(e) = res.compile() {
        println!("cargo:warning=Could not embed version resource: {}", e);
    }
}
