//! Build script to generate the C header file using cbindgen.

use std::env;
use std::path::PathBuf;

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let output_dir = PathBuf::from(&crate_dir).join("include");

    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        println!("cargo:warning=could not create {}: {e}", output_dir.display());
        return;
    }

    let config = cbindgen::Config::from_file("cbindgen.toml").unwrap_or_default();

    // A header that fails to generate must not break the library build.
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .with_language(cbindgen::Language::C)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(output_dir.join("arlffi.h"));
        }
        Err(e) => println!("cargo:warning=unable to generate C bindings: {e}"),
    }
}
