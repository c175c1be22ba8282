use std::{env, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("kernel.ld");

    println!("cargo:rerun-if-changed={}", ld.display());

    // The linker script only applies to the freestanding kernel image; host
    // builds (unit tests) link normally.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    }
}
