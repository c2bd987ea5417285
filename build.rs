//! Build script: links `libespeak-ng` when the `espeak` feature is enabled.
//! Without the feature nothing is linked and the crate has no native
//! dependency besides ONNX Runtime.
//!
//! ## Lookup order
//!
//! | Step | Source                         | Notes                                  |
//! |------|--------------------------------|----------------------------------------|
//! | 1    | `ESPEAK_LIB_DIR`               | required when cross-compiling to mobile |
//! | 2    | `pkg-config espeak-ng`         | Homebrew pkgconfig dirs added on macOS |
//! | 3    | well-known library directories | multi-arch dir first on Linux          |
//!
//! A static `libespeak-ng.a` wins over the shared library at every step;
//! linking it statically also pulls in the C++ runtime.

use std::path::Path;
use std::process::Command;

const STATIC_LIB: &str = "libespeak-ng.a";

fn main() {
    println!("cargo:rerun-if-env-changed=ESPEAK_LIB_DIR");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");

    if std::env::var_os("CARGO_FEATURE_ESPEAK").is_none() {
        return;
    }

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if let Ok(dir) = std::env::var("ESPEAK_LIB_DIR") {
        link_dir(&dir, &target_os);
        return;
    }

    if matches!(&*target_os, "ios" | "android") {
        panic!(
            "\n\npiper-phonemize: ESPEAK_LIB_DIR must point at a libespeak-ng \
             built for {target_os} when the `espeak` feature is enabled.\n"
        );
    }

    if pkg_config(&target_os) {
        return;
    }

    for dir in search_dirs(&target_os, &target_arch) {
        let shared = if target_os == "macos" { "libespeak-ng.dylib" } else { "libespeak-ng.so" };
        if Path::new(&dir).join(STATIC_LIB).exists() || Path::new(&dir).join(shared).exists() {
            link_dir(&dir, &target_os);
            return;
        }
    }

    panic!(
        "\n\npiper-phonemize: libespeak-ng not found (needed by the `espeak` feature).\n\
         \n\
         \t  macOS   :  brew install espeak-ng\n\
         \t  Ubuntu  :  sudo apt install libespeak-ng-dev\n\
         \t  Alpine  :  apk add espeak-ng-dev\n\
         \n\
         or set ESPEAK_LIB_DIR=/path/to/lib\n\n"
    );
}

fn link_dir(dir: &str, target_os: &str) {
    println!("cargo:rustc-link-search=native={dir}");
    if Path::new(dir).join(STATIC_LIB).exists() {
        println!("cargo:rustc-link-lib=static=espeak-ng");
        let cxx = if target_os == "macos" { "c++" } else { "stdc++" };
        println!("cargo:rustc-link-lib=dylib={cxx}");
    } else {
        println!("cargo:rustc-link-lib=dylib=espeak-ng");
    }
}

/// Ask pkg-config; `true` if it knew the library and directives were emitted.
fn pkg_config(target_os: &str) -> bool {
    let mut paths: Vec<String> = Vec::new();
    if target_os == "macos" {
        for prefix in ["/opt/homebrew", "/usr/local"] {
            paths.push(format!("{prefix}/opt/espeak-ng/lib/pkgconfig"));
            paths.push(format!("{prefix}/lib/pkgconfig"));
        }
    }
    if let Ok(existing) = std::env::var("PKG_CONFIG_PATH") {
        paths.push(existing);
    }

    let output = Command::new("pkg-config")
        .args(["--libs", "espeak-ng"])
        .env("PKG_CONFIG_PATH", paths.join(":"))
        .output();
    let Ok(output) = output else { return false };
    if !output.status.success() {
        return false;
    }

    for flag in String::from_utf8_lossy(&output.stdout).split_whitespace() {
        if let Some(dir) = flag.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={dir}");
        } else if let Some(lib) = flag.strip_prefix("-l") {
            println!("cargo:rustc-link-lib=dylib={lib}");
        }
    }
    true
}

fn search_dirs(target_os: &str, target_arch: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    if target_os == "macos" {
        for prefix in ["/opt/homebrew", "/usr/local"] {
            dirs.push(format!("{prefix}/opt/espeak-ng/lib"));
            dirs.push(format!("{prefix}/lib"));
        }
    } else {
        if !target_arch.is_empty() {
            let abi = if target_arch == "arm" { "gnueabihf" } else { "gnu" };
            dirs.push(format!("/usr/lib/{target_arch}-linux-{abi}"));
        }
        dirs.extend(["/usr/lib64", "/usr/lib", "/usr/local/lib"].map(String::from));
    }
    dirs.retain(|d| Path::new(d).is_dir());
    dirs
}
