fn main() {
    #[cfg(feature = "ndi")]
    sdk::link_and_generate();
}

#[cfg(feature = "ndi")]
mod sdk {
    use std::env;
    use std::path::{Path, PathBuf};

    pub fn link_and_generate() {
        println!("cargo:rerun-if-env-changed=NDI_SDK_DIR");

        // Determine the base NDI SDK directory.
        let ndi_sdk_path = env::var("NDI_SDK_DIR").unwrap_or_else(|_| {
            if cfg!(unix) {
                let advanced = "/usr/share/NDI Advanced SDK for Linux";
                let standard = "/usr/share/NDI SDK for Linux";
                if Path::new(advanced).exists() {
                    advanced.to_string()
                } else {
                    standard.to_string()
                }
            } else if cfg!(windows) {
                "C:\\Program Files\\NDI SDK for Windows".to_string()
            } else {
                panic!("Unsupported platform, please set NDI_SDK_DIR manually.");
            }
        });

        let is_advanced = cfg!(unix) && ndi_sdk_path.to_lowercase().contains("advanced");

        let ndi_include_path = format!("{}/include", ndi_sdk_path);
        let main_header = format!("{}/Processing.NDI.Lib.h", ndi_include_path);

        let (lib_name, link_type) = if cfg!(unix) {
            if is_advanced {
                ("ndi_advanced", "dylib")
            } else {
                ("ndi", "dylib")
            }
        } else if cfg!(windows) {
            let target = env::var("TARGET").expect("TARGET environment variable not set");
            if target.contains("x86_64") {
                ("Processing.NDI.Lib.x64", "static")
            } else {
                ("Processing.NDI.Lib.x86", "static")
            }
        } else {
            panic!("Unsupported platform");
        };

        if cfg!(windows) {
            let target = env::var("TARGET").expect("TARGET environment variable not set");
            let lib_subdir = if target.contains("x86_64") {
                "x64"
            } else {
                "x86"
            };
            println!(
                "cargo:rustc-link-search=native={}\\lib\\{}",
                ndi_sdk_path, lib_subdir
            );
        }

        println!("cargo:rustc-link-lib={}={}", link_type, lib_name);

        // Only the receive, find and runtime entry points are needed.
        let bindings = bindgen::Builder::default()
            .header(main_header)
            .clang_arg(format!("-I{}", ndi_include_path))
            .allowlist_function("NDIlib_(initialize|destroy|version|is_supported_CPU)")
            .allowlist_function("NDIlib_find_.*")
            .allowlist_function("NDIlib_recv_.*")
            .allowlist_type("NDIlib_.*")
            .allowlist_var("NDIlib_.*")
            .derive_default(true)
            .generate()
            .expect("Unable to generate bindings");

        let out_path =
            PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR environment variable not set"));
        bindings
            .write_to_file(out_path.join("ndi_lib.rs"))
            .expect("Couldn't write bindings!");
    }
}
