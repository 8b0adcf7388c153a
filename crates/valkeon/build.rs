// build.rs
// Compiles the demo GLSL sources to SPIR-V with glslc from the Vulkan SDK

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_STAGES: [&str; 6] = ["vert", "frag", "comp", "geom", "tesc", "tese"];

fn is_stale(source: &Path, output: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

fn compile_dir(shader_dir: &Path, target_dir: &Path, glslc: &Path, compiled: &mut u32) {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            compile_dir(&path, target_dir, glslc, compiled);
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !SHADER_STAGES.contains(&ext) {
            continue;
        }

        // triangle.vert -> triangle.vert.spv so both stages of a pair can coexist
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let mut out_name = file_name.to_os_string();
        out_name.push(".spv");
        let out_file = target_dir.join(out_name);

        if !is_stale(&path, &out_file) {
            eprintln!("info: Shader {:?} is up to date", file_name);
            continue;
        }

        let status = Command::new(glslc)
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status();

        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?} -> {:?}", file_name, out_file);
                *compiled += 1;
            }
            Ok(s) => {
                panic!("glslc failed for {:?} with exit code {}", path, s.code().unwrap_or(-1));
            }
            Err(e) => {
                panic!("Failed to run glslc for {:?}: {}", path, e);
            }
        }
    }
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let workspace_root = manifest_dir.join("../..");
    let shader_dir = workspace_root.join("resources/shaders");
    let target_dir = workspace_root.join("target/shaders");

    println!("cargo:rerun-if-changed={}", shader_dir.display());
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK, or compile resources/shaders by hand");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        Path::new(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        Path::new(&vulkan_sdk).join("bin").join("glslc")
    };

    if !glslc.exists() {
        panic!("glslc not found at {:?}; check the Vulkan SDK installation", glslc);
    }

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {:?}: {}", target_dir, e);
        return;
    }

    let mut compiled = 0;
    compile_dir(&shader_dir, &target_dir, &glslc, &mut compiled);

    if compiled > 0 {
        eprintln!("info: Successfully compiled {} shader(s)", compiled);
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
