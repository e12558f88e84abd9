use std::fs;
use std::process::Command;

use tempfile::TempDir;

const VALID_SHADER: &str = "\
#version 300 es
precision mediump float;
uniform vec4 userParam;
uniform uvec2 viewportSize;
uniform float time;
uniform sampler2D userTexture;
in vec2 texcoord;
out vec4 fragColor;
void main() {
    vec2 pixel = gl_FragCoord.xy / vec2(viewportSize);
    fragColor = texture(userTexture, texcoord) * userParam.w + vec4(pixel, fract(time), 0.0);
}
";

const BROKEN_SHADER: &str = "\
#version 300 es
precision mediump float;
in vec2 texcoord;
out vec4 fragColor;
void main() {
    fragColor = vec4(texcoord, 0.0 1.0);
}
";

const MISMATCHED_SHADER: &str = "\
#version 300 es
precision mediump float;
in vec3 texcoord;
out vec4 fragColor;
void main() {
    fragColor = vec4(texcoord, 1.0);
}
";

fn fragbox() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_fragbox"));
    command.env("RUST_LOG", "error");
    command
}

#[test]
fn check_accepts_valid_shader() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("valid.frag");
    fs::write(&path, VALID_SHADER).unwrap();

    let output = fragbox()
        .args(["check", "--shader-compiler", "naga"])
        .arg(&path)
        .output()
        .expect("failed to run fragbox check");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "Compiled");
}

#[test]
fn check_reports_compile_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.frag");
    fs::write(&path, BROKEN_SHADER).unwrap();

    let output = fragbox()
        .args(["check", "--shader-compiler", "naga"])
        .arg(&path)
        .output()
        .expect("failed to run fragbox check");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut lines = stderr.lines();
    assert_eq!(lines.next(), Some("Compile Failed"));
    assert!(lines.any(|line| !line.trim().is_empty()));
}

#[test]
fn check_reports_link_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mismatch.frag");
    fs::write(&path, MISMATCHED_SHADER).unwrap();

    let output = fragbox()
        .args(["check", "--shader-compiler", "naga"])
        .arg(&path)
        .output()
        .expect("failed to run fragbox check");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Linking Failed"), "stderr: {stderr}");
}

#[test]
fn check_fails_on_missing_file() {
    let dir = TempDir::new().unwrap();
    let output = fragbox()
        .arg("check")
        .arg(dir.path().join("missing.frag"))
        .output()
        .expect("failed to run fragbox check");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read shader"), "stderr: {stderr}");
}

#[test]
fn invalid_config_fails_before_opening_a_window() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "size = [0, 0]\n").unwrap();

    let output = fragbox()
        .arg("--config")
        .arg(&config)
        .arg("--no-stdin")
        .output()
        .expect("failed to run fragbox");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid configuration"), "stderr: {stderr}");
}

#[test]
fn environment_config_must_exist() {
    let dir = TempDir::new().unwrap();
    let output = fragbox()
        .env("FRAGBOX_CONFIG", dir.path().join("absent.toml"))
        .arg("--no-stdin")
        .output()
        .expect("failed to run fragbox");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read configuration"), "stderr: {stderr}");
}
