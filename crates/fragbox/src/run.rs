use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use renderer::{
    check_fragment, ParameterVector, SandboxInit, ShaderCompiler, StatusReport, ViewportSize,
    WgpuBackendOptions, WindowConfig, WindowHost, WrapMode,
};
use sandboxconfig::{SandboxConfig, WrapSetting};
use tracing_subscriber::EnvFilter;

use crate::cli::{CheckArgs, RunArgs};
use crate::inputs::{spawn_stdin_reader, FileWatcher};
use crate::paths::ConfigLocation;

/// Used when neither the CLI nor the config names a shader.
pub const DEFAULT_FRAGMENT: &str = "\
#version 300 es
precision mediump float;
uniform vec4 userParam;
uniform uvec2 viewportSize;
uniform float time;
uniform sampler2D userTexture;
in vec2 texcoord;
out vec4 fragColor;
void main() {
    vec2 uv = texcoord + userParam.xy * vec2(sin(time), cos(time));
    vec4 base = texture(userTexture, uv);
    fragColor = vec4(mix(base.rgb, vec3(userParam.z), 0.5 * userParam.z) * userParam.w, 1.0);
}
";

const CHECKER_SIZE: u32 = 256;
const CHECKER_CELL: u32 = 32;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Fully merged start-up settings: config file first, CLI flags on top.
#[derive(Debug, Clone)]
pub struct Settings {
    pub shader: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub size: ViewportSize,
    /// Debounce for the file watcher; `None` disables watching.
    pub watch_debounce: Option<Duration>,
    pub read_stdin: bool,
    pub param_step: f32,
    pub vsync: bool,
    pub compiler: ShaderCompiler,
    pub params: ParameterVector,
    pub wrap_x: WrapMode,
    pub wrap_y: WrapMode,
}

impl Settings {
    pub fn merge(config: SandboxConfig, args: &RunArgs) -> Self {
        let [width, height] = config.size;
        let (width, height) = args.size.unwrap_or((width, height));
        let watch_debounce = if args.no_watch {
            None
        } else {
            config.watch_debounce()
        };
        Self {
            shader: args.shader.clone().or(config.shader),
            image: args.image.clone().or(config.image),
            size: ViewportSize::new(width, height),
            watch_debounce,
            read_stdin: !args.no_stdin,
            param_step: config.param_step,
            vsync: config.vsync,
            compiler: args.shader_compiler.unwrap_or_default(),
            params: ParameterVector::new(
                config.params.x,
                config.params.y,
                config.params.z,
                config.params.w,
            ),
            wrap_x: wrap_mode(config.wrap.x),
            wrap_y: wrap_mode(config.wrap.y),
        }
    }
}

fn wrap_mode(setting: WrapSetting) -> WrapMode {
    match setting {
        WrapSetting::Repeat => WrapMode::Repeat,
        WrapSetting::Clamp => WrapMode::ClampToEdge,
        WrapSetting::Mirror => WrapMode::MirroredRepeat,
    }
}

fn load_config(args: &RunArgs) -> Result<SandboxConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => ConfigLocation::discover()?.existing(),
    };
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            SandboxConfig::load(&path)
                .with_context(|| format!("failed to load config {}", path.display()))
        }
        None => Ok(SandboxConfig::default()),
    }
}

fn load_shader(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read shader {}", path.display())),
        None => {
            tracing::info!("no shader configured; using built-in default");
            Ok(DEFAULT_FRAGMENT.to_string())
        }
    }
}

fn load_image(path: Option<&Path>) -> Result<DynamicImage> {
    match path {
        Some(path) => {
            image::open(path).with_context(|| format!("failed to load image {}", path.display()))
        }
        None => {
            tracing::info!("no image configured; using built-in checkerboard");
            Ok(checkerboard())
        }
    }
}

fn checkerboard() -> DynamicImage {
    let image = RgbaImage::from_fn(CHECKER_SIZE, CHECKER_SIZE, |x, y| {
        if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
            Rgba([230, 230, 230, 255])
        } else {
            Rgba([40, 40, 40, 255])
        }
    });
    DynamicImage::ImageRgba8(image)
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let settings = Settings::merge(config, &args);
    tracing::debug!(?settings, "resolved settings");

    let source = load_shader(settings.shader.as_deref())?;
    let image = load_image(settings.image.as_deref())?;

    let mut init = SandboxInit::new(source, image);
    init.params = settings.params;
    init.wrap_x = settings.wrap_x;
    init.wrap_y = settings.wrap_y;

    let host = WindowHost::new(WindowConfig {
        title: "fragbox".to_string(),
        size: settings.size,
        shader_path: settings.shader.clone(),
        init,
        param_step: settings.param_step,
        backend: WgpuBackendOptions {
            vsync: settings.vsync,
            compiler: settings.compiler,
        },
    })?;

    let handle = host.handle();
    if settings.read_stdin {
        spawn_stdin_reader(handle.clone())?;
    }
    let _watcher = match (&settings.shader, settings.watch_debounce) {
        (Some(path), Some(debounce)) => {
            Some(FileWatcher::spawn(path.clone(), debounce, handle)?)
        }
        _ => None,
    };

    tracing::info!(size = %settings.size, compiler = %settings.compiler, "starting fragbox");
    host.run()
}

/// Returns `true` when the shader compiles and links.
pub fn check(args: CheckArgs) -> Result<bool> {
    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read shader {}", args.file.display()))?;
    let compiler = args.shader_compiler.unwrap_or_default();
    match check_fragment(compiler, &source) {
        Ok(()) => {
            println!("{}", StatusReport::compiled());
            Ok(true)
        }
        Err(err) => {
            eprintln!("{}", StatusReport::from(&err));
            Ok(false)
        }
    }
}
