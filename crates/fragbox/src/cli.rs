use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::ShaderCompiler;

#[derive(Parser, Debug)]
#[command(
    name = "fragbox",
    author,
    version,
    about = "Interactive fragment-shader sandbox",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file; defaults to `$FRAGBOX_CONFIG` or the user config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fragment shader to load (GLSL ES 3.00 or desktop GLSL).
    #[arg(long, value_name = "FILE")]
    pub shader: Option<PathBuf>,

    /// Image sampled through `userTexture`.
    #[arg(long, value_name = "FILE")]
    pub image: Option<PathBuf>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Do not watch the shader file for changes.
    #[arg(long)]
    pub no_watch: bool,

    /// Do not read control commands from stdin.
    #[arg(long)]
    pub no_stdin: bool,

    /// Shader compiler backend: `shaderc` or `naga`.
    #[arg(long, value_name = "COMPILER", value_parser = parse_shader_compiler)]
    pub shader_compiler: Option<ShaderCompiler>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile and link a fragment shader without opening a window.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[arg(long, value_name = "COMPILER", value_parser = parse_shader_compiler)]
    pub shader_compiler: Option<ShaderCompiler>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_shader_compiler(value: &str) -> Result<ShaderCompiler, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Err("shader compiler must not be empty".to_string()),
        "shaderc" => {
            if cfg!(feature = "shaderc") {
                Ok(ShaderCompiler::Shaderc)
            } else {
                Err("shaderc support is not enabled in this build".to_string())
            }
        }
        "naga" | "naga-glsl" => Ok(ShaderCompiler::NagaGlsl),
        other => Err(format!(
            "unknown shader compiler '{other}'; expected shaderc or naga"
        )),
    }
}
