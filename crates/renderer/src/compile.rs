//! GLSL front end shared by the wgpu backend and the offline `check` command.
//!
//! User shaders are written against a WebGL-flavoured interface: plain
//! `uniform vec4 userParam;` style declarations, a `uniform sampler2D`, and
//! bare `in`/`out` varyings. Before compiling we rewrite them into Vulkan
//! GLSL 450 that wgpu accepts, then parse and validate with naga so the
//! diagnostic text can be handed back to the user verbatim.

use std::fmt;

use wgpu::naga;

use crate::backend::{ShaderStage, UniformLocation};
use crate::pipeline::PipelineError;

/// Uniform names the sandbox feeds; their declarations are replaced by the
/// uniform block in [`FRAGMENT_HEADER`].
pub const SANDBOX_UNIFORMS: [&str; 3] = ["userParam", "viewportSize", "time"];

/// Name the bound image is exposed under regardless of what the shader calls it.
pub const TEXTURE_NAME: &str = "userTexture";

const COMBINED_SAMPLER: &str = "sampler2D(fragbox_texture, fragbox_sampler)";

/// Fixed vertex stage. Attribute and varying locations are part of the
/// contract with [`wrap_fragment`], which numbers fragment inputs from zero.
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texcoord;

layout(location = 0) out vec2 texcoord;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
    texcoord = a_texcoord;
}
";

/// Prologue for every user fragment shader.
///
/// The block layout must match `gpu::uniforms::UniformBlock`. The block has
/// no instance name, so its members are plain globals that user code may
/// shadow with locals or parameters.
const FRAGMENT_HEADER: &str = r"#version 450

layout(std140, set = 0, binding = 0) uniform SandboxUniforms {
    vec4 userParam;
    uvec2 viewportSize;
    float time;
    float fragbox_padding0;
};

layout(set = 1, binding = 0) uniform texture2D fragbox_texture;
layout(set = 1, binding = 1) uniform sampler fragbox_sampler;

// wgpu rasterises with a top-left origin; keep the bottom-left one shaders expect.
vec4 fragbox_frag_coord() {
    return vec4(gl_FragCoord.x, float(viewportSize.y) - gl_FragCoord.y, gl_FragCoord.zw);
}
";

const FRAG_COORD: &str = "gl_FragCoord";
const FLIPPED_FRAG_COORD: &str = "fragbox_frag_coord()";

/// Rewrites a user fragment shader into self-contained GLSL 450.
///
/// Stripped lines are blanked (comments on them survive) so that, after the
/// `#line 1` marker, line numbers in diagnostics match the user's file.
/// Sampler names and `gl_FragCoord` are then substituted token by token,
/// skipping any scope that redeclares them.
pub fn wrap_fragment(source: &str) -> String {
    let mut body = String::with_capacity(source.len() + 64);
    let mut depth = 0usize;
    let mut in_comment = false;
    let mut next_input = 0u32;
    let mut next_output = 0u32;
    let mut samplers = vec![TEXTURE_NAME.to_string()];

    for line in source.lines() {
        let split = split_comments(line, in_comment);
        in_comment = split.ends_in_comment;
        let code = split.code.trim_start();
        let indent = split.code.len() - code.len();

        let rewritten = if depth > 0 {
            None
        } else if code.starts_with("#version") || code.starts_with("precision ") {
            Some(split.comments.trim_end().to_string())
        } else if let Some((ty, name)) = uniform_declaration(code) {
            if SANDBOX_UNIFORMS.contains(&name) {
                Some(split.comments.trim_end().to_string())
            } else if ty == "sampler2D" {
                if !samplers.iter().any(|known| known == name) {
                    samplers.push(name.to_string());
                }
                Some(split.comments.trim_end().to_string())
            } else {
                None
            }
        } else if code.starts_with("in ") {
            let located = format!(
                "{}layout(location = {next_input}) {}",
                &line[..indent],
                &line[indent..]
            );
            next_input += 1;
            Some(located)
        } else if code.starts_with("out ") {
            let located = format!(
                "{}layout(location = {next_output}) {}",
                &line[..indent],
                &line[indent..]
            );
            next_output += 1;
            Some(located)
        } else {
            None
        };

        match rewritten {
            Some(text) => body.push_str(&text),
            None => body.push_str(line),
        }
        body.push('\n');
        depth = track_depth(depth, &split.code);
    }

    let mut replacements: Vec<(&str, &str)> = samplers
        .iter()
        .map(|name| (name.as_str(), COMBINED_SAMPLER))
        .collect();
    replacements.push((FRAG_COORD, FLIPPED_FRAG_COORD));
    let body = rewrite_identifiers(&body, &replacements);

    format!("{FRAGMENT_HEADER}\n#line 1\n{body}")
}

/// Splits `uniform [precision] TYPE NAME;` into `(TYPE, NAME)`.
fn uniform_declaration(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("uniform ")?;
    let declaration = rest.split(';').next()?;
    let mut tokens = declaration
        .split_whitespace()
        .filter(|token| !matches!(*token, "lowp" | "mediump" | "highp"));
    let ty = tokens.next()?;
    let name = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    Some((ty, name))
}

/// One source line separated into code and comment text.
///
/// Both strings have the byte length of the input line: `code` has every
/// comment byte replaced by a space, `comments` has every code byte replaced.
#[derive(Debug)]
struct SplitLine {
    code: String,
    comments: String,
    ends_in_comment: bool,
}

fn split_comments(line: &str, mut in_comment: bool) -> SplitLine {
    let mut code = String::with_capacity(line.len());
    let mut comments = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();

    fn blank(out: &mut String, ch: char) {
        out.extend(std::iter::repeat(' ').take(ch.len_utf8()));
    }

    while let Some((index, ch)) = chars.next() {
        let next = chars.peek().map(|(_, next)| *next);
        if in_comment {
            comments.push(ch);
            blank(&mut code, ch);
            if ch == '*' && next == Some('/') {
                chars.next();
                comments.push('/');
                code.push(' ');
                in_comment = false;
            }
        } else if ch == '/' && next == Some('/') {
            let rest = &line[index..];
            comments.push_str(rest);
            code.extend(std::iter::repeat(' ').take(rest.len()));
            break;
        } else if ch == '/' && next == Some('*') {
            chars.next();
            comments.push_str("/*");
            code.push_str("  ");
            in_comment = true;
        } else {
            code.push(ch);
            blank(&mut comments, ch);
        }
    }

    SplitLine {
        code,
        comments,
        ends_in_comment: in_comment,
    }
}

/// Brace depth after a line whose comments have already been removed.
fn track_depth(depth: usize, code: &str) -> usize {
    let opened = code.matches('{').count();
    let closed = code.matches('}').count();
    (depth + opened).saturating_sub(closed)
}

/// Words that can precede an expression identifier without declaring it.
const NON_TYPE_KEYWORDS: [&str; 4] = ["return", "else", "case", "do"];

#[derive(Debug, Clone, Copy)]
enum Previous<'a> {
    Word(&'a str),
    Dot,
    Other,
}

/// Replaces whole identifiers outside comments and member accesses.
///
/// A name declared as a local or a parameter hides the replacement for the
/// rest of its block. Declarations are recognised as an identifier directly
/// following a type-like identifier, which is enough for the names rewritten
/// here.
fn rewrite_identifiers(source: &str, replacements: &[(&str, &str)]) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len() + 64);
    // scopes[0] is file scope; declarations there are never tracked.
    let mut scopes: Vec<Vec<&str>> = vec![Vec::new()];
    let mut parameters: Vec<&str> = Vec::new();
    // Declarators with an initializer: the name is visible after it.
    let mut initialising: Vec<(&str, usize)> = Vec::new();
    let mut parens = 0usize;
    let mut previous = Previous::Other;
    let mut index = 0;

    while index < bytes.len() {
        let rest = &source[index..];
        if rest.starts_with("//") {
            let end = rest.find('\n').map_or(source.len(), |offset| index + offset);
            out.push_str(&source[index..end]);
            index = end;
            continue;
        }
        if rest.starts_with("/*") {
            let end = rest[2..]
                .find("*/")
                .map_or(source.len(), |offset| index + offset + 4);
            out.push_str(&source[index..end]);
            index = end;
            continue;
        }

        let byte = bytes[index];
        if byte.is_ascii_alphabetic() || byte == b'_' {
            let start = index;
            while index < bytes.len() && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_')
            {
                index += 1;
            }
            let word = &source[start..index];
            let declares =
                matches!(previous, Previous::Word(before) if !NON_TYPE_KEYWORDS.contains(&before));

            if declares {
                if scopes.len() == 1 {
                    if parens > 0 {
                        parameters.push(word);
                    }
                } else if source[index..].trim_start().starts_with('=')
                    && !source[index..].trim_start().starts_with("==")
                {
                    initialising.push((word, parens));
                } else if let Some(scope) = scopes.last_mut() {
                    scope.push(word);
                }
                out.push_str(word);
            } else {
                let member = matches!(previous, Previous::Dot);
                let hidden = scopes.iter().any(|scope| scope.contains(&word));
                match replacements.iter().find(|(name, _)| *name == word) {
                    Some((_, replacement)) if !member && !hidden => out.push_str(replacement),
                    _ => out.push_str(word),
                }
            }
            previous = Previous::Word(word);
            continue;
        }

        if byte.is_ascii_digit() {
            let start = index;
            while index < bytes.len()
                && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_' || bytes[index] == b'.')
            {
                index += 1;
            }
            out.push_str(&source[start..index]);
            previous = Previous::Other;
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        out.push(ch);
        index += ch.len_utf8();
        if ch.is_whitespace() {
            continue;
        }
        previous = if ch == '.' { Previous::Dot } else { Previous::Other };

        match ch {
            '(' => parens += 1,
            ')' => parens = parens.saturating_sub(1),
            '{' => scopes.push(std::mem::take(&mut parameters)),
            '}' => {
                if scopes.len() > 1 {
                    scopes.pop();
                }
            }
            ',' | ';' => {
                let (ready, waiting): (Vec<_>, Vec<_>) = initialising
                    .drain(..)
                    .partition(|(_, level)| *level == parens);
                initialising = waiting;
                if let Some(scope) = scopes.last_mut() {
                    scope.extend(ready.into_iter().map(|(name, _)| name));
                }
                if ch == ';' && scopes.len() == 1 && parens == 0 {
                    parameters.clear();
                }
            }
            _ => {}
        }
    }

    out
}

/// Which GLSL compiler turns shader text into a naga module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderCompiler {
    /// Compile through shaderc into SPIR-V, then read it back with naga.
    Shaderc,
    /// Hand GLSL to naga's built-in front end.
    NagaGlsl,
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        if cfg!(feature = "shaderc") {
            ShaderCompiler::Shaderc
        } else {
            ShaderCompiler::NagaGlsl
        }
    }
}

impl fmt::Display for ShaderCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderCompiler::Shaderc => f.write_str("shaderc"),
            ShaderCompiler::NagaGlsl => f.write_str("naga"),
        }
    }
}

/// Code handed to wgpu once the stage is linked into a pipeline.
#[derive(Debug, Clone)]
pub enum StageCode {
    Glsl(String),
    SpirV(Vec<u32>),
}

/// A successfully compiled and validated shader stage.
#[derive(Debug, Clone)]
pub struct StageArtifact {
    pub stage: ShaderStage,
    pub module: naga::Module,
    pub code: StageCode,
}

/// Compiles one stage; fragment sources are wrapped first.
///
/// The error string is the compiler's diagnostic output.
pub fn compile_stage(
    compiler: ShaderCompiler,
    stage: ShaderStage,
    source: &str,
) -> Result<StageArtifact, String> {
    let code = match stage {
        ShaderStage::Vertex => source.to_string(),
        ShaderStage::Fragment => wrap_fragment(source),
    };

    let artifact = match compiler {
        ShaderCompiler::NagaGlsl => {
            let module = parse_glsl(stage, &code)?;
            StageArtifact {
                stage,
                module,
                code: StageCode::Glsl(code.clone()),
            }
        }
        ShaderCompiler::Shaderc => compile_shaderc(stage, &code)?,
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    if let Err(err) = validator.validate(&artifact.module) {
        return Err(err.emit_to_string(&code));
    }
    Ok(artifact)
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

fn parse_glsl(stage: ShaderStage, code: &str) -> Result<naga::Module, String> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(naga_stage(stage));
    frontend
        .parse(&options, code)
        .map_err(|errors| errors.emit_to_string(code))
}

#[cfg(feature = "shaderc")]
fn compile_shaderc(stage: ShaderStage, code: &str) -> Result<StageArtifact, String> {
    let compiler = shaderc::Compiler::new().map_err(|err| err.to_string())?;
    let kind = match stage {
        ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
        ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
    };
    let name = format!("{stage}.glsl");
    let binary = compiler
        .compile_into_spirv(code, kind, &name, "main", None)
        .map_err(|err| err.to_string())?;
    let words = binary.as_binary().to_vec();
    let module = naga::front::spv::parse_u8_slice(
        bytemuck::cast_slice(&words),
        &naga::front::spv::Options::default(),
    )
    .map_err(|err| err.to_string())?;
    Ok(StageArtifact {
        stage,
        module,
        code: StageCode::SpirV(words),
    })
}

#[cfg(not(feature = "shaderc"))]
fn compile_shaderc(stage: ShaderStage, code: &str) -> Result<StageArtifact, String> {
    tracing::warn!("shaderc support not compiled in; falling back to naga");
    let module = parse_glsl(stage, code)?;
    Ok(StageArtifact {
        stage,
        module,
        code: StageCode::Glsl(code.to_string()),
    })
}

fn entry_point(module: &naga::Module, stage: naga::ShaderStage) -> Option<&naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage)
}

/// Flattens an argument or result into `(location, type)` pairs, looking
/// through struct wrappers the way naga lowers multiple varyings.
fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<(u32, naga::TypeInner)>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.push((*location, module.types[ty].inner.clone()));
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

/// `(location, type)` of every vertex attribute the vertex stage reads.
pub fn vertex_inputs(module: &naga::Module) -> Vec<(u32, naga::TypeInner)> {
    let mut inputs = Vec::new();
    if let Some(entry) = entry_point(module, naga::ShaderStage::Vertex) {
        for argument in &entry.function.arguments {
            collect_locations(module, argument.ty, argument.binding.as_ref(), &mut inputs);
        }
    }
    inputs.sort_by_key(|(location, _)| *location);
    inputs
}

fn vertex_outputs(module: &naga::Module) -> Vec<(u32, naga::TypeInner)> {
    let mut outputs = Vec::new();
    if let Some(result) = entry_point(module, naga::ShaderStage::Vertex)
        .and_then(|entry| entry.function.result.as_ref())
    {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut outputs);
    }
    outputs
}

fn fragment_inputs(module: &naga::Module) -> Vec<(u32, naga::TypeInner)> {
    let mut inputs = Vec::new();
    if let Some(entry) = entry_point(module, naga::ShaderStage::Fragment) {
        for argument in &entry.function.arguments {
            collect_locations(module, argument.ty, argument.binding.as_ref(), &mut inputs);
        }
    }
    inputs
}

/// Link-time interface check between the two stages.
///
/// Every fragment input must be written by the vertex stage at the same
/// location with the same type. The error is a link log.
pub fn check_stage_interface(
    vertex: &naga::Module,
    fragment: &naga::Module,
) -> Result<(), String> {
    if entry_point(vertex, naga::ShaderStage::Vertex).is_none() {
        return Err("error: vertex stage has no entry point".to_string());
    }
    if entry_point(fragment, naga::ShaderStage::Fragment).is_none() {
        return Err("error: fragment stage has no entry point".to_string());
    }

    let outputs = vertex_outputs(vertex);
    let mut problems = Vec::new();
    for (location, inner) in fragment_inputs(fragment) {
        match outputs.iter().find(|(candidate, _)| *candidate == location) {
            None => problems.push(format!(
                "error: fragment input at location {location} is not written by the vertex stage"
            )),
            Some((_, produced)) if *produced != inner => problems.push(format!(
                "error: fragment input at location {location} has type {inner:?} but the vertex stage writes {produced:?}"
            )),
            Some(_) => {}
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("\n"))
    }
}

/// Location of a named vertex input, if the vertex stage declares it.
///
/// Falls back to the `layout(location = N) in` declarations in the source
/// when the front end did not keep argument names.
pub fn reflect_attribute(artifact: &StageArtifact, name: &str) -> Option<u32> {
    let entry = entry_point(&artifact.module, naga::ShaderStage::Vertex)?;
    let reflected = entry.function.arguments.iter().find_map(|argument| {
        match (&argument.name, &argument.binding) {
            (Some(arg_name), Some(naga::Binding::Location { location, .. })) if arg_name == name => {
                Some(*location)
            }
            _ => None,
        }
    });
    match (&artifact.code, reflected) {
        (_, Some(location)) => Some(location),
        (StageCode::Glsl(code), None) => declared_input_location(code, name),
        (StageCode::SpirV(_), None) => None,
    }
}

fn declared_input_location(code: &str, name: &str) -> Option<u32> {
    code.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("layout(location")?;
        let (location, declaration) = rest.split_once(')')?;
        let location = location.trim_start_matches([' ', '=']).trim().parse().ok()?;
        let mut tokens = declaration.trim().trim_end_matches(';').split_whitespace();
        (tokens.next()? == "in" && tokens.nth(1)? == name).then_some(location)
    })
}

/// Byte offset of a sandbox uniform inside the fragment stage's uniform block.
pub fn reflect_uniform(module: &naga::Module, name: &str) -> Option<UniformLocation> {
    module
        .global_variables
        .iter()
        .filter(|(_, global)| global.space == naga::AddressSpace::Uniform)
        .find_map(|(_, global)| match &module.types[global.ty].inner {
            naga::TypeInner::Struct { members, .. } => members
                .iter()
                .find(|member| member.name.as_deref() == Some(name))
                .map(|member| UniformLocation::new(member.offset)),
            _ => None,
        })
}

/// Compiles and links a fragment shader against the fixed vertex stage
/// without touching a GPU.
pub fn check_fragment(compiler: ShaderCompiler, source: &str) -> Result<(), PipelineError> {
    let vertex = compile_stage(compiler, ShaderStage::Vertex, VERTEX_SHADER_GLSL).map_err(
        |log| PipelineError::Compile {
            stage: ShaderStage::Vertex,
            log,
        },
    )?;
    let fragment = compile_stage(compiler, ShaderStage::Fragment, source).map_err(|log| {
        PipelineError::Compile {
            stage: ShaderStage::Fragment,
            log,
        }
    })?;
    check_stage_interface(&vertex.module, &fragment.module)
        .map_err(|log| PipelineError::Link { log })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBGL_SHADER: &str = "\
#version 300 es
precision highp float;
uniform vec4 userParam;
uniform uvec2 viewportSize;
uniform float time;
uniform sampler2D userTexture;
in vec2 texcoord;
out vec4 fragColor;
void main() {
    vec4 color = texture(userTexture, texcoord);
    fragColor = vec4(color.rgb * userParam.w, 1.0) + vec4(0.0 * time);
}
";

    #[test]
    fn wrap_strips_sandbox_declarations_and_keeps_line_count() {
        let wrapped = wrap_fragment(WEBGL_SHADER);
        let body = wrapped.split("#line 1\n").nth(1).unwrap();
        assert_eq!(body.lines().count(), WEBGL_SHADER.lines().count());
        assert!(!body.contains("uniform vec4 userParam"));
        assert!(!body.contains("precision highp"));
        assert!(!body.contains("#version 300 es"));
        assert!(body.contains("layout(location = 0) in vec2 texcoord;"));
        assert!(body.contains("layout(location = 0) out vec4 fragColor;"));
    }

    #[test]
    fn renamed_sampler_uses_become_the_bound_texture() {
        let source = "\
uniform sampler2D photo;
in vec2 texcoord;
out vec4 c;
void main() {
    // photo stays in comments
    c = texture(photo, texcoord);
}
";
        let wrapped = wrap_fragment(source);
        let body = wrapped.split("#line 1\n").nth(1).unwrap();
        assert!(!body.contains("uniform sampler2D photo"));
        assert!(!body.contains("#define"));
        assert!(body.contains(&format!("c = texture({COMBINED_SAMPLER}, texcoord);")));
        assert!(body.contains("// photo stays in comments"));
        check_fragment(ShaderCompiler::NagaGlsl, source).unwrap();
    }

    #[test]
    fn local_sampler_names_are_not_rewritten() {
        let source = "\
uniform sampler2D photo;
vec4 sample_it(sampler2D photo, vec2 uv) { return texture(photo, uv); }
void main() { vec4 c = sample_it(photo, vec2(0.0)); }
";
        let body = rewrite_identifiers(source, &[("photo", COMBINED_SAMPLER)]);
        assert!(body.contains("vec4 sample_it(sampler2D photo, vec2 uv) { return texture(photo, uv); }"));
        assert!(body.contains(&format!("sample_it({COMBINED_SAMPLER}, vec2(0.0))")));
    }

    #[test]
    fn frag_coord_is_flipped_outside_member_access() {
        let body = rewrite_identifiers(
            "vec2 p = gl_FragCoord.xy; /* gl_FragCoord */ float q = s.gl_FragCoord;",
            &[(FRAG_COORD, FLIPPED_FRAG_COORD)],
        );
        assert_eq!(
            body,
            "vec2 p = fragbox_frag_coord().xy; /* gl_FragCoord */ float q = s.gl_FragCoord;"
        );
    }

    #[test]
    fn initialiser_sees_the_outer_name() {
        let body = rewrite_identifiers(
            "void main() { vec4 photo = texture(photo, uv); vec4 d = photo; }",
            &[("photo", "IMG")],
        );
        assert_eq!(
            body,
            "void main() { vec4 photo = texture(IMG, uv); vec4 d = photo; }"
        );
    }

    #[test]
    fn sandbox_uniforms_can_be_shadowed_by_locals() {
        let source = "\
in vec2 texcoord;
out vec4 fragColor;
void main() {
    float time = 0.5;
    vec4 userParam = vec4(time);
    fragColor = userParam;
}
";
        check_fragment(ShaderCompiler::NagaGlsl, source).unwrap();
    }

    #[test]
    fn sandbox_uniforms_can_be_shadowed_by_parameters() {
        let source = "\
uniform float time;
in vec2 texcoord;
out vec4 fragColor;
float wave(float time) {
    return sin(time);
}
void main() {
    fragColor = vec4(wave(time), texcoord, 1.0);
}
";
        check_fragment(ShaderCompiler::NagaGlsl, source).unwrap();
    }

    #[test]
    fn braces_inside_block_comments_do_not_hide_varyings() {
        let source = "\
/* helpers {
   not code */
in vec2 texcoord;
out vec4 fragColor;
void main() { fragColor = vec4(texcoord, 0.0, 1.0); }
";
        let wrapped = wrap_fragment(source);
        assert!(wrapped.contains("layout(location = 0) in vec2 texcoord;"));
        assert!(wrapped.contains("layout(location = 0) out vec4 fragColor;"));
        check_fragment(ShaderCompiler::NagaGlsl, source).unwrap();
    }

    #[test]
    fn split_comments_tracks_block_state_across_lines() {
        let first = split_comments("int a; /* { open", false);
        assert_eq!(first.code.trim_end(), "int a;");
        assert!(first.ends_in_comment);
        assert_eq!(first.code.len(), "int a; /* { open".len());

        let second = split_comments("still } */ in vec2 t; // {", true);
        assert_eq!(second.code.trim(), "in vec2 t;");
        assert!(!second.ends_in_comment);
        assert_eq!(track_depth(0, &second.code), 0);
        assert!(second.comments.starts_with("still } */"));
        assert!(second.comments.trim_end().ends_with("// {"));
    }

    #[test]
    fn blanked_lines_keep_open_comments() {
        let source = "precision highp float; /* start\nend */\nout vec4 c;\nvoid main() { c = vec4(1.0); }\n";
        let wrapped = wrap_fragment(source);
        let body = wrapped.split("#line 1\n").nth(1).unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next().map(str::trim), Some("/* start"));
        assert_eq!(lines.next(), Some("end */"));
        check_fragment(ShaderCompiler::NagaGlsl, source).unwrap();
    }

    #[test]
    fn wrap_leaves_function_locals_alone() {
        let source = "out vec4 c;\nvoid main() {\n    float in_range = 1.0;\n    c = vec4(in_range);\n}\n";
        let wrapped = wrap_fragment(source);
        assert!(wrapped.contains("    float in_range = 1.0;"));
        assert_eq!(wrapped.matches("layout(location = 0) out").count(), 1);
    }

    #[test]
    fn parses_uniform_declarations() {
        assert_eq!(
            uniform_declaration("uniform mediump vec4 userParam;"),
            Some(("vec4", "userParam"))
        );
        assert_eq!(uniform_declaration("uniform float a, b;"), None);
        assert_eq!(uniform_declaration("float x;"), None);
    }

    #[test]
    fn vertex_stage_reflects_fixed_attributes() {
        let vertex =
            compile_stage(ShaderCompiler::NagaGlsl, ShaderStage::Vertex, VERTEX_SHADER_GLSL)
                .unwrap();
        assert_eq!(reflect_attribute(&vertex, "a_position"), Some(0));
        assert_eq!(reflect_attribute(&vertex, "a_texcoord"), Some(1));
        assert_eq!(reflect_attribute(&vertex, "a_normal"), None);
    }

    #[test]
    fn webgl_style_shader_compiles_and_links() {
        check_fragment(ShaderCompiler::NagaGlsl, WEBGL_SHADER).unwrap();
        let fragment =
            compile_stage(ShaderCompiler::NagaGlsl, ShaderStage::Fragment, WEBGL_SHADER).unwrap();
        assert_eq!(
            reflect_uniform(&fragment.module, "userParam"),
            Some(UniformLocation::new(0))
        );
        assert_eq!(
            reflect_uniform(&fragment.module, "viewportSize"),
            Some(UniformLocation::new(16))
        );
        assert_eq!(
            reflect_uniform(&fragment.module, "time"),
            Some(UniformLocation::new(24))
        );
    }

    #[test]
    fn syntax_errors_produce_a_log() {
        let err = check_fragment(ShaderCompiler::NagaGlsl, "void main() { vec4 x = ; }\n")
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert!(!err.log().is_empty());
    }

    #[test]
    fn mismatched_varying_fails_to_link() {
        let source = "in vec3 texcoord;\nout vec4 c;\nvoid main() { c = vec4(texcoord, 1.0); }\n";
        let err = check_fragment(ShaderCompiler::NagaGlsl, source).unwrap_err();
        assert!(matches!(err, PipelineError::Link { .. }));
        assert!(err.log().contains("location 0"));
    }
}
