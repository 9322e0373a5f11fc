//! Headless reference backends.
//!
//! `RecordingSurface` and `RecordingGl` keep every call in a shared
//! [`CommandLog`] instead of rasterizing. They back headless hosts and tests,
//! and `RecordingGl` tracks enough object state (shader sources, link status,
//! current program) to answer location queries and report misuse the way a
//! real GL context would.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::error::BackendError;
use crate::traits::{GlBackend, Surface2d};
use crate::types::{
    gl, GlAttribLocation, GlCommand, GlObjectKind, GlProgram, GlShader, GlUniformLocation, Point,
    Rect, Rgba,
};

/// Shared, clonable list of recorded calls.
#[derive(Debug)]
pub struct CommandLog<T>(Rc<RefCell<Vec<T>>>);

impl<T> Clone for CommandLog<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for CommandLog<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }
}

impl<T: Clone> CommandLog<T> {
    pub fn push(&self, item: T) {
        self.0.borrow_mut().push(item);
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<T> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

// ── 2D ──

/// One recorded 2D call, in device pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    FillRect { rect: Rect, color: Rgba },
    FillRoundedRect { rect: Rect, radius: f64, color: Rgba },
    StrokeLine { from: Point, to: Point, thickness: f64, color: Rgba },
}

/// A `Surface2d` that records instead of drawing.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    log: CommandLog<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            log: CommandLog::default(),
        }
    }

    /// Handle on the command log that stays valid after the surface is
    /// moved into the bridge.
    pub fn log(&self) -> CommandLog<DrawCommand> {
        self.log.clone()
    }
}

impl Surface2d for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.log.push(DrawCommand::Clear);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<(), BackendError> {
        self.log.push(DrawCommand::FillRect { rect, color });
        Ok(())
    }

    fn fill_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f64,
        color: Rgba,
    ) -> Result<(), BackendError> {
        self.log.push(DrawCommand::FillRoundedRect {
            rect,
            radius,
            color,
        });
        Ok(())
    }

    fn stroke_line(
        &mut self,
        from: Point,
        to: Point,
        thickness: f64,
        color: Rgba,
    ) -> Result<(), BackendError> {
        self.log.push(DrawCommand::StrokeLine {
            from,
            to,
            thickness,
            color,
        });
        Ok(())
    }
}

// ── GL ──

#[derive(Debug, Default)]
struct ShaderState {
    shader_type: u32,
    source: String,
}

#[derive(Debug, Default)]
struct ProgramState {
    shaders: Vec<u32>,
    linked: bool,
    attribs: Vec<String>,
    uniforms: Vec<String>,
}

/// A `GlBackend` that records commands and models object state.
#[derive(Debug)]
pub struct RecordingGl {
    next_name: u32,
    shaders: HashMap<u32, ShaderState>,
    programs: HashMap<u32, ProgramState>,
    objects: HashMap<u32, GlObjectKind>,
    current_program: Option<u32>,
    errors: VecDeque<u32>,
    log: CommandLog<GlCommand>,
}

impl Default for RecordingGl {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGl {
    pub fn new() -> Self {
        Self {
            // GL reserves name 0
            next_name: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            objects: HashMap::new(),
            current_program: None,
            errors: VecDeque::new(),
            log: CommandLog::default(),
        }
    }

    pub fn log(&self) -> CommandLog<GlCommand> {
        self.log.clone()
    }

    fn fail(&mut self, err: BackendError) -> Result<(), BackendError> {
        self.errors.push_back(err.code);
        Err(err)
    }

    fn link(&mut self, program: u32) -> Result<(), BackendError> {
        let Some(state) = self.programs.get(&program) else {
            return self.fail(BackendError::invalid_value(format!("unknown program {}", program)));
        };
        let mut attribs = Vec::new();
        let mut uniforms = Vec::new();
        for shader in &state.shaders {
            let Some(shader) = self.shaders.get(shader) else {
                continue;
            };
            if shader.shader_type == gl::VERTEX_SHADER {
                for name in declared_names(&shader.source, &["in", "attribute"]) {
                    if !attribs.contains(&name) {
                        attribs.push(name);
                    }
                }
            }
            for name in declared_names(&shader.source, &["uniform"]) {
                if !uniforms.contains(&name) {
                    uniforms.push(name);
                }
            }
        }
        if let Some(state) = self.programs.get_mut(&program) {
            state.attribs = attribs;
            state.uniforms = uniforms;
            state.linked = true;
        }
        Ok(())
    }
}

/// Names declared by statements starting with one of `qualifiers`,
/// skipping any `layout(...)` prefix.
fn declared_names(source: &str, qualifiers: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    let code: String = source
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    for statement in code.split(';') {
        let mut tokens = statement.split_whitespace().peekable();
        if tokens.peek().is_some_and(|t| t.starts_with("layout")) {
            for token in tokens.by_ref() {
                if token.ends_with(')') {
                    break;
                }
            }
        }
        let Some(first) = tokens.next() else {
            continue;
        };
        if !qualifiers.contains(&first) {
            continue;
        }
        if let Some(last) = tokens.last() {
            let name = last.split('[').next().unwrap_or(last);
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    names
}

impl GlBackend for RecordingGl {
    fn create(&mut self, kind: GlObjectKind) -> Result<u32, BackendError> {
        let name = self.next_name;
        match kind {
            GlObjectKind::Shader { shader_type } => {
                if shader_type != gl::VERTEX_SHADER && shader_type != gl::FRAGMENT_SHADER {
                    self.errors.push_back(gl::INVALID_ENUM);
                    return Err(BackendError::new(
                        gl::INVALID_ENUM,
                        format!("unknown shader type 0x{:04X}", shader_type),
                    ));
                }
                self.shaders.insert(
                    name,
                    ShaderState {
                        shader_type,
                        ..ShaderState::default()
                    },
                );
            }
            GlObjectKind::Program => {
                self.programs.insert(name, ProgramState::default());
            }
            other => {
                self.objects.insert(name, other);
            }
        }
        self.next_name += 1;
        Ok(name)
    }

    fn attrib_location(&mut self, program: GlProgram, name: &str) -> Option<GlAttribLocation> {
        let state = self.programs.get(&program.0).filter(|p| p.linked)?;
        state
            .attribs
            .iter()
            .position(|a| a == name)
            .map(|i| GlAttribLocation(i as u32))
    }

    fn uniform_location(&mut self, program: GlProgram, name: &str) -> Option<GlUniformLocation> {
        let state = self.programs.get(&program.0).filter(|p| p.linked)?;
        state
            .uniforms
            .iter()
            .position(|u| u == name)
            .map(|i| GlUniformLocation(i as u32))
    }

    fn execute(&mut self, command: GlCommand) -> Result<(), BackendError> {
        self.log.push(command.clone());
        match command {
            GlCommand::ShaderSource { shader, source } => match self.shaders.get_mut(&shader.0) {
                Some(state) => {
                    state.source = source;
                    Ok(())
                }
                None => self.fail(unknown_shader(shader)),
            },
            GlCommand::CompileShader(shader) => {
                if self.shaders.contains_key(&shader.0) {
                    Ok(())
                } else {
                    self.fail(unknown_shader(shader))
                }
            }
            GlCommand::AttachShader { program, shader } => {
                if !self.shaders.contains_key(&shader.0) {
                    return self.fail(unknown_shader(shader));
                }
                match self.programs.get_mut(&program.0) {
                    Some(state) => {
                        state.shaders.push(shader.0);
                        Ok(())
                    }
                    None => self.fail(BackendError::invalid_value(format!(
                        "unknown program {}",
                        program.0
                    ))),
                }
            }
            GlCommand::LinkProgram(program) => self.link(program.0),
            GlCommand::UseProgram(program) => {
                let linked = self.programs.get(&program.0).is_some_and(|p| p.linked);
                if !linked {
                    return self.fail(BackendError::invalid_operation(format!(
                        "program {} is not linked",
                        program.0
                    )));
                }
                self.current_program = Some(program.0);
                Ok(())
            }
            GlCommand::DrawArrays { count, .. } => {
                if self.current_program.is_none() {
                    return self.fail(BackendError::invalid_operation("no program in use"));
                }
                if count < 0 {
                    return self.fail(BackendError::invalid_value("negative vertex count"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn take_error(&mut self) -> u32 {
        self.errors.pop_front().unwrap_or(gl::NO_ERROR)
    }
}

fn unknown_shader(shader: GlShader) -> BackendError {
    BackendError::invalid_value(format!("unknown shader {}", shader.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX_SRC: &str = "#version 300 es\n\
        layout(location = 0) in vec2 position;\n\
        in vec4 color;\n\
        uniform mat4 projection;\n\
        uniform float scales[4];\n\
        void main() { gl_Position = projection * vec4(position, 0.0, 1.0); }";

    const FRAGMENT_SRC: &str = "#version 300 es\n\
        precision mediump float;\n\
        in vec4 v_color;\n\
        uniform sampler2D tex;\n\
        out vec4 frag;\n\
        void main() { frag = v_color; }";

    fn linked_program(backend: &mut RecordingGl) -> GlProgram {
        let vs = GlShader(
            backend
                .create(GlObjectKind::Shader { shader_type: gl::VERTEX_SHADER })
                .unwrap(),
        );
        let fs = GlShader(
            backend
                .create(GlObjectKind::Shader { shader_type: gl::FRAGMENT_SHADER })
                .unwrap(),
        );
        let program = GlProgram(backend.create(GlObjectKind::Program).unwrap());
        backend
            .execute(GlCommand::ShaderSource { shader: vs, source: VERTEX_SRC.into() })
            .unwrap();
        backend
            .execute(GlCommand::ShaderSource { shader: fs, source: FRAGMENT_SRC.into() })
            .unwrap();
        backend.execute(GlCommand::AttachShader { program, shader: vs }).unwrap();
        backend.execute(GlCommand::AttachShader { program, shader: fs }).unwrap();
        backend.execute(GlCommand::LinkProgram(program)).unwrap();
        program
    }

    #[test]
    fn test_declared_names() {
        assert_eq!(
            declared_names(VERTEX_SRC, &["in", "attribute"]),
            vec!["position".to_string(), "color".to_string()]
        );
        assert_eq!(
            declared_names(VERTEX_SRC, &["uniform"]),
            vec!["projection".to_string(), "scales".to_string()]
        );
    }

    #[test]
    fn test_locations_after_link() {
        let mut backend = RecordingGl::new();
        let program = linked_program(&mut backend);
        assert_eq!(backend.attrib_location(program, "position"), Some(GlAttribLocation(0)));
        assert_eq!(backend.attrib_location(program, "color"), Some(GlAttribLocation(1)));
        // fragment inputs are not vertex attributes
        assert_eq!(backend.attrib_location(program, "v_color"), None);
        assert_eq!(backend.attrib_location(program, "missing"), None);
        assert_eq!(backend.uniform_location(program, "tex"), Some(GlUniformLocation(2)));
    }

    #[test]
    fn test_unlinked_program_has_no_locations() {
        let mut backend = RecordingGl::new();
        let program = GlProgram(backend.create(GlObjectKind::Program).unwrap());
        assert_eq!(backend.attrib_location(program, "position"), None);
    }

    #[test]
    fn test_draw_without_program_records_error() {
        let mut backend = RecordingGl::new();
        let err = backend
            .execute(GlCommand::DrawArrays { mode: gl::TRIANGLES, first: 0, count: 3 })
            .unwrap_err();
        assert_eq!(err.code, gl::INVALID_OPERATION);
        assert_eq!(backend.take_error(), gl::INVALID_OPERATION);
        assert_eq!(backend.take_error(), gl::NO_ERROR);
    }

    #[test]
    fn test_draw_with_linked_program() {
        let mut backend = RecordingGl::new();
        let program = linked_program(&mut backend);
        backend.execute(GlCommand::UseProgram(program)).unwrap();
        backend
            .execute(GlCommand::DrawArrays { mode: gl::TRIANGLES, first: 0, count: 6 })
            .unwrap();
        assert_eq!(backend.take_error(), gl::NO_ERROR);
        assert_eq!(backend.log().len(), 7);
    }

    #[test]
    fn test_names_are_unique_and_nonzero() {
        let mut backend = RecordingGl::new();
        let a = backend.create(GlObjectKind::Buffer).unwrap();
        let b = backend.create(GlObjectKind::Texture).unwrap();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_bad_shader_type() {
        let mut backend = RecordingGl::new();
        let err = backend
            .create(GlObjectKind::Shader { shader_type: 7 })
            .unwrap_err();
        assert_eq!(err.code, gl::INVALID_ENUM);
    }

    #[test]
    fn test_surface_records_commands() {
        let mut surface = RecordingSurface::new(640, 480);
        let log = surface.log();
        surface.clear().unwrap();
        surface
            .fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Rgba::new(1, 2, 3, 4))
            .unwrap();
        assert_eq!(surface.size(), (640, 480));
        assert_eq!(log.len(), 2);
        assert_eq!(log.snapshot()[0], DrawCommand::Clear);
    }
}
