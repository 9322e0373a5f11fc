//! Retained GL-style drawing imports.
//!
//! Object creation and location lookups hand the guest a fresh handle from
//! the matching table (or `-1` if the backend refuses). Every other call
//! resolves its handles strictly, builds a `GlCommand` and forwards it.
//! Backend errors are logged and left for the guest to read back through
//! `gl_get_error`.

use wasmtime::{Caller, Linker};

use kiln_hostapi::{
    AttribPointer, GlAttribLocation, GlBuffer, GlCommand, GlObjectKind, GlProgram, GlShader,
    GlTexture, GlVertexArray, TexImage, UniformValue,
};

use crate::context::BridgeContext;
use crate::error::{BridgeError, HostCallError};
use crate::handles::{HandleError, UniformSlot, INVALID_HANDLE};
use crate::linker::{guest_string, IMPORT_MODULE};

impl BridgeContext {
    /// Create a backend object and return its handle.
    pub(crate) fn gl_create(&mut self, kind: GlObjectKind) -> Result<i32, HostCallError> {
        let name = match self.gl_mut()?.create(kind) {
            Ok(name) => name,
            Err(e) => {
                log::warn!("gl create {:?} refused: {}", kind, e);
                return Ok(INVALID_HANDLE);
            }
        };
        let res = &mut self.resources;
        let handle = match kind {
            GlObjectKind::Shader { .. } => res.shaders.allocate(GlShader(name)),
            GlObjectKind::Program => res.programs.allocate(GlProgram(name)),
            GlObjectKind::Texture => res.textures.allocate(GlTexture(name)),
            GlObjectKind::Buffer => res.buffers.allocate(GlBuffer(name)),
            GlObjectKind::VertexArray => res.vertex_arrays.allocate(GlVertexArray(name)),
        }?;
        Ok(handle)
    }

    pub(crate) fn gl_attrib_location(
        &mut self,
        program: i32,
        name: &str,
    ) -> Result<i32, HostCallError> {
        let gl_program = self.program(program)?;
        match self.gl_mut()?.attrib_location(gl_program, name) {
            Some(location) => Ok(self.resources.attribs.allocate(location)?),
            None => {
                log::debug!("attribute '{}' not found on program {}", name, program);
                Ok(INVALID_HANDLE)
            }
        }
    }

    pub(crate) fn gl_uniform_location(
        &mut self,
        program: i32,
        name: &str,
    ) -> Result<i32, HostCallError> {
        let gl_program = self.program(program)?;
        match self.gl_mut()?.uniform_location(gl_program, name) {
            Some(location) => Ok(self
                .resources
                .uniforms
                .allocate(UniformSlot { program, location })?),
            None => {
                log::debug!("uniform '{}' not found on program {}", name, program);
                Ok(INVALID_HANDLE)
            }
        }
    }

    pub(crate) fn gl_execute(&mut self, command: GlCommand) -> Result<(), HostCallError> {
        if let Err(e) = self.gl_mut()?.execute(command) {
            log::warn!("gl command rejected: {}", e);
        }
        Ok(())
    }

    pub(crate) fn gl_take_error(&mut self) -> Result<i32, HostCallError> {
        Ok(self.gl_mut()?.take_error() as i32)
    }

    fn shader(&self, handle: i32) -> Result<GlShader, HandleError> {
        self.resources.shaders.resolve(handle).copied()
    }

    fn program(&self, handle: i32) -> Result<GlProgram, HandleError> {
        self.resources.programs.resolve(handle).copied()
    }

    fn texture(&self, handle: i32) -> Result<GlTexture, HandleError> {
        self.resources.textures.resolve(handle).copied()
    }

    fn buffer(&self, handle: i32) -> Result<GlBuffer, HandleError> {
        self.resources.buffers.resolve(handle).copied()
    }

    fn vertex_array(&self, handle: i32) -> Result<GlVertexArray, HandleError> {
        self.resources.vertex_arrays.resolve(handle).copied()
    }

    fn attrib(&self, handle: i32) -> Result<GlAttribLocation, HandleError> {
        self.resources.attribs.resolve(handle).copied()
    }

    fn uniform(&self, handle: i32, value: UniformValue) -> Result<GlCommand, HandleError> {
        let slot = self.resources.uniforms.resolve(handle)?;
        Ok(GlCommand::Uniform {
            location: slot.location,
            value,
        })
    }
}

/// Build a command from the context and forward it, trapping on failure.
fn execute(
    caller: &mut Caller<'_, BridgeContext>,
    import: &str,
    build: impl FnOnce(&BridgeContext) -> Result<GlCommand, HandleError>,
) -> anyhow::Result<()> {
    let ctx = caller.data_mut();
    build(&*ctx)
        .map_err(HostCallError::from)
        .and_then(|command| ctx.gl_execute(command))
        .map_err(|e| e.trap(import))
}

/// Copy `len` bytes of upload data out of guest memory. A null pointer
/// uploads nothing.
fn upload_bytes(
    caller: &Caller<'_, BridgeContext>,
    import: &str,
    ptr: i32,
    len: i32,
) -> anyhow::Result<Vec<u8>> {
    if ptr == 0 {
        return Ok(Vec::new());
    }
    let memory = caller.data().bound_memory().map_err(|e| e.trap(import))?;
    memory
        .read(caller, ptr as u32, len as u32 as usize)
        .map_err(|e| HostCallError::from(e).trap(import))
}

pub fn register_gl_functions(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    register_objects(linker)?;
    register_state(linker)?;
    register_shaders(linker)?;
    register_uniforms(linker)?;
    register_textures(linker)?;
    register_buffers(linker)?;
    Ok(())
}

// ── Object creation and lookup ──

fn register_objects(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_create_shader",
        |mut caller: Caller<'_, BridgeContext>, shader_type: i32| -> anyhow::Result<i32> {
            caller
                .data_mut()
                .gl_create(GlObjectKind::Shader {
                    shader_type: shader_type as u32,
                })
                .map_err(|e| e.trap("gl_create_shader"))
        },
    )?;

    const SIMPLE_OBJECTS: [(&str, GlObjectKind); 4] = [
        ("gl_create_program", GlObjectKind::Program),
        ("gl_create_texture", GlObjectKind::Texture),
        ("gl_create_buffer", GlObjectKind::Buffer),
        ("gl_create_vertex_array", GlObjectKind::VertexArray),
    ];
    for (name, kind) in SIMPLE_OBJECTS {
        linker.func_wrap(
            IMPORT_MODULE,
            name,
            move |mut caller: Caller<'_, BridgeContext>| -> anyhow::Result<i32> {
                caller.data_mut().gl_create(kind).map_err(|e| e.trap(name))
            },
        )?;
    }

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_attrib_location",
        |mut caller: Caller<'_, BridgeContext>,
         program: i32,
         name_ptr: i32|
         -> anyhow::Result<i32> {
            let name = guest_string(&caller, "gl_get_attrib_location", name_ptr)?;
            caller
                .data_mut()
                .gl_attrib_location(program, &name)
                .map_err(|e| e.trap("gl_get_attrib_location"))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_uniform_location",
        |mut caller: Caller<'_, BridgeContext>,
         program: i32,
         name_ptr: i32|
         -> anyhow::Result<i32> {
            let name = guest_string(&caller, "gl_get_uniform_location", name_ptr)?;
            caller
                .data_mut()
                .gl_uniform_location(program, &name)
                .map_err(|e| e.trap("gl_get_uniform_location"))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_get_error",
        |mut caller: Caller<'_, BridgeContext>| -> anyhow::Result<i32> {
            caller
                .data_mut()
                .gl_take_error()
                .map_err(|e| e.trap("gl_get_error"))
        },
    )?;
    Ok(())
}

// ── Fixed-function state ──

fn register_state(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_clear_color",
        |mut caller: Caller<'_, BridgeContext>, r: f32, g: f32, b: f32, a: f32| {
            execute(&mut caller, "gl_clear_color", |_| {
                Ok(GlCommand::ClearColor([r, g, b, a]))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_clear",
        |mut caller: Caller<'_, BridgeContext>, mask: i32| {
            execute(&mut caller, "gl_clear", |_| Ok(GlCommand::Clear(mask as u32)))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_viewport",
        |mut caller: Caller<'_, BridgeContext>, x: i32, y: i32, width: i32, height: i32| {
            execute(&mut caller, "gl_viewport", |_| {
                Ok(GlCommand::Viewport {
                    x,
                    y,
                    width,
                    height,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_enable",
        |mut caller: Caller<'_, BridgeContext>, cap: i32| {
            execute(&mut caller, "gl_enable", |_| Ok(GlCommand::Enable(cap as u32)))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_disable",
        |mut caller: Caller<'_, BridgeContext>, cap: i32| {
            execute(&mut caller, "gl_disable", |_| Ok(GlCommand::Disable(cap as u32)))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_blend_func",
        |mut caller: Caller<'_, BridgeContext>, src: i32, dst: i32| {
            execute(&mut caller, "gl_blend_func", |_| {
                Ok(GlCommand::BlendFunc {
                    src: src as u32,
                    dst: dst as u32,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_blend_func_separate",
        |mut caller: Caller<'_, BridgeContext>,
         src_rgb: i32,
         dst_rgb: i32,
         src_alpha: i32,
         dst_alpha: i32| {
            execute(&mut caller, "gl_blend_func_separate", |_| {
                Ok(GlCommand::BlendFuncSeparate {
                    src_rgb: src_rgb as u32,
                    dst_rgb: dst_rgb as u32,
                    src_alpha: src_alpha as u32,
                    dst_alpha: dst_alpha as u32,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_depth_func",
        |mut caller: Caller<'_, BridgeContext>, func: i32| {
            execute(&mut caller, "gl_depth_func", |_| Ok(GlCommand::DepthFunc(func as u32)))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_front_face",
        |mut caller: Caller<'_, BridgeContext>, mode: i32| {
            execute(&mut caller, "gl_front_face", |_| Ok(GlCommand::FrontFace(mode as u32)))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_line_width",
        |mut caller: Caller<'_, BridgeContext>, width: f32| {
            execute(&mut caller, "gl_line_width", |_| Ok(GlCommand::LineWidth(width)))
        },
    )?;
    Ok(())
}

// ── Shaders and programs ──

fn register_shaders(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_shader_source",
        |mut caller: Caller<'_, BridgeContext>,
         shader: i32,
         source_ptr: i32|
         -> anyhow::Result<()> {
            let source = guest_string(&caller, "gl_shader_source", source_ptr)?;
            execute(&mut caller, "gl_shader_source", |ctx| {
                Ok(GlCommand::ShaderSource {
                    shader: ctx.shader(shader)?,
                    source,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_compile_shader",
        |mut caller: Caller<'_, BridgeContext>, shader: i32| {
            execute(&mut caller, "gl_compile_shader", |ctx| {
                Ok(GlCommand::CompileShader(ctx.shader(shader)?))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_attach_shader",
        |mut caller: Caller<'_, BridgeContext>, program: i32, shader: i32| {
            execute(&mut caller, "gl_attach_shader", |ctx| {
                Ok(GlCommand::AttachShader {
                    program: ctx.program(program)?,
                    shader: ctx.shader(shader)?,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_link_program",
        |mut caller: Caller<'_, BridgeContext>, program: i32| {
            execute(&mut caller, "gl_link_program", |ctx| {
                Ok(GlCommand::LinkProgram(ctx.program(program)?))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_use_program",
        |mut caller: Caller<'_, BridgeContext>, program: i32| {
            execute(&mut caller, "gl_use_program", |ctx| {
                Ok(GlCommand::UseProgram(ctx.program(program)?))
            })
        },
    )?;
    Ok(())
}

// ── Uniforms ──

fn register_uniforms(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform1i",
        |mut caller: Caller<'_, BridgeContext>, location: i32, v0: i32| {
            execute(&mut caller, "gl_uniform1i", |ctx| {
                ctx.uniform(location, UniformValue::Int1(v0))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform1f",
        |mut caller: Caller<'_, BridgeContext>, location: i32, v0: f32| {
            execute(&mut caller, "gl_uniform1f", |ctx| {
                ctx.uniform(location, UniformValue::Float1(v0))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform2f",
        |mut caller: Caller<'_, BridgeContext>, location: i32, v0: f32, v1: f32| {
            execute(&mut caller, "gl_uniform2f", |ctx| {
                ctx.uniform(location, UniformValue::Float2([v0, v1]))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform3f",
        |mut caller: Caller<'_, BridgeContext>, location: i32, v0: f32, v1: f32, v2: f32| {
            execute(&mut caller, "gl_uniform3f", |ctx| {
                ctx.uniform(location, UniformValue::Float3([v0, v1, v2]))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform4f",
        |mut caller: Caller<'_, BridgeContext>,
         location: i32,
         v0: f32,
         v1: f32,
         v2: f32,
         v3: f32| {
            execute(&mut caller, "gl_uniform4f", |ctx| {
                ctx.uniform(location, UniformValue::Float4([v0, v1, v2, v3]))
            })
        },
    )?;

    // `count` 4x4 matrices, column-major unless `transpose` is set.
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_uniform_matrix4fv",
        |mut caller: Caller<'_, BridgeContext>,
         location: i32,
         count: i32,
         transpose: i32,
         values_ptr: i32|
         -> anyhow::Result<()> {
            let import = "gl_uniform_matrix4fv";
            let memory = caller.data().bound_memory().map_err(|e| e.trap(import))?;
            let values = memory
                .read_f32s(&caller, values_ptr as u32, count.max(0) as usize * 16)
                .map_err(|e| HostCallError::from(e).trap(import))?;
            execute(&mut caller, import, |ctx| {
                ctx.uniform(
                    location,
                    UniformValue::Mat4 {
                        transpose: transpose != 0,
                        values,
                    },
                )
            })
        },
    )?;
    Ok(())
}

// ── Textures ──

fn register_textures(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_bind_texture",
        |mut caller: Caller<'_, BridgeContext>, target: i32, texture: i32| {
            execute(&mut caller, "gl_bind_texture", |ctx| {
                Ok(GlCommand::BindTexture {
                    target: target as u32,
                    texture: ctx.texture(texture)?,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_tex_image_2d",
        |mut caller: Caller<'_, BridgeContext>,
         target: i32,
         level: i32,
         internal_format: i32,
         width: i32,
         height: i32,
         border: i32,
         format: i32,
         data_type: i32,
         pixels_ptr: i32,
         pixels_len: i32|
         -> anyhow::Result<()> {
            let pixels = upload_bytes(&caller, "gl_tex_image_2d", pixels_ptr, pixels_len)?;
            let image = TexImage {
                target: target as u32,
                level,
                internal_format,
                width,
                height,
                border,
                format: format as u32,
                data_type: data_type as u32,
            };
            execute(&mut caller, "gl_tex_image_2d", |_| {
                Ok(GlCommand::TexImage2D { image, pixels })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_tex_parameteri",
        |mut caller: Caller<'_, BridgeContext>, target: i32, pname: i32, param: i32| {
            execute(&mut caller, "gl_tex_parameteri", |_| {
                Ok(GlCommand::TexParameterI {
                    target: target as u32,
                    pname: pname as u32,
                    param,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_generate_mipmap",
        |mut caller: Caller<'_, BridgeContext>, target: i32| {
            execute(&mut caller, "gl_generate_mipmap", |_| {
                Ok(GlCommand::GenerateMipmap(target as u32))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_active_texture",
        |mut caller: Caller<'_, BridgeContext>, unit: i32| {
            execute(&mut caller, "gl_active_texture", |_| {
                Ok(GlCommand::ActiveTexture(unit as u32))
            })
        },
    )?;
    Ok(())
}

// ── Buffers and vertex state ──

fn register_buffers(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "gl_bind_buffer",
        |mut caller: Caller<'_, BridgeContext>, target: i32, buffer: i32| {
            execute(&mut caller, "gl_bind_buffer", |ctx| {
                Ok(GlCommand::BindBuffer {
                    target: target as u32,
                    buffer: ctx.buffer(buffer)?,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_buffer_data",
        |mut caller: Caller<'_, BridgeContext>,
         target: i32,
         size: i32,
         data_ptr: i32,
         usage: i32|
         -> anyhow::Result<()> {
            let data = upload_bytes(&caller, "gl_buffer_data", data_ptr, size)?;
            execute(&mut caller, "gl_buffer_data", |_| {
                Ok(GlCommand::BufferData {
                    target: target as u32,
                    data,
                    usage: usage as u32,
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_bind_vertex_array",
        |mut caller: Caller<'_, BridgeContext>, vertex_array: i32| {
            execute(&mut caller, "gl_bind_vertex_array", |ctx| {
                Ok(GlCommand::BindVertexArray(ctx.vertex_array(vertex_array)?))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_enable_vertex_attrib_array",
        |mut caller: Caller<'_, BridgeContext>, attrib: i32| {
            execute(&mut caller, "gl_enable_vertex_attrib_array", |ctx| {
                Ok(GlCommand::EnableVertexAttribArray(ctx.attrib(attrib)?))
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_vertex_attrib_pointer",
        |mut caller: Caller<'_, BridgeContext>,
         attrib: i32,
         size: i32,
         data_type: i32,
         normalized: i32,
         stride: i32,
         offset: i32| {
            execute(&mut caller, "gl_vertex_attrib_pointer", |ctx| {
                Ok(GlCommand::VertexAttribPointer {
                    location: ctx.attrib(attrib)?,
                    pointer: AttribPointer {
                        size,
                        data_type: data_type as u32,
                        normalized: normalized != 0,
                        stride,
                        offset,
                    },
                })
            })
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "gl_draw_arrays",
        |mut caller: Caller<'_, BridgeContext>, mode: i32, first: i32, count: i32| {
            execute(&mut caller, "gl_draw_arrays", |_| {
                Ok(GlCommand::DrawArrays {
                    mode: mode as u32,
                    first,
                    count,
                })
            })
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kiln_hostapi::{gl, CommandLog, MemSource, RecordingGl};

    use crate::config::BridgeConfig;
    use crate::handles::ResourceKind;

    const VERTEX_SRC: &str = "in vec2 position;\nuniform mat4 projection;\nvoid main() {}";

    fn context_with_gl() -> (BridgeContext, CommandLog<GlCommand>) {
        let mut ctx = BridgeContext::new(BridgeConfig::default(), Arc::new(MemSource::new()));
        let backend = RecordingGl::new();
        let log = backend.log();
        ctx.gl = Some(Box::new(backend));
        (ctx, log)
    }

    fn linked_program(ctx: &mut BridgeContext) -> i32 {
        let shader = ctx
            .gl_create(GlObjectKind::Shader {
                shader_type: gl::VERTEX_SHADER,
            })
            .unwrap();
        let program = ctx.gl_create(GlObjectKind::Program).unwrap();
        let commands = [
            GlCommand::ShaderSource {
                shader: ctx.shader(shader).unwrap(),
                source: VERTEX_SRC.into(),
            },
            GlCommand::CompileShader(ctx.shader(shader).unwrap()),
            GlCommand::AttachShader {
                program: ctx.program(program).unwrap(),
                shader: ctx.shader(shader).unwrap(),
            },
            GlCommand::LinkProgram(ctx.program(program).unwrap()),
        ];
        for command in commands {
            ctx.gl_execute(command).unwrap();
        }
        program
    }

    #[test]
    fn test_handles_are_dense_per_kind() {
        let (mut ctx, _) = context_with_gl();
        assert_eq!(ctx.gl_create(GlObjectKind::Texture).unwrap(), 0);
        assert_eq!(ctx.gl_create(GlObjectKind::Buffer).unwrap(), 0);
        assert_eq!(ctx.gl_create(GlObjectKind::Texture).unwrap(), 1);
        assert_eq!(ctx.resources().textures.len(), 2);
    }

    #[test]
    fn test_refused_creation_returns_invalid_handle() {
        let (mut ctx, _) = context_with_gl();
        let handle = ctx
            .gl_create(GlObjectKind::Shader { shader_type: 0x1234 })
            .unwrap();
        assert_eq!(handle, INVALID_HANDLE);
        assert!(ctx.resources().shaders.is_empty());
        assert_eq!(ctx.gl_take_error().unwrap(), gl::INVALID_ENUM as i32);
        assert_eq!(ctx.gl_take_error().unwrap(), gl::NO_ERROR as i32);
    }

    #[test]
    fn test_unknown_attribute_returns_invalid_handle() {
        let (mut ctx, _) = context_with_gl();
        let program = linked_program(&mut ctx);
        assert_eq!(ctx.gl_attrib_location(program, "position").unwrap(), 0);
        assert_eq!(ctx.gl_attrib_location(program, "nonexistent").unwrap(), INVALID_HANDLE);
        assert_eq!(ctx.resources().attribs.len(), 1);
    }

    #[test]
    fn test_invalid_handle_never_resolves() {
        let (mut ctx, _) = context_with_gl();
        let program = linked_program(&mut ctx);
        let attrib = ctx.gl_attrib_location(program, "nonexistent").unwrap();
        assert_eq!(
            ctx.attrib(attrib),
            Err(HandleError::OutOfRange {
                kind: ResourceKind::AttribLocation,
                handle: -1,
                len: 0
            })
        );
    }

    #[test]
    fn test_uniform_slot_remembers_program() {
        let (mut ctx, log) = context_with_gl();
        let program = linked_program(&mut ctx);
        let location = ctx.gl_uniform_location(program, "projection").unwrap();
        assert_eq!(location, 0);
        let slot = *ctx.resources().uniforms.resolve(location).unwrap();
        assert_eq!(slot.program, program);

        let command = ctx.uniform(location, UniformValue::Int1(3)).unwrap();
        ctx.gl_execute(command.clone()).unwrap();
        assert_eq!(log.snapshot().last(), Some(&command));
    }

    #[test]
    fn test_location_lookup_on_bad_program_is_fatal() {
        let (mut ctx, _) = context_with_gl();
        let err = ctx.gl_uniform_location(4, "projection").unwrap_err();
        assert!(matches!(
            err,
            HostCallError::Handle(HandleError::OutOfRange {
                kind: ResourceKind::Program,
                ..
            })
        ));
    }

    #[test]
    fn test_backend_rejection_is_forwarded_not_fatal() {
        let (mut ctx, _) = context_with_gl();
        let command = GlCommand::DrawArrays {
            mode: gl::TRIANGLES,
            first: 0,
            count: 3,
        };
        ctx.gl_execute(command).unwrap();
        assert_eq!(ctx.gl_take_error().unwrap(), gl::INVALID_OPERATION as i32);
    }

    #[test]
    fn test_missing_backend_is_fatal() {
        let mut ctx = BridgeContext::new(BridgeConfig::default(), Arc::new(MemSource::new()));
        assert_eq!(
            ctx.gl_create(GlObjectKind::Program),
            Err(HostCallError::MissingBackend("gl"))
        );
    }
}
