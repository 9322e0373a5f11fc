//! Value types shared between the bridge and drawing backends.
//!
//! Geometry handed to a `Surface2d` is always in device pixels; the bridge
//! applies the pixel-density scale before calling the backend. GL object ids
//! are the backend's own names and never cross into the guest, which only
//! ever sees handle-table indices.

/// RGBA color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Build a color from guest-supplied integers, saturating each channel
    /// into `0..=255`.
    pub fn from_i32s(r: i32, g: i32, b: i32, a: i32) -> Self {
        let c = |v: i32| v.clamp(0, 255) as u8;
        Self::new(c(r), c(g), c(b), c(a))
    }

    /// Alpha as a fraction in `[0, 1]`.
    pub fn alpha_f64(&self) -> f64 {
        f64::from(self.a) / 255.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Multiply every component by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }
}

// ── GL object names ──

macro_rules! gl_object {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

gl_object!(
    /// Backend name of a shader object.
    GlShader
);
gl_object!(
    /// Backend name of a program object.
    GlProgram
);
gl_object!(GlTexture);
gl_object!(GlBuffer);
gl_object!(GlVertexArray);
gl_object!(
    /// Attribute index within a linked program.
    GlAttribLocation
);
gl_object!(
    /// Uniform location within a linked program.
    GlUniformLocation
);

/// Kinds of objects a `GlBackend` can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlObjectKind {
    Shader { shader_type: u32 },
    Program,
    Texture,
    Buffer,
    VertexArray,
}

/// Value written by one of the `uniform*` calls.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int1(i32),
    Float1(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    /// `count` column-major 4x4 matrices, `16 * count` floats.
    Mat4 { transpose: bool, values: Vec<f32> },
}

/// Parameters of a `texImage2D` upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexImage {
    pub target: u32,
    pub level: i32,
    pub internal_format: i32,
    pub width: i32,
    pub height: i32,
    pub border: i32,
    pub format: u32,
    pub data_type: u32,
}

/// Parameters of a `vertexAttribPointer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribPointer {
    pub size: i32,
    pub data_type: u32,
    pub normalized: bool,
    pub stride: i32,
    pub offset: i32,
}

/// A GL operation with every handle already resolved to a backend object.
///
/// Data uploads carry their own copy of the guest bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCommand {
    ClearColor([f32; 4]),
    Clear(u32),
    Viewport { x: i32, y: i32, width: i32, height: i32 },
    Enable(u32),
    Disable(u32),
    BlendFunc { src: u32, dst: u32 },
    BlendFuncSeparate { src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32 },
    DepthFunc(u32),
    FrontFace(u32),
    LineWidth(f32),
    ShaderSource { shader: GlShader, source: String },
    CompileShader(GlShader),
    AttachShader { program: GlProgram, shader: GlShader },
    LinkProgram(GlProgram),
    Uniform { location: GlUniformLocation, value: UniformValue },
    UseProgram(GlProgram),
    BindTexture { target: u32, texture: GlTexture },
    TexImage2D { image: TexImage, pixels: Vec<u8> },
    TexParameterI { target: u32, pname: u32, param: i32 },
    GenerateMipmap(u32),
    ActiveTexture(u32),
    BindBuffer { target: u32, buffer: GlBuffer },
    BufferData { target: u32, data: Vec<u8>, usage: u32 },
    BindVertexArray(GlVertexArray),
    EnableVertexAttribArray(GlAttribLocation),
    VertexAttribPointer { location: GlAttribLocation, pointer: AttribPointer },
    DrawArrays { mode: u32, first: i32, count: i32 },
}

/// GL enumerants the bridge and the reference backends need.
pub mod gl {
    pub const NO_ERROR: u32 = 0;
    pub const INVALID_ENUM: u32 = 0x0500;
    pub const INVALID_VALUE: u32 = 0x0501;
    pub const INVALID_OPERATION: u32 = 0x0502;

    pub const FRAGMENT_SHADER: u32 = 0x8B30;
    pub const VERTEX_SHADER: u32 = 0x8B31;

    pub const TRIANGLES: u32 = 0x0004;

    pub const ARRAY_BUFFER: u32 = 0x8892;
    pub const STATIC_DRAW: u32 = 0x88E4;

    pub const TEXTURE_2D: u32 = 0x0DE1;

    pub const UNSIGNED_BYTE: u32 = 0x1401;
    pub const FLOAT: u32 = 0x1406;

    pub const ALPHA: u32 = 0x1906;
    pub const RGB: u32 = 0x1907;
    pub const RGBA: u32 = 0x1908;
    pub const LUMINANCE: u32 = 0x1909;
    pub const LUMINANCE_ALPHA: u32 = 0x190A;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_from_i32s_saturates() {
        assert_eq!(Rgba::from_i32s(-5, 300, 128, 255), Rgba::new(0, 255, 128, 255));
    }

    #[test]
    fn test_rgba_alpha_fraction() {
        assert_eq!(Rgba::new(0, 0, 0, 255).alpha_f64(), 1.0);
        assert_eq!(Rgba::new(0, 0, 0, 0).alpha_f64(), 0.0);
    }

    #[test]
    fn test_rect_scaled() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0).scaled(2.0);
        assert_eq!(r, Rect::new(2.0, 4.0, 6.0, 8.0));
    }
}
