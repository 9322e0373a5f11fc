//! Integration tests for the drawing imports and guest console output.

mod common;

use kiln_bridge::{BridgeConfig, BridgeError, ConsoleLevel, Driver, HostEvent, INVALID_HANDLE};
use kiln_hostapi::{gl, DrawCommand, GlCommand, Point, Rect, RecordingGl, RecordingSurface, Rgba};

use common::*;

fn frame(driver: &mut Driver) -> Result<(), BridgeError> {
    driver.dispatch(HostEvent::AnimationFrame {
        width: 200.0,
        height: 100.0,
    })
}

// ── Canvas ──

const CANVAS_IMPORTS: &str = r#"
  (import "env" "canvas_clear" (func $clear))
  (import "env" "canvas_fill_rect"
    (func $fill_rect (param f32 f32 f32 f32 i32 i32 i32 i32)))
  (import "env" "canvas_fill_rounded_rect"
    (func $fill_rounded (param f32 f32 f32 f32 f32 i32 i32 i32 i32)))
  (import "env" "canvas_stroke_line"
    (func $stroke (param f32 f32 f32 f32 f32 i32 i32 i32 i32)))
"#;

const CANVAS_FRAME: &str = r#"
    call $clear
    f32.const 1 f32.const 2 f32.const 10 f32.const 20
    i32.const 255 i32.const 0 i32.const 0 i32.const 255
    call $fill_rect
    f32.const 0 f32.const 0 f32.const 20 f32.const 10 f32.const 50
    i32.const 0 i32.const 255 i32.const 0 i32.const 128
    call $fill_rounded
    f32.const 0 f32.const 0 f32.const 3 f32.const 4 f32.const 1
    i32.const 0 i32.const 0 i32.const 255 i32.const 255
    call $stroke
"#;

#[test]
fn test_canvas_frame_is_scaled_to_device_pixels() {
    let wat = primary_wat(CANVAS_FRAME, CANVAS_IMPORTS);
    let surface = RecordingSurface::new(400, 200);
    let log = surface.log();
    let config = BridgeConfig {
        pixel_ratio: 2.0,
        ..BridgeConfig::default()
    };
    let bridge =
        ready_bridge(source_with(&[(APP_PATH, wat.as_str())]), config).with_surface(surface);
    let mut driver = Driver::new(bridge).unwrap();
    frame(&mut driver).unwrap();

    assert_eq!(
        log.snapshot(),
        vec![
            DrawCommand::Clear,
            DrawCommand::FillRect {
                rect: Rect::new(2.0, 4.0, 20.0, 40.0),
                color: Rgba::new(255, 0, 0, 255),
            },
            DrawCommand::FillRoundedRect {
                rect: Rect::new(0.0, 0.0, 40.0, 20.0),
                radius: 10.0,
                color: Rgba::new(0, 255, 0, 128),
            },
            DrawCommand::StrokeLine {
                from: Point::new(0.0, 0.0),
                to: Point::new(6.0, 8.0),
                thickness: 2.0,
                color: Rgba::new(0, 0, 255, 255),
            },
        ]
    );
}

#[test]
fn test_canvas_without_surface_traps() {
    let wat = primary_wat(CANVAS_FRAME, CANVAS_IMPORTS);
    let bridge = ready_bridge(source_with(&[(APP_PATH, wat.as_str())]), BridgeConfig::default());
    let mut driver = Driver::new(bridge).unwrap();
    let err = frame(&mut driver).unwrap_err();
    assert!(matches!(err, BridgeError::MissingBackend("2d surface")));
}

// ── GL ──

const GL_IMPORTS: &str = r#"
  (import "env" "gl_create_shader" (func $create_shader (param i32) (result i32)))
  (import "env" "gl_shader_source" (func $shader_source (param i32 i32)))
  (import "env" "gl_compile_shader" (func $compile (param i32)))
  (import "env" "gl_create_program" (func $create_program (result i32)))
  (import "env" "gl_attach_shader" (func $attach (param i32 i32)))
  (import "env" "gl_link_program" (func $link (param i32)))
  (import "env" "gl_use_program" (func $use (param i32)))
  (import "env" "gl_get_attrib_location" (func $attrib (param i32 i32) (result i32)))
  (import "env" "gl_enable_vertex_attrib_array" (func $enable_attrib (param i32)))
  (import "env" "gl_draw_arrays" (func $draw (param i32 i32 i32)))

  (data (i32.const 1024) "attribute vec2 position;\0avoid main() {}\00")
  (data (i32.const 1100) "void main() {}\00")
  (data (i32.const 1200) "position\00")
  (data (i32.const 1220) "nope\00")

  (global $program (mut i32) (i32.const -1))

  (func (export "setup") (result i32)
    (local $vs i32) (local $fs i32)
    i32.const 0x8B31 call $create_shader local.set $vs
    local.get $vs i32.const 1024 call $shader_source
    local.get $vs call $compile
    i32.const 0x8B30 call $create_shader local.set $fs
    local.get $fs i32.const 1100 call $shader_source
    local.get $fs call $compile
    call $create_program global.set $program
    global.get $program local.get $vs call $attach
    global.get $program local.get $fs call $attach
    global.get $program call $link
    global.get $program call $use
    global.get $program)

  (func (export "attrib") (param i32) (result i32)
    global.get $program local.get 0 call $attrib)
  (func (export "enable_attrib") (param i32)
    local.get 0 call $enable_attrib)
  (func (export "draw")
    i32.const 4 i32.const 0 i32.const 3 call $draw)
  (func (export "bad_shader") (result i32)
    i32.const 0x1234 call $create_shader)
"#;

fn gl_bridge() -> (kiln_bridge::Bridge, kiln_hostapi::CommandLog<GlCommand>) {
    let wat = primary_wat("", GL_IMPORTS);
    let gl = RecordingGl::new();
    let log = gl.log();
    let source = source_with(&[(APP_PATH, wat.as_str())]);
    let bridge = ready_bridge(source, BridgeConfig::default()).with_gl(gl);
    (bridge, log)
}

#[test]
fn test_gl_program_setup_and_draw() {
    let (mut bridge, log) = gl_bridge();
    let program: i32 = bridge.call_primary("setup", ()).unwrap();
    assert_eq!(program, 0);
    assert_eq!(bridge.context().resources().shaders.len(), 2);

    let position: i32 = bridge.call_primary("attrib", 1200).unwrap();
    assert_eq!(position, 0);
    bridge.call_primary::<i32, ()>("enable_attrib", position).unwrap();
    bridge.call_primary::<(), ()>("draw", ()).unwrap();

    let commands = log.snapshot();
    assert!(matches!(
        commands[0],
        GlCommand::ShaderSource { ref source, .. } if source.starts_with("attribute vec2 position;")
    ));
    assert!(commands
        .iter()
        .any(|c| matches!(c, GlCommand::EnableVertexAttribArray(_))));
    assert_eq!(
        commands.last(),
        Some(&GlCommand::DrawArrays {
            mode: gl::TRIANGLES,
            first: 0,
            count: 3
        })
    );
}

#[test]
fn test_unknown_attribute_is_invalid_handle() {
    let (mut bridge, _log) = gl_bridge();
    bridge.call_primary::<(), i32>("setup", ()).unwrap();
    let missing: i32 = bridge.call_primary("attrib", 1220).unwrap();
    assert_eq!(missing, INVALID_HANDLE);

    let err = bridge
        .call_primary::<i32, ()>("enable_attrib", missing)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Handle(_)));
}

#[test]
fn test_handles_never_reused() {
    let (mut bridge, _log) = gl_bridge();
    bridge.call_primary::<(), i32>("setup", ()).unwrap();
    let first: i32 = bridge.call_primary("attrib", 1200).unwrap();
    let second: i32 = bridge.call_primary("attrib", 1200).unwrap();
    assert_eq!((first, second), (0, 1));
}

#[test]
fn test_refused_shader_type_returns_invalid_handle() {
    let (mut bridge, _log) = gl_bridge();
    let shader: i32 = bridge.call_primary("bad_shader", ()).unwrap();
    assert_eq!(shader, INVALID_HANDLE);
    assert!(bridge.context().resources().shaders.is_empty());
}

// ── Console ──

#[test]
fn test_console_output_captured() {
    let config = BridgeConfig {
        console_history: 8,
        ..BridgeConfig::default()
    };
    let bridge = ready_app(config);
    let lines: Vec<_> = bridge.context().console_history().cloned().collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].level, ConsoleLevel::Log);
    assert_eq!(lines[0].message, "guest ready");
}

#[test]
fn test_console_null_pointer_traps() {
    let wat = primary_wat(
        "",
        r#"(import "env" "console_warn" (func $warn (param i32)))
           (func (export "warn_null") i32.const 0 call $warn)"#,
    );
    let source = source_with(&[(APP_PATH, wat.as_str())]);
    let mut bridge = ready_bridge(source, BridgeConfig::default());
    let err = bridge.call_primary::<(), ()>("warn_null", ()).unwrap_err();
    assert!(matches!(err, BridgeError::Marshal(_)));
}

const PRINT_IMPORTS: &str = r#"
  (import "env" "print_number" (func $print_number (param i32)))
  (import "env" "print_integer" (func $print_integer (param i32 i32)))
  (import "env" "print_float" (func $print_float (param i32 f64)))
  (import "env" "print_string" (func $print_string (param i32 i32)))
  (import "env" "print_call_stack" (func $print_call_stack (param i32)))

  (data (i32.const 1024) "frames\00")
  (data (i32.const 1040) "scale\00")
  (data (i32.const 1056) "mode\00")
  (data (i32.const 1072) "fast\00")
  (data (i32.const 1088) "render\00")

  (func (export "report")
    i32.const 255 call $print_number
    i32.const 1024 i32.const -3 call $print_integer
    i32.const 1040 f64.const 1.5 call $print_float
    i32.const 1056 i32.const 1072 call $print_string
    i32.const 1088 call $print_call_stack)
"#;

#[test]
fn test_print_family_formats_lines() {
    let wat = primary_wat("", PRINT_IMPORTS);
    let config = BridgeConfig {
        console_history: 8,
        ..BridgeConfig::default()
    };
    let mut bridge = ready_bridge(source_with(&[(APP_PATH, wat.as_str())]), config);
    bridge.call_primary::<(), ()>("report", ()).unwrap();

    let lines: Vec<_> = bridge.context().console_history().cloned().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines.iter().all(|l| l.level == ConsoleLevel::Log));
    assert_eq!(lines[0].message, "Number: 0xff (255)");
    assert_eq!(lines[1].message, "frames: -3");
    assert_eq!(lines[2].message, "scale: 1.5");
    assert_eq!(lines[3].message, "mode: fast");
    assert!(lines[4].message.starts_with("render (Stack Trace):\n"));
}
