//! Immediate-mode 2D drawing imports.
//!
//! Guests draw in device-independent units with `f32` coordinates and
//! `i32` colour components. Geometry is scaled by the configured pixel
//! ratio before it reaches the `Surface2d`.

use wasmtime::{Caller, Linker};

use kiln_hostapi::{Point, Rect, Rgba};

use crate::context::BridgeContext;
use crate::error::{BridgeError, HostCallError};
use crate::linker::IMPORT_MODULE;

/// Clamp a corner radius so opposite corners never overlap.
pub fn clamp_radius(radius: f64, width: f64, height: f64) -> f64 {
    radius.min(width / 2.0).min(height / 2.0).max(0.0)
}

impl BridgeContext {
    fn pixel_ratio(&self) -> f64 {
        self.config().pixel_ratio
    }

    pub(crate) fn canvas_clear(&mut self) -> Result<(), HostCallError> {
        if let Err(e) = self.surface_mut()?.clear() {
            log::warn!("canvas clear: {}", e);
        }
        Ok(())
    }

    pub(crate) fn canvas_fill_rect(
        &mut self,
        rect: Rect,
        color: Rgba,
    ) -> Result<(), HostCallError> {
        let rect = rect.scaled(self.pixel_ratio());
        if let Err(e) = self.surface_mut()?.fill_rect(rect, color) {
            log::warn!("canvas fill_rect: {}", e);
        }
        Ok(())
    }

    pub(crate) fn canvas_fill_rounded_rect(
        &mut self,
        rect: Rect,
        radius: f64,
        color: Rgba,
    ) -> Result<(), HostCallError> {
        let ratio = self.pixel_ratio();
        let radius = clamp_radius(radius, rect.width, rect.height) * ratio;
        let rect = rect.scaled(ratio);
        if let Err(e) = self.surface_mut()?.fill_rounded_rect(rect, radius, color) {
            log::warn!("canvas fill_rounded_rect: {}", e);
        }
        Ok(())
    }

    pub(crate) fn canvas_stroke_line(
        &mut self,
        from: Point,
        to: Point,
        thickness: f64,
        color: Rgba,
    ) -> Result<(), HostCallError> {
        let ratio = self.pixel_ratio();
        let surface = self.surface_mut()?;
        let (from, to) = (
            Point::new(from.x * ratio, from.y * ratio),
            Point::new(to.x * ratio, to.y * ratio),
        );
        if (to.x - from.x).hypot(to.y - from.y) <= 0.0 {
            return Ok(());
        }
        if let Err(e) = surface.stroke_line(from, to, thickness * ratio, color) {
            log::warn!("canvas stroke_line: {}", e);
        }
        Ok(())
    }
}

pub fn register_canvas_functions(linker: &mut Linker<BridgeContext>) -> Result<(), BridgeError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "canvas_clear",
        |mut caller: Caller<'_, BridgeContext>| -> anyhow::Result<()> {
            caller
                .data_mut()
                .canvas_clear()
                .map_err(|e| e.trap("canvas_clear"))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "canvas_fill_rect",
        |mut caller: Caller<'_, BridgeContext>,
         x: f32,
         y: f32,
         width: f32,
         height: f32,
         r: i32,
         g: i32,
         b: i32,
         a: i32|
         -> anyhow::Result<()> {
            let rect = Rect::new(x.into(), y.into(), width.into(), height.into());
            caller
                .data_mut()
                .canvas_fill_rect(rect, Rgba::from_i32s(r, g, b, a))
                .map_err(|e| e.trap("canvas_fill_rect"))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "canvas_fill_rounded_rect",
        |mut caller: Caller<'_, BridgeContext>,
         x: f32,
         y: f32,
         width: f32,
         height: f32,
         radius: f32,
         r: i32,
         g: i32,
         b: i32,
         a: i32|
         -> anyhow::Result<()> {
            let rect = Rect::new(x.into(), y.into(), width.into(), height.into());
            caller
                .data_mut()
                .canvas_fill_rounded_rect(rect, radius.into(), Rgba::from_i32s(r, g, b, a))
                .map_err(|e| e.trap("canvas_fill_rounded_rect"))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "canvas_stroke_line",
        |mut caller: Caller<'_, BridgeContext>,
         x1: f32,
         y1: f32,
         x2: f32,
         y2: f32,
         thickness: f32,
         r: i32,
         g: i32,
         b: i32,
         a: i32|
         -> anyhow::Result<()> {
            caller
                .data_mut()
                .canvas_stroke_line(
                    Point::new(x1.into(), y1.into()),
                    Point::new(x2.into(), y2.into()),
                    thickness.into(),
                    Rgba::from_i32s(r, g, b, a),
                )
                .map_err(|e| e.trap("canvas_stroke_line"))
        },
    )?;
    Ok(())
}
