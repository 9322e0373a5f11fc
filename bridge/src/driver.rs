//! Event and frame driver.
//!
//! Translates host input events into calls on the primary module's ABI
//! exports. Every animation frame delivers pending fetches first, then
//! renders, then asks the event source for the next frame.

use std::collections::VecDeque;

use crate::error::BridgeError;
use crate::runtime::Bridge;

/// Input from the embedding host. Pointer positions are window coordinates
/// in device-independent units; frame sizes are in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    PointerMoved { x: f64, y: f64 },
    ButtonDown { button: i32, x: f64, y: f64 },
    ButtonUp { button: i32, x: f64, y: f64 },
    KeyDown { key: i32 },
    KeyUp { key: i32 },
    AnimationFrame { width: f64, height: f64 },
}

/// Where the driver pulls events from.
pub trait EventSource {
    /// The next event, or `None` when the host is shutting down.
    fn next_event(&mut self) -> Option<HostEvent>;

    /// Schedule another `AnimationFrame`. Called once after each frame.
    fn request_frame(&mut self);
}

/// A fixed event script, for tests and headless runs.
///
/// Frame requests are counted. With a frame budget, each request also
/// queues another frame of the given size until the budget runs out.
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    queue: VecDeque<HostEvent>,
    frames_requested: usize,
    frame_budget: usize,
    frame_size: (f64, f64),
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = HostEvent>) -> Self {
        Self {
            queue: events.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Answer up to `frames` frame requests with a new frame.
    pub fn with_frame_budget(mut self, frames: usize, width: f64, height: f64) -> Self {
        self.frame_budget = frames;
        self.frame_size = (width, height);
        self
    }

    pub fn push(&mut self, event: HostEvent) {
        self.queue.push_back(event);
    }

    pub fn frames_requested(&self) -> usize {
        self.frames_requested
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl EventSource for ScriptedEvents {
    fn next_event(&mut self) -> Option<HostEvent> {
        self.queue.pop_front()
    }

    fn request_frame(&mut self) {
        self.frames_requested += 1;
        if self.frame_budget > 0 {
            self.frame_budget -= 1;
            let (width, height) = self.frame_size;
            self.queue.push_back(HostEvent::AnimationFrame { width, height });
        }
    }
}

/// Counters for a driver's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub events: usize,
    pub frames: usize,
    pub fetches_delivered: usize,
    pub protected_region_faults: usize,
}

/// Feeds host events to an initialized guest.
pub struct Driver {
    bridge: Bridge,
    stats: RunStats,
}

impl Driver {
    /// Requires `Bridge::compute_layout` to have run.
    pub fn new(bridge: Bridge) -> Result<Self, BridgeError> {
        if bridge.layout().is_none() {
            return Err(BridgeError::LayoutNotComputed);
        }
        Ok(Self {
            bridge,
            stats: RunStats::default(),
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    pub fn into_bridge(self) -> Bridge {
        self.bridge
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Drain `source` until it ends or a guest call fails.
    ///
    /// A trap stops the run: the guest's state is unknown afterwards.
    pub fn run(&mut self, source: &mut impl EventSource) -> Result<RunStats, BridgeError> {
        while let Some(event) = source.next_event() {
            self.dispatch(event)?;
            if matches!(event, HostEvent::AnimationFrame { .. }) {
                source.request_frame();
            }
        }
        log::debug!("event source exhausted: {:?}", self.stats);
        Ok(self.stats)
    }

    /// Deliver one event to the guest.
    pub fn dispatch(&mut self, event: HostEvent) -> Result<(), BridgeError> {
        self.stats.events += 1;
        let abi = self.bridge.config().abi.clone();
        match event {
            HostEvent::PointerMoved { x, y } => {
                let (x, y) = self.to_surface(x, y);
                self.bridge.call_primary::<(f64, f64), ()>(&abi.pointer_moved, (x, y))
            }
            HostEvent::ButtonDown { button, x, y } => {
                self.pointer_button(&abi.pointer_button, button, true, x, y)
            }
            HostEvent::ButtonUp { button, x, y } => {
                self.pointer_button(&abi.pointer_button, button, false, x, y)
            }
            HostEvent::KeyDown { key } => self.key_changed(&abi.key_changed, key, true),
            HostEvent::KeyUp { key } => self.key_changed(&abi.key_changed, key, false),
            HostEvent::AnimationFrame { width, height } => {
                self.frame(&abi.render_frame, width, height)
            }
        }
    }

    fn to_surface(&self, x: f64, y: f64) -> (f64, f64) {
        let (left, top) = self.bridge.config().container_offset;
        (x - left, y - top)
    }

    fn pointer_button(
        &mut self,
        export: &str,
        button: i32,
        pressed: bool,
        x: f64,
        y: f64,
    ) -> Result<(), BridgeError> {
        let (x, y) = self.to_surface(x, y);
        self.bridge
            .call_primary::<(i32, i32, f64, f64), ()>(export, (button, pressed as i32, x, y))
    }

    fn key_changed(&mut self, export: &str, key: i32, pressed: bool) -> Result<(), BridgeError> {
        match self.bridge.primary_export(export) {
            Some(func) => self.bridge.invoke::<(i32, i32), ()>(func, (key, pressed as i32)),
            None => {
                log::debug!("guest has no {} export; key {} ignored", export, key);
                Ok(())
            }
        }
    }

    fn frame(&mut self, export: &str, width: f64, height: f64) -> Result<(), BridgeError> {
        self.stats.fetches_delivered += self.bridge.deliver_fetches()?;

        let ratio = self.bridge.config().pixel_ratio;
        self.bridge
            .call_primary::<(f64, f64), ()>(export, (width / ratio, height / ratio))?;
        self.stats.frames += 1;

        if self.bridge.check_protected_region().is_some() {
            self.stats.protected_region_faults += 1;
        }
        Ok(())
    }
}
