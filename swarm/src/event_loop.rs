use std::{sync::Arc, time::Instant};

use log::{error, info};
use winit::{
    application::ApplicationHandler,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::{
    config::SwarmConfig,
    constants::{DEFAULT_NODE_COUNT, PRESETS},
    gpu::WgpuDevice,
    lifecycle::Lifecycle,
};

#[derive(Debug, Default, Clone)]
pub struct KeyTrigger {
    pressed: bool,
    trigger: bool,
}

impl KeyTrigger {
    pub fn event(&mut self, is_pressed: bool) {
        match (self.pressed, is_pressed) {
            (true, true) => (),
            (true, false) => self.pressed = false,
            (false, true) => {
                self.pressed = true;
                self.trigger = true;
            }
            (false, false) => (),
        }
    }

    pub fn get_trigger(&mut self) -> bool {
        let t = self.trigger;
        self.trigger = false;
        t
    }
}

/// A change of population asked for from the keyboard.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PopulationRequest {
    Set(u64),
    Double,
    Halve,
    Restart,
}

impl PopulationRequest {
    /// The node count to reconfigure to, or `None` when nothing changes.
    pub fn resolve(self, current: u64) -> Option<u64> {
        let next = match self {
            PopulationRequest::Set(count) => count,
            PopulationRequest::Double => current.saturating_mul(2).max(1),
            PopulationRequest::Halve => current / 2,
            PopulationRequest::Restart => return Some(current),
        };
        (next != current).then_some(next)
    }
}

#[derive(Default, Clone)]
pub struct KeyboardState {
    pub presets: [KeyTrigger; 3],
    pub default: KeyTrigger,
    pub plus: KeyTrigger,
    pub minus: KeyTrigger,
    pub restart: KeyTrigger,
}

impl KeyboardState {
    pub fn event(&mut self, event: &KeyEvent) {
        let is_pressed = event.state.is_pressed();
        if let Key::Character(code) = &event.logical_key {
            match code.as_str() {
                "1" => self.presets[0].event(is_pressed),
                "2" => self.presets[1].event(is_pressed),
                "3" => self.presets[2].event(is_pressed),
                "0" => self.default.event(is_pressed),
                "+" | "=" => self.plus.event(is_pressed),
                "-" => self.minus.event(is_pressed),
                "r" => self.restart.event(is_pressed),
                _ => (),
            }
        }
    }

    pub fn take_request(&mut self) -> Option<PopulationRequest> {
        for (trigger, count) in self.presets.iter_mut().zip(PRESETS) {
            if trigger.get_trigger() {
                return Some(PopulationRequest::Set(count));
            }
        }
        if self.default.get_trigger() {
            return Some(PopulationRequest::Set(DEFAULT_NODE_COUNT));
        }
        if self.plus.get_trigger() {
            return Some(PopulationRequest::Double);
        }
        if self.minus.get_trigger() {
            return Some(PopulationRequest::Halve);
        }
        if self.restart.get_trigger() {
            return Some(PopulationRequest::Restart);
        }
        None
    }
}

pub struct SwarmApp {
    config: SwarmConfig,
    window: Option<Arc<Window>>,
    lifecycle: Option<Lifecycle<WgpuDevice>>,
    keyboard: KeyboardState,
    requested: u64,
    fatal: Option<anyhow::Error>,
}

impl SwarmApp {
    pub fn new(config: SwarmConfig) -> Self {
        let requested = config.nodes;
        Self {
            config,
            window: None,
            lifecycle: None,
            keyboard: KeyboardState::default(),
            requested,
            fatal: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let (width, height) = self.config.window_size;
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title("swarm")
                    .with_inner_size(winit::dpi::LogicalSize::new(width, height)),
            )?,
        );

        let device = WgpuDevice::new(window.clone())?;
        let mut lifecycle =
            Lifecycle::new(device, self.config.chunk_capacity, self.config.seed)?;
        lifecycle.start(self.requested)?;

        window.request_redraw();
        self.window = Some(window);
        self.lifecycle = Some(lifecycle);
        Ok(())
    }

    fn apply_requests(&mut self) {
        let Some(lifecycle) = self.lifecycle.as_mut() else {
            return;
        };
        while let Some(request) = self.keyboard.take_request() {
            let current = lifecycle.node_count().unwrap_or(self.requested);
            let Some(next) = request.resolve(current) else {
                continue;
            };

            info!("Reconfiguring from {current} to {next} nodes");
            self.requested = next;
            if let Err(err) = lifecycle.reconfigure(next) {
                error!("Reconfigure to {next} nodes failed: {err}");
            }
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(lifecycle) = self.lifecycle.as_mut() {
            lifecycle.stop();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for SwarmApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fatal = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("The close button was pressed; stopping");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(lifecycle) = self.lifecycle.as_mut() {
                    lifecycle.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.logical_key == Key::Named(NamedKey::Escape) {
                    self.shutdown(event_loop);
                    return;
                }
                self.keyboard.event(&event);
                self.apply_requests();
            }
            WindowEvent::RedrawRequested => {
                let (Some(window), Some(lifecycle)) = (&self.window, self.lifecycle.as_mut())
                else {
                    return;
                };
                if let Some(sample) = lifecycle.tick(Instant::now()) {
                    info!("{sample}");
                    window.set_title(&format!("swarm - {sample}"));
                }
                if lifecycle.is_scheduled() {
                    window.request_redraw();
                }
            }
            _ => (),
        }
    }
}

/// Opens the window and runs until it is closed.
pub fn run(config: SwarmConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = SwarmApp::new(config);
    event_loop.run_app(&mut app)?;

    // Release device resources before the window goes away.
    drop(app.lifecycle.take());
    if let Some(err) = app.fatal.take() {
        return Err(err);
    }
    Ok(())
}
