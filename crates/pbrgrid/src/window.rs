use std::sync::Arc;

use anyhow::{anyhow, Result};
use renderer::{ColorSpaceMode, SurfaceSize, WgpuDevice};
use sceneconfig::SceneConfig;
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::window::WindowBuilder;

use crate::app::Application;
use crate::assets::LoadedTextures;
use crate::panel::PanelAction;

/// Opens a window and renders the grid until it is closed, or until
/// `frame_limit` frames have been presented.
pub fn run_window(config: SceneConfig, color_space: ColorSpaceMode, frame_limit: Option<u64>) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let size = PhysicalSize::new(config.surface.width, config.surface.height);
    let window = WindowBuilder::new()
        .with_title("PBR sphere grid")
        .with_inner_size(size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let inner = window.inner_size();
    let device = WgpuDevice::new(window.clone(), SurfaceSize::new(inner.width, inner.height), color_space)?;
    let loaded = LoadedTextures::load(&config.assets);
    let mut app = Application::new(device, config, color_space, loaded)?;
    let mut modifiers = ModifiersState::empty();
    info!("window ready; keys 1-7 and T toggle shading, R/G/B adjust albedo");

    let mut result = Ok(());
    let run_result = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::Resized(new_size) => {
                    app.notify_resize(new_size.width, new_size.height);
                    window.request_redraw();
                }
                WindowEvent::ModifiersChanged(state) => {
                    modifiers = state.state();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state != ElementState::Pressed || event.repeat {
                        return;
                    }
                    match &event.logical_key {
                        Key::Named(NamedKey::Escape) => elwt.exit(),
                        Key::Character(value) => {
                            if let Some(action) = PanelAction::from_key(value.as_str(), modifiers.shift_key()) {
                                app.apply_panel_action(action);
                                window.request_redraw();
                            }
                        }
                        _ => {}
                    }
                }
                WindowEvent::RedrawRequested => match app.render() {
                    Ok(_) => {
                        let presented = app.context().frames_presented();
                        if frame_limit.is_some_and(|limit| presented >= limit) {
                            info!(frames = presented, "frame limit reached");
                            elwt.exit();
                        }
                    }
                    Err(err) => {
                        let transient = err
                            .downcast_ref::<renderer::RenderError>()
                            .is_some_and(renderer::RenderError::is_transient_surface_error);
                        if transient {
                            warn!(error = %err, "surface unavailable; retrying next frame");
                        } else {
                            error!(error = ?err, "frame failed");
                            result = Err(err);
                            elwt.exit();
                        }
                    }
                },
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            _ => {}
        }
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    result
}
