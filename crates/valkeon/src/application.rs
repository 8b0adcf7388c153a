//! Application trait and main loop

use glfw::{Action, Key, WindowEvent};
use thiserror::Error;

use crate::assets::AssetError;
use crate::config::ConfigError;
use crate::render::vulkan::{VulkanError, Window, WindowError};

/// A demo that owns its window and renders one frame per call
pub trait Application {
    /// The demo's window
    fn window(&mut self) -> &mut Window;

    /// Render and present one frame
    fn draw_frame(&mut self) -> Result<(), AppError>;

    /// Block until the GPU has finished all submitted work
    fn wait_idle(&self) -> Result<(), AppError>;

    /// Called when the framebuffer size changed
    fn framebuffer_resized(&mut self, _width: u32, _height: u32) {}
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Vulkan failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Asset loading failure
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Configuration failure
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Whether `event` asks the loop to stop
pub fn is_close_request(event: &WindowEvent) -> bool {
    matches!(
        event,
        WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close
    )
}

/// Poll events and draw frames until the window closes, then wait for the GPU
pub fn run<A: Application>(app: &mut A) -> Result<(), AppError> {
    log::info!("Entering main loop");
    let start = app.window().time();
    let mut frames: u64 = 0;

    let result = loop {
        if app.window().should_close() {
            break Ok(());
        }

        app.window().poll_events();
        let events: Vec<WindowEvent> = app.window().flush_events().map(|(_, event)| event).collect();
        for event in &events {
            if is_close_request(event) {
                app.window().set_should_close(true);
            } else if let WindowEvent::FramebufferSize(width, height) = *event {
                app.framebuffer_resized(width.max(0) as u32, height.max(0) as u32);
            }
        }
        if app.window().should_close() {
            break Ok(());
        }

        if let Err(e) = app.draw_frame() {
            log::error!("Frame {frames} failed: {e}");
            break Err(e);
        }
        frames += 1;
    };

    app.wait_idle()?;

    let elapsed = app.window().time() - start;
    if elapsed > 0.0 {
        log::info!(
            "Main loop finished: {frames} frames in {elapsed:.1}s ({:.1} fps)",
            frames as f64 / elapsed
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_and_close_stop_the_loop() {
        assert!(is_close_request(&WindowEvent::Key(
            Key::Escape,
            0,
            Action::Press,
            glfw::Modifiers::empty()
        )));
        assert!(is_close_request(&WindowEvent::Close));
        assert!(!is_close_request(&WindowEvent::Key(
            Key::Escape,
            0,
            Action::Release,
            glfw::Modifiers::empty()
        )));
        assert!(!is_close_request(&WindowEvent::FramebufferSize(10, 10)));
    }

    #[test]
    fn test_errors_convert_into_app_error() {
        let err: AppError = VulkanError::NoSuitableDevice.into();
        assert!(matches!(err, AppError::Vulkan(_)));
        let err: AppError = AssetError::NotFound("duck".to_string()).into();
        assert!(err.to_string().contains("duck"));
    }
}
