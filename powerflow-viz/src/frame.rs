//! requestAnimationFrame loop
//!
//! Calls a frame handler once per browser frame until the handler asks to
//! stop or the loop is stopped from outside.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Window;

use crate::ShellError;

type FrameClosure = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Handle to a running frame loop; dropping it stops the loop
pub struct FrameLoop {
    window: Window,
    running: Rc<Cell<bool>>,
    request_id: Rc<Cell<Option<i32>>>,
    closure: FrameClosure,
}

impl FrameLoop {
    /// Start the loop. `on_frame` receives the frame timestamp in
    /// milliseconds and returns whether another frame is wanted.
    pub fn start<F>(mut on_frame: F) -> Result<Self, ShellError>
    where
        F: FnMut(f64) -> bool + 'static,
    {
        let window = web_sys::window().ok_or(ShellError::WindowNotAvailable)?;
        let running = Rc::new(Cell::new(true));
        let request_id = Rc::new(Cell::new(None::<i32>));
        let closure: FrameClosure = Rc::new(RefCell::new(None));

        let frame_window = window.clone();
        let frame_running = running.clone();
        let frame_request = request_id.clone();
        let frame_closure = closure.clone();
        *closure.borrow_mut() = Some(Closure::wrap(Box::new(move |timestamp: f64| {
            frame_request.set(None);
            if !frame_running.get() {
                return;
            }
            if !on_frame(timestamp) {
                frame_running.set(false);
                return;
            }
            match schedule(&frame_window, &frame_closure) {
                Ok(id) => frame_request.set(Some(id)),
                Err(err) => {
                    tracing::warn!(%err, "animation loop stopped");
                    frame_running.set(false);
                }
            }
        }) as Box<dyn FnMut(f64)>));

        request_id.set(Some(schedule(&window, &closure)?));
        Ok(Self {
            window,
            running,
            request_id,
            closure,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Stop the loop and cancel the pending frame
    pub fn stop(&self) {
        self.running.set(false);
        if let Some(id) = self.request_id.take() {
            if let Err(err) = self.window.cancel_animation_frame(id) {
                tracing::debug!(?err, "could not cancel animation frame");
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
        // the closure holds a handle to itself; release it
        self.closure.borrow_mut().take();
    }
}

fn schedule(window: &Window, closure: &FrameClosure) -> Result<i32, ShellError> {
    let closure = closure.borrow();
    let callback = closure.as_ref().ok_or(ShellError::LoopReleased)?;
    window
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|e| ShellError::Schedule(format!("{:?}", e)))
}
