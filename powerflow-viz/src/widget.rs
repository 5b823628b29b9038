//! The card element's state, exposed to JavaScript

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Function;
use powerflow::{NodeType, PowerFlowCard};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::ShellError;
use crate::frame::FrameLoop;

/// One card element on the page
#[wasm_bindgen]
pub struct PowerFlowWidget {
    card: Rc<RefCell<PowerFlowCard>>,
    frames: Option<FrameLoop>,
}

impl Default for PowerFlowWidget {
    fn default() -> Self {
        Self::new()
    }
}

fn call_with_json(callback: &Function, json: &str) {
    if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(json)) {
        tracing::warn!(?err, "card callback failed");
    }
}

#[wasm_bindgen]
impl PowerFlowWidget {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            card: Rc::new(RefCell::new(PowerFlowCard::new())),
            frames: None,
        }
    }

    /// Apply a JSON configuration
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&self, json: &str) -> Result<(), JsValue> {
        self.card
            .borrow_mut()
            .set_config_json(json)
            .map_err(ShellError::from)?;
        Ok(())
    }

    /// Replace the sensor states with a JSON object keyed by entity id
    #[wasm_bindgen(js_name = updateStates)]
    pub fn update_states(&self, json: &str) -> Result<(), JsValue> {
        self.card
            .borrow_mut()
            .update_states_json(json)
            .map_err(ShellError::from)?;
        Ok(())
    }

    /// Render data for the current cycle, as JSON
    pub fn render(&self) -> Result<String, JsValue> {
        let output = self.card.borrow_mut().render().map_err(ShellError::from)?;
        Ok(serde_json::to_string(&output).map_err(ShellError::from)?)
    }

    /// Start animating; `on_frame` receives each frame's dots as JSON
    pub fn connected(&mut self, on_frame: Function) -> Result<(), JsValue> {
        self.card.borrow_mut().connect();
        if self.frames.as_ref().is_some_and(FrameLoop::is_running) {
            return Ok(());
        }
        let card = self.card.clone();
        let frames = FrameLoop::start(move |timestamp| {
            let Some(dots) = card.borrow_mut().animate(timestamp) else {
                return false;
            };
            match serde_json::to_string(&dots) {
                Ok(json) => call_with_json(&on_frame, &json),
                Err(err) => tracing::warn!(%err, "could not encode dots"),
            }
            true
        })?;
        self.frames = Some(frames);
        Ok(())
    }

    /// Stop animating
    pub fn disconnected(&mut self) {
        self.card.borrow_mut().disconnect();
        if let Some(frames) = self.frames.take() {
            frames.stop();
        }
    }

    /// Report the element's width. The size is applied on the next tick and
    /// `on_resize` receives the updated style as JSON.
    pub fn resize(&self, width: f64, on_resize: Function) -> Result<(), JsValue> {
        if !self.card.borrow_mut().request_resize(width) {
            return Ok(());
        }
        let window = web_sys::window().ok_or(ShellError::WindowNotAvailable)?;
        let card = self.card.clone();
        let flush = Closure::once_into_js(move || {
            let style = {
                let mut card = card.borrow_mut();
                card.flush_resize().and_then(|_| card.style().ok())
            };
            let Some(style) = style else {
                return;
            };
            match serde_json::to_string(&style) {
                Ok(json) => call_with_json(&on_resize, &json),
                Err(err) => tracing::warn!(%err, "could not encode style"),
            }
        });
        window
            .set_timeout_with_callback_and_timeout_and_arguments_0(flush.unchecked_ref(), 0)
            .map_err(|e| ShellError::Schedule(format!("{:?}", e)))?;
        Ok(())
    }

    /// Size hint in dashboard rows
    #[wasm_bindgen(js_name = cardSize)]
    pub fn card_size(&self, client_height: f64) -> u32 {
        self.card.borrow().card_size(client_height)
    }

    /// Details request for a clicked node as JSON, or `undefined` when the
    /// node has no sensor to show
    #[wasm_bindgen(js_name = nodeClicked)]
    pub fn node_clicked(&self, node: &str) -> Result<Option<String>, JsValue> {
        let node = NodeType::parse(node).ok_or_else(|| ShellError::UnknownNode(node.to_string()))?;
        match self.card.borrow().node_clicked(node) {
            Some(request) => Ok(Some(
                serde_json::to_string(&request).map_err(ShellError::from)?,
            )),
            None => Ok(None),
        }
    }

    /// Details request for a clicked detail tile, as JSON
    #[wasm_bindgen(js_name = detailClicked)]
    pub fn detail_clicked(&self, entity_id: &str) -> Result<String, JsValue> {
        let request = self.card.borrow().detail_clicked(entity_id);
        Ok(serde_json::to_string(&request).map_err(ShellError::from)?)
    }
}
