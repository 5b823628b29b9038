//! Browser bindings for the GivTCP power flow card
//!
//! This crate wraps [`powerflow::PowerFlowCard`] for the dashboard page: it
//! registers the card with the page's card picker, exchanges configuration,
//! states and render data as JSON, and runs the dot animation on
//! `requestAnimationFrame`.

use js_sys::{Array, JSON, Reflect};
use powerflow::{CardError, CardInfo, CardRegistry};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

mod frame;
mod widget;

pub use frame::FrameLoop;
pub use widget::PowerFlowWidget;

/// Errors raised by the browser shell
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("window is not available")]
    WindowNotAvailable,

    #[error("failed to schedule callback: {0}")]
    Schedule(String),

    #[error("animation loop was released")]
    LoopReleased,

    #[error(transparent)]
    Card(#[from] CardError),

    #[error("failed to encode render data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown node: {0}")]
    UnknownNode(String),
}

impl From<ShellError> for JsValue {
    fn from(err: ShellError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Initialize WASM panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Add the card to `window.customCards` so the card picker lists it.
///
/// Returns `false` when the card was already registered.
#[wasm_bindgen(js_name = registerCard)]
pub fn register_card() -> Result<bool, JsValue> {
    let window = web_sys::window().ok_or(ShellError::WindowNotAvailable)?;
    let key = JsValue::from_str("customCards");
    let existing = Reflect::get(&window, &key)?;
    let cards: Array = if existing.is_undefined() || existing.is_null() {
        let cards = Array::new();
        Reflect::set(&window, &key, &cards)?;
        cards
    } else {
        existing.dyn_into()?
    };

    let mut registry = CardRegistry::new();
    let type_key = JsValue::from_str("type");
    for entry in cards.iter() {
        if let Some(card_type) = Reflect::get(&entry, &type_key)?.as_string() {
            let info = CardInfo {
                card_type,
                name: String::new(),
                description: String::new(),
            };
            if let Err(err) = registry.register(info) {
                tracing::warn!(%err, "page lists a card type more than once");
            }
        }
    }

    let info = CardInfo::power_flow();
    match registry.register(info.clone()) {
        Ok(()) => {
            let json = serde_json::to_string(&info).map_err(ShellError::from)?;
            cards.push(&JSON::parse(&json)?);
            Ok(true)
        }
        Err(CardError::DuplicateCard(_)) => Ok(false),
        Err(err) => Err(ShellError::from(err).into()),
    }
}
