//! Panic payload rendering.

use std::any::Any;

/// Extracts the message carried by a caught panic payload.
///
/// Payloads raised through `panic!` carry either a `&'static str` or a
/// `String`; anything else renders as `"unknown panic"`.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
