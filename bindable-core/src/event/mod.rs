//! Change Notification
//!
//! Every bindable owns two fixed channels: one carrying
//! [`ValueChangedEvent`]s, one carrying the new disabled flag. This module
//! holds the channel type and its payloads; it knows nothing about bindings.

mod channel;
mod observer;
mod value_changed;

pub use channel::Event;
pub use observer::ObserverId;
pub use value_changed::ValueChangedEvent;
