//! The payload delivered on a bindable's value channel.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fired when a value changes, carrying the old and new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValueChangedEvent<T> {
    /// The value before the change.
    pub old_value: T,
    /// The value after the change.
    pub new_value: T,
}

impl<T> ValueChangedEvent<T> {
    /// Pair an old value with the value that replaced it.
    pub fn new(old_value: T, new_value: T) -> Self {
        Self {
            old_value,
            new_value,
        }
    }
}
