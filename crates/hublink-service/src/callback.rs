//! Callback slots handed over by the host container.
//!
//! Hosts pass handlers through loosely typed slots, so a slot can hold a
//! callable, nothing at all, or a value that is not callable. Validation
//! happens at the call site, before any registration or send side effect,
//! so a rejected slot never leaves a partial registration behind.

use crate::error::HubError;

/// A callback argument as received from the host.
#[derive(Clone, Default)]
pub enum CallbackSlot<F> {
    /// No callback was supplied.
    #[default]
    Absent,
    /// A callable handler.
    Callable(F),
    /// The host supplied something that is not callable.
    NotCallable,
}

impl<F> CallbackSlot<F> {
    /// Whether the slot is empty.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, CallbackSlot::Absent)
    }

    /// The callback, required: absent and non-callable slots both fail.
    ///
    /// This is the lifecycle-event rule, where a callback must always be
    /// supplied.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] unless the slot is callable.
    pub fn require(&self) -> Result<&F, HubError> {
        match self {
            CallbackSlot::Callable(f) => Ok(f),
            CallbackSlot::Absent | CallbackSlot::NotCallable => Err(HubError::InvalidCallback),
        }
    }

    /// The callback, optional: absent is permitted, non-callable fails.
    ///
    /// This is the send/receive rule, where the callback argument may be
    /// omitted entirely.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidCallback`] if the slot holds something
    /// that is not callable.
    pub fn optional(&self) -> Result<Option<&F>, HubError> {
        match self {
            CallbackSlot::Callable(f) => Ok(Some(f)),
            CallbackSlot::Absent => Ok(None),
            CallbackSlot::NotCallable => Err(HubError::InvalidCallback),
        }
    }
}

impl<F> From<F> for CallbackSlot<F> {
    fn from(callback: F) -> Self {
        CallbackSlot::Callable(callback)
    }
}
