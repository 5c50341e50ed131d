// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Idempotent deregistration capability.
//!
//! Every registration-like operation (router handlers, published services,
//! streaming calls) hands out a [`Registration`]. Closing it undoes exactly
//! what was registered; closing twice, or from several threads at once, runs
//! the undo action once.
//!
//! Dropping a `Registration` does **not** close it.

use parking_lot::Mutex;
use std::fmt;

type CloseFn = Box<dyn FnOnce() + Send>;

/// Handle used to undo a registration.
#[must_use = "dropping a Registration leaves it registered; call close() to undo it"]
pub struct Registration {
    on_close: Mutex<Option<CloseFn>>,
}

impl Registration {
    /// Registration running `on_close` the first time it is closed.
    pub fn new<F>(on_close: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            on_close: Mutex::new(Some(Box::new(on_close))),
        }
    }

    /// Registration closing every part, in order, when closed.
    pub fn all(parts: Vec<Registration>) -> Self {
        Self::new(move || {
            for part in parts {
                part.close();
            }
        })
    }

    /// Undo the registration. Later calls are no-ops.
    pub fn close(&self) {
        // Take under the lock, run outside it so the undo action may block.
        let on_close = self.on_close.lock().take();
        if let Some(on_close) = on_close {
            on_close();
        }
    }

    /// Whether `close` has already run.
    pub fn is_closed(&self) -> bool {
        self.on_close.lock().is_none()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("closed", &self.is_closed())
            .finish()
    }
}
