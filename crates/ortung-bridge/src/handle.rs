// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Weak handler references encoded as two integer words.
//
// A `Weak<dyn Handler>` is a fat pointer: a data pointer into the `Arc`
// allocation plus a vtable pointer. JNI and the Objective-C runtime can only
// carry primitives, so the pointer is split into `high` (data) and `low`
// (vtable) words and stored on the foreign object. The words are useless on
// their own and always travel as a pair.
//
// An `EncodedHandle` owns one weak count on the handler's allocation. That
// keeps the allocation header readable so `upgrade` can see the strong count
// reach zero, but it never keeps the handler itself alive.

use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::traits::Handler;

/// Two-word transport form of a `Weak<dyn Handler>`.
#[derive(Debug, PartialEq, Eq)]
pub struct EncodedHandle {
    high: u64,
    low: u64,
}

/// Encode a non-owning reference to `handler`.
pub fn register<H: Handler>(handler: &Arc<H>) -> EncodedHandle {
    let weak: Weak<H> = Arc::downgrade(handler);
    EncodedHandle::from_weak(weak)
}

/// Encode a handler that has already been erased to `dyn Handler`.
pub fn register_shared(handler: &Arc<dyn Handler>) -> EncodedHandle {
    EncodedHandle::from_weak(Arc::downgrade(handler))
}

impl EncodedHandle {
    /// Take ownership of `weak` and split it into words.
    pub fn from_weak(weak: Weak<dyn Handler>) -> Self {
        let raw: *const dyn Handler = Weak::into_raw(weak);
        // SAFETY: a `*const dyn Handler` is exactly two pointer-sized words
        // (data, vtable), which is the layout of `[usize; 2]`.
        let words: [usize; 2] = unsafe { std::mem::transmute(raw) };
        Self {
            high: words[0] as u64,
            low: words[1] as u64,
        }
    }

    /// Reclaim a pair previously produced by [`EncodedHandle::into_words`].
    ///
    /// # Safety
    ///
    /// `high` and `low` must come from one `into_words` call on this process
    /// and must not have been reclaimed already (each pair owns exactly one
    /// weak count). Arbitrary bit patterns are undefined behaviour; nothing
    /// here validates them.
    pub unsafe fn from_words(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// The `(high, low)` words, without giving up ownership.
    pub fn words(&self) -> (u64, u64) {
        (self.high, self.low)
    }

    /// Hand the words (and the weak count they own) to a foreign object.
    ///
    /// The foreign side must eventually pass them back through
    /// [`EncodedHandle::from_words`] and drop the result, or the allocation
    /// header of the handler is leaked. The handler itself is freed either
    /// way.
    pub fn into_words(self) -> (u64, u64) {
        let this = ManuallyDrop::new(self);
        (this.high, this.low)
    }

    /// Try to obtain a temporary strong reference to the handler.
    ///
    /// Checked fresh on every call. Returns `None` once the owner has
    /// dropped the last strong reference.
    pub fn decode(&self) -> Option<Upgraded> {
        self.with_weak(|weak| weak.upgrade()).map(|handler| Upgraded {
            handler,
            _not_send: PhantomData,
        })
    }

    /// Whether the handler is still alive at this instant.
    pub fn is_live(&self) -> bool {
        self.with_weak(|weak| weak.strong_count() > 0)
    }

    fn with_weak<R>(&self, f: impl FnOnce(&Weak<dyn Handler>) -> R) -> R {
        // SAFETY: the words were produced by `Weak::into_raw` and this
        // handle still owns that weak count, so the allocation is valid.
        // `ManuallyDrop` leaves the count untouched.
        let weak = ManuallyDrop::new(unsafe { Weak::from_raw(self.as_ptr()) });
        f(&weak)
    }

    fn as_ptr(&self) -> *const dyn Handler {
        let words = [self.high as usize, self.low as usize];
        // SAFETY: inverse of the transmute in `from_weak`.
        unsafe { std::mem::transmute::<[usize; 2], *const dyn Handler>(words) }
    }
}

impl Drop for EncodedHandle {
    fn drop(&mut self) {
        // SAFETY: this handle owns exactly one weak count; give it back.
        drop(unsafe { Weak::from_raw(self.as_ptr()) });
    }
}

/// A strong handler reference scoped to one dispatch.
///
/// Not `Clone` and not `Send`: it lives on the invoking thread's stack and
/// is gone when the dispatch returns.
pub struct Upgraded {
    handler: Arc<dyn Handler>,
    _not_send: PhantomData<*const ()>,
}

impl Deref for Upgraded {
    type Target = dyn Handler;

    fn deref(&self) -> &Self::Target {
        &*self.handler
    }
}
