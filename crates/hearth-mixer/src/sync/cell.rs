//! Single-writer cross-thread values
//!
//! Every scalar shared between the control thread and the mix thread is a
//! [`SharedValue`]. Each value has exactly one owning thread that may write
//! it; any thread may read the most recently published value without locking.
//!
//! Loads use `Acquire` and stores use `Release`, so a reader that observes a
//! value also observes everything the writer published before it.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// The two threads that talk to the mixing core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioThread {
    /// Control/game thread (owns the `AudioMixer`)
    Main,
    /// Dedicated real-time mix thread
    Mix,
}

thread_local! {
    static CURRENT_ROLE: Cell<AudioThread> = const { Cell::new(AudioThread::Main) };
}

/// Tag the calling thread with its role
///
/// Threads default to [`AudioThread::Main`]; the mix thread tags itself on
/// entry. Only used for debug ownership checks.
pub fn mark_current_thread(role: AudioThread) {
    CURRENT_ROLE.with(|current| current.set(role));
}

/// Role of the calling thread
pub fn current_thread() -> AudioThread {
    CURRENT_ROLE.with(|current| current.get())
}

/// A scalar that can live in a [`SharedValue`]
pub trait CellValue: Copy + Send + Sync + 'static {
    type Atomic: Send + Sync;

    fn new_atomic(value: Self) -> Self::Atomic;
    fn load(atomic: &Self::Atomic) -> Self;
    fn store(atomic: &Self::Atomic, value: Self);
}

impl CellValue for f32 {
    type Atomic = AtomicU32;

    fn new_atomic(value: Self) -> AtomicU32 {
        AtomicU32::new(value.to_bits())
    }

    #[inline]
    fn load(atomic: &AtomicU32) -> Self {
        f32::from_bits(atomic.load(Ordering::Acquire))
    }

    #[inline]
    fn store(atomic: &AtomicU32, value: Self) {
        atomic.store(value.to_bits(), Ordering::Release);
    }
}

macro_rules! impl_cell_value {
    ($ty:ty, $atomic:ty) => {
        impl CellValue for $ty {
            type Atomic = $atomic;

            fn new_atomic(value: Self) -> $atomic {
                <$atomic>::new(value)
            }

            #[inline]
            fn load(atomic: &$atomic) -> Self {
                atomic.load(Ordering::Acquire)
            }

            #[inline]
            fn store(atomic: &$atomic, value: Self) {
                atomic.store(value, Ordering::Release);
            }
        }
    };
}

impl_cell_value!(u32, AtomicU32);
impl_cell_value!(u64, AtomicU64);
impl_cell_value!(usize, AtomicUsize);
impl_cell_value!(bool, AtomicBool);

/// Single-writer, multi-reader value
pub struct SharedValue<T: CellValue> {
    value: T::Atomic,
    owner: AudioThread,
}

impl<T: CellValue> SharedValue<T> {
    pub fn new(owner: AudioThread, initial: T) -> Self {
        Self {
            value: T::new_atomic(initial),
            owner,
        }
    }

    /// Thread allowed to write this value
    pub fn owner(&self) -> AudioThread {
        self.owner
    }

    /// Last published value (lock-free)
    #[inline]
    pub fn get(&self) -> T {
        T::load(&self.value)
    }

    /// Publish a new value. Must be called from the owning thread.
    #[inline]
    pub fn set(&self, value: T) {
        debug_assert_eq!(
            current_thread(),
            self.owner,
            "shared value written from the wrong thread"
        );
        T::store(&self.value, value);
    }
}

impl<T: CellValue + PartialEq> SharedValue<T> {
    /// Publish only if the value differs from the last published one
    ///
    /// Returns true if a store happened.
    #[inline]
    pub fn set_if_changed(&self, value: T) -> bool {
        if self.get() == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T: CellValue + fmt::Debug> fmt::Debug for SharedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedValue")
            .field("value", &self.get())
            .field("owner", &self.owner)
            .finish()
    }
}
