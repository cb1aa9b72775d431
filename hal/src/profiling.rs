//! Optional Tracy instrumentation.
//!
//! Enabled by the `profiling` Cargo feature. Without it every macro here
//! expands to nothing.
//!
//! ```ignore
//! fn reconcile(&mut self) {
//!     profile_scope!("reconcile_disposals");
//!     // ...
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Mark the end of a presented frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a presented frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span for the current scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span covering the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a function span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a value over time.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

/// Send a message to Tracy's message log.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_message {
    ($msg:expr) => {
        if let Some(client) = $crate::profiling::Client::running() {
            client.message($msg, 0);
        }
    };
}

/// Send a message (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_message {
    ($msg:expr) => {
        let _ = $msg;
    };
}
