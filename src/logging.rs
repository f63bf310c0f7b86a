// Each level forwards to the `log` facade only when its feature is enabled.
// Disabled levels still type-check their arguments so call sites don't rot.

macro_rules! __disabled_log {
    ($($arg:tt)+) => {{
        if false {
            let _ = format_args!($($arg)+);
        }
    }};
}

#[cfg(feature = "log-info")]
macro_rules! info {
    ($($arg:tt)+) => (log::info!($($arg)+))
}

#[cfg(not(feature = "log-info"))]
macro_rules! info {
    ($($arg:tt)+) => (__disabled_log!($($arg)+))
}

#[cfg(feature = "log-info")]
macro_rules! debug {
    ($($arg:tt)+) => (log::debug!($($arg)+))
}

#[cfg(not(feature = "log-info"))]
macro_rules! debug {
    ($($arg:tt)+) => (__disabled_log!($($arg)+))
}

#[cfg(feature = "log-warn")]
macro_rules! warn {
    ($($arg:tt)+) => (log::warn!($($arg)+))
}

#[cfg(not(feature = "log-warn"))]
macro_rules! warn {
    ($($arg:tt)+) => (__disabled_log!($($arg)+))
}

#[cfg(feature = "log-error")]
macro_rules! error {
    ($($arg:tt)+) => (log::error!($($arg)+))
}

#[cfg(not(feature = "log-error"))]
macro_rules! error {
    ($($arg:tt)+) => (__disabled_log!($($arg)+))
}

// Caller contract check. Panics in debug builds, compiled out in release builds.
macro_rules! precondition {
    ($cond:expr, $($arg:tt)+) => {{
        if cfg!(debug_assertions) && !($cond) {
            error!("cl-fs: precondition violated: {}", format_args!($($arg)+));
            panic!("cl-fs: precondition violated: {}", format_args!($($arg)+));
        }
    }};
}
