//! Call-site macros for the process-wide dispatcher
//!
//! Each macro records `module_path!()` of the caller as the source, so
//! per-module overrides from `[levels.overrides]` apply. Optional prefixes
//! `level = N` and `context = expr` (in that order) precede the usual
//! `format!` arguments. Every macro evaluates to `true` when the call reached
//! the sinks.

#[doc(hidden)]
#[macro_export]
macro_rules! __devlog_event {
    ($kind:expr; level = $level:expr, context = $context:expr, $($arg:tt)+) => {
        $crate::emit(
            module_path!(),
            $kind,
            $level,
            $crate::__context(&$context),
            ::std::format!($($arg)+),
        )
    };
    ($kind:expr; level = $level:expr, $($arg:tt)+) => {
        $crate::emit(module_path!(), $kind, $level, ::core::option::Option::None, ::std::format!($($arg)+))
    };
    ($kind:expr; context = $context:expr, $($arg:tt)+) => {
        $crate::emit(
            module_path!(),
            $kind,
            $crate::DEFAULT_LEVEL,
            $crate::__context(&$context),
            ::std::format!($($arg)+),
        )
    };
    ($kind:expr; $($arg:tt)+) => {
        $crate::emit(module_path!(), $kind, $crate::DEFAULT_LEVEL, ::core::option::Option::None, ::std::format!($($arg)+))
    };
}

/// Log an informational message
#[macro_export]
macro_rules! log {
    ($($arg:tt)+) => { $crate::__devlog_event!($crate::LogKind::Info; $($arg)+) };
}

/// Log a warning
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => { $crate::__devlog_event!($crate::LogKind::Warning; $($arg)+) };
}

/// Log an error
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__devlog_event!($crate::LogKind::Error; $($arg)+) };
}

/// Log a failed assertion
#[macro_export]
macro_rules! log_assertion {
    ($($arg:tt)+) => { $crate::__devlog_event!($crate::LogKind::Assert; $($arg)+) };
}

/// Log an error value (anything implementing `std::error::Error + 'static`)
#[macro_export]
macro_rules! log_exception {
    (level = $level:expr, context = $context:expr, $error:expr) => {
        $crate::emit_exception(module_path!(), $level, $crate::__context(&$context), &$error)
    };
    (level = $level:expr, $error:expr) => {
        $crate::emit_exception(module_path!(), $level, ::core::option::Option::None, &$error)
    };
    (context = $context:expr, $error:expr) => {
        $crate::emit_exception(
            module_path!(),
            $crate::DEFAULT_LEVEL,
            $crate::__context(&$context),
            &$error,
        )
    };
    ($error:expr) => {
        $crate::emit_exception(module_path!(), $crate::DEFAULT_LEVEL, ::core::option::Option::None, &$error)
    };
}
