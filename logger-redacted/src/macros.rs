// Logging macros

/// Writes straight to a [`LoggerDelegate`](crate::LoggerDelegate), capturing the call site
#[macro_export]
macro_rules! delegate_log {
    ($delegate:expr, $level:expr, $($arg:tt)*) => {{
        let level = $level;
        if level >= $delegate.log_level() {
            $delegate.write_to_log(level, &format!($($arg)*), module_path!(), file!(), line!());
        }
    }};
}
