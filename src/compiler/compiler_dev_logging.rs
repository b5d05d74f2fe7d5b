// OPERATION RESOLUTION LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_op_resolution")]
macro_rules! ops_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_op_resolution"))]
macro_rules! ops_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// DESTRUCTOR SCHEDULE LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_drop_schedule")]
macro_rules! drop_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_drop_schedule"))]
macro_rules! drop_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// Extra timer logging
#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        print!("{}", $msg);
        colour::green_ln!("{:?}", $time.elapsed());
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        // Nothing
        let _ = &$time;
    };
}
