macro_rules! debug {
    ($($arg:tt)+) => {
        ::tracing::debug!($($arg)+)
    }
}

macro_rules! trace {
    ($($arg:tt)*) => {
        ::tracing::trace!($($arg)+)
    }
}

macro_rules! warn {
    ($($arg:tt)*) => {
        ::tracing::warn!($($arg)+)
    }
}

macro_rules! error {
    ($($arg:tt)*) => {
        ::tracing::error!($($arg)+)
    }
}
