use parking_lot::RwLock;
use std::sync::Arc;

/// A thread-safe shared mutable cell.
pub type Atomic<T> = Arc<RwLock<T>>;

/// Wraps a value in an [Atomic] cell.
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

/// Returns the current local time as an ISO-8601 string with a space
/// separator, matching the persisted timestamp layout.
pub fn current_time_string() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_read_write() {
        let cell = atomic(1);
        *cell.write() = 2;
        assert_eq!(*cell.read(), 2);
    }

    #[test]
    fn test_current_time_string_layout() {
        let ts = current_time_string();
        assert!(ts.contains(' '));
        assert!(ts.len() >= 19);
    }
}
