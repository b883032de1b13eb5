//! Scratch buffer allocation.
//!
//! Buffers sized by the competitor or encounter count are reserved up front.
//! Failing to reserve one leaves nothing sensible to return, so the process
//! stops after logging what could not be allocated.

/// Returns an empty vector with room for exactly `len` elements.
pub(crate) fn buffer<T>(len: usize, what: &str) -> Vec<T> {
    let mut v = Vec::new();
    if let Err(e) = v.try_reserve_exact(len) {
        tracing::error!("cannot allocate {what} buffer for {len} entries: {e}");
        std::process::abort();
    }
    v
}

/// Returns a vector of `len` copies of `value`.
pub(crate) fn filled<T: Clone>(len: usize, value: T, what: &str) -> Vec<T> {
    let mut v = buffer(len, what);
    v.resize(len, value);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_has_requested_length() {
        let v = filled(5, 1.5f64, "test");
        assert_eq!(v, vec![1.5; 5]);
        let e: Vec<u8> = buffer(16, "test");
        assert!(e.is_empty());
        assert!(e.capacity() >= 16);
    }
}
