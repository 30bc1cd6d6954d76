use std::cell::Cell;

thread_local! {
    static LAST_TIMESTAMP: Cell<i64> = const { Cell::new(0) };
    static THREAD_ID: Cell<i32> = const { Cell::new(0) };
}

fn clock_micros() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as i64 * 1_000_000 + ts.tv_nsec as i64 / 1_000
}

/// Returns a timestamp in microseconds, strictly greater than any value
/// previously returned on the calling thread.
///
/// The clock's microsecond granularity is coarser than much of the code
/// being measured, so back-to-back readings collide; a reading that has not
/// advanced is forced to `last + 1`. Complete events with equal timestamps
/// render as degenerate zero-width spans in trace viewers, which is what
/// this avoids.
///
/// The guarantee is per-thread only: events on different threads may carry
/// identical or mutually out-of-order timestamps.
pub fn unique_timestamp() -> i64 {
    LAST_TIMESTAMP.with(|last| {
        let mut current = clock_micros();
        if current <= last.get() {
            current = last.get() + 1;
        }
        last.set(current);
        current
    })
}

/// The calling thread's kernel thread id, cached per thread.
///
/// Trace viewers expect compact numeric thread ids, so this is the small
/// stable integer from `gettid`, not a hash of `std::thread::ThreadId`.
pub fn current_tid() -> i32 {
    THREAD_ID.with(|tid| {
        if tid.get() == 0 {
            tid.set(unsafe { libc::syscall(libc::SYS_gettid) as i32 });
        }
        tid.get()
    })
}

/// The calling process's pid as stamped onto events and messages.
pub fn current_pid() -> i32 {
    std::process::id() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increase() {
        // Far more calls than microseconds will elapse, so the clock is
        // guaranteed to repeat readings and the forcing path is exercised.
        let mut previous = unique_timestamp();
        for _ in 0..10_000 {
            let next = unique_timestamp();
            assert!(next > previous, "{next} is not above {previous}");
            previous = next;
        }
    }

    #[test]
    fn test_tid_is_stable_within_a_thread() {
        let first = current_tid();
        let second = current_tid();
        assert_eq!(first, second);
        assert!(first > 0);
    }

    #[test]
    fn test_tid_differs_across_threads() {
        let here = current_tid();
        let there = std::thread::spawn(current_tid)
            .join()
            .expect("thread panicked");
        assert_ne!(here, there);
    }
}
