/// Induces random jitter at interesting points in the lock
/// protocol, shaking out more possible interleavings quickly
/// during stress tests. Compiles to nothing unless the
/// `runtime_validation` feature is enabled.
pub fn debug_delay() {
    #[cfg(feature = "runtime_validation")]
    {
        use std::thread;
        use std::time::Duration;

        use rand::{thread_rng, Rng};

        let mut rng = thread_rng();

        match rng.gen_range(0..100) {
            0..=79 => {}
            80..=98 => thread::yield_now(),
            _ => thread::sleep(Duration::from_micros(100)),
        }
    }
}
