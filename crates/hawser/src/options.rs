//! Configuration for the client service.

use std::time::Duration;

/// Recognized configuration for
/// [`ClientService`](crate::ClientService).
#[derive(Debug, Clone)]
pub struct RpcOptions {
    /// Sizing input for the dispatch pool. The pool runs
    /// `rpc_processor_thread_pool_size / 3` workers (minimum one); the
    /// divisor is inherited sizing with no correctness dependency, kept as a
    /// default rather than an invariant.
    pub rpc_processor_thread_pool_size: usize,
    /// Deadline for the synchronous connect probe.
    pub rpc_connect_timeout: Duration,
    /// Deadline applied when an invocation does not supply its own.
    pub rpc_default_timeout: Duration,
    /// Capacity of the dispatch pool's work queue.
    pub dispatch_queue_capacity: usize,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            rpc_processor_thread_pool_size: 80,
            rpc_connect_timeout: Duration::from_secs(1),
            rpc_default_timeout: Duration::from_secs(5),
            dispatch_queue_capacity: 10_000,
        }
    }
}

impl RpcOptions {
    pub(crate) fn dispatch_workers(&self) -> usize {
        (self.rpc_processor_thread_pool_size / 3).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_derives_from_pool_size() {
        let mut options = RpcOptions::default();
        assert_eq!(options.dispatch_workers(), 26);

        options.rpc_processor_thread_pool_size = 2;
        assert_eq!(options.dispatch_workers(), 1);
    }
}
