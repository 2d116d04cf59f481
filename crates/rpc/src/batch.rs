//! Detailed results for JSON-RPC batch calls.

use crate::errors::RpcClientError;

/// One failed element of a batch call.
#[derive(Debug)]
pub struct BatchFailure<K> {
    /// The request key (hash or height) that failed.
    pub key: K,
    /// Why it failed.
    pub error: RpcClientError,
}

/// The outcome of a batch call, element by element.
///
/// Callers can distinguish complete failure from partial success and re-issue
/// only the failed keys. The hot receipt-fetch path consumes this directly;
/// collapsing it into all-or-nothing is only acceptable off that path.
#[derive(Debug, Default)]
pub struct BatchResult<K, T> {
    /// Successfully fetched values, in request order.
    pub ok: Vec<T>,
    /// The failed elements.
    pub failed: Vec<BatchFailure<K>>,
}

impl<K, T> BatchResult<K, T> {
    /// Returns `true` if every element succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The keys that failed, for re-enqueueing.
    pub fn failed_keys(&self) -> Vec<&K> {
        self.failed.iter().map(|f| &f.key).collect()
    }

    /// Converts into all-or-nothing: the values if complete, otherwise the
    /// first failure.
    pub fn into_complete(mut self) -> Result<Vec<T>, RpcClientError> {
        if self.failed.is_empty() {
            Ok(self.ok)
        } else {
            Err(self.failed.remove(0).error)
        }
    }
}
