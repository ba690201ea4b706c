//! Outbound HTTP client for broadcast and heartbeat (§4.6 "Transport").
//! Runs each request with a bounded timeout off the writer thread so a
//! slow or unreachable follower cannot stall local acknowledgement; the
//! engine owns only this client and the health bookkeeping, not the
//! inbound REST surface.

use crate::envelope::Envelope;
use emberstore_core::{EmberError, Result};
use std::time::Duration;

/// Default per-request timeout for broadcast and heartbeat (§5 "Timeouts").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A blocking HTTP client dedicated to replication traffic.
pub struct FollowerClient {
    http: reqwest::blocking::Client,
}

impl FollowerClient {
    /// Build a client with `timeout` applied to every request.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmberError::replication_failure(e.to_string()))?;
        Ok(FollowerClient { http })
    }

    /// POST `envelope` to `url`. A non-2xx response is treated as a
    /// failure identically to a network error (§6 "replication-inbound
    /// endpoint... any other status is treated as failure").
    pub fn post_envelope(&self, url: &str, envelope: &Envelope) -> Result<()> {
        let response = self.http.post(url).json(envelope).send().map_err(|e| EmberError::replication_failure(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EmberError::replication_failure(format!("follower {url} responded {}", response.status())))
        }
    }

    /// Ping `url`'s heartbeat endpoint.
    pub fn ping(&self, url: &str) -> Result<()> {
        let response = self.http.post(url).send().map_err(|e| EmberError::replication_failure(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EmberError::replication_failure(format!("follower {url} responded {}", response.status())))
        }
    }
}
