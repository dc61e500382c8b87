//! Service-specific tests
//!
//! Each service has its own test file. Process tests use small /bin/sh
//! commands so they exercise real spawning, draining and termination;
//! monitor tests run on the paused tokio clock with a mocked probe so
//! every timing assertion is exact.


// Common test utilities for services
#[cfg(test)]
pub mod common {
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::events::{ExitNotice, OutputLine};
    use crate::traits::ProcessSinks;

    /// Generous bound for real-process assertions
    pub const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Build a sinks pair plus the receivers a test asserts against.
    pub fn sinks() -> (
        ProcessSinks,
        mpsc::UnboundedReceiver<OutputLine>,
        mpsc::UnboundedReceiver<ExitNotice>,
    ) {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        (
            ProcessSinks {
                output: output_tx,
                exit: exit_tx,
            },
            output_rx,
            exit_rx,
        )
    }

    /// Await one exit notice within the test bound.
    pub async fn expect_exit(rx: &mut mpsc::UnboundedReceiver<ExitNotice>) -> ExitNotice {
        tokio::time::timeout(EXIT_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for exit notice")
            .expect("exit channel closed without a notice")
    }
}
