use std::time::Duration;

/// Options recognised by [crate::client::Client::connect].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Expect responses split over several packets and drain them with a
    /// trailing blank packet. Turn off for servers that never split.
    pub multi: bool,
    /// Limit on how long the tcp connect may take. Reads are never timed out.
    pub timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            multi: true,
            timeout: None,
        }
    }
}

impl ConnectOptions {
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
