//! VM configuration options

/// Configuration options for a [`crate::vm::Vm`](super::Vm).
#[derive(Clone, Debug, Default)]
pub struct VmConfig {
    /// Print the stack and each instruction as it executes.
    pub trace: bool,
}

impl VmConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable execution tracing
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VmConfig::new();
        assert!(!config.trace);
    }

    #[test]
    fn test_with_trace() {
        let config = VmConfig::new().with_trace(true);
        assert!(config.trace);
    }
}
