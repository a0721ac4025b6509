//! Broadcast log configuration

/// Broadcast log configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// gzip compression level for every framed block (0-9)
    pub compression_level: u32,

    /// Unit slots reserved up front
    pub initial_capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            initial_capacity: 1024,
        }
    }
}

impl LogConfig {
    /// Set compression level (capped at 9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Set initial unit capacity
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();

        assert_eq!(config.compression_level, 6);
        assert_eq!(config.initial_capacity, 1024);
    }

    #[test]
    fn test_builder_compression_level_capped() {
        let config = LogConfig::default().compression_level(42);

        assert_eq!(config.compression_level, 9);
    }

    #[test]
    fn test_builder_chaining() {
        let config = LogConfig::default()
            .compression_level(1)
            .initial_capacity(16);

        assert_eq!(config.compression_level, 1);
        assert_eq!(config.initial_capacity, 16);
    }
}
