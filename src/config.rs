use crate::registry::DEFAULT_MAX_ZERO_FILL;

/// Limits applied by [`GobReader`](crate::GobReader) to incoming data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Segments declaring a longer body are rejected as malformed.
    pub max_segment_len: usize,
    /// Values one segment may create by filling in absent fields.
    pub max_zero_fill: u64,
}

impl ReaderConfig {
    pub const DEFAULT_MAX_SEGMENT_LEN: usize = 1 << 30;

    pub fn with_max_segment_len(mut self, max_segment_len: usize) -> Self {
        self.max_segment_len = max_segment_len;
        self
    }

    pub fn with_max_zero_fill(mut self, max_zero_fill: u64) -> Self {
        self.max_zero_fill = max_zero_fill;
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_segment_len: Self::DEFAULT_MAX_SEGMENT_LEN,
            max_zero_fill: DEFAULT_MAX_ZERO_FILL,
        }
    }
}
