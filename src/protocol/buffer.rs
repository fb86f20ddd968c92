/// Fixed-capacity cursor-based ring buffer used to accumulate one wire
/// protocol message (header, then body) across however many TCP reads it
/// takes to arrive.
///
/// `start` tracks how many bytes have been written into `data` since the
/// last `reset_cursor()`; `data[0..start]` is the accumulated message,
/// `data[start..capacity]` is where the next read lands.
pub const BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug)]
pub struct RingBuffer {
    data: Box<[u8]>,
    start: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The full unfilled region available to read into.
    pub fn cursor(&mut self) -> &mut [u8] {
        let start = self.start;
        &mut self.data[start..]
    }

    /// A prefix of the unfilled region of exactly `length` bytes.
    ///
    /// Panics if `length` would overflow the buffer; callers are expected
    /// to clamp `length` to `remain_space()` first, mirroring the original
    /// "caller must ensure buffer overflow never happens" contract.
    pub fn limited_cursor(&mut self, length: usize) -> &mut [u8] {
        let end = self.start + length;
        assert!(end <= self.capacity(), "ring buffer overflow");
        &mut self.data[self.start..end]
    }

    /// Mark `length` more bytes of the cursor region as filled.
    pub fn forward_cursor(&mut self, length: usize) {
        assert!(
            self.start + length <= self.capacity(),
            "ring buffer overflow"
        );
        self.start += length;
    }

    /// Discard the accumulated message and start filling from the top.
    pub fn reset_cursor(&mut self) {
        self.start = 0;
    }

    /// The bytes accumulated so far.
    pub fn data(&self) -> &[u8] {
        &self.data[0..self.start]
    }

    /// Remaining unfilled capacity.
    pub fn remain_space(&self) -> usize {
        self.capacity() - self.start
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(BUFFER_SIZE)
    }
}
