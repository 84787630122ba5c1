use arrayvec::ArrayVec;

/// Accumulates received bytes until a terminator shows up.
///
/// Bytes past the terminator stay buffered for the next reply; a purge
/// clears them.
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    read_pos: usize,
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer {
            data: Vec::with_capacity(100),
            read_pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.read_pos
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    pub fn consume(&mut self, len: usize) {
        let len = len.min(self.len());
        self.read_pos += len;
    }

    pub fn write(&mut self, bytes: &[u8]) {
        if self.read_pos == self.data.len() {
            self.clear();
        }
        self.data.extend_from_slice(bytes);
    }

    /// Remove and return everything before the first `terminator`,
    /// consuming the terminator too.
    pub fn take_until(&mut self, terminator: &[u8]) -> Option<Vec<u8>> {
        if terminator.is_empty() {
            return None;
        }
        let pending = self.as_slice();
        let end = pending
            .windows(terminator.len())
            .position(|w| w == terminator)?;
        let line = pending[..end].to_vec();
        self.consume(end + terminator.len());
        Some(line)
    }

    /// Remove and return up to `max` bytes, and never more than `N`.
    pub fn take<const N: usize>(&mut self, max: usize) -> ArrayVec<u8, N> {
        let len = max.min(N).min(self.len());
        let mut bytes = ArrayVec::new();
        bytes.extend(self.as_slice()[..len].iter().copied());
        self.consume(len);
        bytes
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}
