//! First-write-wins nibble storage
//!
//! A fixed array of raw slot values plus a 128-bit received mask. A slot is
//! written only the first time it is observed; the integrity check is the only
//! thing that clears bits again.

use super::consts::PASSWORD_NIBBLES;

/// Largest buffer the mask can track
pub const MAX_SLOTS: usize = PASSWORD_NIBBLES;

#[derive(Debug, Clone)]
pub struct NibbleBuffer {
    values: [u8; MAX_SLOTS],
    received: u128,
    capacity: usize,
}

impl NibbleBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity <= MAX_SLOTS, "nibble buffer capacity {} too large", capacity);
        Self {
            values: [0; MAX_SLOTS],
            received: 0,
            capacity,
        }
    }

    /// Store `value` at `index` unless that slot was already received.
    /// Returns true when the value was taken.
    pub fn record(&mut self, index: usize, value: u8) -> bool {
        if index >= self.capacity || self.is_received(index) {
            return false;
        }
        self.values[index] = value;
        self.received |= 1u128 << index;
        true
    }

    pub fn is_received(&self, index: usize) -> bool {
        index < self.capacity && self.received & (1u128 << index) != 0
    }

    /// Re-open a slot for the next transmission round
    pub fn invalidate(&mut self, index: usize) {
        if index < self.capacity {
            self.received &= !(1u128 << index);
            self.values[index] = 0;
        }
    }

    /// True once slots `0..len` have all been received
    pub fn is_complete(&self, len: usize) -> bool {
        if len == 0 || len > self.capacity {
            return false;
        }
        let mask = if len == 128 { u128::MAX } else { (1u128 << len) - 1 };
        self.received & mask == mask
    }

    pub fn received_count(&self) -> u32 {
        self.received.count_ones()
    }

    pub fn values(&self, len: usize) -> &[u8] {
        &self.values[..len.min(self.capacity)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_write_wins() {
        let mut buf = NibbleBuffer::new(64);
        assert!(buf.record(3, 0x41));
        assert!(!buf.record(3, 0x99));
        assert_eq!(buf.values(4)[3], 0x41);
    }

    #[test]
    fn test_invalidate_reopens_slot() {
        let mut buf = NibbleBuffer::new(64);
        buf.record(5, 1);
        buf.invalidate(5);
        assert!(!buf.is_received(5));
        assert!(buf.record(5, 2));
        assert_eq!(buf.values(6)[5], 2);
    }

    #[test]
    fn test_complete_full_width() {
        let mut buf = NibbleBuffer::new(128);
        for i in 0..128 {
            buf.record(i, i as u8);
        }
        assert!(buf.is_complete(128));
        assert_eq!(buf.received_count(), 128);
        buf.invalidate(127);
        assert!(!buf.is_complete(128));
        assert!(buf.is_complete(127));
    }

    #[test]
    fn test_out_of_capacity_ignored() {
        let mut buf = NibbleBuffer::new(64);
        assert!(!buf.record(64, 1));
        assert!(!buf.is_complete(65));
        assert!(!buf.is_complete(0));
    }
}
