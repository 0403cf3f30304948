//! In-process mock ADC driver used by the default daemon configuration and
//! by tests that need deterministic, settable conversion results without
//! real hardware.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::drivers::AdcDriver;

/// A mock ADC that replays a queue of raw codes per pre-encoded mux code,
/// programmed with [`MockAdcDriver::set_mux_codes`].
pub struct MockAdcDriver {
    sequence: Vec<u8>,
    codes: std::collections::HashMap<u8, VecDeque<i32>>,
    default_code: i32,
}

impl MockAdcDriver {
    pub fn new() -> Self {
        Self {
            sequence: Vec::new(),
            codes: std::collections::HashMap::new(),
            default_code: 0,
        }
    }

    /// Queue raw codes to be returned, in order, for a given pre-encoded mux
    /// code. When the queue is exhausted the last value is not repeated;
    /// [`MockAdcDriver::set_default_code`] is returned instead.
    pub fn set_mux_codes(&mut self, mux: u8, codes: impl IntoIterator<Item = i32>) {
        self.codes.insert(mux, codes.into_iter().collect());
    }

    pub fn set_default_code(&mut self, code: i32) {
        self.default_code = code;
    }

    fn scan_into(&mut self, mux_seq: &[u8], dest: &mut [i32]) -> Result<()> {
        if mux_seq.len() > dest.len() {
            return Err(anyhow!(
                "dest buffer too small for mux sequence: {} < {}",
                dest.len(),
                mux_seq.len()
            ));
        }
        for (i, mux) in mux_seq.iter().enumerate() {
            dest[i] = self
                .codes
                .get_mut(mux)
                .and_then(|q| q.pop_front())
                .unwrap_or(self.default_code);
        }
        Ok(())
    }
}

impl Default for MockAdcDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcDriver for MockAdcDriver {
    fn read_sequence(&mut self, mux_seq: &[u8], dest: &mut [i32]) -> Result<()> {
        if mux_seq.is_empty() {
            return Err(anyhow!("ADC mux sequence must not be empty"));
        }
        self.sequence = mux_seq.to_vec();
        self.scan_into(mux_seq, dest)
    }

    fn read_continue(&mut self, mux_seq: &[u8], dest: &mut [i32]) -> Result<()> {
        if self.sequence.is_empty() {
            return Err(anyhow!("read_continue called before read_sequence"));
        }
        self.scan_into(mux_seq, dest)
    }

    fn cal_self(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.sequence.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_queued_codes_per_mux_code() {
        let mut adc = MockAdcDriver::new();
        adc.set_mux_codes(0x01, [100, 101]);
        adc.set_mux_codes(0x12, [200, 201]);
        let mut dest = [0i32; 2];
        adc.read_sequence(&[0x01, 0x12], &mut dest).unwrap();
        assert_eq!(dest, [100, 200]);
        adc.read_continue(&[0x01, 0x12], &mut dest).unwrap();
        assert_eq!(dest, [101, 201]);
    }

    #[test]
    fn falls_back_to_default_code_once_queue_drains() {
        let mut adc = MockAdcDriver::new();
        adc.set_default_code(42);
        adc.set_mux_codes(0x01, [1]);
        let mut dest = [0i32; 1];
        adc.read_sequence(&[0x01], &mut dest).unwrap();
        assert_eq!(dest, [1]);
        adc.read_continue(&[0x01], &mut dest).unwrap();
        assert_eq!(dest, [42]);
    }

    #[test]
    fn read_continue_before_sequence_is_an_error() {
        let mut adc = MockAdcDriver::new();
        let mut dest = [0i32; 1];
        assert!(adc.read_continue(&[0x01], &mut dest).is_err());
    }
}
