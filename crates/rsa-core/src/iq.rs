//! IQ sample buffers.
//!
//! [`IqBlock`] is the preallocated per-poll transfer buffer. Its capacity is
//! fixed at creation from the configured client buffer size, and the device
//! reports how many sample pairs it actually filled. [`IqCapture`] is the
//! finished, owned result of a capture.

use num_complex::Complex32;

use crate::status::StatusReport;
use crate::types::DataType;

/// Interleaved I/Q storage in the configured datatype.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    /// SINGLE and SINGLE_SCALE_INT32
    Single(Vec<f32>),
    /// INT32
    Int32(Vec<i32>),
    /// INT16
    Int16(Vec<i16>),
}

impl SampleBuffer {
    /// Zeroed storage for `pairs` interleaved sample pairs.
    pub fn zeroed(datatype: DataType, pairs: usize) -> Self {
        let len = pairs * 2;
        match datatype {
            DataType::Single | DataType::SingleScaleInt32 => Self::Single(vec![0.0; len]),
            DataType::Int32 => Self::Int32(vec![0; len]),
            DataType::Int16 => Self::Int16(vec![0; len]),
        }
    }

    /// Number of interleaved values (twice the pair capacity).
    pub fn len(&self) -> usize {
        match self {
            Self::Single(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int16(v) => v.len(),
        }
    }

    /// True for zero-capacity storage.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interleaved value `index` widened to f32.
    fn value(&self, index: usize) -> f32 {
        match self {
            Self::Single(v) => v[index],
            Self::Int32(v) => v[index] as f32,
            Self::Int16(v) => f32::from(v[index]),
        }
    }
}

/// One block pulled from the device.
#[derive(Debug, Clone)]
pub struct IqBlock {
    data: SampleBuffer,
    len: usize,
    /// Acquisition status word reported with this block.
    pub acq_status: u32,
    /// Scale factor reported for integer datatypes.
    pub scale_factor: f64,
}

impl IqBlock {
    /// Preallocate a block able to hold `capacity` sample pairs.
    pub fn with_capacity(datatype: DataType, capacity: usize) -> Self {
        Self {
            data: SampleBuffer::zeroed(datatype, capacity),
            len: 0,
            acq_status: 0,
            scale_factor: 1.0,
        }
    }

    /// Sample pairs the block can hold.
    pub fn capacity(&self) -> usize {
        self.data.len() / 2
    }

    /// Sample pairs actually filled by the last pull.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the last pull delivered nothing.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Record how many pairs were filled, clamped to capacity.
    pub fn set_len(&mut self, pairs: usize) {
        self.len = pairs.min(self.capacity());
    }

    /// Reset length and status ahead of the next pull.
    pub fn clear(&mut self) {
        self.len = 0;
        self.acq_status = 0;
        self.scale_factor = 1.0;
    }

    /// Interleaved storage.
    pub fn data(&self) -> &SampleBuffer {
        &self.data
    }

    /// Mutable interleaved storage for the device to fill.
    pub fn data_mut(&mut self) -> &mut SampleBuffer {
        &mut self.data
    }

    /// Deinterleave up to `out.len()` filled pairs into `out`.
    ///
    /// Integer datatypes are multiplied by the block's scale factor. Returns
    /// the number of complex samples written.
    pub fn deinterleave_into(&self, out: &mut [Complex32]) -> usize {
        let n = self.len.min(out.len());
        let scale = match self.data {
            SampleBuffer::Single(_) => 1.0,
            _ => self.scale_factor as f32,
        };
        for (k, slot) in out.iter_mut().take(n).enumerate() {
            *slot = Complex32::new(
                self.data.value(2 * k) * scale,
                self.data.value(2 * k + 1) * scale,
            );
        }
        n
    }
}

/// Rebuild complex samples from an interleaved float record.
///
/// Pairs are `(d[2k], d[2k+1])`; for an odd number of values the Q of the
/// final pair is the last value, and the value it replaces is discarded
/// (`[1, 2, 3, 4, 5]` gives `(1, 2), (3, 5)`). Fewer than two values yields
/// nothing.
pub fn deinterleave(values: &[f32]) -> Vec<Complex32> {
    let n = values.len();
    let pairs = n / 2;
    let mut out: Vec<Complex32> = (0..pairs)
        .map(|k| Complex32::new(values[2 * k], values[2 * k + 1]))
        .collect();
    if let Some(last) = out.last_mut() {
        last.im = values[n - 1];
    }
    out
}

/// Decode little-endian f32 values from a raw sample file.
///
/// Returns `None` when the byte count is not a multiple of 4.
pub fn f32_from_le_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Result of a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct IqCapture {
    /// Complex samples in arrival order.
    pub samples: Vec<Complex32>,
    /// Samples the caller asked for.
    pub requested: usize,
    /// Output sample rate in samples/s.
    pub sample_rate: f64,
    /// Decoded acquisition status for the run.
    pub status: StatusReport,
}

impl IqCapture {
    /// Assemble a capture.
    pub fn new(
        samples: Vec<Complex32>,
        requested: usize,
        sample_rate: f64,
        status: StatusReport,
    ) -> Self {
        Self {
            samples,
            requested,
            sample_rate,
            status,
        }
    }

    /// Number of samples collected.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when fewer samples than requested were collected.
    pub fn is_partial(&self) -> bool {
        self.samples.len() < self.requested
    }

    /// Capture length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.samples.len() as f64 / self.sample_rate
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_capacity_and_len() {
        let mut block = IqBlock::with_capacity(DataType::Int16, 128);
        assert_eq!(block.capacity(), 128);
        assert!(block.is_empty());
        block.set_len(500);
        assert_eq!(block.len(), 128);
        block.clear();
        assert_eq!(block.len(), 0);
    }

    #[test]
    fn test_block_deinterleave_truncates() {
        let mut block = IqBlock::with_capacity(DataType::Single, 4);
        if let SampleBuffer::Single(v) = block.data_mut() {
            v.copy_from_slice(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0]);
        }
        block.set_len(3);

        let mut out = vec![Complex32::new(0.0, 0.0); 2];
        assert_eq!(block.deinterleave_into(&mut out), 2);
        assert_eq!(out, vec![Complex32::new(1.0, -1.0), Complex32::new(2.0, -2.0)]);
    }

    #[test]
    fn test_integer_block_widened() {
        let mut block = IqBlock::with_capacity(DataType::Int32, 1);
        if let SampleBuffer::Int32(v) = block.data_mut() {
            v.copy_from_slice(&[100_000, -7]);
        }
        block.set_len(1);
        let mut out = vec![Complex32::new(0.0, 0.0); 1];
        block.deinterleave_into(&mut out);
        assert_eq!(out[0], Complex32::new(100_000.0, -7.0));
    }

    #[test]
    fn test_integer_block_scaled() {
        let mut block = IqBlock::with_capacity(DataType::Int16, 1);
        if let SampleBuffer::Int16(v) = block.data_mut() {
            v.copy_from_slice(&[16384, -8192]);
        }
        block.set_len(1);
        block.scale_factor = 1.0 / 16384.0;
        let mut out = vec![Complex32::new(0.0, 0.0); 1];
        block.deinterleave_into(&mut out);
        assert_eq!(out[0], Complex32::new(1.0, -0.5));
    }

    #[test]
    fn test_deinterleave_even() {
        let out = deinterleave(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out, vec![Complex32::new(1.0, 2.0), Complex32::new(3.0, 4.0)]);
    }

    #[test]
    fn test_deinterleave_odd_last_value_is_q() {
        let out = deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out, vec![Complex32::new(1.0, 2.0), Complex32::new(3.0, 5.0)]);
    }

    #[test]
    fn test_deinterleave_short() {
        assert!(deinterleave(&[]).is_empty());
        assert!(deinterleave(&[1.0]).is_empty());
    }

    #[test]
    fn test_le_bytes() {
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(f32_from_le_bytes(&bytes).unwrap(), vec![1.5, -2.0]);
        assert!(f32_from_le_bytes(&bytes[..5]).is_none());
    }

    #[test]
    fn test_capture_partial() {
        let capture = IqCapture::new(
            vec![Complex32::new(0.0, 0.0); 5],
            10,
            1000.0,
            StatusReport::default(),
        );
        assert!(capture.is_partial());
        assert_eq!(capture.duration_secs(), 0.005);
    }
}
