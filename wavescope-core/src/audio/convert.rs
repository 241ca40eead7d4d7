//! Device sample formats → mono i16.
//!
//! Runs inside the real-time audio callback, so nothing here allocates once
//! the output buffer has grown to the callback's block size.

/// A device sample that can be widened/narrowed to 16-bit PCM.
pub trait ToPcm16: Copy {
    fn to_pcm16(self) -> i16;
}

impl ToPcm16 for i16 {
    fn to_pcm16(self) -> i16 {
        self
    }
}

impl ToPcm16 for f32 {
    fn to_pcm16(self) -> i16 {
        (self.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
    }
}

impl ToPcm16 for u16 {
    fn to_pcm16(self) -> i16 {
        (i32::from(self) - 32_768) as i16
    }
}

impl ToPcm16 for u8 {
    fn to_pcm16(self) -> i16 {
        (i16::from(self) - 128) << 8
    }
}

/// Average interleaved `channels` into mono, replacing the contents of `out`.
///
/// A trailing partial frame is ignored.
pub fn downmix_into<T: ToPcm16>(data: &[T], channels: usize, out: &mut Vec<i16>) {
    out.clear();
    let ch = channels.max(1);
    if ch == 1 {
        out.extend(data.iter().map(|s| s.to_pcm16()));
        return;
    }
    out.extend(data.chunks_exact(ch).map(|frame| {
        let sum: i32 = frame.iter().map(|s| i32::from(s.to_pcm16())).sum();
        (sum / ch as i32) as i16
    }));
}

/// Rescale a signed integer sample of `bits` width to 16 bits.
pub fn int_to_pcm16(sample: i32, bits: u16) -> i16 {
    match bits {
        0 => 0,
        b if b > 16 => (sample >> (b - 16)) as i16,
        b => (sample << (16 - b)) as i16,
    }
}
