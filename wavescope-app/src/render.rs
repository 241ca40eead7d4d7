//! Text rendering of published frames.
//!
//! Everything here is pure: a frame goes in, lines of text come out, so the
//! layout can be unit-tested without a terminal.

use wavescope_core::{Frame, SpectralFrame, WaveformFrame};

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const BAR: char = '█';

/// Reduce `values` to `count` buckets, keeping the max of each.
///
/// When there are fewer values than buckets each value gets its own bucket.
pub fn bucket_max(values: &[f32], count: usize) -> Vec<f32> {
    if values.is_empty() || count == 0 {
        return Vec::new();
    }
    let count = count.min(values.len());
    (0..count)
        .map(|b| {
            let start = b * values.len() / count;
            let end = ((b + 1) * values.len() / count).max(start + 1);
            values[start..end].iter().copied().fold(0.0, f32::max)
        })
        .collect()
}

/// Spectrum as vertical bars, top row first. Each line is `bars` wide.
pub fn spectrum_rows(spectrum: &SpectralFrame, bars: usize, height: usize) -> Vec<String> {
    let levels: Vec<usize> = bucket_max(&spectrum.normalized(), bars)
        .into_iter()
        .map(|v| (v.clamp(0.0, 1.0) * height as f32).round() as usize)
        .collect();

    (0..height)
        .rev()
        .map(|row| {
            levels
                .iter()
                .map(|&level| if level > row { BAR } else { ' ' })
                .collect()
        })
        .collect()
}

/// One-line envelope of the waveform, `width` columns wide.
pub fn waveform_line(waveform: &WaveformFrame, width: usize) -> String {
    let envelope: Vec<f32> = waveform.normalized().iter().map(|v| v.abs()).collect();
    bucket_max(&envelope, width)
        .into_iter()
        .map(|v| {
            let idx = (v.clamp(0.0, 1.0) * (LEVELS.len() - 1) as f32).round() as usize;
            LEVELS[idx]
        })
        .collect()
}

pub fn status_line(frame: &Frame) -> String {
    let dominant = frame
        .spectrum
        .peak_frequency()
        .map(|hz| format!("{hz:.1} Hz"))
        .unwrap_or_else(|| "-".into());
    format!(
        "seq {} | {} Hz | N={} | peak {:.0} | dominant {}",
        frame.seq,
        frame.sample_rate,
        frame.waveform.len(),
        frame.waveform.scale(),
        dominant
    )
}

/// Full screen for one frame.
pub fn render_frame(frame: &Frame, bars: usize, height: usize, show_waveform: bool) -> String {
    let mut out = String::new();
    out.push_str(&status_line(frame));
    out.push('\n');
    for row in spectrum_rows(&frame.spectrum, bars, height) {
        out.push('|');
        out.push_str(&row);
        out.push_str("|\n");
    }
    if show_waveform {
        out.push(' ');
        out.push_str(&waveform_line(&frame.waveform, bars));
        out.push('\n');
    }
    out
}
