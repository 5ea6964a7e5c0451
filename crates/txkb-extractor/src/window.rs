//! Span windowing
//!
//! Splits a tokenized document into `ceil(N / L)` windows of `L` tokens,
//! back-shifted by an even overlap so the windows span the whole document.
//! Window `i` starts at `i * L - i * O` with `O = ceil((W * L - N) / max(W - 1, 1))`.

use txkb_core::Span;

/// Number of windows needed for `num_tokens` tokens
pub fn num_windows(num_tokens: usize, span_length: usize) -> usize {
    if span_length == 0 {
        return 0;
    }
    num_tokens.div_ceil(span_length)
}

/// Overlap between consecutive windows; zero when there is only one
pub fn overlap(num_tokens: usize, span_length: usize) -> usize {
    let windows = num_windows(num_tokens, span_length);
    if windows <= 1 {
        return 0;
    }
    (windows * span_length - num_tokens).div_ceil(windows - 1)
}

/// Window boundaries exactly as the reference formula produces them.
///
/// The final window is not clipped and can end past `num_tokens`.
pub fn span_windows(num_tokens: usize, span_length: usize) -> Vec<Span> {
    windows_with_overlap(
        num_windows(num_tokens, span_length),
        span_length,
        overlap(num_tokens, span_length),
    )
}

/// Window boundaries clipped against the document length.
///
/// When the ceiling in the overlap formula leaves the last few tokens
/// uncovered, the overlap is rounded down instead and the last window is
/// pinned to `[num_tokens - span_length, num_tokens)`. Every window of a
/// multi-window document then holds exactly `span_length` tokens and the
/// union is always `[0, num_tokens)`.
pub fn clipped_span_windows(num_tokens: usize, span_length: usize) -> Vec<Span> {
    let mut windows = span_windows(num_tokens, span_length);

    let uncovered = windows.last().is_some_and(|last| last.end < num_tokens);
    if uncovered {
        let count = windows.len();
        let floor_overlap = (count * span_length - num_tokens) / (count - 1);
        windows = windows_with_overlap(count, span_length, floor_overlap);
        if let Some(last) = windows.last_mut() {
            *last = Span::new(num_tokens - span_length, num_tokens);
        }
    }

    windows
        .into_iter()
        .map(|span| span.clip(num_tokens))
        .collect()
}

fn windows_with_overlap(count: usize, span_length: usize, overlap: usize) -> Vec<Span> {
    (0..count)
        .map(|i| {
            let start = i * span_length - i * overlap;
            Span::new(start, start + span_length)
        })
        .collect()
}
