use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar for a known number of per-item fetches, drawn on stderr so
/// it never mixes with exported output.
pub fn fetch_progress(count: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(count as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40.green}] {pos}/{len}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}
