mod styling;
mod tables;
mod timeline;

pub use styling::{bright_yellow, cyan, dim, magenta_bold};
pub use tables::{failure_rate_table, format_duration, mttr_table};
pub use timeline::timeline_lines;

/// Prints the `CdLens` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📦 CdLens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Software delivery metrics from commits and CI/CD runs")
    );
}
