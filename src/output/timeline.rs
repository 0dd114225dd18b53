use crate::events::Event;
use crate::timeutil;

/// One tab-separated line per event:
/// `eventType  revision  time  isMergeCommit  result  ref`.
/// Fields that do not apply to the event kind stay empty, so the lines of
/// both kinds line up column-wise for spreadsheet import.
pub fn timeline_lines(events: &[Event]) -> Vec<String> {
    events.iter().map(timeline_line).collect()
}

fn timeline_line(event: &Event) -> String {
    let (is_merge, result) = match event {
        Event::Change(c) => (if c.is_merge_commit { "true" } else { "" }, ""),
        Event::Deployment(d) => ("", d.result.as_str()),
    };
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        event.event_type(),
        event.revision(),
        timeutil::normalize_time(event.timestamp()),
        is_merge,
        result,
        event.ref_label().unwrap_or_default()
    )
}
