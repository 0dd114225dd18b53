use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::events::{ChangeEvent, DeploymentEvent, Event, EventsQuery};

/// How change and deployment events are merged into one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelinePolicy {
    /// Stable union of both lists sorted ascending by timestamp.
    Chronological,
    /// Every reference's events form one contiguous, internally
    /// chronological block, interleaved among unreferenced events at the
    /// point where that reference's activity began.
    ReferenceGrouped,
}

impl TimelinePolicy {
    pub fn for_query(query: &EventsQuery) -> Self {
        if query.branch_is_pattern() || query.tags.is_some() {
            Self::ReferenceGrouped
        } else {
            Self::Chronological
        }
    }
}

/// Merge change and deployment events into one ordered sequence.
pub fn build(
    changes: Vec<ChangeEvent>,
    deployments: Vec<DeploymentEvent>,
    policy: TimelinePolicy,
) -> Vec<Event> {
    let events = changes
        .into_iter()
        .map(Event::Change)
        .chain(deployments.into_iter().map(Event::Deployment))
        .collect();
    match policy {
        TimelinePolicy::Chronological => chronological(events),
        TimelinePolicy::ReferenceGrouped => reference_grouped(events),
    }
}

/// Rebuild a timeline from an already-merged sequence under the same
/// policy; building is idempotent.
pub fn rebuild(events: Vec<Event>, policy: TimelinePolicy) -> Vec<Event> {
    match policy {
        TimelinePolicy::Chronological => chronological(events),
        TimelinePolicy::ReferenceGrouped => reference_grouped(events),
    }
}

fn chronological(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(Event::timestamp);
    events
}

fn reference_grouped(events: Vec<Event>) -> Vec<Event> {
    let total = events.len();

    // Partition into unreferenced events and per-reference groups. The
    // map keeps insertion order so ties stay stable.
    let mut unreferenced: Vec<Event> = Vec::new();
    let mut groups: IndexMap<String, Vec<Event>> = IndexMap::new();
    for event in events {
        match event.ref_label() {
            Some(label) => groups.entry(label.to_string()).or_default().push(event),
            None => unreferenced.push(event),
        }
    }
    unreferenced.sort_by_key(Event::timestamp);
    for group in groups.values_mut() {
        group.sort_by_key(Event::timestamp);
    }

    let mut result = Vec::with_capacity(total);
    for event in unreferenced {
        flush_groups_before(&mut groups, Some(event.timestamp()), &mut result);
        result.push(event);
    }
    // Groups never unblocked by a later unreferenced event are appended
    // at the end, in first-event-timestamp order.
    flush_groups_before(&mut groups, None, &mut result);
    result
}

/// Emit and remove every pending group whose first event predates `cutoff`
/// (all of them when `cutoff` is `None`), in first-event-timestamp order.
fn flush_groups_before(
    groups: &mut IndexMap<String, Vec<Event>>,
    cutoff: Option<DateTime<Utc>>,
    result: &mut Vec<Event>,
) {
    let mut due: Vec<String> = groups
        .iter()
        .filter(|(_, group)| cutoff.is_none_or(|t| group[0].timestamp() < t))
        .map(|(name, _)| name.clone())
        .collect();
    due.sort_by_key(|name| groups[name][0].timestamp());
    for name in due {
        if let Some(group) = groups.shift_remove(&name) {
            result.extend(group);
        }
    }
}
