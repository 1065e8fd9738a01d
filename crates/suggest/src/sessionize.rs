//! Splits flat per-principal event streams into session traces.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tether_core::{Event, Trace};
use tracing::debug;

/// Gap, in seconds, used when the caller passes a non-positive window.
pub const DEFAULT_SESSION_GAP_SECS: i64 = 300;
/// Outcome recorded for events the collector did not label.
pub const UNKNOWN_OUTCOME: &str = "unknown";

struct Cursor {
    last: DateTime<Utc>,
    trace: Trace,
}

fn event_time(event: &Event) -> DateTime<Utc> {
    event.timestamp.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn normalize(mut event: Event, principal: &str) -> Event {
    event.principal_id = principal.to_string();
    let outcome = event
        .outcome
        .as_deref()
        .map(|o| o.trim().to_lowercase())
        .filter(|o| !o.is_empty())
        .unwrap_or_else(|| UNKNOWN_OUTCOME.to_string());
    event.outcome = Some(outcome);
    event.resource_facet = event
        .resource_facet
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    event
}

/// Group events into one trace per principal burst.
///
/// Events are ordered by timestamp first (stable, untimed events first). A
/// principal's session ends when the next event arrives more than `window`
/// after the previous one. Events without a principal are dropped. Session ids
/// are `principal@<rfc3339 start>`.
///
/// Sessions closed by a gap come out in the order they closed; sessions still
/// open at the end follow, ordered by principal.
pub fn sessionize(events: &[Event], window: Duration) -> Vec<Trace> {
    let window = if window > Duration::zero() {
        window
    } else {
        Duration::seconds(DEFAULT_SESSION_GAP_SECS)
    };

    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by_key(|e| event_time(e));

    let mut open: BTreeMap<String, Cursor> = BTreeMap::new();
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for event in ordered {
        let principal = event.principal_id.trim();
        if principal.is_empty() {
            skipped += 1;
            continue;
        }
        let ts = event_time(event);

        let expired = open
            .get(principal)
            .is_some_and(|cur| cur.last.checked_add_signed(window).is_some_and(|end| end < ts));
        if expired {
            if let Some(cur) = open.remove(principal) {
                out.push(cur.trace);
            }
        }

        let cursor = open.entry(principal.to_string()).or_insert_with(|| {
            let mut trace = Trace::new(
                format!("{principal}@{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                Vec::new(),
            );
            trace.principal = Some(principal.to_string());
            Cursor { last: ts, trace }
        });
        cursor.last = ts;
        cursor.trace.events.push(normalize(event.clone(), principal));
    }

    out.extend(open.into_values().map(|cur| cur.trace));
    debug!(
        events = events.len(),
        sessions = out.len(),
        skipped,
        window_secs = window.num_seconds(),
        "Sessionized event stream"
    );
    out
}
