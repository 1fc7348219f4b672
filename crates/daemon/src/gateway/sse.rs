// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/runs/:id/events` (spec §6): an SSE stream over the Event Bus's
//! `run.<id>` topic. Closes when the bus reports `done` or the client drops
//! the connection; heartbeats keep intermediaries from timing an idle
//! connection out (spec §5 Timeouts).

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use undoable_core::{BusEvent, Clock};
use undoable_wire::SseEnvelope;

use super::SharedState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

pub async fn run_events<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.bus.subscribe(format!("run.{id}"));
    let clock = state.clock.clone();

    let stream = futures::stream::unfold((subscription, clock, false), |(mut sub, clock, closed)| async move {
        if closed {
            return None;
        }
        let topic_event = sub.recv().await?;
        let done = matches!(topic_event.event, BusEvent::Done);
        let envelope = SseEnvelope::new(topic_event.event.kind(), clock.epoch_ms(), &topic_event.event);
        let data = serde_json::to_string(&envelope).unwrap_or_default();
        Some((Ok(Event::default().data(data)), (sub, clock, done)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text(""))
}
