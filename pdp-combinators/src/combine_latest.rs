//! Latest-value combination of many streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, SelectAll};
use futures::{Stream, StreamExt};

/// Lifecycle of a [`CombineLatest`] stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting until every contributor has produced a value.
    CollectingFirstBatch,
    /// Emitting a snapshot on every new value.
    Combining,
    /// Finished; no further snapshots.
    Closed,
}

enum Event<T> {
    Value(T),
    Completed,
}

/// Stream of snapshots holding the latest value of every contributor.
///
/// Nothing is emitted until every contributor has produced at least one
/// value; afterwards each new value from any contributor yields exactly one
/// snapshot, in contributor order. The stream closes when every contributor
/// has completed, or as soon as one completes without ever producing a
/// value. Closing or dropping it drops every contributor.
pub struct CombineLatest<T> {
    contributors: SelectAll<BoxStream<'static, (usize, Event<T>)>>,
    latest: Vec<Option<T>>,
    received: usize,
    completed: usize,
    phase: Phase,
}

impl<T: Clone + Send + 'static> CombineLatest<T> {
    /// Combines the given streams. With no streams the result is closed.
    pub fn new<S>(streams: impl IntoIterator<Item = S>) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let contributors: SelectAll<_> = streams
            .into_iter()
            .enumerate()
            .map(|(index, contributor)| {
                contributor
                    .map(move |value| (index, Event::Value(value)))
                    .chain(stream::iter([(index, Event::Completed)]))
                    .boxed()
            })
            .collect();
        let count = contributors.len();
        Self {
            contributors,
            latest: std::iter::repeat_with(|| None).take(count).collect(),
            received: 0,
            completed: 0,
            phase: if count == 0 {
                Phase::Closed
            } else {
                Phase::CollectingFirstBatch
            },
        }
    }
}

impl<T> CombineLatest<T> {
    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of contributors.
    #[must_use]
    pub fn contributors(&self) -> usize {
        self.latest.len()
    }

    fn close(&mut self) {
        self.phase = Phase::Closed;
        self.contributors = SelectAll::new();
    }
}

// Fields are never pinned structurally.
impl<T> Unpin for CombineLatest<T> {}

impl<T: Clone> Stream for CombineLatest<T> {
    type Item = Vec<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.phase == Phase::Closed {
                return Poll::Ready(None);
            }
            match this.contributors.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => this.close(),
                Poll::Ready(Some((index, Event::Value(value)))) => {
                    if this.latest[index].replace(value).is_none() {
                        this.received += 1;
                    }
                    if this.received == this.latest.len() {
                        this.phase = Phase::Combining;
                        let snapshot = this.latest.iter().flatten().cloned().collect();
                        return Poll::Ready(Some(snapshot));
                    }
                }
                Poll::Ready(Some((index, Event::Completed))) => {
                    this.completed += 1;
                    if this.latest[index].is_none() || this.completed == this.latest.len() {
                        this.close();
                    }
                }
            }
        }
    }
}

impl<T> std::fmt::Debug for CombineLatest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombineLatest")
            .field("contributors", &self.latest.len())
            .field("received", &self.received)
            .field("completed", &self.completed)
            .field("phase", &self.phase)
            .finish()
    }
}
