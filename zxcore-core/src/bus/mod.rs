/*
    Copyright (C) 2020-2024  zxcore contributors

    This file is part of zxcore, a Rust library for building ZX Spectrum
    family emulators.

    zxcore is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    zxcore is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! A synchronous publish/subscribe message bus (spec §4.10). Replaces the source's `void*`
//! observer payloads with a closed enum of typed topic payloads (spec §9 "Observer callbacks ->
//! typed channels"); subscribers register one typed closure per topic and publish runs inline
//! on the engine thread — hopping to a GUI thread is the subscriber's job, not the bus's.
use std::collections::HashMap;

/// One event carried by the bus. Each variant corresponds to one of the fixed topics.
#[derive(Clone, Debug)]
pub enum Event {
    SystemReset,
    EmulatorStateChange { paused: bool },
    ExecutionCpuStep { pc: u16, t: i32 },
    VideoFrameRefresh { frame_counter: u32 },
    MemoryChanged { bank: u8, page: u16 },
    LabelChanged { name: String },
    BreakpointHit { id: u32, address: u16 },
    AudioFrameReady { frame_counter: u32 },
}

/// Which fixed topic a subscriber listens on; one topic per [`Event`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    SystemReset,
    EmulatorStateChange,
    ExecutionCpuStep,
    VideoFrameRefresh,
    MemoryChanged,
    LabelChanged,
    BreakpointHit,
    AudioFrameReady,
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::SystemReset => Topic::SystemReset,
            Event::EmulatorStateChange { .. } => Topic::EmulatorStateChange,
            Event::ExecutionCpuStep { .. } => Topic::ExecutionCpuStep,
            Event::VideoFrameRefresh { .. } => Topic::VideoFrameRefresh,
            Event::MemoryChanged { .. } => Topic::MemoryChanged,
            Event::LabelChanged { .. } => Topic::LabelChanged,
            Event::BreakpointHit { .. } => Topic::BreakpointHit,
            Event::AudioFrameReady { .. } => Topic::AudioFrameReady,
        }
    }
}

type Subscriber = Box<dyn FnMut(&Event) + Send>;

/// Fixed-topic synchronous bus. `publish` runs every subscriber of the matching topic in
/// registration order, on the caller's (engine) thread.
#[derive(Default)]
pub struct MessageBus {
    subscribers: HashMap<Topic, Vec<Subscriber>>,
}

impl MessageBus {
    pub fn new() -> Self {
        MessageBus::default()
    }

    pub fn subscribe<F>(&mut self, topic: Topic, callback: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.subscribers.entry(topic).or_default().push(Box::new(callback));
    }

    pub fn publish(&mut self, event: Event) {
        if let Some(subs) = self.subscribers.get_mut(&event.topic()) {
            for sub in subs.iter_mut() {
                sub(&event);
            }
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.get(&topic).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn publish_invokes_only_matching_topic_subscribers() {
        let mut bus = MessageBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        bus.subscribe(Topic::BreakpointHit, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(Event::SystemReset);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        bus.publish(Event::BreakpointHit { id: 1, address: 0x8000 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multiple_subscribers_on_same_topic_all_run() {
        let mut bus = MessageBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            bus.subscribe(Topic::VideoFrameRefresh, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.publish(Event::VideoFrameRefresh { frame_counter: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
