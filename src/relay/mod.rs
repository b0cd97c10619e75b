use std::cell::Cell;
use std::io::IoSlice;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, info};
use net_queue::{
    Completion, DeliveryQueue, Monitor, MonitorConfig, Outcome, PacketFlags, QueueConfig,
    QueueStats, ready_fn,
};

mod paced_link;
mod token_bucket;

pub use paced_link::{LinkHandle, PacedLink};
pub use token_bucket::TokenBucket;

const BATCH_LIMIT: usize = 64;

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub capacity: usize,
    pub rate_bytes_per_sec: f64,
    pub burst_bytes: f64,
    pub overhead: usize,
    pub producers: usize,
    /// The first `tracked` producers register completions and pace themselves.
    pub tracked: usize,
    pub window: usize,
    pub packet_size: usize,
    pub report_interval: Duration,
}

// ==========================================
// Endpoint feeding the queue
// ==========================================
struct Producer {
    id: usize,
    tracked: bool,
    window: usize,
    in_flight: Rc<Cell<usize>>,
    completed: Rc<Cell<u64>>,
    seq: u32,
}

impl Producer {
    fn can_produce(&self) -> bool {
        !self.tracked || self.in_flight.get() < self.window
    }

    fn completion(&self) -> Option<Completion<usize>> {
        if !self.tracked {
            return None;
        }
        let in_flight = self.in_flight.clone();
        let completed = self.completed.clone();
        Some(Box::new(move |_sender: &usize, _outcome: Outcome| {
            in_flight.set(in_flight.get().saturating_sub(1));
            completed.set(completed.get() + 1);
        }))
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: QueueStats,
    pub completions: u64,
    pub purged: usize,
    pub reports: usize,
}

pub struct Relay {
    queue: DeliveryQueue<usize>,
    link: LinkHandle,
    link_name: String,
    producers: Vec<Producer>,
    monitor: Monitor,
    body: Vec<u8>,
}

impl Relay {
    pub fn new(settings: &RelaySettings) -> anyhow::Result<Self> {
        let bucket = TokenBucket::new(settings.rate_bytes_per_sec, settings.burst_bytes, "link");
        let link_name = bucket.name().to_string();
        let (link, handle) = PacedLink::new(bucket, settings.overhead, settings.packet_size);

        // senders hold back while the link owes us a flush, so nothing overtakes the backlog
        let stalled = handle.clone();
        let queue = DeliveryQueue::with_config(
            QueueConfig::default().with_capacity(settings.capacity),
            link,
        )
        .with_readiness(ready_fn(move |_: &usize| !stalled.is_stalled()));

        let producers = (0..settings.producers)
            .map(|id| Producer {
                id,
                tracked: id < settings.tracked,
                window: settings.window,
                in_flight: Rc::new(Cell::new(0)),
                completed: Rc::new(Cell::new(0)),
                seq: 0,
            })
            .collect();

        let monitor = Monitor::new(
            MonitorConfig::new("RelayQueue", settings.report_interval),
            Instant::now(),
        )?;

        Ok(Self {
            queue,
            link: handle,
            link_name,
            producers,
            monitor,
            body: vec![0xA5; settings.packet_size.saturating_sub(8)],
        })
    }

    pub fn run(mut self, duration: Duration) -> RunSummary {
        let deadline = Instant::now() + duration;
        let mut reports = 0;

        while Instant::now() < deadline {
            let mut working = false;

            // the link said NotDelivered earlier; it now owes the queue a flush
            if self.link.take_resume() {
                working = true;
                if !self.queue.flush() {
                    debug!(
                        "{} stalled again mid-flush ({:.0} tokens), backlog {}",
                        self.link_name,
                        self.link.tokens(),
                        self.queue.len()
                    );
                }
            }

            for _ in 0..BATCH_LIMIT {
                let mut sent_any = false;
                for producer in &mut self.producers {
                    if !producer.can_produce() {
                        continue;
                    }
                    sent_any = true;
                    producer.seq = producer.seq.wrapping_add(1);

                    let mut header = [0u8; 8];
                    header[..4].copy_from_slice(&(producer.id as u32).to_be_bytes());
                    header[4..].copy_from_slice(&producer.seq.to_be_bytes());
                    let iov = [IoSlice::new(&header), IoSlice::new(&self.body)];

                    let completion = producer.completion();
                    let outcome =
                        self.queue
                            .send_scattered(producer.id, PacketFlags::NONE, &iov, completion);
                    if producer.tracked && outcome == Outcome::NotDelivered {
                        producer.in_flight.set(producer.in_flight.get() + 1);
                    }
                }
                if !sent_any {
                    break;
                }
                working = true;
            }

            if self
                .monitor
                .observe(Instant::now(), self.queue.stats(), self.queue.len())
                .is_some()
            {
                reports += 1;
            }

            if !working {
                std::thread::sleep(Duration::from_micros(100));
            }
        }

        self.shutdown(reports)
    }

    fn shutdown(self, reports: usize) -> RunSummary {
        let mut purged = 0;
        for producer in &self.producers {
            purged += self.queue.purge(&producer.id);
        }
        let completions = self.producers.iter().map(|p| p.completed.get()).sum();
        let stats = self.queue.teardown();

        info!(
            "relay done: delivered {} dropped {} purged {} completions {}",
            stats.delivered, stats.dropped, purged, completions
        );

        RunSummary {
            stats,
            completions,
            purged,
            reports,
        }
    }
}
