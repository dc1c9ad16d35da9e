use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::aggregate::aggregate;
use crate::config::Config;
use crate::image_cache::ImageCache;
use crate::resolve::{DefaultImagePolicy, ResolveOutcome, resolve};
use crate::sheet_fetch::{PublishedSheet, SheetSource};
use crate::state::{Delta, PollCommand};
use crate::wiki_fetch::{SummaryLookup, WikiSummaryClient};

/// One fetch → aggregate → resolve pass. Only the sheet fetch can fail.
pub fn poll_cycle<S, L>(
    sheet: &S,
    lookup: &L,
    cache: &mut ImageCache,
    policy: DefaultImagePolicy,
) -> Result<ResolveOutcome>
where
    S: SheetSource + ?Sized,
    L: SummaryLookup + ?Sized,
{
    let raw = sheet.fetch_csv().context("sheet fetch")?;
    let ranked = aggregate(&raw);
    Ok(resolve(&ranked, cache, lookup, policy))
}

/// Owns the image cache and runs poll cycles one at a time.
pub struct Poller<S, L> {
    sheet: S,
    lookup: L,
    cache: ImageCache,
    policy: DefaultImagePolicy,
    pool: Option<rayon::ThreadPool>,
    generation: u64,
}

impl<S, L> Poller<S, L>
where
    S: SheetSource,
    L: SummaryLookup,
{
    pub fn new(
        sheet: S,
        lookup: L,
        cache: ImageCache,
        policy: DefaultImagePolicy,
        parallelism: usize,
    ) -> Self {
        Self {
            sheet,
            lookup,
            cache,
            policy,
            pool: build_fetch_pool(parallelism),
            generation: 0,
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Runs a full cycle and reports it on `tx`. Every cycle gets a fresh
    /// generation so the board can drop late results.
    pub fn poll_once(&mut self, tx: &Sender<Delta>) {
        self.generation += 1;
        let generation = self.generation;
        let _ = tx.send(Delta::CycleStarted { generation });

        let started = Instant::now();
        let sheet = &self.sheet;
        let lookup = &self.lookup;
        let policy = self.policy;
        let cache = &mut self.cache;
        let result = with_fetch_pool(&self.pool, || poll_cycle(sheet, lookup, cache, policy));

        match result {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    let _ = tx.send(Delta::Log(format!("[WARN] {warning}")));
                }
                self.persist_cache(tx);
                let _ = tx.send(Delta::Log(format!(
                    "[INFO] Poll #{generation}: {} answers in {:.1}s",
                    outcome.entries.len(),
                    started.elapsed().as_secs_f32()
                )));
                let _ = tx.send(Delta::SetBoard {
                    generation,
                    entries: outcome.entries,
                    cached_images: self.cache.len(),
                });
            }
            Err(err) => {
                let _ = tx.send(Delta::FetchFailed {
                    generation,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    pub fn clear_cache(&mut self, tx: &Sender<Delta>) {
        let dropped = self.cache.len();
        self.cache.clear();
        self.persist_cache(tx);
        let _ = tx.send(Delta::Log(format!(
            "[INFO] Image cache cleared ({dropped} entries)"
        )));
    }

    pub fn persist_cache(&mut self, tx: &Sender<Delta>) {
        if let Err(err) = self.cache.save() {
            let _ = tx.send(Delta::Log(format!("[WARN] Image cache save failed: {err:#}")));
        }
    }

    /// Polls immediately, then every `interval` until told to stop or the
    /// command channel closes. Ticks that fall due during a cycle are skipped.
    pub fn run(mut self, interval: Duration, tx: Sender<Delta>, cmd_rx: Receiver<PollCommand>) {
        let mut next_due = Instant::now();
        loop {
            let wait = next_due.saturating_duration_since(Instant::now());
            match cmd_rx.recv_timeout(wait) {
                Ok(PollCommand::RefreshNow) => next_due = Instant::now(),
                Ok(PollCommand::ClearImageCache) => {
                    self.clear_cache(&tx);
                    next_due = Instant::now();
                }
                Ok(PollCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            if Instant::now() >= next_due {
                self.poll_once(&tx);
                next_due = Instant::now() + interval;
            }
        }
        self.persist_cache(&tx);
    }
}

pub fn spawn_poller(
    config: &Config,
    tx: Sender<Delta>,
    cmd_rx: Receiver<PollCommand>,
) -> JoinHandle<()> {
    let cache = match config.image_cache_path.as_ref() {
        Some(path) => ImageCache::load(path),
        None => ImageCache::load_default(),
    };
    let _ = tx.send(Delta::Log(format!(
        "[INFO] Loaded {} cached images",
        cache.len()
    )));
    let poller = Poller::new(
        PublishedSheet::new(config.sheet_url.clone()),
        WikiSummaryClient::new(config.summary_url.clone()),
        cache,
        config.default_image_policy,
        config.fetch_parallelism,
    );
    let interval = config.poll_interval;
    thread::spawn(move || poller.run(interval, tx, cmd_rx))
}

/// Asks the poller to stop and waits at most `grace` for it. A cycle stuck
/// on slow lookups is left behind; the cache was already saved after the
/// last completed cycle. Returns whether the poller finished in time.
pub fn stop_poller(handle: JoinHandle<()>, cmd_tx: &Sender<PollCommand>, grace: Duration) -> bool {
    let _ = cmd_tx.send(PollCommand::Shutdown);
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
    let _ = handle.join();
    true
}

fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
