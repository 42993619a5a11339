//! The scan loop.
//!
//! A single task owns the symbol history and multiplexes the three polling
//! cadences, so cycles never overlap. Each tick consults the clock gate
//! first; nothing is fetched while the gate is closed.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::scheduler::{ScheduledTask, Scheduler};
use super::status::{ScanPhase, ScanStatus};
use crate::application::ports::{
    AlertDispatchPort, Clock, DispatchError, FetchError, MarketDataPort,
};
use crate::domain::alerts::AlertEvent;
use crate::domain::evaluator::{AlertEvaluator, Watchlist};
use crate::domain::history::{ContractCooldowns, SymbolStore};
use crate::domain::market_hours::{ClockGate, ClosedReason, GateDecision, OpenWindow};
use crate::domain::snapshot::Symbol;
use crate::infrastructure::config::ScheduleSettings;
use crate::infrastructure::metrics::{self, FeedKind, ScanOutcome};

/// Startup notice text.
pub const STARTUP_NOTICE: &str = "🤖 Alert scanner started";
/// Shutdown notice text.
pub const SHUTDOWN_NOTICE: &str = "🛑 Alert scanner stopped";

/// Adapters the loop talks to.
#[derive(Clone)]
pub struct ScanPorts {
    /// Quote and options source.
    pub market_data: Arc<dyn MarketDataPort>,
    /// Alert destination.
    pub dispatcher: Arc<dyn AlertDispatchPort>,
    /// Wall clock for the gate.
    pub clock: Arc<dyn Clock>,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate closed; nothing fetched.
    Closed,
    /// Fetch failed or timed out.
    FetchFailed,
    /// Work done; `alerts` raised, `delivered` of them sent.
    Completed {
        /// Alerts raised.
        alerts: usize,
        /// Alerts delivered.
        delivered: usize,
    },
}

/// Gate, fetch, evaluate, dispatch.
pub struct ScanLoop {
    ports: ScanPorts,
    gate: ClockGate,
    evaluator: AlertEvaluator,
    watchlist: Watchlist,
    watchlist_symbols: Vec<Symbol>,
    schedule: ScheduleSettings,
    store: SymbolStore,
    contract_cooldowns: ContractCooldowns,
    status: Arc<ScanStatus>,
    scans: u64,
}

impl ScanLoop {
    /// Create a loop with empty history.
    #[must_use]
    pub fn new(
        ports: ScanPorts,
        gate: ClockGate,
        evaluator: AlertEvaluator,
        watchlist: Watchlist,
        schedule: ScheduleSettings,
    ) -> Self {
        let store = SymbolStore::new(evaluator.config().volume_window);
        Self {
            ports,
            gate,
            evaluator,
            watchlist_symbols: watchlist.sorted(),
            watchlist,
            schedule,
            store,
            contract_cooldowns: ContractCooldowns::new(),
            status: Arc::new(ScanStatus::new()),
            scans: 0,
        }
    }

    /// Shared status handle for the health server.
    #[must_use]
    pub fn status(&self) -> Arc<ScanStatus> {
        Arc::clone(&self.status)
    }

    /// Per-symbol history.
    #[must_use]
    pub const fn store(&self) -> &SymbolStore {
        &self.store
    }

    /// Run until `cancel` fires.
    ///
    /// Sends the startup notice first and the shutdown notice last. A tick in
    /// progress when cancellation arrives finishes before the loop exits.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            watchlist = self.watchlist.len(),
            scan_secs = self.schedule.scan_interval.as_secs(),
            options_secs = self.schedule.options_interval.as_secs(),
            gainers_secs = self.schedule.gainers_interval.as_secs(),
            "Scan loop starting"
        );
        self.notify(STARTUP_NOTICE).await;

        let mut scheduler = Scheduler::new(&self.schedule);
        loop {
            self.status.set_phase(ScanPhase::Idle);
            let task = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                task = scheduler.next() => task,
            };
            self.tick(task).await;
        }

        tracing::info!(scans = self.scans, "Scan loop stopping");
        self.notify(SHUTDOWN_NOTICE).await;
        self.status.set_phase(ScanPhase::Stopped);
    }

    /// Run one scheduled task.
    pub async fn tick(&mut self, task: ScheduledTask) -> TickOutcome {
        let outcome = match task {
            ScheduledTask::Scan => self.scan().await,
            ScheduledTask::UnusualOptions => self.unusual_options().await,
            ScheduledTask::TopGainers => self.top_gainers().await,
        };
        self.status.set_phase(ScanPhase::Idle);
        outcome
    }

    async fn scan(&mut self) -> TickOutcome {
        self.scans += 1;
        self.status.record_scan();

        let window = match self.check_gate() {
            Ok(window) => window,
            Err(reason) => {
                metrics::record_scan(ScanOutcome::Closed);
                tracing::debug!(scan = self.scans, reason = %reason, "Gate closed, skipping scan");
                self.maybe_heartbeat(&reason).await;
                return TickOutcome::Closed;
            }
        };

        self.status.set_phase(ScanPhase::Fetching);
        let started = Instant::now();
        let fetched = timeout(
            self.schedule.fetch_timeout,
            self.ports.market_data.fetch_snapshots(&self.watchlist_symbols),
        )
        .await
        .unwrap_or(Err(FetchError::Timeout));
        metrics::record_fetch_duration(FeedKind::Snapshots, started.elapsed());

        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                self.fetch_failed(FeedKind::Snapshots, &e);
                metrics::record_scan(ScanOutcome::FetchFailed);
                return TickOutcome::FetchFailed;
            }
        };
        self.status.record_fetch_ok(window.checked_at());

        self.status.set_phase(ScanPhase::Evaluating);
        let mut alerts = Vec::new();
        let mut rejected = 0_u64;
        for row in rows {
            match row {
                Ok(snapshot) => {
                    let state = self.store.entry(&snapshot.symbol);
                    alerts.extend(self.evaluator.evaluate(&window, state, snapshot, &self.watchlist));
                }
                Err(e) => {
                    rejected += 1;
                    tracing::debug!(error = %e, "Rejected snapshot row");
                }
            }
        }
        if rejected > 0 {
            metrics::record_snapshots_rejected(rejected);
            self.status.record_rejected(rejected);
        }
        let evicted = self.store.evict_idle(
            window.local_date(),
            window.checked_at(),
            self.evaluator.config().idle_eviction,
        );
        if evicted > 0 {
            tracing::debug!(evicted, symbols = self.store.len(), "Evicted idle symbols");
        }
        metrics::record_scan(ScanOutcome::Completed);

        let delivered = self.dispatch_all(&alerts).await;
        tracing::debug!(
            scan = self.scans,
            symbols = self.store.len(),
            alerts = alerts.len(),
            rejected,
            "Scan complete"
        );
        TickOutcome::Completed {
            alerts: alerts.len(),
            delivered,
        }
    }

    async fn unusual_options(&mut self) -> TickOutcome {
        let Ok(window) = self.check_gate() else {
            return TickOutcome::Closed;
        };

        self.status.set_phase(ScanPhase::Fetching);
        let started = Instant::now();
        let fetched = timeout(
            self.schedule.fetch_timeout,
            self.ports.market_data.fetch_options_activity(),
        )
        .await
        .unwrap_or(Err(FetchError::Timeout));
        metrics::record_fetch_duration(FeedKind::Options, started.elapsed());

        let activity = match fetched {
            Ok(activity) => activity,
            Err(e) => {
                self.fetch_failed(FeedKind::Options, &e);
                return TickOutcome::FetchFailed;
            }
        };

        self.status.set_phase(ScanPhase::Evaluating);
        let rows = activity.len();
        let alerts =
            self.evaluator
                .evaluate_options(&window, activity, &mut self.contract_cooldowns);
        tracing::debug!(rows, alerts = alerts.len(), "Options poll complete");

        let delivered = self.dispatch_all(&alerts).await;
        TickOutcome::Completed {
            alerts: alerts.len(),
            delivered,
        }
    }

    async fn top_gainers(&mut self) -> TickOutcome {
        let Ok(window) = self.check_gate() else {
            return TickOutcome::Closed;
        };

        self.status.set_phase(ScanPhase::Evaluating);
        let alerts: Vec<AlertEvent> = self
            .evaluator
            .top_gainers(&window, &self.store)
            .into_iter()
            .collect();
        let delivered = self.dispatch_all(&alerts).await;
        TickOutcome::Completed {
            alerts: alerts.len(),
            delivered,
        }
    }

    fn check_gate(&self) -> Result<OpenWindow, ClosedReason> {
        self.status.set_phase(ScanPhase::Gating);
        let decision = self.gate.check(self.ports.clock.now());
        metrics::set_gate_open(decision.is_open());
        match decision {
            GateDecision::Open(window) => {
                self.status.set_gate(true, None);
                Ok(window)
            }
            GateDecision::Closed(reason) => {
                if let ClosedReason::CalendarUnavailable(err) = &reason {
                    tracing::warn!(error = %err, "Holiday calendar unavailable, gate closed");
                }
                self.status.set_gate(false, Some(reason.as_str()));
                Err(reason)
            }
        }
    }

    async fn maybe_heartbeat(&self, reason: &ClosedReason) {
        let every = u64::from(self.schedule.heartbeat_ticks);
        if every == 0 || self.scans % every != 0 {
            return;
        }
        let text = format!(
            "💤 Bot alive - Market closed ({})\nScans: {}",
            reason.as_str(),
            self.scans
        );
        self.notify(&text).await;
    }

    fn fetch_failed(&self, feed: FeedKind, err: &FetchError) {
        tracing::warn!(feed = feed.as_str(), error = %err, "Market data fetch failed");
        metrics::record_fetch_failure(feed, err.reason());
        self.status.record_fetch_failure(err.to_string());
    }

    async fn dispatch_all(&self, alerts: &[AlertEvent]) -> usize {
        if alerts.is_empty() {
            return 0;
        }
        self.status.set_phase(ScanPhase::Dispatching);
        let mut delivered = 0;
        for alert in alerts {
            match self.deliver(&alert.render()).await {
                Ok(()) => {
                    delivered += 1;
                    metrics::record_alert(alert.kind());
                    self.status.record_alert_sent();
                    tracing::info!(
                        alert_id = %alert.id(),
                        kind = alert.kind().as_str(),
                        symbol = alert.symbol().map(Symbol::as_str),
                        "Alert sent"
                    );
                }
                Err(e) => {
                    self.dispatch_failed(&e);
                    tracing::warn!(
                        alert_id = %alert.id(),
                        kind = alert.kind().as_str(),
                        error = %e,
                        "Alert dropped"
                    );
                }
            }
        }
        delivered
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.deliver(text).await {
            self.dispatch_failed(&e);
            tracing::warn!(error = %e, "Notice not delivered");
        }
    }

    async fn deliver(&self, text: &str) -> Result<(), DispatchError> {
        timeout(
            self.schedule.dispatch_timeout,
            self.ports.dispatcher.dispatch(text),
        )
        .await
        .unwrap_or(Err(DispatchError::Timeout))
    }

    fn dispatch_failed(&self, err: &DispatchError) {
        metrics::record_dispatch_failure(err.reason());
        self.status.record_dispatch_failure();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::{
        FixedClock, MockAlertDispatchPort, MockMarketDataPort, RecordingDispatcher,
    };
    use crate::domain::market_hours::{OperatingWindow, StaticHolidayCalendar};
    use crate::domain::options::{OptionType, OptionsActivity};
    use crate::domain::snapshot::QuoteSnapshot;

    // Monday 2026-10-19 10:00 America/New_York.
    fn open_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap()
    }

    // Sunday.
    fn closed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).unwrap()
    }

    fn snapshot(symbol: &str, bid: u64, size: u64, last: u64, volume: u64) -> QuoteSnapshot {
        QuoteSnapshot::builder(symbol)
            .bid(bid.into(), size)
            .last_price(Some(last.into()))
            .volume(Some(volume))
            .previous_close(Some(dec!(100)))
            .build()
            .unwrap()
    }

    fn scan_loop(
        market_data: MockMarketDataPort,
        dispatcher: Arc<dyn AlertDispatchPort>,
        now: DateTime<Utc>,
        watchlist: &str,
    ) -> ScanLoop {
        let gate = ClockGate::new(
            OperatingWindow::default(),
            Arc::new(StaticHolidayCalendar::nyse()),
        );
        ScanLoop::new(
            ScanPorts {
                market_data: Arc::new(market_data),
                dispatcher,
                clock: Arc::new(FixedClock::new(now)),
            },
            gate,
            AlertEvaluator::default(),
            Watchlist::parse(watchlist),
            ScheduleSettings {
                heartbeat_ticks: 3,
                ..ScheduleSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn closed_gate_never_fetches() {
        let mut market_data = MockMarketDataPort::new();
        market_data.expect_fetch_snapshots().never();
        let dispatcher = RecordingDispatcher::new();
        let mut scanner = scan_loop(market_data, Arc::new(dispatcher.clone()), closed_time(), "");

        for _ in 0..3 {
            assert_eq!(scanner.tick(ScheduledTask::Scan).await, TickOutcome::Closed);
        }
        assert_eq!(
            scanner.tick(ScheduledTask::TopGainers).await,
            TickOutcome::Closed
        );

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("💤 Bot alive - Market closed (weekend)"));
        assert!(sent[0].ends_with("Scans: 3"));
        assert!(!scanner.status().snapshot().gate_open);
    }

    #[tokio::test]
    async fn bid_match_dispatched_and_bad_rows_skipped() {
        let mut market_data = MockMarketDataPort::new();
        market_data.expect_fetch_snapshots().times(1).returning(|_| {
            Ok(vec![
                Ok(snapshot("NVR", 2500, 20, 2510, 1000)),
                Err(crate::domain::snapshot::SnapshotError::EmptySymbol),
                Ok(snapshot("AAPL", 1500, 25, 1500, 1000)),
            ])
        });
        let dispatcher = RecordingDispatcher::new();
        let mut scanner = scan_loop(market_data, Arc::new(dispatcher.clone()), open_time(), "");

        let outcome = scanner.tick(ScheduledTask::Scan).await;
        assert_eq!(
            outcome,
            TickOutcome::Completed {
                alerts: 1,
                delivered: 1
            }
        );
        assert_eq!(dispatcher.sent().len(), 1);
        assert!(dispatcher.sent()[0].contains("NVR"));

        let status = scanner.status().snapshot();
        assert_eq!(status.rows_rejected, 1);
        assert_eq!(status.alerts_sent, 1);
        assert_eq!(status.last_fetch_ok_at, Some(open_time()));
        assert_eq!(scanner.store().len(), 2);
    }

    #[tokio::test]
    async fn watchlist_passed_to_fetch() {
        let mut market_data = MockMarketDataPort::new();
        market_data
            .expect_fetch_snapshots()
            .withf(|symbols| {
                symbols.iter().map(Symbol::as_str).collect::<Vec<_>>() == ["AMD", "NVR"]
            })
            .times(1)
            .returning(|_| Ok(Vec::new()));
        let mut scanner = scan_loop(
            market_data,
            Arc::new(RecordingDispatcher::new()),
            open_time(),
            "nvr, amd",
        );
        scanner.tick(ScheduledTask::Scan).await;
    }

    #[tokio::test]
    async fn fetch_failure_is_counted_and_loop_continues() {
        let mut market_data = MockMarketDataPort::new();
        market_data
            .expect_fetch_snapshots()
            .times(1)
            .returning(|_| Err(FetchError::Unauthorized));
        let mut scanner = scan_loop(
            market_data,
            Arc::new(RecordingDispatcher::new()),
            open_time(),
            "",
        );

        assert_eq!(
            scanner.tick(ScheduledTask::Scan).await,
            TickOutcome::FetchFailed
        );
        let status = scanner.status().snapshot();
        assert_eq!(status.fetch_failures, 1);
        assert!(status.last_fetch_failed);
        assert_eq!(status.phase, ScanPhase::Idle);
    }

    #[tokio::test]
    async fn dispatch_failure_drops_alert() {
        let mut market_data = MockMarketDataPort::new();
        market_data
            .expect_fetch_snapshots()
            .returning(|_| Ok(vec![Ok(snapshot("NVR", 2500, 20, 2510, 1000))]));
        let mut dispatcher = MockAlertDispatchPort::new();
        dispatcher.expect_dispatch().times(1).returning(|_| {
            Err(DispatchError::Rejected {
                status: 400,
                message: "chat not found".into(),
            })
        });
        let mut scanner = scan_loop(market_data, Arc::new(dispatcher), open_time(), "");

        assert_eq!(
            scanner.tick(ScheduledTask::Scan).await,
            TickOutcome::Completed {
                alerts: 1,
                delivered: 0
            }
        );
        assert_eq!(scanner.status().snapshot().dispatch_failures, 1);
    }

    #[tokio::test]
    async fn options_alerts_respect_contract_cooldown() {
        let row = OptionsActivity {
            underlying: Symbol::new("AMD"),
            contract: "AMD261120P00150000".into(),
            option_type: OptionType::Put,
            strike: dec!(150),
            expiration: chrono::NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            volume: 5_000,
            open_interest: 1_000,
            last_price: Some(dec!(3.45)),
        };
        let mut market_data = MockMarketDataPort::new();
        market_data
            .expect_fetch_options_activity()
            .times(2)
            .returning(move || Ok(vec![row.clone()]));
        let dispatcher = RecordingDispatcher::new();
        let mut scanner = scan_loop(market_data, Arc::new(dispatcher.clone()), open_time(), "");

        scanner.tick(ScheduledTask::UnusualOptions).await;
        scanner.tick(ScheduledTask::UnusualOptions).await;
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn top_gainers_after_scan() {
        let mut market_data = MockMarketDataPort::new();
        market_data.expect_fetch_snapshots().returning(|_| {
            Ok(vec![
                Ok(snapshot("AAA", 10, 1, 110, 100)),
                Ok(snapshot("BBB", 10, 1, 150, 100)),
            ])
        });
        let dispatcher = RecordingDispatcher::new();
        let mut scanner = scan_loop(market_data, Arc::new(dispatcher.clone()), open_time(), "");

        assert_eq!(
            scanner.tick(ScheduledTask::TopGainers).await,
            TickOutcome::Completed {
                alerts: 0,
                delivered: 0
            }
        );
        scanner.tick(ScheduledTask::Scan).await;
        scanner.tick(ScheduledTask::TopGainers).await;

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        let bbb = sent[0].find("BBB").unwrap();
        let aaa = sent[0].find("AAA").unwrap();
        assert!(bbb < aaa);
    }

    #[tokio::test]
    async fn previous_session_symbols_leave_gainers_and_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut market_data = MockMarketDataPort::new();
        market_data.expect_fetch_snapshots().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![Ok(snapshot("OLDRUN", 10, 1, 190, 100))])
            } else {
                Ok(vec![Ok(snapshot("TODAY", 10, 1, 105, 100))])
            }
        });
        let clock = Arc::new(FixedClock::new(open_time()));
        let dispatcher = RecordingDispatcher::new();
        let mut scanner = ScanLoop::new(
            ScanPorts {
                market_data: Arc::new(market_data),
                dispatcher: Arc::new(dispatcher.clone()),
                clock: clock.clone(),
            },
            ClockGate::new(
                OperatingWindow::default(),
                Arc::new(StaticHolidayCalendar::nyse()),
            ),
            AlertEvaluator::default(),
            Watchlist::default(),
            ScheduleSettings::default(),
        );

        scanner.tick(ScheduledTask::Scan).await;
        clock.advance(chrono::Duration::days(1));
        scanner.tick(ScheduledTask::Scan).await;
        scanner.tick(ScheduledTask::TopGainers).await;

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("🏆 TOP 1 GAINERS:\n1. TODAY"), "{}", sent[0]);
        assert!(!sent[0].contains("OLDRUN"));
        assert_eq!(scanner.store().len(), 1);
        assert!(scanner.store().get(&Symbol::new("OLDRUN")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        struct Stalled;

        #[async_trait::async_trait]
        impl MarketDataPort for Stalled {
            async fn fetch_snapshots(
                &self,
                _watchlist: &[Symbol],
            ) -> Result<Vec<crate::application::ports::SnapshotResult>, FetchError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }

            async fn fetch_options_activity(&self) -> Result<Vec<OptionsActivity>, FetchError> {
                Ok(Vec::new())
            }
        }

        let gate = ClockGate::new(
            OperatingWindow::default(),
            Arc::new(StaticHolidayCalendar::nyse()),
        );
        let mut scanner = ScanLoop::new(
            ScanPorts {
                market_data: Arc::new(Stalled),
                dispatcher: Arc::new(RecordingDispatcher::new()),
                clock: Arc::new(FixedClock::new(open_time())),
            },
            gate,
            AlertEvaluator::default(),
            Watchlist::default(),
            ScheduleSettings::default(),
        );

        assert_eq!(
            scanner.tick(ScheduledTask::Scan).await,
            TickOutcome::FetchFailed
        );
        assert_eq!(
            scanner.status().snapshot().last_error.as_deref(),
            Some("market data request timed out")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_sends_lifecycle_notices() {
        let market_data = MockMarketDataPort::new();
        let dispatcher = RecordingDispatcher::new();
        let scanner = scan_loop(market_data, Arc::new(dispatcher.clone()), closed_time(), "");
        let status = scanner.status();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(scanner.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        handle.await.unwrap();

        let sent = dispatcher.sent();
        assert_eq!(sent.first().map(String::as_str), Some(STARTUP_NOTICE));
        assert_eq!(sent.last().map(String::as_str), Some(SHUTDOWN_NOTICE));
        // ticks at 0, 10, 20: the third closed scan triggers a heartbeat
        assert_eq!(sent.len(), 3);
        assert_eq!(status.snapshot().phase, ScanPhase::Stopped);
        assert_eq!(status.snapshot().scans, 3);
    }
}
