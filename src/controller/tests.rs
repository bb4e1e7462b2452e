//! Controller behaviour under real concurrency: gating, failure paths, teardown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{
    Command, Controller, ControllerConfig, ControllerError, EventKind, Experiment, ExperimentController,
    ExperimentError, ExperimentState, HeadlessController, StepOutcome, Subscribe,
};

#[derive(Default)]
struct Probe {
    stop_after: Option<u64>,
    fail_step_at: Option<u64>,
    fail_open: bool,
    fail_reload: bool,
    fail_back: bool,
    panic_on: Option<Command>,
    autorun: bool,
    step_delay: Duration,

    steps: AtomicU64,
    in_step: AtomicBool,
    overlaps: AtomicU64,
    backs: AtomicU64,
    reloads: AtomicU64,
    closes: AtomicU64,
    faults: AtomicU64,
    states: Mutex<Vec<ExperimentState>>,
    panic_next_state: AtomicBool,
}

impl Probe {
    fn steps(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    fn count(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Experiment for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn open(&self) -> Result<(), ExperimentError> {
        if self.panic_on == Some(Command::Open) {
            panic!("model loader exploded");
        }
        if self.fail_open {
            return Err(ExperimentError::build("missing model file"));
        }
        Ok(())
    }

    async fn step(&self) -> Result<StepOutcome, ExperimentError> {
        if self.in_step.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
        let n = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_step.store(false, Ordering::SeqCst);

        if self.fail_step_at == Some(n) {
            return Err(ExperimentError::runtime("agent divided by zero"));
        }
        if self.stop_after == Some(n) {
            return Ok(StepOutcome::Stop);
        }
        Ok(StepOutcome::Continue)
    }

    async fn step_back(&self) -> Result<(), ExperimentError> {
        self.backs.fetch_add(1, Ordering::SeqCst);
        if self.fail_back {
            return Err(ExperimentError::runtime("no recorded history"));
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), ExperimentError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if self.panic_on == Some(Command::Reload) {
            panic!("reload exploded");
        }
        if self.fail_reload {
            return Err(ExperimentError::build("parameters no longer valid"));
        }
        Ok(())
    }

    fn is_autorun(&self) -> bool {
        self.autorun
    }

    fn on_state_changed(&self, state: ExperimentState) {
        if self.panic_next_state.swap(false, Ordering::SeqCst) {
            panic!("state listener exploded");
        }
        self.states.lock().unwrap().push(state);
    }

    fn report_fault(&self, _error: &ExperimentError) {
        self.faults.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn controller(probe: &Arc<Probe>) -> Arc<Controller> {
    init_tracing();
    Controller::new(probe.clone(), ControllerConfig::default())
}

/// Routes controller logs to the test output; `RUST_LOG=simvisor=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Waits until the step counter stops moving and returns it.
async fn settled_steps(probe: &Probe) -> u64 {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let n = probe.steps();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(probe.steps(), n, "experiment kept stepping");
    n
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_step_commands_run_one_step_each() {
    let probe = Arc::new(Probe {
        step_delay: Duration::from_millis(1),
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    let mut callers = Vec::new();
    for _ in 0..50 {
        let ctl = Arc::clone(&ctl);
        callers.push(tokio::spawn(async move { ctl.process_step(true).await }));
    }
    for caller in callers {
        assert!(caller.await.unwrap());
    }

    wait_until("50 steps", || probe.steps() == 50).await;
    assert_eq!(settled_steps(&probe).await, 50);
    assert_eq!(Probe::count(&probe.overlaps), 0);
    assert_eq!(ctl.cycle(), 50);
    assert!(ctl.is_paused());

    ctl.dispose().await;
    ctl.join().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_runs_continuously_until_pause() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);
    assert_eq!(settled_steps(&probe).await, 0);

    assert!(ctl.process_start(true).await);
    assert!(!ctl.is_paused());
    assert_eq!(ctl.state(), ExperimentState::Running);
    wait_until("100 steps", || probe.steps() >= 100).await;

    assert!(ctl.process_pause(true).await);
    assert!(ctl.is_paused());
    assert_eq!(ctl.state(), ExperimentState::Paused);
    let paused_at = settled_steps(&probe).await;

    assert!(ctl.process_step(true).await);
    wait_until("one more step", || probe.steps() == paused_at + 1).await;
    assert_eq!(settled_steps(&probe).await, paused_at + 1);

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_pause_toggles() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    assert!(ctl.process_start_pause(true).await);
    assert!(!ctl.is_paused());
    assert!(ctl.process_start_pause(true).await);
    assert!(ctl.is_paused());

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispose_is_idempotent() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(true).await);
    wait_until("some steps", || probe.steps() > 0).await;

    ctl.dispose().await;
    ctl.dispose().await;

    assert!(ctl.is_disposing());
    assert!(ctl.is_paused());
    assert_eq!(ctl.state(), ExperimentState::None);
    assert_eq!(Probe::count(&probe.closes), 0);
    let nones = probe
        .states
        .lock()
        .unwrap()
        .iter()
        .filter(|s| **s == ExperimentState::None)
        .count();
    assert_eq!(nones, 1);

    assert!(!ctl.process_start(false).await);
    assert!(!ctl.process_step(true).await);
    ctl.join().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_notifies_experiment_once() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    ctl.close().await;
    ctl.close().await;
    ctl.dispose().await;

    assert_eq!(Probe::count(&probe.closes), 1);
    assert!(ctl.is_disposing());
    ctl.join().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn flooding_async_submissions_never_blocks() {
    let probe = Arc::new(Probe {
        step_delay: Duration::from_millis(5),
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    let started = Instant::now();
    let mut accepted = 0;
    let mut rejected = 0;
    for _ in 0..1_000 {
        if ctl.process_step(false).await {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(accepted > 0);
    assert!(rejected > 0);

    ctl.dispose().await;
    ctl.join().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn headless_and_interactive_agree_on_step_count() {
    const K: u64 = 25;

    let batch = Arc::new(Probe {
        stop_after: Some(K),
        ..Default::default()
    });
    let headless = HeadlessController::new(batch.clone());
    assert!(headless.process_open(true).await);
    assert!(headless.process_start(true).await);
    assert_eq!(batch.steps(), K);
    assert_eq!(headless.cycle(), K);
    assert!(!headless.is_paused());

    let paced = Arc::new(Probe {
        stop_after: Some(K),
        ..Default::default()
    });
    let ctl = controller(&paced);
    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(true).await);
    wait_until("stop condition", || paced.steps() == K).await;
    assert_eq!(settled_steps(&paced).await, K);
    assert!(ctl.is_paused());
    assert_eq!(ctl.cycle(), K);
    assert_eq!(ctl.state(), ExperimentState::Paused);

    // Finished experiments do not step again.
    assert!(ctl.process_step(true).await);
    assert_eq!(settled_steps(&paced).await, K);

    ctl.dispose().await;
}

#[tokio::test]
async fn headless_start_pause_runs_the_experiment() {
    let probe = Arc::new(Probe {
        stop_after: Some(5),
        ..Default::default()
    });
    let headless = HeadlessController::new(probe.clone());

    assert!(headless.process_start_pause(true).await);
    assert_eq!(probe.steps(), 5);
}

#[tokio::test]
async fn headless_reports_step_fault_and_rejects_after_close() {
    let probe = Arc::new(Probe {
        fail_step_at: Some(3),
        ..Default::default()
    });
    let headless = HeadlessController::new(probe.clone());

    assert!(headless.process_pause(false).await);
    assert!(!headless.process_start(true).await);
    assert_eq!(Probe::count(&probe.faults), 1);
    assert_eq!(headless.cycle(), 2);

    headless.close().await;
    headless.close().await;
    assert_eq!(Probe::count(&probe.closes), 1);
    assert!(headless.is_disposing());
    assert!(!headless.process_open(true).await);
    assert!(!headless.process_start(true).await);
    assert_eq!(probe.steps(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn open_failure_closes_and_disposes() {
    let probe = Arc::new(Probe {
        fail_open: true,
        ..Default::default()
    });
    let ctl = controller(&probe);

    assert!(!ctl.process_open(true).await);
    assert_eq!(Probe::count(&probe.faults), 1);
    assert_eq!(Probe::count(&probe.closes), 1);
    assert!(ctl.is_disposing());
    assert_eq!(ctl.state(), ExperimentState::None);

    assert!(!ctl.process_start(false).await);
    assert!(!ctl.process_start(true).await);
    assert_eq!(probe.steps(), 0);
    ctl.join().await.unwrap();
}

/// Asserts the failure path ran: fault reported, experiment closed once, controller gone.
async fn assert_failed_and_closed(ctl: &Controller, probe: &Probe) {
    assert_eq!(Probe::count(&probe.faults), 1);
    assert_eq!(Probe::count(&probe.closes), 1);
    assert!(ctl.is_disposing());
    assert_eq!(ctl.state(), ExperimentState::None);
    assert!(!ctl.process_start(false).await);
    assert!(!ctl.process_step(true).await);
    ctl.join().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn open_panic_closes_and_disposes() {
    let probe = Arc::new(Probe {
        panic_on: Some(Command::Open),
        ..Default::default()
    });
    let ctl = controller(&probe);

    assert!(!ctl.process_open(true).await);
    assert_failed_and_closed(&ctl, &probe).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reload_failure_closes_and_disposes() {
    let probe = Arc::new(Probe {
        fail_reload: true,
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    assert!(!ctl.process_reload(true).await);
    assert_eq!(Probe::count(&probe.reloads), 1);
    assert_failed_and_closed(&ctl, &probe).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reload_panic_closes_and_disposes() {
    let probe = Arc::new(Probe {
        panic_on: Some(Command::Reload),
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(true).await);

    assert!(!ctl.process_reload(true).await);
    assert_failed_and_closed(&ctl, &probe).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn back_failure_closes_and_disposes() {
    let probe = Arc::new(Probe {
        fail_back: true,
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    assert!(!ctl.process_back(true).await);
    assert_eq!(Probe::count(&probe.backs), 1);
    assert_failed_and_closed(&ctl, &probe).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatcher_survives_a_panicking_command() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    let mut rx = ctl.subscribe();
    assert!(ctl.process_open(true).await);

    probe.panic_next_state.store(true, Ordering::SeqCst);
    assert!(ctl.process_pause(false).await);

    loop {
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no CommandFailed event")
            .expect("bus closed");
        if ev.kind == EventKind::CommandFailed {
            assert_eq!(ev.command, Some(Command::Pause));
            assert!(ev.reason.as_deref().unwrap_or("").contains("state listener exploded"));
            break;
        }
    }

    assert!(ctl.process_step(false).await);
    wait_until("step after panic", || probe.steps() == 1).await;
    assert!(!ctl.is_disposing());
    assert_eq!(Probe::count(&probe.closes), 0);

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_pause_stops_progress() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(false).await);
    wait_until("running", || probe.steps() >= 20).await;

    assert!(ctl.process_pause(false).await);
    wait_until("paused", || ctl.is_paused()).await;
    settled_steps(&probe).await;
    assert_eq!(ctl.state(), ExperimentState::Paused);

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_start_does_not_leak_a_step_past_pause() {
    let probe = Arc::new(Probe {
        step_delay: Duration::from_millis(30),
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    assert!(ctl.process_start(true).await);
    wait_until("step in flight", || probe.in_step.load(Ordering::SeqCst)).await;
    assert!(ctl.process_start(true).await);

    let at_pause = probe.steps();
    assert!(ctl.process_pause(true).await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Only the step already in flight may complete.
    assert!(probe.steps() <= at_pause + 1, "pause let extra steps through");

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_before_open_parks_the_stepper() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);

    assert!(ctl.process_start(true).await);
    wait_until("stepper parked", || {
        ctl.is_paused() && ctl.state() == ExperimentState::Paused
    })
    .await;
    assert_eq!(settled_steps(&probe).await, 0);

    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(true).await);
    wait_until("steps after open", || probe.steps() > 3).await;

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn step_fault_pauses_without_closing() {
    let probe = Arc::new(Probe {
        fail_step_at: Some(3),
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(true).await);

    wait_until("fault", || Probe::count(&probe.faults) == 1).await;
    assert_eq!(settled_steps(&probe).await, 3);
    assert!(ctl.is_paused());
    assert!(!ctl.is_disposing());
    assert_eq!(Probe::count(&probe.closes), 0);
    assert_eq!(ctl.cycle(), 2);

    assert!(ctl.process_step(true).await);
    wait_until("step after fault", || probe.steps() == 4).await;

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reload_resumes_a_running_experiment() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(true).await);
    wait_until("some steps", || probe.steps() >= 3).await;

    assert!(ctl.process_reload(true).await);
    assert_eq!(Probe::count(&probe.reloads), 1);
    assert!(!ctl.is_paused());
    assert_eq!(ctl.state(), ExperimentState::Running);

    let after_reload = probe.steps();
    wait_until("steps after reload", || probe.steps() > after_reload + 3).await;

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reload_keeps_a_paused_experiment_paused() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    assert!(ctl.process_reload(true).await);
    assert!(ctl.is_paused());
    assert_eq!(ctl.state(), ExperimentState::Paused);
    assert_eq!(settled_steps(&probe).await, 0);

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn back_restores_and_pauses() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    assert!(ctl.process_back(true).await);
    assert_eq!(Probe::count(&probe.backs), 1);
    assert!(ctl.is_paused());
    assert_eq!(ctl.state(), ExperimentState::Paused);

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn autorun_starts_after_open() {
    let probe = Arc::new(Probe {
        autorun: true,
        ..Default::default()
    });
    let ctl = controller(&probe);
    assert!(ctl.process_open(true).await);

    wait_until("autorun steps", || probe.steps() > 5).await;
    assert!(!ctl.is_paused());

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_commands_run_in_order() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);

    assert!(ctl.process_open(false).await);
    assert!(ctl.process_step(false).await);
    assert!(ctl.process_step(false).await);

    wait_until("two queued steps", || probe.steps() == 2).await;
    assert_eq!(settled_steps(&probe).await, 2);

    ctl.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn state_changes_are_published() {
    let probe = Arc::new(Probe::default());
    let ctl = controller(&probe);
    let mut rx = ctl.subscribe();

    assert!(ctl.process_open(true).await);

    let mut seen = Vec::new();
    while seen.last() != Some(&ExperimentState::Paused) {
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no state change")
            .expect("bus closed");
        assert_eq!(ev.experiment.as_deref(), Some("probe"));
        if ev.kind == EventKind::StateChanged {
            seen.extend(ev.state);
        }
    }
    assert_eq!(seen, vec![ExperimentState::NotReady, ExperimentState::Paused]);

    ctl.dispose().await;
}

#[derive(Default)]
struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &crate::Event) {
        self.kinds.lock().unwrap().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscribers_receive_teardown_events() {
    let probe = Arc::new(Probe::default());
    let recorder = Arc::new(Recorder::default());
    let ctl = Controller::builder(probe.clone())
        .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
        .build();

    assert!(ctl.process_open(true).await);
    ctl.dispose().await;
    ctl.join().await.unwrap();

    wait_until("teardown events", || {
        let kinds = recorder.kinds.lock().unwrap();
        kinds.contains(&EventKind::ShutdownRequested) && kinds.contains(&EventKind::AllStoppedWithin)
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn join_reports_a_stuck_stepper() {
    let probe = Arc::new(Probe {
        step_delay: Duration::from_secs(30),
        ..Default::default()
    });
    let ctl = Controller::new(
        probe.clone(),
        ControllerConfig {
            grace: Duration::from_millis(50),
            ..ControllerConfig::default()
        },
    );
    assert!(ctl.process_open(true).await);
    assert!(ctl.process_start(true).await);
    wait_until("step in flight", || probe.in_step.load(Ordering::SeqCst)).await;

    ctl.dispose().await;
    match ctl.join().await {
        Err(ControllerError::GraceExceeded { stuck, .. }) => assert_eq!(stuck, vec!["stepper"]),
        other => panic!("expected grace exceeded, got {other:?}"),
    }
}
