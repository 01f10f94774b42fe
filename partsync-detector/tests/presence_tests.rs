//! Debounce and background-loop tests for `partsync-detector`.
//!
//! The loop tests use a scripted probe, never the real process table.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use partsync_core::PresenceEvent;
use partsync_detector::{
    parse_ps_output, parse_tasklist_output, Debouncer, DetectError, PresenceDetector,
    PresenceSink, ProcessProbe, SystemProcessTable,
};
use rstest::rstest;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn run_debouncer(samples: &[bool]) -> Vec<(usize, PresenceEvent)> {
    let mut debouncer = Debouncer::new();
    samples
        .iter()
        .enumerate()
        .filter_map(|(i, up)| debouncer.observe(*up).map(|e| (i, e)))
        .collect()
}

/// Replays a fixed script of samples, then repeats the last one forever.
struct ScriptedProbe {
    script: Mutex<VecDeque<Option<bool>>>,
    last: Mutex<bool>,
}

impl ScriptedProbe {
    /// `None` entries simulate a failed sample.
    fn new(script: &[Option<bool>]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            last: Mutex::new(false),
        }
    }
}

impl ProcessProbe for ScriptedProbe {
    fn host_running(&self) -> Result<bool, DetectError> {
        let next = self.script.lock().expect("script lock").pop_front();
        let mut last = self.last.lock().expect("last lock");
        match next {
            Some(Some(up)) => {
                *last = up;
                Ok(up)
            }
            Some(None) => Err(DetectError::Spawn {
                program: "ps",
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated"),
            }),
            None => Ok(*last),
        }
    }
}

fn channel_sink() -> (PresenceSink, mpsc::UnboundedReceiver<PresenceEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: PresenceSink = Arc::new(move |event| {
        tx.send(event)
            .map_err(|_| partsync_core::DispatchError("presence event"))
    });
    (sink, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<PresenceEvent>) -> PresenceEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within timeout")
        .expect("sink open")
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

#[rstest]
#[case::single_spurious_up(&[false, true, false, false], vec![])]
#[case::confirmed_up(&[true, true], vec![(1, PresenceEvent::Appeared)])]
#[case::confirmed_up_then_down(
    &[true, true, true, false, false],
    vec![(1, PresenceEvent::Appeared), (4, PresenceEvent::Vanished)]
)]
#[case::flapping_never_confirms(&[true, false, true, false, true, false], vec![])]
#[case::absent_at_start_is_silent(&[false, false, false], vec![])]
#[case::late_confirmation(&[false, true, false, true, true], vec![(4, PresenceEvent::Appeared)])]
fn debounce_sequences(#[case] samples: &[bool], #[case] expected: Vec<(usize, PresenceEvent)>) {
    assert_eq!(run_debouncer(samples), expected);
}

#[test]
fn no_event_after_exactly_one_differing_sample() {
    let mut debouncer = Debouncer::new();
    assert_eq!(debouncer.observe(true), None);
    assert_eq!(debouncer.observe(false), None);
}

#[test]
fn stable_transition_fires_once() {
    let events = run_debouncer(&[true; 20]);
    assert_eq!(events, vec![(1, PresenceEvent::Appeared)]);
}

// ---------------------------------------------------------------------------
// Process table parsing
// ---------------------------------------------------------------------------

#[test]
fn ps_output_yields_base_names() {
    let out = "  launchd\n/Applications/KiCad/KiCad.app/Contents/MacOS/kicad\nbash\n\n";
    assert_eq!(parse_ps_output(out), vec!["launchd", "kicad", "bash"]);
}

#[test]
fn tasklist_output_yields_image_names() {
    let out = "\"System Idle Process\",\"0\",\"Services\",\"0\",\"8 K\"\r\n\
               \"kicad.exe\",\"4242\",\"Console\",\"1\",\"120,000 K\"\r\n";
    assert_eq!(
        parse_tasklist_output(out),
        vec!["System Idle Process", "kicad.exe"]
    );
}

#[test]
fn allow_list_matches_case_insensitively() {
    let table = SystemProcessTable::new(["kicad", "KiCad.exe"]);
    assert!(table.matches("KICAD.EXE"));
    assert!(table.matches("kicad"));
    assert!(!table.matches("kicad-cli"));
}

// ---------------------------------------------------------------------------
// Background loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn loop_emits_confirmed_transitions_in_order() {
    let probe = ScriptedProbe::new(&[
        Some(false),
        Some(true),
        Some(true),
        Some(true),
        Some(false),
        Some(false),
    ]);
    let mut detector = PresenceDetector::new(probe, Duration::from_millis(10));
    let (sink, mut rx) = channel_sink();

    detector.start(sink);
    assert!(detector.is_running());

    assert_eq!(next_event(&mut rx).await, PresenceEvent::Appeared);
    assert_eq!(next_event(&mut rx).await, PresenceEvent::Vanished);

    detector.stop().await;
    assert!(!detector.is_running());
    assert!(rx.try_recv().is_err(), "no duplicate events");
}

#[tokio::test]
async fn failed_sample_does_not_advance_confirmation() {
    // true, <fail>, true: the failure must neither confirm nor re-arm.
    let probe = ScriptedProbe::new(&[Some(true), None, None, Some(true)]);
    let mut detector = PresenceDetector::new(probe, Duration::from_millis(10));
    let (sink, mut rx) = channel_sink();

    detector.start(sink);
    assert_eq!(next_event(&mut rx).await, PresenceEvent::Appeared);
    detector.stop().await;
}

#[tokio::test]
async fn spurious_sample_never_reaches_the_sink() {
    let probe = ScriptedProbe::new(&[Some(false), Some(true), Some(false)]);
    let mut detector = PresenceDetector::new(probe, Duration::from_millis(5));
    let (sink, mut rx) = channel_sink();

    detector.start(sink);
    tokio::time::sleep(Duration::from_millis(150)).await;
    detector.stop().await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let mut detector = PresenceDetector::new(ScriptedProbe::new(&[]), Duration::from_millis(10));
    let (sink, _rx) = channel_sink();

    detector.stop().await;
    detector.start(sink.clone());
    detector.start(sink);
    assert!(detector.is_running());
    detector.stop().await;
    detector.stop().await;
    assert!(!detector.is_running());
}
