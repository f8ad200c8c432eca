//! Logging worker behaviour seen from its callers.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use servatrice::lifecycle::CrashBridge;
use servatrice::observability::{LoggingWorker, MemorySink};

const POLL: Duration = Duration::from_millis(5);

fn start_memory(sink: &MemorySink) -> LoggingWorker {
    let sink = sink.clone();
    LoggingWorker::start(move || Ok(sink), Arc::new(CrashBridge::new()), POLL).unwrap()
}

fn texts(sink: &MemorySink) -> Vec<String> {
    sink.lines()
        .into_iter()
        .map(|line| line.split_once("] ").unwrap().1.to_string())
        .collect()
}

#[test]
fn concurrent_callers_are_written_in_enqueue_order() {
    let sink = MemorySink::new();
    let worker = start_memory(&sink);
    let sequence = Arc::new(Mutex::new(0u64));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let handle = worker.handle();
            let sequence = sequence.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    let mut next = sequence.lock();
                    handle.log(next.to_string()).unwrap();
                    *next += 1;
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    worker.shutdown().unwrap();

    let written: Vec<u64> = texts(&sink).iter().map(|text| text.parse().unwrap()).collect();
    let expected: Vec<u64> = (0..1000).collect();
    assert_eq!(written, expected);
}

#[test]
fn message_sent_right_after_start_is_kept() {
    let sink = MemorySink::new();
    let worker = start_memory(&sink);
    worker.log("first").unwrap();
    worker.shutdown().unwrap();

    assert_eq!(texts(&sink), vec!["first".to_string()]);
}

#[test]
fn reopen_switches_to_fresh_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server.log");
    let rotated = dir.path().join("server.log.1");

    let worker = LoggingWorker::start_file(path.clone(), Arc::new(CrashBridge::new()), POLL).unwrap();
    assert_eq!(worker.sink_name(), path.display().to_string());

    worker.log("before rotation").unwrap();
    // The open descriptor follows the rename; only the reopen switches files.
    std::fs::rename(&path, &rotated).unwrap();
    worker.reopen().unwrap();
    worker.log("after rotation").unwrap();
    worker.shutdown().unwrap();

    let old = std::fs::read_to_string(&rotated).unwrap();
    let new = std::fs::read_to_string(&path).unwrap();
    assert!(old.contains("before rotation"));
    assert!(!old.contains("after rotation"));
    assert!(new.contains("Log file reopened"));
    assert!(new.contains("after rotation"));
}

#[test]
fn dropping_the_worker_drains_it() {
    let sink = MemorySink::new();
    {
        let worker = start_memory(&sink);
        for i in 0..50 {
            worker.log(format!("queued {i}")).unwrap();
        }
    }
    assert_eq!(sink.lines().len(), 50);
}
