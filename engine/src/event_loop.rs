//! Consumer side of the event channel.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::model::{PlanSet, SortEvent};
use crate::progress::SortObserver;

/// Outcome counts gathered while draining events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) moved: usize,
    pub(crate) skipped: usize,
    pub(crate) failed: usize,
    pub(crate) stalls: usize,
}

/// Drains events until every scheduled task has reported `DirectoryDone`
/// and nothing is left in the channel, dispatching each one to the observer.
pub(crate) struct EventLoop<'o> {
    receiver: Receiver<SortEvent>,
    observer: Option<&'o dyn SortObserver>,
    stall_timeout: Duration,
    pending_tasks: usize,
    tally: Tally,
}

impl<'o> EventLoop<'o> {
    pub(crate) fn new(
        receiver: Receiver<SortEvent>,
        observer: Option<&'o dyn SortObserver>,
        stall_timeout: Duration,
        pending_tasks: usize,
    ) -> Self {
        EventLoop {
            receiver,
            observer,
            stall_timeout,
            pending_tasks,
            tally: Tally::default(),
        }
    }

    pub(crate) fn run(mut self, plans: &PlanSet) -> Tally {
        while self.pending_tasks > 0 {
            match self.receiver.recv_timeout(self.stall_timeout) {
                Ok(event) => self.dispatch(event),
                Err(RecvTimeoutError::Timeout) => {
                    let progress = plans.progress();
                    self.tally.stalls += 1;
                    tracing::warn!(
                        pending = self.pending_tasks,
                        progress,
                        "no event received in the last {:?}",
                        self.stall_timeout
                    );
                    if let Some(observer) = self.observer {
                        observer.on_stall(progress);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!(pending = self.pending_tasks, "all producers gone");
                    break;
                }
            }
        }

        // Events queued before the last DirectoryDone have already been
        // received, but errors reported outside any task may still wait here.
        while let Ok(event) = self.receiver.try_recv() {
            self.dispatch(event);
        }

        if let Some(observer) = self.observer {
            observer.on_finished();
        }

        self.tally
    }

    fn dispatch(&mut self, event: SortEvent) {
        if let Some(path) = event.path() {
            tracing::trace!(path = %path.display(), progress = event.progress(), "event received");
        }

        match event {
            SortEvent::Moved { from, to, progress } => {
                self.tally.moved += 1;
                if let Some(observer) = self.observer {
                    observer.on_moved(&from, &to, progress);
                }
            }
            SortEvent::Skipped { path, progress } => {
                self.tally.skipped += 1;
                if let Some(observer) = self.observer {
                    observer.on_skipped(&path, progress);
                }
            }
            SortEvent::Failed { error, progress } => {
                self.tally.failed += 1;
                if let Some(observer) = self.observer {
                    observer.on_error(&error, progress);
                }
            }
            SortEvent::DirectoryDone {
                directory,
                progress,
            } => {
                self.pending_tasks = self.pending_tasks.saturating_sub(1);
                if let Some(observer) = self.observer {
                    observer.on_directory_done(&directory, progress);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SortError;
    use crate::model::DirectoryPlan;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SortObserver for Recorder {
        fn on_moved(&self, from: &Path, to: &Path, progress: f64) {
            self.push(format!("moved({}, {}, {progress})", from.display(), to.display()));
        }

        fn on_skipped(&self, path: &Path, progress: f64) {
            self.push(format!("skipped({}, {progress})", path.display()));
        }

        fn on_error(&self, _error: &SortError, progress: f64) {
            self.push(format!("error({progress})"));
        }

        fn on_stall(&self, progress: f64) {
            self.push(format!("stall({progress})"));
        }

        fn on_finished(&self) {
            self.push("finished".to_string());
        }
    }

    #[test]
    fn test_dispatches_in_channel_order_and_finishes_once() {
        let plans = PlanSet::new(vec![DirectoryPlan::new("a", 2)]);
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(SortEvent::Moved {
            from: PathBuf::from("a/1.jpg"),
            to: PathBuf::from("out/1.jpg"),
            progress: 0.5,
        })
        .unwrap();
        tx.send(SortEvent::Skipped {
            path: PathBuf::from("a/2.jpg"),
            progress: 1.0,
        })
        .unwrap();
        tx.send(SortEvent::DirectoryDone {
            directory: PathBuf::from("a"),
            progress: 1.0,
        })
        .unwrap();

        let recorder = Recorder::default();
        let tally = EventLoop::new(rx, Some(&recorder), Duration::from_secs(5), 1).run(&plans);

        assert_eq!(
            recorder.get_calls(),
            vec![
                "moved(a/1.jpg, out/1.jpg, 0.5)".to_string(),
                "skipped(a/2.jpg, 1)".to_string(),
                "finished".to_string(),
            ]
        );
        assert_eq!(tally.moved, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.failed, 0);
    }

    #[test]
    fn test_stall_is_reported_but_does_not_end_the_loop() {
        let plans = PlanSet::new(vec![DirectoryPlan::new("a", 0)]);
        let (tx, rx) = crossbeam_channel::unbounded();

        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            tx.send(SortEvent::DirectoryDone {
                directory: PathBuf::from("a"),
                progress: 1.0,
            })
            .unwrap();
        });

        let recorder = Recorder::default();
        let tally = EventLoop::new(rx, Some(&recorder), Duration::from_millis(20), 1).run(&plans);
        producer.join().unwrap();

        let calls = recorder.get_calls();
        assert!(tally.stalls >= 1);
        assert!(calls.iter().any(|c| c.starts_with("stall")));
        assert_eq!(calls.last().map(String::as_str), Some("finished"));
        assert_eq!(tally.failed, 0, "a stall is not an error");
    }

    #[test]
    fn test_drains_errors_left_behind() {
        let plans = PlanSet::default();
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(SortEvent::Failed {
            error: SortError::TaskPanicked {
                path: PathBuf::from("x"),
            },
            progress: 1.0,
        })
        .unwrap();

        let recorder = Recorder::default();
        let tally = EventLoop::new(rx, Some(&recorder), Duration::from_secs(5), 0).run(&plans);

        assert_eq!(tally.failed, 1);
        assert_eq!(
            recorder.get_calls(),
            vec!["error(1)".to_string(), "finished".to_string()]
        );
    }

    #[test]
    fn test_disconnected_channel_still_finishes() {
        let plans = PlanSet::new(vec![DirectoryPlan::new("a", 1)]);
        let (tx, rx) = crossbeam_channel::unbounded::<SortEvent>();
        drop(tx);

        let recorder = Recorder::default();
        EventLoop::new(rx, Some(&recorder), Duration::from_secs(5), 1).run(&plans);

        assert_eq!(recorder.get_calls(), vec!["finished".to_string()]);
    }
}
