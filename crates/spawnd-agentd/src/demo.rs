//! Demo workload: each task squares a number in its child and reports back over a socket pair.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use spawnd_core::{Produce, Produced, ProducerError};
use spawnd_exec::{MessengerExt, SocketMessenger, Task, TaskBox, TaskError};
use spawnd_model::ExitStatus;

use crate::config::DemoConfig;

#[derive(Debug, Serialize, Deserialize)]
struct Report {
    n: u64,
    square: u64,
    pid: i32,
}

struct Square {
    n: u64,
    work: Duration,
    messenger: SocketMessenger,
}

impl Task for Square {
    fn name(&self) -> &str {
        "square"
    }

    fn init(&mut self) -> Result<(), TaskError> {
        self.messenger.init()?;
        Ok(())
    }

    fn run(&mut self) -> i32 {
        thread::sleep(self.work);
        let report = Report {
            n: self.n,
            square: self.n * self.n,
            pid: nix::unistd::getpid().as_raw(),
        };
        match self.messenger.send_json(&report) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    }

    fn finish(&mut self, status: ExitStatus) -> Result<(), TaskError> {
        let reports: Vec<Report> = self.messenger.receive_json()?;
        self.check(&reports, status)
    }
}

impl Square {
    fn check(&self, reports: &[Report], status: ExitStatus) -> Result<(), TaskError> {
        match reports.first() {
            Some(r) if r.n != self.n || r.square != self.n * self.n => Err(TaskError::Finish(
                format!("child {} reported {}^2 = {} for n = {}", r.pid, r.n, r.square, self.n),
            )),
            Some(r) => {
                info!(n = r.n, square = r.square, child = r.pid, %status, "square computed");
                Ok(())
            }
            None => {
                warn!(n = self.n, %status, "child sent no report");
                Ok(())
            }
        }
    }
}

/// Hands out `batches` batches of [`Square`] tasks, then stays empty.
pub struct Squares {
    cfg: DemoConfig,
    served: u32,
    next: u64,
}

impl Squares {
    pub fn new(cfg: DemoConfig) -> Self {
        Self {
            cfg,
            served: 0,
            next: 1,
        }
    }
}

impl Produce for Squares {
    fn name(&self) -> &str {
        "squares"
    }

    fn produce(&mut self) -> Result<Produced, ProducerError> {
        if self.served >= self.cfg.batches {
            return Ok(Produced::Empty);
        }
        self.served += 1;

        let tasks: Vec<TaskBox> = (0..self.cfg.tasks_per_batch)
            .map(|_| {
                let n = self.next;
                self.next += 1;
                Box::new(Square {
                    n,
                    work: Duration::from_millis(self.cfg.work_ms),
                    messenger: SocketMessenger::new(),
                }) as TaskBox
            })
            .collect();
        Ok(Produced::Many(tasks))
    }
}
