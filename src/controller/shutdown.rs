// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Ordered, best-effort teardown.
//!
//! Each step runs exactly once, in order. A failing step is logged and counted, and
//! the steps after it still run.

use std::error::Error;

use tracing::{error, info, span, Level};

type Step<'a> = Box<dyn FnOnce() -> Result<(), Box<dyn Error>> + 'a>;

/// An ordered list of named shutdown steps.
#[derive(Default)]
pub struct ShutdownSequence<'a> {
    steps: Vec<(&'static str, Step<'a>)>,
}

/// What happened when a sequence ran.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Steps that completed, in order.
    pub completed: Vec<&'static str>,
    /// Steps that failed, in order.
    pub failed: Vec<&'static str>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<'a> ShutdownSequence<'a> {
    pub fn new() -> ShutdownSequence<'a> {
        ShutdownSequence { steps: Vec::new() }
    }

    /// Appends a step.
    pub fn step<F>(mut self, name: &'static str, step: F) -> ShutdownSequence<'a>
    where
        F: FnOnce() -> Result<(), Box<dyn Error>> + 'a,
    {
        self.steps.push((name, Box::new(step)));
        self
    }

    pub fn run(self) -> ShutdownReport {
        let span = span!(Level::INFO, "shutdown");
        let _enter = span.enter();

        let mut report = ShutdownReport::default();
        for (name, step) in self.steps {
            match step() {
                Ok(()) => {
                    info!(step = name, "Shutdown step complete");
                    report.completed.push(name);
                }
                Err(e) => {
                    error!(step = name, err = %e, "Shutdown step failed");
                    report.failed.push(name);
                }
            }
        }

        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "Shutdown finished"
        );
        report
    }
}
