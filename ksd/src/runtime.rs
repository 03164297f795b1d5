//! Command scheduler.
//!
//! Turns [`Cmd`] values into concurrent work on a tokio runtime and funnels
//! every completion back through one channel. The control loop drains the
//! channel one [`Delivery`] at a time, so the state machine is never entered
//! concurrently.
//!
//! Tasks run on the blocking pool because they block: process execution,
//! file reads and the single-shot watch all wait on the OS.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ksd_core::{Error, Result};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::command::{Cmd, Msg, Task, Tool};

/// Executes one task to completion, off the control thread.
pub trait TaskRunner: Send + Sync {
    fn run(&self, task: Task) -> Msg;
}

/// What the control loop receives.
#[derive(Debug)]
pub enum Delivery {
    /// Feed to the state machine
    Message(Msg),
    /// Suspend the UI and run this tool in the foreground
    Handover(Tool),
}

type Drive = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct Scheduler {
    runtime: Option<Runtime>,
    handle: Handle,
    runner: Arc<dyn TaskRunner>,
    tx: UnboundedSender<Delivery>,
    rx: UnboundedReceiver<Delivery>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("ksd-worker")
            .enable_all()
            .build()
            .map_err(|e| Error::Task(format!("failed to create runtime: {}", e)))?;
        let handle = runtime.handle().clone();
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            runtime: Some(runtime),
            handle,
            runner,
            tx,
            rx,
        })
    }

    /// Start a command. Returns immediately.
    pub fn dispatch(&self, cmd: Cmd) {
        if cmd.is_none() {
            return;
        }
        tracing::trace!(?cmd, "Dispatching command");
        self.handle
            .spawn(drive(Arc::clone(&self.runner), self.tx.clone(), cmd));
    }

    /// Next delivery if one is already waiting.
    pub fn try_next(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next delivery.
    #[cfg(test)]
    pub fn next_timeout(&mut self, timeout: std::time::Duration) -> Option<Delivery> {
        let rx = &mut self.rx;
        self.handle
            .block_on(async move { tokio::time::timeout(timeout, rx.recv()).await.ok().flatten() })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Pending watches block forever; don't wait for them.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn drive(runner: Arc<dyn TaskRunner>, tx: UnboundedSender<Delivery>, cmd: Cmd) -> Drive {
    Box::pin(async move {
        match cmd {
            Cmd::None => {}
            Cmd::Run(task) => {
                let msg = run_task(runner, task).await;
                let _ = tx.send(Delivery::Message(msg));
            }
            Cmd::Exec(tool) => {
                let _ = tx.send(Delivery::Handover(tool));
            }
            Cmd::Tick(after) => {
                tokio::time::sleep(after).await;
                let _ = tx.send(Delivery::Message(Msg::Tick));
            }
            Cmd::Delay(after, inner) => {
                tokio::time::sleep(after).await;
                drive(runner, tx, *inner).await;
            }
            Cmd::Batch(cmds) => {
                let handles: Vec<_> = cmds
                    .into_iter()
                    .map(|c| tokio::spawn(drive(Arc::clone(&runner), tx.clone(), c)))
                    .collect();
                for handle in handles {
                    let _ = handle.await;
                }
            }
            Cmd::Sequence(cmds) => {
                for c in cmds {
                    drive(Arc::clone(&runner), tx.clone(), c).await;
                }
            }
        }
    })
}

async fn run_task(runner: Arc<dyn TaskRunner>, task: Task) -> Msg {
    let pending = task.clone();
    match tokio::task::spawn_blocking(move || runner.run(task)).await {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!(task = ?pending, error = %e, "Background task died");
            Msg::task_failed(&pending, Error::Task(e.to_string()))
        }
    }
}
