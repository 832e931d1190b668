//! Session Supervisor
//!
//! Runs one [`TurnController`] on its own task for the lifetime of a screen.
//! Inputs arrive over a channel; the commands the controller returns are
//! executed here (generation, illustration and timers as child tasks whose
//! results are fed back as inputs). Disposing, or dropping every handle,
//! tears the session down and aborts whatever is still in flight.

use crate::{
    Command,
    content::ContentGenerator,
    controller::TurnController,
    events::{SessionInput, SessionReport},
    images::{IllustrationKind, ImageProvider, illustrate_or_placeholder},
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

enum Message {
    Input(SessionInput),
    Dispose,
}

/// The caller's side of a running session.
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queues an input. Returns false once the session has shut down.
    pub fn send(&self, input: SessionInput) -> bool {
        self.tx.send(Message::Input(input)).is_ok()
    }

    /// Asks the session to tear down. Idempotent.
    pub fn dispose(&self) {
        let _ = self.tx.send(Message::Dispose);
    }

    /// Waits for the session task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = ?e, "Session task ended abnormally");
        }
    }
}

pub struct SessionSupervisor {
    controller: TurnController,
    generator: Arc<dyn ContentGenerator>,
    images: Arc<dyn ImageProvider>,
    reports: mpsc::UnboundedSender<SessionReport>,
}

impl SessionSupervisor {
    /// Spawns the session task. Reports are sent to `reports` in the order
    /// the controller produced them; the channel closes when the session ends.
    pub fn spawn(
        controller: TurnController,
        generator: Arc<dyn ContentGenerator>,
        images: Arc<dyn ImageProvider>,
        reports: mpsc::UnboundedSender<SessionReport>,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            controller,
            generator,
            images,
            reports,
        };
        let task = tokio::spawn(supervisor.run(rx));
        SessionHandle { tx, task }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        let mut tasks: JoinSet<SessionInput> = JoinSet::new();

        loop {
            let commands = tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Input(input)) => self.controller.handle(input),
                    Some(Message::Dispose) | None => self.controller.dispose(),
                },
                Some(joined) = tasks.join_next() => match joined {
                    Ok(input) => self.controller.handle(input),
                    Err(e) => {
                        if !e.is_cancelled() {
                            warn!(error = ?e, "Session child task failed");
                        }
                        continue;
                    }
                },
            };
            self.execute(commands, &mut tasks);

            if self.controller.is_disposed() {
                break;
            }
        }

        tasks.abort_all();
        info!(aborted = tasks.len(), "Session supervisor finished");
    }

    fn execute(&self, commands: Vec<Command>, tasks: &mut JoinSet<SessionInput>) {
        for command in commands {
            match command {
                Command::Generate { token, request } => {
                    let generator = self.generator.clone();
                    tasks.spawn(async move {
                        let outcome = request.run(generator.as_ref()).await;
                        SessionInput::Generated { token, outcome }
                    });
                }
                Command::Illustrate { token, target_form } => {
                    let images = self.images.clone();
                    tasks.spawn(async move {
                        let illustration = illustrate_or_placeholder(
                            images.as_ref(),
                            &target_form,
                            IllustrationKind::Flashcard,
                        )
                        .await;
                        SessionInput::Illustrated {
                            token,
                            target_form,
                            illustration,
                        }
                    });
                }
                Command::Schedule {
                    token,
                    delay,
                    timer,
                } => {
                    tasks.spawn(async move {
                        tokio::time::sleep(delay).await;
                        SessionInput::TimerFired { token, timer }
                    });
                }
                Command::Report(report) => {
                    if self.reports.send(report).is_err() {
                        debug!("Report receiver dropped");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SessionConfig,
        content::MockContentGenerator,
        error::RecognitionFailure,
        events::UserAction,
        images::PlaceholderImages,
        vocab::{VocabItem, Word},
    };

    fn spawn_text_only() -> (SessionHandle, mpsc::UnboundedReceiver<SessionReport>) {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let controller = TurnController::new(SessionConfig::default(), None, None);
        let handle = SessionSupervisor::spawn(
            controller,
            Arc::new(MockContentGenerator),
            Arc::new(PlaceholderImages),
            reports_tx,
        );
        (handle, reports_rx)
    }

    #[tokio::test]
    async fn test_text_only_session_degrades_gracefully() {
        let (handle, mut reports) = spawn_text_only();
        let item = VocabItem::new(
            &Word {
                thai: "สุนัข".to_string(),
                english: "dog".to_string(),
            },
            "img:dog",
        );
        assert!(handle.send(SessionInput::StartDrill {
            items: vec![item.clone()],
            pool: Vec::new(),
        }));
        assert!(handle.send(SessionInput::Action(UserAction::Listen)));

        assert!(matches!(
            reports.recv().await,
            Some(SessionReport::DrillItem { item: shown, .. }) if shown == item
        ));
        assert_eq!(
            reports.recv().await,
            Some(SessionReport::RecognitionFailed {
                failure: RecognitionFailure::Unsupported
            })
        );
        assert!(matches!(
            reports.recv().await,
            Some(SessionReport::Notice { .. })
        ));

        handle.dispose();
        assert_eq!(reports.recv().await, Some(SessionReport::Disposed));
        handle.join().await;
        assert_eq!(reports.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropping_the_handle_disposes() {
        let (handle, mut reports) = spawn_text_only();
        drop(handle);
        assert_eq!(reports.recv().await, Some(SessionReport::Disposed));
        assert_eq!(reports.recv().await, None);
    }
}
