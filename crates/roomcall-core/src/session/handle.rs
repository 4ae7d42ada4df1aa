//! Cloneable front-end for a running [`SessionOrchestrator`].

use roomcall_common::CallError;
use tokio::sync::mpsc;
use tracing::info;

use crate::signaling::Theme;

use super::orchestrator::SessionOrchestrator;
use super::types::CallCommand;

/// Posts [`CallCommand`]s to the orchestrator's run loop.
#[derive(Clone)]
pub struct CallHandle {
    command_tx: mpsc::Sender<CallCommand>,
}

impl CallHandle {
    /// Create a handle and the receiver the run loop consumes.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<CallCommand>) {
        let (command_tx, command_rx) = mpsc::channel(buffer.max(1));
        (Self { command_tx }, command_rx)
    }

    pub async fn prepare_media(&self) -> Result<(), CallError> {
        self.send(CallCommand::PrepareMedia).await
    }

    pub async fn join(&self, display_name: impl Into<String>) -> Result<(), CallError> {
        self.send(CallCommand::Join {
            display_name: display_name.into(),
        })
        .await
    }

    pub async fn leave(&self) -> Result<(), CallError> {
        self.send(CallCommand::Leave).await
    }

    pub async fn toggle_mute(&self) -> Result<(), CallError> {
        self.send(CallCommand::ToggleMute).await
    }

    pub async fn toggle_video(&self) -> Result<(), CallError> {
        self.send(CallCommand::ToggleVideo).await
    }

    pub async fn toggle_screen_share(&self) -> Result<(), CallError> {
        self.send(CallCommand::ToggleScreenShare).await
    }

    pub async fn refresh_media(&self) -> Result<(), CallError> {
        self.send(CallCommand::RefreshMedia).await
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), CallError> {
        self.send(CallCommand::SendChat(text.into())).await
    }

    pub async fn change_theme(&self, theme: Theme) -> Result<(), CallError> {
        self.send(CallCommand::ChangeTheme(theme)).await
    }

    pub async fn send_reaction(&self, emoji: impl Into<String>) -> Result<(), CallError> {
        self.send(CallCommand::SendReaction(emoji.into())).await
    }

    /// Whether the run loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Post any command. Fails once the run loop has stopped.
    pub async fn send(&self, command: CallCommand) -> Result<(), CallError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| CallError::InvalidState("call session has stopped".into()))
    }
}

impl SessionOrchestrator {
    /// Move the orchestrator onto its own task and return a handle to it.
    pub fn spawn(self, buffer: usize) -> (CallHandle, tokio::task::JoinHandle<()>) {
        let (handle, commands) = CallHandle::channel(buffer);
        let task = tokio::spawn(self.run(commands));
        info!("Call session spawned");
        (handle, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commands_arrive_in_order() {
        let (handle, mut rx) = CallHandle::channel(8);
        handle.toggle_mute().await.unwrap();
        handle.send_chat("hi").await.unwrap();
        handle.change_theme(Theme::Light).await.unwrap();

        assert_eq!(rx.recv().await, Some(CallCommand::ToggleMute));
        assert_eq!(rx.recv().await, Some(CallCommand::SendChat("hi".into())));
        assert_eq!(rx.recv().await, Some(CallCommand::ChangeTheme(Theme::Light)));
    }

    #[tokio::test]
    async fn closed_loop_reports_invalid_state() {
        let (handle, rx) = CallHandle::channel(1);
        drop(rx);
        assert!(handle.is_closed());
        let err = handle.leave().await.unwrap_err();
        assert!(matches!(err, CallError::InvalidState(_)));
    }
}
