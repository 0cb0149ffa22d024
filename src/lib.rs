pub mod chat;
pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::{Cli, Config};
pub use error::SessionError;
pub use session::{MessageSink, SessionController, SessionOptions};

use crate::chat::{ChatEnd, TerminalSink};
use crate::peer::{Role, Transport, WebRtcTransport};
use std::sync::Arc;
use tracing::info;

/// Run one peer end to end: exchange descriptions with the operator, wait for
/// the channel, then chat until input or the channel ends.
pub async fn run(config: Config) -> Result<(), SessionError> {
    let mut lines = chat::spawn_stdin_reader();
    let (transport, events) = WebRtcTransport::new(&config.peer).await?;
    let mut controller = SessionController::new(
        config.role,
        Arc::new(transport),
        events,
        config.session.clone(),
        Box::new(TerminalSink::new()),
    );

    let result = drive(&mut controller, &config, &mut lines).await;
    if let Err(err) = controller.close().await {
        info!(error = %err, "closing peer connection");
    }
    result
}

async fn drive<T: Transport>(
    controller: &mut SessionController<T>,
    config: &Config,
    lines: &mut tokio::sync::mpsc::Receiver<String>,
) -> Result<(), SessionError> {
    match config.role {
        Role::Initiator => {
            controller.start_as_initiator().await?;
            let offer = controller.wait_for_local_description().await?;
            signaling::present_local_description(
                Role::Initiator,
                &signaling::encode_description(&offer, config.format)?,
            );
            controller.local_description_delivered()?;
            let answer = signaling::read_pasted(Role::Initiator, lines).await?;
            controller.complete_with_answer(&answer).await?;
        }
        Role::Responder => {
            let offer = signaling::read_pasted(Role::Responder, lines).await?;
            controller.start_as_responder(&offer).await?;
            let answer = controller.wait_for_local_description().await?;
            signaling::present_local_description(
                Role::Responder,
                &signaling::encode_description(&answer, config.format)?,
            );
            controller.local_description_delivered()?;
        }
    }

    controller.wait_until_connected().await?;
    println!("\nConnected!");
    if let Some(code) = controller.verification_code() {
        println!("Verification code: {code} (should match your peer's)");
    }

    match chat::run(controller, lines, chat::prompt).await? {
        ChatEnd::InputClosed => info!("input closed"),
        ChatEnd::ChannelClosed(label) => println!("\nPeer closed channel {label}."),
    }
    Ok(())
}
