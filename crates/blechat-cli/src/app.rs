//! Interactive console chat loop
//!
//! One `select!` loop merges session events, raw link events, and console
//! input, so every session operation and store write happens in a single
//! serialized context.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use blechat_core::{
    ChatError, ChatSession, LinkEvent, MessageRecord, MessageStore, PeerId, SessionConfig,
    SessionEvent,
};
use blechat_ble::{BleConfig, BleTransport};

use crate::cli::Cli;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Outcome
// ----------------------------------------------------------------------------

/// Why the interactive loop ended; decides the process exit code.
pub enum Outcome {
    /// The user asked to quit.
    Quit,
    /// The link to the peer was lost mid-session.
    ConnectionLost,
}

enum LineAction {
    Continue,
    Quit,
}

// ----------------------------------------------------------------------------
// Chat Application
// ----------------------------------------------------------------------------

pub struct ChatApp {
    session: ChatSession<BleTransport>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    store: Arc<MessageStore>,
    peer: PeerId,
}

impl ChatApp {
    /// Assemble the transport, session, and event streams.
    pub fn new(cli: &Cli, store: Arc<MessageStore>, nickname: String) -> Result<Self> {
        let peer = PeerId::new(&cli.peer)?;
        let config = SessionConfig::new()
            .with_connect_timeout(Duration::from_secs(cli.connect_timeout));
        let transport = BleTransport::new(BleConfig::default());

        let (mut session, events) =
            ChatSession::new(transport, Arc::clone(&store), nickname, config);
        let link_events = session.take_link_events().ok_or(CliError::LinkStream)?;

        Ok(Self {
            session,
            events,
            link_events,
            store,
            peer,
        })
    }

    /// Connect, replay history, and run the prompt loop until quit or loss.
    pub async fn run(mut self) -> Result<Outcome> {
        self.session.connect(self.peer.clone()).await?;

        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        prompt()?;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(SessionEvent::ConnectionLost { reason }) => {
                        println!("\nConnection lost: {reason}");
                        return Ok(Outcome::ConnectionLost);
                    }
                    Some(event) => self.render_event(event)?,
                    None => return Ok(Outcome::Quit),
                },
                link = self.link_events.recv() => match link {
                    Some(LinkEvent::Inbound(bytes)) => {
                        self.handle_inbound(&bytes);
                    }
                    Some(LinkEvent::ConnectionLost { reason }) => {
                        self.session.on_disconnected(reason);
                    }
                    None => {
                        self.session.on_disconnected("link closed");
                    }
                },
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if matches!(self.handle_line(&line).await?, LineAction::Quit) {
                            self.session.disconnect().await?;
                            println!("Bye.");
                            return Ok(Outcome::Quit);
                        }
                        prompt()?;
                    }
                    None => {
                        // stdin closed; treat like quit.
                        self.session.disconnect().await?;
                        return Ok(Outcome::Quit);
                    }
                },
            }
        }
    }

    fn handle_inbound(&mut self, bytes: &[u8]) {
        // Storage trouble on the inbound path is a status message, not a
        // session teardown.
        if let Err(err) = self.session.on_packet_received(bytes) {
            warn!(error = %err, "failed to handle inbound frame");
            println!("\n[storage error: {err}]");
        }
    }

    async fn handle_line(&mut self, line: &str) -> Result<LineAction> {
        let input = line.trim();
        if input.is_empty() {
            return Ok(LineAction::Continue);
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            return Ok(LineAction::Quit);
        }
        if input == "/clear" {
            self.store.clear(&self.peer)?;
            println!("History cleared.");
            return Ok(LineAction::Continue);
        }

        match self.session.send_text(input).await {
            Ok(_) => {
                // Clear any stale typing indicator on the peer's side. A
                // send failure here surfaces through the event channel.
                if let Err(err) = self.session.set_typing(false).await {
                    warn!(error = %err, "failed to clear typing status");
                }
            }
            Err(ChatError::Transport(err)) => {
                // Connection loss is reported via the ConnectionLost event;
                // just log the send error itself.
                warn!(error = %err, "send failed");
            }
            Err(ChatError::InvalidState { .. }) => {
                println!("Not connected.");
            }
            Err(err) => {
                println!("[error: {err}]");
            }
        }
        Ok(LineAction::Continue)
    }

    fn render_event(&self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Connected { peer } => {
                println!("Connected to {peer}");
            }
            SessionEvent::HistoryReplayed(records) => {
                if !records.is_empty() {
                    println!("--- Chat History ---");
                    for record in &records {
                        print_record(record);
                    }
                    println!("--------------------");
                }
            }
            SessionEvent::MessageSent(record) | SessionEvent::MessageReceived(record) => {
                print_record(&record);
            }
            SessionEvent::PeerTyping(active) => {
                if active {
                    println!("{} is typing...", self.peer);
                }
            }
            SessionEvent::Closed => {
                println!("Session closed.");
            }
            // Handled in the main loop.
            SessionEvent::ConnectionLost { .. } => {}
        }
        Ok(())
    }
}

fn print_record(record: &MessageRecord) {
    println!(
        "{} ({}): {}",
        record.sender,
        record.timestamp.to_clock(),
        record.content
    );
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}
