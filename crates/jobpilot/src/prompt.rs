use async_trait::async_trait;
use jobpilot_engine::orchestrator::OperatorPrompt;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type SharedInput = Arc<Mutex<Box<dyn BufRead + Send>>>;

/// Asks the operator on the terminal to finish logging in by hand.
///
/// The line is read on a dedicated thread rather than tokio's blocking pool:
/// runtime shutdown waits for pool tasks, so an interrupted prompt would keep
/// the process alive until Enter.
pub struct StdinPrompt {
    input: SharedInput,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self::with_input(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn with_input(input: impl BufRead + Send + 'static) -> Self {
        Self {
            input: Arc::new(Mutex::new(Box::new(input))),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorPrompt for StdinPrompt {
    async fn await_manual_login(&mut self) -> std::io::Result<()> {
        let mut stdout = std::io::stdout();
        writeln!(
            stdout,
            "\nBrowser will remain open for manual login. Press Enter after logging in..."
        )?;
        stdout.flush()?;

        let (tx, rx) = oneshot::channel();
        let input = Arc::clone(&self.input);
        std::thread::Builder::new()
            .name("jobpilot-prompt".into())
            .spawn(move || {
                let mut line = String::new();
                let read = match input.lock() {
                    Ok(mut reader) => reader.read_line(&mut line).map(|_| ()),
                    Err(_) => Err(std::io::Error::other("prompt input poisoned")),
                };
                // The receiver is gone when the prompt was interrupted.
                let _ = tx.send(read);
            })?;

        rx.await
            .map_err(|_| std::io::Error::other("prompt reader exited"))?
    }
}
