use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use tokio::sync::oneshot;

/// The logged-in user's screen and keyboard.
///
/// Shared by the foreground session and the poller; the poller only prints.
#[async_trait]
pub trait Terminal: Send + Sync {
    /// Show `prompt` and read one line. `Ok(None)` on end of input.
    async fn read_line(&self, prompt: &str) -> io::Result<Option<String>>;

    /// Read a secret without echo.
    async fn read_password(&self, prompt: &str) -> io::Result<String>;

    /// Print `text` followed by a newline.
    fn print(&self, text: &str);

    /// Print `text` without a newline and flush.
    fn write(&self, text: &str);

    fn clear(&self);
}

/// Run a blocking terminal read on its own detached thread.
///
/// A read abandoned on interrupt keeps its thread parked in the syscall but
/// does not hold up runtime shutdown, which `spawn_blocking` would.
pub async fn detached_read<T, F>(read: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("terminal-input".to_string())
        .spawn(move || {
            let _ = tx.send(read());
        })?;
    rx.await
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "terminal input thread exited"))?
}

/// Process stdin/stdout.
#[derive(Debug, Clone, Default)]
pub struct StdTerminal;

#[async_trait]
impl Terminal for StdTerminal {
    async fn read_line(&self, prompt: &str) -> io::Result<Option<String>> {
        self.write(prompt);
        detached_read(|| {
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line)? {
                0 => Ok(None),
                _ => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
            }
        })
        .await
    }

    async fn read_password(&self, prompt: &str) -> io::Result<String> {
        let prompt = prompt.trim_end().trim_end_matches(':').to_string();
        detached_read(move || {
            dialoguer::Password::new()
                .with_prompt(prompt)
                .allow_empty_password(true)
                .interact()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        })
        .await
    }

    fn print(&self, text: &str) {
        println!("{}", text);
    }

    fn write(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn clear(&self) {
        // ANSI: clear screen, cursor home
        self.write("\x1b[2J\x1b[H");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn detached_read_returns_value() {
        let line = detached_read(|| Ok("alice".to_string())).await.unwrap();
        assert_eq!(line, "alice");

        let err = detached_read::<(), _>(|| Err(io::Error::new(io::ErrorKind::Other, "eof")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "eof");
    }

    #[test]
    fn pending_read_does_not_block_runtime_shutdown() {
        // Never sent to: the read stays blocked like stdin with no input.
        let (_keep_open, never) = mpsc::channel::<()>();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        let abandoned = runtime.block_on(async move {
            tokio::time::timeout(
                Duration::from_millis(50),
                detached_read(move || {
                    let _ = never.recv();
                    Ok(())
                }),
            )
            .await
        });
        assert!(abandoned.is_err());

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
