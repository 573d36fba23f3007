//! Input device fed by newline-delimited JSON samples.
//!
//! Lets any external process (a joystick reader, a keyboard mapper, a
//! replay script) drive the sender by piping samples into stdin:
//!
//! ```text
//! {"steering": -0.2, "gas": -1.0, "brake": 1.0, "shift_up": false, "shift_down": false}
//! ```
//!
//! Missing fields take their at-rest value. A background task keeps only
//! the latest sample, so a slow drive loop always sees the freshest input
//! and never a backlog. When the stream ends the input falls back to the
//! at-rest sample.

use core::convert::Infallible;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;

use crate::traits::{InputDevice, InputSample};

/// Latest-sample-wins input over an async reader.
#[derive(Debug)]
pub struct StdinInput {
    latest: watch::Receiver<InputSample>,
}

impl StdinInput {
    /// Read samples from the process's standard input.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn spawn() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Read samples from any async reader.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, latest) = watch::channel(InputSample::default());
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match serde_json::from_str::<InputSample>(&line) {
                        Ok(sample) => {
                            tx.send_replace(sample);
                        }
                        Err(err) => tracing::warn!(error = %err, "ignoring input line"),
                    },
                    Ok(None) => {
                        tracing::info!("input stream closed, holding rest position");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "input stream failed, holding rest position");
                        break;
                    }
                }
            }
            tx.send_replace(InputSample::default());
        });
        Self { latest }
    }
}

impl InputDevice for StdinInput {
    type Error = Infallible;

    fn sample(&mut self) -> Result<InputSample, Infallible> {
        Ok(*self.latest.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reports_rest_until_first_sample() {
        let (_writer, reader) = tokio::io::duplex(256);
        let mut input = StdinInput::from_reader(reader);
        assert_eq!(input.sample().unwrap(), InputSample::default());
    }

    #[tokio::test]
    async fn latest_sample_wins() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let mut input = StdinInput::from_reader(reader);
        let mut changed = input.latest.clone();

        writer
            .write_all(b"{\"gas\": 0.0}\nnot json\n\n{\"gas\": -1.0, \"shift_up\": true}\n")
            .await
            .unwrap();

        loop {
            changed.changed().await.unwrap();
            if changed.borrow().gas == -1.0 {
                break;
            }
        }
        let sample = input.sample().unwrap();
        assert_eq!(sample.gas, -1.0);
        assert!(sample.shift_up);
        assert_eq!(sample.brake, 1.0);
    }

    #[tokio::test]
    async fn end_of_stream_returns_to_rest() {
        let (mut writer, reader) = tokio::io::duplex(256);
        let mut input = StdinInput::from_reader(reader);
        let mut changed = input.latest.clone();

        writer.write_all(b"{\"gas\": -1.0}\n").await.unwrap();
        changed.changed().await.unwrap();
        drop(writer);

        while changed.changed().await.is_ok() {}
        assert_eq!(input.sample().unwrap(), InputSample::default());
    }
}
