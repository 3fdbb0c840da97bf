//! Integration test common infrastructure.
//!
//! Provides a scripted TCPR server: it accepts a single connection and
//! plays a fixed sequence of expected reads and canned writes, failing the
//! test if the client deviates from the script.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Password the scripted server expects in tests.
#[allow(dead_code)]
pub const PASSWORD: &str = "asdf";

/// One step of the server script.
enum Step {
    /// Read one line and require it to equal the payload.
    ExpectLine(String),
    /// Write one line, delimiter appended.
    SendLine(String),
    /// Wait before continuing with the script.
    Pause(Duration),
    /// Drop the connection.
    Close,
    /// Keep the connection open without reading or writing, forever.
    Hold,
}

/// A single-connection TCPR server driven by a script.
///
/// The listener is bound on construction so tests can read the address
/// before the script starts, then the script runs on a spawned task.
/// Awaiting the handle returned by [`spawn`](ScriptedServer::spawn)
/// verifies that every expectation in the script was met.
pub struct ScriptedServer {
    listener: TcpListener,
    addr: SocketAddr,
    steps: Vec<Step>,
}

impl ScriptedServer {
    /// Binds on an ephemeral localhost port with an empty script.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            steps: Vec::new(),
        })
    }

    /// Address clients should connect to.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// Script step: require the next line from the client to be `line`.
    pub fn expect_line(mut self, line: &str) -> Self {
        self.steps.push(Step::ExpectLine(line.to_string()));
        self
    }

    /// Script step: send `line` to the client.
    pub fn send_line(mut self, line: &str) -> Self {
        self.steps.push(Step::SendLine(line.to_string()));
        self
    }

    /// Script step: sleep before continuing.
    #[allow(dead_code)]
    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    /// Script step: drop the connection.
    #[allow(dead_code)]
    pub fn close(mut self) -> Self {
        self.steps.push(Step::Close);
        self
    }

    /// Script step: leave the connection open and idle forever. The
    /// spawned task never finishes after this step.
    #[allow(dead_code)]
    pub fn hold(mut self) -> Self {
        self.steps.push(Step::Hold);
        self
    }

    /// Convenience: the read-password-and-greet sequence every successful
    /// handshake goes through.
    #[allow(dead_code)]
    pub fn accept_auth(self, password: &str) -> Self {
        self.expect_line(password)
            .expect_line("tcpr('hello')")
            .send_line("hello")
    }

    /// Accepts one connection and plays the script. The returned handle
    /// resolves with `Ok(())` once the whole script ran.
    pub fn spawn(self) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            let (stream, _) = self.listener.accept().await.context("accept")?;
            let mut stream = BufReader::new(stream);
            for step in self.steps {
                match step {
                    Step::ExpectLine(expected) => {
                        let mut line = String::new();
                        let n = stream
                            .read_line(&mut line)
                            .await
                            .with_context(|| format!("reading, expected `{expected}`"))?;
                        if n == 0 {
                            bail!("client closed the connection, expected `{expected}`");
                        }
                        let got = line.trim_end_matches(&['\r', '\n'][..]);
                        if got != expected {
                            bail!("expected `{expected}`, read `{got}`");
                        }
                    }
                    Step::SendLine(line) => {
                        stream.write_all(line.as_bytes()).await.context("write")?;
                        stream.write_all(b"\n").await.context("write delimiter")?;
                    }
                    Step::Pause(duration) => tokio::time::sleep(duration).await,
                    Step::Close => return Ok(()),
                    Step::Hold => std::future::pending::<()>().await,
                }
            }
            Ok(())
        })
    }
}
