// ── upsd client ──
//
// One TCP conversation with a NUT server. Requests are strictly
// request/response; the client holds no state beyond the socket, so
// reconnect policy lives with the caller.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, trace};

use crate::error::Error;
use crate::protocol::{self, parse_err, tokenize};

/// Default upsd TCP port.
pub const DEFAULT_PORT: u16 = 3493;

/// Description upsd reports for devices without a `desc` in `ups.conf`.
const PLACEHOLDER_DESCRIPTION: &str = "Description unavailable";

/// Async client for a single upsd connection.
#[derive(Debug)]
pub struct NutClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
    peer: String,
}

impl NutClient {
    /// Open a TCP connection to `host:port`.
    ///
    /// Both the connect and every later request are bounded by `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, Error> {
        let peer = format!("{host}:{port}");
        debug!(%peer, "connecting to upsd");

        let stream = deadline(timeout, async {
            Ok::<_, Error>(TcpStream::connect(&peer).await?)
        })
        .await?;
        stream.set_nodelay(true)?;
        let (read_half, writer) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            timeout,
            peer,
        })
    }

    /// The `host:port` this client is talking to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send `USERNAME` and `PASSWORD`. Both must be acknowledged with `OK`.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &SecretString,
    ) -> Result<(), Error> {
        self.simple(&["USERNAME", username]).await?;
        self.simple(&["PASSWORD", password.expose_secret()]).await?;
        debug!(peer = %self.peer, %username, "authenticated with upsd");
        Ok(())
    }

    /// `LIST UPS`: device name to optional human-friendly description.
    pub async fn list_ups(&mut self) -> Result<BTreeMap<String, Option<String>>, Error> {
        let rows = self.list(&["UPS"]).await?;

        let mut devices = BTreeMap::new();
        for row in rows {
            match row.as_slice() {
                [kind, name, desc] if kind == "UPS" => {
                    let desc = (!desc.is_empty() && desc != PLACEHOLDER_DESCRIPTION)
                        .then(|| desc.clone());
                    devices.insert(name.clone(), desc);
                }
                [kind, name] if kind == "UPS" => {
                    devices.insert(name.clone(), None);
                }
                _ => {
                    return Err(Error::UnexpectedResponse {
                        expected: "UPS <name> \"<description>\"".into(),
                        got: row.join(" "),
                    });
                }
            }
        }

        debug!(peer = %self.peer, count = devices.len(), "listed UPS devices");
        Ok(devices)
    }

    /// `LIST VAR <ups>`: every variable upsd exposes for the device.
    pub async fn list_vars(&mut self, ups: &str) -> Result<HashMap<String, String>, Error> {
        let rows = self.list(&["VAR", ups]).await?;

        let mut vars = HashMap::with_capacity(rows.len());
        for row in rows {
            match row.as_slice() {
                [kind, name, var, value] if kind == "VAR" && name == ups => {
                    vars.insert(var.clone(), value.clone());
                }
                _ => {
                    return Err(Error::UnexpectedResponse {
                        expected: format!("VAR {ups} <name> \"<value>\""),
                        got: row.join(" "),
                    });
                }
            }
        }

        trace!(peer = %self.peer, %ups, count = vars.len(), "listed UPS variables");
        Ok(vars)
    }

    /// Politely end the session. upsd answers `OK Goodbye` and closes.
    pub async fn logout(&mut self) -> Result<(), Error> {
        self.simple(&["LOGOUT"]).await
    }

    // ── Wire helpers ─────────────────────────────────────────────────

    /// Send a command that is answered by a single `OK ...` line.
    async fn simple(&mut self, words: &[&str]) -> Result<(), Error> {
        self.send(words).await?;
        let reply = self.read_words().await?;
        match reply.first().map(String::as_str) {
            Some("OK") => Ok(()),
            _ => Err(parse_err(&reply).unwrap_or_else(|| Error::UnexpectedResponse {
                expected: "OK".into(),
                got: reply.join(" "),
            })),
        }
    }

    /// Run a `LIST <query>` command and return the rows between the
    /// `BEGIN LIST` / `END LIST` markers.
    async fn list(&mut self, query: &[&str]) -> Result<Vec<Vec<String>>, Error> {
        let mut words = Vec::with_capacity(query.len() + 1);
        words.push("LIST");
        words.extend_from_slice(query);
        self.send(&words).await?;

        let begin = self.read_words().await?;
        if let Some(err) = parse_err(&begin) {
            return Err(err);
        }
        if !is_marker(&begin, "BEGIN", query) {
            return Err(Error::UnexpectedResponse {
                expected: format!("BEGIN LIST {}", query.join(" ")),
                got: begin.join(" "),
            });
        }

        let mut rows = Vec::new();
        loop {
            let line = self.read_words().await?;
            if is_marker(&line, "END", query) {
                return Ok(rows);
            }
            if let Some(err) = parse_err(&line) {
                return Err(err);
            }
            rows.push(line);
        }
    }

    async fn send(&mut self, words: &[&str]) -> Result<(), Error> {
        let mut line = protocol::command(words);
        if words.first() != Some(&"PASSWORD") {
            trace!(peer = %self.peer, %line, "upsd <-");
        }
        line.push('\n');

        let writer = &mut self.writer;
        deadline(self.timeout, async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            Ok::<(), Error>(())
        })
        .await
    }

    async fn read_words(&mut self) -> Result<Vec<String>, Error> {
        let reader = &mut self.reader;
        let line = deadline(self.timeout, async {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
            Ok::<String, Error>(line)
        })
        .await?;

        trace!(peer = %self.peer, line = line.trim_end(), "upsd ->");
        Ok(tokenize(&line))
    }
}

/// `BEGIN LIST UPS` / `END LIST VAR ups1` marker check.
fn is_marker(words: &[String], edge: &str, query: &[&str]) -> bool {
    words.len() == query.len() + 2
        && words[0] == edge
        && words[1] == "LIST"
        && words[2..].iter().zip(query).all(|(w, q)| w == q)
}

/// Bound a fallible future by `timeout`.
async fn deadline<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: timeout.as_secs(),
        })?
}
