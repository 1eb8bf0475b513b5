use crate::transport::EngineTransport;
use crate::uci::{parse_uci_message, UciError, UciMessage};
use crate::{EngineError, EngineEvent};
use async_trait::async_trait;
use chess::Position;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

/// Upper bound for the engine `Threads` option.
pub const MAX_ENGINE_THREADS: u32 = 16;

pub struct StockfishEngine {
    process: Child,
    stdin: mpsc::Sender<String>,
    message_rx: mpsc::Receiver<UciMessage>,
    ready_timeout: Duration,
    fingerprint: String,
    terminated: bool,
}

/// Configuration applied once during the handshake.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit executable; searched in common locations when unset
    pub path: Option<PathBuf>,
    pub hash_mb: u32,
    pub multi_pv: u8,
    /// Cap for multi-threaded search; only used when the probe allows it
    pub max_threads: u32,
    pub init_timeout: Duration,
    pub ready_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            hash_mb: 16,
            multi_pv: 1,
            max_threads: 4,
            init_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(5),
        }
    }
}

/// Thread count to request, or `None` to leave the engine single-threaded.
///
/// Threads are only enabled when the engine advertises the option and the
/// host has more than one hardware thread to share.
pub fn probe_thread_count(advertises_threads: bool, available: usize, max_threads: u32) -> Option<u32> {
    if !advertises_threads || available <= 1 {
        return None;
    }
    let available = u32::try_from(available).unwrap_or(u32::MAX);
    let threads = available.min(max_threads).clamp(1, MAX_ENGINE_THREADS);
    (threads > 1).then_some(threads)
}

impl StockfishEngine {
    /// Spawn a new Stockfish instance with default configuration.
    pub async fn spawn() -> Result<Self, EngineError> {
        Self::spawn_with_config(EngineConfig::default()).await
    }

    /// Spawn a new Stockfish instance, run the UCI handshake and apply options.
    #[tracing::instrument(level = "info")]
    pub async fn spawn_with_config(config: EngineConfig) -> Result<Self, EngineError> {
        tracing::info!("Starting Stockfish engine spawn (config: {:?})", config);
        let path = match config.path.clone() {
            Some(path) => path,
            None => find_stockfish_path().ok_or(EngineError::NotFound)?,
        };
        tracing::info!("Found Stockfish at: {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn Stockfish: {}", e);
                EngineError::Spawn(e)
            })?;

        let mut stdin = process.stdin.take().ok_or(UciError::NoStdin)?;
        let stdout = process.stdout.take().ok_or(UciError::NoStdout)?;

        let (message_tx, message_rx) = mpsc::channel::<UciMessage>(256);
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);

        // Spawn output reader task
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Stockfish stdout EOF - engine closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        tracing::trace!("UCI << {}", trimmed);

                        match parse_uci_message(trimmed) {
                            Ok(msg) => {
                                if message_tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::trace!("Skipping UCI line: {}", e),
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from Stockfish stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Output reader task exiting");
        });

        // Spawn stdin writer task
        tokio::spawn(async move {
            while let Some(cmd) = stdin_rx.recv().await {
                tracing::trace!("UCI >> {}", cmd);
                if let Err(e) = stdin.write_all(format!("{}\n", cmd).as_bytes()).await {
                    tracing::error!("Failed to write to stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush stdin: {}", e);
                    break;
                }
            }
            tracing::info!("Stdin writer task exiting");
        });

        let mut engine = Self {
            process,
            stdin: stdin_tx,
            message_rx,
            ready_timeout: config.ready_timeout,
            fingerprint: String::new(),
            terminated: false,
        };

        engine.send("uci".to_string()).await?;
        let (engine_name, options) = match tokio::time::timeout(
            config.init_timeout,
            engine.read_handshake(),
        )
        .await
        {
            Ok(Ok(handshake)) => handshake,
            Ok(Err(e)) => {
                tracing::error!("Engine initialization failed: {}", e);
                engine.terminate().await;
                return Err(e);
            }
            Err(_) => {
                tracing::error!("Timeout waiting for uciok");
                engine.terminate().await;
                return Err(EngineError::Timeout("uciok"));
            }
        };

        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let advertises_threads = options.iter().any(|o| o.eq_ignore_ascii_case("Threads"));
        let threads = probe_thread_count(advertises_threads, available, config.max_threads);

        if let Some(threads) = threads {
            tracing::info!("Setting Threads to {}", threads);
            engine.set_option("Threads", threads).await?;
        } else {
            tracing::info!(
                advertises_threads,
                available,
                "Multi-threaded search not enabled"
            );
        }

        let hash_mb = config.hash_mb.clamp(1, 2048);
        tracing::info!("Setting Hash to {} MB", hash_mb);
        engine.set_option("Hash", hash_mb).await?;

        let multi_pv = config.multi_pv.max(1);
        engine.set_option("MultiPV", multi_pv).await?;

        engine.send("isready".to_string()).await?;
        if let Err(e) = engine.wait_ready().await {
            engine.terminate().await;
            return Err(e);
        }

        engine.fingerprint = format!(
            "{};hash={};multipv={};threads={}",
            engine_name,
            hash_mb,
            multi_pv,
            threads.unwrap_or(1)
        );

        tracing::info!(fingerprint = %engine.fingerprint, "Stockfish engine spawned and initialized successfully");
        Ok(engine)
    }

    async fn send(&self, cmd: String) -> Result<(), EngineError> {
        tracing::debug!("Queueing command: {}", cmd);
        self.stdin.send(cmd).await.map_err(|_| EngineError::Closed)
    }

    async fn set_option(
        &self,
        name: &str,
        value: impl std::fmt::Display,
    ) -> Result<(), EngineError> {
        self.send(format!("setoption name {} value {}", name, value))
            .await
    }

    /// Collect `id name` and advertised options until `uciok`.
    async fn read_handshake(&mut self) -> Result<(String, Vec<String>), EngineError> {
        let mut name = String::from("unknown");
        let mut options = Vec::new();
        while let Some(msg) = self.message_rx.recv().await {
            match msg {
                UciMessage::Id { name: key, value } if key == "name" => name = value,
                UciMessage::Option { name } => options.push(name),
                UciMessage::UciOk => {
                    tracing::debug!("Received uciok, {} options advertised", options.len());
                    return Ok((name, options));
                }
                _ => {}
            }
        }
        Err(EngineError::Closed)
    }

    /// Drain messages until `readyok`; anything before it belongs to an
    /// earlier search and is dropped.
    async fn wait_ready(&mut self) -> Result<(), EngineError> {
        let rx = &mut self.message_rx;
        let drained = tokio::time::timeout(self.ready_timeout, async {
            let mut discarded = 0usize;
            while let Some(msg) = rx.recv().await {
                if msg == UciMessage::ReadyOk {
                    return Ok(discarded);
                }
                discarded += 1;
            }
            Err(EngineError::Closed)
        })
        .await
        .map_err(|_| {
            tracing::warn!("Timeout waiting for readyok");
            EngineError::Timeout("readyok")
        })??;

        if drained > 0 {
            tracing::debug!("Discarded {} stale engine messages", drained);
        }
        Ok(())
    }
}

#[async_trait]
impl EngineTransport for StockfishEngine {
    fn config_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[tracing::instrument(level = "debug", skip(self, position), fields(fen = %position.fen()))]
    async fn request_analysis(&mut self, position: &Position, depth: u8) -> Result<(), EngineError> {
        if self.terminated {
            return Err(EngineError::Closed);
        }
        self.send("stop".to_string()).await?;
        self.send("ucinewgame".to_string()).await?;
        self.send(format!("position fen {}", position.fen())).await?;
        self.send("isready".to_string()).await?;
        self.wait_ready().await?;

        tracing::info!("Starting engine calculation with depth={}", depth);
        self.send(format!("go depth {}", depth)).await
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        while let Some(msg) = self.message_rx.recv().await {
            let event = match msg {
                UciMessage::ReadyOk => EngineEvent::Ready,
                UciMessage::BestMove { mv, .. } => {
                    tracing::debug!("Received bestmove: {:?}", mv);
                    EngineEvent::BestMove(mv)
                }
                UciMessage::Info(info) => match info.into_depth_info() {
                    Some(depth_info) => EngineEvent::DepthInfo(depth_info),
                    None => continue,
                },
                _ => continue,
            };
            return Some(event);
        }
        None
    }

    async fn stop(&mut self) {
        if self.terminated {
            return;
        }
        tracing::info!("Sending stop command to engine");
        if let Err(e) = self.send("stop".to_string()).await {
            tracing::debug!("Stop not delivered: {}", e);
        }
    }

    async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        tracing::info!("Sending quit command to engine");
        let _ = self.send("quit".to_string()).await;
        let _ = tokio::time::timeout(Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}

/// Find Stockfish executable in common locations
fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
        "stockfish", // In PATH
    ];

    for path_str in paths {
        let path = Path::new(path_str);
        if path.exists() || path_str == "stockfish" {
            // Try to verify it's actually runnable
            if std::process::Command::new(path_str)
                .arg("--help")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok()
            {
                return Some(PathBuf::from(path_str));
            }
        }
    }

    None
}
