use crate::{DepthInfo, Score};

/// Incoming message from UCI engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciMessage {
    Id { name: String, value: String },
    /// `option name <Name> type ...` advertised during the handshake
    Option { name: String },
    UciOk,
    ReadyOk,
    /// `mv` is `None` for `bestmove (none)`
    BestMove {
        mv: Option<String>,
        ponder: Option<String>,
    },
    Info(EngineInfo),
}

/// Engine analysis information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<String>, // Principal variation, engine notation
    pub multipv: Option<u8>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
}

impl EngineInfo {
    /// The main-line depth report carried by this line, if any.
    ///
    /// Lines without depth or score (currmove updates, `info string`) and
    /// secondary MultiPV lines yield `None`.
    pub fn into_depth_info(self) -> Option<DepthInfo> {
        if self.multipv.is_some_and(|n| n > 1) {
            return None;
        }
        Some(DepthInfo {
            depth: self.depth?,
            score: self.score?,
            pv: self.pv,
        })
    }
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, crate::UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"option") => {
            // option name <words...> type <kind> ...
            let start = tokens
                .iter()
                .position(|t| *t == "name")
                .ok_or_else(|| crate::UciError::MalformedMessage(line.to_string()))?;
            let end = tokens
                .iter()
                .position(|t| *t == "type")
                .unwrap_or(tokens.len());
            if end <= start + 1 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            Ok(UciMessage::Option {
                name: tokens[start + 1..end].join(" "),
            })
        }

        Some(&"bestmove") => {
            let mv = match tokens.get(1) {
                Some(&"(none)") => None,
                Some(mv) => Some(mv.to_string()),
                None => return Err(crate::UciError::MalformedMessage(line.to_string())),
            };
            let ponder = if tokens.len() >= 4 && tokens[2] == "ponder" {
                Some(tokens[3].to_string())
            } else {
                None
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        _ => Err(crate::UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse an "info" line from the engine
fn parse_info_line(tokens: &[&str]) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "seldepth" => {
                i += 1;
                info.seldepth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "time" => {
                i += 1;
                info.time_ms = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                info.nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                info.nps = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        info.score = match score_type {
                            "cp" => value_str.parse().ok().map(Score::Centipawns),
                            "mate" => value_str.parse().ok().map(Score::Mate),
                            _ => None,
                        };
                    }
                }
            }
            "pv" => {
                // Collect all moves until next keyword
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    info.pv.push(tokens[i].to_string());
                    i += 1;
                }
                continue; // Don't increment i again
            }
            "multipv" => {
                i += 1;
                info.multipv = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "hashfull" => {
                i += 1;
                info.hashfull = tokens.get(i).and_then(|s| s.parse().ok());
            }
            // Free text runs to end of line
            "string" => break,
            _ => {
                // Unknown keyword or bound marker, skip
            }
        }
        i += 1;
    }

    info
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "seldepth"
            | "time"
            | "nodes"
            | "score"
            | "pv"
            | "multipv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "nps"
            | "tbhits"
            | "cpuload"
            | "string"
            | "wdl"
    )
}
