use std::collections::HashSet;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use log::{debug, warn};
use shakmaty::Chess;

use super::protocol::{PerftLine, parse_option_name, parse_perft_line, split_option};
use crate::error::{PerftError, Result};
use crate::perft::{Divide, NodeCounter};
use crate::position::to_fen;

pub const ENGINE_READY_TIMEOUT: Duration = Duration::from_secs(30);
pub const ENGINE_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_PERFT_TIMEOUT: Duration = Duration::from_secs(600);

/// エンジンプロセス起動時の設定。
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub hash_mb: u32,
    pub threads: usize,
    pub ponder: bool,
    pub chess960: bool,
    /// 追加の UCI オプション (Name=Value 形式)
    pub options: Vec<String>,
    /// `go perft` 1回あたりの待ち時間上限
    pub perft_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./stockfish"),
            args: Vec::new(),
            hash_mb: 128,
            threads: 1,
            ponder: false,
            chess960: false,
            options: Vec::new(),
            perft_timeout: DEFAULT_PERFT_TIMEOUT,
        }
    }
}

/// 参照エンジン1本との UCI 入出力をカプセル化する。
pub struct UciEngine {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
    opt_names: HashSet<String>,
    perft_timeout: Duration,
    pub label: String,
}

impl UciEngine {
    pub fn spawn(cfg: &EngineConfig, label: String) -> Result<Self> {
        let mut cmd = Command::new(&cfg.path);
        if !cfg.args.is_empty() {
            cmd.args(&cfg.args);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| PerftError::EngineSpawn {
                path: cfg.path.clone(),
                source,
            })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(PerftError::EngineExited { label });
        };
        let (tx, rx) = mpsc::channel::<String>();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let mut engine = Self {
            child,
            stdin: BufWriter::new(stdin),
            rx,
            opt_names: HashSet::new(),
            perft_timeout: cfg.perft_timeout,
            label,
        };
        engine.initialize(cfg)?;
        Ok(engine)
    }

    fn initialize(&mut self, cfg: &EngineConfig) -> Result<()> {
        self.write_line("uci")?;
        loop {
            let line = self.recv_line(ENGINE_READY_TIMEOUT, "uciok")?;
            if line.starts_with("option ") {
                if let Some(name) = parse_option_name(&line) {
                    self.opt_names.insert(name);
                }
            } else if line.trim() == "uciok" {
                break;
            }
        }
        self.set_option_if_available("Hash", &cfg.hash_mb.to_string())?;
        self.set_option_if_available("Threads", &cfg.threads.to_string())?;
        self.set_option_if_available("Ponder", if cfg.ponder { "true" } else { "false" })?;
        if cfg.chess960 {
            if !self.opt_names.is_empty() && !self.opt_names.contains("UCI_Chess960") {
                warn!("{}: engine does not advertise UCI_Chess960", self.label);
            }
            self.set_option_if_available("UCI_Chess960", "true")?;
        }
        for opt in &cfg.options {
            match split_option(opt) {
                (name, Some(value)) => self.set_option_if_available(name, value)?,
                // 値なしはボタン型オプションとみなす
                (name, None) => self.write_line(&format!("setoption name {name}"))?,
            }
        }
        self.sync_ready()?;
        self.write_line("ucinewgame")?;
        self.sync_ready()
    }

    /// `position fen` を送り `go perft` の結果を回収する。
    pub fn perft(&mut self, fen: &str, depth: u32) -> Result<Divide> {
        self.write_line(&format!("position fen {fen}"))?;
        self.write_line(&format!("go perft {depth}"))?;

        let deadline = Instant::now() + self.perft_timeout;
        let mut divide = Divide::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = self.recv_line(remaining, "Nodes searched")?;
            match parse_perft_line(&line) {
                Some(PerftLine::Move { uci, nodes }) => {
                    divide.moves.insert(uci, nodes);
                }
                Some(PerftLine::Total(total)) => {
                    divide.total = total;
                    return Ok(divide);
                }
                Some(PerftLine::Other) => {}
                None => {
                    return Err(PerftError::MalformedOutput {
                        label: self.label.clone(),
                        line,
                    });
                }
            }
        }
    }

    pub fn sync_ready(&mut self) -> Result<()> {
        self.write_line("isready")?;
        loop {
            let line = self.recv_line(ENGINE_READY_TIMEOUT, "readyok")?;
            if line.trim() == "readyok" {
                break;
            }
        }
        Ok(())
    }

    pub fn recv_line(&self, timeout: Duration, waiting_for: &str) -> Result<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => {
                debug!("{} >> {}", self.label, line);
                Ok(line)
            }
            Err(RecvTimeoutError::Timeout) => Err(PerftError::EngineTimeout {
                label: self.label.clone(),
                waiting_for: waiting_for.to_string(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(PerftError::EngineExited {
                label: self.label.clone(),
            }),
        }
    }

    /// エンジンが option として申告した名前のみ設定する（申告が無い場合は全て送る）。
    pub fn set_option_if_available(&mut self, name: &str, value: &str) -> Result<()> {
        if self.opt_names.is_empty() || self.opt_names.contains(name) {
            self.write_line(&format!("setoption name {name} value {value}"))?;
        } else {
            debug!("{}: skipping unsupported option {name}", self.label);
        }
        Ok(())
    }

    pub fn write_line(&mut self, msg: &str) -> Result<()> {
        debug!("{} << {}", self.label, msg);
        let io_err = |source| PerftError::EngineIo {
            label: self.label.clone(),
            source,
        };
        self.stdin.write_all(msg.as_bytes()).map_err(io_err)?;
        self.stdin.write_all(b"\n").map_err(io_err)?;
        self.stdin.flush().map_err(io_err)
    }
}

impl NodeCounter for UciEngine {
    fn label(&self) -> &str {
        &self.label
    }

    fn divide(&mut self, pos: &Chess, depth: u32) -> Result<Divide> {
        self.perft(&to_fen(pos), depth)
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.write_line("quit");
        let deadline = Instant::now() + ENGINE_QUIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::position::{DEFAULT_POSITIONS, parse_fen};
    use shakmaty::CastlingMode;

    /// 決め打ちの perft 結果を返す偽エンジン。
    const FAKE_ENGINE: &str = r#"
while read -r line; do
  case "$line" in
    uci)
      echo "id name fake"
      echo "option name Hash type spin default 16 min 1 max 1024"
      echo "option name Clear Hash type button"
      echo "uciok" ;;
    isready) echo "readyok" ;;
    "go perft"*)
      echo "info string perft start"
      echo "a2a3: 19"
      echo "e2e4: 21"
      echo ""
      echo "Nodes searched: 40" ;;
    quit) exit 0 ;;
  esac
done
"#;

    fn fake_config(script: &str) -> EngineConfig {
        EngineConfig {
            path: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            perft_timeout: Duration::from_secs(10),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn perft_collects_divide_from_engine_output() {
        let mut engine = UciEngine::spawn(&fake_config(FAKE_ENGINE), "fake".to_string()).unwrap();
        let pos = parse_fen(DEFAULT_POSITIONS[0], CastlingMode::Standard).unwrap();
        let divide = engine.divide(&pos, 2).unwrap();
        assert_eq!(divide.total, 40);
        assert_eq!(divide.moves.len(), 2);
        assert_eq!(divide.moves["a2a3"], 19);
        assert_eq!(divide.moves["e2e4"], 21);
        assert!(engine.opt_names.contains("Clear Hash"));
    }

    #[test]
    fn engine_exit_is_reported() {
        // go perft を受け取った時点で応答せずに終了する
        let script = FAKE_ENGINE.replace(r#"echo "info string perft start""#, "exit 3");
        let mut engine = UciEngine::spawn(&fake_config(&script), "dying".to_string()).unwrap();
        let err = engine.perft(DEFAULT_POSITIONS[0], 1).unwrap_err();
        assert!(matches!(err, PerftError::EngineExited { .. } | PerftError::EngineIo { .. }));
    }

    #[test]
    fn malformed_perft_output_is_an_error() {
        let script = FAKE_ENGINE.replace("a2a3: 19", "a2a3: many");
        let mut engine = UciEngine::spawn(&fake_config(&script), "garbled".to_string()).unwrap();
        let err = engine.perft(DEFAULT_POSITIONS[0], 1).unwrap_err();
        assert!(matches!(err, PerftError::MalformedOutput { .. }));
    }

    #[test]
    fn missing_binary_fails_to_spawn() {
        let cfg = EngineConfig {
            path: PathBuf::from("/nonexistent/perftcheck-engine"),
            ..EngineConfig::default()
        };
        let err = UciEngine::spawn(&cfg, "missing".to_string()).err().unwrap();
        assert!(matches!(err, PerftError::EngineSpawn { .. }));
        // OS エラーは source 側にだけ載る
        assert_eq!(err.to_string(), "failed to spawn engine at /nonexistent/perftcheck-engine");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn slow_perft_times_out() {
        let script = FAKE_ENGINE.replace(r#"echo "info string perft start""#, "sleep 5");
        let mut cfg = fake_config(&script);
        cfg.perft_timeout = Duration::from_millis(300);
        let mut engine = UciEngine::spawn(&cfg, "slow".to_string()).unwrap();
        let start = Instant::now();
        let err = engine.perft(DEFAULT_POSITIONS[0], 3).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(4));
        match err {
            PerftError::EngineTimeout { label, waiting_for } => {
                assert_eq!(label, "slow");
                assert_eq!(waiting_for, "Nodes searched");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// 受け取った setoption 行をファイルに書き残す偽エンジン。
    fn recording_engine(log: &std::path::Path, advertised: &[&str]) -> String {
        let options: String = advertised
            .iter()
            .map(|name| format!("      echo \"option name {name} type check default false\"\n"))
            .collect();
        format!(
            r#"
while read -r line; do
  case "$line" in
    uci)
      echo "id name recorder"
{options}      echo "uciok" ;;
    setoption*) echo "$line" >> "{log}" ;;
    isready) echo "readyok" ;;
    quit) exit 0 ;;
  esac
done
"#,
            log = log.display()
        )
    }

    #[test]
    fn chess960_option_reaches_engine() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("setoption.log");
        let mut cfg = fake_config(&recording_engine(&log, &["Hash", "UCI_Chess960"]));
        cfg.chess960 = true;
        cfg.options = vec!["Clear Hash".to_string()];
        let engine = UciEngine::spawn(&cfg, "960".to_string()).unwrap();
        drop(engine);

        let sent = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = sent.lines().collect();
        assert!(lines.contains(&"setoption name UCI_Chess960 value true"));
        assert!(lines.contains(&"setoption name Hash value 128"));
        assert!(lines.contains(&"setoption name Clear Hash"));
        // 申告されていない Threads / Ponder は送らない
        assert!(!sent.contains("Threads"));
        assert!(!sent.contains("Ponder"));
    }

    #[test]
    fn standard_mode_leaves_chess960_unset() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("setoption.log");
        let cfg = fake_config(&recording_engine(&log, &["Hash", "UCI_Chess960"]));
        drop(UciEngine::spawn(&cfg, "std".to_string()).unwrap());

        let sent = std::fs::read_to_string(&log).unwrap();
        assert!(!sent.contains("UCI_Chess960"));
    }
}
