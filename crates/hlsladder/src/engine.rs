use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::debug;

use crate::error::{Result, TranscodeError};

/// File in the tier directory that receives the engine's diagnostics
pub const ENCODE_LOG_NAME: &str = "encode.log";

/// A running encode: one progress channel plus an exit status
pub trait EncodeProcess {
    /// Next line of the progress channel; `None` once the channel is closed
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Reap the process. `None` means it was terminated without an exit code.
    fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Stop the process so a following `wait` cannot block on it
    fn kill(&mut self) -> io::Result<()>;

    /// Short description of why the process failed, if one is available
    fn failure_detail(&self) -> Option<String> {
        None
    }
}

/// Launches encode processes
pub trait EncodingEngine {
    fn launch(&self, args: &[String], working_dir: &Path) -> Result<Box<dyn EncodeProcess>>;
}

/// Engine backed by the ffmpeg binary
pub struct FfmpegEngine {
    ffmpeg_bin: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }
}

impl EncodingEngine for FfmpegEngine {
    fn launch(&self, args: &[String], working_dir: &Path) -> Result<Box<dyn EncodeProcess>> {
        debug!("Executing FFmpeg: {} {}", self.ffmpeg_bin.display(), args.join(" "));

        let log_path = working_dir.join(ENCODE_LOG_NAME);
        let log_file = File::create(&log_path)
            .map_err(|e| TranscodeError::io(format!("Failed to create {}", log_path.display()), e))?;

        let mut child = Command::new(&self.ffmpeg_bin)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log_file))
            .spawn()
            .map_err(|e| {
                TranscodeError::Encode(format!(
                    "failed to spawn {}: {}",
                    self.ffmpeg_bin.display(),
                    e
                ))
            })?;

        let Some(stdout) = child.stdout.take() else {
            // Reap before reporting so the child is not left behind
            let _ = child.kill();
            let _ = child.wait();
            return Err(TranscodeError::Encode("failed to capture FFmpeg stdout".to_string()));
        };

        Ok(Box::new(FfmpegProcess {
            child,
            reader: BufReader::new(stdout),
            log_path,
        }))
    }
}

struct FfmpegProcess {
    child: Child,
    reader: BufReader<ChildStdout>,
    log_path: PathBuf,
}

impl EncodeProcess for FfmpegProcess {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        // Bytes, not str: a non UTF-8 line must not end the stream
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line)? {
            0 => Ok(None),
            _ => {
                let line = String::from_utf8_lossy(&line);
                Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
            }
        }
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait()?.code())
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    fn failure_detail(&self) -> Option<String> {
        let log = std::fs::read_to_string(&self.log_path).ok()?;
        log.lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory engine used by executor and pipeline tests

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Scripted result of one launch
    #[derive(Debug, Clone)]
    pub enum Script {
        /// Emit these lines, then exit with the code
        Run { lines: Vec<String>, exit_code: i32 },
        /// Emit these lines, then fail the next read; exits 0 unless killed
        BrokenStream { lines: Vec<String> },
        /// Launch itself fails
        SpawnError,
    }

    impl Script {
        /// Progress stream that reaches `seconds` and ends cleanly
        pub fn success(seconds: f64) -> Self {
            Script::Run {
                lines: vec![
                    "frame=10".to_string(),
                    format!("out_time_us={}", (seconds / 2.0 * 1_000_000.0) as u64),
                    "speed=2.5x".to_string(),
                    "progress=continue".to_string(),
                    format!("out_time_us={}", (seconds * 1_000_000.0) as u64),
                    "progress=end".to_string(),
                ],
                exit_code: 0,
            }
        }

        /// Partial progress followed by a non-zero exit
        pub fn failure(seconds_before_crash: f64) -> Self {
            Script::Run {
                lines: vec![
                    format!("out_time_us={}", (seconds_before_crash * 1_000_000.0) as u64),
                    "progress=continue".to_string(),
                ],
                exit_code: 1,
            }
        }
    }

    /// Record of one launch as the engine saw it
    #[derive(Debug, Clone)]
    pub struct Launch {
        pub args: Vec<String>,
        pub working_dir: PathBuf,
        pub waited: Rc<RefCell<bool>>,
        pub killed: Rc<RefCell<bool>>,
    }

    #[derive(Default)]
    pub struct FakeEngine {
        scripts: RefCell<VecDeque<Script>>,
        pub launches: RefCell<Vec<Launch>>,
    }

    impl FakeEngine {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: RefCell::new(scripts.into()),
                launches: RefCell::new(Vec::new()),
            }
        }

        pub fn launch_count(&self) -> usize {
            self.launches.borrow().len()
        }

        pub fn all_waited(&self) -> bool {
            self.launches.borrow().iter().all(|l| *l.waited.borrow())
        }

        pub fn killed(&self, launch: usize) -> bool {
            *self.launches.borrow()[launch].killed.borrow()
        }
    }

    impl EncodingEngine for FakeEngine {
        fn launch(&self, args: &[String], working_dir: &Path) -> Result<Box<dyn EncodeProcess>> {
            let script = self
                .scripts
                .borrow_mut()
                .pop_front()
                .unwrap_or(Script::SpawnError);
            let waited = Rc::new(RefCell::new(false));
            let killed = Rc::new(RefCell::new(false));
            self.launches.borrow_mut().push(Launch {
                args: args.to_vec(),
                working_dir: working_dir.to_path_buf(),
                waited: waited.clone(),
                killed: killed.clone(),
            });

            let (lines, exit_code, read_error) = match script {
                Script::SpawnError => return Err(TranscodeError::Encode("failed to spawn fake".to_string())),
                Script::Run { lines, exit_code } => (lines, exit_code, false),
                Script::BrokenStream { lines } => (lines, 0, true),
            };
            Ok(Box::new(FakeProcess {
                lines: lines.into(),
                exit_code,
                read_error,
                waited,
                killed,
            }))
        }
    }

    struct FakeProcess {
        lines: VecDeque<String>,
        exit_code: i32,
        read_error: bool,
        waited: Rc<RefCell<bool>>,
        killed: Rc<RefCell<bool>>,
    }

    impl EncodeProcess for FakeProcess {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            match self.lines.pop_front() {
                Some(line) => Ok(Some(line)),
                None if self.read_error => Err(io::Error::new(io::ErrorKind::InvalidData, "stream corrupted")),
                None => Ok(None),
            }
        }

        fn wait(&mut self) -> io::Result<Option<i32>> {
            // A broken stream never closes on its own; only a kill lets it exit
            assert!(
                !self.read_error || *self.killed.borrow(),
                "waited on a process whose stream was never drained"
            );
            *self.waited.borrow_mut() = true;
            if *self.killed.borrow() {
                Ok(None)
            } else {
                Ok(Some(self.exit_code))
            }
        }

        fn kill(&mut self) -> io::Result<()> {
            *self.killed.borrow_mut() = true;
            Ok(())
        }

        fn failure_detail(&self) -> Option<String> {
            (self.exit_code != 0).then(|| "Error initializing filter 'scale_cuda'".to_string())
        }
    }
}
