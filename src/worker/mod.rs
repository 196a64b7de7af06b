//! External worker handling
//!
//! The worker is the executable that performs the actual download. This module
//! covers the three things the core needs from it:
//!
//! - [`WorkerBackend`]: the contract that turns a job into an argument vector and
//!   decides whether progress is derived from output or synthesized
//! - [`Supervisor`]: runs the process (batch or streaming), captures output and
//!   exit status
//! - output parsers for progress lines, the `DOWNLOADED_FILE:` marker and
//!   destination hints
//!
//! ## Usage
//!
//! ```no_run
//! use tubetap::worker::{Supervisor, WorkerBackend, YtDlpWorker};
//! use tubetap::types::{JobSpec, Quality};
//! use std::path::Path;
//!
//! # async fn example() -> tubetap::Result<()> {
//! let backend = YtDlpWorker::from_path().expect("yt-dlp not found in PATH");
//! let job = JobSpec {
//!     url: "https://youtu.be/abc123".into(),
//!     quality: Quality::Video { height: 720 },
//! };
//! let command = backend.command(&job, Path::new("/tmp/Videos"));
//!
//! let output = Supervisor::default()
//!     .run_streaming(&command, |line| println!("{line}"))
//!     .await?;
//! println!("exit code: {:?}", output.code);
//! # Ok(())
//! # }
//! ```

mod backend;
mod parser;
mod supervisor;

pub use backend::{
    ProgressMode, SpecializedWorker, WorkerBackend, WorkerCommand, YTDLP_PROGRESS_TEMPLATE,
    YtDlpWorker, backend_from_config,
};
pub use parser::{
    DOWNLOADED_FILE_MARKER, DestinationHint, ProgressSample, RATE_LIMITED_MESSAGE,
    classify_failure, find_marker, parse_destination_line, parse_marker_line,
    parse_progress_line,
};
pub use supervisor::{Supervisor, WorkerOutput};
