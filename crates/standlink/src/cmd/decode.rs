use standlink_frame::{FrameCodec, FrameLayout, SessionSplitter};
use tracing::info;

use crate::cmd::DecodeArgs;
use crate::exit::{csv_error, frame_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_sessions, OutputFormat, SessionRow};
use crate::sink::write_session_file;

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let layout = FrameLayout::capture(args.channels)
        .map_err(|err| CliError::usage(format!("invalid --channels: {err}")))?;
    let data = std::fs::read(&args.capture).map_err(|err| {
        io_error(&format!("failed reading {}", args.capture.display()), err)
    })?;

    let splitter = SessionSplitter::new(FrameCodec::new(layout));
    let sessions = splitter
        .sessions(&data)
        .map_err(|err| frame_error("decode failed", err))?;

    std::fs::create_dir_all(&args.out).map_err(|err| {
        io_error(&format!("failed creating {}", args.out.display()), err)
    })?;

    // Each session is written out before the next one is decoded.
    let mut rows = Vec::with_capacity(sessions.len());
    for session in sessions {
        let path = args.out.join(format!("session_{:03}.csv", session.index));
        write_session_file(&path, &session.frames, layout.channel_count())
            .map_err(|err| csv_error(&format!("failed writing {}", path.display()), err))?;
        info!(
            session = session.index,
            frames = session.frames.len(),
            path = %path.display(),
            "wrote session"
        );
        rows.push(SessionRow {
            session: session.index,
            marker_offset: session.marker_offset,
            frames: session.frames.len(),
            trailing_bytes: session.trailing_bytes,
            rate_hz: session.rate_hz,
            rate: session.rate_label(),
            fault: session.fault,
            output: Some(path.display().to_string()),
        });
    }

    print_sessions(&rows, format);
    Ok(SUCCESS)
}
