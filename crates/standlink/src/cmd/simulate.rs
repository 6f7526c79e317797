use bytes::{BufMut, BytesMut};
use serde::Serialize;
use standlink_frame::{FrameCodec, FrameLayout, LayoutKind, TelemetryFrame, SESSION_MARKER};
use standlink_station::SensorClass;

use crate::cmd::SimulateArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct SimulateOutput {
    path: String,
    layout: &'static str,
    sessions: usize,
    frames: u32,
    bytes: usize,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    if args.rate == 0 {
        return Err(CliError::usage("--rate must be greater than zero"));
    }
    let layout = if args.capture {
        FrameLayout::capture(args.channels)
    } else {
        FrameLayout::live(args.channels)
    }
    .map_err(|err| CliError::usage(format!("invalid --channels: {err}")))?;

    let wire = synthesize(&args, layout)?;
    std::fs::write(&args.out, &wire)
        .map_err(|err| io_error(&format!("failed writing {}", args.out.display()), err))?;

    let out = SimulateOutput {
        path: args.out.display().to_string(),
        layout: layout.kind().as_str(),
        sessions: if args.capture { args.sessions } else { 1 },
        frames: args.frames,
        bytes: wire.len(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "wrote {} bytes ({} x {} {} frames) to {}",
            out.bytes, out.sessions, out.frames, out.layout, out.path
        ),
    }
    Ok(SUCCESS)
}

fn synthesize(args: &SimulateArgs, layout: FrameLayout) -> CliResult<BytesMut> {
    let codec = FrameCodec::new(layout);
    let capture = layout.kind() == LayoutKind::Capture;
    let sessions = if capture { args.sessions } else { 1 };
    let period_us = 1_000_000 / args.rate;
    let mut noise = Noise::new(0x5EED_1234);
    let mut wire = BytesMut::with_capacity(sessions * args.frames as usize * layout.wire_size());

    for _ in 0..sessions {
        if capture {
            wire.put_slice(&SESSION_MARKER);
        }
        for i in 0..args.frames {
            let frame = synth_frame(i, period_us, layout);
            let encoded = if capture {
                codec.encode(&frame, &mut wire)
            } else {
                if args.garbage {
                    noise.fill(&mut wire, 1 + (i % 7) as usize);
                }
                codec.encode_with_marker(&frame, &mut wire)
            };
            encoded.map_err(|err| frame_error("encode failed", err))?;
        }
        if capture && args.garbage {
            // A torn frame at the end of the session.
            noise.fill(&mut wire, layout.frame_size() / 2);
        }
    }
    Ok(wire)
}

fn synth_frame(i: u32, period_us: u32, layout: FrameLayout) -> TelemetryFrame {
    let n = layout.channel_count();
    let channels: Vec<u16> = (0..n)
        .map(|c| 2667 + ((i as usize * 37 + c * 1500) % 20_000) as u16)
        .collect();
    let payload_centi_psi = match layout.kind() {
        LayoutKind::Capture => channels
            .iter()
            .map(|&raw| (SensorClass::Low.counts_to_psi(raw) * 100.0).round().max(0.0) as u32)
            .collect(),
        LayoutKind::Live => Vec::new(),
    };
    TelemetryFrame {
        timestamp_us: i.wrapping_mul(period_us),
        sequence: i,
        valid_mask: if n >= 8 { 0xFF } else { ((1u16 << n) - 1) as u8 },
        status_bits: 0,
        solenoid_state: 0x8000,
        channels,
        payload_centi_psi,
    }
}

/// Deterministic filler that never contains a marker byte.
struct Noise(u32);

impl Noise {
    fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    fn fill(&mut self, dst: &mut BytesMut, len: usize) {
        for _ in 0..len {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 17;
            self.0 ^= self.0 << 5;
            dst.put_u8((self.0 & 0x7F) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use standlink_frame::{SessionSplitter, StreamSynchronizer};

    use super::*;

    fn args(capture: bool, garbage: bool) -> SimulateArgs {
        SimulateArgs {
            out: PathBuf::from("unused"),
            frames: 20,
            channels: 3,
            rate: 200,
            garbage,
            capture,
            sessions: 2,
        }
    }

    #[test]
    fn live_stream_with_noise_decodes_fully() {
        let layout = FrameLayout::live(3).unwrap();
        let wire = synthesize(&args(false, true), layout).unwrap();

        let mut sync = StreamSynchronizer::new(FrameCodec::new(layout));
        let frames: Vec<_> = sync
            .feed(&wire)
            .into_iter()
            .filter_map(|e| e.into_frame())
            .collect();
        assert_eq!(frames.len(), 20);
        assert_eq!(frames[19].sequence, 19);
        assert_eq!(frames[1].timestamp_us, 5_000);
        assert_eq!(sync.stats().dropped, 0);
    }

    #[test]
    fn capture_sessions_split_back_out() {
        let layout = FrameLayout::capture(3).unwrap();
        let wire = synthesize(&args(true, true), layout).unwrap();

        let sessions = SessionSplitter::new(FrameCodec::new(layout))
            .split(&wire)
            .unwrap();
        assert_eq!(sessions.len(), 2);
        for session in &sessions {
            assert_eq!(session.frames.len(), 20);
            assert_eq!(session.trailing_bytes, layout.frame_size() / 2);
            assert_eq!(session.rate_hz, Some(200.0));
        }
    }

    #[test]
    fn noise_has_no_marker_bytes() {
        let mut buf = BytesMut::new();
        Noise::new(7).fill(&mut buf, 4096);
        assert!(buf.iter().all(|&b| b < 0x80));
    }
}
