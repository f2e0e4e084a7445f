use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use tracing_subscriber::EnvFilter;

use jump_tracker::analysis::{AnalysisSession, JumpType};
use jump_tracker::config::Config;
use jump_tracker::pose::{Landmark, LandmarkFrame};
use jump_tracker::profile::{AthleteProfile, ProfileRecord};

const CONFIG_PATH: &str = "config.toml";

/// JSONL の1行
#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp_s: f64,
    landmarks: Vec<Landmark>,
}

fn parse_jump_type(name: &str) -> Result<JumpType> {
    match name.to_ascii_lowercase().as_str() {
        "cmj" => Ok(JumpType::Cmj),
        "sqj" => Ok(JumpType::Sqj),
        "abalakov" | "abk" => Ok(JumpType::Abalakov),
        other => bail!("unknown jump type: {} (expected cmj, sqj or abalakov)", other),
    }
}

fn load_profile(path: &str, config: &Config) -> Result<AthleteProfile> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let record: ProfileRecord =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path))?;
    Ok(AthleteProfile::from_record(&record, config)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Usage: jump-tracker <profile.json> <frames.jsonl> [cmj|sqj|abalakov]
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: {} <profile.json> <frames.jsonl> [cmj|sqj|abalakov]", args[0]);
    }

    let config = Config::load_or_default(CONFIG_PATH);
    let dwell_frames = config.calibration.dwell_frames.max(1);
    let profile = load_profile(&args[1], &config)?;
    let mut session = AnalysisSession::new(profile, config)?;

    if let Some(name) = args.get(3) {
        let feedback = session.set_jump_type(parse_jump_type(name)?);
        eprintln!("{}", feedback);
    }

    let file = File::open(&args[2]).with_context(|| format!("Failed to open {}", args[2]))?;
    let reader = BufReader::new(file);

    let mut streak = 0usize;
    let mut processed = 0usize;
    let mut dropped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse frame at line {}", line_no + 1))?;
        let Some(frame) = LandmarkFrame::from_slice(record.timestamp_s, &record.landmarks) else {
            bail!(
                "line {}: expected 33 landmarks, got {}",
                line_no + 1,
                record.landmarks.len()
            );
        };

        // 連続して成功したフレーム数がしきい値に達するまで立位を待つ
        if streak < dwell_frames {
            match session.calibrate(&frame) {
                Ok(_) => {
                    streak += 1;
                    if streak == dwell_frames {
                        eprintln!("calibration complete at {:.2}s", frame.timestamp_s);
                    }
                }
                Err(_) => streak = 0,
            }
            continue;
        }

        match session.process(&frame) {
            Ok(analysis) => {
                processed += 1;
                for feedback in &analysis.details.feedback {
                    eprintln!("[{:>7.2}s] {:<20} {}", frame.timestamp_s, analysis.details.phase.name(), feedback);
                }
            }
            Err(_) => dropped += 1,
        }
    }

    if streak < dwell_frames {
        bail!("calibration never stabilized ({} of {} frames)", streak, dwell_frames);
    }

    eprintln!("frames: {} processed, {} dropped", processed, dropped);
    let report = session.finish();
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
