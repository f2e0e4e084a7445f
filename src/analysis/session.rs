//! 1人の選手の解析セッション
//!
//! 全状態を単一スレッドで所有する。フレーム単位のエラーでは状態を一切変更しない。

use nalgebra::Vector3;
use serde::Serialize;
use tracing::{info, warn};

use super::angle::{angle3d, JointAngles};
use super::fault::{FaultHit, FaultTally};
use super::feedback::Feedback;
use super::metrics::{self, Explosiveness, JumpRecord, SessionAccumulator};
use super::phase::{JumpPhase, JumpType, PhaseInput, PhaseMachine};
use super::smooth::AngleSmoother;
use crate::calibration::{CalibrationState, Calibrator, CALIBRATION_LANDMARKS};
use crate::config::Config;
use crate::error::{CalibrationError, FrameError, PoseDetectionError, SessionError};
use crate::pose::{Landmark, LandmarkFrame, LandmarkIndex};
use crate::profile::AthleteProfile;
use crate::report::SessionReport;

/// 解析に必須のランドマーク（キャリブレーション用 + 両踵）
pub const ANALYSIS_LANDMARKS: [LandmarkIndex; 10] = [
    CALIBRATION_LANDMARKS[0],
    CALIBRATION_LANDMARKS[1],
    CALIBRATION_LANDMARKS[2],
    CALIBRATION_LANDMARKS[3],
    CALIBRATION_LANDMARKS[4],
    CALIBRATION_LANDMARKS[5],
    CALIBRATION_LANDMARKS[6],
    CALIBRATION_LANDMARKS[7],
    LandmarkIndex::LeftHeel,
    LandmarkIndex::RightHeel,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDetails {
    /// 平滑化済み角度
    pub angles: JointAngles,
    pub knee_velocity: f64,
    pub hip_velocity: f64,
    pub airborne: bool,
    pub knee_valgus: bool,
    /// 膝間X距離（メートル）
    pub knee_gap_m: f64,
    pub hip_y: f64,
    pub jump_height_m: f64,
    pub phase: JumpPhase,
    pub jump_type: JumpType,
    pub faults: Vec<FaultHit>,
    pub feedback: Vec<Feedback>,
    pub explosiveness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameAnalysis {
    pub knee_angle: f64,
    pub posture_correct: bool,
    pub details: FrameDetails,
}

/// 速度計算用の前フレーム
#[derive(Debug, Clone, Copy)]
struct AngleSample {
    timestamp_s: f64,
    knee: f64,
    hip: f64,
}

/// 左右の体節
struct Side<'a> {
    shoulder: &'a Landmark,
    hip: &'a Landmark,
    knee: &'a Landmark,
    ankle: &'a Landmark,
    heel: &'a Landmark,
}

impl<'a> Side<'a> {
    fn left(frame: &'a LandmarkFrame) -> Self {
        Self {
            shoulder: frame.get(LandmarkIndex::LeftShoulder),
            hip: frame.get(LandmarkIndex::LeftHip),
            knee: frame.get(LandmarkIndex::LeftKnee),
            ankle: frame.get(LandmarkIndex::LeftAnkle),
            heel: frame.get(LandmarkIndex::LeftHeel),
        }
    }

    fn right(frame: &'a LandmarkFrame) -> Self {
        Self {
            shoulder: frame.get(LandmarkIndex::RightShoulder),
            hip: frame.get(LandmarkIndex::RightHip),
            knee: frame.get(LandmarkIndex::RightKnee),
            ankle: frame.get(LandmarkIndex::RightAnkle),
            heel: frame.get(LandmarkIndex::RightHeel),
        }
    }

    fn knee_angle(&self) -> f64 {
        angle3d(&self.hip.position(), &self.knee.position(), &self.ankle.position())
    }

    fn hip_angle(&self) -> f64 {
        angle3d(&self.shoulder.position(), &self.hip.position(), &self.knee.position())
    }

    fn ankle_angle(&self) -> f64 {
        angle3d(&self.knee.position(), &self.ankle.position(), &self.heel.position())
    }
}

fn midpoint(a: &Landmark, b: &Landmark) -> Vector3<f64> {
    (a.position() + b.position()) / 2.0
}

/// 生の4関節角度。体幹は鉛直下向きとの角度（直立で180°）
fn raw_angles(frame: &LandmarkFrame) -> JointAngles {
    let left = Side::left(frame);
    let right = Side::right(frame);

    let mid_shoulder = midpoint(left.shoulder, right.shoulder);
    let mid_hip = midpoint(left.hip, right.hip);
    let below_hip = mid_hip + Vector3::new(0.0, 1.0, 0.0);

    JointAngles {
        knee: (left.knee_angle() + right.knee_angle()) / 2.0,
        hip: (left.hip_angle() + right.hip_angle()) / 2.0,
        ankle: (left.ankle_angle() + right.ankle_angle()) / 2.0,
        trunk: angle3d(&mid_shoulder, &mid_hip, &below_hip),
    }
}

pub struct AnalysisSession {
    profile: AthleteProfile,
    config: Config,
    calibrator: Calibrator,
    calibration: CalibrationState,
    jump_type: JumpType,
    smoother: AngleSmoother,
    machine: PhaseMachine,
    faults: FaultTally,
    accumulator: SessionAccumulator,
    explosiveness: Explosiveness,
    last_sample: Option<AngleSample>,
    first_timestamp_s: Option<f64>,
    last_timestamp_s: Option<f64>,
}

impl AnalysisSession {
    pub fn new(profile: AthleteProfile, config: Config) -> Result<Self, SessionError> {
        config.validate()?;
        profile.validate()?;

        let calibrator = Calibrator::new(
            profile.segments.knee_distance_m,
            config.visibility.calibration,
        );
        let machine = PhaseMachine::new(config.joints, config.jump, profile.thresholds);
        info!(
            "session created: {} ({:?}, tolerance {:.0} deg)",
            profile.name, profile.level, profile.thresholds.angle_tolerance_deg
        );

        Ok(Self {
            profile,
            config,
            calibrator,
            calibration: CalibrationState::uncalibrated(),
            jump_type: JumpType::Cmj,
            smoother: AngleSmoother::new(),
            machine,
            faults: FaultTally::default(),
            accumulator: SessionAccumulator::default(),
            explosiveness: Explosiveness::default(),
            last_sample: None,
            first_timestamp_s: None,
            last_timestamp_s: None,
        })
    }

    pub fn profile(&self) -> &AthleteProfile {
        &self.profile
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_calibrated()
    }

    pub fn phase(&self) -> JumpPhase {
        self.machine.phase()
    }

    pub fn jump_type(&self) -> JumpType {
        self.jump_type
    }

    pub fn faults(&self) -> &FaultTally {
        &self.faults
    }

    pub fn accumulator(&self) -> &SessionAccumulator {
        &self.accumulator
    }

    pub fn explosiveness(&self) -> Explosiveness {
        self.explosiveness
    }

    /// 立位1フレームで基準値を取り直す。失敗時は未キャリブレーションになる
    pub fn calibrate(&mut self, frame: &LandmarkFrame) -> Result<CalibrationState, CalibrationError> {
        match self.calibrator.calibrate(frame) {
            Ok(state) => {
                self.calibration = state;
                Ok(state)
            }
            Err(e) => {
                warn!("calibration rejected: {}", e);
                self.calibration = CalibrationState::uncalibrated();
                Err(e)
            }
        }
    }

    pub fn set_jump_type(&mut self, jump_type: JumpType) -> Feedback {
        if jump_type != self.jump_type {
            info!("jump type: {} -> {}", self.jump_type, jump_type);
        }
        self.jump_type = jump_type;
        Feedback::JumpTypeInstruction { jump_type }
    }

    /// 必須ランドマークの可視性チェック。状態には触れない
    fn check_visibility(&self, frame: &LandmarkFrame) -> Result<(), PoseDetectionError> {
        let threshold = self.config.visibility.analysis;
        for &index in ANALYSIS_LANDMARKS.iter() {
            let landmark = frame.get(index);
            if !landmark.is_visible(threshold) {
                return Err(PoseDetectionError::LandmarkNotVisible {
                    landmark: index,
                    visibility: landmark.visibility,
                });
            }
        }
        Ok(())
    }

    pub fn process(&mut self, frame: &LandmarkFrame) -> Result<FrameAnalysis, FrameError> {
        if !self.calibration.is_calibrated() {
            warn!("frame {:.3}s dropped: not calibrated", frame.timestamp_s);
            return Err(FrameError::NotCalibrated);
        }
        if let Err(e) = self.check_visibility(frame) {
            warn!("frame {:.3}s dropped: {}", frame.timestamp_s, e);
            return Err(e.into());
        }

        let cal = self.calibration;
        let left = Side::left(frame);
        let right = Side::right(frame);

        let hip_y = (left.hip.y + right.hip.y) / 2.0;
        let heel_y = (left.heel.y + right.heel.y) / 2.0;
        let knee_gap_px = (left.knee.x - right.knee.x).abs();

        let angles = self.smoother.push(raw_angles(frame));

        let (knee_velocity, hip_velocity) = match self.last_sample {
            Some(last) if frame.timestamp_s - last.timestamp_s > 0.0 => {
                let dt = frame.timestamp_s - last.timestamp_s;
                (
                    (angles.knee - last.knee).abs() / dt,
                    (angles.hip - last.hip).abs() / dt,
                )
            }
            _ => (0.0, 0.0),
        };
        self.last_sample = Some(AngleSample {
            timestamp_s: frame.timestamp_s,
            knee: angles.knee,
            hip: angles.hip,
        });

        let airborne_rise_px =
            cal.to_px(self.config.jump.airborne_rise_fraction * self.profile.height_m);
        let airborne = heel_y < cal.reference_heel_y - airborne_rise_px;
        let knee_valgus = cal.to_meters(knee_gap_px)
            < cal.to_meters(cal.reference_knee_gap_px) - self.config.jump.valgus_tolerance_m;

        let input = PhaseInput {
            angles,
            hip_y,
            knee_velocity,
            airborne,
            knee_valgus,
            timestamp_s: frame.timestamp_s,
        };
        let outcome = self.machine.step(&input, &cal);

        self.faults.record(&outcome.faults);

        if let Some(jump) = outcome.landed {
            let record = JumpRecord {
                jump_type: self.jump_type,
                height_m: jump.height_m,
                flight_time_s: jump.flight_time_s,
                power_w: metrics::jump_power(self.profile.mass_kg, jump.height_m),
            };
            info!(
                "jump recorded: {} {:.3} m, flight {:.3} s, {:.0} W",
                self.jump_type, record.height_m, record.flight_time_s, record.power_w
            );
            self.accumulator.record_jump(record);
        }

        if let Some(correct) = outcome.rep_finalized {
            self.accumulator.finalize_rep(correct);
            info!(
                "rep {} finalized: {} ({} correct)",
                self.accumulator.total_reps(),
                if correct { "correct" } else { "with errors" },
                self.accumulator.correct_reps()
            );
        }

        let phase = self.machine.phase();
        let flight_height = match phase {
            JumpPhase::Flight => Some(self.machine.height_estimate(&cal)),
            _ => None,
        };
        self.explosiveness.update(
            outcome.posture_correct,
            knee_velocity,
            self.profile.thresholds.min_takeoff_velocity,
            flight_height,
            self.profile.height_m,
        );

        self.first_timestamp_s.get_or_insert(frame.timestamp_s);
        self.last_timestamp_s = Some(frame.timestamp_s);

        Ok(FrameAnalysis {
            knee_angle: angles.knee,
            posture_correct: outcome.posture_correct,
            details: FrameDetails {
                angles,
                knee_velocity,
                hip_velocity,
                airborne,
                knee_valgus,
                knee_gap_m: cal.to_meters(knee_gap_px),
                hip_y,
                jump_height_m: self.machine.height_estimate(&cal),
                phase,
                jump_type: self.jump_type,
                faults: outcome.faults,
                feedback: outcome.feedback,
                explosiveness: self.explosiveness.value,
            },
        })
    }

    /// 新しいセッションとしてやり直す。キャリブレーションは保持
    pub fn restart(&mut self) {
        self.machine.reset();
        self.faults.clear();
        self.smoother.clear();
        self.accumulator.clear();
        self.explosiveness.reset();
        self.last_sample = None;
        self.first_timestamp_s = None;
        self.last_timestamp_s = None;
        info!("session restarted");
    }

    /// キャリブレーションからやり直す。記録済みの跳躍は保持
    pub fn recalibrate(&mut self) {
        self.machine.reset();
        self.faults.clear();
        self.smoother.clear();
        self.calibration = CalibrationState::uncalibrated();
        self.last_sample = None;
        info!("recalibration requested");
    }

    pub fn finish(&self) -> SessionReport {
        let duration_s = match (self.first_timestamp_s, self.last_timestamp_s) {
            (Some(first), Some(last)) => (last - first).max(0.0),
            _ => 0.0,
        };
        let report = SessionReport::build(
            &self.profile,
            self.jump_type,
            &self.accumulator,
            &self.faults,
            duration_s,
        );
        info!(
            "session finished: {} reps, {} correct, precision {:.1}%",
            report.session.total_reps, report.session.correct_reps, report.session.precision_pct
        );
        report
    }
}
