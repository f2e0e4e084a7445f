//! 6相の跳躍状態機械
//!
//! 欠陥判定は各相のハンドラ内で行う。同じ角度でも相によって欠陥かどうかが変わる

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use super::angle::JointAngles;
use super::fault::{FaultHit, FaultKind};
use super::feedback::Feedback;
use crate::calibration::CalibrationState;
use crate::config::{JointTargets, JumpConfig, LevelThresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JumpPhase {
    Initial,
    Countermovement,
    Takeoff,
    Flight,
    Landing,
    StablePostLanding,
}

impl JumpPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::Countermovement => "COUNTERMOVEMENT",
            Self::Takeoff => "TAKEOFF",
            Self::Flight => "FLIGHT",
            Self::Landing => "LANDING",
            Self::StablePostLanding => "STABLE_POST_LANDING",
        }
    }
}

impl fmt::Display for JumpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 評価する跳躍テストの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JumpType {
    #[serde(rename = "CMJ")]
    Cmj,
    #[serde(rename = "SQJ")]
    Sqj,
    #[serde(rename = "ABALAKOV")]
    Abalakov,
}

impl JumpType {
    pub const ALL: [JumpType; 3] = [Self::Cmj, Self::Sqj, Self::Abalakov];

    pub fn label(self) -> &'static str {
        match self {
            Self::Cmj => "Counter Movement Jump (CMJ)",
            Self::Sqj => "Squat Jump (SQJ)",
            Self::Abalakov => "Abalakov",
        }
    }
}

impl fmt::Display for JumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 状態機械への1フレーム分の入力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseInput {
    /// 平滑化済み角度
    pub angles: JointAngles,
    /// 左右腰Yの平均（画像座標、下が正）
    pub hip_y: f64,
    /// 膝角速度 (deg/s)
    pub knee_velocity: f64,
    pub airborne: bool,
    pub knee_valgus: bool,
    pub timestamp_s: f64,
}

/// 状態機械のみが更新する跳躍状態
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseState {
    pub phase: JumpPhase,
    /// 反動動作中の最深腰Y（画像座標の最大値）
    pub max_hip_y_during_cm: f64,
    /// 踏切以降の最高腰Y（画像座標の最小値）
    pub min_hip_y_during_flight: f64,
    /// 反動動作中の最小膝角
    pub min_knee_during_cm: f64,
    pub takeoff_time: f64,
    pub flight_start_time: f64,
    pub landing_time: f64,
    /// 直近の有効跳躍の高さ（メートル）
    pub jump_height_m: f64,
    /// 今回の着地で一度でもエラーが出たか
    landing_faulted: bool,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            phase: JumpPhase::Initial,
            max_hip_y_during_cm: 0.0,
            min_hip_y_during_flight: f64::INFINITY,
            min_knee_during_cm: f64::INFINITY,
            takeoff_time: 0.0,
            flight_start_time: 0.0,
            landing_time: 0.0,
            jump_height_m: 0.0,
            landing_faulted: false,
        }
    }
}

/// 着地時点で確定した跳躍
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedJump {
    pub height_m: f64,
    pub flight_time_s: f64,
}

/// 1ステップの結果
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub posture_correct: bool,
    pub faults: Vec<FaultHit>,
    pub feedback: Vec<Feedback>,
    /// (遷移元, 遷移先)
    pub transition: Option<(JumpPhase, JumpPhase)>,
    /// 有効な着地があった
    pub landed: Option<CompletedJump>,
    /// 試技が確定した。値は正しい試技か
    pub rep_finalized: Option<bool>,
}

impl StepOutcome {
    fn new() -> Self {
        Self {
            posture_correct: true,
            faults: Vec::new(),
            feedback: Vec::new(),
            transition: None,
            landed: None,
            rep_finalized: None,
        }
    }

    fn raise(&mut self, hit: FaultHit, feedback: Feedback) {
        self.faults.push(hit);
        self.feedback.push(feedback);
        self.posture_correct = false;
    }

    fn advise(&mut self, feedback: Feedback) {
        debug!("advice: {}", feedback);
        self.feedback.push(feedback);
    }
}

pub struct PhaseMachine {
    targets: JointTargets,
    jump: JumpConfig,
    level: LevelThresholds,
    state: PhaseState,
}

impl PhaseMachine {
    pub fn new(targets: JointTargets, jump: JumpConfig, level: LevelThresholds) -> Self {
        Self {
            targets,
            jump,
            level,
            state: PhaseState::default(),
        }
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    pub fn phase(&self) -> JumpPhase {
        self.state.phase
    }

    pub fn reset(&mut self) {
        self.state = PhaseState::default();
    }

    /// 表示用の跳躍高。滞空中は暫定値、それ以外は直近の確定値
    pub fn height_estimate(&self, calibration: &CalibrationState) -> f64 {
        match self.state.phase {
            JumpPhase::Flight => calibration
                .to_meters(self.state.max_hip_y_during_cm - self.state.min_hip_y_during_flight)
                .max(0.0),
            _ => self.state.jump_height_m,
        }
    }

    pub fn step(&mut self, input: &PhaseInput, calibration: &CalibrationState) -> StepOutcome {
        let mut out = StepOutcome::new();
        match self.state.phase {
            JumpPhase::Initial => self.on_initial(input, calibration, &mut out),
            JumpPhase::Countermovement => self.on_countermovement(input, calibration, &mut out),
            JumpPhase::Takeoff => self.on_takeoff(input, &mut out),
            JumpPhase::Flight => self.on_flight(input, calibration, &mut out),
            JumpPhase::Landing => self.on_landing(input, &mut out),
            JumpPhase::StablePostLanding => self.on_stable(input, calibration, &mut out),
        }
        out
    }

    fn enter(&mut self, next: JumpPhase, out: &mut StepOutcome) {
        let prev = self.state.phase;
        self.state.phase = next;
        out.transition = Some((prev, next));
        info!("phase: {} -> {}", prev, next);
    }

    fn tolerance(&self) -> f64 {
        self.level.angle_tolerance_deg
    }

    fn on_initial(&mut self, input: &PhaseInput, cal: &CalibrationState, out: &mut StepOutcome) {
        let descended = input.hip_y > cal.reference_hip_y + cal.to_px(self.jump.cm_onset_margin_m);
        let flexing = input.angles.knee < self.targets.knee_extension_takeoff - self.tolerance();
        if descended && flexing {
            self.state.max_hip_y_during_cm = input.hip_y;
            self.state.min_knee_during_cm = input.angles.knee;
            self.enter(JumpPhase::Countermovement, out);
            out.feedback.push(Feedback::CountermovementStarted);
        }
    }

    fn on_countermovement(&mut self, input: &PhaseInput, cal: &CalibrationState, out: &mut StepOutcome) {
        let tol = self.tolerance();
        let knee = input.angles.knee;

        if input.hip_y > self.state.max_hip_y_during_cm {
            self.state.max_hip_y_during_cm = input.hip_y;
        }
        self.state.min_knee_during_cm = self.state.min_knee_during_cm.min(knee);

        if input.knee_velocity < self.level.min_countermovement_velocity {
            out.advise(Feedback::SpeedUpCountermovement);
        }

        let depth_threshold = self.targets.knee_flexion_target_cm + tol;
        let extension_threshold = self.targets.knee_extension_takeoff - tol;
        let rising =
            input.hip_y < self.state.max_hip_y_during_cm - cal.to_px(self.jump.takeoff_rise_margin_m);

        if rising && knee > depth_threshold && knee < extension_threshold {
            if self.state.min_knee_during_cm > depth_threshold {
                out.raise(
                    FaultHit::full(FaultKind::InsufficientCmDepth),
                    Feedback::InsufficientDepth,
                );
            }
            self.state.takeoff_time = input.timestamp_s;
            self.state.min_hip_y_during_flight = input.hip_y;
            self.enter(JumpPhase::Takeoff, out);
            out.feedback.push(Feedback::TakingOff);
        } else if self.jump.allow_countermovement_abort
            && knee >= extension_threshold
            && (input.hip_y - cal.reference_hip_y).abs() < cal.to_px(self.jump.ready_band_m)
        {
            // 跳ばずに立ち上がった
            self.enter(JumpPhase::Initial, out);
            out.feedback.push(Feedback::CountermovementAborted);
        }
    }

    fn on_takeoff(&mut self, input: &PhaseInput, out: &mut StepOutcome) {
        let tol = self.tolerance();

        if input.hip_y < self.state.min_hip_y_during_flight {
            self.state.min_hip_y_during_flight = input.hip_y;
        }

        if input.knee_valgus && input.knee_velocity > self.jump.valgus_takeoff_min_velocity {
            // 高速動作中は検出の確度が低いので半分だけ加算
            out.raise(FaultHit::half(FaultKind::KneeValgus), Feedback::WatchKneePosition);
        }

        if input.angles.ankle < self.targets.ankle_plantarflexion_takeoff - tol {
            out.raise(
                FaultHit::full(FaultKind::InsufficientPlantarflexion),
                Feedback::PushThroughAnkles,
            );
        }

        if input.knee_velocity < self.level.min_takeoff_velocity {
            out.advise(Feedback::ForceTakeoff);
        }

        if input.airborne {
            self.state.flight_start_time = input.timestamp_s;
            self.enter(JumpPhase::Flight, out);
            out.feedback.push(Feedback::Airborne);
        }
    }

    fn on_flight(&mut self, input: &PhaseInput, cal: &CalibrationState, out: &mut StepOutcome) {
        if input.hip_y < self.state.min_hip_y_during_flight {
            self.state.min_hip_y_during_flight = input.hip_y;
        }
        if input.airborne {
            return;
        }

        let height_m =
            cal.to_meters(self.state.max_hip_y_during_cm - self.state.min_hip_y_during_flight);
        let flight_time_s = input.timestamp_s - self.state.takeoff_time;
        self.state.landing_time = input.timestamp_s;
        self.state.jump_height_m = height_m;

        if flight_time_s < self.jump.min_flight_time
            || height_m < self.jump.min_vertical_displacement_m
        {
            debug!(
                "jump voided: flight {:.3}s, height {:.3}m",
                flight_time_s, height_m
            );
            out.posture_correct = false;
            out.feedback.push(Feedback::JumpVoided);
            self.enter(JumpPhase::Initial, out);
            return;
        }

        self.state.landing_faulted = false;
        out.landed = Some(CompletedJump {
            height_m,
            flight_time_s,
        });
        self.enter(JumpPhase::Landing, out);
        out.feedback.push(Feedback::Landing);
    }

    fn on_landing(&mut self, input: &PhaseInput, out: &mut StepOutcome) {
        let tol = self.tolerance();
        let a = &input.angles;

        if a.knee > self.targets.knee_flexion_landing_max + tol
            || a.hip > self.targets.hip_flexion_landing_max + tol
        {
            out.raise(FaultHit::full(FaultKind::StiffLanding), Feedback::StiffLanding);
        }

        if a.trunk < self.targets.trunk_alignment - tol || a.trunk > self.targets.trunk_alignment + tol {
            out.raise(FaultHit::full(FaultKind::TrunkLean), Feedback::AlignTrunk);
        }

        if input.knee_valgus {
            out.raise(FaultHit::full(FaultKind::KneeValgus), Feedback::KneesOutOnLanding);
        }

        if !out.faults.is_empty() {
            self.state.landing_faulted = true;
        }

        let timed_out = input.timestamp_s - self.state.landing_time > self.jump.max_landing_time;
        let extended = a.knee > self.targets.knee_extension_landing_min - tol
            && a.hip > self.targets.hip_extension_takeoff - tol;
        if timed_out || extended {
            let correct = !self.state.landing_faulted;
            out.rep_finalized = Some(correct);
            if correct {
                out.feedback.push(Feedback::GoodJump {
                    height_m: self.state.jump_height_m,
                });
            } else {
                out.feedback.push(Feedback::JumpWithErrors);
            }
            out.feedback.push(Feedback::Rest);
            self.enter(JumpPhase::StablePostLanding, out);
        }
    }

    fn on_stable(&mut self, input: &PhaseInput, cal: &CalibrationState, out: &mut StepOutcome) {
        if (input.hip_y - cal.reference_hip_y).abs() < cal.to_px(self.jump.ready_band_m) {
            self.enter(JumpPhase::Initial, out);
            out.feedback.push(Feedback::ReadyForNextJump);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const DT: f64 = 1.0 / 30.0;

    fn calibration() -> CalibrationState {
        // 2 m/px: 0.02 m → 0.01, 0.01 m → 0.005, 0.05 m → 0.025
        CalibrationState::new(2.0, 0.5, 0.1, 0.9).unwrap()
    }

    fn machine(level: LevelThresholds) -> PhaseMachine {
        let config = Config::default();
        PhaseMachine::new(config.joints, config.jump, level)
    }

    fn intermediate() -> PhaseMachine {
        machine(Config::default().levels.intermediate)
    }

    #[derive(Clone, Copy)]
    struct Frame {
        knee: f64,
        hip: f64,
        ankle: f64,
        trunk: f64,
        hip_y: f64,
        velocity: f64,
        airborne: bool,
        valgus: bool,
    }

    impl Frame {
        fn standing() -> Self {
            Self {
                knee: 175.0,
                hip: 175.0,
                ankle: 170.0,
                trunk: 170.0,
                hip_y: 0.5,
                velocity: 200.0,
                airborne: false,
                valgus: false,
            }
        }

        fn knee(mut self, v: f64) -> Self { self.knee = v; self }
        fn hip(mut self, v: f64) -> Self { self.hip = v; self }
        fn ankle(mut self, v: f64) -> Self { self.ankle = v; self }
        fn hip_y(mut self, v: f64) -> Self { self.hip_y = v; self }
        fn velocity(mut self, v: f64) -> Self { self.velocity = v; self }
        fn airborne(mut self) -> Self { self.airborne = true; self }
        fn valgus(mut self) -> Self { self.valgus = true; self }

        fn at(self, tick: usize) -> PhaseInput {
            PhaseInput {
                angles: JointAngles {
                    knee: self.knee,
                    hip: self.hip,
                    ankle: self.ankle,
                    trunk: self.trunk,
                },
                hip_y: self.hip_y,
                knee_velocity: self.velocity,
                airborne: self.airborne,
                knee_valgus: self.valgus,
                timestamp_s: tick as f64 * DT,
            }
        }
    }

    /// 反動動作→踏切まで進め、次のtickを返す
    fn drive_to_takeoff(m: &mut PhaseMachine, cal: &CalibrationState) -> usize {
        let s = Frame::standing();
        // 全レベルの許容幅で有効な角度
        m.step(&s.at(0), cal);
        m.step(&s.hip_y(0.52).knee(140.0).at(1), cal);
        m.step(&s.hip_y(0.60).knee(65.0).at(2), cal);
        let out = m.step(&s.hip_y(0.59).knee(100.0).at(3), cal);
        assert_eq!(out.transition, Some((JumpPhase::Countermovement, JumpPhase::Takeoff)));
        4
    }

    #[test]
    fn test_full_cycle_visits_every_phase_once() {
        let cal = calibration();
        let mut m = intermediate();
        let s = Frame::standing();
        let mut visited = Vec::new();
        let mut landed = Vec::new();
        let mut finalized = Vec::new();

        let mut frames = vec![
            s,
            s.hip_y(0.52).knee(150.0),
            s.hip_y(0.60).knee(75.0),
            s.hip_y(0.59).knee(90.0),
            s.hip_y(0.45),
            s.hip_y(0.40).airborne(),
            s.hip_y(0.35).airborne(),
            s.hip_y(0.35).airborne(),
            s.hip_y(0.38).airborne(),
        ];
        // 深い着地を保持して時間経過で安定へ
        let landing = s.hip_y(0.6).knee(95.0).hip(95.0);
        frames.extend(std::iter::repeat(landing).take(20));
        frames.push(s.hip_y(0.51));
        frames.push(s);

        for (tick, f) in frames.iter().enumerate() {
            let out = m.step(&f.at(tick), &cal);
            if let Some((_, to)) = out.transition {
                visited.push(to);
            }
            landed.extend(out.landed);
            finalized.extend(out.rep_finalized);
        }

        assert_eq!(
            visited,
            vec![
                JumpPhase::Countermovement,
                JumpPhase::Takeoff,
                JumpPhase::Flight,
                JumpPhase::Landing,
                JumpPhase::StablePostLanding,
                JumpPhase::Initial,
            ]
        );
        assert_eq!(landed.len(), 1);
        // (0.60 - 0.35) * 2.0
        assert!((landed[0].height_m - 0.5).abs() < 1e-9);
        // 踏切 tick 3 → 着地 tick 9
        assert!((landed[0].flight_time_s - 6.0 * DT).abs() < 1e-9);
        assert_eq!(finalized, vec![true]);
        assert_eq!(m.phase(), JumpPhase::Initial);
    }

    #[test]
    fn test_short_flight_voids_jump() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        let s = Frame::standing();

        m.step(&s.hip_y(0.3).airborne().at(tick), &cal);
        assert_eq!(m.phase(), JumpPhase::Flight);
        // 踏切から 2 フレーム (0.067 s) で接地
        let out = m.step(&s.hip_y(0.5).at(tick + 1), &cal);
        assert_eq!(out.transition, Some((JumpPhase::Flight, JumpPhase::Initial)));
        assert!(out.landed.is_none());
        assert!(!out.posture_correct);
        assert!(out.feedback.contains(&Feedback::JumpVoided));
    }

    #[test]
    fn test_low_displacement_voids_jump() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        let s = Frame::standing();

        // 腰がほぼ上がらない（0.60 → 0.58 で 0.04 m）
        for i in 0..8 {
            m.step(&s.hip_y(0.58).airborne().at(tick + i), &cal);
        }
        let out = m.step(&s.hip_y(0.58).at(tick + 8), &cal);
        assert_eq!(out.transition, Some((JumpPhase::Flight, JumpPhase::Initial)));
        assert!(out.landed.is_none());
    }

    #[test]
    fn test_shallow_countermovement_raises_depth_fault_once() {
        let cal = calibration();
        let mut m = intermediate();
        let s = Frame::standing();
        m.step(&s.hip_y(0.52).knee(150.0).at(0), &cal);
        let deep = m.step(&s.hip_y(0.55).knee(120.0).at(1), &cal);
        assert!(deep.faults.is_empty());
        let out = m.step(&s.hip_y(0.54).knee(125.0).at(2), &cal);
        assert_eq!(out.transition, Some((JumpPhase::Countermovement, JumpPhase::Takeoff)));
        assert_eq!(out.faults, vec![FaultHit::full(FaultKind::InsufficientCmDepth)]);
        assert!(!out.posture_correct);
    }

    #[test]
    fn test_slow_countermovement_is_advisory_only() {
        let cal = calibration();
        let mut m = intermediate();
        let s = Frame::standing();
        m.step(&s.hip_y(0.52).knee(150.0).at(0), &cal);
        let out = m.step(&s.hip_y(0.55).knee(100.0).velocity(0.0).at(1), &cal);
        assert!(out.feedback.contains(&Feedback::SpeedUpCountermovement));
        assert!(out.posture_correct);
        assert!(out.faults.is_empty());
    }

    #[test]
    fn test_takeoff_valgus_is_half_weight() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        let out = m.step(&Frame::standing().hip_y(0.5).valgus().at(tick), &cal);
        assert_eq!(out.faults, vec![FaultHit::half(FaultKind::KneeValgus)]);

        // 角速度が低ければ検出しない
        let out = m.step(&Frame::standing().hip_y(0.5).valgus().velocity(0.2).at(tick + 1), &cal);
        assert!(out.faults.is_empty());
    }

    #[test]
    fn test_tolerance_depends_on_level() {
        let cal = calibration();
        let config = Config::default();
        // 足関節 145°: 中級 (160-10=150) ではエラー、初級 (160-20=140) では許容
        for (level, expect_fault) in [(config.levels.intermediate, true), (config.levels.beginner, false)] {
            let mut m = machine(level);
            let tick = drive_to_takeoff(&mut m, &cal);
            let out = m.step(&Frame::standing().hip_y(0.5).ankle(145.0).at(tick), &cal);
            let hit = out.faults.contains(&FaultHit::full(FaultKind::InsufficientPlantarflexion));
            assert_eq!(hit, expect_fault);
            assert_eq!(out.posture_correct, !expect_fault);
        }
    }

    #[test]
    fn test_stiff_landing_marks_rep_incorrect() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        let s = Frame::standing();
        for i in 0..6 {
            m.step(&s.hip_y(0.35).airborne().at(tick + i), &cal);
        }
        let out = m.step(&s.hip_y(0.6).knee(95.0).hip(95.0).at(tick + 6), &cal);
        assert_eq!(out.transition, Some((JumpPhase::Flight, JumpPhase::Landing)));

        // 1フレームだけ硬い着地
        let out = m.step(&s.hip_y(0.6).knee(130.0).hip(95.0).at(tick + 7), &cal);
        assert_eq!(out.faults, vec![FaultHit::full(FaultKind::StiffLanding)]);

        // 伸展で安定へ。このフレームも膝 > 100 なので硬い着地
        let out = m.step(&s.at(tick + 8), &cal);
        assert_eq!(out.transition, Some((JumpPhase::Landing, JumpPhase::StablePostLanding)));
        assert_eq!(out.rep_finalized, Some(false));
        assert!(out.feedback.contains(&Feedback::JumpWithErrors));
    }

    #[test]
    fn test_landing_valgus_and_trunk() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        let s = Frame::standing();
        for i in 0..6 {
            m.step(&s.hip_y(0.35).airborne().at(tick + i), &cal);
        }
        m.step(&s.hip_y(0.6).knee(95.0).hip(95.0).at(tick + 6), &cal);
        let mut bad = s.hip_y(0.6).knee(95.0).hip(95.0).valgus();
        bad.trunk = 140.0;
        let out = m.step(&bad.at(tick + 7), &cal);
        assert_eq!(
            out.faults,
            vec![FaultHit::full(FaultKind::TrunkLean), FaultHit::full(FaultKind::KneeValgus)]
        );
    }

    #[test]
    fn test_takeoff_below_min_velocity_is_advisory_only() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        // 0.5 < 0.8 (中級の踏切最低角速度)
        let out = m.step(&Frame::standing().hip_y(0.5).velocity(0.5).at(tick), &cal);
        assert_eq!(m.phase(), JumpPhase::Takeoff);
        assert_eq!(out.feedback, vec![Feedback::ForceTakeoff]);
        assert!(out.posture_correct);
        assert!(out.faults.is_empty());

        let out = m.step(&Frame::standing().hip_y(0.5).velocity(0.9).at(tick + 1), &cal);
        assert!(out.feedback.is_empty());
    }

    #[test]
    fn test_standing_up_mid_countermovement_stays_by_default() {
        let cal = calibration();
        let mut m = intermediate();
        let s = Frame::standing();
        m.step(&s.hip_y(0.52).knee(150.0).at(0), &cal);
        assert_eq!(m.phase(), JumpPhase::Countermovement);
        let out = m.step(&s.hip_y(0.505).knee(165.0).at(1), &cal);
        assert_eq!(out.transition, None);
        assert_eq!(m.phase(), JumpPhase::Countermovement);
    }

    #[test]
    fn test_aborted_countermovement_returns_to_initial_when_enabled() {
        let cal = calibration();
        let config = Config::default();
        let jump = JumpConfig {
            allow_countermovement_abort: true,
            ..config.jump
        };
        let mut m = PhaseMachine::new(config.joints, jump, config.levels.intermediate);
        let s = Frame::standing();
        m.step(&s.hip_y(0.52).knee(150.0).at(0), &cal);
        assert_eq!(m.phase(), JumpPhase::Countermovement);
        let out = m.step(&s.hip_y(0.505).knee(165.0).at(1), &cal);
        assert_eq!(out.transition, Some((JumpPhase::Countermovement, JumpPhase::Initial)));
        assert_eq!(out.feedback, vec![Feedback::CountermovementAborted]);
        assert!(out.faults.is_empty());
    }

    #[test]
    fn test_stable_waits_for_ready_band() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        let s = Frame::standing();
        for i in 0..6 {
            m.step(&s.hip_y(0.35).airborne().at(tick + i), &cal);
        }
        m.step(&s.hip_y(0.6).knee(95.0).hip(95.0).at(tick + 6), &cal);
        m.step(&s.hip_y(0.6).at(tick + 7), &cal);
        assert_eq!(m.phase(), JumpPhase::StablePostLanding);

        m.step(&s.hip_y(0.56).at(tick + 8), &cal);
        assert_eq!(m.phase(), JumpPhase::StablePostLanding);
        m.step(&s.hip_y(0.52).at(tick + 9), &cal);
        assert_eq!(m.phase(), JumpPhase::Initial);
    }

    #[test]
    fn test_height_estimate_during_flight() {
        let cal = calibration();
        let mut m = intermediate();
        let tick = drive_to_takeoff(&mut m, &cal);
        m.step(&Frame::standing().hip_y(0.4).airborne().at(tick), &cal);
        // (0.60 - 0.40) * 2.0
        assert!((m.height_estimate(&cal) - 0.4).abs() < 1e-9);
        m.reset();
        assert_eq!(m.phase(), JumpPhase::Initial);
        assert_eq!(m.height_estimate(&cal), 0.0);
    }
}
