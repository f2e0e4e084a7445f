//! 跳躍の指標計算とセッション集計

use serde::Serialize;

use super::fault::{FaultKind, FaultTally};
use super::phase::JumpType;
use crate::profile::Sex;

/// 重力加速度 (m/s^2)
pub const GRAVITY: f64 = 9.81;

/// 機械的パワー P = m·g·h / t（t = sqrt(2h/g)、h ≤ 0 のとき t = 0.1）
pub fn jump_power(mass_kg: f64, height_m: f64) -> f64 {
    let impulse_time = if height_m > 0.0 {
        (2.0 * height_m / GRAVITY).sqrt()
    } else {
        0.1
    };
    mass_kg * GRAVITY * height_m / impulse_time
}

/// 弾性指数 ((CMJ − SQJ) / SQJ)·100
pub fn elasticity_index(cmj_height_m: f64, sqj_height_m: f64) -> f64 {
    if sqj_height_m == 0.0 {
        return 0.0;
    }
    (cmj_height_m - sqj_height_m) / sqj_height_m * 100.0
}

/// 腕振りの協調指数 ((ABK − CMJ) / CMJ)·100
pub fn coordination_index(abalakov_height_m: f64, cmj_height_m: f64) -> f64 {
    if cmj_height_m == 0.0 {
        return 0.0;
    }
    (abalakov_height_m - cmj_height_m) / cmj_height_m * 100.0
}

/// 技術点 100·(1 − Σ(count·w) / (Σw·reps·10))、[0, 100] に収める
pub fn technical_score(tally: &FaultTally, total_reps: u32) -> f64 {
    if total_reps == 0 {
        return 0.0;
    }
    let max_impact = FaultKind::total_severity() * f64::from(total_reps) * 10.0;
    let score = 100.0 * (1.0 - tally.weighted_impact() / max_impact);
    score.clamp(0.0, 100.0)
}

/// フレームごとに追従する爆発力ゲージ (0..=100)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Explosiveness {
    pub value: f64,
    pub target: f64,
}

impl Explosiveness {
    /// `flight_height_m` は滞空中のみ Some
    pub fn update(
        &mut self,
        posture_correct: bool,
        knee_velocity: f64,
        min_takeoff_velocity: f64,
        flight_height_m: Option<f64>,
        stature_m: f64,
    ) {
        let technique = if posture_correct { 0.7 } else { 0.4 };

        let velocity = if knee_velocity > min_takeoff_velocity * 1.5 {
            0.3
        } else if knee_velocity > min_takeoff_velocity {
            0.15
        } else {
            0.0
        };

        let height = match flight_height_m {
            Some(h) if h > 0.0 && stature_m > 0.0 => (h / (stature_m * 0.25)).min(1.0) * 0.2,
            _ => 0.0,
        };

        self.target = (self.target + (technique + velocity + height) * 5.0).min(100.0);
        if !posture_correct {
            self.target = (self.target - 5.0).max(0.0);
        }
        self.value += (self.target - self.value) * 0.2;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformanceTier {
    Low,
    Medium,
    Advanced,
    Elite,
}

impl PerformanceTier {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::Advanced => "Advanced",
            Self::Elite => "Elite",
        }
    }
}

/// 性別・種目ごとの区分上限 (cm): [低, 中, 上級]
fn tier_bounds_cm(sex: Sex, jump_type: JumpType) -> [f64; 3] {
    match (sex, jump_type) {
        (Sex::Male, JumpType::Cmj) => [30.0, 40.0, 50.0],
        (Sex::Male, JumpType::Sqj) => [25.0, 35.0, 45.0],
        (Sex::Male, JumpType::Abalakov) => [35.0, 45.0, 55.0],
        (Sex::Female, JumpType::Cmj) => [22.0, 30.0, 38.0],
        (Sex::Female, JumpType::Sqj) => [18.0, 25.0, 33.0],
        (Sex::Female, JumpType::Abalakov) => [25.0, 35.0, 43.0],
    }
}

/// 平均跳躍高から区分を決める。跳躍がなければ None
pub fn classify_tier(sex: Sex, jump_type: JumpType, average_height_m: f64) -> Option<PerformanceTier> {
    if !(average_height_m > 0.0) {
        return None;
    }
    let cm = average_height_m * 100.0;
    let [low, medium, advanced] = tier_bounds_cm(sex, jump_type);
    let tier = if cm < low {
        PerformanceTier::Low
    } else if cm < medium {
        PerformanceTier::Medium
    } else if cm < advanced {
        PerformanceTier::Advanced
    } else {
        PerformanceTier::Elite
    };
    Some(tier)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitativeBand {
    Excellent,
    Good,
    Average,
    BelowAverage,
}

impl QualitativeBand {
    pub fn from_average_height(average_height_m: f64) -> Self {
        if average_height_m > 0.4 {
            Self::Excellent
        } else if average_height_m > 0.3 {
            Self::Good
        } else if average_height_m > 0.2 {
            Self::Average
        } else {
            Self::BelowAverage
        }
    }
}

/// セッション全体のエラーと最高到達点に基づく推奨事項。空にはならない
pub fn recommendations(tally: &FaultTally, max_height_m: Option<f64>) -> Vec<&'static str> {
    let mut recs = Vec::new();

    if tally.get(FaultKind::KneeValgus) > 0.0 {
        recs.push("Strengthen the gluteus medius for knee control");
        recs.push("Practice squats with an elastic band around the knees");
    }
    if tally.get(FaultKind::StiffLanding) > 0.0 {
        recs.push("Practice landings with more knee flexion");
        recs.push("Train box jumps with a soft reception");
    }
    if tally.get(FaultKind::InsufficientCmDepth) > 0.0 {
        recs.push("Improve the depth of the countermovement");
        recs.push("Work on hip and ankle mobility");
    }
    if matches!(max_height_m, Some(h) if h < 0.25) {
        recs.push("Add plyometric work to improve power");
        recs.push("Include jumps with a deep countermovement");
    }
    if tally.get(FaultKind::TrunkLean) > 0.0 {
        recs.push("Strengthen the core to keep the trunk upright");
        recs.push("Practice planks and stability exercises");
    }

    if recs.is_empty() {
        recs.push("Good work! Keep up your current routine");
    }
    recs
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JumpRecord {
    pub jump_type: JumpType,
    pub height_m: f64,
    pub flight_time_s: f64,
    pub power_w: f64,
}

/// 有効跳躍と試技数の集計。セッション中は単調増加
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionAccumulator {
    jumps: Vec<JumpRecord>,
    total_reps: u32,
    correct_reps: u32,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

impl SessionAccumulator {
    pub fn record_jump(&mut self, record: JumpRecord) {
        self.jumps.push(record);
    }

    pub fn finalize_rep(&mut self, correct: bool) {
        self.total_reps += 1;
        if correct {
            self.correct_reps += 1;
        }
    }

    pub fn jumps(&self) -> &[JumpRecord] {
        &self.jumps
    }

    pub fn total_reps(&self) -> u32 {
        self.total_reps
    }

    pub fn correct_reps(&self) -> u32 {
        self.correct_reps
    }

    /// 正しい試技の割合 (%)
    pub fn precision_pct(&self) -> f64 {
        if self.total_reps == 0 {
            return 0.0;
        }
        f64::from(self.correct_reps) / f64::from(self.total_reps) * 100.0
    }

    pub fn average_height(&self) -> f64 {
        mean(self.jumps.iter().map(|j| j.height_m)).unwrap_or(0.0)
    }

    pub fn max_height(&self) -> Option<f64> {
        self.jumps.iter().map(|j| j.height_m).reduce(f64::max)
    }

    pub fn average_power(&self) -> f64 {
        mean(self.jumps.iter().map(|j| j.power_w)).unwrap_or(0.0)
    }

    pub fn average_flight_time(&self) -> f64 {
        mean(self.jumps.iter().map(|j| j.flight_time_s)).unwrap_or(0.0)
    }

    pub fn average_height_for(&self, jump_type: JumpType) -> Option<f64> {
        mean(
            self.jumps
                .iter()
                .filter(|j| j.jump_type == jump_type)
                .map(|j| j.height_m),
        )
    }

    /// 両種目の記録がなければ 0
    pub fn elasticity_index(&self) -> f64 {
        match (
            self.average_height_for(JumpType::Cmj),
            self.average_height_for(JumpType::Sqj),
        ) {
            (Some(cmj), Some(sqj)) => elasticity_index(cmj, sqj),
            _ => 0.0,
        }
    }

    pub fn coordination_index(&self) -> f64 {
        match (
            self.average_height_for(JumpType::Abalakov),
            self.average_height_for(JumpType::Cmj),
        ) {
            (Some(abk), Some(cmj)) => coordination_index(abk, cmj),
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.jumps.clear();
        self.total_reps = 0;
        self.correct_reps = 0;
    }
}
