//! セッション終了時のレポート。エンコードは呼び出し側が行う

use serde::Serialize;

use crate::analysis::fault::{FaultKind, FaultTally};
use crate::analysis::metrics::{
    self, JumpRecord, PerformanceTier, QualitativeBand, SessionAccumulator,
};
use crate::analysis::phase::JumpType;
use crate::config::LevelThresholds;
use crate::profile::{AthleteProfile, SegmentLengths, Sex, SkillLevel};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AthleteSummary {
    pub name: String,
    pub sex: Sex,
    pub age: u32,
    pub mass_kg: f64,
    pub height_m: f64,
    pub bmi: f64,
    pub initial_level: SkillLevel,
    pub segments: SegmentLengths,
    /// セッション中に適用した閾値
    pub thresholds: LevelThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// 最初と最後に処理したフレームの時刻差
    pub duration_s: f64,
    pub total_reps: u32,
    pub correct_reps: u32,
    pub precision_pct: f64,
    pub jump_type: JumpType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub average_height_m: f64,
    pub max_height_m: f64,
    pub average_power_w: f64,
    pub average_flight_time_s: f64,
    pub elasticity_index: f64,
    pub coordination_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// 跳躍がなければ None
    pub performance_tier: Option<PerformanceTier>,
    pub final_level: SkillLevel,
    pub technical_score: f64,
    pub qualitative: QualitativeBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaultCount {
    pub kind: FaultKind,
    pub count: f64,
    pub severity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub athlete: AthleteSummary,
    pub session: SessionSummary,
    pub metrics: MetricsSummary,
    pub evaluation: Evaluation,
    pub faults: Vec<FaultCount>,
    pub jumps: Vec<JumpRecord>,
    pub recommendations: Vec<String>,
    pub personalized_recommendations: Vec<String>,
}

impl SessionReport {
    pub fn build(
        profile: &AthleteProfile,
        jump_type: JumpType,
        accumulator: &SessionAccumulator,
        tally: &FaultTally,
        duration_s: f64,
    ) -> Self {
        let average_height_m = accumulator.average_height();
        let precision_pct = accumulator.precision_pct();
        let technical_score = metrics::technical_score(tally, accumulator.total_reps());
        let final_level =
            SkillLevel::classify(profile.sex, average_height_m, precision_pct, technical_score);
        let type_average = accumulator.average_height_for(jump_type).unwrap_or(0.0);

        Self {
            athlete: AthleteSummary {
                name: profile.name.clone(),
                sex: profile.sex,
                age: profile.age,
                mass_kg: profile.mass_kg,
                height_m: profile.height_m,
                bmi: profile.bmi,
                initial_level: profile.level,
                segments: profile.segments,
                thresholds: profile.thresholds,
            },
            session: SessionSummary {
                duration_s,
                total_reps: accumulator.total_reps(),
                correct_reps: accumulator.correct_reps(),
                precision_pct,
                jump_type,
            },
            metrics: MetricsSummary {
                average_height_m,
                max_height_m: accumulator.max_height().unwrap_or(0.0),
                average_power_w: accumulator.average_power(),
                average_flight_time_s: accumulator.average_flight_time(),
                elasticity_index: accumulator.elasticity_index(),
                coordination_index: accumulator.coordination_index(),
            },
            evaluation: Evaluation {
                performance_tier: metrics::classify_tier(profile.sex, jump_type, type_average),
                final_level,
                technical_score,
                qualitative: QualitativeBand::from_average_height(average_height_m),
            },
            faults: tally
                .iter()
                .map(|(kind, count)| FaultCount {
                    kind,
                    count,
                    severity: kind.severity(),
                })
                .collect(),
            jumps: accumulator.jumps().to_vec(),
            recommendations: metrics::recommendations(tally, accumulator.max_height())
                .into_iter()
                .map(String::from)
                .collect(),
            personalized_recommendations: profile
                .personalized_recommendations(tally, final_level)
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::profile::ProfileRecord;

    fn profile() -> AthleteProfile {
        let record = ProfileRecord {
            name: "Report Test".to_string(),
            sex: Sex::Female,
            age: 30,
            height_cm: 165.0,
            mass_kg: 60.0,
            level: SkillLevel::Intermediate,
        };
        AthleteProfile::from_record(&record, &Config::default()).unwrap()
    }

    #[test]
    fn test_empty_session() {
        let report = SessionReport::build(
            &profile(),
            JumpType::Cmj,
            &SessionAccumulator::default(),
            &FaultTally::default(),
            0.0,
        );
        assert_eq!(report.session.total_reps, 0);
        assert_eq!(report.evaluation.performance_tier, None);
        assert_eq!(report.evaluation.technical_score, 0.0);
        assert_eq!(report.evaluation.qualitative, QualitativeBand::BelowAverage);
        assert_eq!(report.evaluation.final_level, SkillLevel::Beginner);
        assert_eq!(report.faults.len(), FaultKind::COUNT);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn test_tier_uses_current_jump_type() {
        let mut acc = SessionAccumulator::default();
        for (jump_type, height_m) in [(JumpType::Cmj, 0.35), (JumpType::Sqj, 0.20)] {
            acc.record_jump(JumpRecord {
                jump_type,
                height_m,
                flight_time_s: 0.5,
                power_w: metrics::jump_power(60.0, height_m),
            });
            acc.finalize_rep(true);
        }
        let tally = FaultTally::default();

        let cmj = SessionReport::build(&profile(), JumpType::Cmj, &acc, &tally, 12.0);
        // 女性 CMJ 35 cm → 上級帯 (30..38)
        assert_eq!(cmj.evaluation.performance_tier, Some(PerformanceTier::Advanced));
        let sqj = SessionReport::build(&profile(), JumpType::Sqj, &acc, &tally, 12.0);
        // 女性 SQJ 20 cm → 中級帯 (18..25)
        assert_eq!(sqj.evaluation.performance_tier, Some(PerformanceTier::Medium));
        let abk = SessionReport::build(&profile(), JumpType::Abalakov, &acc, &tally, 12.0);
        assert_eq!(abk.evaluation.performance_tier, None);

        assert!((cmj.metrics.elasticity_index - 75.0).abs() < 1e-9);
        assert_eq!(cmj.session.precision_pct, 100.0);
        assert_eq!(cmj.evaluation.technical_score, 100.0);
        // 平均 27.5 cm, 100 %, 100 点 → 女性上位基準 (28 cm) に届かない
        assert_eq!(cmj.evaluation.final_level, SkillLevel::Intermediate);
    }

    #[test]
    fn test_serializes_to_json() {
        let report = SessionReport::build(
            &profile(),
            JumpType::Abalakov,
            &SessionAccumulator::default(),
            &FaultTally::default(),
            3.5,
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["session"]["jump_type"], "ABALAKOV");
        assert_eq!(value["athlete"]["sex"], "F");
        assert_eq!(value["evaluation"]["qualitative"], "below_average");
        assert!(value["evaluation"]["performance_tier"].is_null());
        assert_eq!(value["faults"][0]["kind"], "insufficient_cm_depth");
        // 女性 165 cm, 30 歳: 大腿 0.22 × 1.65
        let femur = value["athlete"]["segments"]["femur_m"].as_f64().unwrap();
        assert!((femur - 0.363).abs() < 1e-9);
        assert!(value["athlete"]["segments"]["tibia_m"].as_f64().is_some());
        assert_eq!(value["athlete"]["thresholds"]["min_cm_range_deg"], 80.0);
        assert_eq!(value["athlete"]["thresholds"]["angle_tolerance_deg"], 10.0);
    }
}
