//! 選手プロフィール。解析コアからは読み取り専用
//!
//! 保存と読み込みは呼び出し側が行う。ここでは生の記録から BMI・体節長・閾値を求める

use serde::{Deserialize, Serialize};

use crate::analysis::fault::{FaultKind, FaultTally};
use crate::config::{Config, LevelThresholds};
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    /// セッション結果から技能レベルを判定
    ///
    /// 平均跳躍高・成功率・技術スコアの3条件をすべて満たした最上位レベル。
    pub fn classify(sex: Sex, avg_height_m: f64, precision_pct: f64, technical_score: f64) -> Self {
        let height_cm = avg_height_m * 100.0;
        let (advanced_cm, intermediate_cm) = match sex {
            Sex::Male => (35.0, 25.0),
            Sex::Female => (28.0, 20.0),
        };
        if height_cm >= advanced_cm && precision_pct >= 80.0 && technical_score >= 75.0 {
            Self::Advanced
        } else if height_cm >= intermediate_cm && precision_pct >= 60.0 && technical_score >= 60.0 {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }
}

/// データ入力側から渡される生の記録
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    pub sex: Sex,
    pub age: u32,
    pub height_cm: f64,
    pub mass_kg: f64,
    pub level: SkillLevel,
}

/// 体節長（メートル）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentLengths {
    pub femur_m: f64,
    pub tibia_m: f64,
    pub knee_distance_m: f64,
}

#[derive(Debug, Clone)]
pub struct AthleteProfile {
    pub name: String,
    pub sex: Sex,
    pub age: u32,
    pub height_m: f64,
    pub mass_kg: f64,
    pub bmi: f64,
    pub level: SkillLevel,
    pub thresholds: LevelThresholds,
    pub segments: SegmentLengths,
}

impl AthleteProfile {
    pub fn from_record(record: &ProfileRecord, config: &Config) -> Result<Self, SessionError> {
        if !(record.height_cm > 0.0) {
            return Err(SessionError::InvalidProfile(format!(
                "height must be positive (got {} cm)",
                record.height_cm
            )));
        }
        if !(record.mass_kg > 0.0) {
            return Err(SessionError::InvalidProfile(format!(
                "mass must be positive (got {} kg)",
                record.mass_kg
            )));
        }

        let height_m = record.height_cm / 100.0;
        let proportions = match record.sex {
            Sex::Male => config.proportions.male,
            Sex::Female => config.proportions.female,
        };
        // 50歳超は体節長を3%短縮
        let age_factor = if record.age > 50 { 0.97 } else { 1.0 };

        Ok(Self {
            name: record.name.clone(),
            sex: record.sex,
            age: record.age,
            height_m,
            mass_kg: record.mass_kg,
            bmi: record.mass_kg / (height_m * height_m),
            level: record.level,
            thresholds: config.levels.get(record.level),
            segments: SegmentLengths {
                femur_m: height_m * proportions.femur * age_factor,
                tibia_m: height_m * proportions.tibia * age_factor,
                knee_distance_m: height_m * proportions.knee_distance * age_factor,
            },
        })
    }

    /// 構築後の閾値バンドルが使えるか
    pub(crate) fn validate(&self) -> Result<(), SessionError> {
        if !(self.segments.knee_distance_m > 0.0) {
            return Err(SessionError::InvalidProfile("knee distance must be positive".to_string()));
        }
        if !(self.height_m > 0.0) || !(self.mass_kg > 0.0) {
            return Err(SessionError::InvalidProfile("height and mass must be positive".to_string()));
        }
        if !(self.thresholds.angle_tolerance_deg >= 0.0) {
            return Err(SessionError::InvalidProfile("angle tolerance must be non-negative".to_string()));
        }
        Ok(())
    }

    /// 個人属性とセッション中のエラーに基づく推奨事項
    pub fn personalized_recommendations(&self, faults: &FaultTally, classified: SkillLevel) -> Vec<&'static str> {
        let mut recs = Vec::new();

        if faults.get(FaultKind::InsufficientCmDepth) > 0.0 {
            if classified == SkillLevel::Beginner {
                recs.push("Practice deep squats to improve flexibility");
                recs.push("Stretch hips and ankles daily");
            } else {
                recs.push("Add dynamic mobility work before training");
                recs.push("Include paused squats in the bottom position");
            }
        }

        if faults.get(FaultKind::KneeValgus) > 0.0 {
            recs.push("Strengthen the gluteus medius with targeted exercises");
            recs.push("Practice squats with an elastic band around the knees");
            if self.sex == Sex::Female {
                recs.push("Focus on neuromuscular knee control");
            }
        }

        if faults.get(FaultKind::StiffLanding) > 0.0 {
            recs.push("Practice soft landings from different heights");
            recs.push("Train impact absorption with eccentric exercises");
        }

        if self.age > 40 {
            recs.push("Extend the warm-up before jumping");
            recs.push("Consider low-impact exercises as a complement");
        }

        if self.bmi > 25.0 {
            recs.push("Combine jump training with cardiovascular work");
            recs.push("Progress exercise intensity gradually");
        }

        match classified {
            SkillLevel::Beginner => {
                recs.push("Focus on technique before jump height");
                recs.push("Train 2-3 sessions per week with adequate rest");
            }
            SkillLevel::Intermediate => {
                recs.push("Add jump variations (single-leg, with rotation)");
                recs.push("Increase exercise complexity progressively");
            }
            SkillLevel::Advanced => {
                recs.push("Focus on optimizing power and speed");
                recs.push("Consider advanced plyometric training");
            }
        }

        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sex: Sex, age: u32) -> ProfileRecord {
        ProfileRecord {
            name: "Test Athlete".to_string(),
            sex,
            age,
            height_cm: 180.0,
            mass_kg: 81.0,
            level: SkillLevel::Intermediate,
        }
    }

    #[test]
    fn test_derived_values() {
        let profile = AthleteProfile::from_record(&record(Sex::Male, 25), &Config::default()).unwrap();
        assert!((profile.height_m - 1.8).abs() < 1e-9);
        assert!((profile.bmi - 25.0).abs() < 1e-9);
        assert!((profile.segments.knee_distance_m - 1.8 * 0.18).abs() < 1e-9);
        assert_eq!(profile.thresholds.angle_tolerance_deg, 10.0);
    }

    #[test]
    fn test_age_factor() {
        let young = AthleteProfile::from_record(&record(Sex::Female, 50), &Config::default()).unwrap();
        let old = AthleteProfile::from_record(&record(Sex::Female, 51), &Config::default()).unwrap();
        assert!((old.segments.femur_m - young.segments.femur_m * 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_zero_height() {
        let mut r = record(Sex::Male, 30);
        r.height_cm = 0.0;
        assert!(matches!(
            AthleteProfile::from_record(&r, &Config::default()),
            Err(SessionError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_record_json() {
        let json = r#"{"name":"Ana","sex":"F","age":22,"height_cm":165.0,"mass_kg":58.0,"level":"advanced"}"#;
        let r: ProfileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.sex, Sex::Female);
        assert_eq!(r.level, SkillLevel::Advanced);
    }

    #[test]
    fn test_classify_level() {
        assert_eq!(SkillLevel::classify(Sex::Male, 0.36, 85.0, 80.0), SkillLevel::Advanced);
        assert_eq!(SkillLevel::classify(Sex::Male, 0.36, 70.0, 80.0), SkillLevel::Intermediate);
        assert_eq!(SkillLevel::classify(Sex::Male, 0.20, 100.0, 100.0), SkillLevel::Beginner);
        assert_eq!(SkillLevel::classify(Sex::Female, 0.29, 80.0, 75.0), SkillLevel::Advanced);
    }

    #[test]
    fn test_personalized_recommendations() {
        let profile = AthleteProfile::from_record(&record(Sex::Female, 45), &Config::default()).unwrap();
        let mut faults = FaultTally::default();
        faults.add(FaultKind::KneeValgus, 0.5);
        let recs = profile.personalized_recommendations(&faults, SkillLevel::Beginner);
        assert!(recs.contains(&"Focus on neuromuscular knee control"));
        assert!(recs.contains(&"Extend the warm-up before jumping"));
        assert!(recs.contains(&"Focus on technique before jump height"));
    }
}
