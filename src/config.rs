use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SessionError;
use crate::profile::SkillLevel;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub joints: JointTargets,
    #[serde(default)]
    pub jump: JumpConfig,
    #[serde(default)]
    pub levels: LevelTable,
    #[serde(default)]
    pub proportions: ProportionTable,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// 関節角度の基準値（度）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct JointTargets {
    /// 反動動作で目標とする膝屈曲角
    #[serde(default = "default_knee_flexion_target_cm")]
    pub knee_flexion_target_cm: f64,
    /// 踏切時の膝伸展角
    #[serde(default = "default_knee_extension_takeoff")]
    pub knee_extension_takeoff: f64,
    /// 着地時の膝屈曲上限（これを超えると硬い着地）
    #[serde(default = "default_knee_flexion_landing_max")]
    pub knee_flexion_landing_max: f64,
    /// 着地後の膝再伸展角
    #[serde(default = "default_knee_extension_landing_min")]
    pub knee_extension_landing_min: f64,
    #[serde(default = "default_hip_extension_takeoff")]
    pub hip_extension_takeoff: f64,
    #[serde(default = "default_hip_flexion_landing_max")]
    pub hip_flexion_landing_max: f64,
    /// 踏切時の足関節底屈角
    #[serde(default = "default_ankle_plantarflexion_takeoff")]
    pub ankle_plantarflexion_takeoff: f64,
    /// 体幹アライメントの中心値
    #[serde(default = "default_trunk_alignment")]
    pub trunk_alignment: f64,
}

fn default_knee_flexion_target_cm() -> f64 { 70.0 }
fn default_knee_extension_takeoff() -> f64 { 170.0 }
fn default_knee_flexion_landing_max() -> f64 { 90.0 }
fn default_knee_extension_landing_min() -> f64 { 160.0 }
fn default_hip_extension_takeoff() -> f64 { 170.0 }
fn default_hip_flexion_landing_max() -> f64 { 90.0 }
fn default_ankle_plantarflexion_takeoff() -> f64 { 160.0 }
fn default_trunk_alignment() -> f64 { 170.0 }

impl Default for JointTargets {
    fn default() -> Self {
        Self {
            knee_flexion_target_cm: default_knee_flexion_target_cm(),
            knee_extension_takeoff: default_knee_extension_takeoff(),
            knee_flexion_landing_max: default_knee_flexion_landing_max(),
            knee_extension_landing_min: default_knee_extension_landing_min(),
            hip_extension_takeoff: default_hip_extension_takeoff(),
            hip_flexion_landing_max: default_hip_flexion_landing_max(),
            ankle_plantarflexion_takeoff: default_ankle_plantarflexion_takeoff(),
            trunk_alignment: default_trunk_alignment(),
        }
    }
}

/// 跳躍判定パラメータ。距離はメートル、時間は秒
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct JumpConfig {
    #[serde(default = "default_min_flight_time")]
    pub min_flight_time: f64,
    #[serde(default = "default_min_vertical_displacement_m")]
    pub min_vertical_displacement_m: f64,
    #[serde(default = "default_max_landing_time")]
    pub max_landing_time: f64,
    /// 膝間距離がこれ以上縮むと外反（メートル）
    #[serde(default = "default_valgus_tolerance_m")]
    pub valgus_tolerance_m: f64,
    /// 踏切中の外反判定に必要な膝角速度 (deg/s)
    #[serde(default = "default_valgus_takeoff_min_velocity")]
    pub valgus_takeoff_min_velocity: f64,
    /// 反動動作開始とみなす腰の沈み込み
    #[serde(default = "default_cm_onset_margin_m")]
    pub cm_onset_margin_m: f64,
    /// 踏切開始とみなす腰の上昇
    #[serde(default = "default_takeoff_rise_margin_m")]
    pub takeoff_rise_margin_m: f64,
    /// 次の試技へ戻るための基準腰高さとの許容差
    #[serde(default = "default_ready_band_m")]
    pub ready_band_m: f64,
    /// 滞空判定: 踵の上昇量（身長比）
    #[serde(default = "default_airborne_rise_fraction")]
    pub airborne_rise_fraction: f64,
    /// 反動動作中に踏み切らず立ち上がったら INITIAL へ戻す
    #[serde(default)]
    pub allow_countermovement_abort: bool,
}

fn default_min_flight_time() -> f64 { 0.15 }
fn default_min_vertical_displacement_m() -> f64 { 0.10 }
fn default_max_landing_time() -> f64 { 0.5 }
fn default_valgus_tolerance_m() -> f64 { 0.04 }
fn default_valgus_takeoff_min_velocity() -> f64 { 0.5 }
fn default_cm_onset_margin_m() -> f64 { 0.02 }
fn default_takeoff_rise_margin_m() -> f64 { 0.01 }
fn default_ready_band_m() -> f64 { 0.05 }
fn default_airborne_rise_fraction() -> f64 { 0.03 }

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            min_flight_time: default_min_flight_time(),
            min_vertical_displacement_m: default_min_vertical_displacement_m(),
            max_landing_time: default_max_landing_time(),
            valgus_tolerance_m: default_valgus_tolerance_m(),
            valgus_takeoff_min_velocity: default_valgus_takeoff_min_velocity(),
            cm_onset_margin_m: default_cm_onset_margin_m(),
            takeoff_rise_margin_m: default_takeoff_rise_margin_m(),
            ready_band_m: default_ready_band_m(),
            airborne_rise_fraction: default_airborne_rise_fraction(),
            allow_countermovement_abort: false,
        }
    }
}

/// 技能レベルごとの閾値
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholds {
    /// 角度閾値に加算する許容幅（度）
    pub angle_tolerance_deg: f64,
    /// 反動動作の最低膝角速度
    pub min_countermovement_velocity: f64,
    /// 踏切の最低膝角速度
    pub min_takeoff_velocity: f64,
    /// 反動動作の最低可動域（度）
    pub min_cm_range_deg: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelTable {
    #[serde(default = "default_beginner")]
    pub beginner: LevelThresholds,
    #[serde(default = "default_intermediate")]
    pub intermediate: LevelThresholds,
    #[serde(default = "default_advanced")]
    pub advanced: LevelThresholds,
}

fn default_beginner() -> LevelThresholds {
    LevelThresholds {
        angle_tolerance_deg: 20.0,
        min_countermovement_velocity: 0.10,
        min_takeoff_velocity: 0.4,
        min_cm_range_deg: 70.0,
    }
}

fn default_intermediate() -> LevelThresholds {
    LevelThresholds {
        angle_tolerance_deg: 10.0,
        min_countermovement_velocity: 0.20,
        min_takeoff_velocity: 0.8,
        min_cm_range_deg: 80.0,
    }
}

fn default_advanced() -> LevelThresholds {
    LevelThresholds {
        angle_tolerance_deg: 5.0,
        min_countermovement_velocity: 0.30,
        min_takeoff_velocity: 1.2,
        min_cm_range_deg: 90.0,
    }
}

impl LevelTable {
    pub fn get(&self, level: SkillLevel) -> LevelThresholds {
        match level {
            SkillLevel::Beginner => self.beginner,
            SkillLevel::Intermediate => self.intermediate,
            SkillLevel::Advanced => self.advanced,
        }
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            beginner: default_beginner(),
            intermediate: default_intermediate(),
            advanced: default_advanced(),
        }
    }
}

/// 身長に対する体節長の比率
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Proportions {
    pub femur: f64,
    pub tibia: f64,
    pub knee_distance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProportionTable {
    #[serde(default = "default_male_proportions")]
    pub male: Proportions,
    #[serde(default = "default_female_proportions")]
    pub female: Proportions,
}

fn default_male_proportions() -> Proportions {
    Proportions { femur: 0.23, tibia: 0.22, knee_distance: 0.18 }
}

fn default_female_proportions() -> Proportions {
    Proportions { femur: 0.22, tibia: 0.21, knee_distance: 0.17 }
}

impl Default for ProportionTable {
    fn default() -> Self {
        Self {
            male: default_male_proportions(),
            female: default_female_proportions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityConfig {
    /// キャリブレーション時の可視度閾値
    #[serde(default = "default_calibration_visibility")]
    pub calibration: f64,
    /// フレーム解析時の可視度閾値
    #[serde(default = "default_analysis_visibility")]
    pub analysis: f64,
}

fn default_calibration_visibility() -> f64 { 0.7 }
fn default_analysis_visibility() -> f64 { 0.5 }

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            calibration: default_calibration_visibility(),
            analysis: default_analysis_visibility(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// 安定姿勢とみなす連続成功フレーム数（呼び出し側のポリシー）
    #[serde(default = "default_dwell_frames")]
    pub dwell_frames: usize,
}

fn default_dwell_frames() -> usize { 60 }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            dwell_frames: default_dwell_frames(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        let config: Config = toml::from_str(&content).context("Failed to parse config")?;
        Ok(config)
    }

    /// 読み込みに失敗した場合はデフォルト値で続行する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}; using default parameters", e);
                Self::default()
            }
        }
    }

    /// セッション構築前の整合性チェック
    pub fn validate(&self) -> Result<(), SessionError> {
        let positive = [
            ("jump.min_flight_time", self.jump.min_flight_time),
            ("jump.max_landing_time", self.jump.max_landing_time),
            ("jump.cm_onset_margin_m", self.jump.cm_onset_margin_m),
            ("jump.takeoff_rise_margin_m", self.jump.takeoff_rise_margin_m),
            ("jump.ready_band_m", self.jump.ready_band_m),
            ("jump.airborne_rise_fraction", self.jump.airborne_rise_fraction),
            ("visibility.calibration", self.visibility.calibration),
            ("visibility.analysis", self.visibility.analysis),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(SessionError::InvalidConfig(format!("{} must be > 0 (got {})", name, value)));
            }
        }
        if self.visibility.calibration > 1.0 || self.visibility.analysis > 1.0 {
            return Err(SessionError::InvalidConfig(
                "visibility thresholds must be within (0, 1]".to_string(),
            ));
        }
        if self.joints.knee_flexion_target_cm >= self.joints.knee_extension_takeoff {
            return Err(SessionError::InvalidConfig(
                "joints.knee_flexion_target_cm must be below knee_extension_takeoff".to_string(),
            ));
        }
        Ok(())
    }
}
