use serde::Serialize;
use tracing::info;

use crate::error::CalibrationError;
use crate::pose::{LandmarkFrame, LandmarkIndex};

/// キャリブレーションに必須のランドマーク
pub const CALIBRATION_LANDMARKS: [LandmarkIndex; 8] = [
    LandmarkIndex::LeftHip,
    LandmarkIndex::RightHip,
    LandmarkIndex::LeftKnee,
    LandmarkIndex::RightKnee,
    LandmarkIndex::LeftAnkle,
    LandmarkIndex::RightAnkle,
    LandmarkIndex::LeftShoulder,
    LandmarkIndex::RightShoulder,
];

/// これ以下のスケールは検出ノイズとみなして棄却
pub const MIN_SCALE_M_PER_PX: f64 = 0.001;

/// 立位から得た基準値
///
/// `calibrated == true` のとき `scale_m_per_px > MIN_SCALE_M_PER_PX` かつ
/// `reference_hip_y > 0` が成り立つ。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationState {
    /// 画像座標1単位あたりのメートル
    pub scale_m_per_px: f64,
    /// 立位時の左右腰Yの平均
    pub reference_hip_y: f64,
    /// 立位時の膝間X距離
    pub reference_knee_gap_px: f64,
    /// 立位時の踵Y（踵が見えなければ足首Y）
    pub reference_heel_y: f64,
    pub calibrated: bool,
}

impl CalibrationState {
    pub fn uncalibrated() -> Self {
        Self {
            scale_m_per_px: 0.0,
            reference_hip_y: 0.0,
            reference_knee_gap_px: 0.0,
            reference_heel_y: 0.0,
            calibrated: false,
        }
    }

    /// 不変条件を満たす場合のみ calibrated な状態を返す
    pub fn new(
        scale_m_per_px: f64,
        reference_hip_y: f64,
        reference_knee_gap_px: f64,
        reference_heel_y: f64,
    ) -> Result<Self, CalibrationError> {
        if !(scale_m_per_px > MIN_SCALE_M_PER_PX) || !(reference_hip_y > 0.0) {
            return Err(CalibrationError::InvalidComputedScale {
                scale_m_per_px,
                reference_hip_y,
            });
        }
        Ok(Self {
            scale_m_per_px,
            reference_hip_y,
            reference_knee_gap_px,
            reference_heel_y,
            calibrated: true,
        })
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// メートル → 画像座標
    pub fn to_px(&self, meters: f64) -> f64 {
        meters / self.scale_m_per_px
    }

    /// 画像座標 → メートル
    pub fn to_meters(&self, px: f64) -> f64 {
        px * self.scale_m_per_px
    }
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self::uncalibrated()
    }
}

/// 静止立位1フレームから基準値を求める
///
/// 何フレーム連続で成功すれば安定とみなすかは呼び出し側が決める。
#[derive(Debug, Clone)]
pub struct Calibrator {
    /// 選手の膝間距離（メートル）
    knee_distance_m: f64,
    min_visibility: f64,
}

impl Calibrator {
    pub fn new(knee_distance_m: f64, min_visibility: f64) -> Self {
        Self {
            knee_distance_m,
            min_visibility,
        }
    }

    pub fn calibrate(&self, frame: &LandmarkFrame) -> Result<CalibrationState, CalibrationError> {
        for &index in CALIBRATION_LANDMARKS.iter() {
            if !frame.get(index).is_visible(self.min_visibility) {
                return Err(CalibrationError::LandmarkNotVisible(index));
            }
        }

        let left_hip = frame.get(LandmarkIndex::LeftHip);
        let right_hip = frame.get(LandmarkIndex::RightHip);
        let left_knee = frame.get(LandmarkIndex::LeftKnee);
        let right_knee = frame.get(LandmarkIndex::RightKnee);

        let reference_hip_y = (left_hip.y + right_hip.y) / 2.0;
        let knee_separation = (left_knee.x - right_knee.x).hypot(left_knee.y - right_knee.y);
        if !(knee_separation > 0.0) {
            return Err(CalibrationError::DegenerateGeometry);
        }
        let scale_m_per_px = self.knee_distance_m / knee_separation;
        let reference_knee_gap_px = (left_knee.x - right_knee.x).abs();

        let reference_heel_y = match (
            frame.visible(LandmarkIndex::LeftHeel, self.min_visibility),
            frame.visible(LandmarkIndex::RightHeel, self.min_visibility),
        ) {
            (Some(l), Some(r)) => (l.y + r.y) / 2.0,
            _ => {
                let l = frame.get(LandmarkIndex::LeftAnkle);
                let r = frame.get(LandmarkIndex::RightAnkle);
                (l.y + r.y) / 2.0
            }
        };

        let state = CalibrationState::new(
            scale_m_per_px,
            reference_hip_y,
            reference_knee_gap_px,
            reference_heel_y,
        )?;
        info!(
            "calibrated: scale={:.5} m/px, reference_hip_y={:.5}",
            state.scale_m_per_px, state.reference_hip_y
        );
        Ok(state)
    }
}
