use thiserror::Error;

use crate::pose::LandmarkIndex;

/// キャリブレーション失敗。いずれも致命的ではなく、呼び出し側が再試行する
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("landmark {0} not detected or visibility too low")]
    LandmarkNotVisible(LandmarkIndex),
    #[error("knee separation is zero; stand facing the camera with feet apart")]
    DegenerateGeometry,
    #[error("computed calibration rejected (scale {scale_m_per_px:.5} m/px, hip y {reference_hip_y:.5})")]
    InvalidComputedScale {
        scale_m_per_px: f64,
        reference_hip_y: f64,
    },
}

/// 解析中に必要なランドマークが閾値を下回った
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoseDetectionError {
    #[error("landmark {landmark} not visible (visibility {visibility:.2})")]
    LandmarkNotVisible {
        landmark: LandmarkIndex,
        visibility: f64,
    },
}

/// フレーム単位のエラー。フレームは破棄され、セッション状態は変化しない
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("session is not calibrated")]
    NotCalibrated,
    #[error(transparent)]
    Pose(#[from] PoseDetectionError),
}

/// セッション構築時の設定不備
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("invalid athlete profile: {0}")]
    InvalidProfile(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
