use nalgebra::Vector3;
use serde::Serialize;

/// ベクトル長がこれ未満なら退化とみなす
const DEGENERATE_EPS: f64 = 1e-6;

/// 頂点 b における a-b-c の角度（度）
///
/// どちらかのベクトルが退化している場合は完全伸展 (180°) とみなす。
pub fn angle3d(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;

    let (norm_a, norm_c) = (ba.norm(), bc.norm());
    if norm_a < DEGENERATE_EPS || norm_c < DEGENERATE_EPS {
        return 180.0;
    }

    let cos_angle = (ba.dot(&bc) / (norm_a * norm_c)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// 解析対象の4関節角度（度）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JointAngles {
    pub knee: f64,
    pub hip: f64,
    pub ankle: f64,
    pub trunk: f64,
}
