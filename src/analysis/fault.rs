use serde::Serialize;

/// 技術的エラーの種類（閉じた集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum FaultKind {
    InsufficientCmDepth = 0,
    PrematureExtension = 1,
    /// 膝の外反（踏切・着地）
    KneeValgus = 2,
    InsufficientPlantarflexion = 3,
    StiffLanding = 4,
    LandingImbalance = 5,
    ExcessiveLandingImpact = 6,
    TrunkLean = 7,
}

impl FaultKind {
    pub const COUNT: usize = 8;

    pub const ALL: [FaultKind; Self::COUNT] = [
        Self::InsufficientCmDepth,
        Self::PrematureExtension,
        Self::KneeValgus,
        Self::InsufficientPlantarflexion,
        Self::StiffLanding,
        Self::LandingImbalance,
        Self::ExcessiveLandingImpact,
        Self::TrunkLean,
    ];

    /// スコア計算用の重み
    pub fn severity(self) -> f64 {
        match self {
            Self::InsufficientCmDepth => 1.0,
            Self::PrematureExtension => 2.0,
            Self::KneeValgus => 2.0,
            Self::InsufficientPlantarflexion => 1.0,
            Self::StiffLanding => 2.0,
            Self::LandingImbalance => 1.5,
            Self::ExcessiveLandingImpact => 1.5,
            Self::TrunkLean => 1.0,
        }
    }

    pub fn total_severity() -> f64 {
        Self::ALL.iter().map(|k| k.severity()).sum()
    }
}

/// 1フレームで検出されたエラーと加算量
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaultHit {
    pub kind: FaultKind,
    /// 通常 1.0。高速動作中の外反は確度が低いため 0.5
    pub increment: f64,
}

impl FaultHit {
    pub fn full(kind: FaultKind) -> Self {
        Self { kind, increment: 1.0 }
    }

    pub fn half(kind: FaultKind) -> Self {
        Self { kind, increment: 0.5 }
    }
}

/// 種類ごとの累積カウント（端数あり）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultTally {
    counts: [f64; FaultKind::COUNT],
}

impl FaultTally {
    pub fn add(&mut self, kind: FaultKind, increment: f64) {
        self.counts[kind as usize] += increment;
    }

    pub fn record(&mut self, hits: &[FaultHit]) {
        for hit in hits {
            self.add(hit.kind, hit.increment);
        }
    }

    pub fn get(&self, kind: FaultKind) -> f64 {
        self.counts[kind as usize]
    }

    /// Σ(count × severity)
    pub fn weighted_impact(&self) -> f64 {
        FaultKind::ALL
            .iter()
            .map(|&k| self.get(k) * k.severity())
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.counts.iter().all(|&c| c == 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FaultKind, f64)> + '_ {
        FaultKind::ALL.iter().map(move |&k| (k, self.get(k)))
    }

    pub fn clear(&mut self) {
        self.counts = [0.0; FaultKind::COUNT];
    }
}
