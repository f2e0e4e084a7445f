use super::angle::JointAngles;

/// 平滑化ウィンドウの長さ
pub const WINDOW: usize = 5;

/// 固定長リングバッファによる移動平均
///
/// 保持しているサンプルのみで平均を取るため、充填前は押し込んだ分だけの平均になる。
#[derive(Debug, Clone)]
pub struct RollingMean<const N: usize> {
    samples: [f64; N],
    /// 次に書き込む位置
    head: usize,
    len: usize,
}

impl<const N: usize> RollingMean<N> {
    pub fn new() -> Self {
        Self {
            samples: [0.0; N],
            head: 0,
            len: 0,
        }
    }

    /// サンプルを追加し、現在の平均を返す
    pub fn push(&mut self, value: f64) -> f64 {
        self.samples[self.head] = value;
        self.head = (self.head + 1) % N;
        if self.len < N {
            self.len += 1;
        }
        self.mean()
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        // 未充填時は先頭から len 個が有効
        let sum: f64 = self.samples[..self.len].iter().sum();
        sum / self.len as f64
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.samples = [0.0; N];
        self.head = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for RollingMean<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// 関節ごとに独立した平滑化チャンネル
#[derive(Debug, Clone, Default)]
pub struct AngleSmoother {
    knee: RollingMean<WINDOW>,
    hip: RollingMean<WINDOW>,
    ankle: RollingMean<WINDOW>,
    trunk: RollingMean<WINDOW>,
}

impl AngleSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw: JointAngles) -> JointAngles {
        JointAngles {
            knee: self.knee.push(raw.knee),
            hip: self.hip.push(raw.hip),
            ankle: self.ankle.push(raw.ankle),
            trunk: self.trunk.push(raw.trunk),
        }
    }

    pub fn clear(&mut self) {
        self.knee.clear();
        self.hip.clear();
        self.ankle.clear();
        self.trunk.clear();
    }
}
