use std::time::Duration;
use uuid::Uuid;

pub fn random_u64() -> u64 {
    // 复用 UUID v4 的随机源，避免额外引入 rand/getrandom 依赖。
    let b = *Uuid::new_v4().as_bytes();
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

/// 在 `[0, upper]` 内均匀取一个时长（纳秒精度）。
pub fn uniform_duration(upper: Duration) -> Duration {
    let nanos = upper.as_nanos().min(u64::MAX as u128) as u64;
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(random_u64() % (nanos.saturating_add(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_duration_stays_within_bounds() {
        assert_eq!(uniform_duration(Duration::ZERO), Duration::ZERO);
        let upper = Duration::from_millis(5);
        for _ in 0..200 {
            assert!(uniform_duration(upper) <= upper);
        }
    }
}
