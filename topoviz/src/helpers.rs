use std::f64::consts::PI;

/// Make sure bounds are ordered correctly, eg the upper color limit is not below the lower one.
///
pub fn rearrange<N>(lower: N, upper: N) -> (N, N)
where
    N: PartialOrd,
{
    if lower > upper {
        (upper, lower)
    } else {
        (lower, upper)
    }
}

/// Map a play speed in `[0, max_speed]` to a playback interval in milliseconds.
///
/// Follows a half cosine so that the slow end of the range is stretched out: speed 0 gives
/// 510 ms between frames, `max_speed` gives 10 ms.
///
pub fn play_interval(speed: u32, max_speed: u32) -> u32 {
    let phase = speed as f64 * PI / max_speed as f64;

    ((520.0 + 500.0 * phase.cos()) / 2.0).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearrange() {
        assert_eq!(rearrange(1.0, 2.0), (1.0, 2.0));
        assert_eq!(rearrange(2.0, 1.0), (1.0, 2.0));
        assert_eq!(rearrange(3, 3), (3, 3));
    }

    #[test]
    fn test_play_interval() {
        assert_eq!(play_interval(0, 50), 510);
        assert_eq!(play_interval(25, 50), 260);
        assert_eq!(play_interval(50, 50), 10);
        assert!(play_interval(30, 50) < play_interval(29, 50));
    }
}
