/// Fixed frame rate used to turn elapsed time into frame indices.
pub const FPS: f64 = 30.0;

/// Format elapsed seconds as `MM:SS`. Negative or non-finite input renders as `00:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{:02}:{:02}", minutes, secs)
}

/// Frame index reached after `seconds` of playback at [`FPS`].
pub fn frame_index(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * FPS).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_pads_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(5.9), "00:05");
        assert_eq!(format_time(65.0), "01:05");
        assert_eq!(format_time(599.99), "09:59");
        // Minutes keep growing past two digits
        assert_eq!(format_time(6000.0), "100:00");
    }

    #[test]
    fn test_format_time_rejects_invalid_input() {
        assert_eq!(format_time(-1.0), "00:00");
        assert_eq!(format_time(f64::NAN), "00:00");
        assert_eq!(format_time(f64::INFINITY), "00:00");
    }

    #[test]
    fn test_frame_index_floors_and_is_monotonic() {
        assert_eq!(frame_index(0.0), 0);
        assert_eq!(frame_index(1.0), 30);
        assert_eq!(frame_index(1.999), 59);
        assert_eq!(frame_index(-3.0), 0);
        assert_eq!(frame_index(f64::NAN), 0);

        let mut last = 0;
        for step in 0..1000 {
            let idx = frame_index(step as f64 * 0.0137);
            assert!(idx >= last);
            last = idx;
        }
    }
}
