//! Platform detection for input quirks.
//!
//! The host passes its user agent once; results decide the primary modifier
//! and whether CE self-verification runs (it is skipped on touch devices).

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Platform {
    pub ios: bool,
    pub mac: bool,
    pub android: bool,
    pub mobile: bool,
    pub touch: bool,
}

impl Platform {
    /// Detect from a user agent string, the navigator platform string and
    /// `maxTouchPoints`.
    pub fn detect(user_agent: &str, platform: &str, max_touch_points: u32) -> Self {
        let ua = user_agent.to_lowercase();
        let platform = platform.to_lowercase();
        let has_touch = max_touch_points > 0;

        // iPadOS reports a Mac platform with touch.
        let ios = ua.contains("iphone")
            || ua.contains("ipad")
            || ua.contains("ipod")
            || (platform.contains("mac") && has_touch);
        let mac = platform.contains("mac") && !ios;
        let android = ua.contains("android");
        let mobile = ios || android || ua.contains("mobile");

        Self {
            ios,
            mac,
            android,
            mobile,
            touch: has_touch || mobile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_desktop_mac() {
        let p = Platform::detect(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 Safari/605.1.15",
            "MacIntel",
            0,
        );
        assert!(p.mac);
        assert!(!p.touch);
    }

    #[test]
    fn test_detect_ipad_as_ios() {
        let p = Platform::detect("Mozilla/5.0 (Macintosh) AppleWebKit/605.1.15", "MacIntel", 5);
        assert!(p.ios);
        assert!(!p.mac);
        assert!(p.touch);
    }

    #[test]
    fn test_detect_android() {
        let p = Platform::detect("Mozilla/5.0 (Linux; Android 14) Chrome/120 Mobile", "Linux armv8l", 5);
        assert!(p.android && p.mobile && p.touch);
    }
}
