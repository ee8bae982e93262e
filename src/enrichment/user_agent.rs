//! Lightweight User-Agent classification.
//!
//! The routing engine only needs a coarse device class and recognizable
//! OS/browser names, so substring sniffing on the lowercased UA string is
//! enough. Unrecognized agents classify as desktop with unknown OS/browser,
//! which the condition evaluator treats as absent attributes.

use crate::routing::DeviceType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub device_type: DeviceType,
    pub os: Option<String>,
    pub browser: Option<String>,
}

pub fn classify(user_agent: &str) -> UserAgentInfo {
    let ua = user_agent.to_lowercase();

    // Android tablets don't carry the "mobile" token, iPads do carry "mac os"
    let device_type = if ua.contains("ipad")
        || ua.contains("tablet")
        || ua.contains("kindle")
        || (ua.contains("android") && !ua.contains("mobile"))
    {
        DeviceType::Tablet
    } else if ua.contains("mobile")
        || ua.contains("iphone")
        || ua.contains("ipod")
        || ua.contains("android")
    {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    };

    let os = if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        Some("iOS")
    } else if ua.contains("android") {
        Some("Android")
    } else if ua.contains("windows") {
        Some("Windows")
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        Some("macOS")
    } else if ua.contains("cros") {
        Some("ChromeOS")
    } else if ua.contains("linux") {
        Some("Linux")
    } else {
        None
    };

    // Order matters: Chrome-family UAs also claim Safari, Edge and Opera
    // also claim Chrome.
    let browser = if ua.contains("edg/") || ua.contains("edge/") {
        Some("Edge")
    } else if ua.contains("opr/") || ua.contains("opera") {
        Some("Opera")
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        Some("Firefox")
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        Some("Chrome")
    } else if ua.contains("safari/") {
        Some("Safari")
    } else {
        None
    };

    UserAgentInfo {
        device_type,
        os: os.map(str::to_string),
        browser: browser.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const ANDROID_CHROME: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X710) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const WINDOWS_EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const MAC_FIREFOX: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.1; rv:121.0) Gecko/20100101 Firefox/121.0";

    #[test]
    fn test_iphone_is_mobile_ios_safari() {
        let info = classify(IPHONE_SAFARI);
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.os.as_deref(), Some("iOS"));
        assert_eq!(info.browser.as_deref(), Some("Safari"));
    }

    #[test]
    fn test_android_phone_is_mobile_chrome() {
        let info = classify(ANDROID_CHROME);
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.os.as_deref(), Some("Android"));
        assert_eq!(info.browser.as_deref(), Some("Chrome"));
    }

    #[test]
    fn test_android_without_mobile_token_is_tablet() {
        let info = classify(ANDROID_TABLET);
        assert_eq!(info.device_type, DeviceType::Tablet);
        assert_eq!(info.os.as_deref(), Some("Android"));
    }

    #[test]
    fn test_ipad_is_tablet_not_macos() {
        let info = classify(IPAD);
        assert_eq!(info.device_type, DeviceType::Tablet);
        assert_eq!(info.os.as_deref(), Some("iOS"));
    }

    #[test]
    fn test_edge_not_misread_as_chrome() {
        let info = classify(WINDOWS_EDGE);
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.os.as_deref(), Some("Windows"));
        assert_eq!(info.browser.as_deref(), Some("Edge"));
    }

    #[test]
    fn test_mac_firefox() {
        let info = classify(MAC_FIREFOX);
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.os.as_deref(), Some("macOS"));
        assert_eq!(info.browser.as_deref(), Some("Firefox"));
    }

    #[test]
    fn test_unknown_agent_defaults_to_desktop() {
        let info = classify("curl/8.4.0");
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.os, None);
        assert_eq!(info.browser, None);
    }
}
