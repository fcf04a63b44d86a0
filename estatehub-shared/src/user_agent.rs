/// User-agent family detection
///
/// The login audit stores coarse families (OS, device, browser), not version
/// numbers. Everything unrecognised is `"Other"`.

const OTHER: &str = "Other";

/// Families detected from a `User-Agent` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub operating_system: String,
    pub device: String,
    pub browser: String,
}

impl Default for UserAgentInfo {
    fn default() -> Self {
        Self {
            operating_system: OTHER.to_string(),
            device: OTHER.to_string(),
            browser: OTHER.to_string(),
        }
    }
}

impl UserAgentInfo {
    pub fn parse(user_agent: &str) -> Self {
        Self {
            operating_system: operating_system(user_agent).to_string(),
            device: device(user_agent).to_string(),
            browser: browser(user_agent).to_string(),
        }
    }
}

fn is_bot(ua: &str) -> bool {
    let lowered = ua.to_ascii_lowercase();
    ["bot", "spider", "crawler", "curl/", "python-requests"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

fn operating_system(ua: &str) -> &'static str {
    // iOS UAs contain "like Mac OS X", and Android UAs contain "Linux"
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        "iOS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("CrOS") {
        "Chrome OS"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        "Mac OS X"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        OTHER
    }
}

fn device(ua: &str) -> &'static str {
    if is_bot(ua) {
        "Spider"
    } else if ua.contains("iPhone") {
        "iPhone"
    } else if ua.contains("iPad") {
        "iPad"
    } else if ua.contains("Macintosh") {
        "Mac"
    } else if ua.contains("Android") {
        if ua.contains("Mobile") {
            "Android Phone"
        } else {
            "Android Tablet"
        }
    } else {
        OTHER
    }
}

fn browser(ua: &str) -> &'static str {
    let mobile = ua.contains("Mobile");

    if ua.contains("Edg/") || ua.contains("EdgA/") || ua.contains("EdgiOS/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox/") || ua.contains("FxiOS/") {
        if mobile {
            "Firefox Mobile"
        } else {
            "Firefox"
        }
    } else if ua.contains("CriOS/") || ua.contains("Chrome/") {
        if mobile {
            "Chrome Mobile"
        } else {
            "Chrome"
        }
    } else if ua.contains("Safari/") {
        if mobile {
            "Mobile Safari"
        } else {
            "Safari"
        }
    } else if ua.contains("MSIE") || ua.contains("Trident/") {
        "IE"
    } else {
        OTHER
    }
}
